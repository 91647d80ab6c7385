//! Library scan configuration

use serde::{Deserialize, Serialize};

/// Which sources a scan reads, and how the result is filtered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibraryConfig {
    /// Source bitmask (1 native catalog, 2 shortcuts, 4 launcher A, 8 launcher B)
    #[serde(default = "default_sources")]
    pub sources: u8,

    /// Drop entries whose normalized name was already seen
    #[serde(default = "default_true")]
    pub skip_duplicates: bool,

    /// Extra names to exclude on top of the built-in list
    #[serde(default)]
    pub excluded_names: Vec<String>,
}

fn default_sources() -> u8 {
    3
}

fn default_true() -> bool {
    true
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            sources: default_sources(),
            skip_duplicates: true,
            excluded_names: Vec::new(),
        }
    }
}
