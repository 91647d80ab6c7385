//! Negative cache for artwork lookups

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use crate::ConfigError;

/// Image kinds resolved for every library entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtKind {
    /// Square 1:1 cover
    Boxart,
    /// Wide background banner
    Hero,
    /// Transparent title logo
    Logo,
}

impl ArtKind {
    /// All kinds, in resolution order
    pub const ALL: [ArtKind; 3] = [ArtKind::Boxart, ArtKind::Hero, ArtKind::Logo];

    /// Get kind as config/path component
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtKind::Boxart => "boxart",
            ArtKind::Hero => "hero",
            ArtKind::Logo => "logo",
        }
    }

    /// Bit used by `artwork.alternative_images`
    pub fn alternative_bit(&self) -> u8 {
        match self {
            ArtKind::Boxart => 1 << 0,
            ArtKind::Hero => 1 << 1,
            ArtKind::Logo => 1 << 2,
        }
    }
}

impl fmt::Display for ArtKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "boxart" | "cover" | "grid" => Ok(ArtKind::Boxart),
            "hero" => Ok(ArtKind::Hero),
            "logo" => Ok(ArtKind::Logo),
            other => Err(ConfigError::Invalid(format!("unknown artwork kind: {other}"))),
        }
    }
}

/// App ids the image service has confirmed to have no asset, per kind.
///
/// Entries are only ever added by the artwork pipeline. Removing them
/// requires an explicit [`ArtworkBlacklist::reset`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtworkBlacklist {
    #[serde(default)]
    pub boxart: BTreeSet<String>,

    #[serde(default)]
    pub hero: BTreeSet<String>,

    #[serde(default)]
    pub logo: BTreeSet<String>,
}

impl ArtworkBlacklist {
    fn set(&self, kind: ArtKind) -> &BTreeSet<String> {
        match kind {
            ArtKind::Boxart => &self.boxart,
            ArtKind::Hero => &self.hero,
            ArtKind::Logo => &self.logo,
        }
    }

    fn set_mut(&mut self, kind: ArtKind) -> &mut BTreeSet<String> {
        match kind {
            ArtKind::Boxart => &mut self.boxart,
            ArtKind::Hero => &mut self.hero,
            ArtKind::Logo => &mut self.logo,
        }
    }

    /// Check whether `(app_id, kind)` is known to be absent
    pub fn contains(&self, kind: ArtKind, app_id: &str) -> bool {
        self.set(kind).contains(app_id)
    }

    /// Record a confirmed-absent asset. Returns true if it was new.
    pub fn insert(&mut self, kind: ArtKind, app_id: impl Into<String>) -> bool {
        self.set_mut(kind).insert(app_id.into())
    }

    /// Number of blacklisted ids for a kind
    pub fn len(&self, kind: ArtKind) -> usize {
        self.set(kind).len()
    }

    /// True when no kind has any entry
    pub fn is_empty(&self) -> bool {
        ArtKind::ALL.iter().all(|kind| self.set(*kind).is_empty())
    }

    /// Clear one kind, or every kind when `kind` is `None`
    pub fn reset(&mut self, kind: Option<ArtKind>) {
        match kind {
            Some(kind) => self.set_mut(kind).clear(),
            None => {
                for kind in ArtKind::ALL {
                    self.set_mut(kind).clear();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_is_per_kind() {
        let mut blacklist = ArtworkBlacklist::default();
        assert!(blacklist.insert(ArtKind::Hero, "440"));
        assert!(!blacklist.insert(ArtKind::Hero, "440"));

        assert!(blacklist.contains(ArtKind::Hero, "440"));
        assert!(!blacklist.contains(ArtKind::Boxart, "440"));
        assert!(!blacklist.contains(ArtKind::Logo, "440"));
    }

    #[test]
    fn test_reset_single_kind() {
        let mut blacklist = ArtworkBlacklist::default();
        blacklist.insert(ArtKind::Boxart, "1");
        blacklist.insert(ArtKind::Logo, "2");

        blacklist.reset(Some(ArtKind::Boxart));
        assert_eq!(blacklist.len(ArtKind::Boxart), 0);
        assert_eq!(blacklist.len(ArtKind::Logo), 1);

        blacklist.reset(None);
        assert!(blacklist.is_empty());
    }

    #[test]
    fn test_kind_parsing() {
        assert_eq!("Hero".parse::<ArtKind>().unwrap(), ArtKind::Hero);
        assert_eq!("grid".parse::<ArtKind>().unwrap(), ArtKind::Boxart);
        assert!("banner".parse::<ArtKind>().is_err());
    }

    #[test]
    fn test_alternative_bits_are_distinct() {
        let bits: u8 = ArtKind::ALL.iter().map(|k| k.alternative_bit()).sum();
        assert_eq!(bits, 0b111);
    }
}
