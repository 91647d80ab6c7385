//! Canonical identifiers and name exclusion

use std::collections::HashSet;

/// Low bits the store client sets on every shortcut game id
pub const SHORTCUT_ID_FLAGS: u64 = 0x0200_0000;

/// Turn a 32-bit shortcut id into the 64-bit id the store client's own UI
/// uses for the same shortcut. Artwork file names and `rungameid` launch
/// URLs are keyed by this value.
pub fn shortcut_canonical_id(shortcut_id: u32) -> u64 {
    ((shortcut_id as u64) << 32) | SHORTCUT_ID_FLAGS
}

/// Catalog entries that are tools or runtimes rather than games
pub const BUILTIN_EXCLUSIONS: &[&str] = &[
    "Proton Experimental",
    "Steamworks Common Redistributables",
    "Steam Linux Runtime 1.0 (scout)",
    "Steam Linux Runtime 2.0 (soldier)",
    "Steam Linux Runtime 3.0 (sniper)",
    "Proton 10.0 (Beta)",
    "Proton 9.0",
    "Proton 8.0",
    "Proton 7.0",
    "Proton 5.0",
    "Proton 4.2",
    "Proton 3.7",
    "Proton 3.16",
    "Proton 3.0",
    "Proton Hotfix",
    "Proton EasyAntiCheat Runtime",
    "Proton BattlEye Runtime",
    "Hearth",
];

/// Executable substrings of shortcuts created by external streaming runners
pub const UNMANAGED_RUNNER_MARKERS: &[&str] = &["moondeckrun"];

/// Exact-name exclusion filter
#[derive(Debug, Clone)]
pub struct ExclusionList {
    names: HashSet<String>,
}

impl Default for ExclusionList {
    fn default() -> Self {
        Self::new(std::iter::empty::<String>())
    }
}

impl ExclusionList {
    /// Built-in names plus `extra`
    pub fn new<I, S>(extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut names: HashSet<String> = BUILTIN_EXCLUSIONS.iter().map(|s| s.to_string()).collect();
        names.extend(extra.into_iter().map(Into::into));
        Self { names }
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

/// True if a shortcut executable is managed by an external runner
pub fn is_unmanaged_runner(executable: &str) -> bool {
    UNMANAGED_RUNNER_MARKERS
        .iter()
        .any(|marker| executable.contains(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortcut_canonical_id() {
        assert_eq!(shortcut_canonical_id(12345), 53_021_404_823_552);
        assert_eq!(shortcut_canonical_id(12345), (12345u64 << 32) | 0x0200_0000);
        assert_eq!(shortcut_canonical_id(0), 0x0200_0000);
        assert_eq!(
            shortcut_canonical_id(u32::MAX),
            0xFFFF_FFFF_0200_0000
        );
    }

    #[test]
    fn test_shortcut_canonical_id_is_injective() {
        let samples = [0u32, 1, 2, 12345, 0x7FFF_FFFF, 0x8000_0000, u32::MAX - 1, u32::MAX];
        let ids: HashSet<u64> = samples.iter().map(|n| shortcut_canonical_id(*n)).collect();
        assert_eq!(ids.len(), samples.len());
        // The high half always recovers the input.
        for n in samples {
            assert_eq!((shortcut_canonical_id(n) >> 32) as u32, n);
        }
    }

    #[test]
    fn test_exclusions() {
        let list = ExclusionList::new(["My Tool"]);
        assert!(list.is_excluded("Proton Experimental"));
        assert!(list.is_excluded("Proton 9.0"));
        assert!(list.is_excluded("My Tool"));
        assert!(!list.is_excluded("Team Fortress 2"));
        // Exact match only
        assert!(!list.is_excluded("proton experimental"));
    }

    #[test]
    fn test_unmanaged_runner() {
        assert!(is_unmanaged_runner("\"/home/deck/.local/bin/moondeckrun\""));
        assert!(!is_unmanaged_runner("/usr/bin/mygame"));
    }
}
