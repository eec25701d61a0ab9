// 🔤 Owner name normalization
//
// County owner strings arrive with inconsistent case and padding:
//   "Smith, John ", "SMITH, JOHN", "  smith, john"  → one owner
// Business and government entities ("CITY OF ST PETERSBURG") go through the
// same path as people.

use std::collections::{BTreeMap, BTreeSet};

/// Trim + upper-case. Blank input yields None.
pub fn normalize_name(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

/// Set of normalized owner names, remembering the first raw spelling of each.
///
/// Two raw strings that normalize identically collapse into one owner.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OwnerSet {
    originals: BTreeMap<String, String>,
}

impl OwnerSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = OwnerSet::new();
        for name in names {
            set.insert(name.as_ref());
        }
        set
    }

    /// Feed records carry up to two optional owner fields
    pub fn from_optional<'a, I>(names: I) -> Self
    where
        I: IntoIterator<Item = Option<&'a str>>,
    {
        Self::from_names(names.into_iter().flatten())
    }

    /// Returns false for blank input or an already-present owner
    pub fn insert(&mut self, raw: &str) -> bool {
        match normalize_name(raw) {
            Some(key) if !self.originals.contains_key(&key) => {
                self.originals.insert(key, raw.to_string());
                true
            }
            _ => false,
        }
    }

    pub fn contains(&self, normalized: &str) -> bool {
        self.originals.contains_key(normalized)
    }

    pub fn is_empty(&self) -> bool {
        self.originals.is_empty()
    }

    pub fn len(&self) -> usize {
        self.originals.len()
    }

    pub fn normalized(&self) -> BTreeSet<String> {
        self.originals.keys().cloned().collect()
    }

    /// Raw spelling first seen for a normalized name
    pub fn original(&self, normalized: &str) -> Option<&str> {
        self.originals.get(normalized).map(String::as_str)
    }

    /// Raw spellings, ordered by normalized name
    pub fn originals(&self) -> Vec<String> {
        self.originals.values().cloned().collect()
    }

    /// Same owners, ignoring case/whitespace/order
    pub fn same_owners(&self, other: &OwnerSet) -> bool {
        self.originals.keys().eq(other.originals.keys())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("  doe, jane "), Some("DOE, JANE".to_string()));
        assert_eq!(normalize_name("CITY OF ST PETERSBURG"), Some("CITY OF ST PETERSBURG".to_string()));
        assert_eq!(normalize_name(""), None);
        assert_eq!(normalize_name("   "), None);
    }

    #[test]
    fn test_set_ignores_case_and_order() {
        let a = OwnerSet::from_names(["SMITH, JOHN", "DOE, JANE"]);
        let b = OwnerSet::from_names(["doe, jane", "smith, john"]);

        assert!(a.same_owners(&b));
        assert_eq!(a, OwnerSet::from_names(["DOE, JANE", "SMITH, JOHN"]));
    }

    #[test]
    fn test_blanks_dropped() {
        let set = OwnerSet::from_optional([Some("SMITH, JOHN"), Some("  "), None]);

        assert_eq!(set.len(), 1);
        assert!(set.contains("SMITH, JOHN"));
    }

    #[test]
    fn test_collapsed_spellings_keep_first_original() {
        let set = OwnerSet::from_names(["Smith, John", "SMITH, JOHN "]);

        assert_eq!(set.len(), 1);
        assert_eq!(set.original("SMITH, JOHN"), Some("Smith, John"));
    }
}
