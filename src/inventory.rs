//! # Normalized Repository Inventory
//!
//! Both forges are reduced to the same shape before any decision is made:
//! an [`Inventory`] maps a lower-case repository name to a
//! [`RepositoryRecord`]. Nothing downstream of the forge adapters sees
//! forge-specific JSON.
//!
//! Iteration follows the order in which names were first inserted, so runs
//! are reproducible and log output follows the order the source forge
//! reported its projects in. Re-inserting a name replaces its record but
//! keeps its original position.

use std::collections::HashMap;

use serde::Serialize;

/// One repository as seen by either forge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepositoryRecord {
    /// Lower-case join key, also the intended destination repository name.
    pub name: String,
    /// Where to fetch from. Only set for source records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clone_url: Option<String>,
    /// Where to push to. Only set for destination records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push_url: Option<String>,
    /// Destination repositories flagged archived are never pushed to.
    pub archived: bool,
    /// Free text from the source forge; informational only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl RepositoryRecord {
    /// Build a source-side record.
    pub fn source(name: &str, clone_url: &str, description: Option<String>) -> Self {
        Self {
            name: name.to_string(),
            clone_url: Some(clone_url.to_string()),
            push_url: None,
            archived: false,
            description,
        }
    }

    /// Build a destination-side record.
    pub fn destination(name: &str, push_url: &str, archived: bool) -> Self {
        Self {
            name: name.to_string(),
            clone_url: None,
            push_url: Some(push_url.to_string()),
            archived,
            description: None,
        }
    }
}

/// An upstream entry that could not be turned into a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejected {
    /// What the forge called it (usually the clone URL).
    pub label: String,
    pub reason: String,
    /// Number of records inserted before this entry was seen; it belongs
    /// just ahead of the record at that index in source order.
    pub position: usize,
}

/// Insertion-ordered mapping from repository name to record.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: Vec<RepositoryRecord>,
    index: HashMap<String, usize>,
    rejected: Vec<Rejected>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record keyed by its name.
    ///
    /// Returns the record it replaced, if the name was already present.
    pub fn insert(&mut self, record: RepositoryRecord) -> Option<RepositoryRecord> {
        if let Some(&position) = self.index.get(&record.name) {
            return Some(std::mem::replace(&mut self.records[position], record));
        }
        self.index.insert(record.name.clone(), self.records.len());
        self.records.push(record);
        None
    }

    pub fn get(&self, name: &str) -> Option<&RepositoryRecord> {
        self.index.get(name).map(|&position| &self.records[position])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &RepositoryRecord> {
        self.records.iter()
    }

    /// Names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|r| r.name.as_str())
    }

    /// Remember an upstream entry that has no usable name.
    pub fn reject(&mut self, label: &str, reason: impl Into<String>) {
        self.rejected.push(Rejected {
            label: label.to_string(),
            reason: reason.into(),
            position: self.records.len(),
        });
    }

    pub fn rejected(&self) -> &[Rejected] {
        &self.rejected
    }
}

impl FromIterator<RepositoryRecord> for Inventory {
    fn from_iter<I: IntoIterator<Item = RepositoryRecord>>(iter: I) -> Self {
        let mut inventory = Inventory::new();
        for record in iter {
            inventory.insert(record);
        }
        inventory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_preserves_order() {
        let inventory: Inventory = ["charlie", "alpha", "bravo"]
            .iter()
            .map(|n| RepositoryRecord::source(n, &format!("https://x/{}.git", n), None))
            .collect();

        let names: Vec<&str> = inventory.names().collect();
        assert_eq!(names, vec!["charlie", "alpha", "bravo"]);
        assert_eq!(inventory.len(), 3);
    }

    #[test]
    fn test_reinsert_replaces_in_place() {
        let mut inventory = Inventory::new();
        inventory.insert(RepositoryRecord::destination("foo", "git@x:old.git", false));
        inventory.insert(RepositoryRecord::destination("bar", "git@x:bar.git", false));

        let previous =
            inventory.insert(RepositoryRecord::destination("foo", "git@x:new.git", true));

        assert_eq!(previous.unwrap().push_url.as_deref(), Some("git@x:old.git"));
        assert_eq!(inventory.len(), 2);
        let names: Vec<&str> = inventory.names().collect();
        assert_eq!(names, vec!["foo", "bar"]);
        let foo = inventory.get("foo").unwrap();
        assert!(foo.archived);
        assert_eq!(foo.push_url.as_deref(), Some("git@x:new.git"));
    }

    #[test]
    fn test_get_and_contains() {
        let mut inventory = Inventory::new();
        assert!(inventory.is_empty());
        inventory.insert(RepositoryRecord::source(
            "alpha",
            "https://x/alpha.git",
            Some("Alpha".to_string()),
        ));

        assert!(inventory.contains("alpha"));
        assert!(!inventory.contains("beta"));
        assert_eq!(
            inventory.get("alpha").unwrap().description.as_deref(),
            Some("Alpha")
        );
        assert!(inventory.get("beta").is_none());
    }

    #[test]
    fn test_rejected_entries_are_not_records() {
        let mut inventory = Inventory::new();
        inventory.reject("https://x/group/", "empty name");

        assert!(inventory.is_empty());
        assert_eq!(inventory.rejected().len(), 1);
        assert_eq!(inventory.rejected()[0].label, "https://x/group/");
        assert_eq!(inventory.rejected()[0].position, 0);
    }

    #[test]
    fn test_rejected_position_follows_insertions() {
        let mut inventory = Inventory::new();
        inventory.insert(RepositoryRecord::source("alpha", "https://x/g/alpha.git", None));
        inventory.reject("https://x/g/", "empty name");
        inventory.insert(RepositoryRecord::source("beta", "https://x/g/beta.git", None));

        assert_eq!(inventory.rejected()[0].position, 1);
    }

    #[test]
    fn test_record_constructors() {
        let source = RepositoryRecord::source("a", "https://x/a.git", None);
        assert_eq!(source.clone_url.as_deref(), Some("https://x/a.git"));
        assert!(source.push_url.is_none());
        assert!(!source.archived);

        let destination = RepositoryRecord::destination("a", "git@x:a.git", true);
        assert!(destination.clone_url.is_none());
        assert!(destination.archived);
    }
}
