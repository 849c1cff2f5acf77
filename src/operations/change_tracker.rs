use crate::value::{Record, Value};
use std::collections::BTreeSet;

/// Before/after snapshot of an update.
///
/// A field counts as changed when its value differs between the two snapshots,
/// including when it is present in only one of them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeTracker {
    before: Record,
    after: Record,
}

impl ChangeTracker {
    pub fn new(before: Record, after: Record) -> Self {
        Self { before, after }
    }

    pub fn changed(&self, field: &str) -> bool {
        self.before.get(field) != self.after.get(field)
    }

    /// Changed field names, sorted
    pub fn changed_fields(&self) -> Vec<String> {
        let names: BTreeSet<&str> = self.before.fields().chain(self.after.fields()).collect();
        names
            .into_iter()
            .filter(|name| self.changed(name))
            .map(str::to_string)
            .collect()
    }

    pub fn previous_value(&self, field: &str) -> Option<&Value> {
        self.before.get(field)
    }

    pub fn current_value(&self, field: &str) -> Option<&Value> {
        self.after.get(field)
    }

    pub fn has_changes(&self) -> bool {
        self.before != self.after
    }

    pub fn before(&self) -> &Record {
        &self.before
    }

    pub fn after(&self) -> &Record {
        &self.after
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tracks_changed_and_added_fields() {
        let before = Record::new().with("title", "Old").with("views", 3);
        let after = Record::new()
            .with("title", "New")
            .with("views", 3)
            .with("slug", "new");
        let tracker = ChangeTracker::new(before, after);

        assert!(tracker.has_changes());
        assert!(tracker.changed("title"));
        assert!(!tracker.changed("views"));
        assert_eq!(tracker.changed_fields(), vec!["slug", "title"]);
        assert_eq!(tracker.previous_value("title"), Some(&Value::from("Old")));
        assert_eq!(tracker.current_value("title"), Some(&Value::from("New")));
        assert_eq!(tracker.previous_value("slug"), None);
    }

    #[test]
    fn test_identical_snapshots_have_no_changes() {
        let record = Record::new().with("title", "Same");
        let tracker = ChangeTracker::new(record.clone(), record);
        assert!(!tracker.has_changes());
        assert!(tracker.changed_fields().is_empty());
    }
}
