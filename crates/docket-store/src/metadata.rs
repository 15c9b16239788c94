//! Collection metadata types.
//!
//! Provides [`CollectionMetadata`], the typed form of `collection.yml`.
//! This module contains only data types and their invariants - reading and
//! writing is implemented by individual store backends.
//!
//! # Fields
//!
//! - `collection_id`: stable identifier, immutable after creation
//! - `workflow`: workflow name
//! - `status`: current stage name
//! - `date_created` / `date_modified`: ISO-8601 timestamps
//! - `status_history`: append-only list of `{status, date}`
//! - any other key is kept in `fields` and written back untouched

use std::collections::BTreeMap;

use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};

/// Current time truncated to milliseconds, the precision written to disk.
#[must_use]
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(3)
}

/// One entry of a collection's status history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEntry {
    pub status: String,
    pub date: DateTime<Utc>,
}

/// Metadata stored in a collection's `collection.yml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionMetadata {
    pub collection_id: String,
    pub workflow: String,
    pub status: String,
    pub date_created: DateTime<Utc>,
    pub date_modified: DateTime<Utc>,
    #[serde(default)]
    pub status_history: Vec<StatusEntry>,
    /// Workflow-specific fields (company, title, tags, ...).
    #[serde(flatten)]
    pub fields: BTreeMap<String, serde_yaml::Value>,
}

impl CollectionMetadata {
    /// Create metadata for a collection entering its first stage at `at`.
    #[must_use]
    pub fn new(
        workflow: impl Into<String>,
        collection_id: impl Into<String>,
        status: impl Into<String>,
        at: DateTime<Utc>,
    ) -> Self {
        let status = status.into();
        Self {
            collection_id: collection_id.into(),
            workflow: workflow.into(),
            status_history: vec![StatusEntry {
                status: status.clone(),
                date: at,
            }],
            status,
            date_created: at,
            date_modified: at,
            fields: BTreeMap::new(),
        }
    }

    /// Add a workflow-specific field.
    #[must_use]
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<serde_yaml::Value>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Advance `date_modified` to `at`, never moving it backwards.
    ///
    /// Returns the timestamp actually recorded.
    pub fn touch(&mut self, at: DateTime<Utc>) -> DateTime<Utc> {
        let at = at.max(self.date_modified);
        self.date_modified = at;
        at
    }

    /// Record entering `status` at `at`.
    ///
    /// Appends to `status_history` (also when `status` is unchanged), sets the
    /// current status and advances `date_modified`.
    pub fn record_status(&mut self, status: impl Into<String>, at: DateTime<Utc>) {
        let status = status.into();
        let at = self.touch(at);
        self.status_history.push(StatusEntry {
            status: status.clone(),
            date: at,
        });
        self.status = status;
    }

    /// Check the invariants a well-formed `collection.yml` satisfies.
    ///
    /// # Errors
    ///
    /// Returns a description of the first violated invariant.
    pub fn validate(&self) -> Result<(), String> {
        for (field, value) in [
            ("collection_id", &self.collection_id),
            ("workflow", &self.workflow),
            ("status", &self.status),
        ] {
            if value.trim().is_empty() {
                return Err(format!("{field} cannot be empty"));
            }
        }

        match self.status_history.last() {
            None => return Err("status_history cannot be empty".to_owned()),
            Some(last) if last.status != self.status => {
                return Err(format!(
                    "status '{}' does not match last status_history entry '{}'",
                    self.status, last.status
                ));
            }
            Some(_) => {}
        }

        if self.date_modified < self.date_created {
            return Err("date_modified is earlier than date_created".to_owned());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, hour, 0, 0).unwrap()
    }

    #[test]
    fn test_new_metadata_has_initial_history() {
        let meta = CollectionMetadata::new("job", "acme", "active", at(9));

        assert_eq!(meta.status, "active");
        assert_eq!(meta.status_history.len(), 1);
        assert_eq!(meta.status_history[0].status, "active");
        assert_eq!(meta.date_created, meta.date_modified);
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_record_status_appends() {
        let mut meta = CollectionMetadata::new("job", "acme", "active", at(9));
        meta.record_status("submitted", at(10));

        assert_eq!(meta.status, "submitted");
        assert_eq!(meta.status_history.len(), 2);
        assert_eq!(meta.status_history[1].date, at(10));
        assert_eq!(meta.date_modified, at(10));
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_record_same_status_still_appends() {
        let mut meta = CollectionMetadata::new("job", "acme", "active", at(9));
        meta.record_status("active", at(11));

        assert_eq!(meta.status_history.len(), 2);
        assert_eq!(meta.date_modified, at(11));
    }

    #[test]
    fn test_date_modified_never_decreases() {
        let mut meta = CollectionMetadata::new("job", "acme", "active", at(12));
        // Clock went backwards
        meta.record_status("submitted", at(8));

        assert_eq!(meta.date_modified, at(12));
        assert_eq!(meta.status_history[1].date, at(12));

        let recorded = meta.touch(at(12) - Duration::seconds(1));
        assert_eq!(recorded, at(12));
    }

    #[test]
    fn test_validate_status_history_mismatch() {
        let mut meta = CollectionMetadata::new("job", "acme", "active", at(9));
        meta.status = "submitted".to_owned();

        let err = meta.validate().unwrap_err();
        assert!(err.contains("does not match"));
    }

    #[test]
    fn test_validate_empty_history() {
        let mut meta = CollectionMetadata::new("job", "acme", "active", at(9));
        meta.status_history.clear();

        assert!(meta.validate().unwrap_err().contains("status_history"));
    }

    #[test]
    fn test_validate_empty_id() {
        let meta = CollectionMetadata::new("job", " ", "active", at(9));
        assert!(meta.validate().unwrap_err().contains("collection_id"));
    }

    #[test]
    fn test_now_is_millisecond_precision() {
        let ts = now();
        assert_eq!(ts.timestamp_subsec_nanos() % 1_000_000, 0);
    }
}
