//! YAML encoding of `collection.yml`.

use crate::metadata::CollectionMetadata;

/// Parse and validate metadata from YAML content.
///
/// # Errors
///
/// Returns a description if the YAML is malformed, a required key is missing
/// or an invariant of [`CollectionMetadata::validate`] does not hold.
pub(crate) fn parse_metadata(content: &str) -> Result<CollectionMetadata, String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err("metadata file is empty".to_owned());
    }

    let metadata: CollectionMetadata =
        serde_yaml::from_str(trimmed).map_err(|e| format!("Invalid YAML: {e}"))?;
    metadata.validate()?;
    Ok(metadata)
}

/// Serialize metadata to YAML.
pub(crate) fn serialize_metadata(metadata: &CollectionMetadata) -> Result<String, serde_yaml::Error> {
    serde_yaml::to_string(metadata)
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;

    use super::*;

    const JOB_YAML: &str = r#"
collection_id: acme-backend
workflow: job
status: submitted
date_created: "2024-03-01T09:00:00Z"
date_modified: 2024-03-02T10:30:00.250Z
status_history:
  - status: active
    date: "2024-03-01T09:00:00Z"
  - status: submitted
    date: "2024-03-02T10:30:00.250Z"
company: Acme
role: Backend Engineer
tags:
  - rust
  - remote
"#;

    #[test]
    fn test_parse_full_metadata() {
        let meta = parse_metadata(JOB_YAML).unwrap();

        assert_eq!(meta.collection_id, "acme-backend");
        assert_eq!(meta.workflow, "job");
        assert_eq!(meta.status, "submitted");
        assert_eq!(
            meta.date_created,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
        );
        assert_eq!(meta.status_history.len(), 2);
        assert_eq!(
            meta.fields.get("company"),
            Some(&serde_yaml::Value::from("Acme"))
        );
        assert!(meta.fields.contains_key("tags"));
        assert!(!meta.fields.contains_key("status"));
    }

    #[test]
    fn test_extra_fields_survive_round_trip() {
        let meta = parse_metadata(JOB_YAML).unwrap();
        let written = serialize_metadata(&meta).unwrap();
        let reread = parse_metadata(&written).unwrap();

        assert_eq!(reread, meta);
        assert!(written.contains("company: Acme"));
    }

    #[test]
    fn test_offset_timestamps_normalized_to_utc() {
        let yaml = r#"
collection_id: blog-1
workflow: blog
status: draft
date_created: "2024-03-01T10:00:00+01:00"
date_modified: "2024-03-01T10:00:00+01:00"
status_history:
  - status: draft
    date: "2024-03-01T10:00:00+01:00"
"#;
        let meta = parse_metadata(yaml).unwrap();
        assert_eq!(
            meta.date_created,
            Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(parse_metadata("").is_err());
        assert!(parse_metadata("  \n").is_err());
    }

    #[test]
    fn test_parse_missing_required_key() {
        let yaml = "collection_id: x\nworkflow: job\n";
        let err = parse_metadata(yaml).unwrap_err();
        assert!(err.contains("Invalid YAML"), "{err}");
    }

    #[test]
    fn test_parse_bad_timestamp() {
        let yaml = JOB_YAML.replace(
            "date_created: \"2024-03-01T09:00:00Z\"",
            "date_created: yesterday",
        );
        assert!(parse_metadata(&yaml).is_err());
    }

    #[test]
    fn test_parse_inconsistent_history() {
        let yaml = JOB_YAML.replace(
            "status: submitted\ndate_created",
            "status: interview\ndate_created",
        );
        let err = parse_metadata(&yaml).unwrap_err();
        assert!(err.contains("does not match"), "{err}");
    }
}
