//! Staleness checks for generated files.

use std::fmt::Debug;
use std::path::Path;

/// Decides whether an output file must be re-derived from its input.
pub trait RegenerationPolicy: Send + Sync + Debug {
    fn needs_regeneration(&self, output: &Path, input: &Path) -> bool;
}

/// Regenerate when the input is newer than the output.
///
/// Any missing file or failed `stat` counts as stale.
#[derive(Debug, Clone, Copy, Default)]
pub struct MtimePolicy;

impl RegenerationPolicy for MtimePolicy {
    fn needs_regeneration(&self, output: &Path, input: &Path) -> bool {
        needs_regeneration(output, input)
    }
}

/// Regenerate unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysRegenerate;

impl RegenerationPolicy for AlwaysRegenerate {
    fn needs_regeneration(&self, _output: &Path, _input: &Path) -> bool {
        true
    }
}

/// Whether `output` is missing or older than `input`.
#[must_use]
pub fn needs_regeneration(output: &Path, input: &Path) -> bool {
    let modified = |path: &Path| path.metadata().and_then(|m| m.modified());

    match (modified(output), modified(input)) {
        (Ok(output_time), Ok(input_time)) => input_time > output_time,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use std::fs::{self, File};
    use std::time::{Duration, SystemTime};

    use super::*;

    fn touch(path: &Path, at: SystemTime) {
        fs::write(path, "x").unwrap();
        File::options()
            .write(true)
            .open(path)
            .unwrap()
            .set_modified(at)
            .unwrap();
    }

    #[test]
    fn test_missing_output() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("in.dot");
        touch(&input, SystemTime::now());

        assert!(needs_regeneration(&temp.path().join("out.png"), &input));
    }

    #[test]
    fn test_missing_input() {
        let temp = tempfile::tempdir().unwrap();
        let output = temp.path().join("out.png");
        touch(&output, SystemTime::now());

        assert!(needs_regeneration(&output, &temp.path().join("in.dot")));
    }

    #[test]
    fn test_output_newer_is_fresh() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("in.dot");
        let output = temp.path().join("out.png");
        let base = SystemTime::now() - Duration::from_secs(60);
        touch(&input, base);
        touch(&output, base + Duration::from_secs(10));

        assert!(!needs_regeneration(&output, &input));
        assert!(!MtimePolicy.needs_regeneration(&output, &input));
        assert!(AlwaysRegenerate.needs_regeneration(&output, &input));
    }

    #[test]
    fn test_equal_mtime_is_fresh() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("in.dot");
        let output = temp.path().join("out.png");
        let at = SystemTime::now() - Duration::from_secs(60);
        touch(&input, at);
        touch(&output, at);

        assert!(!needs_regeneration(&output, &input));
    }

    #[test]
    fn test_input_newer_is_stale() {
        let temp = tempfile::tempdir().unwrap();
        let input = temp.path().join("in.dot");
        let output = temp.path().join("out.png");
        let base = SystemTime::now() - Duration::from_secs(60);
        touch(&output, base);
        touch(&input, base + Duration::from_secs(10));

        assert!(needs_regeneration(&output, &input));
    }
}
