//! Collection lifecycle state machine.
//!
//! Stages are the workflow's declared stages and transitions are the `next`
//! edges of each stage. A transition is allowed iff the target is a declared
//! stage and either equals the current stage or is listed in its `next`.
//!
//! # Interrupted transitions
//!
//! Moving a collection and rewriting its metadata are two separate steps.
//! A transition record is written before the move and cleared once metadata
//! is persisted; [`StatusStateMachine::recover`] repairs collections whose
//! record survived a crash.

use std::sync::Arc;

use docket_config::{WorkflowDefinition, Workflows};
use docket_store::{Collection, CollectionStore, PendingTransition, now};

use crate::error::EngineError;
use crate::lookup::{find_workflow, load_collection};

/// What [`StatusStateMachine::recover`] did with one transition record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recovery {
    /// Collection never moved; record dropped.
    RolledBack { id: String, status: String },
    /// Collection moved but metadata was stale; metadata updated.
    Completed { id: String, status: String },
    /// Transition had fully finished; record dropped.
    Cleared { id: String },
    /// Collection no longer exists; record dropped.
    Orphaned { id: String },
    /// Location matches neither end of the transition; record kept.
    Unresolved { id: String, reason: String },
}

/// Validates and applies stage transitions.
pub struct StatusStateMachine {
    store: Arc<dyn CollectionStore>,
    workflows: Arc<Workflows>,
}

impl StatusStateMachine {
    #[must_use]
    pub fn new(store: Arc<dyn CollectionStore>, workflows: Arc<Workflows>) -> Self {
        Self { store, workflows }
    }

    /// Check a transition without touching any collection.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownStatus`] if either stage is not declared,
    /// or [`EngineError::InvalidTransition`] if `to` is not reachable.
    pub fn check(definition: &WorkflowDefinition, from: &str, to: &str) -> Result<(), EngineError> {
        let unknown = |status: &str| EngineError::UnknownStatus {
            workflow: definition.name.clone(),
            status: status.to_owned(),
        };

        if !definition.has_stage(to) {
            return Err(unknown(to));
        }
        if from == to {
            return Ok(());
        }

        let current = definition.stage(from).ok_or_else(|| unknown(from))?;
        if current.allows(to) {
            Ok(())
        } else {
            Err(EngineError::InvalidTransition {
                from: from.to_owned(),
                to: to.to_owned(),
            })
        }
    }

    /// Stages reachable from `status`, in declaration order.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::WorkflowNotFound`] or
    /// [`EngineError::UnknownStatus`].
    pub fn next_stages(&self, workflow: &str, status: &str) -> Result<Vec<String>, EngineError> {
        let definition = find_workflow(&self.workflows, workflow)?;
        let stage = definition
            .stage(status)
            .ok_or_else(|| EngineError::UnknownStatus {
                workflow: workflow.to_owned(),
                status: status.to_owned(),
            })?;
        Ok(stage.next.clone())
    }

    /// Move a collection to `new_status`.
    ///
    /// The collection directory is relocated, `{new_status, now}` is
    /// appended to the history and metadata is persisted at the new
    /// location. A transition to the current stage only refreshes the
    /// history and `date_modified`.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::UnknownStatus`] or
    /// [`EngineError::InvalidTransition`] before anything is written, and
    /// store errors if the move or the metadata write fails. A failed write
    /// after the move leaves a transition record for [`recover`](Self::recover).
    pub fn transition(
        &self,
        workflow: &str,
        id: &str,
        new_status: &str,
    ) -> Result<Collection, EngineError> {
        let definition = find_workflow(&self.workflows, workflow)?;
        if !definition.has_stage(new_status) {
            return Err(EngineError::UnknownStatus {
                workflow: workflow.to_owned(),
                status: new_status.to_owned(),
            });
        }

        let mut collection = load_collection(self.store.as_ref(), workflow, id)?;
        let from = collection.status().to_owned();
        Self::check(definition, &from, new_status)?;

        let at = now();
        if from == new_status {
            collection.metadata.record_status(new_status, at);
            self.store.persist(&collection)?;
            tracing::info!(collection = id, status = new_status, "refreshed status");
            return Ok(collection);
        }

        self.store.begin_transition(&PendingTransition {
            collection_id: id.to_owned(),
            workflow: workflow.to_owned(),
            from: from.clone(),
            to: new_status.to_owned(),
            date: at,
        })?;

        if let Err(err) = self.store.relocate(&mut collection, new_status) {
            // Nothing moved, so the record would only mislead recovery
            if let Err(cleanup) = self.store.end_transition(workflow, id) {
                tracing::warn!(collection = id, error = %cleanup, "cannot clear transition record");
            }
            return Err(err.into());
        }

        collection.metadata.record_status(new_status, at);
        self.store.persist(&collection)?;
        self.store.end_transition(workflow, id)?;

        tracing::info!(collection = id, from = %from, to = new_status, "changed status");
        Ok(collection)
    }

    /// Repair transitions interrupted between the move and the metadata write.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError`] if the transition records cannot be read or a
    /// repair cannot be written.
    pub fn recover(&self, workflow: &str) -> Result<Vec<Recovery>, EngineError> {
        find_workflow(&self.workflows, workflow)?;

        let mut report = Vec::new();
        for pending in self.store.pending_transitions(workflow)? {
            let outcome = self.recover_one(&pending)?;
            match &outcome {
                Recovery::Unresolved { id, reason } => {
                    tracing::warn!(collection = %id, %reason, "cannot recover transition");
                }
                other => tracing::info!(outcome = ?other, "recovered transition"),
            }
            report.push(outcome);
        }
        Ok(report)
    }

    fn recover_one(&self, pending: &PendingTransition) -> Result<Recovery, EngineError> {
        let id = pending.collection_id.clone();

        let mut collection = match load_collection(self.store.as_ref(), &pending.workflow, &id) {
            Ok(collection) => collection,
            Err(EngineError::CollectionNotFound { .. }) => {
                self.store.end_transition(&pending.workflow, &id)?;
                return Ok(Recovery::Orphaned { id });
            }
            Err(err) => {
                return Ok(Recovery::Unresolved {
                    id,
                    reason: err.to_string(),
                });
            }
        };

        let location = collection.location_status().map(str::to_owned);
        let outcome = match location.as_deref() {
            Some(at) if at == pending.from => Recovery::RolledBack {
                id,
                status: pending.from.clone(),
            },
            Some(at) if at == pending.to && collection.status() == pending.to => {
                Recovery::Cleared { id }
            }
            Some(at) if at == pending.to && collection.status() == pending.from => {
                collection
                    .metadata
                    .record_status(pending.to.clone(), pending.date);
                self.store.persist(&collection)?;
                Recovery::Completed {
                    id,
                    status: pending.to.clone(),
                }
            }
            _ => {
                return Ok(Recovery::Unresolved {
                    id,
                    reason: format!(
                        "located under '{}' with status '{}', expected '{}' or '{}'",
                        location.as_deref().unwrap_or("?"),
                        collection.status(),
                        pending.from,
                        pending.to
                    ),
                });
            }
        };

        self.store.end_transition(&pending.workflow, &pending.collection_id)?;
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use chrono::{TimeZone, Utc};
    use docket_config::Stage;
    use docket_store::{
        CollectionMetadata, FsCollectionStore, METADATA_FILE, MockCollectionStore,
    };
    use pretty_assertions::assert_eq;

    use super::*;

    fn job_workflow() -> Workflows {
        let mut workflows = Workflows::default();
        workflows.insert(WorkflowDefinition::new(
            "job",
            vec![
                Stage::new("active", &["submitted", "rejected"]),
                Stage::new("submitted", &["interview", "rejected"]),
                Stage::new("interview", &["rejected"]),
                Stage::terminal("rejected"),
            ],
        ));
        workflows
    }

    fn meta(id: &str, status: &str) -> CollectionMetadata {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        CollectionMetadata::new("job", id, status, at)
    }

    fn mock_machine(store: MockCollectionStore) -> (Arc<MockCollectionStore>, StatusStateMachine) {
        let store = Arc::new(store);
        let machine = StatusStateMachine::new(Arc::clone(&store) as _, Arc::new(job_workflow()));
        (store, machine)
    }

    fn fs_machine(root: &Path) -> (Arc<FsCollectionStore>, StatusStateMachine) {
        let store = Arc::new(FsCollectionStore::new(root.to_path_buf()));
        let machine = StatusStateMachine::new(Arc::clone(&store) as _, Arc::new(job_workflow()));
        (store, machine)
    }

    /// Every file under `root`, relative, sorted.
    fn tree(root: &Path) -> Vec<String> {
        fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
            for entry in fs::read_dir(dir).unwrap().map(Result::unwrap) {
                let path = entry.path();
                if path.is_dir() {
                    walk(&path, root, out);
                } else {
                    out.push(path.strip_prefix(root).unwrap().display().to_string());
                }
            }
        }
        let mut out = Vec::new();
        walk(root, root, &mut out);
        out.sort();
        out
    }

    #[test]
    fn test_check_follows_next_edges() {
        let workflows = job_workflow();
        let job = workflows.get("job").unwrap();
        let stages = ["active", "submitted", "interview", "rejected"];

        for from in stages {
            for to in stages {
                let allowed = from == to || job.stage(from).unwrap().allows(to);
                assert_eq!(
                    StatusStateMachine::check(job, from, to).is_ok(),
                    allowed,
                    "{from} -> {to}"
                );
            }
        }
    }

    #[test]
    fn test_check_unknown_target() {
        let workflows = job_workflow();
        let err = StatusStateMachine::check(workflows.get("job").unwrap(), "active", "hired")
            .unwrap_err();
        assert!(matches!(err, EngineError::UnknownStatus { status, .. } if status == "hired"));
    }

    #[test]
    fn test_transition_moves_directory_and_records_history() {
        let temp = tempfile::tempdir().unwrap();
        let (store, machine) = fs_machine(temp.path());
        store.create(meta("acme", "active")).unwrap();
        fs::write(temp.path().join("job/active/acme/resume.md"), "# Resume").unwrap();

        let collection = machine.transition("job", "acme", "submitted").unwrap();

        assert!(!temp.path().join("job/active/acme").exists());
        assert_eq!(collection.path, temp.path().join("job/submitted/acme"));
        assert_eq!(collection.artifacts, vec!["resume.md"]);

        let reloaded = store.get("job", "acme").unwrap();
        assert_eq!(reloaded.status(), "submitted");
        assert_eq!(reloaded.metadata.status_history.len(), 2);
        assert_eq!(reloaded.metadata.status_history[1].status, "submitted");
        assert!(reloaded.metadata.date_modified >= reloaded.metadata.date_created);
        assert!(store.pending_transitions("job").unwrap().is_empty());
    }

    #[test]
    fn test_invalid_transition_writes_nothing() {
        let temp = tempfile::tempdir().unwrap();
        let (store, machine) = fs_machine(temp.path());
        store.create(meta("acme", "active")).unwrap();
        let before = tree(temp.path());
        let yaml_before =
            fs::read_to_string(temp.path().join("job/active/acme").join(METADATA_FILE)).unwrap();

        let err = machine.transition("job", "acme", "interview").unwrap_err();

        assert!(matches!(
            err,
            EngineError::InvalidTransition { ref from, ref to } if from == "active" && to == "interview"
        ));
        assert_eq!(tree(temp.path()), before);
        assert_eq!(
            fs::read_to_string(temp.path().join("job/active/acme").join(METADATA_FILE)).unwrap(),
            yaml_before
        );
    }

    #[test]
    fn test_unknown_status_rejected_before_loading() {
        let (store, machine) = mock_machine(MockCollectionStore::new());

        let err = machine.transition("job", "missing", "hired").unwrap_err();

        assert!(matches!(err, EngineError::UnknownStatus { .. }));
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn test_same_status_refreshes_without_moving() {
        let (store, machine) =
            mock_machine(MockCollectionStore::new().with_collection(meta("acme", "rejected")));

        let collection = machine.transition("job", "acme", "rejected").unwrap();

        assert_eq!(store.relocate_count(), 0);
        assert_eq!(store.persist_count(), 1);
        assert_eq!(collection.metadata.status_history.len(), 2);
        assert!(collection.metadata.date_modified > collection.metadata.date_created);
    }

    #[test]
    fn test_terminal_stage_has_no_way_out() {
        let (store, machine) =
            mock_machine(MockCollectionStore::new().with_collection(meta("acme", "rejected")));

        let err = machine.transition("job", "acme", "active").unwrap_err();

        assert!(matches!(err, EngineError::InvalidTransition { .. }));
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn test_missing_collection_and_workflow() {
        let (_store, machine) = mock_machine(MockCollectionStore::new());

        assert!(matches!(
            machine.transition("job", "nope", "submitted").unwrap_err(),
            EngineError::CollectionNotFound { .. }
        ));
        assert!(matches!(
            machine.transition("blog", "nope", "draft").unwrap_err(),
            EngineError::WorkflowNotFound(_)
        ));
    }

    #[test]
    fn test_failed_persist_leaves_record_for_recovery() {
        let (store, machine) =
            mock_machine(MockCollectionStore::new().with_collection(meta("acme", "active")));
        store.fail_persist(true);

        assert!(machine.transition("job", "acme", "submitted").is_err());

        let stored = store.stored("job", "acme").unwrap();
        assert_eq!(stored.location_status(), Some("submitted"));
        assert_eq!(stored.status(), "active");
        assert_eq!(store.pending_transitions("job").unwrap().len(), 1);

        store.fail_persist(false);
        let report = machine.recover("job").unwrap();

        assert_eq!(
            report,
            vec![Recovery::Completed {
                id: "acme".to_owned(),
                status: "submitted".to_owned(),
            }]
        );
        let stored = store.stored("job", "acme").unwrap();
        assert_eq!(stored.status(), "submitted");
        assert_eq!(stored.metadata.status_history.len(), 2);
        assert!(store.pending_transitions("job").unwrap().is_empty());
    }

    #[test]
    fn test_failed_move_clears_record() {
        let temp = tempfile::tempdir().unwrap();
        let (store, machine) = fs_machine(temp.path());
        store.create(meta("acme", "active")).unwrap();
        // A file where the target stage directory should be
        fs::write(temp.path().join("job/submitted"), "").unwrap();

        assert!(machine.transition("job", "acme", "submitted").is_err());

        assert!(temp.path().join("job/active/acme").is_dir());
        assert!(store.pending_transitions("job").unwrap().is_empty());
    }

    fn pending(id: &str, from: &str, to: &str) -> PendingTransition {
        PendingTransition {
            collection_id: id.to_owned(),
            workflow: "job".to_owned(),
            from: from.to_owned(),
            to: to.to_owned(),
            date: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_recover_outcomes() {
        let store = MockCollectionStore::new()
            .with_collection(meta("never-moved", "active"))
            .with_collection_at(
                meta("moved", "active"),
                MockCollectionStore::path_for("job", "submitted", "moved"),
                Vec::new(),
            )
            .with_collection(meta("done", "submitted"))
            .with_collection(meta("elsewhere", "interview"))
            .with_pending(pending("never-moved", "active", "submitted"))
            .with_pending(pending("moved", "active", "submitted"))
            .with_pending(pending("done", "active", "submitted"))
            .with_pending(pending("elsewhere", "active", "submitted"))
            .with_pending(pending("gone", "active", "submitted"));
        let (store, machine) = mock_machine(store);

        let report = machine.recover("job").unwrap();

        assert_eq!(report.len(), 5);
        assert!(report.contains(&Recovery::RolledBack {
            id: "never-moved".to_owned(),
            status: "active".to_owned(),
        }));
        assert!(report.contains(&Recovery::Completed {
            id: "moved".to_owned(),
            status: "submitted".to_owned(),
        }));
        assert!(report.contains(&Recovery::Cleared {
            id: "done".to_owned(),
        }));
        assert!(report.contains(&Recovery::Orphaned {
            id: "gone".to_owned(),
        }));
        assert!(
            report
                .iter()
                .any(|r| matches!(r, Recovery::Unresolved { id, .. } if id == "elsewhere"))
        );

        let moved = store.stored("job", "moved").unwrap();
        assert_eq!(moved.status(), "submitted");
        assert_eq!(
            moved.metadata.status_history.last().unwrap().date,
            Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap()
        );

        let left: Vec<_> = store
            .pending_transitions("job")
            .unwrap()
            .into_iter()
            .map(|p| p.collection_id)
            .collect();
        assert_eq!(left, vec!["elsewhere"]);
    }

    #[test]
    fn test_next_stages() {
        let (_store, machine) = mock_machine(MockCollectionStore::new());

        assert_eq!(
            machine.next_stages("job", "active").unwrap(),
            vec!["submitted", "rejected"]
        );
        assert!(machine.next_stages("job", "rejected").unwrap().is_empty());
        assert!(machine.next_stages("job", "nope").is_err());
    }
}
