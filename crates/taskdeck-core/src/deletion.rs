//! Bulk delete: confirm, then one gateway call per selected id, in order.

use std::collections::BTreeSet;
use std::fmt;

use tracing::{info, instrument, warn};

use crate::error::ClientError;
use crate::gateway::TaskGateway;
use crate::selection::Selection;
use crate::session::Session;
use crate::store::TaskStore;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeletionState {
    #[default]
    Idle,
    ConfirmPending {
        ids: Vec<u64>,
    },
    Deleting {
        ids: Vec<u64>,
    },
}

impl DeletionState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ConfirmPending { .. } => "confirm-pending",
            Self::Deleting { .. } => "deleting",
        }
    }
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DeletionError {
    #[error("no tasks selected")]
    EmptySelection,
    #[error("deletion is {actual}, expected {expected}")]
    InvalidState {
        expected: &'static str,
        actual: &'static str,
    },
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Outcome of one confirmed run.
#[derive(Debug, Default)]
pub struct DeletionReport {
    pub deleted: BTreeSet<u64>,
    pub failed: Vec<(u64, ClientError)>,
}

impl DeletionReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// True when the gateway rejected the token for at least one id.
    pub fn auth_rejected(&self) -> bool {
        self.failed.iter().any(|(_, err)| err.is_auth())
    }
}

#[derive(Debug, Default)]
pub struct DeletionWorkflow {
    state: DeletionState,
}

impl DeletionWorkflow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DeletionState {
        &self.state
    }

    /// Ids awaiting confirmation, empty unless `ConfirmPending`.
    pub fn pending(&self) -> &[u64] {
        match &self.state {
            DeletionState::ConfirmPending { ids } => ids,
            _ => &[],
        }
    }

    /// Idle -> ConfirmPending with a snapshot of the current selection.
    #[instrument(skip(self, selection), fields(selected = selection.len()))]
    pub fn request(&mut self, selection: &Selection) -> Result<&[u64], DeletionError> {
        if !matches!(self.state, DeletionState::Idle) {
            return Err(DeletionError::InvalidState {
                expected: "idle",
                actual: self.state.name(),
            });
        }
        if selection.is_empty() {
            return Err(DeletionError::EmptySelection);
        }
        self.state = DeletionState::ConfirmPending {
            ids: selection.ids(),
        };
        Ok(self.pending())
    }

    /// ConfirmPending -> Idle. No calls, no store or selection changes.
    pub fn cancel(&mut self) -> Result<(), DeletionError> {
        match self.state {
            DeletionState::ConfirmPending { .. } => {
                info!("deletion cancelled");
                self.state = DeletionState::Idle;
                Ok(())
            }
            _ => Err(DeletionError::InvalidState {
                expected: "confirm-pending",
                actual: self.state.name(),
            }),
        }
    }

    /// ConfirmPending -> Deleting -> Idle.
    ///
    /// Each delete is awaited before the next is sent. Failed ids are logged
    /// and kept; the store drops the succeeded ids in one update and the
    /// selection is cleared whatever the outcome. Without a token nothing is
    /// sent and the workflow stays in `ConfirmPending`.
    #[instrument(skip_all)]
    pub async fn confirm<G: TaskGateway>(
        &mut self,
        gateway: &G,
        session: &Session,
        store: &mut TaskStore,
        selection: &mut Selection,
    ) -> Result<DeletionReport, DeletionError> {
        let ids = match &self.state {
            DeletionState::ConfirmPending { ids } => ids.clone(),
            other => {
                return Err(DeletionError::InvalidState {
                    expected: "confirm-pending",
                    actual: other.name(),
                });
            }
        };
        let token = session.require_token()?;

        self.state = DeletionState::Deleting { ids: ids.clone() };
        let mut report = DeletionReport::default();
        for id in ids {
            match gateway.delete_task(id, token).await {
                Ok(()) => {
                    report.deleted.insert(id);
                }
                Err(err) => {
                    warn!(id, error = %err, "delete failed; keeping task");
                    report.failed.push((id, err));
                }
            }
        }

        let removed = store.remove_by_ids(&report.deleted);
        selection.clear();
        self.state = DeletionState::Idle;
        info!(
            deleted = report.deleted.len(),
            failed = report.failed.len(),
            removed,
            "deletion finished"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::BTreeSet;

    use chrono::NaiveDate;

    use super::*;
    use crate::task::Task;
    use crate::wire::TaskInput;

    #[derive(Default)]
    struct FakeGateway {
        failing: BTreeSet<u64>,
        log: RefCell<Vec<String>>,
    }

    impl TaskGateway for FakeGateway {
        async fn list_tasks(&self, _token: &str) -> Result<Vec<Task>, ClientError> {
            Ok(vec![])
        }

        async fn get_task(&self, id: u64, _token: &str) -> Result<Task, ClientError> {
            Err(ClientError::NotFound {
                message: format!("task {id}"),
            })
        }

        async fn create_task(&self, input: &TaskInput, _token: &str) -> Result<Task, ClientError> {
            Ok(input.clone().into_task(99))
        }

        async fn update_task(&self, task: &Task, _token: &str) -> Result<Task, ClientError> {
            Ok(task.clone())
        }

        async fn delete_task(&self, id: u64, token: &str) -> Result<(), ClientError> {
            assert_eq!(token, "tok");
            self.log.borrow_mut().push(format!("start {id}"));
            tokio::task::yield_now().await;
            self.log.borrow_mut().push(format!("end {id}"));
            if self.failing.contains(&id) {
                Err(ClientError::Gateway {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    fn store_with(ids: &[u64]) -> TaskStore {
        let day = NaiveDate::from_ymd_opt(2025, 3, 1).unwrap();
        let mut store = TaskStore::new();
        store.replace(ids.iter().map(|id| Task::new(*id, format!("t{id}"), day, day)).collect());
        store
    }

    fn selection_of(ids: &[u64]) -> Selection {
        let mut selection = Selection::new();
        for id in ids {
            selection.toggle(*id);
        }
        selection
    }

    fn signed_in() -> Session {
        Session::ephemeral(Some("ada".to_string()), Some("tok".to_string()))
    }

    #[tokio::test]
    async fn partial_failure_keeps_failed_ids_and_clears_selection() {
        let gateway = FakeGateway {
            failing: BTreeSet::from([2]),
            ..Default::default()
        };
        let mut store = store_with(&[1, 2]);
        let mut selection = selection_of(&[1, 2]);
        let mut workflow = DeletionWorkflow::new();

        assert_eq!(workflow.request(&selection).unwrap(), &[1, 2]);
        let report = workflow
            .confirm(&gateway, &signed_in(), &mut store, &mut selection)
            .await
            .unwrap();

        assert_eq!(report.deleted, BTreeSet::from([1]));
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, 2);
        assert!(!report.is_complete());
        assert_eq!(store.tasks().iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
        assert!(selection.is_empty());
        assert_eq!(workflow.state(), &DeletionState::Idle);
    }

    #[tokio::test]
    async fn deletes_are_sequential() {
        let gateway = FakeGateway::default();
        let mut store = store_with(&[1, 2, 3]);
        let mut selection = selection_of(&[3, 1, 2]);
        let mut workflow = DeletionWorkflow::new();

        workflow.request(&selection).unwrap();
        workflow
            .confirm(&gateway, &signed_in(), &mut store, &mut selection)
            .await
            .unwrap();

        assert_eq!(
            *gateway.log.borrow(),
            vec!["start 1", "end 1", "start 2", "end 2", "start 3", "end 3"]
        );
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn cancel_has_no_side_effects() {
        let gateway = FakeGateway::default();
        let mut store = store_with(&[1, 2]);
        let selection = selection_of(&[1]);
        let mut workflow = DeletionWorkflow::new();

        workflow.request(&selection).unwrap();
        workflow.cancel().unwrap();

        assert_eq!(workflow.state(), &DeletionState::Idle);
        assert!(gateway.log.borrow().is_empty());
        assert_eq!(store.len(), 2);
        assert!(selection.contains(1));

        let mut selection = selection;
        assert!(matches!(
            workflow
                .confirm(&gateway, &signed_in(), &mut store, &mut selection)
                .await,
            Err(DeletionError::InvalidState { .. })
        ));
    }

    #[test]
    fn empty_selection_is_rejected() {
        let mut workflow = DeletionWorkflow::new();
        assert!(matches!(
            workflow.request(&Selection::new()),
            Err(DeletionError::EmptySelection)
        ));
        assert_eq!(workflow.state(), &DeletionState::Idle);
    }

    #[test]
    fn second_request_while_pending_is_rejected() {
        let mut workflow = DeletionWorkflow::new();
        let selection = selection_of(&[4]);
        workflow.request(&selection).unwrap();
        assert!(matches!(
            workflow.request(&selection),
            Err(DeletionError::InvalidState { actual: "confirm-pending", .. })
        ));
    }

    #[tokio::test]
    async fn missing_token_sends_nothing_and_stays_pending() {
        let gateway = FakeGateway::default();
        let mut store = store_with(&[1]);
        let mut selection = selection_of(&[1]);
        let mut workflow = DeletionWorkflow::new();

        workflow.request(&selection).unwrap();
        let result = workflow
            .confirm(&gateway, &Session::ephemeral(None, None), &mut store, &mut selection)
            .await;

        assert!(matches!(result, Err(DeletionError::Client(ClientError::MissingToken))));
        assert!(gateway.log.borrow().is_empty());
        assert_eq!(workflow.pending(), &[1]);
        assert!(selection.contains(1));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn ids_missing_from_store_are_harmless() {
        let gateway = FakeGateway::default();
        let mut store = store_with(&[1]);
        let mut selection = selection_of(&[1, 7]);
        let mut workflow = DeletionWorkflow::new();

        workflow.request(&selection).unwrap();
        let report = workflow
            .confirm(&gateway, &signed_in(), &mut store, &mut selection)
            .await
            .unwrap();

        assert_eq!(report.deleted, BTreeSet::from([1, 7]));
        assert!(store.is_empty());
        assert!(selection.is_empty());
    }
}
