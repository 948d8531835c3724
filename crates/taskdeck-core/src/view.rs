//! The task list screen: store, filter, sort and the per-row trackers.

use tracing::{info, instrument, warn};

use crate::deletion::{DeletionError, DeletionReport, DeletionWorkflow};
use crate::error::ClientError;
use crate::expansion::Expansion;
use crate::filter::FilterSelection;
use crate::gateway::TaskGateway;
use crate::selection::Selection;
use crate::session::Session;
use crate::sort::{SortConfig, SortKey};
use crate::store::TaskStore;
use crate::task::{Subtask, Task};

/// One rendered line of the list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Row<'a> {
    Task {
        task: &'a Task,
        selected: bool,
        expandable: bool,
        expanded: bool,
    },
    Subtask {
        parent: u64,
        subtask: &'a Subtask,
    },
}

#[derive(Debug, Default)]
pub struct TaskListView {
    store: TaskStore,
    filter: FilterSelection,
    sort: SortConfig,
    selection: Selection,
    expansion: Expansion,
    deletion: DeletionWorkflow,
}

impl TaskListView {
    pub fn new(sort: SortConfig) -> Self {
        Self {
            sort,
            ..Self::default()
        }
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn filter(&self) -> &FilterSelection {
        &self.filter
    }

    pub fn filter_mut(&mut self) -> &mut FilterSelection {
        &mut self.filter
    }

    pub fn sort_config(&self) -> SortConfig {
        self.sort
    }

    pub fn set_sort(&mut self, sort: SortConfig) {
        self.sort = sort;
    }

    /// Column-header click.
    pub fn toggle_sort(&mut self, key: SortKey) {
        self.sort.toggle(key);
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    pub fn toggle_selected(&mut self, id: u64) {
        self.selection.toggle(id);
    }

    pub fn expansion(&self) -> &Expansion {
        &self.expansion
    }

    pub fn toggle_expanded(&mut self, id: u64) {
        self.expansion.toggle(id);
    }

    /// Expand every task that has subtasks and is not already open.
    pub fn expand_all(&mut self) {
        let ids: Vec<u64> = self
            .store
            .tasks()
            .iter()
            .filter(|task| Expansion::can_expand(task) && !self.expansion.is_expanded(task.id))
            .map(|task| task.id)
            .collect();
        for id in ids {
            self.expansion.toggle(id);
        }
    }

    pub fn deletion(&self) -> &DeletionWorkflow {
        &self.deletion
    }

    /// Fetch the list and replace the store. A rejected token clears the
    /// session.
    #[instrument(skip_all)]
    pub async fn load<G: TaskGateway>(
        &mut self,
        gateway: &G,
        session: &mut Session,
    ) -> Result<usize, ClientError> {
        let token = session.require_token()?.to_string();
        match gateway.list_tasks(&token).await {
            Ok(tasks) => {
                self.store.replace(tasks);
                info!(count = self.store.len(), "task list loaded");
                Ok(self.store.len())
            }
            Err(err) => {
                if err.is_auth() {
                    warn!(error = %err, "token rejected; clearing session");
                    session.teardown()?;
                }
                Err(err)
            }
        }
    }

    /// Store contents after filtering, in sort order. Recomputed in full on
    /// every call.
    pub fn visible(&self) -> Vec<&Task> {
        let mut tasks = self.filter.apply(self.store.tasks());
        self.sort.sort(&mut tasks);
        tasks
    }

    pub fn rows(&self) -> Vec<Row<'_>> {
        let mut rows = Vec::new();
        for task in self.visible() {
            let expanded = self.expansion.shows_subtasks(task);
            rows.push(Row::Task {
                task,
                selected: self.selection.contains(task.id),
                expandable: Expansion::can_expand(task),
                expanded,
            });
            if expanded {
                rows.extend(task.subtasks.iter().map(|subtask| Row::Subtask {
                    parent: task.id,
                    subtask,
                }));
            }
        }
        rows
    }

    pub fn request_delete(&mut self) -> Result<&[u64], DeletionError> {
        self.deletion.request(&self.selection)
    }

    pub fn cancel_delete(&mut self) -> Result<(), DeletionError> {
        self.deletion.cancel()
    }

    pub async fn confirm_delete<G: TaskGateway>(
        &mut self,
        gateway: &G,
        session: &Session,
    ) -> Result<DeletionReport, DeletionError> {
        self.deletion
            .confirm(gateway, session, &mut self.store, &mut self.selection)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sort::SortDirection;
    use chrono::NaiveDate;
    use crate::task::{Priority, Status, SubtaskStatus};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    fn sample() -> Vec<Task> {
        let mut one = Task::new(1, "B", day(1), day(1));
        one.priority = Priority::Low;
        one.status = Status::Complete;
        let mut two = Task::new(2, "A", day(5), day(1));
        two.subtasks = vec![
            Subtask {
                id: 1,
                title: "first".into(),
                status: SubtaskStatus::NotStarted,
            },
            Subtask {
                id: 2,
                title: "second".into(),
                status: SubtaskStatus::Complete,
            },
        ];
        vec![one, two]
    }

    fn loaded() -> TaskListView {
        let mut view = TaskListView::default();
        view.store.replace(sample());
        view
    }

    fn visible_ids(view: &TaskListView) -> Vec<u64> {
        view.visible().iter().map(|t| t.id).collect()
    }

    #[test]
    fn filter_then_sort() {
        let mut view = loaded();
        assert_eq!(visible_ids(&view), vec![2, 1]);

        view.set_sort(SortConfig::new(SortKey::Priority, SortDirection::Desc));
        assert_eq!(visible_ids(&view), vec![2, 1]);

        view.filter_mut().toggle_priority(Priority::Low);
        assert_eq!(visible_ids(&view), vec![1]);
    }

    #[test]
    fn toggle_sort_flips_then_resets() {
        let mut view = loaded();
        view.toggle_sort(SortKey::Title);
        assert_eq!(visible_ids(&view), vec![1, 2]);
        view.toggle_sort(SortKey::DueDate);
        assert_eq!(view.sort_config(), SortConfig::new(SortKey::DueDate, SortDirection::Asc));
        assert_eq!(visible_ids(&view), vec![1, 2]);
    }

    #[test]
    fn expanded_rows_follow_their_parent() {
        let mut view = loaded();
        assert_eq!(view.rows().len(), 2);

        view.toggle_expanded(1);
        assert_eq!(view.rows().len(), 2);

        view.toggle_expanded(2);
        view.toggle_selected(2);
        let rows = view.rows();
        assert_eq!(rows.len(), 4);
        assert!(matches!(
            rows[0],
            Row::Task { task, selected: true, expandable: true, expanded: true } if task.id == 2
        ));
        assert!(matches!(rows[1], Row::Subtask { parent: 2, subtask } if subtask.id == 1));
        assert!(matches!(rows[2], Row::Subtask { parent: 2, subtask } if subtask.id == 2));
        assert!(matches!(rows[3], Row::Task { expandable: false, .. }));
    }

    #[test]
    fn expand_all_only_touches_tasks_with_subtasks() {
        let mut view = loaded();
        view.expand_all();
        assert!(view.expansion().is_expanded(2));
        assert!(!view.expansion().is_expanded(1));
        view.expand_all();
        assert!(view.expansion().is_expanded(2));
    }

    #[test]
    fn overdue_uses_today() {
        let tasks = sample();
        assert!(!tasks[0].is_overdue(day(3)));
        assert!(tasks[1].is_overdue(day(6)));
        assert!(!tasks[1].is_overdue(day(5)));
    }
}
