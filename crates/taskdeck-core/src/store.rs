use std::collections::BTreeSet;

use tracing::{info, instrument, warn};

use crate::task::Task;

/// In-memory task list for the current view.
///
/// Only the fetch (`replace`) and the post-delete removal write to it.
/// `revision` moves on every write so derived views know to re-run.
#[derive(Debug, Clone, Default)]
pub struct TaskStore {
    tasks: Vec<Task>,
    revision: u64,
}

impl TaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[instrument(skip(self, tasks), fields(count = tasks.len()))]
    pub fn replace(&mut self, tasks: Vec<Task>) {
        let mut seen = BTreeSet::new();
        let mut kept = Vec::with_capacity(tasks.len());
        for task in tasks {
            if seen.insert(task.id) {
                kept.push(task);
            } else {
                warn!(id = task.id, "duplicate task id; keeping first");
            }
        }
        self.tasks = kept;
        self.revision += 1;
        info!(count = self.tasks.len(), revision = self.revision, "task store replaced");
    }

    /// Drop every task whose id is in `ids`; unknown ids are ignored.
    /// Returns how many tasks were removed.
    #[instrument(skip(self, ids), fields(requested = ids.len()))]
    pub fn remove_by_ids(&mut self, ids: &BTreeSet<u64>) -> usize {
        let before = self.tasks.len();
        self.tasks.retain(|task| !ids.contains(&task.id));
        let removed = before - self.tasks.len();
        self.revision += 1;
        info!(removed, remaining = self.tasks.len(), "removed tasks from store");
        removed
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|task| task.id == id)
    }

    pub fn contains(&self, id: u64) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }
}
