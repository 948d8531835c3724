use std::collections::HashMap;

use crate::task::Task;

/// Which tasks currently show their subtasks. Collapsed unless toggled.
#[derive(Debug, Clone, Default)]
pub struct Expansion {
    expanded: HashMap<u64, bool>,
}

impl Expansion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: u64) {
        let flag = self.expanded.entry(id).or_insert(false);
        *flag = !*flag;
    }

    pub fn is_expanded(&self, id: u64) -> bool {
        self.expanded.get(&id).copied().unwrap_or(false)
    }

    /// Only tasks with at least one subtask get an expand affordance.
    pub fn can_expand(task: &Task) -> bool {
        task.has_subtasks()
    }

    /// Expanded and actually has something to show.
    pub fn shows_subtasks(&self, task: &Task) -> bool {
        Self::can_expand(task) && self.is_expanded(task.id)
    }
}
