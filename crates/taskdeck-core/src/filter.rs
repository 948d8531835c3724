use anyhow::anyhow;
use tracing::trace;

use crate::task::{
  Priority,
  Status,
  Task
};

/// Multi-select chips for the list
/// view. An empty category means "no
/// filter" for that category.
#[derive(
  Debug, Clone, Default, PartialEq, Eq,
)]
pub struct FilterSelection {
  priorities: Vec<Priority>,
  statuses:   Vec<Status>
}

impl FilterSelection {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn priorities(&self) -> &[Priority] {
    &self.priorities
  }

  pub fn statuses(&self) -> &[Status] {
    &self.statuses
  }

  pub fn is_empty(&self) -> bool {
    self.priorities.is_empty()
      && self.statuses.is_empty()
  }

  /// Remove when selected, otherwise
  /// append.
  pub fn toggle_priority(
    &mut self,
    priority: Priority
  ) {
    if let Some(idx) = self
      .priorities
      .iter()
      .position(|p| {
        same_label(
          p.as_str(),
          priority.as_str()
        )
      })
    {
      self.priorities.remove(idx);
    } else {
      self.priorities.push(priority);
    }
  }

  pub fn toggle_status(
    &mut self,
    status: Status
  ) {
    if let Some(idx) = self
      .statuses
      .iter()
      .position(|s| *s == status)
    {
      self.statuses.remove(idx);
    } else {
      self.statuses.push(status);
    }
  }

  /// "All" populates the category with
  /// every known value.
  pub fn select_all_priorities(
    &mut self
  ) {
    self.priorities =
      Priority::ALL.to_vec();
  }

  pub fn select_all_statuses(
    &mut self
  ) {
    self.statuses = Status::ALL.to_vec();
  }

  pub fn clear(&mut self) {
    self.priorities.clear();
    self.statuses.clear();
  }

  /// Add user-entered priority labels.
  pub fn add_priority_terms(
    &mut self,
    terms: &[String]
  ) -> anyhow::Result<()> {
    for term in terms {
      if term.eq_ignore_ascii_case("all")
      {
        self.select_all_priorities();
        continue;
      }
      let priority =
        Priority::parse_known(term)
          .ok_or_else(|| {
            anyhow!(
              "unknown priority: {term} \
               (expected low, high, \
               critical or all)"
            )
          })?;
      self.toggle_priority(priority);
    }
    Ok(())
  }

  pub fn add_status_terms(
    &mut self,
    terms: &[String]
  ) -> anyhow::Result<()> {
    for term in terms {
      if term.eq_ignore_ascii_case("all")
      {
        self.select_all_statuses();
        continue;
      }
      let status = Status::parse(term)
        .ok_or_else(|| {
          anyhow!(
            "unknown status: {term} \
             (expected not started, in \
             progress, complete, \
             cancelled or all)"
          )
        })?;
      self.toggle_status(status);
    }
    Ok(())
  }

  pub fn matches(
    &self,
    task: &Task
  ) -> bool {
    let priority_ok = self
      .priorities
      .is_empty()
      || self.priorities.iter().any(
        |p| {
          same_label(
            p.as_str(),
            task.priority.as_str()
          )
        }
      );
    let status_ok = self
      .statuses
      .is_empty()
      || self.statuses.iter().any(|s| {
        same_label(
          s.as_str(),
          task.status.as_str()
        )
      });

    let ok = priority_ok && status_ok;
    trace!(id = task.id, priority_ok, status_ok, ok, "filter evaluation");
    ok
  }

  /// Keep the tasks that pass, in their
  /// original order.
  pub fn apply<'a>(
    &self,
    tasks: &'a [Task]
  ) -> Vec<&'a Task> {
    tasks
      .iter()
      .filter(|task| self.matches(task))
      .collect()
  }
}

fn same_label(
  a: &str,
  b: &str
) -> bool {
  a.trim()
    .eq_ignore_ascii_case(b.trim())
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::FilterSelection;
  use crate::task::{
    Priority,
    Status,
    Task
  };

  fn task(
    id: u64,
    priority: Priority,
    status: Status
  ) -> Task {
    let day =
      NaiveDate::from_ymd_opt(2025, 3, 1)
        .unwrap();
    let mut task = Task::new(
      id,
      format!("task {id}"),
      day,
      day
    );
    task.priority = priority;
    task.status = status;
    task
  }

  fn sample() -> Vec<Task> {
    vec![
      task(
        1,
        Priority::Low,
        Status::Complete
      ),
      task(
        2,
        Priority::High,
        Status::NotStarted
      ),
      task(
        3,
        Priority::Critical,
        Status::InProgress
      ),
      task(
        4,
        Priority::Unrecognized(
          "urgent".to_string()
        ),
        Status::Cancelled
      ),
    ]
  }

  fn ids(tasks: Vec<&Task>) -> Vec<u64> {
    tasks.iter().map(|t| t.id).collect()
  }

  #[test]
  fn empty_selection_keeps_everything()
  {
    let tasks = sample();
    let selection =
      FilterSelection::new();
    assert_eq!(
      ids(selection.apply(&tasks)),
      vec![1, 2, 3, 4]
    );
  }

  #[test]
  fn priority_only_selection() {
    let tasks = sample();
    let mut selection =
      FilterSelection::new();
    selection
      .toggle_priority(Priority::Low);
    assert_eq!(
      ids(selection.apply(&tasks[..2])),
      vec![1]
    );
  }

  #[test]
  fn categories_combine_with_and() {
    let tasks = sample();
    let mut selection =
      FilterSelection::new();
    selection
      .toggle_priority(Priority::High);
    selection.toggle_priority(
      Priority::Critical
    );
    selection
      .toggle_status(Status::InProgress);
    assert_eq!(
      ids(selection.apply(&tasks)),
      vec![3]
    );
  }

  #[test]
  fn toggling_twice_restores_selection()
  {
    let mut selection =
      FilterSelection::new();
    selection
      .toggle_status(Status::Complete);
    let before = selection.clone();
    selection
      .toggle_status(Status::Cancelled);
    selection
      .toggle_status(Status::Cancelled);
    assert_eq!(selection, before);
    assert_eq!(
      selection.statuses(),
      &[Status::Complete]
    );
  }

  #[test]
  fn all_populates_known_values_only()
  {
    let tasks = sample();
    let mut selection =
      FilterSelection::new();
    selection
      .add_priority_terms(&[
        "All".to_string()
      ])
      .unwrap();
    assert_eq!(
      selection.priorities().len(),
      3
    );
    assert_eq!(
      ids(selection.apply(&tasks)),
      vec![1, 2, 3]
    );
  }

  #[test]
  fn user_terms_are_case_insensitive()
  {
    let tasks = sample();
    let mut selection =
      FilterSelection::new();
    selection
      .add_status_terms(&[
        "Not-Started".to_string(),
        "COMPLETE".to_string()
      ])
      .unwrap();
    assert_eq!(
      ids(selection.apply(&tasks)),
      vec![1, 2]
    );
    assert!(
      selection
        .add_priority_terms(&[
          "urgent".to_string()
        ])
        .is_err()
    );
  }
}
