//! JSON shapes exchanged with the gateway and the checks that turn them into
//! typed tasks.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::datetime::parse_wire_date;
use crate::error::ClientError;
use crate::task::{Attachment, Priority, Status, Subtask, SubtaskStatus, Task};

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Default,
)]
#[serde(rename_all = "camelCase")]
pub struct TaskDto {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id:             Option<u64>,
  #[serde(default)]
  pub title:          Option<String>,
  #[serde(default)]
  pub due_date:       Option<String>,
  #[serde(default)]
  pub priority:       Option<String>,
  #[serde(default)]
  pub status:         Option<String>,
  #[serde(default)]
  pub has_attachment: Option<bool>,
  #[serde(default)]
  pub attachments:    Option<Vec<AttachmentDto>>,
  #[serde(default)]
  pub details:        Option<String>,
  #[serde(default)]
  pub date_created:   Option<String>,
  #[serde(default)]
  pub date_completed: Option<String>,
  #[serde(default, alias = "subTasks")]
  pub subtasks:       Option<Vec<SubtaskDto>>
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct SubtaskDto {
  pub id:     u64,
  #[serde(default)]
  pub title:  String,
  pub status: String
}

#[derive(
  Debug,
  Clone,
  Serialize,
  Deserialize,
  PartialEq,
  Eq,
)]
pub struct AttachmentDto {
  #[serde(default)]
  pub name: String,
  #[serde(default)]
  pub size: u64,
  #[serde(default, rename = "type")]
  pub content_type: String
}

/// Task fields as sent on create; the gateway assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskInput {
  pub title:          String,
  pub due_date:       NaiveDate,
  pub priority:       Priority,
  pub status:         Status,
  /// Set when the gateway reported a file even if none are listed.
  pub has_attachment: bool,
  pub attachments:    Vec<Attachment>,
  pub details:        String,
  pub date_created:   NaiveDate,
  pub date_completed: Option<NaiveDate>,
  pub subtasks:       Vec<Subtask>
}

impl TaskInput {
  pub fn into_task(self, id: u64) -> Task {
    Task {
      id,
      title: self.title,
      due_date: self.due_date,
      priority: self.priority,
      status: self.status,
      has_attachment: self.has_attachment
        || !self.attachments.is_empty(),
      attachments: self.attachments,
      details: self.details,
      date_created: self.date_created,
      date_completed: self.date_completed,
      subtasks: self.subtasks
    }
  }
}

impl Task {
  pub fn to_input(&self) -> TaskInput {
    TaskInput {
      title:          self.title.clone(),
      due_date:       self.due_date,
      priority:       self.priority.clone(),
      status:         self.status,
      has_attachment: self.has_attachment,
      attachments:    self.attachments.clone(),
      details:        self.details.clone(),
      date_created:   self.date_created,
      date_completed: self.date_completed,
      subtasks:       self.subtasks.clone()
    }
  }
}

impl From<&TaskInput> for TaskDto {
  fn from(input: &TaskInput) -> Self {
    Self {
      id:             None,
      title:          Some(input.title.clone()),
      due_date:       Some(input.due_date.to_string()),
      priority:       Some(input.priority.as_str().to_string()),
      status:         Some(input.status.as_str().to_string()),
      has_attachment: Some(
        input.has_attachment || !input.attachments.is_empty()
      ),
      attachments:    Some(
        input.attachments.iter().map(AttachmentDto::from).collect()
      ),
      details:        Some(input.details.clone()),
      date_created:   Some(input.date_created.to_string()),
      date_completed: input
        .date_completed
        .map(|d| d.to_string()),
      subtasks:       Some(
        input.subtasks.iter().map(SubtaskDto::from).collect()
      )
    }
  }
}

impl From<&Task> for TaskDto {
  fn from(task: &Task) -> Self {
    let mut dto = TaskDto::from(&task.to_input());
    dto.id = Some(task.id);
    dto.has_attachment = Some(task.shows_attachment());
    dto
  }
}

impl From<&Subtask> for SubtaskDto {
  fn from(subtask: &Subtask) -> Self {
    Self {
      id:     subtask.id,
      title:  subtask.title.clone(),
      status: subtask.status.as_str().to_string()
    }
  }
}

impl From<&Attachment> for AttachmentDto {
  fn from(attachment: &Attachment) -> Self {
    Self {
      name:         attachment.name.clone(),
      size:         attachment.size_bytes,
      content_type: attachment.content_type.clone()
    }
  }
}

impl TaskDto {
  /// Validate and normalise one task from the gateway.
  pub fn into_task(self) -> Result<Task, ClientError> {
    let id = self.id.ok_or_else(|| {
      ClientError::InvalidTask("task without id".to_string())
    })?;
    let invalid = |what: String| {
      ClientError::InvalidTask(format!("task {id}: {what}"))
    };

    let title = self
      .title
      .ok_or_else(|| invalid("missing title".to_string()))?;

    let due_date = required_date(self.due_date.as_deref())
      .ok_or_else(|| invalid(format!("bad dueDate {:?}", self.due_date)))?;
    let date_created = required_date(self.date_created.as_deref())
      .ok_or_else(|| {
        invalid(format!("bad dateCreated {:?}", self.date_created))
      })?;

    let status_raw = self.status.unwrap_or_default();
    let status = Status::parse(&status_raw)
      .ok_or_else(|| invalid(format!("unknown status {status_raw:?}")))?;

    let priority = Priority::parse(self.priority.as_deref().unwrap_or(""));
    if let Priority::Unrecognized(raw) = &priority {
      warn!(id, priority = %raw, "unrecognized task priority; ranking it below low");
    }

    let mut date_completed = match self.date_completed.as_deref() {
      | Some(raw) if !raw.trim().is_empty() => Some(
        parse_wire_date(raw)
          .ok_or_else(|| invalid(format!("bad dateCompleted {raw:?}")))?
      ),
      | _ => None
    };
    if status != Status::Complete && date_completed.is_some() {
      warn!(id, status = %status, "dropping dateCompleted on a task that is not complete");
      date_completed = None;
    }

    let mut seen = BTreeSet::new();
    let mut subtasks = Vec::new();
    for dto in self.subtasks.unwrap_or_default() {
      if !seen.insert(dto.id) {
        return Err(invalid(format!("duplicate subtask id {}", dto.id)));
      }
      let status = SubtaskStatus::parse(&dto.status).ok_or_else(|| {
        invalid(format!(
          "subtask {} has unknown status {:?}",
          dto.id, dto.status
        ))
      })?;
      subtasks.push(Subtask {
        id: dto.id,
        title: dto.title,
        status
      });
    }

    let attachments: Vec<Attachment> = self
      .attachments
      .unwrap_or_default()
      .into_iter()
      .map(|a| Attachment {
        name:         a.name,
        size_bytes:   a.size,
        content_type: a.content_type
      })
      .collect();
    let has_attachment =
      self.has_attachment.unwrap_or(false) || !attachments.is_empty();

    Ok(Task {
      id,
      title,
      due_date,
      priority,
      status,
      attachments,
      has_attachment,
      details: self.details.unwrap_or_default(),
      date_created,
      date_completed,
      subtasks
    })
  }
}

fn required_date(raw: Option<&str>) -> Option<NaiveDate> {
  raw.and_then(parse_wire_date)
}

/// Decode a `GET /tasks` listing. Rows are decoded one at a time: malformed
/// or invalid entries and repeated ids are skipped with a warning so one bad
/// row cannot hide the whole list.
pub fn decode_task_list(
  rows: Vec<serde_json::Value>
) -> Vec<Task> {
  let total = rows.len();
  let mut seen = BTreeSet::new();
  let mut tasks = Vec::with_capacity(total);

  for row in rows {
    let dto = match serde_json::from_value::<TaskDto>(row) {
      | Ok(dto) => dto,
      | Err(err) => {
        warn!(error = %err, "skipping malformed task from gateway");
        continue;
      }
    };
    match dto.into_task() {
      | Ok(task) => {
        if seen.insert(task.id) {
          tasks.push(task);
        } else {
          warn!(id = task.id, "duplicate task id in listing; keeping first");
        }
      }
      | Err(err) => {
        warn!(error = %err, "skipping invalid task from gateway");
      }
    }
  }

  debug!(total, kept = tasks.len(), "decoded task listing");
  tasks
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
  pub username: String,
  pub password: String
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
  pub token:    String,
  #[serde(default)]
  pub username: Option<String>
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserDto {
  pub username: String,
  #[serde(flatten)]
  pub extra:    BTreeMap<String, serde_json::Value>
}
