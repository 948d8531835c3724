//! Create/edit form state for a single task.

use chrono::NaiveDate;
use tracing::{debug, instrument};

use crate::task::{Attachment, Priority, Status, Subtask, SubtaskStatus, Task};
use crate::wire::TaskInput;

/// Largest attachment the form accepts.
pub const MAX_ATTACHMENT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("title is required")]
    MissingTitle,
    #[error("due date is required")]
    MissingDueDate,
    #[error("no subtask with id {0}")]
    UnknownSubtask(u64),
    #[error("no attachment named {0}")]
    UnknownAttachment(String),
    #[error("attachment {name} rejected: {reason}")]
    RejectedAttachment { name: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDraft {
    pub title: String,
    pub due_date: Option<NaiveDate>,
    pub priority: Priority,
    pub status: Status,
    pub details: String,
    pub date_created: NaiveDate,
    pub date_completed: Option<NaiveDate>,
    subtasks: Vec<Subtask>,
    attachments: Vec<Attachment>,
    has_attachment: bool,
    subtask_counter: u64,
}

impl TaskDraft {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            title: String::new(),
            due_date: None,
            priority: Priority::High,
            status: Status::NotStarted,
            details: String::new(),
            date_created: today,
            date_completed: None,
            subtasks: vec![],
            attachments: vec![],
            has_attachment: false,
            subtask_counter: 0,
        }
    }

    /// Prefill from an existing task. New subtask ids continue after the
    /// highest existing one. An attachment flag the gateway reported without
    /// a list is kept.
    pub fn from_task(task: &Task) -> Self {
        let highest = task.subtasks.iter().map(|s| s.id).max().unwrap_or(0);
        Self {
            title: task.title.clone(),
            due_date: Some(task.due_date),
            priority: task.priority.clone(),
            status: task.status,
            details: task.details.clone(),
            date_created: task.date_created,
            date_completed: task.date_completed,
            subtasks: task.subtasks.clone(),
            attachments: task.attachments.clone(),
            has_attachment: task.has_attachment,
            subtask_counter: highest.max(task.subtasks.len() as u64),
        }
    }

    pub fn subtasks(&self) -> &[Subtask] {
        &self.subtasks
    }

    pub fn attachments(&self) -> &[Attachment] {
        &self.attachments
    }

    pub fn shows_attachment(&self) -> bool {
        self.has_attachment || !self.attachments.is_empty()
    }

    /// Append a placeholder subtask and return its id.
    pub fn add_subtask(&mut self) -> u64 {
        self.subtask_counter += 1;
        let id = self.subtask_counter;
        self.subtasks.push(Subtask {
            id,
            title: format!("Subtask {id}"),
            status: SubtaskStatus::NotStarted,
        });
        debug!(id, "subtask added");
        id
    }

    pub fn remove_subtask(&mut self, id: u64) -> Result<Subtask, DraftError> {
        let idx = self
            .subtasks
            .iter()
            .position(|s| s.id == id)
            .ok_or(DraftError::UnknownSubtask(id))?;
        Ok(self.subtasks.remove(idx))
    }

    pub fn rename_subtask(&mut self, id: u64, title: impl Into<String>) -> Result<(), DraftError> {
        self.subtask_mut(id)?.title = title.into();
        Ok(())
    }

    pub fn set_subtask_status(&mut self, id: u64, status: SubtaskStatus) -> Result<(), DraftError> {
        self.subtask_mut(id)?.status = status;
        Ok(())
    }

    fn subtask_mut(&mut self, id: u64) -> Result<&mut Subtask, DraftError> {
        self.subtasks
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or(DraftError::UnknownSubtask(id))
    }

    /// Images up to [`MAX_ATTACHMENT_BYTES`] only.
    #[instrument(skip(self, attachment), fields(name = %attachment.name))]
    pub fn add_attachment(&mut self, attachment: Attachment) -> Result<(), DraftError> {
        if !attachment.content_type.starts_with("image/") {
            return Err(DraftError::RejectedAttachment {
                reason: format!("{} is not an image", attachment.content_type),
                name: attachment.name,
            });
        }
        if attachment.size_bytes > MAX_ATTACHMENT_BYTES {
            return Err(DraftError::RejectedAttachment {
                reason: format!("{} bytes exceeds the 10 MB limit", attachment.size_bytes),
                name: attachment.name,
            });
        }
        self.attachments.push(attachment);
        Ok(())
    }

    pub fn remove_attachment(&mut self, name: &str) -> Result<Attachment, DraftError> {
        let idx = self
            .attachments
            .iter()
            .position(|a| a.name == name)
            .ok_or_else(|| DraftError::UnknownAttachment(name.to_string()))?;
        let removed = self.attachments.remove(idx);
        // Detaching the last listed file clears the flag too.
        if self.attachments.is_empty() {
            self.has_attachment = false;
        }
        Ok(removed)
    }

    /// Validate and build the request body. A complete task without a
    /// completion date gets `today`; any other status drops it.
    pub fn into_input(self, today: NaiveDate) -> Result<TaskInput, DraftError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(DraftError::MissingTitle);
        }
        let due_date = self.due_date.ok_or(DraftError::MissingDueDate)?;
        let date_completed = match self.status {
            Status::Complete => Some(self.date_completed.unwrap_or(today)),
            _ => None,
        };
        Ok(TaskInput {
            title,
            due_date,
            priority: self.priority,
            status: self.status,
            has_attachment: self.has_attachment,
            attachments: self.attachments,
            details: self.details,
            date_created: self.date_created,
            date_completed,
            subtasks: self.subtasks,
        })
    }
}
