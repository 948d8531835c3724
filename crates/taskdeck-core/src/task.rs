use std::fmt;

use chrono::NaiveDate;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Priority {
    Low,
    High,
    Critical,
    /// Value the gateway sent that is none of the known priorities.
    Unrecognized(String),
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::High, Priority::Critical];

    /// Case-insensitive; anything unknown is kept as `Unrecognized`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Unrecognized(raw.trim().to_string()),
        }
    }

    /// Strict parse for user input.
    pub fn parse_known(raw: &str) -> Option<Self> {
        match Self::parse(raw) {
            Self::Unrecognized(_) => None,
            known => Some(known),
        }
    }

    /// Position in `[low, high, critical]`, -1 for unrecognized values.
    pub fn rank(&self) -> i32 {
        match self {
            Self::Low => 0,
            Self::High => 1,
            Self::Critical => 2,
            Self::Unrecognized(_) => -1,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Low => "low",
            Self::High => "high",
            Self::Critical => "critical",
            Self::Unrecognized(raw) => raw.as_str(),
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    NotStarted,
    InProgress,
    Complete,
    Cancelled,
}

impl Status {
    pub const ALL: [Status; 4] = [
        Status::NotStarted,
        Status::InProgress,
        Status::Complete,
        Status::Cancelled,
    ];

    /// Accepts any casing and `-`, `_` or space as the word separator.
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "not started" => Some(Self::NotStarted),
            "in progress" => Some(Self::InProgress),
            "complete" | "completed" => Some(Self::Complete),
            "cancelled" | "canceled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
            Self::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtaskStatus {
    NotStarted,
    InProgress,
    Complete,
}

impl SubtaskStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match normalize_label(raw).as_str() {
            "not started" => Some(Self::NotStarted),
            "in progress" => Some(Self::InProgress),
            "complete" | "completed" => Some(Self::Complete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Complete => "complete",
        }
    }
}

impl fmt::Display for SubtaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn normalize_label(raw: &str) -> String {
    raw.trim()
        .to_ascii_lowercase()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subtask {
    /// Unique within the parent task only.
    pub id: u64,
    pub title: String,
    pub status: SubtaskStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attachment {
    pub name: String,
    pub size_bytes: u64,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: u64,
    pub title: String,
    pub due_date: NaiveDate,
    pub priority: Priority,
    pub status: Status,
    pub attachments: Vec<Attachment>,
    /// Set by the gateway even when it does not ship the attachment list.
    pub has_attachment: bool,
    pub details: String,
    pub date_created: NaiveDate,
    /// Only ever `Some` while `status == Complete`.
    pub date_completed: Option<NaiveDate>,
    pub subtasks: Vec<Subtask>,
}

impl Task {
    pub fn new(id: u64, title: impl Into<String>, due_date: NaiveDate, today: NaiveDate) -> Self {
        Self {
            id,
            title: title.into(),
            due_date,
            priority: Priority::High,
            status: Status::NotStarted,
            attachments: vec![],
            has_attachment: false,
            details: String::new(),
            date_created: today,
            date_completed: None,
            subtasks: vec![],
        }
    }

    pub fn shows_attachment(&self) -> bool {
        self.has_attachment || !self.attachments.is_empty()
    }

    pub fn has_subtasks(&self) -> bool {
        !self.subtasks.is_empty()
    }

    pub fn is_overdue(&self, today: NaiveDate) -> bool {
        self.due_date < today && self.status != Status::Complete
    }
}
