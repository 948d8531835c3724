use std::io::{self, IsTerminal, Write};

use chrono::NaiveDate;
use unicode_width::UnicodeWidthStr;

use crate::account::PasswordCheck;
use crate::config::Config;
use crate::datetime::{format_long, format_short};
use crate::deletion::DeletionReport;
use crate::task::Task;
use crate::view::Row;

pub const EMPTY_LIST: &str = "No tasks available";
pub const TASK_NOT_FOUND: &str = "Task not found";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
    today: NaiveDate,
}

impl Renderer {
    pub fn new(cfg: &Config, today: NaiveDate) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
            today,
        }
    }

    /// No escape codes, for pipes and tests.
    pub fn plain(today: NaiveDate) -> Self {
        Self {
            color: false,
            today,
        }
    }

    #[tracing::instrument(skip_all, fields(rows = rows.len()))]
    pub fn write_task_table<W: Write>(&self, out: &mut W, rows: &[Row<'_>]) -> anyhow::Result<()> {
        if rows.is_empty() {
            writeln!(out, "{EMPTY_LIST}")?;
            return Ok(());
        }

        let headers = ["ID", "Title", "Due", "Priority", "Status", "Files"];
        let mut table = Vec::with_capacity(rows.len());

        for row in rows {
            match row {
                Row::Task {
                    task,
                    expandable,
                    expanded,
                    ..
                } => {
                    let marker = match (*expandable, *expanded) {
                        (false, _) => "  ",
                        (true, false) => "▸ ",
                        (true, true) => "▾ ",
                    };
                    let due = format_short(task.due_date);
                    let due = if task.is_overdue(self.today) {
                        self.paint(&due, "31")
                    } else {
                        due
                    };
                    let files = if task.shows_attachment() {
                        task.attachments.len().max(1).to_string()
                    } else {
                        String::new()
                    };
                    table.push(vec![
                        self.paint(&task.id.to_string(), "33"),
                        format!("{marker}{}", task.title),
                        due,
                        task.priority.to_string(),
                        task.status.to_string(),
                        files,
                    ]);
                }
                Row::Subtask { subtask, .. } => {
                    table.push(vec![
                        String::new(),
                        format!("    {}. {}", subtask.id, subtask.title),
                        String::new(),
                        String::new(),
                        subtask.status.to_string(),
                        String::new(),
                    ]);
                }
            }
        }

        write_table(out, &headers, table)
    }

    #[tracing::instrument(skip_all, fields(id = task.id))]
    pub fn write_task_details<W: Write>(&self, out: &mut W, task: &Task) -> anyhow::Result<()> {
        let due = format_long(task.due_date);
        let due = if task.is_overdue(self.today) {
            self.paint(&format!("{due} (overdue)"), "31")
        } else {
            due
        };

        writeln!(out, "{}", self.paint(&task.title, "1"))?;
        writeln!(out, "id         {}", task.id)?;
        writeln!(out, "due        {due}")?;
        writeln!(out, "priority   {}", task.priority)?;
        writeln!(out, "status     {}", task.status)?;
        writeln!(out, "created    {}", format_long(task.date_created))?;
        if let Some(done) = task.date_completed {
            writeln!(out, "completed  {}", format_long(done))?;
        }
        if !task.details.is_empty() {
            writeln!(out, "details    {}", task.details)?;
        }

        if !task.attachments.is_empty() {
            writeln!(out, "attachments")?;
            for attachment in &task.attachments {
                writeln!(
                    out,
                    "  {} ({}, {})",
                    attachment.name,
                    attachment.content_type,
                    human_size(attachment.size_bytes)
                )?;
            }
        } else if task.has_attachment {
            writeln!(out, "attachments  (not listed)")?;
        }

        if !task.subtasks.is_empty() {
            writeln!(out, "subtasks")?;
            for subtask in &task.subtasks {
                writeln!(out, "  {}. [{}] {}", subtask.id, subtask.status, subtask.title)?;
            }
        }

        Ok(())
    }

    pub fn write_password_check<W: Write>(&self, out: &mut W, check: &PasswordCheck) -> anyhow::Result<()> {
        let mark = |ok: bool| {
            if ok {
                self.paint("✓", "32")
            } else {
                self.paint("✗", "31")
            }
        };
        writeln!(out, "{} at least 8 characters", mark(check.min_length))?;
        writeln!(out, "{} contains a number or symbol", mark(check.number_or_symbol))?;
        writeln!(out, "{} does not contain the username", mark(check.excludes_username))?;
        writeln!(out, "strength: {}", check.strength)?;
        Ok(())
    }

    pub fn write_deletion_report<W: Write>(&self, out: &mut W, report: &DeletionReport) -> anyhow::Result<()> {
        writeln!(out, "Deleted {} task(s).", report.deleted.len())?;
        for (id, err) in &report.failed {
            writeln!(out, "{}", self.paint(&format!("Could not delete task {id}: {err}"), "31"))?;
        }
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn human_size(bytes: u64) -> String {
    const KIB: u64 = 1024;
    const MIB: u64 = KIB * 1024;
    if bytes >= MIB {
        format!("{:.1} MB", bytes as f64 / MIB as f64)
    } else if bytes >= KIB {
        format!("{:.1} KB", bytes as f64 / KIB as f64)
    } else {
        format!("{bytes} B")
    }
}

fn write_table<W: Write>(writer: &mut W, headers: &[&str], rows: Vec<Vec<String>>) -> anyhow::Result<()> {
    let mut widths: Vec<usize> = headers.iter().map(|h| UnicodeWidthStr::width(*h)).collect();

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let line = |writer: &mut W, cells: Vec<(String, usize)>| -> io::Result<()> {
        let mut text = String::new();
        for (cell, visible) in cells {
            text.push_str(&cell);
            text.push_str(&" ".repeat(visible + 1));
        }
        writeln!(writer, "{}", text.trim_end())
    };

    line(
        &mut *writer,
        headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| (h.to_string(), w - UnicodeWidthStr::width(*h)))
            .collect(),
    )?;
    line(&mut *writer, widths.iter().map(|w| ("-".repeat(*w), 0)).collect())?;

    for row in rows {
        let cells = row
            .into_iter()
            .zip(&widths)
            .map(|(cell, w)| {
                let visible = UnicodeWidthStr::width(strip_ansi(&cell).as_str());
                (cell, w.saturating_sub(visible))
            })
            .collect();
        line(&mut *writer, cells)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
