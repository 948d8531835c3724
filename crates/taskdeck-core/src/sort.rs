use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;

use crate::task::Task;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Title,
    DueDate,
    Priority,
    Status,
}

impl FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
            "title" => Ok(Self::Title),
            "due" | "duedate" => Ok(Self::DueDate),
            "priority" => Ok(Self::Priority),
            "status" => Ok(Self::Status),
            other => Err(anyhow!(
                "unknown sort key: {other} (expected title, due, priority or status)"
            )),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Title => "title",
            Self::DueDate => "due",
            Self::Priority => "priority",
            Self::Status => "status",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl FromStr for SortDirection {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "asc" | "ascending" => Ok(Self::Asc),
            "desc" | "descending" => Ok(Self::Desc),
            other => Err(anyhow!("unknown sort direction: {other} (expected asc or desc)")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SortConfig {
    pub key: SortKey,
    pub direction: SortDirection,
}

impl SortConfig {
    pub fn new(key: SortKey, direction: SortDirection) -> Self {
        Self { key, direction }
    }

    /// Column-header click: the active key flips asc → desc, anything else
    /// starts ascending.
    pub fn toggle(&mut self, key: SortKey) {
        self.direction = if self.key == key && self.direction == SortDirection::Asc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
        self.key = key;
    }

    pub fn compare(&self, a: &Task, b: &Task) -> Ordering {
        let ordering = compare_by_key(self.key, a, b);
        match self.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        }
    }

    /// Stable sort; ties keep their incoming order in both directions.
    pub fn sort(&self, tasks: &mut [&Task]) {
        tasks.sort_by(|a, b| self.compare(a, b));
    }
}

pub fn compare_by_key(key: SortKey, a: &Task, b: &Task) -> Ordering {
    match key {
        SortKey::Title => locale_compare(&a.title, &b.title),
        SortKey::DueDate => a.due_date.cmp(&b.due_date),
        SortKey::Priority => a.priority.rank().cmp(&b.priority.rank()),
        SortKey::Status => a.status.as_str().cmp(b.status.as_str()),
    }
}

/// Dictionary order: letters compare case-insensitively first, then
/// lowercase sorts before uppercase, then raw code points break ties.
pub fn locale_compare(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| {
            a.chars()
                .zip(b.chars())
                .map(|(x, y)| case_rank(x).cmp(&case_rank(y)))
                .find(|o| o.is_ne())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.cmp(b))
}

fn case_rank(c: char) -> u8 {
    if c.is_uppercase() { 1 } else { 0 }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::task::{Priority, Status};

    fn task(id: u64, title: &str, due: (i32, u32, u32), priority: Priority, status: Status) -> Task {
        let due = NaiveDate::from_ymd_opt(due.0, due.1, due.2).unwrap();
        let mut task = Task::new(id, title, due, due);
        task.priority = priority;
        task.status = status;
        task
    }

    fn order(tasks: &[Task], config: SortConfig) -> Vec<u64> {
        let mut refs: Vec<&Task> = tasks.iter().collect();
        config.sort(&mut refs);
        refs.iter().map(|t| t.id).collect()
    }

    fn pair() -> Vec<Task> {
        vec![
            task(1, "B", (2025, 3, 1), Priority::Low, Status::Complete),
            task(2, "A", (2025, 3, 5), Priority::High, Status::NotStarted),
        ]
    }

    #[test]
    fn title_and_priority_scenario() {
        let tasks = pair();
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Title, SortDirection::Asc)), vec![2, 1]);
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Priority, SortDirection::Desc)), vec![2, 1]);
        assert_eq!(order(&tasks, SortConfig::new(SortKey::DueDate, SortDirection::Asc)), vec![1, 2]);
    }

    #[test]
    fn status_sorts_by_plain_string() {
        let tasks = vec![
            task(1, "a", (2025, 1, 1), Priority::Low, Status::NotStarted),
            task(2, "b", (2025, 1, 1), Priority::Low, Status::Cancelled),
            task(3, "c", (2025, 1, 1), Priority::Low, Status::InProgress),
            task(4, "d", (2025, 1, 1), Priority::Low, Status::Complete),
        ];
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Status, SortDirection::Asc)), vec![2, 4, 3, 1]);
    }

    #[test]
    fn unrecognized_priority_sorts_first() {
        let tasks = vec![
            task(1, "a", (2025, 1, 1), Priority::Critical, Status::NotStarted),
            task(2, "b", (2025, 1, 1), Priority::Low, Status::NotStarted),
            task(3, "c", (2025, 1, 1), Priority::Unrecognized("urgent".into()), Status::NotStarted),
        ];
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Priority, SortDirection::Asc)), vec![3, 2, 1]);
    }

    #[test]
    fn ties_keep_prior_order_in_both_directions() {
        let tasks = vec![
            task(1, "a", (2025, 1, 1), Priority::High, Status::NotStarted),
            task(2, "b", (2025, 1, 2), Priority::Low, Status::NotStarted),
            task(3, "c", (2025, 1, 3), Priority::High, Status::NotStarted),
            task(4, "d", (2025, 1, 4), Priority::Low, Status::NotStarted),
        ];
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Priority, SortDirection::Asc)), vec![2, 4, 1, 3]);
        assert_eq!(order(&tasks, SortConfig::new(SortKey::Priority, SortDirection::Desc)), vec![1, 3, 2, 4]);
    }

    #[test]
    fn desc_reverses_distinct_keys_and_sorting_is_idempotent() {
        let tasks = vec![
            task(1, "delta", (2025, 1, 4), Priority::Low, Status::NotStarted),
            task(2, "alpha", (2025, 1, 1), Priority::Low, Status::NotStarted),
            task(3, "Charlie", (2025, 1, 3), Priority::Low, Status::NotStarted),
            task(4, "bravo", (2025, 1, 2), Priority::Low, Status::NotStarted),
        ];
        let asc = SortConfig::new(SortKey::Title, SortDirection::Asc);
        let desc = SortConfig::new(SortKey::Title, SortDirection::Desc);

        let once = order(&tasks, asc);
        assert_eq!(once, vec![2, 4, 3, 1]);

        let mut refs: Vec<&Task> = tasks.iter().collect();
        asc.sort(&mut refs);
        asc.sort(&mut refs);
        assert_eq!(refs.iter().map(|t| t.id).collect::<Vec<_>>(), once);

        let mut reversed = order(&tasks, desc);
        reversed.reverse();
        assert_eq!(reversed, once);
    }

    #[test]
    fn locale_compare_orders_case_like_a_dictionary() {
        assert_eq!(locale_compare("apple", "Banana"), Ordering::Less);
        assert_eq!(locale_compare("a", "A"), Ordering::Less);
        assert_eq!(locale_compare("Same", "Same"), Ordering::Equal);
    }

    #[test]
    fn header_toggle_semantics() {
        let mut config = SortConfig::default();
        assert_eq!(config, SortConfig::new(SortKey::Title, SortDirection::Asc));
        config.toggle(SortKey::Title);
        assert_eq!(config.direction, SortDirection::Desc);
        config.toggle(SortKey::Title);
        assert_eq!(config.direction, SortDirection::Asc);
        config.toggle(SortKey::Title);
        config.toggle(SortKey::DueDate);
        assert_eq!(config, SortConfig::new(SortKey::DueDate, SortDirection::Asc));
    }

    #[test]
    fn parses_cli_spellings() {
        assert_eq!("due-date".parse::<SortKey>().unwrap(), SortKey::DueDate);
        assert_eq!("dueDate".parse::<SortKey>().unwrap(), SortKey::DueDate);
        assert_eq!("DESC".parse::<SortDirection>().unwrap(), SortDirection::Desc);
        assert!("size".parse::<SortKey>().is_err());
    }
}
