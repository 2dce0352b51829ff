use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::new_id;

/// A major event or to-do line in a diary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiaryItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl DiaryItem {
    pub fn new(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            text,
            completed: false,
            created_at: now,
        }
    }
}

/// Something finished during the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedItem {
    pub id: String,
    pub text: String,
    pub completed_at: DateTime<Utc>,
}

impl CompletedItem {
    pub fn new(text: String, now: DateTime<Utc>) -> Self {
        Self {
            id: new_id(),
            text,
            completed_at: now,
        }
    }
}

/// One calendar date's journal entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diary {
    #[serde(default)]
    pub major_events: Vec<DiaryItem>,
    #[serde(default)]
    pub todos: Vec<DiaryItem>,
    #[serde(default)]
    pub completed: Vec<CompletedItem>,
    #[serde(default)]
    pub reflection: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Diary {
    pub fn empty(now: DateTime<Utc>) -> Self {
        Self {
            major_events: Vec::new(),
            todos: Vec::new(),
            completed: Vec::new(),
            reflection: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.major_events.is_empty()
            && self.todos.is_empty()
            && self.completed.is_empty()
            && self.reflection.is_empty()
    }

    /// Tick off the to-do whose id starts with `id_prefix` and log it as
    /// completed. Returns the new completed record, or `None` when no open
    /// to-do matches.
    pub fn complete_todo(&mut self, id_prefix: &str, now: DateTime<Utc>) -> Option<&CompletedItem> {
        let todo = self
            .todos
            .iter_mut()
            .find(|t| !t.completed && t.id.starts_with(id_prefix))?;
        todo.completed = true;
        self.completed.push(CompletedItem::new(todo.text.clone(), now));
        self.completed.last()
    }

    /// All searchable text, space separated.
    pub fn search_text(&self) -> String {
        self.major_events
            .iter()
            .map(|e| e.text.as_str())
            .chain(self.todos.iter().map(|t| t.text.as_str()))
            .chain(self.completed.iter().map(|c| c.text.as_str()))
            .chain(std::iter::once(self.reflection.as_str()))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
