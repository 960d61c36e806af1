use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Persisted shelf entry for a previously opened document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookRecord {
    pub id: String,
    pub path: String,
    pub display_name: String,
    pub added_at: DateTime<Utc>,
}

/// A heading detected in a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub line_index: usize,
}

/// The document currently loaded into the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenBook {
    pub id: String,
    pub path: String,
    pub display_name: String,
    pub lines: Vec<String>,
    pub chapters: Vec<Chapter>,
    pub cursor_line: usize,
    pub total_lines: usize,
}

impl OpenBook {
    pub fn last_line(&self) -> usize {
        self.total_lines.saturating_sub(1)
    }

    pub fn clamp_line(&self, line: usize) -> usize {
        line.min(self.last_line())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub line: usize,
    pub last_read: DateTime<Utc>,
}

pub type ReadingProgress = BTreeMap<String, ProgressEntry>;

/// Reading-time counters, in seconds.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Statistics {
    pub today_seconds: u64,
    pub total_seconds: u64,
    pub per_book_seconds: BTreeMap<String, u64>,
    pub last_read_date: Option<NaiveDate>,
}

impl Statistics {
    pub fn book_seconds(&self, book_id: &str) -> u64 {
        self.per_book_seconds.get(book_id).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub line_index: usize,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Bounds {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Bounds {
    /// Inclusive on all four edges.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x <= self.x + self.width
            && point.y >= self.y
            && point.y <= self.y + self.height
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WindowType {
    Reader,
    Help,
    Toc,
    Library,
    Search,
    Statistics,
}

impl Default for WindowType {
    fn default() -> Self {
        WindowType::Reader
    }
}
