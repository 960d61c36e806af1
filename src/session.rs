use eyre::Result;
use sha1::{Digest, Sha1};
use std::rc::Rc;

use crate::clock::Clock;
use crate::models::{BookRecord, OpenBook, ProgressEntry, ReadingProgress, SearchHit, Statistics};
use crate::segmenter::{parse_chapters, split_lines};
use crate::source::{FileSource, OpenedFile};
use crate::statistics::TimeAccumulator;
use crate::store::{BOOKS_KEY, PROGRESS_KEY, SharedPersistence};

/// Canonical form of a document path, falling back to the path as given.
pub fn normalize_path(path: &str) -> String {
    if path.is_empty() {
        return path.to_string();
    }

    match std::fs::canonicalize(path) {
        Ok(canonical) => canonical.to_string_lossy().to_string(),
        Err(err) => {
            log::debug!("Could not canonicalize path {}: {}", path, err);
            path.to_string()
        }
    }
}

/// Stable identifier of a book: hex SHA-1 of its normalized path.
pub fn book_id(path: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(normalize_path(path).as_bytes());
    hex::encode(hasher.finalize())
}

/// The shelf, saved progress and the currently open document.
pub struct ReadingSession {
    books: Vec<BookRecord>,
    progress: ReadingProgress,
    current: Option<OpenBook>,
    timer: TimeAccumulator,
    clock: Rc<dyn Clock>,
    persistence: SharedPersistence,
}

impl ReadingSession {
    pub fn new(clock: Rc<dyn Clock>, persistence: SharedPersistence) -> Self {
        let timer = TimeAccumulator::new(clock.clone(), persistence.clone());
        Self {
            books: Vec::new(),
            progress: ReadingProgress::new(),
            current: None,
            timer,
            clock,
            persistence,
        }
    }

    /// Load the shelf, saved positions and reading statistics.
    pub fn load(&mut self) {
        {
            let persistence = self.persistence.borrow();
            if let Some(books) = persistence.load::<Vec<BookRecord>>(BOOKS_KEY) {
                self.books = books;
            }
            if let Some(progress) = persistence.load::<ReadingProgress>(PROGRESS_KEY) {
                self.progress = progress;
            }
        }
        self.timer.load();
    }

    pub fn books(&self) -> &[BookRecord] {
        &self.books
    }

    pub fn progress_for(&self, book_id: &str) -> Option<&ProgressEntry> {
        self.progress.get(book_id)
    }

    /// The shelf entry read most recently.
    pub fn last_read_book(&self) -> Option<&BookRecord> {
        self.books
            .iter()
            .filter_map(|book| self.progress.get(&book.id).map(|entry| (book, entry.last_read)))
            .max_by_key(|(_, last_read)| *last_read)
            .map(|(book, _)| book)
    }

    pub fn current(&self) -> Option<&OpenBook> {
        self.current.as_ref()
    }

    pub fn statistics(&self) -> &Statistics {
        self.timer.statistics()
    }

    pub fn timer(&self) -> &TimeAccumulator {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut TimeAccumulator {
        &mut self.timer
    }

    /// Ask `source` for a document and open it. Returns `false` if the user cancelled.
    pub fn open(&mut self, source: &mut dyn FileSource) -> Result<bool> {
        match source.open_file()? {
            Some(file) => {
                self.open_document(file);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn open_document(&mut self, file: OpenedFile) {
        let path = normalize_path(&file.path);
        let id = book_id(&path);
        let display_name = if file.display_name.is_empty() {
            "Unknown".to_string()
        } else {
            file.display_name
        };

        let lines = split_lines(&file.content);
        let chapters = parse_chapters(&lines);
        let total_lines = lines.len();

        if !self.books.iter().any(|book| book.id == id) {
            self.books.push(BookRecord {
                id: id.clone(),
                path: path.clone(),
                display_name: display_name.clone(),
                added_at: self.clock.now(),
            });
        }

        let saved_line = self.progress.get(&id).map(|entry| entry.line).unwrap_or(0);
        let cursor_line = saved_line.min(total_lines.saturating_sub(1));

        log::info!(
            "opened {} ({} lines, {} chapters, line {})",
            display_name,
            total_lines,
            chapters.len(),
            cursor_line
        );

        self.current = Some(OpenBook {
            id: id.clone(),
            path,
            display_name,
            lines,
            chapters,
            cursor_line,
            total_lines,
        });

        self.timer.start(&id);
        self.persistence.borrow_mut().submit(BOOKS_KEY, &self.books);
        // Opening counts as reading, so the shelf's last-read order sees it.
        self.save_progress();
    }

    pub fn next_page(&mut self, line_count: usize) {
        if let Some(book) = self.current.as_ref() {
            let line = book.cursor_line.saturating_add(line_count);
            self.set_cursor(line);
        }
    }

    pub fn prev_page(&mut self, line_count: usize) {
        if let Some(book) = self.current.as_ref() {
            let line = book.cursor_line.saturating_sub(line_count);
            self.set_cursor(line);
        }
    }

    pub fn go_to_line(&mut self, line: usize) {
        self.set_cursor(line);
    }

    /// Out-of-range indices leave the cursor where it is.
    pub fn go_to_chapter(&mut self, index: usize) {
        let target = self
            .current
            .as_ref()
            .and_then(|book| book.chapters.get(index))
            .map(|chapter| chapter.line_index);
        if let Some(line) = target {
            self.go_to_line(line);
        }
    }

    /// Case-insensitive substring search over every line, in order.
    pub fn search(&self, keyword: &str) -> Vec<SearchHit> {
        let Some(book) = self.current.as_ref() else {
            return Vec::new();
        };
        if keyword.is_empty() {
            return Vec::new();
        }

        let needle = keyword.to_lowercase();
        book.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.to_lowercase().contains(&needle))
            .map(|(line_index, line)| SearchHit {
                line_index,
                text: line.clone(),
            })
            .collect()
    }

    pub fn close(&mut self) {
        self.timer.stop();
        if let Some(book) = self.current.take() {
            log::info!("closed {}", book.display_name);
        }
    }

    /// Up to `count` lines starting at the cursor.
    pub fn visible_lines(&self, count: usize) -> &[String] {
        match self.current.as_ref() {
            Some(book) => {
                let start = book.cursor_line.min(book.lines.len());
                let end = start.saturating_add(count).min(book.lines.len());
                &book.lines[start..end]
            }
            None => &[],
        }
    }

    pub fn progress_percent(&self) -> u8 {
        match self.current.as_ref() {
            Some(book) if book.total_lines > 0 => {
                ((book.cursor_line as f64 / book.total_lines as f64) * 100.0).round() as u8
            }
            _ => 0,
        }
    }

    /// Index of the chapter containing the cursor.
    pub fn current_chapter_index(&self) -> Option<usize> {
        let book = self.current.as_ref()?;
        book.chapters
            .iter()
            .rposition(|chapter| chapter.line_index <= book.cursor_line)
    }

    pub fn pause_timer(&mut self) {
        self.timer.pause();
    }

    pub fn resume_timer(&mut self) {
        self.timer.resume();
    }

    /// Run due reading-time ticks.
    pub fn advance(&mut self) {
        self.timer.advance();
    }

    fn set_cursor(&mut self, line: usize) {
        let Some(book) = self.current.as_mut() else {
            return;
        };
        book.cursor_line = book.clamp_line(line);
        self.save_progress();
    }

    fn save_progress(&mut self) {
        let Some(book) = self.current.as_ref() else {
            return;
        };
        self.progress.insert(
            book.id.clone(),
            ProgressEntry {
                line: book.cursor_line,
                last_read: self.clock.now(),
            },
        );
        self.persistence.borrow_mut().submit(PROGRESS_KEY, &self.progress);
    }
}
