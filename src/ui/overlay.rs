use std::io;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
};
use eyre::Result;
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, Paragraph},
};

use crate::clock::{Clock, IntervalTimer};
use crate::config::Config;
use crate::models::{Bounds, Point, SearchHit, WindowType};
use crate::session::ReadingSession;
use crate::settings::SettingChange;
use crate::source::{FileSource, FsSource};
use crate::store::SharedPersistence;
use crate::ui::windows::{
    help::HelpWindow, library::LibraryWindow, search::SearchWindow,
    statistics::StatisticsWindow, toc::TocWindow,
};
use crate::visibility::{VisibilityController, WindowHost};

/// Terminal columns per configured window pixel width.
const PIXELS_PER_COLUMN: u16 = 8;
const MIN_STRIP_COLUMNS: u16 = 20;
const IDLE_POLL: Duration = Duration::from_secs(1);
const OPACITY_STEP: u8 = 10;

/// The reading strip drawn at the top of the terminal, seen as a window.
#[derive(Debug, Clone)]
pub struct TerminalWindow {
    visible: bool,
    bounds: Bounds,
    cursor: Point,
    opacity: u8,
    always_on_top: bool,
}

impl TerminalWindow {
    pub fn new() -> Self {
        Self {
            visible: true,
            bounds: Bounds::default(),
            cursor: Point { x: -1, y: -1 },
            opacity: 100,
            always_on_top: true,
        }
    }

    /// Cell rectangle to inclusive bounds: the last column and row are `width - 1`
    /// and `height - 1` away from the origin.
    pub fn set_bounds(&mut self, area: Rect) {
        self.bounds = Bounds {
            x: area.x as i32,
            y: area.y as i32,
            width: area.width.saturating_sub(1) as i32,
            height: area.height.saturating_sub(1) as i32,
        };
    }

    pub fn set_cursor(&mut self, column: u16, row: u16) {
        self.cursor = Point {
            x: column as i32,
            y: row as i32,
        };
    }

    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    pub fn always_on_top(&self) -> bool {
        self.always_on_top
    }
}

impl Default for TerminalWindow {
    fn default() -> Self {
        Self::new()
    }
}

impl WindowHost for TerminalWindow {
    fn show(&mut self) {
        self.visible = true;
    }

    fn hide(&mut self) {
        self.visible = false;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }

    fn bounds(&self) -> Bounds {
        self.bounds
    }

    fn set_opacity(&mut self, percent: u8) {
        self.opacity = percent.min(100);
    }

    fn set_always_on_top(&mut self, on_top: bool) {
        self.always_on_top = on_top;
    }

    fn cursor_position(&self) -> Point {
        self.cursor
    }
}

#[derive(Debug, Clone, Default)]
pub struct UiState {
    pub active_window: WindowType,
    pub toc_selected: usize,
    pub search_query: String,
    pub search_results: Vec<SearchHit>,
    pub search_selected: usize,
    pub library_selected: usize,
    pub message: Option<String>,
    pub should_quit: bool,
    pub auto_hide_paused: bool,
    pointer_seen: bool,
}

/// The overlay application: reading session, auto-hide and popups on one loop.
pub struct Overlay {
    config: Config,
    persistence: SharedPersistence,
    session: ReadingSession,
    visibility: VisibilityController<TerminalWindow>,
    auto_scroll: IntervalTimer,
    clock: Rc<dyn Clock>,
    ui: UiState,
}

impl Overlay {
    pub fn new(mut config: Config, persistence: SharedPersistence, clock: Rc<dyn Clock>) -> Self {
        config.load_settings(&persistence.borrow());

        let mut session = ReadingSession::new(clock.clone(), persistence.clone());
        session.load();

        let mut visibility = VisibilityController::new(TerminalWindow::new(), clock.clone());
        // Until the terminal reports a pointer position there is nothing to compare against.
        visibility.set_paused_external(true);
        config.apply_to_window(&mut visibility);

        let auto_scroll =
            IntervalTimer::new(Duration::from_secs(config.settings.auto_scroll_interval));

        Self {
            config,
            persistence,
            session,
            visibility,
            auto_scroll,
            clock,
            ui: UiState::default(),
        }
    }

    pub fn session(&self) -> &ReadingSession {
        &self.session
    }

    pub fn visibility(&self) -> &VisibilityController<TerminalWindow> {
        &self.visibility
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn is_auto_scrolling(&self) -> bool {
        self.auto_scroll.is_running()
    }

    pub fn open(&mut self, source: &mut dyn FileSource) -> Result<bool> {
        let opened = self.session.open(source)?;
        if opened {
            self.ui.toc_selected = 0;
            self.ui.search_results.clear();
            self.ui.search_selected = 0;
            self.ui.message = None;
            self.restart_auto_scroll();
        }
        Ok(opened)
    }

    pub fn open_path(&mut self, path: &Path) -> Result<bool> {
        self.open(&mut FsSource::new(path))
    }

    /// Reopen the most recently read book if its file is still there.
    pub fn open_last_read(&mut self) -> Result<bool> {
        let Some(path) = self.session.last_read_book().map(|book| book.path.clone()) else {
            return Ok(false);
        };
        if !Path::new(&path).exists() {
            log::info!("last read book {} is gone", path);
            return Ok(false);
        }
        self.open_path(Path::new(&path))
    }

    pub fn close_book(&mut self) {
        self.session.close();
        self.auto_scroll.cancel();
    }

    /// Run whatever periodic work is due and hand queued writes to the store.
    pub fn advance(&mut self) {
        self.visibility.advance();
        self.session.advance();

        let due = self.auto_scroll.due_ticks(self.clock.elapsed());
        for _ in 0..due {
            self.session.next_page(self.config.settings.display_lines);
        }

        self.persistence.borrow_mut().flush();
    }

    /// How long the host loop may sleep before the next periodic task is due.
    pub fn next_timeout(&self) -> Duration {
        let now = self.clock.elapsed();
        [
            self.visibility.time_until_poll(),
            self.session.timer().time_until_tick(),
            self.auto_scroll.time_until_due(now),
        ]
        .into_iter()
        .flatten()
        .min()
        .unwrap_or(IDLE_POLL)
        .min(IDLE_POLL)
    }

    pub fn shutdown(&mut self) {
        self.close_book();
        self.visibility.dispose();
        self.persistence.borrow_mut().flush();
    }

    pub fn handle_event(&mut self, event: Event) {
        match event {
            Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key),
            Event::Mouse(mouse) => self.handle_mouse(mouse),
            Event::FocusLost => self.session.pause_timer(),
            Event::FocusGained => self.session.resume_timer(),
            _ => {}
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
            self.ui.should_quit = true;
            return;
        }

        match self.ui.active_window {
            WindowType::Reader => self.handle_reader_key(key),
            WindowType::Toc => self.handle_toc_key(key),
            WindowType::Search => self.handle_search_key(key),
            WindowType::Library => self.handle_library_key(key),
            WindowType::Statistics | WindowType::Help => self.close_window(),
        }
    }

    pub fn handle_mouse(&mut self, mouse: MouseEvent) {
        self.visibility.host_mut().set_cursor(mouse.column, mouse.row);
        if !self.ui.pointer_seen {
            self.ui.pointer_seen = true;
            self.sync_paused();
        }

        if self.ui.active_window != WindowType::Reader {
            return;
        }

        let page = self.config.settings.display_lines;
        match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => {
                let inside = self
                    .visibility
                    .host()
                    .bounds()
                    .contains(self.visibility.host().cursor_position());
                if inside && self.config.settings.click_to_next_page {
                    self.session.next_page(page);
                }
            }
            MouseEventKind::ScrollDown => self.session.next_page(1),
            MouseEventKind::ScrollUp => self.session.prev_page(1),
            _ => {}
        }
    }

    fn handle_reader_key(&mut self, key: KeyEvent) {
        self.ui.message = None;
        let page = self.config.settings.display_lines;

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => self.ui.should_quit = true,
            KeyCode::Char('j') | KeyCode::Down => self.session.next_page(1),
            KeyCode::Char('k') | KeyCode::Up => self.session.prev_page(1),
            KeyCode::Char('l') | KeyCode::Char(' ') | KeyCode::Right | KeyCode::PageDown => {
                self.session.next_page(page)
            }
            KeyCode::Char('h') | KeyCode::Left | KeyCode::PageUp | KeyCode::Backspace => {
                self.session.prev_page(page)
            }
            KeyCode::Char(']') => self.next_chapter(),
            KeyCode::Char('[') => self.prev_chapter(),
            KeyCode::Char('g') | KeyCode::Home => self.session.go_to_line(0),
            KeyCode::Char('G') | KeyCode::End => self.session.go_to_line(usize::MAX),
            KeyCode::Char('t') => {
                if self.session.current().is_some() {
                    self.ui.toc_selected = self.session.current_chapter_index().unwrap_or(0);
                    self.open_window(WindowType::Toc);
                }
            }
            KeyCode::Char('/') => {
                if self.session.current().is_some() {
                    self.ui.search_query.clear();
                    self.ui.search_results.clear();
                    self.ui.search_selected = 0;
                    self.open_window(WindowType::Search);
                }
            }
            KeyCode::Char('r') => {
                self.ui.library_selected = 0;
                self.open_window(WindowType::Library);
            }
            KeyCode::Char('s') => self.open_window(WindowType::Statistics),
            KeyCode::Char('?') => self.open_window(WindowType::Help),
            KeyCode::Char('c') => self.close_book(),
            KeyCode::Char('p') => {
                self.ui.auto_hide_paused = !self.ui.auto_hide_paused;
                self.sync_paused();
                self.ui.message = Some(if self.ui.auto_hide_paused {
                    "Auto-hide paused".to_string()
                } else {
                    "Auto-hide resumed".to_string()
                });
            }
            KeyCode::Char('m') => {
                let enabled = !self.config.settings.auto_hide_on_mouse_leave;
                self.update_setting(SettingChange::AutoHideOnMouseLeave(enabled));
            }
            KeyCode::Char('+') | KeyCode::Char('=') => {
                let opacity = self.config.settings.opacity.saturating_add(OPACITY_STEP);
                self.update_setting(SettingChange::Opacity(opacity));
            }
            KeyCode::Char('-') => {
                let opacity = self.config.settings.opacity.saturating_sub(OPACITY_STEP);
                self.update_setting(SettingChange::Opacity(opacity));
            }
            KeyCode::Char('a') => {
                let enabled = !self.config.settings.auto_scroll;
                self.update_setting(SettingChange::AutoScroll(enabled));
                self.restart_auto_scroll();
            }
            _ => {}
        }
    }

    fn handle_toc_key(&mut self, key: KeyEvent) {
        let count = self
            .session
            .current()
            .map(|book| book.chapters.len())
            .unwrap_or(0);
        if count == 0 {
            self.close_window();
            return;
        }

        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.ui.toc_selected = (self.ui.toc_selected + 1).min(count - 1);
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.ui.toc_selected = self.ui.toc_selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                self.session.go_to_chapter(self.ui.toc_selected);
                self.close_window();
            }
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('t') => self.close_window(),
            _ => {}
        }
    }

    fn handle_search_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Esc => {
                self.ui.search_results.clear();
                self.close_window();
            }
            KeyCode::Enter => {
                if self.ui.search_results.is_empty() {
                    self.ui.search_results = self.session.search(&self.ui.search_query);
                    self.ui.search_selected = 0;
                    if self.ui.search_results.is_empty() {
                        self.ui.message = Some(format!("No matches for '{}'", self.ui.search_query));
                        self.close_window();
                    }
                } else if let Some(hit) = self.ui.search_results.get(self.ui.search_selected) {
                    let line = hit.line_index;
                    self.session.go_to_line(line);
                    self.close_window();
                }
            }
            KeyCode::Down => {
                if !self.ui.search_results.is_empty() {
                    self.ui.search_selected =
                        (self.ui.search_selected + 1).min(self.ui.search_results.len() - 1);
                }
            }
            KeyCode::Up => {
                self.ui.search_selected = self.ui.search_selected.saturating_sub(1);
            }
            KeyCode::Backspace => {
                self.ui.search_query.pop();
                self.ui.search_results.clear();
            }
            KeyCode::Char(c) => {
                self.ui.search_query.push(c);
                self.ui.search_results.clear();
            }
            _ => {}
        }
    }

    fn handle_library_key(&mut self, key: KeyEvent) {
        let count = self.session.books().len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if count > 0 {
                    self.ui.library_selected = (self.ui.library_selected + 1).min(count - 1);
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.ui.library_selected = self.ui.library_selected.saturating_sub(1);
            }
            KeyCode::Enter => {
                let path = self
                    .session
                    .books()
                    .get(self.ui.library_selected)
                    .map(|book| book.path.clone());
                self.close_window();
                if let Some(path) = path {
                    if let Err(err) = self.open_path(Path::new(&path)) {
                        log::warn!("could not open {}: {}", path, err);
                        self.ui.message = Some(format!("Could not open {}", path));
                    }
                }
            }
            KeyCode::Esc | KeyCode::Char('q') | KeyCode::Char('r') => self.close_window(),
            _ => {}
        }
    }

    fn next_chapter(&mut self) {
        let target = self
            .session
            .current_chapter_index()
            .map_or(0, |index| index + 1);
        self.session.go_to_chapter(target);
    }

    fn prev_chapter(&mut self) {
        if let Some(index) = self.session.current_chapter_index() {
            self.session.go_to_chapter(index.saturating_sub(1));
        }
    }

    fn open_window(&mut self, window: WindowType) {
        self.ui.active_window = window;
        self.visibility.set_menu_open(true);
        self.visibility.show();
    }

    fn close_window(&mut self) {
        self.ui.active_window = WindowType::Reader;
        self.visibility.set_menu_open(false);
    }

    fn sync_paused(&mut self) {
        let paused = !self.ui.pointer_seen || self.ui.auto_hide_paused;
        self.visibility.set_paused_external(paused);
    }

    fn update_setting(&mut self, change: SettingChange) {
        let mut persistence = self.persistence.borrow_mut();
        self.config
            .update_setting(change, &mut persistence, &mut self.visibility);
    }

    fn restart_auto_scroll(&mut self) {
        self.auto_scroll = IntervalTimer::new(Duration::from_secs(
            self.config.settings.auto_scroll_interval,
        ));
        if self.config.settings.auto_scroll && self.session.current().is_some() {
            self.auto_scroll.start(self.clock.elapsed());
        }
    }

    /// The reading strip: `display_lines` rows plus a border, at the top left.
    pub fn strip_area(&self, area: Rect) -> Rect {
        let settings = &self.config.settings;
        let width = (settings.window_width / PIXELS_PER_COLUMN)
            .max(MIN_STRIP_COLUMNS)
            .min(area.width);
        let rows = u16::try_from(settings.display_lines).unwrap_or(u16::MAX);
        let height = rows.saturating_add(2).min(area.height);
        Rect::new(area.x, area.y, width, height)
    }

    pub fn render(&mut self, frame: &mut Frame) {
        let area = frame.area();
        let strip = self.strip_area(area);
        self.visibility.host_mut().set_bounds(strip);

        if self.visibility.host().is_visible() {
            self.render_strip(frame, strip);
        } else {
            frame.render_widget(Clear, strip);
        }

        match self.ui.active_window {
            WindowType::Reader => {}
            WindowType::Toc => {
                if let Some(book) = self.session.current() {
                    TocWindow::render(
                        frame,
                        area,
                        &book.chapters,
                        self.ui.toc_selected,
                        self.session.current_chapter_index(),
                    );
                }
            }
            WindowType::Search => SearchWindow::render(
                frame,
                area,
                &self.ui.search_query,
                &self.ui.search_results,
                self.ui.search_selected,
            ),
            WindowType::Library => {
                LibraryWindow::render(frame, area, self.session.books(), self.ui.library_selected)
            }
            WindowType::Statistics => StatisticsWindow::render(
                frame,
                area,
                self.session.statistics(),
                self.session.current(),
            ),
            WindowType::Help => HelpWindow::render(frame, area),
        }
    }

    fn render_strip(&self, frame: &mut Frame, strip: Rect) {
        let title = match (&self.ui.message, self.session.current()) {
            (Some(message), _) => message.clone(),
            (None, Some(book)) => format!("{} {}%", book.display_name, self.session.progress_percent()),
            (None, None) => "glance".to_string(),
        };

        let lines: Vec<Line> = if self.session.current().is_some() {
            self.session
                .visible_lines(self.config.settings.display_lines)
                .iter()
                .map(|line| Line::from(line.as_str()))
                .collect()
        } else {
            vec![Line::from("No book open. Press r for the library, ? for help.")]
        };

        let mut style = Style::default();
        if self.visibility.host().opacity() < 60 {
            style = style.add_modifier(Modifier::DIM);
        }
        if self.ui.auto_hide_paused {
            style = style.fg(Color::Yellow);
        }

        let paragraph = Paragraph::new(lines)
            .style(style)
            .block(Block::default().title(title).borders(Borders::ALL));

        frame.render_widget(Clear, strip);
        frame.render_widget(paragraph, strip);
    }

    /// Run the terminal loop until the user quits.
    pub fn run(&mut self) -> Result<()> {
        let backend = CrosstermBackend::new(io::stdout());
        let mut terminal = Terminal::new(backend)?;

        crossterm::terminal::enable_raw_mode()?;
        crossterm::execute!(
            io::stdout(),
            crossterm::terminal::EnterAlternateScreen,
            crossterm::event::EnableMouseCapture,
            crossterm::event::EnableFocusChange
        )?;

        terminal.clear()?;
        terminal.hide_cursor()?;

        let result = self.event_loop(&mut terminal);

        self.shutdown();

        terminal.clear()?;
        terminal.show_cursor()?;
        crossterm::execute!(
            io::stdout(),
            crossterm::event::DisableFocusChange,
            crossterm::event::DisableMouseCapture,
            crossterm::terminal::LeaveAlternateScreen
        )?;
        crossterm::terminal::disable_raw_mode()?;

        result
    }

    fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<io::Stdout>>) -> Result<()> {
        while !self.ui.should_quit {
            terminal.draw(|frame| self.render(frame))?;

            if crossterm::event::poll(self.next_timeout())? {
                let event = crossterm::event::read()?;
                self.handle_event(event);
            }

            self.advance();
        }
        Ok(())
    }
}
