use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Lines of text the overlay shows at once.
    pub display_lines: usize,
    /// Window opacity, 0 to 100.
    pub opacity: u8,
    pub always_on_top: bool,
    pub auto_hide_on_mouse_leave: bool,
    pub click_to_next_page: bool,
    pub auto_scroll: bool,
    /// Seconds between automatic page turns.
    pub auto_scroll_interval: u64,
    pub window_width: u16,
    pub window_height: u16,
}

impl Settings {
    pub fn merge(&mut self, other: Self) {
        self.display_lines = other.display_lines.max(1);
        self.opacity = other.opacity.min(100);
        self.always_on_top = other.always_on_top;
        self.auto_hide_on_mouse_leave = other.auto_hide_on_mouse_leave;
        self.click_to_next_page = other.click_to_next_page;
        self.auto_scroll = other.auto_scroll;
        self.auto_scroll_interval = other.auto_scroll_interval.max(1);
        self.window_width = other.window_width;
        self.window_height = other.window_height;
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            display_lines: 2,
            opacity: 90,
            always_on_top: true,
            auto_hide_on_mouse_leave: true,
            click_to_next_page: true,
            auto_scroll: false,
            auto_scroll_interval: 5,
            window_width: 600,
            window_height: 80,
        }
    }
}

/// A single settings change, applied through `Config::update_setting`.
#[derive(Debug, Clone, PartialEq)]
pub enum SettingChange {
    DisplayLines(usize),
    Opacity(u8),
    AlwaysOnTop(bool),
    AutoHideOnMouseLeave(bool),
    ClickToNextPage(bool),
    AutoScroll(bool),
    AutoScrollInterval(u64),
}

impl SettingChange {
    pub fn apply(&self, settings: &mut Settings) {
        match *self {
            SettingChange::DisplayLines(lines) => settings.display_lines = lines.max(1),
            SettingChange::Opacity(percent) => settings.opacity = percent.min(100),
            SettingChange::AlwaysOnTop(on_top) => settings.always_on_top = on_top,
            SettingChange::AutoHideOnMouseLeave(enabled) => {
                settings.auto_hide_on_mouse_leave = enabled
            }
            SettingChange::ClickToNextPage(enabled) => settings.click_to_next_page = enabled,
            SettingChange::AutoScroll(enabled) => settings.auto_scroll = enabled,
            SettingChange::AutoScrollInterval(secs) => settings.auto_scroll_interval = secs.max(1),
        }
    }
}
