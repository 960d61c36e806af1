pub mod help;
pub mod library;
pub mod search;
pub mod statistics;
pub mod toc;

use ratatui::layout::Rect;

/// `len * numerator / denominator`, widened so large terminals cannot overflow.
pub fn scale(len: u16, numerator: u16, denominator: u16) -> u16 {
    let scaled = u32::from(len) * u32::from(numerator) / u32::from(denominator.max(1));
    u16::try_from(scaled).unwrap_or(len)
}

/// Compute a centered popup area within the given area.
pub fn centered_popup_area(area: Rect, width_percent: u16, height_percent: u16) -> Rect {
    let width = scale(area.width, width_percent.min(100), 100);
    let height = scale(area.height, height_percent.min(100), 100);
    let x = area.x + (area.width - width) / 2;
    let y = area.y + (area.height - height) / 2;

    Rect::new(x, y, width, height)
}

/// Keep the selected row on screen in a list of `visible_rows` rows.
pub fn scroll_offset(selected: usize, visible_rows: usize) -> usize {
    if visible_rows == 0 {
        return selected;
    }
    selected.saturating_sub(visible_rows - 1)
}
