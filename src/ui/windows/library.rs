use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Style},
    text::Line,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use super::{scale, scroll_offset};
use crate::models::BookRecord;

pub struct LibraryWindow;

impl LibraryWindow {
    pub fn render(frame: &mut Frame, area: Rect, books: &[BookRecord], selected_index: usize) {
        let popup_area = Rect::new(
            area.x + area.width / 8,
            area.y + area.height / 8,
            scale(area.width, 3, 4),
            scale(area.height, 3, 4),
        );

        frame.render_widget(Clear, popup_area);

        if books.is_empty() {
            let paragraph = Paragraph::new("No books yet. Start glance with a file to add one.")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Library").borders(Borders::ALL));
            frame.render_widget(paragraph, popup_area);
            return;
        }

        let visible_rows = popup_area.height.saturating_sub(2) as usize;
        let offset = scroll_offset(selected_index, visible_rows);

        let items: Vec<ListItem> = books
            .iter()
            .enumerate()
            .skip(offset)
            .map(|(i, book)| {
                let style = if i == selected_index {
                    Style::default().bg(Color::Blue).fg(Color::White)
                } else {
                    Style::default()
                };
                let entry = format!(
                    "{}  {}",
                    book.added_at.format("%Y-%m-%d"),
                    book.display_name
                );
                ListItem::new(Line::from(entry)).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Library").borders(Borders::ALL));

        frame.render_widget(list, popup_area);
    }
}
