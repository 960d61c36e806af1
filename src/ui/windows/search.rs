use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::Line,
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use super::{scale, scroll_offset};
use crate::models::SearchHit;

pub struct SearchWindow;

impl SearchWindow {
    pub fn render(frame: &mut Frame, area: Rect, query: &str, results: &[SearchHit], selected_index: usize) {
        let popup_area = Rect::new(
            area.x + area.width / 8,
            area.y + area.height / 6,
            scale(area.width, 3, 4),
            scale(area.height, 2, 3),
        );

        frame.render_widget(Clear, popup_area);

        let title = if results.is_empty() {
            "Search".to_string()
        } else {
            format!("Search ({} matches)", results.len())
        };
        let header = Paragraph::new(Line::from(format!("/{}", query)))
            .block(Block::default().title(title).borders(Borders::ALL))
            .style(Style::default().add_modifier(Modifier::BOLD));

        let header_area = Rect::new(popup_area.x, popup_area.y, popup_area.width, 3.min(popup_area.height));
        frame.render_widget(header, header_area);

        let list_area = Rect::new(
            popup_area.x,
            popup_area.y + header_area.height,
            popup_area.width,
            popup_area.height.saturating_sub(header_area.height),
        );

        if results.is_empty() {
            let empty = Paragraph::new("Type a keyword and press Enter")
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(empty, list_area);
            return;
        }

        let visible_rows = list_area.height.saturating_sub(2) as usize;
        let offset = scroll_offset(selected_index, visible_rows);

        let items: Vec<ListItem> = results
            .iter()
            .enumerate()
            .skip(offset)
            .map(|(i, hit)| {
                let style = if i == selected_index {
                    Style::default().bg(Color::Blue).fg(Color::White)
                } else {
                    Style::default()
                };
                let entry = format!("{:>6}  {}", hit.line_index + 1, hit.text.trim());
                ListItem::new(Line::from(entry)).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().borders(Borders::ALL));

        frame.render_widget(list, list_area);
    }
}
