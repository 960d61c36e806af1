use ratatui::{
    Frame,
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph},
};

use super::{centered_popup_area, scroll_offset};
use crate::models::Chapter;

pub struct TocWindow;

impl TocWindow {
    pub fn render(
        frame: &mut Frame,
        area: Rect,
        chapters: &[Chapter],
        selected_index: usize,
        current_index: Option<usize>,
    ) {
        let popup_area = centered_popup_area(area, 50, 80);

        frame.render_widget(Clear, popup_area);

        if chapters.is_empty() {
            let empty_text = vec![
                Line::from("No chapters detected"),
                Line::from(""),
                Line::from(Span::styled(
                    "Press any key to close",
                    Style::default().add_modifier(Modifier::ITALIC),
                )),
            ];

            let paragraph = Paragraph::new(empty_text)
                .style(Style::default().fg(Color::DarkGray))
                .block(Block::default().title("Chapters").borders(Borders::ALL));

            frame.render_widget(paragraph, popup_area);
            return;
        }

        let visible_rows = popup_area.height.saturating_sub(2) as usize;
        let offset = scroll_offset(selected_index, visible_rows);

        let items: Vec<ListItem> = chapters
            .iter()
            .enumerate()
            .skip(offset)
            .map(|(i, chapter)| {
                let style = if i == selected_index {
                    Style::default().bg(Color::Blue).fg(Color::White)
                } else if Some(i) == current_index {
                    Style::default().add_modifier(Modifier::BOLD)
                } else {
                    Style::default()
                };

                ListItem::new(Line::from(chapter.title.clone())).style(style)
            })
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Chapters").borders(Borders::ALL));

        frame.render_widget(list, popup_area);
    }
}
