use ratatui::{
    Frame,
    layout::Rect,
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph},
};

use super::centered_popup_area;
use crate::models::{OpenBook, Statistics};
use crate::statistics::format_reading_time;

pub struct StatisticsWindow;

impl StatisticsWindow {
    pub fn render(frame: &mut Frame, area: Rect, stats: &Statistics, book: Option<&OpenBook>) {
        let popup_area = centered_popup_area(area, 50, 50);

        frame.render_widget(Clear, popup_area);

        let mut content = vec![
            Line::from(Span::styled(
                "Reading Time",
                Style::default().add_modifier(Modifier::BOLD),
            )),
            Line::from(""),
            Line::from(format!("Today: {}", format_reading_time(stats.today_seconds))),
            Line::from(format!("Total: {}", format_reading_time(stats.total_seconds))),
        ];

        if let Some(book) = book {
            content.push(Line::from(format!(
                "{}: {}",
                book.display_name,
                format_reading_time(stats.book_seconds(&book.id))
            )));
        }

        content.push(Line::from(""));
        content.push(Line::from(Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::ITALIC),
        )));

        let paragraph = Paragraph::new(content)
            .block(Block::default().title("Statistics").borders(Borders::ALL));

        frame.render_widget(paragraph, popup_area);
    }
}
