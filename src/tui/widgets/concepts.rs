use ratatui::{
    layout::Rect,
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph},
    Frame,
};

use super::{format_date, mastery_bar, state_color, truncate};
use crate::srs::DueStatus;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let title = match &app.filter_course {
        Some(course) => format!(" Concepts (course: {}) ", course),
        None => " Concepts ".to_string(),
    };

    let items: Vec<ListItem> = app
        .concepts
        .items
        .iter()
        .map(|c| {
            let p = &c.progress;
            let status = app.calc.due_status(p, app.now);
            let (next_color, next_text) = match (status, &p.next_review) {
                (DueStatus::New, _) | (_, None) => (Color::DarkGray, "-".to_string()),
                (DueStatus::Overdue, Some(next)) => (Color::Red, format!("{} !", format_date(next))),
                (DueStatus::Due, Some(next)) => (Color::Yellow, format_date(next)),
                (DueStatus::NotDue, Some(next)) => (Color::White, format_date(next)),
            };
            let course = app.course_title(c.concept.course_id).unwrap_or("-");

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<20}", truncate(&c.concept.term, 18)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    format!("{:<20}", truncate(&c.concept.translation, 18)),
                    Style::default().fg(Color::Gray),
                ),
                Span::styled(mastery_bar(p.mastery_level), Style::default().fg(Color::Green)),
                Span::styled(
                    format!(" {:<10}", p.state.label()),
                    Style::default().fg(state_color(p.state)),
                ),
                Span::styled(format!("{:<10}", next_text), Style::default().fg(next_color)),
                Span::styled(truncate(course, 16), Style::default().fg(Color::DarkGray)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(title)
        .title_style(Style::default().fg(Color::Cyan));

    let bold_gray = Style::default()
        .fg(Color::DarkGray)
        .add_modifier(Modifier::BOLD);
    let header = Line::from(vec![
        Span::styled(format!("{:<20}", "Term"), bold_gray),
        Span::styled(format!("{:<20}", "Translation"), bold_gray),
        Span::styled(format!("{:<11}", "Mastery"), bold_gray),
        Span::styled(format!("{:<10}", "State"), bold_gray),
        Span::styled(format!("{:<10}", "Next"), bold_gray),
        Span::styled("Course", bold_gray),
    ]);

    let list = List::new(items)
        .block(block)
        .highlight_style(
            Style::default()
                .bg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        )
        .highlight_symbol("> ");

    let mut state = ListState::default();
    state.select(app.concepts.selected);

    // Header sits on the first row inside the border
    let header_area = Rect {
        x: area.x + 3,
        y: area.y + 1,
        width: area.width.saturating_sub(4),
        height: 1,
    };
    f.render_widget(Paragraph::new(header), header_area);

    let list_area = Rect {
        x: area.x,
        y: area.y + 1,
        width: area.width,
        height: area.height.saturating_sub(1),
    };

    f.render_stateful_widget(list, list_area, &mut state);
}
