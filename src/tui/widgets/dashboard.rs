use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph},
    Frame,
};

use super::{mastery_bar, state_color, truncate};
use crate::srs::DueStatus;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(10), // Stats + due queue row
            Constraint::Min(0),     // Weakest concepts
        ])
        .split(area);

    let top_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(chunks[0]);

    draw_stats(f, app, top_chunks[0]);
    draw_due(f, app, top_chunks[1]);
    draw_weakest(f, app, chunks[1]);
}

fn stat_line(label: &str, value: String, color: Color) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{}: ", label), Style::default().fg(Color::Gray)),
        Span::styled(value, Style::default().fg(color)),
    ])
}

fn draw_stats(f: &mut Frame, app: &App, area: Rect) {
    let stats = &app.stats;

    let text = vec![
        Line::from(vec![
            Span::styled("Concepts: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", stats.total_concepts),
                Style::default()
                    .fg(Color::White)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(" ({} questions)", stats.total_questions),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::styled(format!("{} new ", stats.new), Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} learning ", stats.learning),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                format!("{} reviewing ", stats.reviewing),
                Style::default().fg(Color::Cyan),
            ),
            Span::styled(
                format!("{} mastered", stats.mastered),
                Style::default().fg(Color::Green),
            ),
        ]),
        stat_line(
            "Due",
            format!("{} ({} overdue)", stats.due_now, stats.overdue),
            if stats.overdue > 0 {
                Color::Red
            } else if stats.due_now > 0 {
                Color::Yellow
            } else {
                Color::White
            },
        ),
        stat_line(
            "Attempts",
            format!("{} ({:.0}% correct)", stats.total_attempts, stats.accuracy()),
            Color::White,
        ),
        stat_line("Sessions", stats.sessions.to_string(), Color::White),
        stat_line(
            "Avg Mastery",
            format!("{:.1}/100", stats.avg_mastery),
            Color::Cyan,
        ),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Stats ")
        .title_style(Style::default().fg(Color::Cyan));

    let paragraph = Paragraph::new(text).block(block);
    f.render_widget(paragraph, area);
}

fn draw_due(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .due
        .iter()
        .enumerate()
        .map(|(i, entry)| {
            let (status, color) = match entry.status {
                DueStatus::Overdue => ("overdue", Color::Red),
                DueStatus::Due => ("due    ", Color::Yellow),
                DueStatus::New => ("new    ", Color::Gray),
                DueStatus::NotDue => ("later  ", Color::DarkGray),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("{}. ", i + 1), Style::default().fg(Color::DarkGray)),
                Span::styled(status, Style::default().fg(color)),
                Span::raw(" "),
                Span::styled(
                    format!("{:<20}", truncate(&entry.item.concept.term, 20)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(
                    truncate(&entry.item.concept.translation, 20),
                    Style::default().fg(Color::DarkGray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Due Queue ")
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        let paragraph = Paragraph::new("Nothing due. Come back later!")
            .style(Style::default().fg(Color::Green))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}

fn draw_weakest(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .weakest
        .iter()
        .map(|entry| {
            let p = &entry.item.progress;
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<22}", truncate(&entry.item.concept.term, 20)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(mastery_bar(p.mastery_level), Style::default().fg(Color::Green)),
                Span::styled(
                    format!(" {:>3.0}% ", p.success_rate()),
                    Style::default().fg(Color::Yellow),
                ),
                Span::styled(
                    format!("{:<10}", p.state.label()),
                    Style::default().fg(state_color(p.state)),
                ),
                Span::styled(
                    format!("weakness {:.2}", entry.weakness),
                    Style::default().fg(Color::Red),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Weakest Concepts ")
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("No practice history yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}
