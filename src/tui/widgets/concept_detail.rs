use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, List, ListItem, Paragraph, Wrap},
    Frame,
};

use super::{format_date, mastery_bar, state_color, truncate};
use crate::models::ConceptWithProgress;
use crate::srs::format_interval;
use crate::tui::App;

pub fn draw(f: &mut Frame, app: &App, area: Rect) {
    let Some(item) = &app.selected_concept else {
        let block = Block::default()
            .borders(Borders::ALL)
            .title(" Concept Detail ");
        let paragraph = Paragraph::new("No concept selected").block(block);
        f.render_widget(paragraph, area);
        return;
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(5), // Header
            Constraint::Length(6), // Progress
            Constraint::Length(7), // Questions
            Constraint::Min(0),    // Attempts
        ])
        .split(area);

    draw_header(f, app, item, chunks[0]);
    draw_progress(f, app, item, chunks[1]);
    draw_questions(f, app, chunks[2]);
    draw_attempts(f, app, chunks[3]);
}

fn draw_header(f: &mut Frame, app: &App, item: &ConceptWithProgress, area: Rect) {
    let c = &item.concept;
    let text = vec![
        Line::from(vec![
            Span::styled("Translation: ", Style::default().fg(Color::Gray)),
            Span::styled(c.translation.as_str(), Style::default().fg(Color::White)),
            Span::raw("  "),
            Span::styled("Kind: ", Style::default().fg(Color::Gray)),
            Span::styled(c.kind.label(), Style::default().fg(Color::Cyan)),
            Span::raw("  "),
            Span::styled("Course: ", Style::default().fg(Color::Gray)),
            Span::styled(
                app.course_title(c.course_id).unwrap_or("-"),
                Style::default().fg(Color::Cyan),
            ),
        ]),
        Line::from(vec![
            Span::styled("Notes: ", Style::default().fg(Color::Gray)),
            Span::styled(
                c.notes.as_deref().unwrap_or("-"),
                Style::default().fg(Color::White),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", c.term))
        .title_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let paragraph = Paragraph::new(text).block(block).wrap(Wrap { trim: true });
    f.render_widget(paragraph, area);
}

fn draw_progress(f: &mut Frame, app: &App, item: &ConceptWithProgress, area: Rect) {
    let p = &item.progress;
    let success_rate = p.success_rate();
    let status = app.calc.due_status(p, app.now);
    let [again, hard, good, easy] = app.calc.preview(p, app.now);

    let next_review = p
        .next_review_at()
        .map(|dt| dt.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "Not scheduled".to_string());

    let text = vec![
        Line::from(vec![
            Span::styled("Mastery: ", Style::default().fg(Color::Gray)),
            Span::styled(mastery_bar(p.mastery_level), Style::default().fg(Color::Green)),
            Span::styled(
                format!(" {:.0}/100  ", p.mastery_level),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled("State: ", Style::default().fg(Color::Gray)),
            Span::styled(p.state.label(), Style::default().fg(state_color(p.state))),
            Span::styled(
                format!(" ({})", status.as_str()),
                Style::default().fg(Color::DarkGray),
            ),
        ]),
        Line::from(vec![
            Span::styled("Practiced: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{}", p.times_practiced),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Success: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{} ({:.0}%)", p.times_correct, success_rate),
                Style::default().fg(if success_rate >= 70.0 {
                    Color::Green
                } else if success_rate >= 50.0 {
                    Color::Yellow
                } else {
                    Color::Red
                }),
            ),
            Span::raw("  "),
            Span::styled("Lapses: ", Style::default().fg(Color::Gray)),
            Span::styled(format!("{}", p.lapses), Style::default().fg(Color::Red)),
        ]),
        Line::from(vec![
            Span::styled("Ease: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("{:.2}", p.ease_factor),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Interval: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format_interval(p.interval_days),
                Style::default().fg(Color::White),
            ),
            Span::raw("  "),
            Span::styled("Next: ", Style::default().fg(Color::Gray)),
            Span::styled(next_review, Style::default().fg(Color::White)),
        ]),
        Line::from(vec![
            Span::styled("If graded now: ", Style::default().fg(Color::Gray)),
            Span::styled(
                format!("again {} ", format_interval(again)),
                Style::default().fg(Color::Red),
            ),
            Span::styled(
                format!("hard {} ", format_interval(hard)),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled(
                format!("good {} ", format_interval(good)),
                Style::default().fg(Color::Green),
            ),
            Span::styled(
                format!("easy {}", format_interval(easy)),
                Style::default().fg(Color::Cyan),
            ),
        ]),
    ];

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Progress ")
        .title_style(Style::default().fg(Color::Cyan));

    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_questions(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .selected_questions
        .iter()
        .map(|q| {
            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<16}", q.question_type.as_str()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(
                    format!("{:<40}", truncate(&q.prompt, 38)),
                    Style::default().fg(Color::White),
                ),
                Span::styled(truncate(&q.answer, 24), Style::default().fg(Color::Green)),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" Questions ({}) ", app.selected_questions.len()))
        .title_style(Style::default().fg(Color::Yellow));

    if items.is_empty() {
        let paragraph = Paragraph::new("No questions. Practice uses a translation prompt.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}

fn draw_attempts(f: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .selected_attempts
        .iter()
        .map(|a| {
            let (result, color) = if a.correct {
                ("correct", Color::Green)
            } else {
                ("missed ", Color::Red)
            };

            ListItem::new(Line::from(vec![
                Span::styled(
                    format!("{:<10}", format_date(&a.practiced_at)),
                    Style::default().fg(Color::DarkGray),
                ),
                Span::styled(
                    format!("{:<8}", a.mode.as_str()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::styled(format!("q{}  ", a.quality), Style::default().fg(Color::Yellow)),
                Span::styled(result, Style::default().fg(color)),
                Span::styled(
                    a.answer
                        .as_deref()
                        .map(|s| format!("  \"{}\"", truncate(s, 30)))
                        .unwrap_or_default(),
                    Style::default().fg(Color::Gray),
                ),
            ]))
        })
        .collect();

    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Recent Attempts ")
        .title_style(Style::default().fg(Color::Magenta));

    if items.is_empty() {
        let paragraph = Paragraph::new("Not practiced yet.")
            .style(Style::default().fg(Color::DarkGray))
            .block(block);
        f.render_widget(paragraph, area);
    } else {
        f.render_widget(List::new(items).block(block), area);
    }
}
