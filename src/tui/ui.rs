use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph, Tabs},
    Frame,
};

use super::widgets::{concept_detail, concepts, dashboard};
use super::{App, View};

pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Tab bar
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Help bar
        ])
        .split(f.area());

    draw_tabs(f, app, chunks[0]);
    draw_content(f, app, chunks[1]);
    draw_help_bar(f, app, chunks[2]);
}

fn draw_tabs(f: &mut Frame, app: &App, area: Rect) {
    let selected = match app.view {
        View::Dashboard => 0,
        View::Concepts | View::ConceptDetail => 1,
    };

    let tabs = Tabs::new(vec!["Dashboard", "Concepts"])
        .block(Block::default().borders(Borders::ALL).title(" Nauka "))
        .select(selected)
        .style(Style::default().fg(Color::White))
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    f.render_widget(tabs, area);
}

fn draw_content(f: &mut Frame, app: &App, area: Rect) {
    match app.view {
        View::Dashboard => dashboard::draw(f, app, area),
        View::Concepts => concepts::draw(f, app, area),
        View::ConceptDetail => concept_detail::draw(f, app, area),
    }
}

fn key(k: &str) -> Span<'_> {
    Span::styled(k, Style::default().fg(Color::Cyan))
}

fn draw_help_bar(f: &mut Frame, app: &App, area: Rect) {
    let help_text = if app.filter_mode {
        vec![
            Span::styled("/", Style::default().fg(Color::Yellow)),
            Span::raw(&app.filter_input),
            Span::styled("█", Style::default().fg(Color::Yellow)),
            Span::raw(" | course title  "),
            key("<CR>"),
            Span::raw(" Apply  "),
            key("<Esc>"),
            Span::raw(" Cancel"),
        ]
    } else {
        let mut spans = vec![key("h/l"), Span::raw(" Views  ")];

        match app.view {
            View::Dashboard => {
                spans.extend([key("^r"), Span::raw(" Refresh  ")]);
            }
            View::Concepts => {
                spans.extend([
                    key("j/k"),
                    Span::raw(" Nav  "),
                    key("g/G"),
                    Span::raw(" Top/Bot  "),
                    key("l/<CR>"),
                    Span::raw(" Open  "),
                    key("/"),
                    Span::raw(" Filter  "),
                ]);
                if app.filter_course.is_some() {
                    spans.extend([key("<Esc>"), Span::raw(" Clear  ")]);
                }
            }
            View::ConceptDetail => {
                spans.extend([
                    key("h/<Esc>"),
                    Span::raw(" Back  "),
                    key("^r"),
                    Span::raw(" Refresh  "),
                ]);
            }
        }

        spans.extend([key("q"), Span::raw(" Quit")]);
        spans
    };

    let help = Paragraph::new(Line::from(help_text)).style(Style::default().bg(Color::DarkGray));

    f.render_widget(help, area);
}
