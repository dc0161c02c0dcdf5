pub mod concept_detail;
pub mod concepts;
pub mod dashboard;

use chrono::DateTime;
use ratatui::style::Color;

use crate::models::MasteryState;

const BAR_CELLS: usize = 10;

/// Ten-cell bar for a 0-100 mastery level
fn mastery_bar(level: f64) -> String {
    let filled = ((level.clamp(0.0, 100.0) / 100.0) * BAR_CELLS as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

fn state_color(state: MasteryState) -> Color {
    match state {
        MasteryState::New => Color::Gray,
        MasteryState::Learning => Color::Yellow,
        MasteryState::Reviewing => Color::Cyan,
        MasteryState::Mastered => Color::Green,
    }
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

fn format_date(date_str: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(date_str) {
        dt.format("%b %d").to_string()
    } else {
        date_str.chars().take(10).collect()
    }
}
