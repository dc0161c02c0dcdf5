mod ui;
mod widgets;

use std::io;
use std::time::Duration;

use chrono::{DateTime, Utc};
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};

use crate::config::SessionConfig;
use crate::db::{Database, Stats};
use crate::error::Result;
use crate::models::{ConceptWithProgress, Course, PracticeAttempt, Question};
use crate::queue::{drill_queue, review_queue, DrillEntry, QueueEntry, QueueLimits};
use crate::srs::SrsCalculator;

const DASHBOARD_ROWS: usize = 8;
const DETAIL_ATTEMPTS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Dashboard,
    Concepts,
    ConceptDetail,
}

impl View {
    fn next(&self) -> Self {
        match self {
            View::Dashboard => View::Concepts,
            View::Concepts => View::Dashboard,
            View::ConceptDetail => View::Concepts,
        }
    }

    fn prev(&self) -> Self {
        match self {
            View::Dashboard => View::Concepts,
            View::Concepts => View::Dashboard,
            View::ConceptDetail => View::Concepts,
        }
    }
}

pub struct StatefulList<T> {
    pub items: Vec<T>,
    pub selected: Option<usize>,
}

impl<T> StatefulList<T> {
    fn with_items(items: Vec<T>) -> Self {
        let selected = if items.is_empty() { None } else { Some(0) };
        Self { items, selected }
    }

    fn next(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(i) if i + 1 < self.items.len() => i + 1,
            _ => 0,
        };
        self.selected = Some(i);
    }

    fn previous(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let i = match self.selected {
            Some(0) | None => self.items.len() - 1,
            Some(i) => i - 1,
        };
        self.selected = Some(i);
    }

    fn first(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(0);
        }
    }

    fn last(&mut self) {
        if !self.items.is_empty() {
            self.selected = Some(self.items.len() - 1);
        }
    }

    fn selected_item(&self) -> Option<&T> {
        self.selected.and_then(|i| self.items.get(i))
    }
}

pub struct App {
    db: Database,
    pub calc: SrsCalculator,
    session: SessionConfig,
    pub now: DateTime<Utc>,
    pub view: View,
    pub courses: Vec<Course>,
    pub concepts: StatefulList<ConceptWithProgress>,
    pub selected_concept: Option<ConceptWithProgress>,
    pub selected_questions: Vec<Question>,
    pub selected_attempts: Vec<PracticeAttempt>,
    pub stats: Stats,
    pub due: Vec<QueueEntry>,
    pub weakest: Vec<DrillEntry>,
    pub filter_course: Option<String>,
    pub filter_input: String,
    pub filter_mode: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(db: Database, calc: SrsCalculator, session: SessionConfig) -> Result<Self> {
        let mut app = Self {
            db,
            calc,
            session,
            now: Utc::now(),
            view: View::Dashboard,
            courses: Vec::new(),
            concepts: StatefulList::with_items(Vec::new()),
            selected_concept: None,
            selected_questions: Vec::new(),
            selected_attempts: Vec::new(),
            stats: Stats::default(),
            due: Vec::new(),
            weakest: Vec::new(),
            filter_course: None,
            filter_input: String::new(),
            filter_mode: false,
            should_quit: false,
        };
        app.refresh_data()?;
        Ok(app)
    }

    pub fn refresh_data(&mut self) -> Result<()> {
        self.now = Utc::now();
        let cutoff =
            self.now - chrono::Duration::hours(self.calc.config().overdue_after_hours);
        self.stats = self.db.get_stats(self.now, cutoff)?;
        self.courses = self.db.list_courses()?;

        let all = self.db.list_with_progress(None)?;
        self.due = review_queue(
            &self.calc,
            all.clone(),
            self.now,
            QueueLimits {
                review_limit: DASHBOARD_ROWS,
                new_limit: self.session.new_limit,
            },
        );
        self.weakest = drill_queue(&self.calc, all.clone(), DASHBOARD_ROWS);
        self.concepts = StatefulList::with_items(self.filtered(all));

        if let Some(id) = self.selected_concept.as_ref().map(|c| c.concept.id) {
            self.load_detail(id)?;
        }
        Ok(())
    }

    pub fn course_title(&self, course_id: Option<i64>) -> Option<&str> {
        let id = course_id?;
        self.courses
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.title.as_str())
    }

    // Keeps concepts whose course title contains the filter (case-insensitive)
    fn filtered(&self, items: Vec<ConceptWithProgress>) -> Vec<ConceptWithProgress> {
        let Some(filter) = self.filter_course.as_ref().map(|f| f.to_lowercase()) else {
            return items;
        };
        items
            .into_iter()
            .filter(|c| {
                self.course_title(c.concept.course_id)
                    .map(|t| t.to_lowercase().contains(&filter))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn apply_filter(&mut self) -> Result<()> {
        let input = self.filter_input.trim();
        self.filter_course = if input.is_empty() {
            None
        } else {
            Some(input.to_string())
        };
        let all = self.db.list_with_progress(None)?;
        self.concepts = StatefulList::with_items(self.filtered(all));
        Ok(())
    }

    fn load_detail(&mut self, concept_id: i64) -> Result<()> {
        self.selected_concept = self.db.get_concept_with_progress(concept_id)?;
        self.selected_questions = self.db.list_questions(concept_id)?;
        self.selected_attempts = self.db.list_attempts(concept_id, DETAIL_ATTEMPTS)?;
        Ok(())
    }

    fn select_concept(&mut self) -> Result<()> {
        if let Some(id) = self.concepts.selected_item().map(|c| c.concept.id) {
            self.load_detail(id)?;
            self.view = View::ConceptDetail;
        }
        Ok(())
    }

    fn close_detail(&mut self) {
        self.view = View::Concepts;
        self.selected_concept = None;
        self.selected_questions.clear();
        self.selected_attempts.clear();
    }

    fn handle_key(&mut self, key: KeyCode, modifiers: KeyModifiers) -> Result<()> {
        if self.filter_mode {
            match key {
                KeyCode::Esc => {
                    self.filter_mode = false;
                    self.filter_input.clear();
                }
                KeyCode::Enter => {
                    self.filter_mode = false;
                    self.apply_filter()?;
                }
                KeyCode::Backspace => {
                    self.filter_input.pop();
                }
                KeyCode::Char(c) => {
                    self.filter_input.push(c);
                }
                _ => {}
            }
            return Ok(());
        }

        match key {
            KeyCode::Char('q') => self.should_quit = true,

            KeyCode::Char('r') if modifiers.contains(KeyModifiers::CONTROL) => {
                self.refresh_data()?;
            }

            KeyCode::Char('/') if self.view == View::Concepts => {
                self.filter_mode = true;
                self.filter_input.clear();
            }

            KeyCode::Esc => match self.view {
                View::ConceptDetail => self.close_detail(),
                View::Concepts if self.filter_course.is_some() => {
                    self.filter_input.clear();
                    self.apply_filter()?;
                }
                View::Concepts | View::Dashboard => {}
            },

            KeyCode::Char('h') | KeyCode::Left => match self.view {
                View::ConceptDetail => self.close_detail(),
                _ => self.view = self.view.prev(),
            },
            KeyCode::Char('l') | KeyCode::Right => match self.view {
                View::Concepts => self.select_concept()?,
                View::ConceptDetail => {}
                View::Dashboard => self.view = self.view.next(),
            },

            KeyCode::Tab | KeyCode::BackTab => {
                if self.view == View::ConceptDetail {
                    self.close_detail();
                } else {
                    self.view = self.view.next();
                }
            }

            KeyCode::Char('j') | KeyCode::Down if self.view == View::Concepts => {
                self.concepts.next()
            }
            KeyCode::Char('k') | KeyCode::Up if self.view == View::Concepts => {
                self.concepts.previous()
            }
            KeyCode::Char('g') if self.view == View::Concepts => self.concepts.first(),
            KeyCode::Char('G') if self.view == View::Concepts => self.concepts.last(),

            KeyCode::Enter if self.view == View::Concepts => self.select_concept()?,

            _ => {}
        }
        Ok(())
    }
}

pub fn run(
    db: Database,
    calc: SrsCalculator,
    session: SessionConfig,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    let mut app = App::new(db, calc, session)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    result
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> std::result::Result<(), Box<dyn std::error::Error>> {
    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        if event::poll(Duration::from_millis(100))? {
            if let Event::Key(key) = event::read()? {
                app.handle_key(key.code, key.modifiers)?;
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}
