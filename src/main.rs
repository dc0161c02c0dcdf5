mod config;
mod db;
mod error;
mod grading;
mod intake;
mod models;
mod practice;
mod queue;
mod srs;
mod tui;

use chrono::Utc;
use clap::{Parser, Subcommand};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use config::{Config, LOG_ENV};
use db::{Database, NewConcept, PracticeRecord};
use error::Error;
use grading::{check_answer, hint, AnswerMatch};
use models::{ConceptKind, Grade, JsonOutput, MasteryState, PracticeMode, QuestionType};
use practice::PracticeEngine;
use queue::{drill_queue, next_concept, review_queue, QueueLimits};
use srs::{format_interval, SrsCalculator};

const QUIT_COMMAND: &str = ":q";
const HINT_COMMAND: &str = "?";
const GRADE_PREFIX: &str = "=";

#[derive(Parser)]
#[command(name = "nauka")]
#[command(about = "Spaced-repetition trainer for Polish vocabulary and grammar")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log scheduling decisions to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Manage courses
    #[command(subcommand)]
    Course(CourseCommands),

    /// Import a course from a JSON file
    Import {
        /// Path to the course JSON
        file: PathBuf,
    },

    /// Manage concepts
    #[command(subcommand)]
    Concept(ConceptCommands),

    /// Manage questions
    #[command(subcommand)]
    Question(QuestionCommands),

    /// Show the review queue: overdue first, then due, then new
    Due {
        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,

        /// Maximum number of entries
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show the weakest concepts
    Drill {
        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,

        /// Maximum number of entries
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Pick the next concept to practice (weighted random)
    Next {
        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,
    },

    /// Record a self-graded attempt for a concept
    Practice {
        /// Concept ID
        id: i64,

        /// Grade: again/hard/good/easy
        #[arg(long, short)]
        grade: String,

        /// Drill attempt: leaves the review schedule alone
        #[arg(long)]
        drill: bool,
    },

    /// Check a typed answer to a question and record it
    Check {
        /// Question ID
        question: i64,

        /// Your answer
        answer: String,
    },

    /// Interactive practice session on stdin
    Study {
        /// Drill weak concepts instead of reviewing due ones
        #[arg(long)]
        drill: bool,

        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,

        /// Maximum number of cards
        #[arg(long, short)]
        limit: Option<usize>,
    },

    /// Show learning statistics
    Stats,

    /// List recent practice sessions
    Sessions {
        /// Maximum number of sessions
        #[arg(long, short, default_value = "10")]
        limit: usize,
    },

    /// Print the effective configuration
    Config,

    /// Launch interactive terminal UI
    Tui,
}

#[derive(Subcommand)]
enum CourseCommands {
    /// List all courses
    List,
}

#[derive(Subcommand)]
enum ConceptCommands {
    /// Add a new concept
    Add {
        /// Polish term
        term: String,

        /// English translation
        #[arg(long, short)]
        translation: String,

        /// vocabulary or grammar
        #[arg(long, short, default_value = "vocabulary")]
        kind: String,

        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,

        /// Free-form notes
        #[arg(long, short)]
        notes: Option<String>,
    },

    /// List concepts
    List {
        /// Course title or ID
        #[arg(long, short)]
        course: Option<String>,

        /// Filter by state: new/learning/reviewing/mastered
        #[arg(long, short)]
        state: Option<String>,
    },

    /// Show concept details
    Show {
        /// Concept ID
        id: i64,
    },

    /// Delete a concept
    Delete {
        /// Concept ID
        id: i64,
    },
}

#[derive(Subcommand)]
enum QuestionCommands {
    /// Add a question to a concept
    Add {
        /// Concept ID
        concept: i64,

        /// Prompt shown to the learner
        #[arg(long, short)]
        prompt: String,

        /// Expected answer; separate alternatives with '/'
        #[arg(long, short)]
        answer: String,

        /// translation, fill_blank or multiple_choice
        #[arg(long = "type", short = 'T', default_value = "translation")]
        question_type: String,

        /// Comma-separated choices for multiple choice
        #[arg(long)]
        choices: Option<String>,
    },

    /// List questions of a concept
    List {
        /// Concept ID
        concept: i64,
    },
}

/// Filter directive: `NAUKA_LOG`, then `--verbose`, then `logging.level`
fn log_directive(env: Option<&str>, verbose: bool, level: &str) -> String {
    match env {
        Some(directive) if !directive.trim().is_empty() => directive.to_string(),
        _ if verbose => "debug".to_string(),
        _ => level.to_string(),
    }
}

fn init_logging(verbose: bool, level: &str) {
    let env = std::env::var(LOG_ENV).ok();
    let directive = log_directive(env.as_deref(), verbose, level);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() {
    let cli = Cli::parse();
    let json = cli.json;

    let config = match Config::load() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // The terminal UI owns the screen, so it runs without a log writer
    if !matches!(cli.command, Commands::Tui) {
        init_logging(cli.verbose, &config.logging.level);
    }

    if let Err(e) = run(cli, config) {
        if json {
            if let Ok(out) = serde_json::to_string(&JsonOutput::<()>::err(e.to_string())) {
                println!("{}", out);
            }
        } else {
            eprintln!("Error: {}", e);
        }
        std::process::exit(1);
    }
}

fn print_json<T: serde::Serialize>(data: T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string(&JsonOutput::ok(data))?);
    Ok(())
}

/// Accepts a course ID or an exact title
fn resolve_course(db: &Database, course: Option<&str>) -> Result<Option<i64>, Error> {
    let Some(course) = course else {
        return Ok(None);
    };
    if let Ok(id) = course.trim().parse::<i64>() {
        if let Some(c) = db.get_course(id)? {
            return Ok(Some(c.id));
        }
    }
    match db.find_course_by_title(course)? {
        Some(c) => Ok(Some(c.id)),
        None => Err(Error::invalid(format!("course '{}' not found", course))),
    }
}

fn parse_choices(choices: Option<&str>) -> Vec<String> {
    choices
        .map(|c| {
            c.split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn run(cli: Cli, config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let db_path = config.db_path();
    let db = Database::open(&db_path)?.configure(&config);
    db.init()?;
    let calc = SrsCalculator::new(config.srs.clone());
    let now = Utc::now();

    match cli.command {
        Commands::Init => {
            if cli.json {
                print_json(serde_json::json!({ "db_path": db_path }))?;
            } else {
                println!("Database initialized at: {}", db_path.display());
            }
        }

        Commands::Course(CourseCommands::List) => {
            let courses = db.list_courses()?;
            if cli.json {
                print_json(&courses)?;
            } else if courses.is_empty() {
                println!("No courses found. Import one with: nauka import <file>");
            } else {
                println!("{:<5} {:<40} CONCEPTS", "ID", "TITLE");
                println!("{}", "-".repeat(56));
                for course in courses {
                    println!(
                        "{:<5} {:<40} {}",
                        course.id,
                        truncate(&course.title, 38),
                        course.concept_count
                    );
                }
            }
        }

        Commands::Import { file } => {
            let payload = intake::load_import(&file)?;
            let summary = intake::import_course(&db, &payload)?;
            if cli.json {
                print_json(&summary)?;
            } else {
                println!("Imported '{}' (course {})", payload.title.trim(), summary.course_id);
                println!("  created:   {}", summary.created);
                println!("  merged:    {}", summary.merged);
                println!("  skipped:   {}", summary.skipped);
                println!("  questions: {}", summary.questions_added);
            }
        }

        Commands::Concept(concept_cmd) => match concept_cmd {
            ConceptCommands::Add {
                term,
                translation,
                kind,
                course,
                notes,
            } => {
                let kind = ConceptKind::from_str(&kind).ok_or_else(|| {
                    format!("Invalid kind '{}'. Use: vocabulary or grammar", kind)
                })?;
                let course_id = resolve_course(&db, course.as_deref())?;
                let id = db.add_concept(&NewConcept {
                    course_id,
                    term: &term,
                    translation: &translation,
                    kind,
                    notes: notes.as_deref(),
                })?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "term": term }))?;
                } else {
                    println!("Added concept '{}' with ID: {}", term, id);
                }
            }

            ConceptCommands::List { course, state } => {
                let course_id = resolve_course(&db, course.as_deref())?;
                let state = state
                    .map(|s| {
                        MasteryState::from_str(&s).ok_or_else(|| {
                            format!(
                                "Invalid state '{}'. Use: new, learning, reviewing or mastered",
                                s
                            )
                        })
                    })
                    .transpose()?;
                let concepts = db.list_concepts(course_id, state)?;

                if cli.json {
                    print_json(&concepts)?;
                } else if concepts.is_empty() {
                    println!("No concepts found.");
                } else {
                    println!(
                        "{:<5} {:<24} {:<24} {:<10} MASTERY",
                        "ID", "TERM", "TRANSLATION", "STATE"
                    );
                    println!("{}", "-".repeat(75));
                    for c in concepts {
                        println!(
                            "{:<5} {:<24} {:<24} {:<10} {:.0}",
                            c.concept.id,
                            truncate(&c.concept.term, 22),
                            truncate(&c.concept.translation, 22),
                            c.progress.state.label(),
                            c.progress.mastery_level
                        );
                    }
                }
            }

            ConceptCommands::Show { id } => {
                let item = db
                    .get_concept_with_progress(id)?
                    .ok_or_else(|| Error::not_found("concept", id))?;
                let questions = db.list_questions(id)?;
                let attempts = db.list_attempts(id, 5)?;
                let preview = calc.preview(&item.progress, now);
                let status = calc.due_status(&item.progress, now);

                if cli.json {
                    print_json(serde_json::json!({
                        "concept": item.concept,
                        "progress": item.progress,
                        "status": status.as_str(),
                        "preview": {
                            "again": preview[0],
                            "hard": preview[1],
                            "good": preview[2],
                            "easy": preview[3]
                        },
                        "questions": questions,
                        "attempts": attempts
                    }))?;
                } else {
                    let (c, p) = (&item.concept, &item.progress);
                    println!("Concept: {}", c.term);
                    println!("ID: {}", c.id);
                    println!("Translation: {}", c.translation);
                    println!("Kind: {}", c.kind.label());
                    if let Some(notes) = &c.notes {
                        println!("Notes: {}", notes);
                    }
                    println!();
                    println!("--- Progress ---");
                    println!("State: {} ({})", p.state.label(), status.as_str());
                    println!("Mastery: {:.0}/100", p.mastery_level);
                    println!(
                        "Practiced: {} ({:.0}% success, {} lapses)",
                        p.times_practiced,
                        p.success_rate(),
                        p.lapses
                    );
                    println!("Ease: {:.2}  Interval: {}", p.ease_factor, format_interval(p.interval_days));
                    if let Some(next) = &p.next_review {
                        println!("Next review: {}", next);
                    }
                    println!(
                        "If graded now: again {} / hard {} / good {} / easy {}",
                        format_interval(preview[0]),
                        format_interval(preview[1]),
                        format_interval(preview[2]),
                        format_interval(preview[3])
                    );

                    if !questions.is_empty() {
                        println!();
                        println!("--- Questions ---");
                        for q in &questions {
                            println!("[{}] ({}) {}", q.id, q.question_type.as_str(), q.prompt);
                        }
                    }

                    if !attempts.is_empty() {
                        println!();
                        println!("--- Recent attempts ---");
                        for a in &attempts {
                            println!(
                                "{}  {:<6} q{}  {}",
                                a.practiced_at,
                                a.mode.as_str(),
                                a.quality,
                                if a.correct { "correct" } else { "missed" }
                            );
                        }
                    }
                }
            }

            ConceptCommands::Delete { id } => {
                if db.delete_concept(id)? {
                    if cli.json {
                        print_json(())?;
                    } else {
                        println!("Concept {} deleted.", id);
                    }
                } else {
                    return Err(Error::not_found("concept", id).into());
                }
            }
        },

        Commands::Question(question_cmd) => match question_cmd {
            QuestionCommands::Add {
                concept,
                prompt,
                answer,
                question_type,
                choices,
            } => {
                let qtype = QuestionType::from_str(&question_type).ok_or_else(|| {
                    format!(
                        "Invalid type '{}'. Use: translation, fill_blank or multiple_choice",
                        question_type
                    )
                })?;
                let choices = parse_choices(choices.as_deref());
                let id = db.add_question(concept, qtype, &prompt, &answer, &choices)?;

                if cli.json {
                    print_json(serde_json::json!({ "id": id, "concept_id": concept }))?;
                } else {
                    println!("Added question {} to concept {}.", id, concept);
                }
            }

            QuestionCommands::List { concept } => {
                let questions = db.list_questions(concept)?;
                if cli.json {
                    print_json(&questions)?;
                } else if questions.is_empty() {
                    println!("No questions for concept {}.", concept);
                } else {
                    println!("{:<5} {:<16} {:<36} ANSWER", "ID", "TYPE", "PROMPT");
                    println!("{}", "-".repeat(75));
                    for q in questions {
                        println!(
                            "{:<5} {:<16} {:<36} {}",
                            q.id,
                            q.question_type.as_str(),
                            truncate(&q.prompt, 34),
                            q.answer
                        );
                    }
                }
            }
        },

        Commands::Due { course, limit } => {
            let course_id = resolve_course(&db, course.as_deref())?;
            let items = db.list_with_progress(course_id)?;
            let limits = QueueLimits {
                review_limit: limit.unwrap_or(config.session.review_limit),
                new_limit: config.session.new_limit,
            };
            let queue = review_queue(&calc, items, now, limits);

            if cli.json {
                print_json(&queue)?;
            } else if queue.is_empty() {
                println!("Nothing due. Come back later!");
            } else {
                println!(
                    "{:<5} {:<24} {:<9} {:<9} {:<8} NEXT REVIEW",
                    "ID", "TERM", "STATUS", "STATE", "PRIORITY"
                );
                println!("{}", "-".repeat(80));
                for entry in queue {
                    println!(
                        "{:<5} {:<24} {:<9} {:<9} {:<8.2} {}",
                        entry.item.concept.id,
                        truncate(&entry.item.concept.term, 22),
                        entry.status.as_str(),
                        entry.item.progress.state.as_str(),
                        entry.priority,
                        entry.item.progress.next_review.as_deref().unwrap_or("-")
                    );
                }
            }
        }

        Commands::Drill { course, limit } => {
            let course_id = resolve_course(&db, course.as_deref())?;
            let items = db.list_with_progress(course_id)?;
            let ranked = drill_queue(&calc, items, limit.unwrap_or(config.session.drill_limit));

            if cli.json {
                print_json(&ranked)?;
            } else if ranked.is_empty() {
                println!("Nothing to drill yet. Practice some concepts first!");
            } else {
                println!(
                    "{:<5} {:<24} {:<9} {:<8} {:<8} WEAKNESS",
                    "ID", "TERM", "STATE", "SUCCESS", "MASTERY"
                );
                println!("{}", "-".repeat(70));
                for entry in ranked {
                    let p = &entry.item.progress;
                    println!(
                        "{:<5} {:<24} {:<9} {:<8} {:<8.0} {:.2}",
                        entry.item.concept.id,
                        truncate(&entry.item.concept.term, 22),
                        p.state.as_str(),
                        format!("{:.0}%", p.success_rate()),
                        p.mastery_level,
                        entry.weakness
                    );
                }
            }
        }

        Commands::Next { course } => {
            let course_id = resolve_course(&db, course.as_deref())?;
            let items = db.list_with_progress(course_id)?;
            let picked = next_concept(&calc, items, now, &mut rand::thread_rng());

            match picked {
                Some(entry) if cli.json => print_json(&entry)?,
                Some(entry) => {
                    let (c, p) = (&entry.item.concept, &entry.item.progress);
                    println!("=== Next Concept ===");
                    println!();
                    println!("Term: {} (ID: {})", c.term, c.id);
                    println!("Translation: {}", c.translation);
                    println!("Status: {}", entry.status.as_str());
                    println!("State: {} (mastery {:.0})", p.state.label(), p.mastery_level);
                    println!();
                    println!("After practicing, record the result with:");
                    println!("  nauka practice {} --grade <again|hard|good|easy>", c.id);
                }
                None if cli.json => print_json(())?,
                None => println!("Nothing to practice right now. Add or import some concepts!"),
            }
        }

        Commands::Practice { id, grade, drill } => {
            let grade = Grade::from_str(&grade).ok_or_else(|| {
                format!("Invalid grade '{}'. Use: again, hard, good or easy", grade)
            })?;
            let progress = db
                .get_progress(id)?
                .ok_or_else(|| Error::not_found("concept", id))?;
            let (mode, update) = if drill {
                (PracticeMode::Drill, calc.drill(&progress, grade.quality(), now))
            } else {
                (PracticeMode::Review, calc.schedule(&progress, grade.quality(), now))
            };
            db.record_practice(
                &PracticeRecord {
                    session_id: None,
                    concept_id: id,
                    question_id: None,
                    mode,
                    quality: grade.quality(),
                    answer: None,
                },
                &update,
            )?;

            if cli.json {
                print_json(&update)?;
            } else {
                println!("Practice recorded for concept {}.", id);
                println!(
                    "State: {} -> {} (mastery {:.0})",
                    progress.state.label(),
                    update.state.label(),
                    update.mastery_level
                );
                println!(
                    "Next review: {} (in {})",
                    models::timestamp(update.next_review),
                    format_interval(update.interval_days)
                );
            }
        }

        Commands::Check { question, answer } => {
            let q = db
                .get_question(question)?
                .ok_or_else(|| Error::not_found("question", question))?;
            let verdict = check_answer(&answer, &q.answer);
            let quality = verdict.quality(false);
            let progress = db
                .get_progress(q.concept_id)?
                .ok_or_else(|| Error::not_found("concept", q.concept_id))?;
            let update = calc.schedule(&progress, quality, now);
            db.record_practice(
                &PracticeRecord {
                    session_id: None,
                    concept_id: q.concept_id,
                    question_id: Some(q.id),
                    mode: PracticeMode::Review,
                    quality,
                    answer: Some(&answer),
                },
                &update,
            )?;

            if cli.json {
                print_json(serde_json::json!({
                    "verdict": verdict,
                    "correct": verdict.is_correct(),
                    "quality": quality,
                    "expected": q.answer,
                    "next_review": models::timestamp(update.next_review)
                }))?;
            } else {
                println!("{}", verdict.message());
                if verdict != AnswerMatch::Exact {
                    println!("Expected: {}", q.answer);
                }
                println!("Next review in {}.", format_interval(update.interval_days));
            }
        }

        Commands::Study {
            drill,
            course,
            limit,
        } => {
            let course_id = resolve_course(&db, course.as_deref())?;
            let mode = if drill {
                PracticeMode::Drill
            } else {
                PracticeMode::Review
            };
            let mut session_config = config.session.clone();
            if let Some(limit) = limit {
                session_config.review_limit = limit;
                session_config.drill_limit = limit;
            }

            let mut engine =
                PracticeEngine::start(&db, &calc, &session_config, mode, course_id, now)?;
            let stdin = io::stdin();
            let mut rng = rand::thread_rng();
            if cli.json {
                // Keep stdout for the JSON envelope alone
                run_study(
                    &mut engine,
                    stdin.lock(),
                    &mut io::stderr(),
                    &mut io::stdout(),
                    true,
                    &mut rng,
                )?;
            } else {
                let mut stdout = io::stdout();
                let mut report = io::stdout();
                run_study(&mut engine, stdin.lock(), &mut stdout, &mut report, false, &mut rng)?;
            }
        }

        Commands::Stats => {
            let cutoff = now - chrono::Duration::hours(config.srs.overdue_after_hours);
            let stats = db.get_stats(now, cutoff)?;
            if cli.json {
                print_json(&stats)?;
            } else {
                println!("=== Learning Statistics ===");
                println!("Concepts: {} ({} questions)", stats.total_concepts, stats.total_questions);
                println!(
                    "  new {} / learning {} / reviewing {} / mastered {}",
                    stats.new, stats.learning, stats.reviewing, stats.mastered
                );
                println!("Due for review: {} ({} overdue)", stats.due_now, stats.overdue);
                println!(
                    "Attempts: {} ({:.0}% correct) over {} sessions",
                    stats.total_attempts,
                    stats.accuracy(),
                    stats.sessions
                );
                println!("Average mastery: {:.1}/100", stats.avg_mastery);
            }
        }

        Commands::Sessions { limit } => {
            let sessions = db.list_sessions(limit)?;
            if cli.json {
                print_json(&sessions)?;
            } else if sessions.is_empty() {
                println!("No sessions yet. Start one with: nauka study");
            } else {
                println!(
                    "{:<5} {:<7} {:<22} {:<9} ACCURACY",
                    "ID", "MODE", "STARTED", "ATTEMPTS"
                );
                println!("{}", "-".repeat(55));
                for s in sessions {
                    println!(
                        "{:<5} {:<7} {:<22} {:<9} {:.0}%{}",
                        s.id,
                        s.mode.as_str(),
                        s.started_at,
                        s.attempts,
                        s.accuracy(),
                        if s.ended_at.is_none() { " (open)" } else { "" }
                    );
                }
            }
        }

        Commands::Config => {
            if cli.json {
                print_json(&config)?;
            } else {
                println!("# {}", Config::config_path().display());
                print!("{}", config.to_toml());
            }
        }

        Commands::Tui => {
            tui::run(db, calc, config.session.clone())?;
        }
    }

    Ok(())
}

enum Response {
    Typed(String),
    Graded(Grade),
}

/// Drive a practice session from line-based input until the queue is
/// empty or the learner quits.
/// Runs the interactive loop on `prompts`, then writes the session summary
/// (or its JSON envelope) to `report`.
fn run_study<R: BufRead, P: Write, O: Write, G: rand::Rng>(
    engine: &mut PracticeEngine,
    input: R,
    prompts: &mut P,
    report: &mut O,
    json: bool,
    rng: &mut G,
) -> Result<(), Box<dyn std::error::Error>> {
    study_loop(engine, input, prompts, rng)?;
    let session = engine.finish()?;

    if json {
        writeln!(report, "{}", serde_json::to_string(&JsonOutput::ok(&session))?)?;
    } else {
        writeln!(report)?;
        writeln!(
            report,
            "Session finished: {}/{} correct ({:.0}%)",
            session.correct,
            session.attempts,
            session.accuracy()
        )?;
    }
    Ok(())
}

fn study_loop<R: BufRead, W: Write, G: rand::Rng>(
    engine: &mut PracticeEngine,
    input: R,
    out: &mut W,
    rng: &mut G,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut lines = input.lines();
    writeln!(
        out,
        "Session {} ({}): {} cards. Type '{}' for a hint, '{}again'..'{}easy' to self-grade, '{}' to quit.",
        engine.session_id(),
        engine.mode().as_str(),
        engine.remaining(),
        HINT_COMMAND,
        GRADE_PREFIX,
        GRADE_PREFIX,
        QUIT_COMMAND
    )?;

    while let Some(card) = engine.next_card(rng)? {
        writeln!(out)?;
        writeln!(out, "{}", card.prompt)?;
        for (i, choice) in card.choices.iter().enumerate() {
            writeln!(out, "  {}) {}", i + 1, choice)?;
        }

        let mut hint_level = 0;
        let answer = loop {
            write!(out, "> ")?;
            out.flush()?;
            let Some(line) = lines.next() else {
                return Ok(());
            };
            let line = line?;
            let line = line.trim();

            if line == QUIT_COMMAND {
                return Ok(());
            }
            if line == HINT_COMMAND {
                hint_level += 1;
                writeln!(out, "hint: {}", hint(&card.answer, hint_level))?;
                continue;
            }
            if let Some(grade) = line.strip_prefix(GRADE_PREFIX) {
                match Grade::from_str(grade.trim()) {
                    Some(grade) => break Response::Graded(grade),
                    None => {
                        writeln!(out, "Grades: again, hard, good, easy")?;
                        continue;
                    }
                }
            }
            break Response::Typed(resolve_choice(&card.choices, line));
        };

        let feedback = match answer {
            Response::Typed(answer) => engine.submit(&card, &answer, hint_level > 0, Utc::now())?,
            Response::Graded(grade) => engine.grade(&card, grade, Utc::now())?,
        };
        writeln!(out, "{}", feedback.message())?;
        if feedback.verdict != Some(AnswerMatch::Exact) {
            writeln!(out, "Answer: {}", feedback.expected)?;
        }
        writeln!(
            out,
            "{} · next review in {}",
            feedback.state.label(),
            format_interval(feedback.interval_days)
        )?;
    }

    Ok(())
}

/// A number picks the matching multiple-choice option
fn resolve_choice(choices: &[String], line: &str) -> String {
    line.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| choices.get(i))
        .cloned()
        .unwrap_or_else(|| line.to_string())
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    mod truncate_tests {
        use super::*;

        #[test]
        fn truncate_short_string() {
            assert_eq!(truncate("hello", 10), "hello");
        }

        #[test]
        fn truncate_exact_length() {
            assert_eq!(truncate("hello", 5), "hello");
        }

        #[test]
        fn truncate_long_string() {
            assert_eq!(truncate("hello world", 8), "hello...");
        }

        #[test]
        fn truncate_empty_string() {
            assert_eq!(truncate("", 10), "");
        }

        #[test]
        fn truncate_counts_polish_letters_once() {
            assert_eq!(truncate("żółć", 4), "żółć");
            assert_eq!(truncate("źdźbło trawy", 7), "źdźb...");
        }
    }

    mod helper_tests {
        use super::*;

        #[test]
        fn parse_choices_trims_and_drops_empty() {
            assert_eq!(parse_choices(Some(" kot, pies ,,ryba")), vec!["kot", "pies", "ryba"]);
            assert!(parse_choices(None).is_empty());
        }

        #[test]
        fn resolve_choice_maps_numbers() {
            let choices = vec!["kot".to_string(), "pies".to_string()];
            assert_eq!(resolve_choice(&choices, "2"), "pies");
            assert_eq!(resolve_choice(&choices, "3"), "3");
            assert_eq!(resolve_choice(&choices, "0"), "0");
            assert_eq!(resolve_choice(&[], "1"), "1");
            assert_eq!(resolve_choice(&choices, "kot"), "kot");
        }

        fn setup_db() -> Database {
            let db = Database::open(":memory:").unwrap();
            db.init().unwrap();
            db
        }

        #[test]
        fn resolve_course_by_id_or_title() {
            let db = setup_db();
            let id = db.add_course("Podróże", None).unwrap();
            assert_eq!(resolve_course(&db, None).unwrap(), None);
            assert_eq!(resolve_course(&db, Some(&id.to_string())).unwrap(), Some(id));
            assert_eq!(resolve_course(&db, Some("Podróże")).unwrap(), Some(id));
            assert!(resolve_course(&db, Some("Zakupy")).is_err());
        }
    }

    mod study_tests {
        use super::*;
        use crate::config::SessionConfig;
        use rand::rngs::StdRng;
        use rand::SeedableRng;

        fn setup() -> (Database, SrsCalculator) {
            let db = Database::open(":memory:").unwrap();
            db.init().unwrap();
            db.add_concept(&NewConcept {
                course_id: None,
                term: "kot",
                translation: "cat",
                kind: ConceptKind::Vocabulary,
                notes: None,
            })
            .unwrap();
            (db, SrsCalculator::default())
        }

        fn study(db: &Database, calc: &SrsCalculator, input: &str) -> (String, crate::models::PracticeSession) {
            let mut engine = PracticeEngine::start(
                db,
                calc,
                &SessionConfig::default(),
                PracticeMode::Review,
                None,
                Utc::now(),
            )
            .unwrap();
            let mut out = Vec::new();
            study_loop(
                &mut engine,
                input.as_bytes(),
                &mut out,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
            let session = engine.finish().unwrap();
            (String::from_utf8(out).unwrap(), session)
        }

        #[test]
        fn answers_are_graded() {
            let (db, calc) = setup();
            let (out, session) = study(&db, &calc, "kot\n");
            assert!(out.contains("Translate into Polish: cat"));
            assert!(out.contains("Correct!"));
            assert_eq!(session.attempts, 1);
            assert_eq!(session.correct, 1);
        }

        #[test]
        fn hint_then_answer() {
            let (db, calc) = setup();
            let (out, session) = study(&db, &calc, "?\nkot\n");
            assert!(out.contains("hint: k__"));
            assert_eq!(session.correct, 1);
            let attempt = &db.list_attempts(1, 1).unwrap()[0];
            assert_eq!(attempt.quality, 4);
        }

        #[test]
        fn quit_stops_without_recording() {
            let (db, calc) = setup();
            let (_, session) = study(&db, &calc, ":q\n");
            assert_eq!(session.attempts, 0);
        }

        #[test]
        fn wrong_answer_shows_expected_and_requeues() {
            let (db, calc) = setup();
            let (out, session) = study(&db, &calc, "pies\nkot\n");
            assert!(out.contains("Answer: kot"));
            assert_eq!(session.attempts, 2);
            assert_eq!(session.correct, 1);
        }

        #[test]
        fn self_grade_records_quality() {
            let (db, calc) = setup();
            let (out, session) = study(&db, &calc, "=bogus\n=hard\n");
            assert!(out.contains("Grades: again, hard, good, easy"));
            assert!(out.contains("Session 1 (review)"));
            assert_eq!(session.attempts, 1);
            assert_eq!(db.list_attempts(1, 1).unwrap()[0].quality, 3);
        }

        #[test]
        fn end_of_input_ends_session() {
            let (db, calc) = setup();
            let (_, session) = study(&db, &calc, "");
            assert_eq!(session.attempts, 0);
        }

        fn run(db: &Database, calc: &SrsCalculator, input: &str, json: bool) -> (String, String) {
            let mut engine = PracticeEngine::start(
                db,
                calc,
                &SessionConfig::default(),
                PracticeMode::Review,
                None,
                Utc::now(),
            )
            .unwrap();
            let mut prompts = Vec::new();
            let mut report = Vec::new();
            run_study(
                &mut engine,
                input.as_bytes(),
                &mut prompts,
                &mut report,
                json,
                &mut StdRng::seed_from_u64(1),
            )
            .unwrap();
            (String::from_utf8(prompts).unwrap(), String::from_utf8(report).unwrap())
        }

        #[test]
        fn json_report_is_kept_apart_from_prompts() {
            let (db, calc) = setup();
            let (prompts, report) = run(&db, &calc, "kot\n", true);
            assert!(prompts.contains("Translate into Polish: cat"));
            assert!(!prompts.contains("\"success\""));

            let value: serde_json::Value = serde_json::from_str(report.trim()).unwrap();
            assert_eq!(value["success"], true);
            assert_eq!(value["data"]["attempts"], 1);
            assert_eq!(report.lines().count(), 1);
        }

        #[test]
        fn plain_report_summarizes_session() {
            let (db, calc) = setup();
            let (_, report) = run(&db, &calc, "kot\n", false);
            assert!(report.contains("Session finished: 1/1 correct (100%)"));
        }
    }

    mod logging_tests {
        use super::*;

        #[test]
        fn env_directive_wins() {
            assert_eq!(log_directive(Some("nauka=trace"), true, "error"), "nauka=trace");
        }

        #[test]
        fn verbose_beats_configured_level() {
            assert_eq!(log_directive(None, true, "error"), "debug");
        }

        #[test]
        fn configured_level_is_the_fallback() {
            assert_eq!(log_directive(None, false, "info"), "info");
        }

        #[test]
        fn blank_env_is_ignored() {
            assert_eq!(log_directive(Some("  "), false, "info"), "info");
            assert_eq!(log_directive(Some(""), true, "info"), "debug");
        }
    }

    mod cli_parsing_tests {
        use super::*;

        #[test]
        fn parse_init_command() {
            let cli = Cli::try_parse_from(["nauka", "init"]).unwrap();
            assert!(!cli.json);
            assert!(!cli.verbose);
            assert!(matches!(cli.command, Commands::Init));
        }

        #[test]
        fn parse_global_flags_anywhere() {
            let cli = Cli::try_parse_from(["nauka", "--json", "stats"]).unwrap();
            assert!(cli.json);
            let cli = Cli::try_parse_from(["nauka", "stats", "--json", "-v"]).unwrap();
            assert!(cli.json);
            assert!(cli.verbose);
        }

        #[test]
        fn parse_course_list() {
            let cli = Cli::try_parse_from(["nauka", "course", "list"]).unwrap();
            assert!(matches!(cli.command, Commands::Course(CourseCommands::List)));
        }

        #[test]
        fn parse_import() {
            let cli = Cli::try_parse_from(["nauka", "import", "a1.json"]).unwrap();
            match cli.command {
                Commands::Import { file } => assert_eq!(file, PathBuf::from("a1.json")),
                _ => panic!("Expected Import command"),
            }
        }

        #[test]
        fn parse_concept_add_full() {
            let cli = Cli::try_parse_from([
                "nauka", "concept", "add", "kot", "-t", "cat", "-k", "vocab", "-c", "A1", "-n",
                "masculine",
            ])
            .unwrap();
            match cli.command {
                Commands::Concept(ConceptCommands::Add {
                    term,
                    translation,
                    kind,
                    course,
                    notes,
                }) => {
                    assert_eq!(term, "kot");
                    assert_eq!(translation, "cat");
                    assert_eq!(kind, "vocab");
                    assert_eq!(course, Some("A1".to_string()));
                    assert_eq!(notes, Some("masculine".to_string()));
                }
                _ => panic!("Expected Concept Add command"),
            }
        }

        #[test]
        fn parse_concept_add_defaults_kind() {
            let cli =
                Cli::try_parse_from(["nauka", "concept", "add", "kot", "--translation", "cat"])
                    .unwrap();
            match cli.command {
                Commands::Concept(ConceptCommands::Add { kind, course, .. }) => {
                    assert_eq!(kind, "vocabulary");
                    assert!(course.is_none());
                }
                _ => panic!("Expected Concept Add command"),
            }
        }

        #[test]
        fn parse_concept_list_filters() {
            let cli = Cli::try_parse_from(["nauka", "concept", "list", "-s", "learning"]).unwrap();
            match cli.command {
                Commands::Concept(ConceptCommands::List { course, state }) => {
                    assert!(course.is_none());
                    assert_eq!(state, Some("learning".to_string()));
                }
                _ => panic!("Expected Concept List command"),
            }
        }

        #[test]
        fn parse_concept_show_and_delete() {
            let cli = Cli::try_parse_from(["nauka", "concept", "show", "42"]).unwrap();
            assert!(matches!(
                cli.command,
                Commands::Concept(ConceptCommands::Show { id: 42 })
            ));
            let cli = Cli::try_parse_from(["nauka", "concept", "delete", "5"]).unwrap();
            assert!(matches!(
                cli.command,
                Commands::Concept(ConceptCommands::Delete { id: 5 })
            ));
        }

        #[test]
        fn parse_question_add() {
            let cli = Cli::try_parse_from([
                "nauka",
                "question",
                "add",
                "3",
                "-p",
                "Which is 'cat'?",
                "-a",
                "kot",
                "-T",
                "mc",
                "--choices",
                "kot,pies",
            ])
            .unwrap();
            match cli.command {
                Commands::Question(QuestionCommands::Add {
                    concept,
                    prompt,
                    answer,
                    question_type,
                    choices,
                }) => {
                    assert_eq!(concept, 3);
                    assert_eq!(prompt, "Which is 'cat'?");
                    assert_eq!(answer, "kot");
                    assert_eq!(question_type, "mc");
                    assert_eq!(choices, Some("kot,pies".to_string()));
                }
                _ => panic!("Expected Question Add command"),
            }
        }

        #[test]
        fn parse_question_type_defaults_to_translation() {
            let cli =
                Cli::try_parse_from(["nauka", "question", "add", "3", "-p", "cat", "-a", "kot"])
                    .unwrap();
            match cli.command {
                Commands::Question(QuestionCommands::Add { question_type, .. }) => {
                    assert_eq!(question_type, "translation");
                }
                _ => panic!("Expected Question Add command"),
            }
        }

        #[test]
        fn parse_due_and_drill() {
            let cli = Cli::try_parse_from(["nauka", "due", "-c", "A1", "-l", "5"]).unwrap();
            match cli.command {
                Commands::Due { course, limit } => {
                    assert_eq!(course, Some("A1".to_string()));
                    assert_eq!(limit, Some(5));
                }
                _ => panic!("Expected Due command"),
            }
            let cli = Cli::try_parse_from(["nauka", "drill"]).unwrap();
            assert!(matches!(
                cli.command,
                Commands::Drill {
                    course: None,
                    limit: None
                }
            ));
        }

        #[test]
        fn parse_next_with_course() {
            let cli = Cli::try_parse_from(["nauka", "next", "--course", "A1"]).unwrap();
            match cli.command {
                Commands::Next { course } => assert_eq!(course, Some("A1".to_string())),
                _ => panic!("Expected Next command"),
            }
        }

        #[test]
        fn parse_practice() {
            let cli = Cli::try_parse_from(["nauka", "practice", "7", "-g", "good"]).unwrap();
            match cli.command {
                Commands::Practice { id, grade, drill } => {
                    assert_eq!(id, 7);
                    assert_eq!(grade, "good");
                    assert!(!drill);
                }
                _ => panic!("Expected Practice command"),
            }
            let cli =
                Cli::try_parse_from(["nauka", "practice", "7", "--grade", "again", "--drill"])
                    .unwrap();
            assert!(matches!(cli.command, Commands::Practice { drill: true, .. }));
        }

        #[test]
        fn parse_check() {
            let cli = Cli::try_parse_from(["nauka", "check", "12", "dziękuję"]).unwrap();
            match cli.command {
                Commands::Check { question, answer } => {
                    assert_eq!(question, 12);
                    assert_eq!(answer, "dziękuję");
                }
                _ => panic!("Expected Check command"),
            }
        }

        #[test]
        fn parse_study() {
            let cli = Cli::try_parse_from(["nauka", "study", "--drill", "-l", "15"]).unwrap();
            match cli.command {
                Commands::Study {
                    drill,
                    course,
                    limit,
                } => {
                    assert!(drill);
                    assert!(course.is_none());
                    assert_eq!(limit, Some(15));
                }
                _ => panic!("Expected Study command"),
            }
        }

        #[test]
        fn parse_simple_commands() {
            let cli = Cli::try_parse_from(["nauka", "stats"]).unwrap();
            assert!(matches!(cli.command, Commands::Stats));
            let cli = Cli::try_parse_from(["nauka", "config"]).unwrap();
            assert!(matches!(cli.command, Commands::Config));
            let cli = Cli::try_parse_from(["nauka", "tui"]).unwrap();
            assert!(matches!(cli.command, Commands::Tui));
        }

        #[test]
        fn parse_sessions_limit() {
            let cli = Cli::try_parse_from(["nauka", "sessions"]).unwrap();
            assert!(matches!(cli.command, Commands::Sessions { limit: 10 }));
            let cli = Cli::try_parse_from(["nauka", "sessions", "-l", "3"]).unwrap();
            assert!(matches!(cli.command, Commands::Sessions { limit: 3 }));
        }

        #[test]
        fn parse_missing_required_arg_fails() {
            assert!(Cli::try_parse_from(["nauka", "concept", "add", "kot"]).is_err());
            assert!(Cli::try_parse_from(["nauka", "practice", "1"]).is_err());
            assert!(Cli::try_parse_from(["nauka", "check", "1"]).is_err());
            assert!(Cli::try_parse_from(["nauka", "import"]).is_err());
        }

        #[test]
        fn parse_invalid_command_fails() {
            assert!(Cli::try_parse_from(["nauka", "invalid"]).is_err());
        }
    }
}
