mod db;
mod models;
mod quiz;
mod scheduling;
mod sequencer;
mod store;

use clap::{Parser, Subcommand};
use std::collections::BTreeSet;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use rand::Rng;

use db::Database;
use models::{JsonOutput, LearningSession, NewSession, Outcome, QuestionStats};
use quiz::{format_elapsed, DrawOrder, QuizRun};
use scheduling::Scheduler;
use store::{BlobStore, MemoryBlobStore, StatsStore};

const DEFAULT_DB_NAME: &str = "quizstats.db";

#[derive(Parser)]
#[command(name = "quizstats")]
#[command(about = "Learning statistics and spaced-repetition scheduling for quiz sessions")]
#[command(version)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Keep everything in memory for this run only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Record an answer for a question
    Record {
        /// Question ID
        id: String,

        /// Outcome: wrong/correct
        #[arg(long, short)]
        outcome: String,
    },

    /// Show learning stats for a question
    Show {
        /// Question ID
        id: String,
    },

    /// Order questions hardest first
    Sort {
        /// Question IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },

    /// List questions due for review
    Due {
        /// Question IDs (defaults to every tracked question)
        ids: Vec<String>,
    },

    /// Run an interactive quiz over the given questions
    Quiz {
        /// Question IDs
        #[arg(required = true)]
        ids: Vec<String>,

        /// Topic the questions belong to (repeatable)
        #[arg(long, short)]
        topic: Vec<String>,

        /// Ask hardest questions first instead of at random
        #[arg(long, short)]
        sequential: bool,
    },

    /// Append a finished session to the log
    Session {
        /// Number of questions in the session
        #[arg(long)]
        total: usize,

        /// Comma-separated topic IDs
        #[arg(long, short)]
        topics: Option<String>,

        /// Comma-separated IDs of questions marked unknown
        #[arg(long, short)]
        unknown: Option<String>,

        /// Elapsed time in milliseconds
        #[arg(long, short, default_value_t = 0)]
        duration: u64,
    },

    /// List recent sessions
    Sessions {
        /// Maximum number of sessions to show
        #[arg(long, short, default_value_t = 10)]
        limit: usize,
    },

    /// Show learning statistics
    Stats,

    /// Reset stats for one question, or everything
    Reset {
        /// Question ID
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<String>,

        /// Clear all question stats and sessions
        #[arg(long)]
        all: bool,
    },
}

fn get_db_path() -> PathBuf {
    if let Ok(path) = std::env::var("QUIZSTATS_DB") {
        return PathBuf::from(path);
    }

    let config_dir = dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("quizstats");

    std::fs::create_dir_all(&config_dir).ok();
    config_dir.join(DEFAULT_DB_NAME)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    if cli.ephemeral {
        let mut store = StatsStore::open(MemoryBlobStore::default());
        return execute(&cli, &mut store);
    }

    let db_path = get_db_path();
    let db = Database::open(&db_path)?;

    let mut store = StatsStore::open(db);

    if let Commands::Init = cli.command {
        let keys = store.backend().keys()?;
        if cli.json {
            println!("{}", serde_json::to_string(&JsonOutput::ok(&keys))?);
        } else {
            println!("Database initialized at: {}", db_path.display());
            println!(
                "Tracked questions: {}, sessions: {}",
                store.all_stats().len(),
                store.sessions().len()
            );
        }
        return Ok(());
    }

    execute(&cli, &mut store)
}

fn execute<B: BlobStore>(
    cli: &Cli,
    store: &mut StatsStore<B>,
) -> Result<(), Box<dyn std::error::Error>> {
    match &cli.command {
        Commands::Init => {
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
            } else {
                println!("Nothing to initialize for an in-memory store.");
            }
        }

        Commands::Record { id, outcome } => {
            let outcome = Outcome::from_str(outcome).ok_or_else(|| {
                format!("Invalid outcome '{}'. Use: wrong or correct", outcome)
            })?;

            let stats = Scheduler::new(store).record_outcome(id, outcome);

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&stats))?);
            } else {
                println!("Recorded {} answer for {}.", outcome.as_str(), id);
                println!("Difficulty: {}", stats.difficulty().as_str());
                println!("Next review: {}", format_date(stats.next_review_date()));
            }
        }

        Commands::Show { id } => match store.get_question_stats(id) {
            Some(stats) => {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::ok(serde_json::json!({
                            "stats": stats,
                            "due": stats.is_due(Utc::now())
                        })))?
                    );
                } else {
                    print_stats(stats, Utc::now());
                }
            }
            None => {
                if cli.json {
                    println!(
                        "{}",
                        serde_json::to_string(&JsonOutput::<()>::err("No stats for question"))?
                    );
                } else {
                    println!("No stats recorded for {}.", id);
                }
            }
        },

        Commands::Sort { ids } => {
            let sorted = store.sequencer().sort_by_difficulty(ids);
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&sorted))?);
            } else {
                println!("{:<30} {:<8} {:>6} {:>8}", "QUESTION", "LEVEL", "WRONG", "CORRECT");
                println!("{}", "-".repeat(55));
                for id in &sorted {
                    match store.get_question_stats(id) {
                        Some(stats) => println!(
                            "{:<30} {:<8} {:>6} {:>8}",
                            truncate(id, 28),
                            stats.difficulty().as_str(),
                            stats.wrong_count(),
                            stats.correct_count()
                        ),
                        None => println!("{:<30} {:<8} {:>6} {:>8}", truncate(id, 28), "-", "-", "-"),
                    }
                }
            }
        }

        Commands::Due { ids } => {
            let pool: Vec<String> = if ids.is_empty() {
                store.all_stats().keys().cloned().collect()
            } else {
                ids.clone()
            };
            let due = store.sequencer().due_for_review(&pool, Utc::now());

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&due))?);
            } else if due.is_empty() {
                println!("Nothing due for review.");
            } else {
                println!("{} question(s) due for review:", due.len());
                for id in due {
                    println!("  {}", id);
                }
            }
        }

        Commands::Quiz {
            ids,
            topic,
            sequential,
        } => {
            let draw_order = if *sequential {
                DrawOrder::Sequential
            } else {
                DrawOrder::Random
            };
            let topic_ids: BTreeSet<String> = topic.iter().cloned().collect();

            let stdin = io::stdin();
            let mut input = stdin.lock();
            let mut output = io::stdout();
            let sessions = run_quiz(
                store,
                ids,
                topic_ids,
                draw_order,
                &mut input,
                &mut output,
                &mut rand::thread_rng(),
                !cli.json,
            )?;

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&sessions))?);
            }
        }

        Commands::Session {
            total,
            topics,
            unknown,
            duration,
        } => {
            let session = store.append_session(NewSession {
                date: Utc::now(),
                topic_ids: split_list(topics.as_deref()).into_iter().collect(),
                total_questions: *total,
                unknown_questions: split_list(unknown.as_deref()),
                duration: *duration,
            });

            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&session))?);
            } else {
                println!("Saved session {}.", session.id);
            }
        }

        Commands::Sessions { limit } => {
            let sessions: Vec<&LearningSession> = store.sessions().iter().take(*limit).collect();
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&sessions))?);
            } else if sessions.is_empty() {
                println!("No sessions recorded.");
            } else {
                println!(
                    "{:<15} {:<17} {:>6} {:>8} {:>9}  TOPICS",
                    "ID", "DATE", "TOTAL", "UNKNOWN", "TIME"
                );
                println!("{}", "-".repeat(75));
                for session in sessions {
                    let topics = if session.topic_ids.is_empty() {
                        String::from("-")
                    } else {
                        session
                            .topic_ids
                            .iter()
                            .cloned()
                            .collect::<Vec<_>>()
                            .join(", ")
                    };
                    println!(
                        "{:<15} {:<17} {:>6} {:>8} {:>9}  {}",
                        session.id,
                        format_date(session.date),
                        session.total_questions,
                        session.unknown_questions.len(),
                        format_elapsed(session.duration),
                        topics
                    );
                }
            }
        }

        Commands::Stats => {
            let summary = store.summary(Utc::now());
            if cli.json {
                println!("{}", serde_json::to_string(&JsonOutput::ok(&summary))?);
            } else {
                println!("=== Learning Statistics ===");
                println!("Tracked questions: {}", summary.tracked_questions);
                println!(
                    "Hard / medium / easy: {} / {} / {}",
                    summary.hard, summary.medium, summary.easy
                );
                println!(
                    "Answers: {} correct, {} wrong ({:.0}% correct)",
                    summary.total_correct,
                    summary.total_wrong,
                    summary.accuracy()
                );
                println!("Due for review: {}", summary.due_now);
                println!("Sessions: {}", summary.sessions);
                if let Some(last) = summary.last_session {
                    println!("Last session: {}", format_date(last));
                }
            }
        }

        Commands::Reset { id, all } => {
            let mut scheduler = Scheduler::new(store);
            if *all {
                scheduler.reset_all();
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::<()>::ok(()))?);
                } else {
                    println!("All stats and sessions cleared.");
                }
            } else if let Some(id) = id {
                let removed = scheduler.reset_question(id);
                if cli.json {
                    println!("{}", serde_json::to_string(&JsonOutput::ok(removed))?);
                } else if removed {
                    println!("Stats for {} reset.", id);
                } else {
                    println!("No stats recorded for {}.", id);
                }
            }
        }
    }

    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Answer {
    Known,
    Unknown,
    Stop,
}

fn parse_answer(line: &str) -> Option<Answer> {
    match line.trim().to_lowercase().as_str() {
        "" | "k" | "known" | "y" | "yes" => Some(Answer::Known),
        "u" | "unknown" | "n" | "no" => Some(Answer::Unknown),
        "q" | "quit" | "stop" => Some(Answer::Stop),
        _ => None,
    }
}

// Reads one line; None at end of input
fn read_line<I: BufRead>(input: &mut I) -> io::Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

/// Runs a quiz, and optionally review passes over the unknown questions, on a
/// line-based terminal. Every finished or stopped pass is appended to the
/// session log and returned.
#[allow(clippy::too_many_arguments)]
fn run_quiz<B, I, O, R>(
    store: &mut StatsStore<B>,
    pool: &[String],
    topic_ids: BTreeSet<String>,
    draw_order: DrawOrder,
    input: &mut I,
    output: &mut O,
    rng: &mut R,
    verbose: bool,
) -> io::Result<Vec<LearningSession>>
where
    B: BlobStore,
    I: BufRead,
    O: Write,
    R: Rng,
{
    let mut saved = Vec::new();
    let Some(mut run) = QuizRun::start(&store.sequencer(), pool, topic_ids, draw_order, Utc::now())
    else {
        writeln!(output, "No questions to quiz.")?;
        return Ok(saved);
    };

    loop {
        let mut input_closed = false;

        'questions: while let Some(id) = run.draw(rng).map(str::to_string) {
            loop {
                write!(
                    output,
                    "[{}/{}] {}  (Enter=known, u=unknown, q=stop): ",
                    run.answered() + 1,
                    run.total(),
                    id
                )?;
                output.flush()?;

                let Some(line) = read_line(input)? else {
                    input_closed = true;
                    break 'questions;
                };

                match parse_answer(&line) {
                    Some(Answer::Known) => {
                        run.answer(&mut Scheduler::new(store), Outcome::Correct, Utc::now());
                        break;
                    }
                    Some(Answer::Unknown) => {
                        run.answer(&mut Scheduler::new(store), Outcome::Wrong, Utc::now());
                        break;
                    }
                    Some(Answer::Stop) => break 'questions,
                    None => writeln!(output, "Please answer with Enter, u or q.")?,
                }
            }
        }

        let session = store.append_session(run.finish(Utc::now()));
        if verbose {
            writeln!(output)?;
            writeln!(output, "=== {} Results ===", run.mode().label())?;
            writeln!(output, "Answered: {}/{}", run.answered(), run.total())?;
            if !run.is_exhausted() {
                writeln!(output, "Stopped early.")?;
            }
            writeln!(output, "Unknown: {}", run.unknown().len())?;
            for id in run.unknown() {
                writeln!(output, "  {}", id)?;
            }
            writeln!(output, "Time: {}", format_elapsed(session.duration))?;
        }
        saved.push(session);

        if input_closed || run.unknown().is_empty() {
            break;
        }

        write!(
            output,
            "Review {} unknown question(s)? [y/N]: ",
            run.unknown().len()
        )?;
        output.flush()?;
        let again = read_line(input)?
            .map(|line| matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
            .unwrap_or(false);
        if !again {
            break;
        }

        match QuizRun::review(&run, &store.sequencer(), Utc::now()) {
            Some(review) => run = review,
            None => break,
        }
    }

    Ok(saved)
}

fn print_stats(stats: &QuestionStats, now: DateTime<Utc>) {
    println!("Question: {}", stats.question_id());
    println!("Difficulty: {}", stats.difficulty().as_str());
    println!(
        "Answers: {} ({} wrong, {} correct, {:.0}% correct)",
        stats.times_answered(),
        stats.wrong_count(),
        stats.correct_count(),
        stats.success_rate()
    );
    println!("Last reviewed: {}", format_date(stats.last_review_date()));
    println!("Next review: {}", format_date(stats.next_review_date()));
    println!("Due now: {}", if stats.is_due(now) { "yes" } else { "no" });
}

fn format_date(date: DateTime<Utc>) -> String {
    date.format("%Y-%m-%d %H:%M").to_string()
}

fn split_list(list: Option<&str>) -> Vec<String> {
    list.map(|l| {
        l.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
    .unwrap_or_default()
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}
