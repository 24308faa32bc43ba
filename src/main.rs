use clap::{Parser, Subcommand, ValueEnum};
use speakwell::{
    celebration::{self, Celebration},
    config::{ConfigStore, FileConfigStore},
    difficulty::{Adjustment, PerformanceSample},
    export,
    logging,
    progress::LedgerRules,
    store::SqliteStore,
    Session,
};
use std::{
    error::Error,
    fs::File,
    io::{self, Write},
    path::PathBuf,
};

/// speaking practice progress: adaptive difficulty, xp, streaks and achievements
#[derive(Parser, Debug, Clone)]
#[clap(
    version,
    about,
    long_about = "Records practice events against the local progress store: performance samples drive the difficulty level, practice activity feeds xp, streaks and achievements."
)]
pub struct Cli {
    /// path to the progress database (defaults to the platform state directory)
    #[clap(long, global = true)]
    db: Option<PathBuf>,

    /// path to the config file (defaults to the platform config directory)
    #[clap(long, global = true)]
    config: Option<PathBuf>,

    /// log filter, e.g. "speakwell=debug"; RUST_LOG takes precedence
    #[clap(long, global = true)]
    log: Option<String>,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// record one performance sample from a practice turn
    Sample {
        #[clap(long, value_parser = parse_score)]
        pronunciation: Option<f64>,
        #[clap(long, value_parser = parse_score)]
        fluency: Option<f64>,
        #[clap(long, value_parser = parse_score)]
        grammar: Option<f64>,
        #[clap(long)]
        response_time_ms: Option<f64>,
    },
    /// add practiced minutes
    Practice { minutes: u32 },
    /// mark a lesson as completed
    Lesson,
    /// mark a conversation as completed
    Conversation,
    /// add words spoken
    Words { count: u64 },
    /// record a pronunciation score (0-100)
    Pronunciation {
        #[clap(value_parser = clap::value_parser!(u32).range(0..=100))]
        score: u32,
    },
    /// mark a role-play scenario as completed
    RolePlay { scenario_id: String },
    /// record a perfect answer
    Perfect,
    /// spend the streak freeze
    Freeze,
    /// re-evaluate achievements
    Check,
    /// show current progress
    Status {
        /// print machine-readable json
        #[clap(long)]
        json: bool,
    },
    /// export progress as csv
    Export {
        #[clap(long, value_enum, default_value_t = ExportTable::Achievements)]
        table: ExportTable,
        /// write to a file instead of stdout
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
    /// reset all progress to defaults
    Reset,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum ExportTable {
    Achievements,
    Stats,
}

fn parse_score(s: &str) -> Result<f64, String> {
    let value: f64 = s.parse().map_err(|_| format!("`{s}` is not a number"))?;
    if (0.0..=100.0).contains(&value) {
        Ok(value)
    } else {
        Err(format!("score must be between 0 and 100, got {value}"))
    }
}

fn main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();

    let config_store = match &cli.config {
        Some(path) => FileConfigStore::with_path(path),
        None => FileConfigStore::new(),
    };
    let config = config_store.load();
    logging::init_tracing(cli.log.as_deref().unwrap_or(&config.log_filter));

    let store = match cli.db.clone().or_else(|| config.database_path.clone()) {
        Some(path) => SqliteStore::open(path)?,
        None => SqliteStore::open_default()?,
    };

    let mut session = Session::open(store, LedgerRules::from(&config));
    session.start_day();

    let level_before = session.ledger().level();
    let result = run(&cli.command, &mut session);

    if session.ledger().level() > level_before {
        println!("{}", celebration::level_up_line(session.ledger().level()));
    }
    let unlocked = session.drain_pending_achievements();
    if let Some(banner) = Celebration::for_unlocks(&unlocked, &mut rand::thread_rng()) {
        println!("{}", banner.render());
    }

    session.close();
    result
}

fn run(command: &Command, session: &mut Session) -> Result<(), Box<dyn Error>> {
    match command {
        Command::Sample {
            pronunciation,
            fluency,
            grammar,
            response_time_ms,
        } => {
            let adjustment = session.record_sample(PerformanceSample {
                pronunciation: *pronunciation,
                fluency: *fluency,
                grammar: *grammar,
                response_time_ms: *response_time_ms,
            });
            let level = session.difficulty().level().get();
            match adjustment {
                Adjustment::Raised => println!("difficulty raised to {level}"),
                Adjustment::Lowered => println!("difficulty lowered to {level}"),
                Adjustment::Unchanged => println!("difficulty stays at {level}"),
            }
            let settings = session.current_settings();
            println!(
                "speech speed {:.3}, vocabulary {}, sentences {}, topics {}",
                settings.speech_speed,
                settings.vocabulary_complexity,
                settings.sentence_complexity,
                settings.topic_complexity
            );
        }
        Command::Practice { minutes } => {
            session.record_practice_time(*minutes);
            let streak = session.ledger().streak();
            println!(
                "{} min today, streak {} (best {})",
                streak.today_practice_minutes, streak.current_streak, streak.longest_streak
            );
        }
        Command::Lesson => {
            session.complete_lesson();
            println!("lessons completed: {}", session.ledger().stats().lessons_completed);
        }
        Command::Conversation => {
            session.complete_conversation();
            println!(
                "conversations completed: {}",
                session.ledger().stats().conversations_completed
            );
        }
        Command::Words { count } => {
            session.record_words_spoken(*count);
            println!("words spoken: {}", session.ledger().stats().total_words_spoken);
        }
        Command::Pronunciation { score } => {
            session.record_pronunciation_score(*score);
            println!(
                "best pronunciation: {}",
                session.ledger().stats().best_pronunciation_score
            );
        }
        Command::RolePlay { scenario_id } => {
            session.complete_role_play(scenario_id);
            println!(
                "role-play scenarios completed: {}",
                session.ledger().stats().role_plays_completed.len()
            );
        }
        Command::Perfect => {
            session.record_perfect_answer();
            println!("perfect answers: {}", session.ledger().stats().perfect_answers);
        }
        Command::Freeze => {
            let had_freeze = session.ledger().streak().freeze_available;
            session.use_streak_freeze();
            if had_freeze {
                println!("streak freeze used");
            } else {
                println!("no streak freeze available");
            }
        }
        Command::Check => {
            let unlocked = session.check_and_unlock_achievements();
            if unlocked.is_empty() {
                println!("no new achievements");
            }
        }
        Command::Status { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(&session.report())?);
            } else {
                print_status(session);
            }
        }
        Command::Export { table, output } => {
            let out: Box<dyn Write> = match output {
                Some(path) => Box::new(File::create(path)?),
                None => Box::new(io::stdout().lock()),
            };
            match table {
                ExportTable::Achievements => export::write_achievements(session.ledger(), out)?,
                ExportTable::Stats => export::write_stats(session.ledger(), out)?,
            }
        }
        Command::Reset => {
            session.reset();
            println!("progress reset");
        }
    }

    Ok(())
}

fn print_status(session: &Session) {
    let report = session.report();
    println!(
        "level {} ({} xp, {:.0}% to next)",
        report.level,
        report.xp,
        report.level_progress.fraction * 100.0
    );
    println!(
        "difficulty {} ({}), trend {}",
        report.difficulty_level, report.settings.vocabulary_complexity, report.trend.trend
    );
    println!(
        "streak {} (best {}), freeze {}",
        report.streak.current_streak,
        report.streak.longest_streak,
        if report.streak.freeze_available {
            "available"
        } else {
            "used"
        }
    );
    println!("today {} min", report.streak.today_practice_minutes);
    println!("achievements {}", report.unlocked_achievements.len());
}
