use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use recitation_judge::config;
use recitation_judge::contestant::{
    filter_results, grading_committees, CommitteeId, ContestantField, ContestantId, NewContestant,
    StatusFilter,
};
use recitation_judge::output;
use recitation_judge::scoring::{normalize_number, GradeSet};
use recitation_judge::session::{self, EvaluationSession};
use recitation_judge::store::{GradeStore, StoreError};
use recitation_judge::EngineError;

const EXIT_SUCCESS: i32 = 0;
const EXIT_DOMAIN: i32 = 1;
const EXIT_STORE: i32 = 2;
const EXIT_CONFIG: i32 = 4;

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write a config file interactively
    Init,
    /// List grading committees
    Committees,
    /// List contestants a committee still has to grade
    Roster {
        /// Committee id
        committee: String,
    },
    /// Show a contestant's per-question marks and running total
    Sheet {
        /// Contestant id
        contestant: String,
    },
    /// Record marks for one question (free text, non-numbers count as 0)
    Grade {
        /// Contestant id
        contestant: String,
        /// Question number (1-based)
        question: u32,
        /// Memorization mark
        memorization: String,
        /// Performance mark
        performance: String,
        /// Tajweed mark (ignored for contestants aged 12 or younger)
        #[arg(default_value = "0")]
        tajweed: String,
    },
    /// Lock a contestant's grades and store the stage total
    Finalize {
        /// Contestant id
        contestant: String,
    },
    /// Delete all grades of a contestant and reopen it for grading
    Reset {
        /// Contestant id
        contestant: String,
    },
    /// List results for administrators
    Results {
        /// Only this committee
        #[arg(long)]
        committee: Option<String>,
        /// all, submitted or pending
        #[arg(long, default_value = "all")]
        status: StatusFilter,
        /// Tab-separated output for scripting
        #[arg(long)]
        tsv: bool,
    },
    /// Register a contestant
    Add {
        /// Full name
        #[arg(long)]
        name: String,
        /// Committee id
        #[arg(long)]
        committee: String,
        #[arg(long, default_value = "0")]
        age: String,
        /// Number of memorized parts
        #[arg(long, default_value = "0")]
        parts: String,
        #[arg(long, default_value = "")]
        department: String,
        /// Memorized part numbers, e.g. "28,29,30"
        #[arg(long, default_value = "")]
        part_indices: String,
    },
    /// Edit one field of a contestant
    Update {
        /// Contestant id
        contestant: String,
        /// committee, name, age, parts, department or part-indices
        field: ContestantField,
        value: String,
    },
}

#[derive(Parser, Debug)]
#[command(name = "recitation-judge")]
#[command(about = "Score Quran recitation exams committee by committee", long_about = None)]
#[command(version)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to config file (defaults to ~/.config/recitation-judge/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() {
    // Install rustls crypto provider (required for rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let cli = Cli::parse();
    let config_path = cli.config.map(PathBuf::from);

    if let Commands::Init = cli.command {
        recitation_judge::logging::init("warn", cli.verbose);
        if let Err(e) = config::run_init(config_path) {
            eprintln!("Init failed: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
        std::process::exit(EXIT_SUCCESS);
    }

    let config = match config::load_config(config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(errors) = config::validate_config(&config) {
        eprintln!("Config errors:");
        for error in errors {
            eprintln!("  - {}", error);
        }
        std::process::exit(EXIT_CONFIG);
    }

    recitation_judge::logging::init(config.log_level(), cli.verbose);

    let store = match config::open_store(&config) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Store error: {:#}", e);
            std::process::exit(EXIT_CONFIG);
        }
    };

    if let Err(e) = run(cli.command, store.as_ref()).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }

    std::process::exit(EXIT_SUCCESS);
}

/// Store failures (wrapped or not) are 2, every other failure is a domain error.
fn exit_code(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if cause.downcast_ref::<StoreError>().is_some() {
            return EXIT_STORE;
        }
        if let Some(EngineError::Collaborator(_)) = cause.downcast_ref::<EngineError>() {
            return EXIT_STORE;
        }
    }
    EXIT_DOMAIN
}

async fn run(command: Commands, store: &dyn GradeStore) -> Result<()> {
    let use_colors = output::should_use_colors();

    match command {
        Commands::Init => anyhow::bail!("init runs before a store is opened"),
        Commands::Committees => {
            let committees = store.fetch_committees().await?;
            println!(
                "{}",
                output::format_committees(&grading_committees(&committees), use_colors)
            );
        }
        Commands::Roster { committee } => {
            let mut session = EvaluationSession::new(CommitteeId::from(committee));
            session.load_roster(store).await?;
            println!("{}", output::format_roster(session.roster(), use_colors));
        }
        Commands::Sheet { contestant } => {
            let id = ContestantId::from(contestant);
            let (contestants, entries) =
                tokio::try_join!(store.fetch_contestants(), store.fetch_grades(&id))?;
            let contestant = contestants
                .into_iter()
                .find(|c| c.id == id)
                .ok_or_else(|| EngineError::ContestantNotFound(id.clone()))?;

            let config = contestant.stage_config();
            let grades = GradeSet::load(id, entries, &config);
            println!(
                "{}",
                output::format_grade_sheet(&contestant, &config, &grades, use_colors)
            );
        }
        Commands::Grade {
            contestant,
            question,
            memorization,
            performance,
            tajweed,
        } => {
            let id = ContestantId::from(contestant);
            let contestants = store.fetch_contestants().await?;
            let target = contestants
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| EngineError::ContestantNotFound(id.clone()))?;
            if target.submitted {
                return Err(EngineError::AlreadyFinalized(id).into());
            }

            let mut session = EvaluationSession::new(target.committee_id.clone());
            session.load_roster_from(contestants);
            session.select_contestant(store, &id).await?;
            if !session.go_to_question(question) {
                return Err(EngineError::QuestionNotFound(question).into());
            }

            session
                .record_grade_from_text(store, &memorization, &performance, &tajweed)
                .await?;

            if let (Some(contestant), Some(config), Some(grades)) = (
                session.current_contestant(),
                session.stage_config(),
                session.grades(),
            ) {
                println!(
                    "{}",
                    output::format_grade_sheet(contestant, config, grades, use_colors)
                );
            }
        }
        Commands::Finalize { contestant } => {
            let outcome = session::finalize(store, &ContestantId::from(contestant)).await?;
            println!(
                "Finalized {}: {} / {} ({})",
                outcome.contestant_id,
                output::format_score(outcome.total.total),
                output::format_score(outcome.total.max),
                output::format_percentage(outcome.total.percentage())
            );
        }
        Commands::Reset { contestant } => {
            let id = ContestantId::from(contestant);
            let removed = session::reset(store, &id).await?;
            println!("Reset {}: removed {} grade rows", id, removed);
        }
        Commands::Results {
            committee,
            status,
            tsv,
        } => {
            let contestants = store.fetch_contestants().await?;
            let committee = committee.map(CommitteeId::from);
            let results = filter_results(&contestants, committee.as_ref(), status);
            if tsv {
                println!("{}", output::format_results_tsv(&results));
            } else {
                println!("{}", output::format_results_table(&results, use_colors));
            }
        }
        Commands::Add {
            name,
            committee,
            age,
            parts,
            department,
            part_indices,
        } => {
            let id = store
                .add_contestant(NewContestant {
                    name: name.trim().to_string(),
                    age: normalize_number(&age),
                    department: department.trim().to_string(),
                    parts_count: normalize_number(&parts),
                    part_indices: part_indices.trim().to_string(),
                    committee_id: CommitteeId::from(committee),
                })
                .await
                .context("Failed to add contestant")?;
            println!("Added contestant {}", id);
        }
        Commands::Update {
            contestant,
            field,
            value,
        } => {
            let id = ContestantId::from(contestant);
            store
                .update_contestant(&id, field, &value)
                .await
                .with_context(|| format!("Failed to update contestant {}", id))?;
            println!("Updated {} of {}", field.sheet_key(), id);
        }
    }

    Ok(())
}
