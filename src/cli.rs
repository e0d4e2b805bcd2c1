//! CLI interface for adaptive-translation

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use crate::config::{self, Config};
use crate::engine::AdaptiveEngine;
use crate::types::{ApprovalState, Correction, DomainType, FeedbackRecord, Language};

#[derive(Parser)]
#[command(name = "adaptive-translation")]
#[command(about = "Self-training recipe translation memory with evaluation and self-critique", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Log engine activity at info level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the platform default
    #[arg(short, long, global = true, env = "ADAPTIVE_TRANSLATION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Translate a text using the learned memory
    Translate {
        /// Text to translate
        text: String,
        /// Domain type (ingredient, instruction, recipeName, unit, quantity)
        #[arg(short = 't', long = "type", default_value = "ingredient")]
        domain_type: String,
        /// Target language (fr, es)
        #[arg(short, long, default_value = "fr")]
        lang: String,
    },
    /// Submit or list feedback
    Feedback {
        #[command(subcommand)]
        command: FeedbackCommands,
    },
    /// Approve a feedback record
    Approve {
        id: i64,
        /// Approver name (default: admin)
        #[arg(long)]
        by: Option<String>,
    },
    /// Reject a pending feedback record
    Reject {
        id: i64,
    },
    /// Auto-validate pending feedback against the reference dictionary
    Validate,
    /// Fold newly approved feedback into the memory
    Learn,
    /// Rebuild every model from all approved feedback
    Retrain,
    /// Show memory, feedback and learning statistics
    Stats,
    /// Evaluate translation quality on sample recipes
    Evaluate {
        /// Number of recipes (default from config)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },
    /// Run a self-critique and act on its challenges
    Critique {
        /// Show the latest critique instead of running a new one
        #[arg(long)]
        latest: bool,
        /// Show the critique summary history
        #[arg(long, conflicts_with = "latest")]
        history: bool,
    },
    /// Inspect automatic actions
    Actions {
        #[command(subcommand)]
        command: ActionCommands,
    },
    /// Run validation, learning, retraining and critique on a schedule
    Daemon,
    /// Show or initialize configuration
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Subcommand)]
enum FeedbackCommands {
    /// Submit a correction
    Submit {
        /// Original (English) text
        original: String,
        /// Corrected translation
        suggested: String,
        #[arg(short = 't', long = "type", default_value = "ingredient")]
        domain_type: String,
        #[arg(short, long, default_value = "fr")]
        lang: String,
        /// Translation that was shown before the correction
        #[arg(long)]
        current: Option<String>,
    },
    /// List recent feedback
    List {
        /// Filter by state (pending, approved, rejected)
        #[arg(short, long)]
        state: Option<String>,
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
}

#[derive(Subcommand)]
enum ActionCommands {
    /// Show recent action executions
    History {
        #[arg(short, long)]
        limit: Option<usize>,
    },
}

fn parse_state(state: &str) -> Result<ApprovalState> {
    match state.trim().to_lowercase().as_str() {
        "pending" => Ok(ApprovalState::Pending),
        "approved" => Ok(ApprovalState::Approved),
        "rejected" => Ok(ApprovalState::Rejected),
        other => anyhow::bail!("Unknown feedback state: {}", other),
    }
}

fn print_record(record: &FeedbackRecord) {
    println!(
        "#{:<5} [{}] {} {} '{}' -> '{}'{}",
        record.id,
        record.approval,
        record.domain_type,
        record.target_language,
        record.original_text,
        record.suggested_translation.as_deref().unwrap_or(""),
        record.approved_by.as_ref().map(|by| format!(" (by {})", by)).unwrap_or_default(),
    );
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn load_config(path: Option<&PathBuf>) -> Result<Config> {
    match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
}

/// Run the CLI
pub async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_ref())?;

    if let Commands::Config { show, init } = &cli.command {
        if *init {
            config.save()?;
            println!("Configuration written to {}", config::config_path()?.display());
        }
        if *show || !*init {
            config::show_config(&config)?;
        }
        return Ok(());
    }

    let engine = AdaptiveEngine::open(config).await?;

    match cli.command {
        Commands::Translate { text, domain_type, lang } => {
            let domain: DomainType = domain_type.parse()?;
            let language: Language = lang.parse()?;
            match engine.translate(&text, domain, language).await {
                Some(resolution) => println!(
                    "{} ({} match, confidence {:.2})",
                    resolution.translation, resolution.strategy, resolution.confidence
                ),
                None => println!("No translation known for '{}'", text),
            }
        }
        Commands::Feedback { command } => match command {
            FeedbackCommands::Submit { original, suggested, domain_type, lang, current } => {
                let record = engine
                    .submit_feedback(Correction {
                        domain_type,
                        original_text: original,
                        current_translation: current,
                        suggested_translation: suggested,
                        target_language: lang,
                    })
                    .await?;
                println!("Feedback #{} recorded, pending validation.", record.id);
            }
            FeedbackCommands::List { state, limit } => {
                let state = state.as_deref().map(parse_state).transpose()?;
                let records = engine.list_feedback(state, limit).await?;
                if records.is_empty() {
                    println!("No feedback found.");
                }
                for record in &records {
                    print_record(record);
                }
            }
        },
        Commands::Approve { id, by } => {
            let record = engine.approve(id, by.as_deref()).await?;
            print_record(&record);
        }
        Commands::Reject { id } => {
            let record = engine.reject(id).await?;
            print_record(&record);
        }
        Commands::Validate => {
            let summary = engine.validate().await?;
            println!(
                "Validated {} of {} pending feedbacks ({} left for review).",
                summary.validated, summary.examined, summary.left_pending
            );
        }
        Commands::Learn => {
            let cycle = engine.process_new_approved().await?;
            println!(
                "Learned {} of {} approved records ({} skipped), cursor {} -> {}.",
                cycle.trained, cycle.fetched, cycle.skipped, cycle.cursor_before, cycle.cursor_after
            );
        }
        Commands::Retrain => {
            let summary = engine.retrain().await?;
            println!(
                "Retrained on {} of {} approved records ({} skipped), cursor {}.",
                summary.trained, summary.records, summary.skipped, summary.cursor
            );
        }
        Commands::Stats => {
            print_json(&engine.get_stats().await?)?;
        }
        Commands::Evaluate { count } => {
            let report = engine.evaluate(count).await?;
            println!("Source: {} ({} recipes)", report.source, report.recipes);
            for (domain, counts) in &report.by_domain {
                println!(
                    "  {:<12} correct {:>4}  incorrect {:>4}  missing {:>4}",
                    domain, counts.correct, counts.incorrect, counts.missing
                );
            }
            println!("Accuracy: {:.1}%  Coverage: {:.1}%", report.accuracy, report.coverage);
        }
        Commands::Critique { latest, history } => {
            if history {
                print_json(&engine.critique_history()?)?;
            } else if latest {
                match engine.get_latest_critique()? {
                    Some(report) => print_json(&report)?,
                    None => println!("No critique has been produced yet."),
                }
            } else {
                let outcome = engine.critique().await?;
                let report = &outcome.report;
                println!("Accuracy: {:.1}% over {} tests, trend {}",
                    report.overall.accuracy, report.overall.total_tests, report.comparison.trend);
                println!("Strengths ({}):", report.strengths.len());
                for finding in &report.strengths {
                    println!("  + {}", finding.description);
                }
                println!("Weaknesses ({}):", report.weaknesses.len());
                for finding in &report.weaknesses {
                    println!("  - {}", finding.description);
                }
                println!("Recommendations ({}):", report.recommendations.len());
                for rec in &report.recommendations {
                    println!("  [{}] {}", rec.priority, rec.action);
                }
                println!("Actions executed: {}", outcome.actions.executed);
                for result in &outcome.actions.results {
                    println!("  {} {}: {}", if result.success { "ok " } else { "ERR" }, result.challenge_id, result.message);
                }
            }
        }
        Commands::Actions { command } => match command {
            ActionCommands::History { limit } => {
                let history = engine.get_action_history(limit)?;
                if history.is_empty() {
                    println!("No actions recorded.");
                }
                for record in &history {
                    println!(
                        "{} {} [{}] {}: {}",
                        record.timestamp.format("%Y-%m-%d %H:%M:%S"),
                        if record.success { "ok " } else { "ERR" },
                        record.actions.join(" -> "),
                        record.challenge_id,
                        record.message
                    );
                }
            }
        },
        Commands::Daemon => {
            crate::daemon::run(Arc::new(engine)).await?;
        }
        Commands::Config { .. } => {}
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_translate() {
        let cli = Cli::try_parse_from(["adaptive-translation", "-v", "translate", "Chicken", "--lang", "es"]).unwrap();
        assert!(cli.verbose);
        match cli.command {
            Commands::Translate { text, domain_type, lang } => {
                assert_eq!(text, "Chicken");
                assert_eq!(domain_type, "ingredient");
                assert_eq!(lang, "es");
            }
            _ => panic!("expected translate"),
        }
    }

    #[test]
    fn test_parse_state() {
        assert_eq!(parse_state("Approved").unwrap(), ApprovalState::Approved);
        assert!(parse_state("archived").is_err());
    }
}
