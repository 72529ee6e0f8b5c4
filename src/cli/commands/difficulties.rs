//! Difficulties command implementation.

use anyhow::{Context, Result};
use clap::Subcommand;

use crate::cli::output::{OutputFormat, get_formatter};
use crate::models::{AnswerOutcome, DifficultyTopic, MAX_RECOVERY_TOPICS};

use super::Pipeline;

#[derive(Debug, Subcommand)]
pub enum DifficultiesCommand {
    /// List unresolved difficulties, most severe first
    List {
        #[arg(long, short = 'u', required = true)]
        user: String,

        #[arg(long, short = 'p', required = true)]
        project: String,
    },

    /// Record a quiz or flashcard answer for a topic
    Record {
        #[arg(long, short = 'u', required = true)]
        user: String,

        #[arg(long, short = 'p', required = true)]
        project: String,

        #[arg(long, short = 't', required = true)]
        topic: String,

        /// The answer was correct (omitting this records a miss)
        #[arg(long)]
        correct: bool,
    },

    /// Manually mark a difficulty as resolved
    Resolve {
        #[arg(long, short = 'u', required = true)]
        user: String,

        #[arg(long, short = 'p', required = true)]
        project: String,

        #[arg(long, short = 't', required = true)]
        topic: String,
    },
}

pub async fn handle_difficulties(
    cmd: DifficultiesCommand,
    format: OutputFormat,
    _verbose: bool,
) -> Result<()> {
    let pipeline = Pipeline::load()?;
    let formatter = get_formatter(format);

    match cmd {
        DifficultiesCommand::List { user, project } => {
            let topics = pipeline
                .store
                .unresolved_difficulties(&user, &project, MAX_RECOVERY_TOPICS)
                .await
                .context("failed to load difficulties")?;
            print!("{}", formatter.difficulties(&topics));
        }

        DifficultiesCommand::Record {
            user,
            project,
            topic,
            correct,
        } => {
            let existing = pipeline
                .store
                .find_difficulty(&user, &project, &topic)
                .await
                .context("failed to look up difficulty")?;

            let message = match (existing, correct) {
                (None, true) => format!("No difficulty tracked for \"{topic}\""),
                (None, false) => {
                    // First miss creates the topic at level 1
                    let created = DifficultyTopic::new(&user, &project, &topic);
                    pipeline
                        .store
                        .put_difficulty(&created)
                        .await
                        .context("failed to store difficulty")?;
                    format!("Tracking new difficulty \"{}\" at level 1", created.topic)
                }
                (Some(mut difficulty), true) => {
                    let outcome = difficulty.apply_answer(true);
                    pipeline
                        .store
                        .put_difficulty(&difficulty)
                        .await
                        .context("failed to store difficulty")?;
                    match outcome {
                        AnswerOutcome::AutoResolved => {
                            format!("\"{topic}\" auto-resolved after a full streak")
                        }
                        AnswerOutcome::Progress { streak } => {
                            format!("Progress on \"{topic}\": streak {streak}")
                        }
                        AnswerOutcome::StreakReset => unreachable!("correct answers never reset"),
                    }
                }
                (Some(mut difficulty), false) => {
                    difficulty.register_miss();
                    pipeline
                        .store
                        .put_difficulty(&difficulty)
                        .await
                        .context("failed to store difficulty")?;
                    format!(
                        "\"{topic}\" missed again, now level {} (streak reset)",
                        difficulty.level
                    )
                }
            };

            print!("{}", formatter.message(&message));
        }

        DifficultiesCommand::Resolve {
            user,
            project,
            topic,
        } => {
            let existing = pipeline
                .store
                .find_difficulty(&user, &project, &topic)
                .await
                .context("failed to look up difficulty")?;

            match existing {
                Some(mut difficulty) => {
                    difficulty.resolve();
                    pipeline
                        .store
                        .put_difficulty(&difficulty)
                        .await
                        .context("failed to store difficulty")?;
                    print!("{}", formatter.message(&format!("Resolved \"{topic}\"")));
                }
                None => {
                    print!(
                        "{}",
                        formatter.message(&format!("No difficulty tracked for \"{topic}\""))
                    );
                }
            }
        }
    }

    Ok(())
}
