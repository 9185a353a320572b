use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Subcommand;
use sqlx::PgPool;
use ylab_core::PollId;

use super::truncate;
use crate::storage::{NewPoll, PollStore, PostgresPollStore};

fn parse_date(raw: &str) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| format!("expected an RFC 3339 date such as 2025-05-12T09:00:00Z ({})", e))
}

/// Poll subcommands
#[derive(Subcommand)]
pub enum PollCommands {
    /// Open a new poll
    Create {
        #[arg(short, long)]
        question: String,

        /// Answer option, repeat for each one
        #[arg(short, long = "option", required = true)]
        options: Vec<String>,

        /// Start of voting (defaults to now)
        #[arg(long, value_parser = parse_date)]
        start: Option<DateTime<Utc>>,

        /// End of voting
        #[arg(long, value_parser = parse_date)]
        end: DateTime<Utc>,
    },

    /// Close a poll
    Close { id: PollId },

    /// List polls
    List,
}

/// Options trimmed, blanks dropped, duplicates rejected
fn clean_options(options: Vec<String>) -> Result<Vec<String>> {
    let mut cleaned: Vec<String> = Vec::with_capacity(options.len());
    for option in options {
        let option = option.trim().to_string();
        if option.is_empty() {
            continue;
        }
        if cleaned.contains(&option) {
            bail!("Duplicate option: {}", option);
        }
        cleaned.push(option);
    }

    if cleaned.len() < 2 {
        bail!("A poll needs at least two options");
    }
    Ok(cleaned)
}

impl PollCommands {
    /// Execute the poll command
    pub async fn execute(self, pool: PgPool) -> Result<()> {
        let store = PostgresPollStore::new(pool);

        match self {
            PollCommands::Create {
                question,
                options,
                start,
                end,
            } => {
                let start_date = start.unwrap_or_else(Utc::now);
                if end <= start_date {
                    bail!("The poll must end after it starts");
                }

                let poll = store
                    .create_poll(NewPoll {
                        question: question.trim().to_string(),
                        options: clean_options(options)?,
                        start_date,
                        end_date: end,
                    })
                    .await?;

                println!("✅ Poll #{} opened: {}", poll.id, poll.question);
                println!("   Options: {}", poll.options.join(", "));
                println!("   Voting:  {} → {}", poll.start_date, poll.end_date);
            }

            PollCommands::Close { id } => {
                let poll = store.close_poll(id).await?;
                println!("✅ Poll #{} closed.", poll.id);
            }

            PollCommands::List => {
                let polls = store.list_polls(None).await?;

                if polls.is_empty() {
                    println!("No polls found.");
                    return Ok(());
                }

                println!("{:<6} {:<40} {:<8} {:<17} {:<17}", "ID", "Question", "Status", "Start", "End");
                println!("{}", "-".repeat(92));

                for poll in polls {
                    println!(
                        "{:<6} {:<40} {:<8} {:<17} {:<17}",
                        poll.id,
                        truncate(&poll.question, 38),
                        poll.status.as_str(),
                        poll.start_date.format("%Y-%m-%d %H:%M"),
                        poll.end_date.format("%Y-%m-%d %H:%M")
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_options() {
        let options = clean_options(vec![" Oui ".into(), "".into(), "Non".into()]).unwrap();
        assert_eq!(options, vec!["Oui", "Non"]);

        assert!(clean_options(vec!["Oui".into(), "Oui".into()]).is_err());
        assert!(clean_options(vec!["Oui".into()]).is_err());
    }

    #[test]
    fn test_parse_date() {
        let date = parse_date("2025-05-12T09:00:00+02:00").unwrap();
        assert_eq!(date.to_rfc3339(), "2025-05-12T07:00:00+00:00");
        assert!(parse_date("12/05/2025").is_err());
    }
}
