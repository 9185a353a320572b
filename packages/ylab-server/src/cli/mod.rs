mod accounts;
mod catalog;
mod polls;

pub use accounts::{AdminCommands, TeamCommands};
pub use catalog::{CompositionCommands, ResourceCommands};
pub use polls::PollCommands;

use clap::{Parser, Subcommand};

/// YLab Market Server - team credit marketplace
#[derive(Parser)]
#[command(name = "ylab-server")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the server (default)
    Serve,

    /// Team account management
    #[command(subcommand)]
    Team(TeamCommands),

    /// Admin account management
    #[command(subcommand)]
    Admin(AdminCommands),

    /// Catalog management
    #[command(subcommand)]
    Resource(ResourceCommands),

    /// Team composition boards
    #[command(subcommand)]
    Composition(CompositionCommands),

    /// Poll management
    #[command(subcommand)]
    Poll(PollCommands),

    /// Show recent audit logs
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: i64,

        /// Filter by principal, e.g. "team:3" or "admin:1"
        #[arg(short, long)]
        principal: Option<String>,
    },
}

/// Truncate string to max length with ellipsis
pub(crate) fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
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
    fn test_serve_is_default() {
        let cli = Cli::try_parse_from(["ylab-server"]).unwrap();
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate("matériel", 10), "matériel");
        assert_eq!(truncate("Équipe des développeurs", 10), "Équipe ...");
    }
}
