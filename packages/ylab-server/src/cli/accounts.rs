use anyhow::{bail, Context, Result};
use clap::Subcommand;
use sqlx::PgPool;
use ylab_core::rules::{is_valid_email, normalize_email};

use super::truncate;
use crate::auth::{generate_password, hash_password};
use crate::storage::{AccountStore, NewAdmin, NewTeam, PostgresAccountStore};

/// Team account subcommands
#[derive(Subcommand)]
pub enum TeamCommands {
    /// Create a new team
    Create {
        /// Team name, used to log in
        #[arg(short, long)]
        name: String,

        /// Contact email address
        #[arg(short, long)]
        email: String,

        /// Password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,

        /// Starting credit (defaults to STARTING_CREDIT)
        #[arg(short, long)]
        credit: Option<i64>,
    },

    /// List all teams
    List,

    /// Show team details
    Show {
        /// Team name or email address
        team: String,
    },

    /// Set a team's credit balance
    SetCredit {
        /// Team name or email address
        team: String,

        /// New balance
        credit: i64,
    },

    /// Reset a team's password
    ResetPassword {
        /// Team name or email address
        team: String,

        /// New password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },
}

/// Admin account subcommands
#[derive(Subcommand)]
pub enum AdminCommands {
    /// Create a new admin
    Create {
        #[arg(short, long)]
        username: String,

        #[arg(short, long)]
        email: String,

        /// Password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// List all admins
    List,

    /// Reset an admin's password
    ResetPassword {
        #[arg(short, long)]
        username: String,

        /// New password (if not provided, a random one will be generated)
        #[arg(short, long)]
        password: Option<String>,
    },
}

fn hash(password: &str) -> Result<String> {
    hash_password(password).context("Failed to hash password")
}

fn checked_email(email: &str) -> Result<String> {
    if !is_valid_email(email) {
        bail!("Invalid email format: {}", email);
    }
    Ok(normalize_email(email))
}

impl TeamCommands {
    /// Execute the team command
    pub async fn execute(self, pool: PgPool, starting_credit: i64) -> Result<()> {
        let store = PostgresAccountStore::new(pool);

        match self {
            TeamCommands::Create {
                name,
                email,
                password,
                credit,
            } => {
                let credit = credit.unwrap_or(starting_credit);
                if credit < 0 {
                    bail!("Credit cannot be negative");
                }

                let password = password.unwrap_or_else(generate_password);
                let team = store
                    .create_team(NewTeam {
                        name: name.trim().to_string(),
                        email: checked_email(&email)?,
                        password_hash: hash(&password)?,
                        credit,
                    })
                    .await?;

                println!("✅ Team created successfully!");
                println!();
                println!("   ID:       {}", team.id);
                println!("   Name:     {}", team.name);
                println!("   Email:    {}", team.email);
                println!("   Password: {}", password);
                println!("   Credit:   {}", team.credit);
                println!();
                println!("⚠️  Please securely share these credentials with the team.");
            }

            TeamCommands::List => {
                let teams = store.list_teams().await?;

                if teams.is_empty() {
                    println!("No teams found.");
                    return Ok(());
                }

                println!("{:<6} {:<24} {:<30} {:>8} {:<20}", "ID", "Name", "Email", "Credit", "Last activity");
                println!("{}", "-".repeat(92));

                for team in teams {
                    println!(
                        "{:<6} {:<24} {:<30} {:>8} {:<20}",
                        team.id,
                        truncate(&team.name, 22),
                        truncate(&team.email, 28),
                        team.credit,
                        team.last_activity
                            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                            .unwrap_or_else(|| "Never".to_string())
                    );
                }
            }

            TeamCommands::Show { team } => {
                let team = find_team(&store, &team).await?;

                println!("Team Details:");
                println!("  ID:            {}", team.id);
                println!("  Name:          {}", team.name);
                println!("  Email:         {}", team.email);
                println!("  Credit:        {}", team.credit);
                println!("  Created:       {}", team.created_at);
                println!(
                    "  Last activity: {}",
                    team.last_activity
                        .map(|t| t.to_string())
                        .unwrap_or_else(|| "Never".to_string())
                );
            }

            TeamCommands::SetCredit { team, credit } => {
                if credit < 0 {
                    bail!("Credit cannot be negative");
                }
                let team = find_team(&store, &team).await?;
                let updated = store.set_team_credit(team.id, credit).await?;

                println!("✅ Credit of {} set to {} (was {}).", updated.name, updated.credit, team.credit);
            }

            TeamCommands::ResetPassword { team, password } => {
                let team = find_team(&store, &team).await?;
                let password = password.unwrap_or_else(generate_password);
                store.set_team_password(team.id, &hash(&password)?).await?;

                println!("✅ Password reset successfully!");
                println!();
                println!("   Team:         {}", team.name);
                println!("   New Password: {}", password);
                println!();
                println!("⚠️  Please securely share the new password with the team.");
            }
        }

        Ok(())
    }
}

async fn find_team(store: &PostgresAccountStore, login: &str) -> Result<ylab_core::TeamProfile> {
    match store.find_team_credentials(login.trim()).await? {
        Some((team, _)) => Ok(team),
        None => bail!("Team not found: {}", login),
    }
}

impl AdminCommands {
    /// Execute the admin command
    pub async fn execute(self, pool: PgPool) -> Result<()> {
        let store = PostgresAccountStore::new(pool);

        match self {
            AdminCommands::Create {
                username,
                email,
                password,
            } => {
                let password = password.unwrap_or_else(generate_password);
                let admin = store
                    .create_admin(NewAdmin {
                        username: username.trim().to_string(),
                        email: checked_email(&email)?,
                        password_hash: hash(&password)?,
                    })
                    .await?;

                println!("✅ Admin created successfully!");
                println!();
                println!("   Username: {}", admin.username);
                println!("   Email:    {}", admin.email);
                println!("   Password: {}", password);
            }

            AdminCommands::List => {
                let admins = store.list_admins().await?;

                if admins.is_empty() {
                    println!("No admins found.");
                    return Ok(());
                }

                println!("{:<6} {:<24} {:<30}", "ID", "Username", "Email");
                println!("{}", "-".repeat(62));
                for admin in admins {
                    println!(
                        "{:<6} {:<24} {:<30}",
                        admin.id,
                        truncate(&admin.username, 22),
                        truncate(&admin.email, 28)
                    );
                }
            }

            AdminCommands::ResetPassword { username, password } => {
                let (admin, _) = match store.find_admin_credentials(username.trim()).await? {
                    Some(found) => found,
                    None => bail!("Admin not found: {}", username),
                };
                let password = password.unwrap_or_else(generate_password);
                store.set_admin_password(admin.id, &hash(&password)?).await?;

                println!("✅ Password reset for {}: {}", admin.username, password);
            }
        }

        Ok(())
    }
}
