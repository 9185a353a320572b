use ylab_core::api::Role;
use ylab_core::rules::is_valid_email;
use ylab_core::TeamProfile;

use super::{report, Context};
use crate::cli::ProfileCommand;
use crate::exit_codes;

fn print_profile(team: &TeamProfile) {
    println!("Team:          {} (#{})", team.name, team.id);
    println!("Email:         {}", team.email);
    println!("Credit:        {}", team.credit);
    println!(
        "Last activity: {}",
        team.last_activity
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "Never".to_string())
    );
}

pub async fn execute(ctx: &Context, cmd: ProfileCommand) -> i32 {
    if let ProfileCommand::Email { email } = &cmd {
        if !is_valid_email(email) {
            eprintln!("Error: Invalid email format");
            return exit_codes::INPUT_ERROR;
        }
    }
    if let Err(e) = ctx.require(Role::Team) {
        return report(e);
    }

    let result = match cmd {
        ProfileCommand::Show => ctx.client.profile().await,
        ProfileCommand::Email { email } => ctx.client.update_email(&email).await,
    };

    match result {
        Ok(team) => ctx.emit(&team, print_profile),
        Err(e) => report(e),
    }
}
