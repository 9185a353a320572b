use chrono::Utc;
use serde::Serialize;
use std::io::{BufRead, Write};
use ylab_core::api::{Role, VerifiedUser};

use super::{report, Context};
use crate::cli::{LoginArgs, LoginCommand};
use crate::exit_codes;
use crate::session::StoredSession;

fn read_password(args: &LoginArgs) -> Result<String, String> {
    if let Some(password) = &args.password {
        return Ok(password.clone());
    }

    eprint!("Password: ");
    std::io::stderr().flush().ok();

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|e| format!("Failed to read password: {}", e))?;

    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        return Err("Password is required".to_string());
    }
    Ok(password)
}

#[derive(Serialize)]
struct LoginOutput<'a> {
    role: Role,
    name: &'a str,
    expires_at: chrono::DateTime<Utc>,
}

pub async fn login(ctx: &Context, cmd: LoginCommand) -> i32 {
    let (role, args) = match cmd {
        LoginCommand::Team(args) => (Role::Team, args),
        LoginCommand::Admin(args) => (Role::Admin, args),
    };

    let password = match read_password(&args) {
        Ok(p) => p,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            return exit_codes::INPUT_ERROR;
        }
    };

    let result = match role {
        Role::Team => ctx
            .client
            .team_login(&args.name, &password)
            .await
            .map(|r| (r.token, r.expires_in, r.team.name)),
        Role::Admin => ctx
            .client
            .admin_login(&args.name, &password)
            .await
            .map(|r| (r.token, r.expires_in, r.admin.username)),
    };

    let (token, expires_in, name) = match result {
        Ok(r) => r,
        Err(e) => return report(e),
    };

    let session = StoredSession::new(token, role, expires_in, name, Utc::now());
    if let Err(msg) = ctx.client.store().save(&session) {
        eprintln!("Error: {}", msg);
        return exit_codes::INPUT_ERROR;
    }
    log::info!("Session saved for {} ({})", session.name, role.as_str());

    let out = LoginOutput {
        role,
        name: &session.name,
        expires_at: session.expires_at,
    };
    ctx.emit(&out, |o| {
        println!("Logged in as {} ({}), session valid until {}", o.name, o.role.as_str(), o.expires_at.format("%Y-%m-%d %H:%M UTC"));
    })
}

pub async fn logout(ctx: &Context) -> i32 {
    if ctx.client.session().is_none() {
        println!("Not logged in.");
        return exit_codes::SUCCESS;
    }

    // The local session goes away even when the server is unreachable
    let result = ctx.client.logout().await;
    ctx.client.store().clear();

    match result {
        Ok(_) => {
            println!("Logged out.");
            exit_codes::SUCCESS
        }
        Err(e) if e.needs_login() => {
            println!("Logged out.");
            exit_codes::SUCCESS
        }
        Err(e) => {
            log::warn!("Server did not confirm logout: {}", e);
            println!("Logged out locally.");
            exit_codes::SUCCESS
        }
    }
}

pub async fn whoami(ctx: &Context) -> i32 {
    if ctx.client.session().is_none() {
        eprintln!("Not logged in.");
        return exit_codes::AUTH_REQUIRED;
    }

    let verified = match ctx.client.verify().await {
        Ok(v) => v,
        Err(e) => return report(e),
    };

    ctx.emit(&verified, |v| match &v.user {
        VerifiedUser::Team(team) => {
            println!("Team:   {} (#{})", team.name, team.id);
            println!("Email:  {}", team.email);
            println!("Credit: {}", team.credit);
        }
        VerifiedUser::Admin(admin) => {
            println!("Admin:  {} (#{})", admin.username, admin.id);
            println!("Email:  {}", admin.email);
        }
    })
}
