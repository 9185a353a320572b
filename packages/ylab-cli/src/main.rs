use clap::Parser;
use std::path::PathBuf;

mod cart_store;
mod cli;
mod client;
mod commands;
mod exit_codes;
mod output;
mod session;

use cart_store::CartStore;
use cli::Cli;
use client::ApiClient;
use commands::Context;
use session::SessionStore;

fn data_dir(cli: &Cli) -> Result<PathBuf, String> {
    match &cli.data_dir {
        Some(dir) => Ok(PathBuf::from(dir)),
        None => dirs::config_dir()
            .map(|dir| dir.join("ylab"))
            .ok_or_else(|| "Could not find config directory, set $YLAB_DATA_DIR".to_string()),
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .format_timestamp(None)
        .init();

    let data_dir = match data_dir(&cli) {
        Ok(dir) => dir,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_codes::INPUT_ERROR);
        }
    };
    log::debug!("Using data directory {:?}", data_dir);

    let client = match ApiClient::new(&cli.api_url, SessionStore::new(&data_dir)) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_codes::API_ERROR);
        }
    };

    let ctx = Context {
        client,
        carts: CartStore::new(&data_dir, &cli.api_url),
        json: cli.json,
    };

    let exit_code = match cli.command {
        cli::Command::Login(cmd) => commands::auth::login(&ctx, cmd).await,
        cli::Command::Logout => commands::auth::logout(&ctx).await,
        cli::Command::Whoami => commands::auth::whoami(&ctx).await,
        cli::Command::Catalog(cmd) => commands::catalog::execute(&ctx, cmd).await,
        cli::Command::Cart(cmd) => commands::cart::execute(&ctx, cmd).await,
        cli::Command::Buy(args) => commands::orders::buy(&ctx, args).await,
        cli::Command::Orders(args) => commands::orders::list(&ctx, args).await,
        cli::Command::Return(args) => commands::orders::return_item(&ctx, args).await,
        cli::Command::Profile(cmd) => commands::profile::execute(&ctx, cmd).await,
        cli::Command::Polls(cmd) => commands::polls::execute(&ctx, cmd).await,
        cli::Command::Vote(args) => commands::polls::vote(&ctx, args).await,
        cli::Command::Admin(cmd) => commands::admin::execute(&ctx, cmd).await,
    };

    std::process::exit(exit_code);
}
