//! NeuroFlash CLI - Spaced-repetition flashcards
//!
//! Usage:
//!   neuroflash init                                   Initialize database
//!   neuroflash users add --username U --email E       Register a user
//!   neuroflash decks import --file CSV --deck NAME --user EMAIL
//!   neuroflash study --user EMAIL --deck ID           Review due cards
//!   neuroflash serve --port 3000                      Start web server

mod cli;
mod commands;


use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use neuroflash_core::config::{default_db_path, AppConfig};
use neuroflash_core::models::SettingsUpdate;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
    let db_path = cli.db.clone().unwrap_or_else(default_db_path);
    debug!(db = %db_path.display(), "Resolved database path");

    if let Commands::Init = cli.command {
        return commands::cmd_init(&db_path, cli.no_encrypt);
    }

    let db = commands::open_db(&db_path, cli.no_encrypt)?.with_study_defaults(config.study.clone());
    let today = Utc::now().date_naive();

    match cli.command {
        Commands::Init => Ok(()),
        Commands::Serve {
            port,
            host,
            static_dir,
        } => {
            commands::cmd_serve(
                db,
                &config.server,
                host.as_deref(),
                port,
                static_dir.as_deref(),
                cli.no_encrypt,
            )
            .await
        }
        Commands::Users { action } => match action {
            UsersAction::Add {
                username,
                email,
                password,
                country,
                city,
            } => commands::cmd_users_add(
                &db,
                &username,
                &email,
                password.as_deref(),
                country.as_deref(),
                city.as_deref(),
            ),
            UsersAction::Show { email } => commands::cmd_users_show(&db, &email),
            UsersAction::Settings {
                email,
                new_cards_per_day,
                max_reviews_per_day,
                learning_steps,
                ease_bonus,
            } => commands::cmd_users_settings(
                &db,
                &email,
                SettingsUpdate {
                    new_cards_per_day,
                    max_reviews_per_day,
                    learning_steps,
                    ease_bonus,
                },
            ),
            UsersAction::Token { email } => commands::cmd_users_token(&db, &email),
        },
        Commands::Decks { action } => match action {
            DecksAction::List { user } => commands::cmd_decks_list(&db, &user),
            DecksAction::Import {
                file,
                deck,
                user,
                tags,
            } => commands::cmd_decks_import(&db, &file, &deck, &user, &tags, today).map(|_| ()),
            DecksAction::Export { deck, user, output } => {
                commands::cmd_decks_export(&db, deck, &user, output.as_deref())
            }
            DecksAction::Delete { deck, user } => commands::cmd_decks_delete(&db, deck, &user),
        },
        Commands::Study { user, deck } => commands::cmd_study(&db, &user, deck),
        Commands::Stats { user } => commands::cmd_stats(&db, &user, today),
        Commands::Leaderboard { action } => match action {
            None => commands::cmd_leaderboard_show(&db, 10),
            Some(LeaderboardAction::Show { limit }) => commands::cmd_leaderboard_show(&db, limit),
            Some(LeaderboardAction::Refresh) => commands::cmd_leaderboard_refresh(&db),
        },
    }
}
