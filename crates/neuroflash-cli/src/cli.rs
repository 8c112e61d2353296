//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// NeuroFlash - Spaced-repetition flashcards
#[derive(Parser)]
#[command(name = "neuroflash")]
#[command(about = "Self-hosted spaced-repetition flashcard trainer", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path (defaults to the platform data directory)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Config file (defaults to <config dir>/neuroflash/neuroflash.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set NEUROFLASH_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Start the web server
    Serve {
        /// Port to listen on (overrides the config file)
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (overrides the config file)
        #[arg(long)]
        host: Option<String>,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },

    /// Manage user accounts
    Users {
        #[command(subcommand)]
        action: UsersAction,
    },

    /// Manage decks (list, import, export, delete)
    Decks {
        #[command(subcommand)]
        action: DecksAction,
    },

    /// Study a deck in the terminal
    Study {
        /// Email of the studying user
        #[arg(short, long)]
        user: String,

        /// Deck ID
        #[arg(short, long)]
        deck: i64,
    },

    /// Show a user's statistics
    Stats {
        /// Email of the user
        #[arg(short, long)]
        user: String,
    },

    /// Show or refresh the leaderboard
    Leaderboard {
        #[command(subcommand)]
        action: Option<LeaderboardAction>,
    },
}

#[derive(Subcommand)]
pub enum UsersAction {
    /// Register a new user
    Add {
        /// Display name
        #[arg(long)]
        username: String,

        /// Login email
        #[arg(long)]
        email: String,

        /// Password (falls back to NEUROFLASH_PASSWORD)
        #[arg(long)]
        password: Option<String>,

        /// Country
        #[arg(long)]
        country: Option<String>,

        /// City
        #[arg(long)]
        city: Option<String>,
    },

    /// Show a user's profile and study settings
    Show {
        /// Email of the user
        email: String,
    },

    /// Change a user's study settings
    Settings {
        /// Email of the user
        email: String,

        /// New cards introduced per day
        #[arg(long)]
        new_cards_per_day: Option<i64>,

        /// Maximum reviews per day
        #[arg(long)]
        max_reviews_per_day: Option<i64>,

        /// Learning steps in minutes, comma-separated (e.g. "1,10")
        #[arg(long)]
        learning_steps: Option<String>,

        /// Interval multiplier applied on Easy
        #[arg(long)]
        ease_bonus: Option<f64>,
    },

    /// Issue an API token for a user (prints it once)
    Token {
        /// Email of the user
        email: String,
    },
}

#[derive(Subcommand)]
pub enum DecksAction {
    /// List a user's decks with progress
    List {
        /// Email of the user
        #[arg(short, long)]
        user: String,
    },

    /// Create a deck from a front,back CSV file
    Import {
        /// CSV file to import
        #[arg(short, long)]
        file: PathBuf,

        /// Name of the new deck
        #[arg(short, long)]
        deck: String,

        /// Email of the owning user
        #[arg(short, long)]
        user: String,

        /// Tags for the deck and its cards (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        tags: Vec<String>,
    },

    /// Write a deck's cards as front,back CSV
    Export {
        /// Deck ID
        #[arg(short, long)]
        deck: i64,

        /// Email of the owning user
        #[arg(short, long)]
        user: String,

        /// Output file (stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Delete a deck and its cards
    Delete {
        /// Deck ID
        #[arg(short, long)]
        deck: i64,

        /// Email of the owning user
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum LeaderboardAction {
    /// Show the live leaderboard
    Show {
        /// Number of entries to show
        #[arg(short, long, default_value = "10")]
        limit: i64,
    },

    /// Rebuild the leaderboard snapshot table
    Refresh,
}
