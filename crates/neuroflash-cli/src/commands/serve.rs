//! Server command implementation

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use neuroflash_core::config::ServerSection;
use neuroflash_core::db::Database;
use neuroflash_server::{parse_admin_keys, LeaderboardRefreshConfig, ServerConfig};

/// Environment variable with comma-separated admin API keys
pub const ADMIN_KEYS_ENV: &str = "NEUROFLASH_ADMIN_KEYS";

/// Environment variable with comma-separated CORS origins
pub const ALLOWED_ORIGINS_ENV: &str = "NEUROFLASH_ALLOWED_ORIGINS";

/// Build the server configuration
///
/// Environment values win over the config file section.
pub fn resolve_server_config(
    section: &ServerSection,
    admin_keys_env: Option<&str>,
    allowed_origins_env: Option<&str>,
) -> ServerConfig {
    let allowed_origins = match allowed_origins_env {
        Some(origins) => origins
            .split(',')
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .map(str::to_string)
            .collect(),
        None => section.allowed_origins.clone(),
    };

    let leaderboard_refresh = LeaderboardRefreshConfig::from_env().or_else(|| {
        section
            .leaderboard_refresh_minutes
            .and_then(LeaderboardRefreshConfig::from_minutes)
    });

    ServerConfig {
        allowed_origins,
        admin_keys: admin_keys_env.map(parse_admin_keys).unwrap_or_default(),
        leaderboard_refresh,
    }
}

pub async fn cmd_serve(
    db: Database,
    section: &ServerSection,
    host: Option<&str>,
    port: Option<u16>,
    static_dir: Option<&Path>,
    no_encrypt: bool,
) -> Result<()> {
    let host = host.unwrap_or(&section.host);
    let port = port.unwrap_or(section.port);
    let static_dir: Option<PathBuf> = static_dir
        .map(Path::to_path_buf)
        .or_else(|| section.static_dir.clone());

    let admin_keys_env = std::env::var(ADMIN_KEYS_ENV).ok();
    let origins_env = std::env::var(ALLOWED_ORIGINS_ENV).ok();
    let config = resolve_server_config(section, admin_keys_env.as_deref(), origins_env.as_deref());

    println!("🚀 Starting NeuroFlash web server...");
    println!("   Database: {}", db.path());
    println!("   Listening: http://{}:{}", host, port);
    if let Some(dir) = &static_dir {
        println!("   Static files: {}", dir.display());
    }
    println!("   🔒 Authentication: bearer tokens (POST /api/login)");
    if config.admin_keys.is_empty() {
        println!("   🔑 Admin routes disabled (set {})", ADMIN_KEYS_ENV);
    } else {
        println!(
            "   🔑 Admin keys: {} configured ({})",
            config.admin_keys.len(),
            ADMIN_KEYS_ENV
        );
    }
    if let Some(refresh) = &config.leaderboard_refresh {
        println!(
            "   🏆 Leaderboard refresh: every {} minute(s)",
            refresh.interval_minutes
        );
    }
    if no_encrypt {
        println!("   ⚠️  Encryption DISABLED (--no-encrypt)");
    }
    println!();
    println!("   Press Ctrl+C to stop");

    let static_dir_str = static_dir
        .as_deref()
        .map(|p| p.to_str().context("static_dir path must be valid UTF-8"))
        .transpose()?;
    neuroflash_server::serve_with_config(db, host, port, static_dir_str, config).await?;

    Ok(())
}
