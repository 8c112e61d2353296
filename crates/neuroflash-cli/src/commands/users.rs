//! User account commands

use anyhow::{bail, Result};
use neuroflash_core::db::Database;
use neuroflash_core::models::{NewUser, ProfileUpdate, SettingsUpdate};

use super::resolve_user;

/// Environment variable read when `--password` is not given
pub const PASSWORD_ENV: &str = "NEUROFLASH_PASSWORD";

pub fn cmd_users_add(
    db: &Database,
    username: &str,
    email: &str,
    password: Option<&str>,
    country: Option<&str>,
    city: Option<&str>,
) -> Result<()> {
    let password = match password {
        Some(p) => p.to_string(),
        None => match std::env::var(PASSWORD_ENV) {
            Ok(p) if !p.is_empty() => p,
            _ => bail!("Password required: pass --password or set {}", PASSWORD_ENV),
        },
    };

    let user = db.create_user(&NewUser {
        username: username.to_string(),
        email: email.to_string(),
        password,
        country: country.map(str::to_string),
        city: city.map(str::to_string),
        ..Default::default()
    })?;

    db.log_audit("cli", "create", Some("user"), Some(user.id), None)?;

    println!("✅ Created user {} <{}> (id {})", user.username, user.email, user.id);
    Ok(())
}

pub fn cmd_users_show(db: &Database, email: &str) -> Result<()> {
    let user = resolve_user(db, email)?;
    let profile = db.get_profile(user.id)?;

    println!();
    println!("👤 {} <{}>", profile.user.username, profile.user.email);
    println!("   ─────────────────────────────");
    println!("   Points:              {}", profile.points);
    if let Some(country) = &profile.user.country {
        println!("   Country:             {}", country);
    }
    println!("   New cards per day:   {}", profile.settings.new_cards_per_day);
    println!("   Max reviews per day: {}", profile.settings.max_reviews_per_day);
    println!("   Learning steps:      {}", profile.settings.learning_steps);
    println!("   Ease bonus:          {}", profile.settings.ease_bonus);

    Ok(())
}

pub fn cmd_users_settings(db: &Database, email: &str, update: SettingsUpdate) -> Result<()> {
    let user = resolve_user(db, email)?;

    let profile = db.update_profile(
        user.id,
        &ProfileUpdate {
            settings: update,
            ..Default::default()
        },
    )?;

    db.log_audit("cli", "update", Some("settings"), Some(user.id), None)?;

    println!(
        "✅ Settings saved: {} new/day, {} reviews/day, steps {}, ease bonus {}",
        profile.settings.new_cards_per_day,
        profile.settings.max_reviews_per_day,
        profile.settings.learning_steps,
        profile.settings.ease_bonus
    );
    Ok(())
}

pub fn cmd_users_token(db: &Database, email: &str) -> Result<()> {
    let user = resolve_user(db, email)?;
    let token = db.issue_token(user.id)?;

    db.log_audit("cli", "issue_token", Some("user"), Some(user.id), None)?;

    println!("🔑 API token for {} (shown once):", user.email);
    println!("{}", token);
    Ok(())
}
