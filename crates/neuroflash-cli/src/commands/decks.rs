//! Deck commands: listing, CSV import/export and deletion

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use neuroflash_core::db::Database;
use neuroflash_core::export::{parse_deck_csv, write_deck_csv};
use neuroflash_core::models::NewDeck;

use super::{resolve_user, truncate};

pub fn cmd_decks_list(db: &Database, email: &str) -> Result<()> {
    let user = resolve_user(db, email)?;
    let decks = db.list_decks(user.id)?;

    if decks.is_empty() {
        println!("No decks yet. Import one with 'neuroflash decks import'.");
        return Ok(());
    }

    println!();
    println!("📚 Decks for {}", user.email);
    println!("   ─────────────────────────────────────────────────────────────");
    println!("   {:>5}  {:<30} {:>6} {:>9}  Tags", "ID", "Name", "Cards", "Mastered");
    for deck in &decks {
        println!(
            "   {:>5}  {:<30} {:>6} {:>8}%  {}",
            deck.id,
            truncate(&deck.name, 30),
            deck.card_count,
            deck.mastered_percentage,
            deck.tags.join(", ")
        );
    }

    Ok(())
}

/// Import a front,back CSV as a new deck, returning the deck ID
pub fn cmd_decks_import(
    db: &Database,
    file: &Path,
    deck_name: &str,
    email: &str,
    tags: &[String],
    today: NaiveDate,
) -> Result<i64> {
    let user = resolve_user(db, email)?;

    println!("📥 Importing {}...", file.display());
    let reader =
        File::open(file).with_context(|| format!("Failed to open {}", file.display()))?;
    let parsed = parse_deck_csv(reader)
        .with_context(|| format!("Failed to read cards from {}", file.display()))?;

    let deck = db.create_deck(
        user.id,
        &NewDeck {
            name: deck_name.to_string(),
            description: None,
            tags: tags.to_vec(),
            cards: parsed.cards,
        },
        today,
    )?;

    db.log_audit(
        "cli",
        "import",
        Some("deck"),
        Some(deck.id),
        Some(&format!("file={}, cards={}", file.display(), deck.card_count)),
    )?;

    println!(
        "✅ Created deck '{}' (id {}) with {} card(s)",
        deck.name, deck.id, deck.card_count
    );
    if parsed.skipped > 0 {
        println!("   ⚠️  Skipped {} row(s) with a missing side", parsed.skipped);
    }

    Ok(deck.id)
}

pub fn cmd_decks_export(
    db: &Database,
    deck_id: i64,
    email: &str,
    output: Option<&Path>,
) -> Result<()> {
    let user = resolve_user(db, email)?;
    let cards = db.list_deck_cards(user.id, deck_id)?;

    match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_deck_csv(file, &cards)?;
            eprintln!("✅ Exported {} card(s) to {}", cards.len(), path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut handle = stdout.lock();
            write_deck_csv(&mut handle, &cards)?;
            handle.flush()?;
        }
    }

    db.log_audit(
        "cli",
        "export",
        Some("deck"),
        Some(deck_id),
        Some(&format!("cards={}", cards.len())),
    )?;

    Ok(())
}

pub fn cmd_decks_delete(db: &Database, deck_id: i64, email: &str) -> Result<()> {
    let user = resolve_user(db, email)?;
    let deck = db.get_deck(user.id, deck_id)?;

    db.delete_deck(user.id, deck_id)?;
    db.log_audit("cli", "delete", Some("deck"), Some(deck_id), None)?;

    println!("🗑️  Deleted deck '{}' ({} card(s))", deck.name, deck.card_count);
    Ok(())
}
