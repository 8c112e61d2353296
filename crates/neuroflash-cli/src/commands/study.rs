//! Terminal study session

use std::io::{self, BufRead, Write};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use neuroflash_core::db::Database;
use neuroflash_core::models::{Rating, User};
use rand::Rng;

use super::resolve_user;

/// Totals for a finished (or abandoned) session
#[derive(Debug, Default, PartialEq, Eq)]
pub struct StudySummary {
    pub cards_in_session: usize,
    pub reviewed: usize,
    pub points_earned: i64,
}

enum Answer {
    Rated(Rating),
    Quit,
}

/// Read one line; `None` on end of input
fn read_line<R: BufRead>(input: &mut R) -> Result<Option<String>> {
    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn ask_rating<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Answer> {
    loop {
        write!(out, "   Rate: [1] Hard  [2] Good  [3] Easy  (q to quit) > ")?;
        out.flush()?;

        let Some(line) = read_line(input)? else {
            return Ok(Answer::Quit);
        };
        if line.eq_ignore_ascii_case("q") {
            return Ok(Answer::Quit);
        }
        match Rating::parse(&line) {
            Ok(rating) => return Ok(Answer::Rated(rating)),
            Err(_) => writeln!(out, "   Please answer 1, 2, 3, hard, good or easy")?,
        }
    }
}

/// Walk through today's cards for a deck, reading ratings from `input`
///
/// Each rating is recorded immediately, so quitting part-way keeps the
/// reviews already given.
pub fn run_study_session<R, W, G>(
    db: &Database,
    user: &User,
    deck_id: i64,
    today: NaiveDate,
    input: &mut R,
    out: &mut W,
    rng: &mut G,
) -> Result<StudySummary>
where
    R: BufRead,
    W: Write,
    G: Rng + ?Sized,
{
    let deck = db.get_deck(user.id, deck_id)?;
    let cards = db.get_study_session(user.id, deck_id, today, rng)?;

    let mut summary = StudySummary {
        cards_in_session: cards.len(),
        ..Default::default()
    };

    if cards.is_empty() {
        writeln!(out, "🎉 Nothing due in '{}' today.", deck.name)?;
        return Ok(summary);
    }

    writeln!(out, "📖 Studying '{}': {} card(s)", deck.name, cards.len())?;

    for (i, card) in cards.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "   Card {}/{} [{}]", i + 1, cards.len(), card.state.card_type)?;
        writeln!(out, "   Q: {}", card.front)?;
        write!(out, "   (Enter to reveal, q to quit) > ")?;
        out.flush()?;

        match read_line(input)? {
            Some(line) if line.eq_ignore_ascii_case("q") => break,
            None => break,
            Some(_) => {}
        }
        writeln!(out, "   A: {}", card.back)?;

        let rating = match ask_rating(input, out)? {
            Answer::Rated(rating) => rating,
            Answer::Quit => break,
        };

        let outcome = db.record_review(user.id, card.id, rating.as_str(), Utc::now())?;
        summary.reviewed += 1;
        summary.points_earned += outcome.points_earned;

        writeln!(
            out,
            "   +{} points. Next review in {} day(s) on {}",
            outcome.points_earned, outcome.new_state.interval_days, outcome.new_state.due_date
        )?;
    }

    writeln!(out)?;
    writeln!(
        out,
        "✅ Reviewed {} of {} card(s), earned {} points",
        summary.reviewed, summary.cards_in_session, summary.points_earned
    )?;

    Ok(summary)
}

pub fn cmd_study(db: &Database, email: &str, deck_id: i64) -> Result<()> {
    let user = resolve_user(db, email)?;
    let today = Utc::now().date_naive();

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let summary = run_study_session(
        db,
        &user,
        deck_id,
        today,
        &mut input,
        &mut out,
        &mut rand::thread_rng(),
    )?;

    db.log_audit(
        "cli",
        "study_session",
        Some("deck"),
        Some(deck_id),
        Some(&format!(
            "reviewed={}, points={}",
            summary.reviewed, summary.points_earned
        )),
    )?;

    Ok(())
}
