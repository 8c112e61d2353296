//! Deck CSV import and export
//!
//! Decks travel as two-column `front,back` CSV. A header row is optional
//! and detected by its column names.

use std::io::{Read, Write};

use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Card, NewCardContent};

/// Cards parsed from a CSV file
#[derive(Debug, Clone, Default)]
pub struct ParsedDeck {
    pub cards: Vec<NewCardContent>,
    /// Rows dropped because a side was blank
    pub skipped: usize,
}

fn is_header(record: &StringRecord) -> bool {
    matches!(
        (record.get(0), record.get(1)),
        (Some(a), Some(b))
            if a.trim().eq_ignore_ascii_case("front") && b.trim().eq_ignore_ascii_case("back")
    )
}

/// Parse `front,back` rows
pub fn parse_deck_csv<R: Read>(reader: R) -> Result<ParsedDeck> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut parsed = ParsedDeck::default();

    for (i, result) in rdr.records().enumerate() {
        let record = result?;
        if i == 0 && is_header(&record) {
            continue;
        }
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let front = record.get(0).unwrap_or("");
        let back = record.get(1).unwrap_or("");
        if front.is_empty() || back.is_empty() {
            debug!(row = i + 1, "Skipping row with a blank side");
            parsed.skipped += 1;
            continue;
        }

        parsed.cards.push(NewCardContent {
            front: front.to_string(),
            back: back.to_string(),
        });
    }

    if parsed.cards.is_empty() {
        return Err(Error::Validation(
            "CSV contains no cards with both a front and a back".to_string(),
        ));
    }

    Ok(parsed)
}

/// Write cards as `front,back` rows with a header
pub fn write_deck_csv<W: Write>(writer: W, cards: &[Card]) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(["front", "back"])?;
    for card in cards {
        wtr.write_record([card.front.as_str(), card.back.as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}
