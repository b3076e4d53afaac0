//! Event lookup in the calculation sheet.
//!
//! An event block starts on a row whose number column holds an integer and
//! runs until the row before the next such row (or the last used row).

use std::collections::BTreeSet;

use log::debug;
use zalyshok_engine::{CellValue, Sheet};

use crate::config::CalculationLayout;
use crate::model::Event;

/// Minimum shared words for a fuzzy name match.
pub const MIN_FUZZY_SCORE: usize = 3;
/// Shorter words are ignored when scoring.
const MIN_WORD_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub enum NameMatch<'a> {
    Exact(&'a Event),
    Fuzzy { event: &'a Event, score: usize },
    /// Several events share the best score.
    Ambiguous { score: usize, candidates: Vec<&'a Event> },
    NotFound,
}

impl<'a> NameMatch<'a> {
    pub fn event(&self) -> Option<&'a Event> {
        match self {
            NameMatch::Exact(e) | NameMatch::Fuzzy { event: e, .. } => Some(*e),
            NameMatch::Ambiguous { .. } | NameMatch::NotFound => None,
        }
    }
}

/// Every event block of the sheet, in row order.
pub fn list_events(sheet: &Sheet, layout: &CalculationLayout) -> Vec<Event> {
    let starts: Vec<(usize, i64)> = sheet
        .rows_with_values(layout.number_col.index())
        .into_iter()
        .filter_map(|row| {
            let value = sheet.value(layout.number_col.at(row))?;
            event_number(value).map(|n| (row, n))
        })
        .collect();

    let last_row = sheet.last_row().unwrap_or(0);
    let mut events = Vec::with_capacity(starts.len());
    for (i, &(start_row, number)) in starts.iter().enumerate() {
        let end_row = match starts.get(i + 1) {
            Some(&(next, _)) => next - 1,
            None => last_row.max(start_row),
        };
        events.push(Event {
            number,
            name: sheet.text(layout.name_col.at(start_row)),
            term: sheet.text(layout.term_col.at(start_row)),
            start_row,
            end_row,
        });
    }
    debug!("sheet '{}': {} events", sheet.name, events.len());
    events
}

fn event_number(value: &CellValue) -> Option<i64> {
    value.as_integer().filter(|n| *n > 0)
}

/// First event whose number matches exactly.
pub fn find_by_number(events: &[Event], number: i64) -> Option<&Event> {
    events.iter().find(|e| e.number == number)
}

/// Lower-case, strip quotes, collapse whitespace.
pub fn normalize_name(name: &str) -> String {
    const QUOTES: &[char] = &['"', '\'', '«', '»', '“', '”', '„', '‘', '’', '`'];
    name.to_lowercase()
        .chars()
        .filter(|c| !QUOTES.contains(c))
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn words(normalized: &str) -> BTreeSet<&str> {
    normalized
        .split(' ')
        .filter(|w| w.chars().count() >= MIN_WORD_LEN)
        .collect()
}

/// Exact match after normalization, else the strictly best word overlap.
pub fn find_by_name<'a>(events: &'a [Event], name: &str) -> NameMatch<'a> {
    let target = normalize_name(name);
    if target.is_empty() {
        return NameMatch::NotFound;
    }
    if let Some(event) = events.iter().find(|e| normalize_name(&e.name) == target) {
        return NameMatch::Exact(event);
    }

    let target_words = words(&target);
    let mut best_score = 0;
    let mut best: Vec<&Event> = Vec::new();
    for event in events {
        let normalized = normalize_name(&event.name);
        let score = words(&normalized).intersection(&target_words).count();
        if score > best_score {
            best_score = score;
            best = vec![event];
        } else if score == best_score && score > 0 {
            best.push(event);
        }
    }

    if best_score < MIN_FUZZY_SCORE {
        NameMatch::NotFound
    } else if best.len() == 1 {
        NameMatch::Fuzzy { event: best[0], score: best_score }
    } else {
        NameMatch::Ambiguous { score: best_score, candidates: best }
    }
}
