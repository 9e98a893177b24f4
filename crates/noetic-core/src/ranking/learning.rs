//! Learn-from-selection (§4.7)
//!
//! When a user picks a search result, mine the query for new trigger
//! phrases: terms of length ≥ 4, not stop-listed, not purely numeric, and
//! not already a trigger. Adds up to 3 new triggers per selection, capped
//! at 10 total per memory.

const MIN_TERM_LEN: usize = 4;
const MAX_NEW_PER_SELECTION: usize = 3;
const MAX_TRIGGERS_TOTAL: usize = 10;

const STOP_WORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "what", "when", "where", "which", "about",
    "there", "their", "would", "could", "should", "into", "your", "does", "than", "then",
];

fn is_purely_numeric(term: &str) -> bool {
    !term.is_empty() && term.chars().all(|c| c.is_ascii_digit())
}

fn normalize(term: &str) -> String {
    term.to_lowercase()
}

/// Extract candidate terms from `query` eligible to become new trigger
/// phrases for `existing`, then return the updated trigger list (unchanged
/// if nothing qualifies).
pub fn learn_from_selection(existing: &[String], query: &str) -> Vec<String> {
    let mut triggers: Vec<String> = existing.to_vec();
    if triggers.len() >= MAX_TRIGGERS_TOTAL {
        return triggers;
    }

    let existing_normalized: std::collections::HashSet<String> =
        triggers.iter().map(|t| normalize(t)).collect();

    let mut added = 0;
    for raw in query.split_whitespace() {
        if added >= MAX_NEW_PER_SELECTION || triggers.len() >= MAX_TRIGGERS_TOTAL {
            break;
        }

        let term: String = raw
            .chars()
            .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
            .collect();

        if term.chars().count() < MIN_TERM_LEN {
            continue;
        }
        if is_purely_numeric(&term) {
            continue;
        }
        let normalized = normalize(&term);
        if STOP_WORDS.contains(&normalized.as_str()) {
            continue;
        }
        if existing_normalized.contains(&normalized) {
            continue;
        }

        triggers.push(term);
        added += 1;
    }

    triggers
}
