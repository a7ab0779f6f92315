//! Recipient heuristics for German invoices and payroll statements.
//!
//! Works on the flattened text of one page. Names come from a label line
//! (`Name:`, `An`, `Rechnungsempfänger`, ...), the locality from a `Wohnort:` /
//! `Ort:` / `Adresse:` label or a bare `12345 Stadt` line.
//!
//! Tie-breaks differ on purpose: the first name label wins, the last locality
//! wins.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Recipient {
    pub first_name: String,
    pub last_name: String,
    pub locality: String,
}

static NAME_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:Name|An|Rechnungsempfänger|Empfänger|Rechnungsadresse)\s*:?\s*(.*)$")
        .expect("name label regex")
});

static LOCALITY_LABEL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:Wohnort|Ort|Adresse)\s*:?\s*(.+)$").expect("locality label regex")
});

static POSTAL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-9]{5})\s+(\S.*)$").expect("postal line regex"));

/// Try to find the recipient of a page. Returns `None` if neither a name nor a
/// locality could be found.
pub fn parse_recipient_from_text(text: &str) -> Option<Recipient> {
    if text.trim().is_empty() {
        return None;
    }

    let lines: Vec<&str> = text
        .split('\n')
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut first_name = String::new();
    let mut last_name = String::new();
    let mut locality = String::new();

    for (i, line) in lines.iter().enumerate() {
        let name_locked = !first_name.is_empty() && !last_name.is_empty();
        if !name_locked {
            if let Some(caps) = NAME_LABEL.captures(line) {
                let rest = caps.get(1).map_or("", |m| m.as_str()).trim();
                let (first, last) = if rest.is_empty() {
                    // label on its own line: the name follows on the next one or two
                    let following: Vec<&str> = lines.iter().skip(i + 1).take(2).copied().collect();
                    split_name(&following.join(" "))
                } else {
                    split_labeled_name(rest)
                };
                first_name = first;
                last_name = last;
            }
        }

        if let Some(found) = find_locality(line) {
            locality = found;
        }
    }

    let has_name = first_name.chars().chain(last_name.chars()).any(|c| !c.is_whitespace());
    if !has_name && locality.is_empty() {
        return None;
    }

    Some(Recipient {
        first_name,
        last_name,
        locality,
    })
}

/// "Nachname, Vorname" or "Vorname Nachname".
fn split_labeled_name(rest: &str) -> (String, String) {
    match rest.find(',') {
        Some(comma) if comma > 0 => (
            rest[comma + 1..].trim().to_string(),
            rest[..comma].trim().to_string(),
        ),
        _ => split_name(rest),
    }
}

/// First token is the first name, the remainder the last name. A single
/// token is taken as the last name.
fn split_name(s: &str) -> (String, String) {
    let parts: Vec<&str> = s.split_whitespace().collect();
    match parts.as_slice() {
        [] => (String::new(), String::new()),
        [only] => (String::new(), only.to_string()),
        [first, rest @ ..] => (first.to_string(), rest.join(" ")),
    }
}

fn find_locality(line: &str) -> Option<String> {
    if let Some(caps) = LOCALITY_LABEL.captures(line) {
        let value = caps.get(1).map_or("", |m| m.as_str()).trim();
        if !value.is_empty() {
            return Some(value.to_string());
        }
    }
    POSTAL_LINE
        .captures(line)
        .map(|caps| format!("{} {}", &caps[1], caps[2].trim()))
}
