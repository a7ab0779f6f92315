//! Output file naming.

use crate::recipient::Recipient;
use std::collections::HashSet;

/// Longest base name (without `.pdf`) we produce.
pub const MAX_FILENAME_LENGTH: usize = 120;

/// Build a filesystem-safe name: `Nachname_Vorname_Wohnort.pdf`, or
/// `Seite_NN.pdf` when there is no usable recipient.
pub fn build_safe_filename(recipient: Option<&Recipient>, page_index: usize) -> String {
    if let Some(recipient) = recipient {
        let base = [
            recipient.last_name.as_str(),
            recipient.first_name.as_str(),
            recipient.locality.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join("_");

        let sanitized: String = base
            .chars()
            .map(|c| if is_safe_char(c) { c } else { '_' })
            .take(MAX_FILENAME_LENGTH)
            .collect();

        if !sanitized.is_empty() {
            return format!("{}.pdf", sanitized);
        }
    }
    page_filename(page_index)
}

/// `Seite_01.pdf` for page index 0.
pub fn page_filename(page_index: usize) -> String {
    format!("Seite_{:02}.pdf", page_index + 1)
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | 'ä' | 'ö' | 'ü' | 'Ä' | 'Ö' | 'Ü' | 'ß')
}

/// Make `filename` unique within `used` by inserting `_1`, `_2`, ... before the
/// `.pdf` extension, and record the result.
pub fn dedupe_filename(filename: &str, used: &mut HashSet<String>) -> String {
    let mut candidate = filename.to_string();
    let base = strip_pdf_extension(filename);
    let mut counter = 1;
    while used.contains(&candidate) {
        candidate = format!("{}_{}.pdf", base, counter);
        counter += 1;
    }
    used.insert(candidate.clone());
    candidate
}

fn strip_pdf_extension(filename: &str) -> &str {
    let len = filename.len();
    if len >= 4 && filename.is_char_boundary(len - 4) && filename[len - 4..].eq_ignore_ascii_case(".pdf") {
        &filename[..len - 4]
    } else {
        filename
    }
}

/// Names handed out during one packaging run.
#[derive(Debug, Default)]
pub struct FilenameRegistry {
    used: HashSet<String>,
}

impl FilenameRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn claim(&mut self, filename: &str) -> String {
        dedupe_filename(filename, &mut self.used)
    }

    pub fn len(&self) -> usize {
        self.used.len()
    }

    pub fn is_empty(&self) -> bool {
        self.used.is_empty()
    }
}
