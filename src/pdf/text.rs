//! Plain text of a PDF as a single line of space-separated runs.
//!
//! Glyphs are grouped into runs the way a viewer's text layer groups them: a
//! run continues while glyphs stay on one baseline and follow each other
//! without a visible gap. Runs are then joined with one space, so layout line
//! breaks do not survive.

use super::document::parse_document;
use super::password::{decrypt_in_place, Decryption};
use crate::error::Result;
use lopdf::Document;
use pdf_extract::{MediaBox, OutputDev, OutputError, Transform};
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Horizontal gap, in em, below which a new string still continues the run.
const RUN_GAP_EM: f64 = 0.15;

/// Vertical drift, in em, tolerated before a glyph counts as a new baseline.
const BASELINE_EM: f64 = 0.5;

/// Extract the text of every page in `bytes`.
///
/// Returns an empty string when the document has no extractable text or the
/// extractor fails. The only errors surfaced are password errors for
/// encrypted inputs.
pub fn extract_text(bytes: &[u8], password: Option<&str>) -> Result<String> {
    let mut doc = match parse_document(bytes) {
        Ok(doc) => doc,
        Err(e) => {
            tracing::warn!(error = %e, "text extraction: could not parse document");
            return Ok(String::new());
        }
    };

    if doc.is_encrypted() {
        let password = password.unwrap_or("");
        match decrypt_in_place(&mut doc, password) {
            Ok(Decryption::Decrypted) => {}
            Ok(Decryption::Unusable(reason)) | Ok(Decryption::Unsupported(reason)) => {
                tracing::warn!(%reason, "text extraction: decrypted content unavailable");
                return Ok(String::new());
            }
            Err(e) if e.is_password_error() => return Err(e),
            Err(e) => {
                tracing::warn!(error = %e, "text extraction: decryption failed");
                return Ok(String::new());
            }
        }
    }

    Ok(document_text(&doc))
}

/// Text of an already parsed, unencrypted document.
pub fn document_text(doc: &Document) -> String {
    let mut collector = RunCollector::default();
    let outcome = catch_unwind(AssertUnwindSafe(|| pdf_extract::output_doc(doc, &mut collector)));
    match outcome {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            tracing::warn!(error = ?e, "text extraction failed");
            return String::new();
        }
        Err(_) => {
            tracing::warn!("text extraction panicked");
            return String::new();
        }
    }
    collector.finish()
}

/// Collects glyphs into runs.
#[derive(Default)]
struct RunCollector {
    runs: Vec<String>,
    current: String,
    /// Set by `begin_word`; the next glyph may start a new run.
    new_string: bool,
    last: Option<GlyphEnd>,
}

#[derive(Clone, Copy)]
struct GlyphEnd {
    x: f64,
    y: f64,
}

impl RunCollector {
    fn break_run(&mut self) {
        let run = std::mem::take(&mut self.current);
        if !run.trim().is_empty() {
            self.runs.push(run.trim().to_string());
        }
    }

    fn finish(mut self) -> String {
        self.break_run();
        self.runs.join(" ")
    }
}

/// Edge length of the square with the same area as the transformed em box.
fn em_size(trm: &Transform, font_size: f64) -> f64 {
    let sx = trm.m11.hypot(trm.m12) * font_size;
    let sy = trm.m21.hypot(trm.m22) * font_size;
    (sx * sy).abs().sqrt()
}

impl OutputDev for RunCollector {
    fn begin_page(
        &mut self,
        _page_num: u32,
        _media_box: &MediaBox,
        _art_box: Option<(f64, f64, f64, f64)>,
    ) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_page(&mut self) -> std::result::Result<(), OutputError> {
        self.break_run();
        self.last = None;
        Ok(())
    }

    fn output_character(
        &mut self,
        trm: &Transform,
        width: f64,
        _spacing: f64,
        font_size: f64,
        char: &str,
    ) -> std::result::Result<(), OutputError> {
        let (x, y) = (trm.m31, trm.m32);
        let em = em_size(trm, font_size);

        if let Some(last) = self.last {
            let same_baseline = (y - last.y).abs() <= em * BASELINE_EM;
            if !same_baseline || (self.new_string && (x - last.x).abs() > em * RUN_GAP_EM) {
                self.break_run();
            }
        }
        self.new_string = false;

        self.current.push_str(char);
        self.last = Some(GlyphEnd {
            x: x + width * trm.m11.hypot(trm.m12) * font_size,
            y,
        });
        Ok(())
    }

    fn begin_word(&mut self) -> std::result::Result<(), OutputError> {
        self.new_string = true;
        Ok(())
    }

    fn end_word(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }

    fn end_line(&mut self) -> std::result::Result<(), OutputError> {
        Ok(())
    }
}
