//! Split multi-recipient PDFs (payslips, invoices) into one file per page,
//! named after the recipient found on that page.
//!
//! The free functions use a process-wide [`Pipeline`]; build one with
//! [`Pipeline::new`] to pass configuration explicitly.

pub mod config;
pub mod error;
pub mod filename;
pub mod pdf;
pub mod pipeline;
pub mod recipient;

pub use config::{global_config, init_global_config, PipelineConfig};
pub use error::{PdfError, Result};
pub use filename::{build_safe_filename, dedupe_filename, FilenameRegistry};
pub use pipeline::{DocumentInfo, PageOutput, PageReport, Pipeline, ProgressEvent, ProgressPhase, SplitOptions};
pub use recipient::{parse_recipient_from_text, Recipient};

/// Split `bytes` and name every page after its recipient.
pub fn process_pdf_to_pages(bytes: &[u8], options: SplitOptions<'_>) -> Result<Vec<PageOutput>> {
    Pipeline::global().process(bytes, options)
}

pub fn get_pdf_page_count(bytes: &[u8], password: Option<&str>) -> Result<usize> {
    Pipeline::global().page_count(bytes, password)
}

/// True iff the document cannot be opened without a password.
pub fn check_pdf_needs_password(bytes: &[u8]) -> Result<bool> {
    Pipeline::global().needs_password(bytes)
}

pub fn split_pdf_by_pages(bytes: &[u8], options: SplitOptions<'_>) -> Result<Vec<Vec<u8>>> {
    Pipeline::global().split(bytes, options)
}

/// All text of the document as space-separated runs. Extraction problems
/// yield an empty string; only password errors are returned.
pub fn extract_text_from_pdf(bytes: &[u8], password: Option<&str>) -> Result<String> {
    Pipeline::global().extract_text(bytes, password)
}
