//! Error taxonomy for the page-processing pipeline.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PdfError>;

#[derive(Error, Debug)]
pub enum PdfError {
    /// The input bytes are not a parseable PDF.
    #[error("Not a valid PDF: {0}")]
    InvalidDocument(String),

    /// The PDF parses but its structure (page tree, encryption dictionary) is broken.
    #[error("Corrupted PDF: {0}")]
    CorruptedDocument(String),

    /// The document is encrypted and no (or an empty) password was supplied.
    #[error("The PDF is password protected; a password is required")]
    PasswordRequired,

    /// A password was supplied but the document rejected it.
    #[error("Wrong password for this PDF")]
    WrongPassword,

    /// The password was accepted, but neither decrypted content nor a page
    /// rasterizer is available in this build/environment.
    #[error("Cannot unlock this PDF here: {0}")]
    UnsupportedDecryption(String),

    #[error("PDF is too large: {size} bytes (limit {limit} bytes)")]
    TooLarge { size: usize, limit: usize },

    #[error("Failed to write page PDF: {0}")]
    Serialize(String),
}

impl PdfError {
    /// True for the two password outcomes a caller may answer by prompting.
    pub fn is_password_error(&self) -> bool {
        matches!(self, PdfError::PasswordRequired | PdfError::WrongPassword)
    }

    /// Map a rejected password to the right kind, depending on whether one was given.
    pub(crate) fn rejected(password: &str) -> Self {
        if password.is_empty() {
            PdfError::PasswordRequired
        } else {
            PdfError::WrongPassword
        }
    }
}
