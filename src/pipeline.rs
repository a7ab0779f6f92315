//! Page pipeline: split a document, then name every page after its recipient.

use crate::config::{global_config, PipelineConfig};
use crate::error::{PdfError, Result};
use crate::filename::build_safe_filename;
use crate::pdf::password::{Capabilities, PasswordGate, Unlocked};
use crate::pdf::document::Metadata;
use crate::pdf::{split, text, PdfDocument};
use crate::recipient::{parse_recipient_from_text, Recipient};
use serde::Serialize;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    Splitting,
    Processing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressEvent {
    pub phase: ProgressPhase,
    pub current: usize,
    pub total: usize,
}

/// One named page of the source document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageOutput {
    pub buffer: Vec<u8>,
    pub filename: String,
    pub page_index: usize,
}

/// What the pipeline found on one page, without the page bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageReport {
    pub page_index: usize,
    pub text: String,
    pub recipient: Option<Recipient>,
    pub filename: String,
}

/// Summary of a source document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentInfo {
    pub encrypted: bool,
    pub needs_password: bool,
    /// `None` while the document is locked.
    pub page_count: Option<usize>,
    #[serde(flatten)]
    pub metadata: Metadata,
}

/// Per-call options: the password for encrypted inputs and a progress sink.
#[derive(Default)]
pub struct SplitOptions<'a> {
    pub password: Option<String>,
    on_progress: Option<Box<dyn FnMut(ProgressEvent) + 'a>>,
}

impl<'a> SplitOptions<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    pub fn with_password_opt(mut self, password: Option<String>) -> Self {
        self.password = password;
        self
    }

    pub fn with_progress(mut self, on_progress: impl FnMut(ProgressEvent) + 'a) -> Self {
        self.on_progress = Some(Box::new(on_progress));
        self
    }

    fn emit(&mut self, phase: ProgressPhase, current: usize, total: usize) {
        if let Some(on_progress) = self.on_progress.as_mut() {
            on_progress(ProgressEvent {
                phase,
                current,
                total,
            });
        }
    }
}

/// A configured pipeline. Cheap to share; every call is independent.
pub struct Pipeline {
    config: PipelineConfig,
    capabilities: Capabilities,
}

impl Pipeline {
    /// Build a pipeline, probing which unlock strategies are available.
    pub fn new(config: PipelineConfig) -> Self {
        let capabilities = Capabilities::detect(&config);
        Pipeline {
            config,
            capabilities,
        }
    }

    pub fn with_capabilities(config: PipelineConfig, capabilities: Capabilities) -> Self {
        Pipeline {
            config,
            capabilities,
        }
    }

    /// The pipeline behind the crate-level free functions, built from
    /// [`global_config`] on first use.
    pub fn global() -> &'static Pipeline {
        static GLOBAL: OnceLock<Pipeline> = OnceLock::new();
        GLOBAL.get_or_init(|| Pipeline::new(global_config().clone()))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    fn gate(&self) -> PasswordGate<'_> {
        PasswordGate::new(&self.capabilities, self.config.render_scale)
    }

    fn check_size(&self, bytes: &[u8]) -> Result<()> {
        match self.config.max_input_bytes {
            Some(limit) if bytes.len() > limit => Err(PdfError::TooLarge {
                size: bytes.len(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    pub fn needs_password(&self, bytes: &[u8]) -> Result<bool> {
        self.check_size(bytes)?;
        self.gate().needs_password(bytes)
    }

    pub fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize> {
        self.check_size(bytes)?;
        self.gate().page_count(bytes, password)
    }

    /// Encryption state, page count and `/Info` metadata. A locked document
    /// without a password is reported, not rejected.
    pub fn info(&self, bytes: &[u8], password: Option<&str>) -> Result<DocumentInfo> {
        self.check_size(bytes)?;
        let gate = self.gate();
        let encrypted = PdfDocument::load(bytes)?.is_encrypted();
        let needs_password = gate.needs_password(bytes)?;
        if needs_password && password.map_or(true, str::is_empty) {
            return Ok(DocumentInfo {
                encrypted,
                needs_password,
                page_count: None,
                metadata: Metadata::default(),
            });
        }

        let page_count = gate.page_count(bytes, password)?;
        let metadata = gate
            .document(bytes, password)?
            .map(|doc| doc.metadata())
            .unwrap_or_default();
        Ok(DocumentInfo {
            encrypted,
            needs_password,
            page_count: Some(page_count),
            metadata,
        })
    }

    pub fn extract_text(&self, bytes: &[u8], password: Option<&str>) -> Result<String> {
        self.check_size(bytes)?;
        text::extract_text(bytes, password)
    }

    /// Split into standalone single-page PDFs, in page order.
    pub fn split(&self, bytes: &[u8], mut options: SplitOptions<'_>) -> Result<Vec<Vec<u8>>> {
        self.split_with(bytes, &mut options)
    }

    fn split_with(&self, bytes: &[u8], options: &mut SplitOptions<'_>) -> Result<Vec<Vec<u8>>> {
        self.check_size(bytes)?;
        let password = options.password.clone();
        let mut on_page = |done, total| options.emit(ProgressPhase::Splitting, done, total);

        match self.gate().unlock(bytes, password.as_deref(), &mut on_page)? {
            Unlocked::Document(doc) => split::split_pages(&doc, &mut on_page),
            Unlocked::Pages(pages) => Ok(pages),
        }
    }

    /// Split and name every page.
    ///
    /// Unlock and split errors abort the call. Text, recipient and naming
    /// never fail a page; a page without a recognizable recipient is named
    /// `Seite_NN.pdf`. Names are not deduplicated here.
    pub fn process(&self, bytes: &[u8], mut options: SplitOptions<'_>) -> Result<Vec<PageOutput>> {
        let pages = self.split_with(bytes, &mut options)?;
        let total = pages.len();

        let mut outputs = Vec::with_capacity(total);
        for (page_index, buffer) in pages.into_iter().enumerate() {
            options.emit(ProgressPhase::Processing, page_index, total);
            let report = describe_page(&buffer, page_index);
            tracing::debug!(page = page_index + 1, total, filename = %report.filename, "named page");
            outputs.push(PageOutput {
                buffer,
                filename: report.filename,
                page_index,
            });
        }
        options.emit(ProgressPhase::Processing, total, total);

        Ok(outputs)
    }

    /// Like [`Pipeline::process`], but report what was found on each page
    /// instead of returning the page bytes.
    pub fn inspect(&self, bytes: &[u8], mut options: SplitOptions<'_>) -> Result<Vec<PageReport>> {
        let pages = self.split_with(bytes, &mut options)?;
        let total = pages.len();
        let mut reports = Vec::with_capacity(total);
        for (page_index, buffer) in pages.iter().enumerate() {
            options.emit(ProgressPhase::Processing, page_index, total);
            reports.push(describe_page(buffer, page_index));
        }
        options.emit(ProgressPhase::Processing, total, total);
        Ok(reports)
    }
}

fn describe_page(buffer: &[u8], page_index: usize) -> PageReport {
    // page buffers are never encrypted
    let text = text::extract_text(buffer, None).unwrap_or_else(|e| {
        tracing::warn!(page = page_index + 1, error = %e, "no text for page");
        String::new()
    });
    let recipient = parse_recipient_from_text(&text);
    let filename = build_safe_filename(recipient.as_ref(), page_index);
    PageReport {
        page_index,
        text,
        recipient,
        filename,
    }
}
