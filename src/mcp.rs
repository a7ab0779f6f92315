use anyhow::Result;
use rmcp::{
    ServerHandler, ServiceExt,
    handler::server::{router::tool::ToolRouter, wrapper::Parameters},
    model::{ServerCapabilities, ServerInfo},
    schemars, tool, tool_router,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::commands::split::split_file;
use pdf_splitter::{DocumentInfo, FilenameRegistry, Pipeline, SplitOptions};

// Request structs for tools

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Password for encrypted PDFs")]
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, schemars::JsonSchema)]
pub struct PdfSplitRequest {
    #[schemars(description = "Path to the PDF file")]
    pub path: String,
    #[schemars(description = "Directory to write the page files into")]
    pub output_dir: String,
    #[schemars(description = "Password for encrypted PDFs")]
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct PdfServer {
    #[allow(dead_code)]
    tool_router: ToolRouter<Self>,
}

impl PdfServer {
    pub fn new() -> Self {
        Self {
            tool_router: Self::tool_router(),
        }
    }
}

impl Default for PdfServer {
    fn default() -> Self {
        Self::new()
    }
}

/// Run blocking pipeline work off the service loop and render the result.
async fn blocking<T, F>(work: F) -> String
where
    T: Serialize,
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(result)) => serde_json::to_string_pretty(&result).unwrap_or_else(|e| format!("Error: {}", e)),
        Ok(Err(e)) => format!("Error: {:#}", e),
        Err(e) => format!("Error: {}", e),
    }
}

#[tool_router]
impl PdfServer {
    #[tool(description = "Get page count, encryption state and metadata of a PDF")]
    async fn pdf_info(&self, Parameters(PdfRequest { path, password }): Parameters<PdfRequest>) -> String {
        blocking(move || {
            let bytes = std::fs::read(&path)?;
            let info = Pipeline::global().info(&bytes, password.as_deref())?;
            Ok(PdfInfoResult { path, info })
        })
        .await
    }

    #[tool(description = "Dry run: for each page, the extracted text, the recipient found, and the file name it would get")]
    async fn pdf_inspect(&self, Parameters(PdfRequest { path, password }): Parameters<PdfRequest>) -> String {
        blocking(move || {
            let bytes = std::fs::read(&path)?;
            let options = SplitOptions::new().with_password_opt(password);
            let pages = Pipeline::global().inspect(&bytes, options)?;
            Ok(pages)
        })
        .await
    }

    #[tool(description = "Split a PDF into one file per page, named after each page's recipient")]
    async fn pdf_split(&self, Parameters(req): Parameters<PdfSplitRequest>) -> String {
        blocking(move || {
            let mut registry = FilenameRegistry::new();
            let files = split_file(
                Path::new(&req.path),
                Path::new(&req.output_dir),
                req.password.as_deref(),
                &mut registry,
            )?;
            Ok(SplitResult {
                output_dir: req.output_dir,
                page_count: files.len(),
                files,
            })
        })
        .await
    }
}

// Result types for MCP tools

#[derive(Debug, Serialize)]
pub struct PdfInfoResult {
    pub path: String,
    #[serde(flatten)]
    pub info: DocumentInfo,
}

#[derive(Debug, Serialize)]
pub struct SplitResult {
    pub output_dir: String,
    pub page_count: usize,
    pub files: Vec<String>,
}

impl ServerHandler for PdfServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Split PDFs that bundle documents for many recipients (payslips, invoices) into \
                 one file per page, named Nachname_Vorname_Wohnort.pdf. Use pdf_info to check \
                 whether a password is needed, pdf_inspect to preview names, and pdf_split to \
                 write the files."
                    .to_string(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}

pub async fn run_server() -> Result<()> {
    let server = PdfServer::new();

    // Serve using stdin/stdout as a tuple
    let service = server.serve((tokio::io::stdin(), tokio::io::stdout())).await?;

    service.waiting().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_reports_error() {
        let server = PdfServer::new();
        let out = server
            .pdf_info(Parameters(PdfRequest {
                path: "/nonexistent/lohn.pdf".to_string(),
                password: None,
            }))
            .await;
        assert!(out.starts_with("Error: "));
    }

    #[tokio::test]
    async fn test_invalid_pdf_reports_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.pdf");
        std::fs::write(&path, b"no pdf here").unwrap();
        let out = PdfServer::new()
            .pdf_inspect(Parameters(PdfRequest {
                path: path.display().to_string(),
                password: None,
            }))
            .await;
        assert!(out.starts_with("Error: "), "{}", out);
    }
}
