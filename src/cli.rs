use clap::{Args, Parser, Subcommand};
use pdf_splitter::config::DEFAULT_RENDER_SCALE;
use pdf_splitter::PipelineConfig;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-splitter")]
#[command(about = "Split PDFs into one file per page, named after each page's recipient")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args)]
pub struct PipelineArgs {
    /// Pixels per point when encrypted pages have to be rasterized
    #[arg(long, global = true, default_value_t = DEFAULT_RENDER_SCALE, value_parser = parse_render_scale)]
    pub render_scale: f32,

    /// Reject input files larger than this many MiB (0 disables the limit)
    #[arg(long, global = true, default_value = "50")]
    pub max_size_mb: usize,

    /// Directory containing the pdfium shared library
    #[arg(long, global = true, env = "PDFIUM_LIBRARY_PATH")]
    pub pdfium_lib: Option<PathBuf>,
}

fn parse_render_scale(s: &str) -> Result<f32, String> {
    let scale: f32 = s.trim().parse().map_err(|e| format!("invalid render scale `{}`: {}", s, e))?;
    if !scale.is_finite() || scale <= 0.0 {
        return Err(format!("render scale must be a positive number, got `{}`", s));
    }
    Ok(scale)
}

impl PipelineArgs {
    pub fn to_config(&self) -> PipelineConfig {
        let limit = match self.max_size_mb {
            0 => None,
            mb => Some(mb.saturating_mul(1024 * 1024)),
        };
        let config = PipelineConfig::new()
            .with_render_scale(self.render_scale)
            .with_max_input_bytes(limit);
        match &self.pdfium_lib {
            Some(path) => config.with_pdfium_library_path(path),
            None => config,
        }
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server
    Mcp,

    /// Show page count, encryption state and metadata
    Info {
        /// PDF file to inspect
        path: PathBuf,

        /// Password for encrypted files
        #[arg(short, long, env = "PDF_PASSWORD")]
        password: Option<String>,
    },

    /// Show the text, recipient and file name found on each page, without writing files
    Inspect {
        /// PDF file to inspect
        path: PathBuf,

        /// Password for encrypted files
        #[arg(short, long, env = "PDF_PASSWORD")]
        password: Option<String>,
    },

    /// Split a PDF (or every PDF in a directory) into one file per page
    #[command(alias = "burst")]
    Split {
        /// PDF file or directory of PDF files
        path: PathBuf,

        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Password for encrypted files
        #[arg(short, long, env = "PDF_PASSWORD")]
        password: Option<String>,
    },
}
