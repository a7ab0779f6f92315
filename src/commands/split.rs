use anyhow::{bail, Context, Result};
use pdf_splitter::{FilenameRegistry, Pipeline, SplitOptions};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

pub fn run<P: AsRef<Path>, Q: AsRef<Path>>(input: P, output_dir: Q, password: Option<&str>) -> Result<()> {
    let input = input.as_ref();
    let output_dir = output_dir.as_ref();

    let sources = collect_inputs(input, output_dir)?;
    if sources.is_empty() {
        bail!("No PDF files found in {}", input.display());
    }

    // names stay unique across every input of this run
    let mut registry = FilenameRegistry::new();
    let mut total_pages = 0;

    for source in &sources {
        let written = split_file(source, output_dir, password, &mut registry)?;
        println!("Split {} pages of {}", written.len(), source.display());
        total_pages += written.len();
    }

    println!(
        "Wrote {} files from {} input(s) into {}",
        total_pages,
        sources.len(),
        output_dir.display()
    );

    Ok(())
}

/// Split one PDF into `output_dir`, returning the file names written in page order.
pub fn split_file(
    source: &Path,
    output_dir: &Path,
    password: Option<&str>,
    registry: &mut FilenameRegistry,
) -> Result<Vec<String>> {
    let bytes = super::read_pdf(source)?;
    let options = SplitOptions::new()
        .with_password_opt(password.map(str::to_string))
        .with_progress(|event| {
            tracing::info!(
                file = %source.display(),
                phase = ?event.phase,
                current = event.current,
                total = event.total,
                "progress"
            );
        });
    let pages = Pipeline::global()
        .process(&bytes, options)
        .with_context(|| format!("Failed to split PDF: {}", source.display()))?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create directory: {}", output_dir.display()))?;

    let mut written = Vec::with_capacity(pages.len());
    for page in &pages {
        let filename = registry.claim(&page.filename);
        let output_path = output_dir.join(&filename);
        std::fs::write(&output_path, &page.buffer)
            .with_context(|| format!("Failed to write PDF: {}", output_path.display()))?;
        written.push(filename);
    }
    Ok(written)
}

/// A single file is taken as is; a directory is searched recursively for
/// `*.pdf`, skipping anything under `output_dir`.
fn collect_inputs(input: &Path, output_dir: &Path) -> Result<Vec<PathBuf>> {
    if !input.is_dir() {
        if !input.exists() {
            bail!("Input not found: {}", input.display());
        }
        return Ok(vec![input.to_path_buf()]);
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(input).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to read directory: {}", input.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.starts_with(output_dir) {
            continue;
        }
        let is_pdf = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));
        if is_pdf {
            sources.push(path.to_path_buf());
        }
    }
    Ok(sources)
}
