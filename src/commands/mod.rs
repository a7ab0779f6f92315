pub mod info;
pub mod inspect;
pub mod split;

use anyhow::{Context, Result};
use std::path::Path;

fn read_pdf(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).with_context(|| format!("Failed to read PDF: {}", path.display()))
}
