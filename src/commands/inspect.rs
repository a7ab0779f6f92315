use anyhow::{Context, Result};
use pdf_splitter::{FilenameRegistry, Pipeline, Recipient, SplitOptions};
use std::path::Path;

pub fn run<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<()> {
    let path = path.as_ref();
    let bytes = super::read_pdf(path)?;
    let options = SplitOptions::new().with_password_opt(password.map(str::to_string));
    let reports = Pipeline::global()
        .inspect(&bytes, options)
        .with_context(|| format!("Failed to process PDF: {}", path.display()))?;

    let mut registry = FilenameRegistry::new();
    for report in &reports {
        println!("--- Page {} ---", report.page_index + 1);
        println!("Recipient: {}", describe(report.recipient.as_ref()));
        println!("File: {}", registry.claim(&report.filename));
        println!("Text: {}", report.text);
        println!();
    }
    println!("{} pages", reports.len());

    Ok(())
}

fn describe(recipient: Option<&Recipient>) -> String {
    let Some(recipient) = recipient else {
        return "(none)".to_string();
    };
    let name = [recipient.first_name.as_str(), recipient.last_name.as_str()]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ");
    match (name.is_empty(), recipient.locality.is_empty()) {
        (false, false) => format!("{}, {}", name, recipient.locality),
        (false, true) => name,
        _ => recipient.locality.clone(),
    }
}
