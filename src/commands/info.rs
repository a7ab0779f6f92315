use anyhow::{Context, Result};
use pdf_splitter::Pipeline;
use std::path::Path;

pub fn run<P: AsRef<Path>>(path: P, password: Option<&str>) -> Result<()> {
    let path = path.as_ref();
    let bytes = super::read_pdf(path)?;
    let info = Pipeline::global()
        .info(&bytes, password)
        .with_context(|| format!("Failed to open PDF: {}", path.display()))?;

    println!("File: {}", path.display());
    match info.page_count {
        Some(count) => println!("Pages: {}", count),
        None => println!("Pages: unknown (password required)"),
    }
    println!("Encrypted: {}", yes_no(info.encrypted));
    println!("Password required: {}", yes_no(info.needs_password));

    let metadata = &info.metadata;
    if let Some(title) = &metadata.title {
        println!("Title: {}", title);
    }
    if let Some(author) = &metadata.author {
        println!("Author: {}", author);
    }
    if let Some(subject) = &metadata.subject {
        println!("Subject: {}", subject);
    }
    if let Some(creator) = &metadata.creator {
        println!("Creator: {}", creator);
    }
    if let Some(producer) = &metadata.producer {
        println!("Producer: {}", producer);
    }
    if let Some(creation_date) = &metadata.creation_date {
        println!("Created: {}", format_pdf_date(creation_date));
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

/// `D:YYYYMMDDHHmmSS...` to `YYYY-MM-DD HH:mm:SS`; anything else is returned as is.
fn format_pdf_date(date: &str) -> String {
    let Some(d) = date.strip_prefix("D:") else {
        return date.to_string();
    };
    if d.len() < 8 || !d.is_char_boundary(8) || !d[..8].bytes().all(|b| b.is_ascii_digit()) {
        return date.to_string();
    }
    let time = if d.len() >= 14 && d[8..14].bytes().all(|b| b.is_ascii_digit()) {
        format!(" {}:{}:{}", &d[8..10], &d[10..12], &d[12..14])
    } else {
        String::new()
    };
    format!("{}-{}-{}{}", &d[0..4], &d[4..6], &d[6..8], time)
}
