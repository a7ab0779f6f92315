use crate::error::{PdfError, Result};
use lopdf::xref::XrefEntry;
use lopdf::{Dictionary, Document, Object, ObjectId, Reader};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};

/// A parsed source document.
pub struct PdfDocument {
    pub doc: Document,
}

impl PdfDocument {
    /// Parse PDF bytes. Encrypted documents load fine; their objects stay
    /// encrypted until [`crate::pdf::password`] unlocks them.
    pub fn load(bytes: &[u8]) -> Result<Self> {
        if !looks_like_pdf(bytes) {
            return Err(PdfError::InvalidDocument("missing %PDF- header".to_string()));
        }
        let doc = parse_document(bytes).map_err(|e| PdfError::InvalidDocument(e.to_string()))?;
        if doc.catalog().is_err() {
            return Err(PdfError::CorruptedDocument("document catalog not found".to_string()));
        }
        Ok(PdfDocument { doc })
    }

    pub fn from_document(doc: Document) -> Self {
        PdfDocument { doc }
    }

    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Page object IDs in page order.
    pub fn page_ids(&self) -> Vec<ObjectId> {
        // get_pages is keyed by 1-based page number, so values come out in order
        self.doc.get_pages().into_values().collect()
    }

    pub fn is_encrypted(&self) -> bool {
        self.doc.is_encrypted()
    }

    /// Fields of the `/Info` dictionary. Only meaningful once decrypted.
    pub fn metadata(&self) -> Metadata {
        let dict = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) => self.doc.get_dictionary(*id).ok(),
            Ok(Object::Dictionary(dict)) => Some(dict),
            _ => None,
        };
        let Some(dict) = dict else {
            return Metadata::default();
        };
        Metadata {
            title: info_string(dict, b"Title"),
            author: info_string(dict, b"Author"),
            subject: info_string(dict, b"Subject"),
            creator: info_string(dict, b"Creator"),
            producer: info_string(dict, b"Producer"),
            creation_date: info_string(dict, b"CreationDate"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub creator: Option<String>,
    pub producer: Option<String>,
    pub creation_date: Option<String>,
}

fn info_string(dict: &Dictionary, key: &[u8]) -> Option<String> {
    match dict.get(key) {
        Ok(Object::String(bytes, _)) => decode_text_string(bytes).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// PDF text strings are UTF-16BE with a BOM, or PDFDocEncoding (treated as Latin-1).
fn decode_text_string(bytes: &[u8]) -> Option<String> {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16(&units).ok()
        }
        _ => Some(bytes.iter().map(|&b| b as char).collect()),
    }
}

/// Parse `bytes` so that every object is present, even for encrypted input.
///
/// lopdf decrypts while loading when the empty user password opens the
/// document and sets `encryption_state`. Otherwise it keeps only the
/// `/Encrypt` dictionary; the remaining objects are read here, still
/// encrypted, so that [`Document::decrypt`] can run once a password is known.
pub(crate) fn parse_document(bytes: &[u8]) -> lopdf::Result<Document> {
    let doc = Document::load_mem(bytes)?;
    if doc.trailer.get(b"Encrypt").is_err() || doc.encryption_state.is_some() {
        return Ok(doc);
    }
    Ok(read_encrypted_objects(bytes, doc))
}

fn read_encrypted_objects(bytes: &[u8], doc: Document) -> Document {
    // xref offsets count from the header, as in lopdf's own reader
    let start = bytes.windows(5).position(|w| w == b"%PDF-").unwrap_or(0);
    let reader = Reader {
        buffer: &bytes[start..],
        document: doc,
        encryption_state: None,
        raw_objects: BTreeMap::new(),
    };

    let objects: Vec<(ObjectId, Object)> = reader
        .document
        .reference_table
        .entries
        .iter()
        .filter_map(|(&number, entry)| match *entry {
            XrefEntry::Normal { generation, .. } => {
                let id = (number, generation);
                match reader.get_object(id, &mut HashSet::new()) {
                    Ok(object) => Some((id, object)),
                    Err(e) => {
                        tracing::debug!(object = ?id, error = %e, "skipping unreadable object");
                        None
                    }
                }
            }
            _ => None,
        })
        .collect();

    let mut doc = reader.document;
    for (id, object) in objects {
        doc.objects.entry(id).or_insert(object);
    }
    doc
}

/// PDF headers may be preceded by junk bytes; readers accept them within the first KiB.
pub(crate) fn looks_like_pdf(bytes: &[u8]) -> bool {
    let window = &bytes[..bytes.len().min(1024)];
    window.windows(5).any(|w| w == b"%PDF-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_non_pdf() {
        assert!(matches!(
            PdfDocument::load(b"hello world"),
            Err(PdfError::InvalidDocument(_))
        ));
        assert!(matches!(PdfDocument::load(b""), Err(PdfError::InvalidDocument(_))));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        assert!(PdfDocument::load(b"%PDF-1.7\n1 0 obj\n<< /Type /Cat").is_err());
    }

    #[test]
    fn test_text_string_decoding() {
        assert_eq!(decode_text_string(b"Lohnabrechnung").as_deref(), Some("Lohnabrechnung"));
        assert_eq!(decode_text_string(b"M\xfcller").as_deref(), Some("Müller"));
        assert_eq!(
            decode_text_string(&[0xFE, 0xFF, 0x00, 0x47, 0x00, 0xFC]).as_deref(),
            Some("Gü")
        );
    }

    #[test]
    fn test_header_sniffing() {
        assert!(looks_like_pdf(b"%PDF-1.4\n"));
        assert!(looks_like_pdf(b"\xef\xbb\xbf%PDF-1.4\n"));
        assert!(!looks_like_pdf(b"PK\x03\x04"));
    }
}
