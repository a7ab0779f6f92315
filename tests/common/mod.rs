//! Fixture PDFs built in memory.

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, EncryptionState, EncryptionVersion, Object, Permissions, StringFormat, Stream};

pub const PASSWORD: &str = "kanbanery";
const OWNER_PASSWORD: &str = "owner-kanbanery";

/// One page per entry; each line is drawn 14pt below the previous one.
pub fn document(pages: &[&[&str]]) -> Document {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids: Vec<Object> = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![14.into()]),
            Operation::new("Td", vec![72.into(), 760.into()]),
        ];
        for line in lines.iter() {
            operations.push(Operation::new("Tj", vec![Object::string_literal(latin1(line))]));
            operations.push(Operation::new("T*", vec![]));
        }
        operations.push(Operation::new("ET", vec![]));
        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc
}

pub fn to_bytes(mut doc: Document) -> Vec<u8> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer).unwrap();
    buffer
}

pub fn plain_pdf(pages: &[&[&str]]) -> Vec<u8> {
    to_bytes(document(pages))
}

/// Numbered blank-ish pages, for count and order checks.
pub fn numbered_pdf(n: usize) -> Vec<u8> {
    let labels: Vec<String> = (1..=n).map(|i| format!("Seite {}", i)).collect();
    let lines: Vec<[&str; 1]> = labels.iter().map(|l| [l.as_str()]).collect();
    let pages: Vec<&[&str]> = lines.iter().map(|l| &l[..]).collect();
    plain_pdf(&pages)
}

/// The same document, encrypted (RC4, 128-bit) with user password [`PASSWORD`].
pub fn encrypted_pdf(pages: &[&[&str]]) -> Vec<u8> {
    encrypt(document(pages), PASSWORD, Permissions::all())
}

/// Encrypted with an owner password only: it opens without a password but
/// restricts what a viewer may do with it.
pub fn owner_only_pdf(pages: &[&[&str]]) -> Vec<u8> {
    encrypt(document(pages), "", Permissions::PRINTABLE)
}

fn encrypt(mut doc: Document, user_password: &str, permissions: Permissions) -> Vec<u8> {
    let id = Object::String(b"pdf-splitter fixture".to_vec(), StringFormat::Hexadecimal);
    doc.trailer.set("ID", vec![id.clone(), id]);
    let state = EncryptionState::try_from(EncryptionVersion::V2 {
        document: &doc,
        owner_password: OWNER_PASSWORD,
        user_password,
        key_length: 128,
        permissions,
    })
    .unwrap();
    doc.encrypt(&state).unwrap();
    to_bytes(doc)
}

fn latin1(s: &str) -> Vec<u8> {
    s.chars().map(|c| if (c as u32) < 256 { c as u32 as u8 } else { b'?' }).collect()
}
