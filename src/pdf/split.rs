//! Burst a document into standalone single-page PDFs.

use super::PdfDocument;
use crate::error::{PdfError, Result};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId};
use std::collections::HashMap;

/// Page attributes a page may inherit from its ancestors in the page tree.
const INHERITABLE: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Split `source` into one serialized PDF per page, in page order.
///
/// `on_page(done, total)` is called after each page has been written.
/// Works on decrypted documents that still carry an `/Encrypt` trailer entry;
/// the new documents never inherit it.
pub fn split_pages(source: &PdfDocument, on_page: &mut dyn FnMut(usize, usize)) -> Result<Vec<Vec<u8>>> {
    let page_ids = source.page_ids();
    let total = page_ids.len();
    let mut pages = Vec::with_capacity(total);

    for (index, page_id) in page_ids.into_iter().enumerate() {
        let mut single = extract_page(&source.doc, page_id)?;
        let mut buffer = Vec::new();
        single
            .save_to(&mut buffer)
            .map_err(|e| PdfError::Serialize(format!("page {}: {}", index + 1, e)))?;
        tracing::debug!(page = index + 1, total, bytes = buffer.len(), "split page");
        pages.push(buffer);
        on_page(index + 1, total);
    }

    Ok(pages)
}

/// Build a new document that holds only `page_id` and the objects it reaches.
pub fn extract_page(source: &Document, page_id: ObjectId) -> Result<Document> {
    let page = source
        .get_dictionary(page_id)
        .map_err(|e| PdfError::CorruptedDocument(format!("page object {:?}: {}", page_id, e)))?;

    let mut target = Document::with_version(source.version.clone());
    let pages_id = target.new_object_id();
    let new_page_id = target.new_object_id();

    let mut copier = PageCopier {
        source,
        target: &mut target,
        page_id,
        new_page_id,
        id_map: HashMap::new(),
        pending: Vec::new(),
    };

    let mut page_dict = page.clone();
    page_dict.remove(b"Parent");
    for key in INHERITABLE {
        if !page_dict.has(key) {
            if let Some(value) = inherited_attribute(source, page, key) {
                page_dict.set(key.to_vec(), value);
            }
        }
    }
    if !page_dict.has(b"MediaBox") {
        // US Letter, what most viewers assume for a box-less page
        page_dict.set(
            "MediaBox",
            vec![0.into(), 0.into(), 612.into(), 792.into()],
        );
    }

    let mut page_dict = copier.rewrite_dictionary(&page_dict);
    page_dict.set("Parent", pages_id);
    copier.drain()?;

    target.objects.insert(new_page_id, Object::Dictionary(page_dict));
    target.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![new_page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = target.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    target.trailer.set("Root", catalog_id);

    Ok(target)
}

/// Walk up the `/Parent` chain looking for an inherited attribute.
fn inherited_attribute(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut node = page;
    // bounded walk; page trees with cycles exist in the wild
    for _ in 0..64 {
        let parent_id = match node.get(b"Parent") {
            Ok(Object::Reference(id)) => *id,
            _ => return None,
        };
        node = doc.get_dictionary(parent_id).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
    }
    None
}

fn is_page_tree_node(obj: &Object) -> bool {
    let dict = match obj {
        Object::Dictionary(dict) => dict,
        _ => return false,
    };
    matches!(dict.get(b"Type"), Ok(Object::Name(name)) if name == b"Page" || name == b"Pages")
}

/// Deep copy with object renumbering. References to the copied page map to its
/// new ID; references to any other page or page-tree node become `null` so the
/// rest of the source document is not dragged along.
struct PageCopier<'a> {
    source: &'a Document,
    target: &'a mut Document,
    page_id: ObjectId,
    new_page_id: ObjectId,
    id_map: HashMap<ObjectId, ObjectId>,
    pending: Vec<ObjectId>,
}

impl PageCopier<'_> {
    fn map_reference(&mut self, id: ObjectId) -> Object {
        if id == self.page_id {
            return Object::Reference(self.new_page_id);
        }
        if let Some(new_id) = self.id_map.get(&id) {
            return Object::Reference(*new_id);
        }
        let source = self.source;
        match source.get_object(id) {
            Ok(obj) if !is_page_tree_node(obj) => {
                let new_id = self.target.new_object_id();
                self.id_map.insert(id, new_id);
                self.pending.push(id);
                Object::Reference(new_id)
            }
            _ => Object::Null,
        }
    }

    fn rewrite(&mut self, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => self.map_reference(*id),
            Object::Array(items) => Object::Array(items.iter().map(|item| self.rewrite(item)).collect()),
            Object::Dictionary(dict) => Object::Dictionary(self.rewrite_dictionary(dict)),
            Object::Stream(stream) => {
                let mut copy = stream.clone();
                copy.dict = self.rewrite_dictionary(&stream.dict);
                Object::Stream(copy)
            }
            other => other.clone(),
        }
    }

    fn rewrite_dictionary(&mut self, dict: &Dictionary) -> Dictionary {
        let mut out = Dictionary::new();
        for (key, value) in dict.iter() {
            out.set(key.clone(), self.rewrite(value));
        }
        out
    }

    /// Copy every object discovered so far, and everything they reach.
    fn drain(&mut self) -> Result<()> {
        let source = self.source;
        while let Some(old_id) = self.pending.pop() {
            let obj = source
                .get_object(old_id)
                .map_err(|e| PdfError::CorruptedDocument(format!("object {:?}: {}", old_id, e)))?;
            let copy = self.rewrite(obj);
            let new_id = self.id_map[&old_id];
            self.target.objects.insert(new_id, copy);
        }
        Ok(())
    }
}
