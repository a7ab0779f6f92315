//! Password handling for encrypted inputs.
//!
//! Unlocking tries, in order: decrypting in place (the usual case), then
//! rendering the pages with a rasterizer when the decrypted content is not
//! usable. Which strategies exist is decided once, by [`Capabilities::detect`].

use super::raster::{self, embed_raster_page, PageRasterizer};
use super::PdfDocument;
use crate::config::PipelineConfig;
use crate::error::{PdfError, Result};
use lopdf::content::Content;
use lopdf::encryption::DecryptionError;
use lopdf::Document;

/// Outcome of a decryption attempt that did not reject the password.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decryption {
    /// The document was decrypted in place and can be split.
    Decrypted,
    /// The password was accepted but the decrypted objects do not parse.
    Unusable(String),
    /// The encryption scheme is not supported; the password could not be checked.
    Unsupported(String),
}

/// A strategy for turning an encrypted document into a plain one.
pub trait Decryptor: Send + Sync {
    fn name(&self) -> &'static str;

    /// Decrypt `doc` in place. Rejected passwords are reported as
    /// [`PdfError::PasswordRequired`] / [`PdfError::WrongPassword`].
    fn decrypt(&self, doc: &mut Document, password: &str) -> Result<Decryption>;
}

/// Standard security handler support built into lopdf.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfDecryptor;

impl Decryptor for LopdfDecryptor {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn decrypt(&self, doc: &mut Document, password: &str) -> Result<Decryption> {
        match decrypt_in_place(doc, password)? {
            Decryption::Decrypted => match first_page_usable(doc) {
                Ok(()) => Ok(Decryption::Decrypted),
                Err(reason) => Ok(Decryption::Unusable(reason)),
            },
            other => Ok(other),
        }
    }
}

pub(crate) fn decrypt_in_place(doc: &mut Document, password: &str) -> Result<Decryption> {
    if doc.encryption_state.is_some() {
        // opened with the empty user password while loading; decrypting again
        // would scramble every stream
        drop_encryption_dictionary(doc);
        return Ok(Decryption::Decrypted);
    }
    match doc.decrypt(password) {
        Ok(()) => Ok(Decryption::Decrypted),
        Err(lopdf::Error::Decryption(DecryptionError::IncorrectPassword)) => {
            Err(PdfError::rejected(password))
        }
        Err(lopdf::Error::Decryption(e)) => Ok(Decryption::Unsupported(format!("{:?}", e))),
        Err(e) => Err(PdfError::CorruptedDocument(format!("encryption dictionary: {}", e))),
    }
}

fn drop_encryption_dictionary(doc: &mut Document) {
    if let Some(Ok(id)) = doc.trailer.remove(b"Encrypt").map(|o| o.as_reference()) {
        doc.objects.remove(&id);
    }
}

/// Operators a content stream may contain.
const CONTENT_OPERATORS: &[&str] = &[
    "b", "B", "b*", "B*", "BDC", "BI", "BMC", "BT", "BX", "c", "cm", "CS", "cs", "d", "d0", "d1",
    "Do", "DP", "EI", "EMC", "ET", "EX", "f", "F", "f*", "G", "g", "gs", "h", "i", "ID", "j", "J",
    "K", "k", "l", "m", "M", "MP", "n", "q", "Q", "re", "RG", "rg", "ri", "s", "S", "SC", "sc",
    "SCN", "scn", "sh", "T*", "Tc", "Td", "TD", "Tf", "Tj", "TJ", "TL", "Tm", "Tr", "Ts", "Tw",
    "Tz", "v", "w", "W", "W*", "y", "'", "\"",
];

/// A wrong key still "decrypts", into noise that often tokenizes anyway.
/// Trust the result only if the first page's content is made of real operators.
fn first_page_usable(doc: &Document) -> std::result::Result<(), String> {
    let Some(page_id) = doc.get_pages().values().next().copied() else {
        return Ok(());
    };
    let content = doc
        .get_page_content(page_id)
        .map_err(|e| format!("reading decrypted page content: {}", e))?;
    content_is_plausible(&content)
}

fn content_is_plausible(content: &[u8]) -> std::result::Result<(), String> {
    if content.iter().all(u8::is_ascii_whitespace) {
        return Ok(());
    }
    let decoded = Content::decode(content)
        .map_err(|e| format!("decrypted page content does not parse: {}", e))?;
    if decoded.operations.is_empty() {
        return Err("decrypted page content has no operators".to_string());
    }
    match decoded
        .operations
        .iter()
        .find(|op| !CONTENT_OPERATORS.contains(&op.operator.as_str()))
    {
        Some(op) => Err(format!("decrypted page content has unknown operator {:?}", op.operator)),
        None => Ok(()),
    }
}

/// The unlock strategies available to a pipeline.
pub struct Capabilities {
    pub decryptor: Option<Box<dyn Decryptor>>,
    pub rasterizer: Option<Box<dyn PageRasterizer>>,
}

impl Capabilities {
    /// Probe the build and environment once.
    pub fn detect(config: &PipelineConfig) -> Self {
        let capabilities = Capabilities {
            decryptor: Some(Box::new(LopdfDecryptor)),
            rasterizer: raster::detect_rasterizer(config),
        };
        tracing::debug!(
            decryptor = capabilities.decryptor.as_ref().map(|d| d.name()),
            rasterizer = capabilities.rasterizer.as_ref().map(|r| r.name()),
            "unlock capabilities"
        );
        capabilities
    }

    pub fn none() -> Self {
        Capabilities {
            decryptor: None,
            rasterizer: None,
        }
    }

    pub fn with_decryptor(mut self, decryptor: impl Decryptor + 'static) -> Self {
        self.decryptor = Some(Box::new(decryptor));
        self
    }

    pub fn with_rasterizer(mut self, rasterizer: impl PageRasterizer + 'static) -> Self {
        self.rasterizer = Some(Box::new(rasterizer));
        self
    }
}

/// A source ready to be split: either a plain document, or pages that were
/// already produced by the raster path.
pub enum Unlocked {
    Document(PdfDocument),
    Pages(Vec<Vec<u8>>),
}

enum Opened<'a> {
    Plain(PdfDocument),
    Raster(&'a dyn PageRasterizer),
}

/// Decides how an input is opened, given the available capabilities.
pub struct PasswordGate<'a> {
    capabilities: &'a Capabilities,
    render_scale: f32,
}

impl<'a> PasswordGate<'a> {
    pub fn new(capabilities: &'a Capabilities, render_scale: f32) -> Self {
        PasswordGate {
            capabilities,
            render_scale,
        }
    }

    /// True iff the document is encrypted and an empty password does not open it.
    pub fn needs_password(&self, bytes: &[u8]) -> Result<bool> {
        let mut source = PdfDocument::load(bytes)?;
        if !source.is_encrypted() {
            return Ok(false);
        }
        let reason = match &self.capabilities.decryptor {
            Some(decryptor) => match decryptor.decrypt(&mut source.doc, "") {
                Ok(Decryption::Decrypted) | Ok(Decryption::Unusable(_)) => return Ok(false),
                Ok(Decryption::Unsupported(reason)) => reason,
                Err(PdfError::PasswordRequired) => return Ok(true),
                Err(e) => return Err(e),
            },
            None => "no decryptor available".to_string(),
        };
        match &self.capabilities.rasterizer {
            Some(rasterizer) => match rasterizer.page_count(bytes, "") {
                Ok(_) => Ok(false),
                Err(PdfError::PasswordRequired) => Ok(true),
                Err(e) => Err(e),
            },
            None => Err(PdfError::CorruptedDocument(format!("unsupported encryption: {}", reason))),
        }
    }

    pub fn page_count(&self, bytes: &[u8], password: Option<&str>) -> Result<usize> {
        let password = password.unwrap_or("");
        match self.open(bytes, password)? {
            Opened::Plain(doc) => Ok(doc.page_count()),
            Opened::Raster(rasterizer) => rasterizer.page_count(bytes, password),
        }
    }

    /// The parsed document, decrypted if needed. `None` when only the raster
    /// path can read it.
    pub fn document(&self, bytes: &[u8], password: Option<&str>) -> Result<Option<PdfDocument>> {
        match self.open(bytes, password.unwrap_or(""))? {
            Opened::Plain(doc) => Ok(Some(doc)),
            Opened::Raster(_) => Ok(None),
        }
    }

    /// Open `bytes` for splitting. `on_page(done, total)` reports progress
    /// while the raster path renders pages.
    pub fn unlock(
        &self,
        bytes: &[u8],
        password: Option<&str>,
        on_page: &mut dyn FnMut(usize, usize),
    ) -> Result<Unlocked> {
        let password = password.unwrap_or("");
        let rasterizer = match self.open(bytes, password)? {
            Opened::Plain(doc) => return Ok(Unlocked::Document(doc)),
            Opened::Raster(rasterizer) => rasterizer,
        };

        let total = rasterizer.page_count(bytes, password)?;
        let mut pages = Vec::with_capacity(total);
        rasterizer.rasterize(bytes, password, self.render_scale, &mut |page| {
            pages.push(embed_raster_page(&page)?);
            on_page(pages.len(), total);
            Ok(())
        })?;
        tracing::info!(pages = pages.len(), rasterizer = rasterizer.name(), "rasterized encrypted document");
        Ok(Unlocked::Pages(pages))
    }

    fn open(&self, bytes: &[u8], password: &str) -> Result<Opened<'a>> {
        let mut source = PdfDocument::load(bytes)?;
        if !source.is_encrypted() {
            return Ok(Opened::Plain(source));
        }

        let reason = match &self.capabilities.decryptor {
            Some(decryptor) => match decryptor.decrypt(&mut source.doc, password)? {
                Decryption::Decrypted => {
                    tracing::debug!(decryptor = decryptor.name(), "decrypted document");
                    return Ok(Opened::Plain(source));
                }
                Decryption::Unusable(reason) | Decryption::Unsupported(reason) => reason,
            },
            None => "no decryptor available".to_string(),
        };

        let capabilities: &'a Capabilities = self.capabilities;
        match &capabilities.rasterizer {
            Some(rasterizer) => {
                tracing::warn!(%reason, "decrypted content unavailable, rendering pages instead");
                Ok(Opened::Raster(rasterizer.as_ref()))
            }
            None => Err(PdfError::UnsupportedDecryption(reason)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::raster::RasterPage;
    use lopdf::{dictionary, Object};

    fn one_page(encrypt_entry: bool) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 100.into(), 100.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);
        if encrypt_entry {
            let encrypt_id = doc.add_object(dictionary! { "Filter" => "Unknown" });
            doc.trailer.set("Encrypt", encrypt_id);
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    /// The trailer claims encryption with a handler lopdf does not know, so
    /// tests script the decryptor instead.
    fn fake_encrypted() -> Vec<u8> {
        one_page(true)
    }

    struct ScriptedDecryptor {
        password: &'static str,
        outcome: Decryption,
    }

    impl Decryptor for ScriptedDecryptor {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn decrypt(&self, _doc: &mut Document, password: &str) -> Result<Decryption> {
            if password != self.password {
                return Err(PdfError::rejected(password));
            }
            Ok(self.outcome.clone())
        }
    }

    struct SolidRasterizer {
        password: &'static str,
        pages: usize,
    }

    impl PageRasterizer for SolidRasterizer {
        fn name(&self) -> &'static str {
            "solid"
        }

        fn page_count(&self, _source: &[u8], password: &str) -> Result<usize> {
            if password != self.password {
                return Err(PdfError::rejected(password));
            }
            Ok(self.pages)
        }

        fn rasterize(
            &self,
            source: &[u8],
            password: &str,
            scale: f32,
            sink: &mut dyn FnMut(RasterPage) -> Result<()>,
        ) -> Result<()> {
            for _ in 0..self.page_count(source, password)? {
                sink(RasterPage {
                    width: 4,
                    height: 6,
                    rgb: vec![255; 4 * 6 * 3],
                    scale,
                })?;
            }
            Ok(())
        }
    }

    #[test]
    fn test_plain_document_needs_no_password() {
        let capabilities = Capabilities::none();
        let gate = PasswordGate::new(&capabilities, 2.0);
        let plain = one_page(false);

        assert!(!gate.needs_password(&plain).unwrap());
        assert_eq!(gate.page_count(&plain, None).unwrap(), 1);
        assert!(matches!(gate.unlock(&plain, Some("ignored"), &mut |_, _| {}), Ok(Unlocked::Document(_))));
    }

    #[test]
    fn test_decryptor_outcomes() {
        let bytes = fake_encrypted();
        let capabilities = Capabilities::none().with_decryptor(ScriptedDecryptor {
            password: "secret",
            outcome: Decryption::Decrypted,
        });
        let gate = PasswordGate::new(&capabilities, 2.0);

        assert!(gate.needs_password(&bytes).unwrap());
        assert!(matches!(gate.page_count(&bytes, None), Err(PdfError::PasswordRequired)));
        assert!(matches!(gate.page_count(&bytes, Some("nope")), Err(PdfError::WrongPassword)));
        assert_eq!(gate.page_count(&bytes, Some("secret")).unwrap(), 1);
        assert!(matches!(gate.unlock(&bytes, Some("secret"), &mut |_, _| {}), Ok(Unlocked::Document(_))));
    }

    #[test]
    fn test_unusable_content_without_rasterizer() {
        let bytes = fake_encrypted();
        let capabilities = Capabilities::none().with_decryptor(ScriptedDecryptor {
            password: "secret",
            outcome: Decryption::Unusable("noise".into()),
        });
        let gate = PasswordGate::new(&capabilities, 2.0);

        assert!(matches!(
            gate.unlock(&bytes, Some("secret"), &mut |_, _| {}),
            Err(PdfError::UnsupportedDecryption(_))
        ));
        // a rejected password is still reported as such
        assert!(matches!(
            gate.unlock(&bytes, Some("other"), &mut |_, _| {}),
            Err(PdfError::WrongPassword)
        ));
    }

    #[test]
    fn test_raster_fallback() {
        let bytes = fake_encrypted();
        let capabilities = Capabilities::none()
            .with_decryptor(ScriptedDecryptor {
                password: "secret",
                outcome: Decryption::Unusable("noise".into()),
            })
            .with_rasterizer(SolidRasterizer {
                password: "secret",
                pages: 3,
            });
        let gate = PasswordGate::new(&capabilities, 2.0);

        let mut progress = Vec::new();
        let unlocked = gate
            .unlock(&bytes, Some("secret"), &mut |done, total| progress.push((done, total)))
            .unwrap();
        let pages = match unlocked {
            Unlocked::Pages(pages) => pages,
            Unlocked::Document(_) => panic!("expected rasterized pages"),
        };
        assert_eq!(pages.len(), 3);
        assert_eq!(progress, vec![(1, 3), (2, 3), (3, 3)]);
        for page in &pages {
            let doc = Document::load_mem(page).unwrap();
            assert_eq!(doc.get_pages().len(), 1);
        }
        assert_eq!(gate.page_count(&bytes, Some("secret")).unwrap(), 3);
    }

    #[test]
    fn test_unsupported_scheme_asks_rasterizer() {
        let bytes = fake_encrypted();
        let capabilities = Capabilities::none()
            .with_decryptor(ScriptedDecryptor {
                password: "",
                outcome: Decryption::Unsupported("AESV4".into()),
            })
            .with_rasterizer(SolidRasterizer {
                password: "secret",
                pages: 1,
            });
        let gate = PasswordGate::new(&capabilities, 2.0);
        assert!(gate.needs_password(&bytes).unwrap());

        let capabilities = Capabilities::none().with_decryptor(ScriptedDecryptor {
            password: "",
            outcome: Decryption::Unsupported("AESV4".into()),
        });
        let gate = PasswordGate::new(&capabilities, 2.0);
        assert!(matches!(gate.needs_password(&bytes), Err(PdfError::CorruptedDocument(_))));
    }

    fn payslip(user_password: Option<&str>) -> Vec<u8> {
        use lopdf::content::Operation;
        use lopdf::{EncryptionState, EncryptionVersion, Permissions, StringFormat, Stream};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 12.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal("Name: Max Mustermann")]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! { "Type" => "Catalog", "Pages" => pages_id });
        doc.trailer.set("Root", catalog_id);

        if let Some(user_password) = user_password {
            let id = Object::String(b"payslip".to_vec(), StringFormat::Hexadecimal);
            doc.trailer.set("ID", vec![id.clone(), id]);
            let state = EncryptionState::try_from(EncryptionVersion::V2 {
                document: &doc,
                owner_password: "owner",
                user_password,
                key_length: 128,
                permissions: Permissions::PRINTABLE,
            })
            .unwrap();
            doc.encrypt(&state).unwrap();
        }
        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn first_page_content(doc: &Document) -> Vec<u8> {
        let page_id = *doc.get_pages().values().next().unwrap();
        doc.get_page_content(page_id).unwrap()
    }

    #[test]
    fn test_lopdf_user_password() {
        let bytes = payslip(Some("kanbanery"));
        let plain = first_page_content(&PdfDocument::load(&payslip(None)).unwrap().doc);

        let mut source = PdfDocument::load(&bytes).unwrap();
        assert!(source.is_encrypted());
        assert!(matches!(
            LopdfDecryptor.decrypt(&mut source.doc, "falsch"),
            Err(PdfError::WrongPassword)
        ));
        assert_eq!(LopdfDecryptor.decrypt(&mut source.doc, "kanbanery").unwrap(), Decryption::Decrypted);
        assert!(!source.is_encrypted());
        assert_eq!(first_page_content(&source.doc), plain);

        let capabilities = Capabilities::none().with_decryptor(LopdfDecryptor);
        let gate = PasswordGate::new(&capabilities, 2.0);
        assert!(gate.needs_password(&bytes).unwrap());
        assert!(matches!(gate.page_count(&bytes, None), Err(PdfError::PasswordRequired)));
        assert_eq!(gate.page_count(&bytes, Some("kanbanery")).unwrap(), 1);
    }

    #[test]
    fn test_owner_only_encryption_is_decrypted_once() {
        let bytes = payslip(Some(""));
        let plain = first_page_content(&PdfDocument::load(&payslip(None)).unwrap().doc);

        let mut source = PdfDocument::load(&bytes).unwrap();
        assert!(source.is_encrypted());
        assert_eq!(LopdfDecryptor.decrypt(&mut source.doc, "").unwrap(), Decryption::Decrypted);
        assert!(!source.is_encrypted());
        assert_eq!(first_page_content(&source.doc), plain);

        let capabilities = Capabilities::none().with_decryptor(LopdfDecryptor);
        let gate = PasswordGate::new(&capabilities, 2.0);
        assert!(!gate.needs_password(&bytes).unwrap());
        assert_eq!(gate.page_count(&bytes, None).unwrap(), 1);
    }

    #[test]
    fn test_content_plausibility() {
        assert!(content_is_plausible(b"").is_ok());
        assert!(content_is_plausible(b"BT /F1 12 Tf 72 700 Td (Hallo) Tj ET").is_ok());
        assert!(content_is_plausible(b"q 1 0 0 1 0 0 cm /Im0 Do Q").is_ok());
        assert!(content_is_plausible(b"x7Kq zzP 19 Qv").is_err());
        assert!(content_is_plausible(b"\x8f\x12\x00\xfe").is_err());
    }

    #[test]
    fn test_no_capabilities_on_encrypted_input() {
        let capabilities = Capabilities::none();
        let gate = PasswordGate::new(&capabilities, 2.0);
        assert!(matches!(
            gate.page_count(&fake_encrypted(), Some("x")),
            Err(PdfError::UnsupportedDecryption(_))
        ));
    }
}
