//! Raster fallback for encrypted documents whose decrypted content cannot be
//! obtained: render each page and wrap the image in a fresh one-page PDF.

use crate::config::PipelineConfig;
use crate::error::{PdfError, Result};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};

/// One rendered page, 8-bit RGB, row-major.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub width: u32,
    pub height: u32,
    pub rgb: Vec<u8>,
    /// Pixels per PDF point the page was rendered at.
    pub scale: f32,
}

/// Something that can render the pages of a (possibly encrypted) PDF.
pub trait PageRasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    /// Number of pages, opening the document with `password`.
    fn page_count(&self, source: &[u8], password: &str) -> Result<usize>;

    /// Render every page in order and hand each one to `sink`.
    fn rasterize(
        &self,
        source: &[u8],
        password: &str,
        scale: f32,
        sink: &mut dyn FnMut(RasterPage) -> Result<()>,
    ) -> Result<()>;
}

/// Wrap a rendered page in a new single-page PDF sized `pixels / scale` points.
pub fn embed_raster_page(page: &RasterPage) -> Result<Vec<u8>> {
    let expected = page.width as usize * page.height as usize * 3;
    if page.width == 0 || page.height == 0 || page.rgb.len() != expected {
        return Err(PdfError::Serialize(format!(
            "raster of {}x{} has {} bytes, expected {}",
            page.width,
            page.height,
            page.rgb.len(),
            expected
        )));
    }
    let scale = if page.scale > 0.0 { page.scale } else { 1.0 };
    let width_pt = page.width as f32 / scale;
    let height_pt = page.height as f32 / scale;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut image = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => page.width as i64,
            "Height" => page.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
        },
        page.rgb.clone(),
    );
    image
        .compress()
        .map_err(|e| PdfError::Serialize(format!("compressing page image: {}", e)))?;
    let image_id = doc.add_object(image);

    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width_pt.into(),
                    0.into(),
                    0.into(),
                    height_pt.into(),
                    0.into(),
                    0.into(),
                ],
            ),
            Operation::new("Do", vec!["Im0".into()]),
            Operation::new("Q", vec![]),
        ],
    };
    let content = content
        .encode()
        .map_err(|e| PdfError::Serialize(format!("encoding page content: {}", e)))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, content));

    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), width_pt.into(), height_pt.into()],
        "Resources" => dictionary! {
            "XObject" => dictionary! { "Im0" => image_id },
        },
        "Contents" => content_id,
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| PdfError::Serialize(e.to_string()))?;
    Ok(buffer)
}

/// Probe for a usable rasterizer in this build and environment.
#[cfg(feature = "pdfium")]
pub fn detect_rasterizer(config: &PipelineConfig) -> Option<Box<dyn PageRasterizer>> {
    let rasterizer = pdfium_backend::PdfiumRasterizer::new(config.pdfium_library_path.clone());
    match rasterizer.bind() {
        Ok(_) => {
            tracing::debug!("pdfium rasterizer available");
            Some(Box::new(rasterizer))
        }
        Err(e) => {
            tracing::debug!(error = %e, "pdfium rasterizer not available");
            None
        }
    }
}

#[cfg(not(feature = "pdfium"))]
pub fn detect_rasterizer(_config: &PipelineConfig) -> Option<Box<dyn PageRasterizer>> {
    None
}

#[cfg(feature = "pdfium")]
pub use pdfium_backend::PdfiumRasterizer;

#[cfg(feature = "pdfium")]
mod pdfium_backend {
    use super::{PageRasterizer, RasterPage};
    use crate::error::{PdfError, Result};
    use pdfium_render::prelude::*;
    use std::path::PathBuf;

    /// Renders pages through a dynamically loaded pdfium library.
    pub struct PdfiumRasterizer {
        library_path: Option<PathBuf>,
    }

    impl PdfiumRasterizer {
        pub fn new(library_path: Option<PathBuf>) -> Self {
            PdfiumRasterizer { library_path }
        }

        pub fn bind(&self) -> Result<Pdfium> {
            let bindings = match &self.library_path {
                Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                    &*dir.to_string_lossy(),
                )),
                None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| Pdfium::bind_to_system_library()),
            }
            .map_err(|e| PdfError::UnsupportedDecryption(format!("pdfium library not loadable: {:?}", e)))?;
            Ok(Pdfium::new(bindings))
        }
    }

    fn map_open_error(error: PdfiumError, password: &str) -> PdfError {
        match error {
            PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
                PdfError::rejected(password)
            }
            other => PdfError::CorruptedDocument(format!("pdfium: {:?}", other)),
        }
    }

    fn password_arg(password: &str) -> Option<&str> {
        if password.is_empty() {
            None
        } else {
            Some(password)
        }
    }

    impl PageRasterizer for PdfiumRasterizer {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn page_count(&self, source: &[u8], password: &str) -> Result<usize> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(source, password_arg(password))
                .map_err(|e| map_open_error(e, password))?;
            Ok(document.pages().len() as usize)
        }

        fn rasterize(
            &self,
            source: &[u8],
            password: &str,
            scale: f32,
            sink: &mut dyn FnMut(RasterPage) -> Result<()>,
        ) -> Result<()> {
            let pdfium = self.bind()?;
            let document = pdfium
                .load_pdf_from_byte_slice(source, password_arg(password))
                .map_err(|e| map_open_error(e, password))?;

            for (index, page) in document.pages().iter().enumerate() {
                let width = (page.width().value * scale).round().max(1.0) as i32;
                let height = (page.height().value * scale).round().max(1.0) as i32;
                let config = PdfRenderConfig::new()
                    .set_target_width(width)
                    .set_target_height(height)
                    .render_form_data(true)
                    .render_annotations(true);
                let bitmap = page.render_with_config(&config).map_err(|e| {
                    PdfError::UnsupportedDecryption(format!("rendering page {}: {:?}", index + 1, e))
                })?;
                let image = bitmap.as_image().to_rgb8();
                sink(RasterPage {
                    width: image.width(),
                    height: image.height(),
                    rgb: image.into_raw(),
                    scale,
                })?;
            }
            Ok(())
        }
    }
}
