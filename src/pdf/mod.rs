pub mod document;
pub mod password;
pub mod raster;
pub mod split;
pub mod text;

pub use document::PdfDocument;
pub use password::{Capabilities, Decryption, Decryptor, LopdfDecryptor, PasswordGate, Unlocked};
pub use raster::{PageRasterizer, RasterPage};
