//! Pipeline configuration.
//!
//! A `PipelineConfig` is passed explicitly to [`crate::Pipeline::new`]. The free
//! functions at the crate root use a process-wide default instead, which can be
//! set exactly once with [`init_global_config`] before first use.

use std::path::PathBuf;
use std::sync::OnceLock;

/// Scale factor used when pages have to be rasterized.
pub const DEFAULT_RENDER_SCALE: f32 = 2.0;

/// Largest accepted input document.
pub const DEFAULT_MAX_INPUT_BYTES: usize = 50 * 1024 * 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    /// Raster scale for the fallback path (2.0 renders at 144 dpi).
    pub render_scale: f32,
    /// Inputs larger than this are rejected before parsing. `None` disables the check.
    pub max_input_bytes: Option<usize>,
    /// Directory holding the pdfium shared library. `None` tries the working
    /// directory and then the system library path.
    pub pdfium_library_path: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        PipelineConfig {
            render_scale: DEFAULT_RENDER_SCALE,
            max_input_bytes: Some(DEFAULT_MAX_INPUT_BYTES),
            pdfium_library_path: None,
        }
    }
}

impl PipelineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Non-positive or non-finite scales keep the current value; the CLI
    /// rejects them before they get here.
    pub fn with_render_scale(mut self, scale: f32) -> Self {
        if scale.is_finite() && scale > 0.0 {
            self.render_scale = scale;
        }
        self
    }

    pub fn with_max_input_bytes(mut self, limit: Option<usize>) -> Self {
        self.max_input_bytes = limit;
        self
    }

    pub fn with_pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.pdfium_library_path = Some(path.into());
        self
    }
}

static GLOBAL_CONFIG: OnceLock<PipelineConfig> = OnceLock::new();

/// Set the process-wide default configuration.
///
/// Succeeds only once; later calls (or calls after the default was first read)
/// hand the rejected config back.
pub fn init_global_config(config: PipelineConfig) -> Result<(), PipelineConfig> {
    GLOBAL_CONFIG.set(config)
}

/// The process-wide configuration, initialized to the default on first read.
pub fn global_config() -> &'static PipelineConfig {
    GLOBAL_CONFIG.get_or_init(PipelineConfig::default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.render_scale, 2.0);
        assert_eq!(config.max_input_bytes, Some(50 * 1024 * 1024));
        assert!(config.pdfium_library_path.is_none());
    }

    #[test]
    fn test_invalid_scale_is_ignored() {
        let config = PipelineConfig::new().with_render_scale(0.0);
        assert_eq!(config.render_scale, DEFAULT_RENDER_SCALE);
        let config = PipelineConfig::new().with_render_scale(f32::NAN);
        assert_eq!(config.render_scale, DEFAULT_RENDER_SCALE);
        let config = PipelineConfig::new().with_render_scale(3.0);
        assert_eq!(config.render_scale, 3.0);
    }

    #[test]
    fn test_global_config_is_init_once() {
        let first = global_config().clone();
        let rejected = init_global_config(PipelineConfig::new().with_render_scale(4.0));
        assert!(rejected.is_err());
        assert_eq!(global_config(), &first);
    }
}
