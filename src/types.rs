use std::path::PathBuf;
use thiserror::Error;

/// Rendering resolution used when no other value is configured.
pub const DEFAULT_DPI: u32 = 150;

/// English Metric Units per inch, the unit of all deck geometry.
pub const EMU_PER_INCH: i64 = 914_400;

/// Default deck width: 10 inches.
pub const SLIDE_WIDTH_EMU: i64 = 10 * EMU_PER_INCH;

/// Default deck height: 7.5 inches.
pub const SLIDE_HEIGHT_EMU: i64 = 6_858_000;

/// PDF user space unit (points) per inch.
pub const POINTS_PER_INCH: f32 = 72.0;

pub type Result<T> = std::result::Result<T, ConversionError>;

#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Cannot read {}: {message}", .path.display())]
    SourceRead { path: PathBuf, message: String },

    #[error("PDF renderer unavailable: {0}")]
    RendererUnavailable(String),

    #[error("Failed to render page {}: {message}", .page + 1)]
    Render { page: usize, message: String },

    #[error("Cannot write {}: {message}", .path.display())]
    Write { path: PathBuf, message: String },

    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),
}

/// Slide layout applied to every generated slide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlideLayout {
    /// The empty layout of the default template: no placeholders.
    #[default]
    Blank,
}

impl SlideLayout {
    pub fn name(self) -> &'static str {
        match self {
            SlideLayout::Blank => "Blank",
        }
    }

    /// `type` attribute of the `p:sldLayout` root.
    pub fn kind(self) -> &'static str {
        match self {
            SlideLayout::Blank => "blank",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConvertConfig {
    pub dpi: u32,
    pub slide_layout: SlideLayout,
    /// Parent of the per-run scratch directory. `None` uses the OS temp dir.
    pub scratch_dir: Option<PathBuf>,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            dpi: DEFAULT_DPI,
            slide_layout: SlideLayout::Blank,
            scratch_dir: None,
        }
    }
}

/// What a cheap structural read of the source told us before rendering.
#[derive(Debug, Clone, Default)]
pub struct SourceInfo {
    /// `None` when the structure could not be parsed without the renderer.
    pub page_count: Option<usize>,
}

#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub slide_count: usize,
    pub output: PathBuf,
    pub bytes_written: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_fixed_policy() {
        let config = ConvertConfig::default();
        assert_eq!(config.dpi, 150);
        assert_eq!(config.slide_layout, SlideLayout::Blank);
        assert!(config.scratch_dir.is_none());
    }

    #[test]
    fn render_error_reports_one_based_page() {
        let err = ConversionError::Render { page: 2, message: "bad stream".to_string() };
        assert_eq!(err.to_string(), "Failed to render page 3: bad stream");
    }

    #[test]
    fn deck_defaults_are_four_by_three() {
        assert_eq!(SLIDE_WIDTH_EMU, 9_144_000);
        assert_eq!(SLIDE_HEIGHT_EMU * 4, SLIDE_WIDTH_EMU * 3);
    }
}
