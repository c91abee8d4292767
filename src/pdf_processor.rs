use crate::types::*;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};

const PDF_MAGIC: &[u8] = b"%PDF-";

/// Readers accept the header anywhere in the first 1024 bytes.
const HEADER_SEARCH_LIMIT: usize = 1024;

/// A source of page rasters. Pages are addressed by zero-based index.
pub trait PageRenderer {
    fn page_count(&self) -> usize;

    fn render_page(&mut self, index: usize, dpi: u32) -> Result<DynamicImage>;
}

/// Owns the bound pdfium library for the duration of a run.
pub struct PdfProcessor {
    pdfium: Pdfium,
}

impl PdfProcessor {
    /// Bind the pdfium shared library, preferring copies shipped alongside
    /// the executable over the system-wide one.
    pub fn bind() -> Result<Self> {
        let search_paths = library_search_paths();

        for dir in &search_paths {
            let lib_path = Pdfium::pdfium_platform_library_name_at_path(dir);
            log::debug!("Trying pdfium at {}", lib_path.display());

            if let Ok(bindings) = Pdfium::bind_to_library(&lib_path) {
                log::info!("Bound pdfium from {}", dir.display());
                return Ok(Self {
                    pdfium: Pdfium::new(bindings),
                });
            }
        }

        log::debug!("Trying system pdfium library");
        Pdfium::bind_to_system_library()
            .map(|bindings| Self {
                pdfium: Pdfium::new(bindings),
            })
            .map_err(|e| unavailable(&search_paths, &e.to_string()))
    }

    /// Open a document for rendering.
    pub fn open<'a>(&'a self, path: &Path) -> Result<PdfiumPages<'a>> {
        let document = self
            .pdfium
            .load_pdf_from_file(path, None)
            .map_err(|e| ConversionError::SourceRead {
                path: path.to_path_buf(),
                message: one_line(&e.to_string()),
            })?;

        log::info!(
            "Opened {} ({} pages)",
            path.display(),
            document.pages().len()
        );
        Ok(PdfiumPages { document })
    }

    /// Check that `path` is a readable PDF and count its pages.
    ///
    /// Missing files and non-PDF content are hard errors. A file that has the
    /// PDF header but that `lopdf` cannot parse is passed through with
    /// `page_count: None`, since pdfium tolerates more damage than `lopdf`.
    pub fn probe(path: &Path) -> Result<SourceInfo> {
        let content = std::fs::read(path).map_err(|e| ConversionError::SourceRead {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        if !has_pdf_header(&content) {
            return Err(ConversionError::SourceRead {
                path: path.to_path_buf(),
                message: "not a PDF document".to_string(),
            });
        }

        let page_count = match lopdf::Document::load_mem(&content) {
            Ok(doc) => doc.get_pages().len(),
            Err(e) => {
                log::warn!("Structural read of {} failed: {}", path.display(), e);
                return Ok(SourceInfo::default());
            }
        };

        log::debug!(
            "Probed {}: {} pages, {} bytes",
            path.display(),
            page_count,
            content.len()
        );

        Ok(SourceInfo {
            page_count: Some(page_count),
        })
    }
}

/// An open pdfium document.
pub struct PdfiumPages<'a> {
    document: PdfDocument<'a>,
}

impl PageRenderer for PdfiumPages<'_> {
    fn page_count(&self) -> usize {
        self.document.pages().len() as usize
    }

    fn render_page(&mut self, index: usize, dpi: u32) -> Result<DynamicImage> {
        let render_error = |message: String| ConversionError::Render {
            page: index,
            message,
        };

        let page_index = index
            .try_into()
            .map_err(|_| render_error(format!("page index {} out of range", index)))?;
        let page = self
            .document
            .pages()
            .get(page_index)
            .map_err(|e| render_error(one_line(&e.to_string())))?;

        let render_config = PdfRenderConfig::new().scale_page_by_factor(render_scale(dpi));
        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| render_error(one_line(&e.to_string())))?;

        Ok(bitmap.as_image())
    }
}

fn library_search_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            paths.push(exe_dir.join("libs"));
            paths.push(exe_dir.to_path_buf());
        }
    }

    paths.push(PathBuf::from("libs"));
    paths.push(PathBuf::from("./"));
    paths
}

/// Zoom factor that maps PDF points to pixels at `dpi`.
fn render_scale(dpi: u32) -> f32 {
    dpi as f32 / POINTS_PER_INCH
}

fn has_pdf_header(content: &[u8]) -> bool {
    let window = &content[..content.len().min(HEADER_SEARCH_LIMIT + PDF_MAGIC.len())];
    window.windows(PDF_MAGIC.len()).any(|chunk| chunk == PDF_MAGIC)
}

/// Collapse pdfium's multi-line error text onto one line.
fn one_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn unavailable(searched: &[PathBuf], cause: &str) -> ConversionError {
    let dirs: Vec<String> = searched
        .iter()
        .map(|dir| dir.display().to_string())
        .collect();
    ConversionError::RendererUnavailable(format!(
        "no pdfium library in [{}] or on the system library path ({})",
        dirs.join(", "),
        one_line(cause)
    ))
}
