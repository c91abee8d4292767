use crate::deck::Deck;
use crate::image_processor::ImageProcessor;
use crate::pdf_processor::{PageRenderer, PdfProcessor};
use crate::types::*;
use std::path::Path;

/// Turns every page of a PDF into a full-height picture slide.
pub struct Converter {
    config: ConvertConfig,
}

impl Converter {
    pub fn new() -> Self {
        Self::with_config(ConvertConfig::default())
    }

    pub fn with_config(config: ConvertConfig) -> Self {
        Self { config }
    }

    /// Convert the PDF at `source` into a deck written to `dest`.
    pub fn convert(&self, source: &Path, dest: &Path) -> Result<ConversionSummary> {
        // Reject unreadable input before looking for the renderer.
        let info = PdfProcessor::probe(source)?;
        let pdfium = PdfProcessor::bind()?;
        self.convert_probed(&pdfium, &info, source, dest)
    }

    /// Like [`Converter::convert`], with an already bound pdfium library.
    pub fn convert_using(
        &self,
        pdfium: &PdfProcessor,
        source: &Path,
        dest: &Path,
    ) -> Result<ConversionSummary> {
        let info = PdfProcessor::probe(source)?;
        self.convert_probed(pdfium, &info, source, dest)
    }

    fn convert_probed(
        &self,
        pdfium: &PdfProcessor,
        info: &SourceInfo,
        source: &Path,
        dest: &Path,
    ) -> Result<ConversionSummary> {
        let mut document = pdfium.open(source)?;

        if let Some(expected) = info.page_count {
            if expected != document.page_count() {
                log::warn!(
                    "Page count mismatch for {}: structure lists {}, renderer sees {}",
                    source.display(),
                    expected,
                    document.page_count()
                );
            }
        }

        let title = source
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.convert_with(&mut document, &title, dest)
    }

    /// Run the page loop against any renderer and save the result to `dest`.
    ///
    /// Pages are rendered, staged and embedded one at a time, in order. The
    /// deck is written only once every page has been embedded.
    pub fn convert_with<R: PageRenderer + ?Sized>(
        &self,
        renderer: &mut R,
        title: &str,
        dest: &Path,
    ) -> Result<ConversionSummary> {
        let page_count = renderer.page_count();
        log::info!(
            "Converting {} pages at {} DPI into {}",
            page_count,
            self.config.dpi,
            dest.display()
        );

        let images = ImageProcessor::new(&self.config)?;
        let mut deck = Deck::new();
        if !title.is_empty() {
            deck.set_title(title);
        }
        let slide_width = deck.slide_width();
        let slide_height = deck.slide_height();

        for index in 0..page_count {
            let page = renderer.render_page(index, self.config.dpi)?;
            let staged = images.write_page(index, &page)?;
            drop(page);

            let picture = deck
                .add_slide(self.config.slide_layout)
                .add_picture(&staged, 0, 0, slide_height)?;
            picture.description = format!("Page {}", index + 1);

            if picture.width > slide_width {
                log::warn!(
                    "Page {} is wider than the slide ({} > {} EMU) and will be clipped",
                    index + 1,
                    picture.width,
                    slide_width
                );
            }

            images.discard(&staged)?;
            log::info!("Page {}/{} embedded", index + 1, page_count);
        }

        let bytes_written = deck.save(dest)?;

        Ok(ConversionSummary {
            slide_count: deck.slide_count(),
            output: dest.to_path_buf(),
            bytes_written,
        })
    }
}

impl Default for Converter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, Rgb, RgbImage};

    /// Renders solid pages of the given pixel sizes; fails at `fail_at`.
    struct SolidPages {
        sizes: Vec<(u32, u32)>,
        fail_at: Option<usize>,
        rendered: Vec<usize>,
    }

    impl PageRenderer for SolidPages {
        fn page_count(&self) -> usize {
            self.sizes.len()
        }

        fn render_page(&mut self, index: usize, _dpi: u32) -> Result<DynamicImage> {
            if self.fail_at == Some(index) {
                return Err(ConversionError::Render {
                    page: index,
                    message: "broken content stream".to_string(),
                });
            }
            self.rendered.push(index);
            let (width, height) = self.sizes[index];
            Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([255, 255, 255]))))
        }
    }

    fn converter_in(scratch: &Path) -> Converter {
        Converter::with_config(ConvertConfig {
            scratch_dir: Some(scratch.to_path_buf()),
            ..ConvertConfig::default()
        })
    }

    #[test]
    fn renders_pages_in_ascending_order() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let mut pages = SolidPages {
            sizes: vec![(20, 30), (30, 20), (25, 25)],
            fail_at: None,
            rendered: Vec::new(),
        };

        let summary = converter_in(scratch.path())
            .convert_with(&mut pages, "sample", &out.path().join("deck.pptx"))
            .unwrap();

        assert_eq!(summary.slide_count, 3);
        assert_eq!(pages.rendered, vec![0, 1, 2]);
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn pictures_are_described_by_page_number() {
        use std::io::Read;

        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("deck.pptx");
        let mut pages = SolidPages {
            sizes: vec![(20, 30), (30, 20)],
            fail_at: None,
            rendered: Vec::new(),
        };

        converter_in(scratch.path())
            .convert_with(&mut pages, "sample", &dest)
            .unwrap();

        let mut archive = zip::ZipArchive::new(std::fs::File::open(&dest).unwrap()).unwrap();
        let mut slide = String::new();
        archive
            .by_name("ppt/slides/slide2.xml")
            .unwrap()
            .read_to_string(&mut slide)
            .unwrap();
        assert!(slide.contains(r#"descr="Page 2""#), "{}", slide);
        assert!(!slide.contains(".png"));
    }

    #[test]
    fn failure_leaves_no_deck_and_no_scratch_files() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("deck.pptx");
        let mut pages = SolidPages {
            sizes: vec![(20, 30), (20, 30), (20, 30)],
            fail_at: Some(1),
            rendered: Vec::new(),
        };

        let err = converter_in(scratch.path())
            .convert_with(&mut pages, "sample", &dest)
            .unwrap_err();

        assert!(matches!(err, ConversionError::Render { page: 1, .. }));
        assert!(!dest.exists());
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[test]
    fn empty_document_yields_empty_deck() {
        let scratch = tempfile::tempdir().unwrap();
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("deck.pptx");
        let mut pages = SolidPages {
            sizes: Vec::new(),
            fail_at: None,
            rendered: Vec::new(),
        };

        let summary = converter_in(scratch.path())
            .convert_with(&mut pages, "", &dest)
            .unwrap();

        assert_eq!(summary.slide_count, 0);
        assert!(dest.exists());
    }

    #[test]
    fn missing_source_fails_before_rendering() {
        let out = tempfile::tempdir().unwrap();
        let dest = out.path().join("deck.pptx");

        let err = Converter::new()
            .convert(&out.path().join("absent.pdf"), &dest)
            .unwrap_err();

        assert!(matches!(err, ConversionError::SourceRead { .. }));
        assert!(!dest.exists());
    }
}
