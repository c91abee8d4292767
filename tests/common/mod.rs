#![allow(dead_code)]

use image::{DynamicImage, Rgb, RgbImage};
use lopdf::content::Content as PageContent;
use lopdf::ObjectId;
use pdf2slides::{ConversionError, PageRenderer, Result};
use pdf_writer::{Content, Pdf, Rect, Ref};
use std::path::{Path, PathBuf};

/// One fixture page: size in points and the RGB fill covering it.
#[derive(Debug, Clone, Copy)]
pub struct FixturePage {
    pub width_pt: f32,
    pub height_pt: f32,
    pub fill: [u8; 3],
}

impl FixturePage {
    /// Pixel size of this page rasterized at `dpi`.
    pub fn pixels_at(&self, dpi: u32) -> (u32, u32) {
        pixels_at(self.width_pt, self.height_pt, dpi)
    }
}

fn pixels_at(width_pt: f32, height_pt: f32, dpi: u32) -> (u32, u32) {
    let scale = dpi as f32 / 72.0;
    (
        (width_pt * scale).round().max(1.0) as u32,
        (height_pt * scale).round().max(1.0) as u32,
    )
}

pub const PORTRAIT_RED: FixturePage = FixturePage {
    width_pt: 612.0,
    height_pt: 792.0,
    fill: [255, 0, 0],
};

pub const LANDSCAPE_GREEN: FixturePage = FixturePage {
    width_pt: 792.0,
    height_pt: 612.0,
    fill: [0, 255, 0],
};

pub const TALL_BLUE: FixturePage = FixturePage {
    width_pt: 300.0,
    height_pt: 600.0,
    fill: [0, 0, 255],
};

/// Write a PDF whose pages are each filled with a single colour.
pub fn write_fixture(dir: &Path, name: &str, pages: &[FixturePage]) -> PathBuf {
    let mut pdf = Pdf::new();
    let catalog_id = Ref::new(1);
    let tree_id = Ref::new(2);
    let mut next_id = 3;

    pdf.catalog(catalog_id).pages(tree_id);

    let mut page_ids = Vec::new();
    for page in pages {
        let page_id = Ref::new(next_id);
        let content_id = Ref::new(next_id + 1);
        next_id += 2;
        page_ids.push(page_id);

        pdf.page(page_id)
            .media_box(Rect::new(0.0, 0.0, page.width_pt, page.height_pt))
            .parent(tree_id)
            .contents(content_id);

        let [r, g, b] = page.fill.map(|channel| channel as f32 / 255.0);
        let mut content = Content::new();
        content.set_fill_rgb(r, g, b);
        content.rect(0.0, 0.0, page.width_pt, page.height_pt);
        content.fill_nonzero();
        pdf.stream(content_id, &content.finish());
    }

    pdf.pages(tree_id)
        .kids(page_ids.iter().copied())
        .count(page_ids.len() as i32);

    let path = dir.join(name);
    std::fs::write(&path, pdf.finish()).unwrap();
    path
}

/// Rasterizes fixture PDFs without pdfium: each page becomes a solid image
/// of its MediaBox size in the page's `rg` fill colour.
pub struct FillRenderer {
    doc: lopdf::Document,
    pages: Vec<ObjectId>,
}

impl FillRenderer {
    pub fn open(path: &Path) -> Self {
        let doc = lopdf::Document::load(path).unwrap();
        let pages = doc.get_pages().values().copied().collect();
        Self { doc, pages }
    }

    /// Fixture pages carry their own MediaBox, nothing is inherited.
    fn media_box(&self, index: usize) -> Option<(f32, f32)> {
        let page = self.doc.get_dictionary(self.pages[index]).ok()?;
        let rect = page.get(b"MediaBox").ok()?.as_array().ok()?;
        let coords: Vec<f32> = rect.iter().filter_map(|v| v.as_float().ok()).collect();
        let &[x0, y0, x1, y1] = coords.as_slice() else {
            return None;
        };
        Some(((x1 - x0).abs(), (y1 - y0).abs()))
    }

    fn fill_color(&self, index: usize) -> Option<[u8; 3]> {
        let data = self.doc.get_page_content(self.pages[index]).ok()?;
        let content = PageContent::decode(&data).ok()?;
        let op = content
            .operations
            .iter()
            .find(|op| op.operator == "rg")?;

        let mut rgb = [0u8; 3];
        for (channel, operand) in rgb.iter_mut().zip(&op.operands) {
            *channel = (operand.as_float().ok()? * 255.0).round() as u8;
        }
        Some(rgb)
    }
}

impl PageRenderer for FillRenderer {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn render_page(&mut self, index: usize, dpi: u32) -> Result<DynamicImage> {
        let (width_pt, height_pt) = self.media_box(index).ok_or_else(|| ConversionError::Render {
            page: index,
            message: "no MediaBox".to_string(),
        })?;
        let (width, height) = pixels_at(width_pt, height_pt, dpi);
        let fill = self.fill_color(index).ok_or_else(|| ConversionError::Render {
            page: index,
            message: "no fill colour in content stream".to_string(),
        })?;
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width,
            height,
            Rgb(fill),
        )))
    }
}

/// Read a UTF-8 part out of a saved deck.
pub fn read_part(deck: &Path, name: &str) -> String {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(deck).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut text = String::new();
    entry.read_to_string(&mut text).unwrap();
    text
}

/// Decode the media part of a saved deck.
pub fn read_media(deck: &Path, name: &str) -> DynamicImage {
    use std::io::Read;

    let mut archive = zip::ZipArchive::new(std::fs::File::open(deck).unwrap()).unwrap();
    let mut entry = archive.by_name(name).unwrap();
    let mut bytes = Vec::new();
    entry.read_to_end(&mut bytes).unwrap();
    image::load_from_memory(&bytes).unwrap()
}

/// Names of all `ppt/slides/slideN.xml` parts, sorted by N.
pub fn slide_parts(deck: &Path) -> Vec<String> {
    let archive = zip::ZipArchive::new(std::fs::File::open(deck).unwrap()).unwrap();
    let mut numbers: Vec<usize> = archive
        .file_names()
        .filter_map(|name| {
            name.strip_prefix("ppt/slides/slide")?
                .strip_suffix(".xml")?
                .parse()
                .ok()
        })
        .collect();
    numbers.sort_unstable();
    numbers
        .into_iter()
        .map(|n| format!("ppt/slides/slide{}.xml", n))
        .collect()
}
