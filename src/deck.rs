use crate::template::{self, content_type, escape_xml, rel_type};
use crate::types::*;
use chrono::{DateTime, Utc};
use image::{ImageFormat, ImageReader};
use std::fmt::Write as FmtWrite;
use std::io::{Cursor, Seek, Write};
use std::path::Path;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

/// First `p:sldId` value; ids below 256 are reserved.
const FIRST_SLIDE_ID: u32 = 256;

const NOTES_WIDTH_EMU: i64 = 6_858_000;
const NOTES_HEIGHT_EMU: i64 = 9_144_000;

const APPLICATION: &str = "pdf2slides";

/// A picture shape placed on a slide. Geometry is in EMU.
#[derive(Debug, Clone)]
pub struct Picture {
    pub left: i64,
    pub top: i64,
    pub width: i64,
    pub height: i64,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub description: String,
    format: ImageFormat,
    data: Vec<u8>,
}

impl Picture {
    fn extension(&self) -> &'static str {
        match self.format {
            ImageFormat::Jpeg => "jpeg",
            _ => "png",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Slide {
    slide_id: u32,
    layout: SlideLayout,
    pictures: Vec<Picture>,
}

impl Slide {
    fn new(slide_id: u32, layout: SlideLayout) -> Self {
        Self {
            slide_id,
            layout,
            pictures: Vec::new(),
        }
    }

    pub fn slide_id(&self) -> u32 {
        self.slide_id
    }

    pub fn layout(&self) -> SlideLayout {
        self.layout
    }

    pub fn pictures(&self) -> &[Picture] {
        &self.pictures
    }

    /// Embed the image at `path` with its top-left corner at (`left`, `top`)
    /// and a displayed height of `height`. The width keeps the image's
    /// native proportions.
    ///
    /// The file is read into the deck immediately, so the caller may remove
    /// it as soon as this returns. The description defaults to the file name.
    pub fn add_picture(
        &mut self,
        path: &Path,
        left: i64,
        top: i64,
        height: i64,
    ) -> Result<&mut Picture> {
        let data = std::fs::read(path)?;
        let reader = ImageReader::new(Cursor::new(&data)).with_guessed_format()?;
        let format = match reader.format() {
            Some(format @ (ImageFormat::Png | ImageFormat::Jpeg)) => format,
            other => {
                return Err(ConversionError::Io(std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("unsupported picture format {:?} in {}", other, path.display()),
                )))
            }
        };

        // Header only; the pixels are never decoded.
        let (pixel_width, pixel_height) = reader.into_dimensions()?;
        let width = scaled_width(pixel_width, pixel_height, height);

        let description = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.pictures.push(Picture {
            left,
            top,
            width,
            height,
            pixel_width,
            pixel_height,
            description,
            format,
            data,
        });

        let last = self.pictures.len() - 1;
        Ok(&mut self.pictures[last])
    }

    /// `image_rel_ids` holds one relationship id per picture, in order.
    fn to_xml(&self, image_rel_ids: &[String]) -> String {
        let mut xml = String::with_capacity(1024);

        xml.push_str(template::XML_DECL);
        let _ = write!(
            xml,
            r#"<p:sld xmlns:a="{}" xmlns:r="{}" xmlns:p="{}">"#,
            template::NS_A,
            template::NS_R,
            template::NS_P
        );
        xml.push_str("<p:cSld><p:spTree>");
        xml.push_str(template::GROUP_SHAPE_HEADER);

        for (index, (picture, rel_id)) in self.pictures.iter().zip(image_rel_ids).enumerate() {
            // Shape id 1 is the root group.
            let shape_id = index + 2;
            xml.push_str("<p:pic><p:nvPicPr>");
            let _ = write!(
                xml,
                r#"<p:cNvPr id="{}" name="Picture {}" descr="{}"/>"#,
                shape_id,
                index + 1,
                escape_xml(&picture.description)
            );
            xml.push_str(r#"<p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/>"#);
            xml.push_str("</p:nvPicPr>");

            let _ = write!(
                xml,
                r#"<p:blipFill><a:blip r:embed="{}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill>"#,
                rel_id
            );

            let _ = write!(
                xml,
                r#"<p:spPr><a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
                picture.left, picture.top, picture.width, picture.height
            );
            xml.push_str(r#"<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr>"#);
            xml.push_str("</p:pic>");
        }

        xml.push_str("</p:spTree></p:cSld>");
        xml.push_str("<p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>");
        xml.push_str("</p:sld>");
        xml
    }
}

/// An in-memory presentation built from the default template.
#[derive(Debug, Clone)]
pub struct Deck {
    slides: Vec<Slide>,
    slide_width: i64,
    slide_height: i64,
    title: Option<String>,
    created: DateTime<Utc>,
}

impl Deck {
    /// Empty deck at the default 10in x 7.5in size.
    pub fn new() -> Self {
        Self {
            slides: Vec::new(),
            slide_width: SLIDE_WIDTH_EMU,
            slide_height: SLIDE_HEIGHT_EMU,
            title: None,
            created: Utc::now(),
        }
    }

    pub fn slide_width(&self) -> i64 {
        self.slide_width
    }

    pub fn slide_height(&self) -> i64 {
        self.slide_height
    }

    pub fn slide_count(&self) -> usize {
        self.slides.len()
    }

    pub fn slides(&self) -> &[Slide] {
        &self.slides
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = Some(title.into());
    }

    pub fn add_slide(&mut self, layout: SlideLayout) -> &mut Slide {
        let slide_id = FIRST_SLIDE_ID + self.slides.len() as u32;
        self.slides.push(Slide::new(slide_id, layout));
        let last = self.slides.len() - 1;
        &mut self.slides[last]
    }

    /// Serialize and write the deck to `path`, returning the byte count.
    ///
    /// The package is assembled in memory first, so nothing touches `path`
    /// unless serialization succeeded.
    pub fn save(&self, path: &Path) -> Result<u64> {
        let bytes = self.to_bytes()?;

        std::fs::write(path, &bytes).map_err(|e| ConversionError::Write {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        log::info!(
            "Saved deck: {} slides, {} bytes to {}",
            self.slides.len(),
            bytes.len(),
            path.display()
        );
        Ok(bytes.len() as u64)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let cursor = self.write_package(Cursor::new(Vec::new()))?;
        Ok(cursor.into_inner())
    }

    fn write_package<W: Write + Seek>(&self, writer: W) -> Result<W> {
        let mut zip = ZipWriter::new(writer);
        let media = self.media_names();

        put_xml(&mut zip, "[Content_Types].xml", &self.content_types_xml(&media))?;
        put_xml(&mut zip, "_rels/.rels", &package_rels_xml())?;
        put_xml(&mut zip, "docProps/core.xml", &self.core_props_xml())?;
        put_xml(&mut zip, "docProps/app.xml", &self.app_props_xml())?;

        put_xml(&mut zip, "ppt/presentation.xml", &self.presentation_xml())?;
        put_xml(
            &mut zip,
            "ppt/_rels/presentation.xml.rels",
            &self.presentation_rels_xml(),
        )?;
        put_xml(&mut zip, "ppt/presProps.xml", &template::pres_props_xml())?;
        put_xml(&mut zip, "ppt/viewProps.xml", &template::view_props_xml())?;
        put_xml(&mut zip, "ppt/tableStyles.xml", &template::table_styles_xml())?;
        put_xml(&mut zip, "ppt/theme/theme1.xml", &template::theme_xml())?;

        put_xml(
            &mut zip,
            "ppt/slideMasters/slideMaster1.xml",
            &template::slide_master_xml(),
        )?;
        put_xml(
            &mut zip,
            "ppt/slideMasters/_rels/slideMaster1.xml.rels",
            &relationships_xml(&[
                ("rId1", rel_type::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml"),
                ("rId2", rel_type::THEME, "../theme/theme1.xml"),
            ]),
        )?;

        let layout = self
            .slides
            .first()
            .map(Slide::layout)
            .unwrap_or_default();
        put_xml(
            &mut zip,
            "ppt/slideLayouts/slideLayout1.xml",
            &template::slide_layout_xml(layout),
        )?;
        put_xml(
            &mut zip,
            "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
            &relationships_xml(&[(
                "rId1",
                rel_type::SLIDE_MASTER,
                "../slideMasters/slideMaster1.xml",
            )]),
        )?;

        for (index, (slide, names)) in self.slides.iter().zip(&media).enumerate() {
            let number = index + 1;
            let rel_ids: Vec<String> = (0..names.len()).map(|i| format!("rId{}", i + 2)).collect();
            let targets: Vec<String> = names.iter().map(|name| format!("../media/{}", name)).collect();

            let mut rels = vec![("rId1", rel_type::SLIDE_LAYOUT, "../slideLayouts/slideLayout1.xml")];
            for (rel_id, target) in rel_ids.iter().zip(&targets) {
                rels.push((rel_id.as_str(), rel_type::IMAGE, target.as_str()));
            }

            put_xml(
                &mut zip,
                &format!("ppt/slides/slide{}.xml", number),
                &slide.to_xml(&rel_ids),
            )?;
            put_xml(
                &mut zip,
                &format!("ppt/slides/_rels/slide{}.xml.rels", number),
                &relationships_xml(&rels),
            )?;

            for (picture, name) in slide.pictures.iter().zip(names) {
                // Already-compressed media gains nothing from deflate.
                let options =
                    SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
                zip.start_file(format!("ppt/media/{}", name), options)?;
                zip.write_all(&picture.data)?;
            }
            log::debug!("Packaged slide {} ({} pictures)", number, names.len());
        }

        Ok(zip.finish()?)
    }

    /// Media part names per slide, numbered across the whole deck.
    fn media_names(&self) -> Vec<Vec<String>> {
        let mut counter = 0;
        self.slides
            .iter()
            .map(|slide| {
                slide
                    .pictures
                    .iter()
                    .map(|picture| {
                        counter += 1;
                        format!("image{}.{}", counter, picture.extension())
                    })
                    .collect()
            })
            .collect()
    }

    fn content_types_xml(&self, media: &[Vec<String>]) -> String {
        let mut xml = String::with_capacity(2048);
        xml.push_str(template::XML_DECL);
        let _ = write!(xml, r#"<Types xmlns="{}">"#, template::NS_CONTENT_TYPES);

        let _ = write!(
            xml,
            r#"<Default Extension="rels" ContentType="{}"/>"#,
            content_type::RELATIONSHIPS
        );
        xml.push_str(r#"<Default Extension="xml" ContentType="application/xml"/>"#);
        let _ = write!(
            xml,
            r#"<Default Extension="png" ContentType="{}"/>"#,
            content_type::PNG
        );
        if media.iter().flatten().any(|name| name.ends_with(".jpeg")) {
            xml.push_str(r#"<Default Extension="jpeg" ContentType="image/jpeg"/>"#);
        }

        let mut overrides = vec![
            ("/ppt/presentation.xml".to_string(), content_type::PRESENTATION),
            ("/ppt/slideMasters/slideMaster1.xml".to_string(), content_type::SLIDE_MASTER),
            ("/ppt/slideLayouts/slideLayout1.xml".to_string(), content_type::SLIDE_LAYOUT),
            ("/ppt/theme/theme1.xml".to_string(), content_type::THEME),
            ("/ppt/presProps.xml".to_string(), content_type::PRES_PROPS),
            ("/ppt/viewProps.xml".to_string(), content_type::VIEW_PROPS),
            ("/ppt/tableStyles.xml".to_string(), content_type::TABLE_STYLES),
            ("/docProps/core.xml".to_string(), content_type::CORE_PROPERTIES),
            ("/docProps/app.xml".to_string(), content_type::EXTENDED_PROPERTIES),
        ];
        for number in 1..=self.slides.len() {
            overrides.push((format!("/ppt/slides/slide{}.xml", number), content_type::SLIDE));
        }

        for (part, kind) in overrides {
            let _ = write!(xml, r#"<Override PartName="{}" ContentType="{}"/>"#, part, kind);
        }
        xml.push_str("</Types>");
        xml
    }

    fn presentation_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(template::XML_DECL);
        let _ = write!(
            xml,
            r#"<p:presentation xmlns:a="{}" xmlns:r="{}" xmlns:p="{}" saveSubsetFonts="1">"#,
            template::NS_A,
            template::NS_R,
            template::NS_P
        );
        xml.push_str(r#"<p:sldMasterIdLst><p:sldMasterId id="2147483648" r:id="rId1"/></p:sldMasterIdLst>"#);

        if !self.slides.is_empty() {
            xml.push_str("<p:sldIdLst>");
            for (index, slide) in self.slides.iter().enumerate() {
                let _ = write!(
                    xml,
                    r#"<p:sldId id="{}" r:id="rId{}"/>"#,
                    slide.slide_id,
                    index + PRESENTATION_FIXED_RELS + 1
                );
            }
            xml.push_str("</p:sldIdLst>");
        }

        let _ = write!(
            xml,
            r#"<p:sldSz cx="{}" cy="{}"/><p:notesSz cx="{}" cy="{}"/>"#,
            self.slide_width, self.slide_height, NOTES_WIDTH_EMU, NOTES_HEIGHT_EMU
        );
        xml.push_str("</p:presentation>");
        xml
    }

    fn presentation_rels_xml(&self) -> String {
        let slide_rels: Vec<(String, String)> = (1..=self.slides.len())
            .map(|number| {
                (
                    format!("rId{}", number + PRESENTATION_FIXED_RELS),
                    format!("slides/slide{}.xml", number),
                )
            })
            .collect();

        let mut rels = vec![
            ("rId1", rel_type::SLIDE_MASTER, "slideMasters/slideMaster1.xml"),
            ("rId2", rel_type::PRES_PROPS, "presProps.xml"),
            ("rId3", rel_type::VIEW_PROPS, "viewProps.xml"),
            ("rId4", rel_type::THEME, "theme/theme1.xml"),
            ("rId5", rel_type::TABLE_STYLES, "tableStyles.xml"),
        ];
        for (rel_id, target) in &slide_rels {
            rels.push((rel_id.as_str(), rel_type::SLIDE, target.as_str()));
        }
        relationships_xml(&rels)
    }

    fn core_props_xml(&self) -> String {
        let timestamp = self.created.format("%Y-%m-%dT%H:%M:%SZ").to_string();
        let mut xml = String::with_capacity(1024);
        xml.push_str(template::XML_DECL);
        xml.push_str(concat!(
            r#"<cp:coreProperties "#,
            r#"xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" "#,
            r#"xmlns:dc="http://purl.org/dc/elements/1.1/" "#,
            r#"xmlns:dcterms="http://purl.org/dc/terms/" "#,
            r#"xmlns:dcmitype="http://purl.org/dc/dcmitype/" "#,
            r#"xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">"#,
        ));
        if let Some(title) = &self.title {
            let _ = write!(xml, "<dc:title>{}</dc:title>", escape_xml(title));
        }
        let _ = write!(
            xml,
            concat!(
                "<cp:lastModifiedBy>{app}</cp:lastModifiedBy><cp:revision>1</cp:revision>",
                r#"<dcterms:created xsi:type="dcterms:W3CDTF">{ts}</dcterms:created>"#,
                r#"<dcterms:modified xsi:type="dcterms:W3CDTF">{ts}</dcterms:modified>"#,
            ),
            app = APPLICATION,
            ts = timestamp
        );
        xml.push_str("</cp:coreProperties>");
        xml
    }

    fn app_props_xml(&self) -> String {
        format!(
            concat!(
                "{decl}",
                r#"<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" "#,
                r#"xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">"#,
                "<Application>{app}</Application><Slides>{slides}</Slides>",
                "</Properties>",
            ),
            decl = template::XML_DECL,
            app = APPLICATION,
            slides = self.slides.len()
        )
    }
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

/// Relationships of presentation.xml that precede the slide entries.
const PRESENTATION_FIXED_RELS: usize = 5;

/// Width in EMU of a picture scaled to `height` EMU, keeping proportions.
pub fn scaled_width(pixel_width: u32, pixel_height: u32, height: i64) -> i64 {
    if pixel_height == 0 {
        return 0;
    }
    (height as f64 * pixel_width as f64 / pixel_height as f64).round() as i64
}

fn put_xml<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, xml: &str) -> Result<()> {
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file(name, options)?;
    zip.write_all(xml.as_bytes())?;
    Ok(())
}

fn package_rels_xml() -> String {
    relationships_xml(&[
        ("rId1", rel_type::OFFICE_DOCUMENT, "ppt/presentation.xml"),
        ("rId2", rel_type::CORE_PROPERTIES, "docProps/core.xml"),
        ("rId3", rel_type::EXTENDED_PROPERTIES, "docProps/app.xml"),
    ])
}

fn relationships_xml(rels: &[(&str, &str, &str)]) -> String {
    let mut xml = String::with_capacity(256 + rels.len() * 160);
    xml.push_str(template::XML_DECL);
    let _ = write!(xml, r#"<Relationships xmlns="{}">"#, template::NS_PKG_RELS);
    for (id, kind, target) in rels {
        let _ = write!(
            xml,
            r#"<Relationship Id="{}" Type="{}" Target="{}"/>"#,
            id,
            kind,
            escape_xml(target)
        );
    }
    xml.push_str("</Relationships>");
    xml
}
