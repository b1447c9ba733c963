//! PDF rendering with `lopdf`.
//!
//! A small flow layouter: blocks are wrapped into lines, stacked top to
//! bottom on A4 pages and broken onto a new page when the space above the
//! footer runs out. Every page gets a footer with the document title and the
//! page number.
//!
//! Images are decoded with the `image` crate and embedded as RGB image
//! XObjects. An image that is missing or cannot be decoded is replaced by a
//! `[Bild: name]` line.

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream, StringFormat};

use super::fonts::{encode_win_ansi, text_width, Font};
use super::{ExportError, ExportResult};
use crate::core::PdfConfig;

/// A4 width in points.
pub const PAGE_WIDTH: f32 = 595.276;
/// A4 height in points.
pub const PAGE_HEIGHT: f32 = 841.89;
/// Points per centimetre.
pub const POINTS_PER_CM: f32 = 28.3465;

const FOOTER_SIZE: f32 = 10.0;
const FOOTER_SPACE: f32 = 24.0;
const BULLET_INDENT: f32 = 14.0;
const DIVIDER_GAP: f32 = 10.0;
const IMAGE_GAP: f32 = 6.0;
/// Images are drawn at half their nominal size.
const IMAGE_SCALE: f32 = 0.5;

/// One unit of document flow.
#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    /// Item title
    Heading1(String),
    /// Entry, page or record title
    Heading2(String),
    /// Heading inside a body
    Heading3(String),
    Paragraph(String),
    Bullet(String),
    /// Horizontal rule between glossary entries
    Divider,
    /// Continue on a fresh page
    PageBreak,
    Image(ImageBlock),
}

/// An image referenced by the content, with its bytes once downloaded.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBlock {
    /// Source URL as found in the HTML
    pub src: String,
    /// File name shown when the image cannot be embedded
    pub name: String,
    /// Nominal width from the `width` attribute
    pub width: Option<f32>,
    /// Nominal height from the `height` attribute
    pub height: Option<f32>,
    pub data: Option<Vec<u8>>,
}

impl ImageBlock {
    pub fn new(src: impl Into<String>) -> Self {
        let src = src.into();
        let path = src.split(['?', '#']).next().unwrap_or_default();
        let name = path.rsplit('/').next().unwrap_or_default().to_string();
        Self { src, name, width: None, height: None, data: None }
    }

    /// Text drawn instead of the image.
    pub fn placeholder(&self) -> String {
        format!("[Bild: {}]", self.name)
    }

    /// Size on the page in points for an image of `pixels` size, before it
    /// is fitted into the text area. A single given dimension keeps the
    /// aspect ratio.
    pub fn display_size(&self, pixels: (u32, u32)) -> (f32, f32) {
        let (pw, ph) = (pixels.0.max(1) as f32, pixels.1.max(1) as f32);
        let (w, h) = match (self.width, self.height) {
            (Some(w), Some(h)) => (w, h),
            (Some(w), None) => (w, w * ph / pw),
            (None, Some(h)) => (h * pw / ph, h),
            (None, None) => (pw, ph),
        };
        ((w * IMAGE_SCALE).max(1.0), (h * IMAGE_SCALE).max(1.0))
    }
}

/// Document settings, with borders already converted to points.
#[derive(Debug, Clone)]
pub struct PdfSettings {
    pub title: String,
    pub author: String,
    pub border_horizontal: f32,
    pub border_vertical: f32,
    /// Compress content streams
    pub compress: bool,
}

impl PdfSettings {
    pub fn from_config(config: &PdfConfig) -> Self {
        Self {
            title: config.title.clone(),
            author: config.author.clone(),
            border_horizontal: config.border_horizontal * POINTS_PER_CM,
            border_vertical: config.border_vertical * POINTS_PER_CM,
            compress: true,
        }
    }
}

impl Default for PdfSettings {
    fn default() -> Self {
        Self::from_config(&PdfConfig::default())
    }
}

#[derive(Clone, Copy)]
struct Style {
    font: Font,
    size: f32,
    leading: f32,
    space_before: f32,
    space_after: f32,
}

const HEADING1: Style =
    Style { font: Font::Bold, size: 16.0, leading: 20.0, space_before: 6.0, space_after: 10.0 };
const HEADING2: Style =
    Style { font: Font::Bold, size: 13.0, leading: 17.0, space_before: 10.0, space_after: 4.0 };
const HEADING3: Style =
    Style { font: Font::Bold, size: 11.0, leading: 14.0, space_before: 6.0, space_after: 2.0 };
const BODY: Style =
    Style { font: Font::Regular, size: 11.0, leading: 14.0, space_before: 0.0, space_after: 6.0 };
const BULLET: Style =
    Style { font: Font::Regular, size: 11.0, leading: 14.0, space_before: 0.0, space_after: 3.0 };

/// Renders blocks into a complete PDF file.
#[derive(Debug, Clone, Default)]
pub struct PdfWriter {
    settings: PdfSettings,
}

impl PdfWriter {
    pub fn new(settings: PdfSettings) -> Self {
        Self { settings }
    }

    /// Lay out `blocks` and return the bytes of the finished document.
    pub fn render(&self, blocks: &[Block]) -> ExportResult<Vec<u8>> {
        let mut layout = Layout::new(&self.settings);
        for block in blocks {
            layout.block(block);
        }
        let (mut pages, images) = layout.finish();

        let total = pages.len();
        for (index, ops) in pages.iter_mut().enumerate() {
            self.footer(ops, index + 1);
        }
        tracing::debug!(pages = total, blocks = blocks.len(), "Laid out PDF document");

        self.assemble(pages, images)
    }

    fn footer(&self, ops: &mut Vec<Operation>, page: usize) {
        let s = &self.settings;
        let y = s.border_vertical;
        show_text(ops, Font::Regular, FOOTER_SIZE, s.border_horizontal, y, &s.title);

        let label = format!("Seite {page}");
        let x = PAGE_WIDTH - s.border_horizontal - text_width(&label, Font::Regular, FOOTER_SIZE);
        show_text(ops, Font::Regular, FOOTER_SIZE, x, y, &label);
    }

    fn assemble(&self, pages: Vec<Vec<Operation>>, images: Vec<Stream>) -> ExportResult<Vec<u8>> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();

        let regular_id = doc.add_object(font_dictionary(Font::Regular));
        let bold_id = doc.add_object(font_dictionary(Font::Bold));
        let mut xobjects = lopdf::Dictionary::new();
        for (index, image) in images.into_iter().enumerate() {
            let image_id = doc.add_object(image);
            xobjects.set(image_name(index), image_id);
        }
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! {
                Font::Regular.resource_name() => regular_id,
                Font::Bold.resource_name() => bold_id,
            },
            "XObject" => xobjects,
        });

        let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
        for operations in pages {
            let content = Content { operations };
            let encoded = content.encode().map_err(|e| ExportError::Render(e.to_string()))?;
            let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "Contents" => content_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
                "Resources" => resources_id,
                "MediaBox" => vec![Object::Integer(0), Object::Integer(0), real(PAGE_WIDTH), real(PAGE_HEIGHT)],
            }),
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        let created = chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string();
        let info_id = doc.add_object(dictionary! {
            "Title" => text_string(&self.settings.title),
            "Author" => text_string(&self.settings.author),
            "Creator" => text_string(crate::APP_NAME),
            "CreationDate" => Object::string_literal(created),
        });
        doc.trailer.set("Root", catalog_id);
        doc.trailer.set("Info", info_id);

        if self.settings.compress {
            doc.compress();
        }

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).map_err(|e| ExportError::Render(e.to_string()))?;
        Ok(bytes)
    }
}

/// Cursor state while stacking blocks onto pages.
struct Layout<'a> {
    settings: &'a PdfSettings,
    pages: Vec<Vec<Operation>>,
    ops: Vec<Operation>,
    /// Image XObjects in drawing order, named `Im1`, `Im2`, ...
    images: Vec<Stream>,
    y: f32,
    /// Nothing has been drawn on the current page yet
    fresh: bool,
}

impl<'a> Layout<'a> {
    fn new(settings: &'a PdfSettings) -> Self {
        Self {
            settings,
            pages: Vec::new(),
            ops: Vec::new(),
            images: Vec::new(),
            y: PAGE_HEIGHT - settings.border_vertical,
            fresh: true,
        }
    }

    fn left(&self) -> f32 {
        self.settings.border_horizontal
    }

    fn width(&self) -> f32 {
        PAGE_WIDTH - 2.0 * self.settings.border_horizontal
    }

    fn bottom(&self) -> f32 {
        self.settings.border_vertical + FOOTER_SPACE
    }

    /// Height of the text area of an empty page.
    fn height(&self) -> f32 {
        PAGE_HEIGHT - self.settings.border_vertical - self.bottom()
    }

    fn new_page(&mut self) {
        self.pages.push(std::mem::take(&mut self.ops));
        self.y = PAGE_HEIGHT - self.settings.border_vertical;
        self.fresh = true;
    }

    /// Start a new page unless `height` still fits above the footer.
    fn ensure(&mut self, height: f32) {
        if !self.fresh && self.y - height < self.bottom() {
            self.new_page();
        }
    }

    fn block(&mut self, block: &Block) {
        match block {
            Block::Heading1(text) => self.text(text, HEADING1, 0.0, None),
            Block::Heading2(text) => self.text(text, HEADING2, 0.0, None),
            Block::Heading3(text) => self.text(text, HEADING3, 0.0, None),
            Block::Paragraph(text) => self.text(text, BODY, 0.0, None),
            Block::Bullet(text) => self.text(text, BULLET, BULLET_INDENT, Some("•")),
            Block::Divider => self.divider(),
            Block::PageBreak => {
                if !self.fresh {
                    self.new_page();
                }
            }
            Block::Image(image) => self.image(image),
        }
    }

    fn image(&mut self, image: &ImageBlock) {
        let Some((stream, pixels)) = image.data.as_deref().and_then(image_xobject) else {
            tracing::debug!(src = %image.src, "Image not embedded, using placeholder");
            self.text(&image.placeholder(), BODY, 0.0, None);
            return;
        };

        let (width, height) = image.display_size(pixels);
        let fit = (self.width() / width).min(self.height() / height).min(1.0);
        let (width, height) = (width * fit, height * fit);

        if !self.fresh {
            self.y -= IMAGE_GAP;
        }
        self.ensure(height);

        let name = image_name(self.images.len());
        self.images.push(stream);
        let bottom = self.y - height;
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![real(width), real(0.0), real(0.0), real(height), real(self.left()), real(bottom)],
            ),
            Operation::new("Do", vec![Object::Name(name.into_bytes())]),
            Operation::new("Q", vec![]),
        ]);
        self.y = bottom - IMAGE_GAP;
        self.fresh = false;
    }

    fn text(&mut self, text: &str, style: Style, indent: f32, marker: Option<&str>) {
        let lines = wrap(text, style.font, style.size, self.width() - indent);
        if lines.is_empty() {
            return;
        }

        if !self.fresh {
            self.y -= style.space_before;
        }
        for (index, line) in lines.iter().enumerate() {
            self.ensure(style.leading);
            let baseline = self.y - style.size;
            let left = self.left();
            if index == 0 {
                if let Some(marker) = marker {
                    show_text(&mut self.ops, style.font, style.size, left + 4.0, baseline, marker);
                }
            }
            let x = left + indent;
            show_text(&mut self.ops, style.font, style.size, x, baseline, line);
            self.y -= style.leading;
            self.fresh = false;
        }
        self.y -= style.space_after;
    }

    fn divider(&mut self) {
        self.ensure(2.0 * DIVIDER_GAP);
        self.y -= DIVIDER_GAP;
        let start = self.left() + self.width() * 0.3;
        let end = self.left() + self.width() * 0.7;
        self.ops.extend([
            Operation::new("q", vec![]),
            Operation::new("RG", vec![real(0.66), real(0.66), real(0.66)]),
            Operation::new("w", vec![real(2.0)]),
            Operation::new("m", vec![real(start), real(self.y)]),
            Operation::new("l", vec![real(end), real(self.y)]),
            Operation::new("S", vec![]),
            Operation::new("Q", vec![]),
        ]);
        self.y -= DIVIDER_GAP;
        self.fresh = false;
    }

    /// Finished pages. A trailing empty page is dropped, but a document
    /// always has at least one page.
    fn finish(mut self) -> (Vec<Vec<Operation>>, Vec<Stream>) {
        if !self.fresh || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.ops));
        }
        (self.pages, self.images)
    }
}

/// Greedy word wrap. Words wider than a line are split by character.
fn wrap(text: &str, font: Font, size: f32, max_width: f32) -> Vec<String> {
    let space = text_width(" ", font, size);
    let mut lines = Vec::new();
    let mut line = String::new();
    let mut line_width = 0.0;

    for word in text.split_whitespace() {
        let word_width = text_width(word, font, size);

        if word_width > max_width {
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_width = 0.0;
            }
            for c in word.chars() {
                let w = text_width(c.encode_utf8(&mut [0; 4]), font, size);
                if line_width + w > max_width && !line.is_empty() {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0.0;
                }
                line.push(c);
                line_width += w;
            }
            continue;
        }

        if line.is_empty() {
            line.push_str(word);
            line_width = word_width;
        } else if line_width + space + word_width <= max_width {
            line.push(' ');
            line.push_str(word);
            line_width += space + word_width;
        } else {
            lines.push(std::mem::replace(&mut line, word.to_string()));
            line_width = word_width;
        }
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn show_text(ops: &mut Vec<Operation>, font: Font, size: f32, x: f32, y: f32, text: &str) {
    ops.extend([
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec![font.resource_name().into(), real(size)]),
        Operation::new("Td", vec![real(x), real(y)]),
        Operation::new("Tj", vec![Object::String(encode_win_ansi(text), StringFormat::Literal)]),
        Operation::new("ET", vec![]),
    ]);
}

/// Decode image bytes into an RGB image XObject. Transparent pixels are
/// blended onto white.
fn image_xobject(data: &[u8]) -> Option<(Stream, (u32, u32))> {
    let decoded = match image::load_from_memory(data) {
        Ok(decoded) => decoded.to_rgba8(),
        Err(e) => {
            tracing::warn!(error = %e, "Could not decode image");
            return None;
        }
    };

    let (width, height) = decoded.dimensions();
    let mut pixels = Vec::with_capacity(width as usize * height as usize * 3);
    for pixel in decoded.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            pixels.push(((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8);
        }
    }

    let mut stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => Object::Integer(8),
        },
        pixels,
    );
    let _ = stream.compress();
    Some((stream, (width, height)))
}

fn image_name(index: usize) -> String {
    format!("Im{}", index + 1)
}

fn font_dictionary(font: Font) -> lopdf::Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => font.base_font(),
        "Encoding" => "WinAnsiEncoding",
    }
}

fn real(value: f32) -> Object {
    Object::Real(value.into())
}

/// UTF-16BE text string with byte order mark, for the info dictionary.
fn text_string(text: &str) -> Object {
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    fn uncompressed() -> PdfWriter {
        PdfWriter::new(PdfSettings { compress: false, ..PdfSettings::default() })
    }

    #[test]
    fn test_borders_in_points() {
        let settings = PdfSettings::default();
        assert!((settings.border_horizontal - 56.693).abs() < 0.01);
        assert!((settings.border_vertical - 42.52).abs() < 0.01);
    }

    #[test]
    fn test_empty_document_has_one_page() {
        let bytes = PdfWriter::default().render(&[]).unwrap();
        assert!(bytes.starts_with(b"%PDF"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn test_page_breaks() {
        let blocks = vec![
            Block::Heading1("Eins".into()),
            Block::Paragraph("Text".into()),
            Block::PageBreak,
            Block::Heading1("Zwei".into()),
            Block::PageBreak,
        ];
        let bytes = PdfWriter::default().render(&blocks).unwrap();
        assert_eq!(page_count(&bytes), 2);
    }

    #[test]
    fn test_consecutive_breaks_do_not_add_blank_pages() {
        let blocks = vec![
            Block::Paragraph("Text".into()),
            Block::PageBreak,
            Block::PageBreak,
            Block::Paragraph("Mehr".into()),
        ];
        let bytes = PdfWriter::default().render(&blocks).unwrap();
        assert_eq!(page_count(&bytes), 2);
    }

    #[test]
    fn test_long_text_flows_onto_next_page() {
        let paragraph = "Lorem ipsum dolor sit amet ".repeat(40);
        let blocks: Vec<_> = (0..20).map(|_| Block::Paragraph(paragraph.clone())).collect();
        let bytes = PdfWriter::default().render(&blocks).unwrap();
        assert!(page_count(&bytes) > 1);
    }

    #[test]
    fn test_footer_on_every_page() {
        let blocks = vec![
            Block::Paragraph("A".into()),
            Block::PageBreak,
            Block::Paragraph("B".into()),
        ];
        let bytes = uncompressed().render(&blocks).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("(Seite 1)"));
        assert!(text.contains("(Seite 2)"));
    }

    #[test]
    fn test_info_dictionary() {
        let writer = PdfWriter::new(PdfSettings {
            title: "Glossar".into(),
            author: "Moodle2PDF".into(),
            ..PdfSettings::default()
        });
        let bytes = writer.render(&[Block::Paragraph("x".into())]).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        let info_ref = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_ref).unwrap();
        let title = info.get(b"Title").unwrap().as_str().unwrap();
        assert_eq!(title, &[0xFE, 0xFF, 0, b'G', 0, b'l', 0, b'o', 0, b's', 0, b's', 0, b'a', 0, b'r']);
    }

    fn png(width: u32, height: u32) -> Vec<u8> {
        let image = image::RgbaImage::from_pixel(width, height, image::Rgba([200, 40, 40, 255]));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn image_block(data: Option<Vec<u8>>) -> ImageBlock {
        ImageBlock { data, ..ImageBlock::new("https://moodle.example.org/pluginfile.php/1/bild.png?x=1") }
    }

    #[test]
    fn test_image_name_from_src() {
        let image = image_block(None);
        assert_eq!(image.name, "bild.png");
        assert_eq!(image.placeholder(), "[Bild: bild.png]");
    }

    #[test]
    fn test_image_display_size_is_halved() {
        let mut image = image_block(None);
        assert_eq!(image.display_size((400, 200)), (200.0, 100.0));

        image.width = Some(300.0);
        assert_eq!(image.display_size((400, 200)), (150.0, 75.0));

        image.height = Some(100.0);
        assert_eq!(image.display_size((400, 200)), (150.0, 50.0));
    }

    #[test]
    fn test_image_is_embedded_as_xobject() {
        let blocks = vec![Block::Paragraph("Vorher".into()), Block::Image(image_block(Some(png(8, 4))))];
        let bytes = uncompressed().render(&blocks).unwrap();

        let doc = Document::load_mem(&bytes).unwrap();
        let images: Vec<_> = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .filter(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()))
            .collect();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].dict.get(b"Width").unwrap().as_i64().unwrap(), 8);
        assert_eq!(images[0].dict.get(b"Height").unwrap().as_i64().unwrap(), 4);

        let text = String::from_utf8_lossy(&bytes);
        assert!(text.contains("/Im1 Do"));
        assert!(!text.contains("[Bild:"));
    }

    #[test]
    fn test_broken_image_falls_back_to_placeholder() {
        let blocks = vec![
            Block::Image(image_block(None)),
            Block::Image(image_block(Some(b"not an image".to_vec()))),
        ];
        let bytes = uncompressed().render(&blocks).unwrap();
        let text = String::from_utf8_lossy(&bytes);
        assert_eq!(text.matches("[Bild: bild.png]").count(), 2);
        assert!(!text.contains(" Do"));
    }

    #[test]
    fn test_large_image_is_fitted_to_page() {
        let blocks: Vec<_> = (0..3).map(|_| Block::Image(image_block(Some(png(1000, 1500))))).collect();
        let bytes = PdfWriter::default().render(&blocks).unwrap();
        assert_eq!(page_count(&bytes), 3);
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("eins zwei drei vier fünf sechs", Font::Regular, 11.0, 60.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, 11.0) <= 60.0);
        }
        assert_eq!(lines.join(" "), "eins zwei drei vier fünf sechs");
    }

    #[test]
    fn test_wrap_splits_overlong_words() {
        let word = "x".repeat(200);
        let lines = wrap(&word, Font::Regular, 11.0, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), word);
    }
}
