//! Pure page layout: records in, positioned blocks out.

use super::font_metrics::{text_width, to_latin1_text, FontStyle};
use super::images::{ImageSet, ImageSlot};
use crate::{NormalizedRecord, RecordKind};

/// US Letter in points with one-inch margins.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    pub width: f32,
    pub height: f32,
    pub margin: f32,
    pub font_size: f32,
    pub line_height: f32,
}

impl Default for PageGeometry {
    fn default() -> Self {
        Self {
            width: 612.0,
            height: 792.0,
            margin: 72.0,
            font_size: 12.0,
            line_height: 14.0,
        }
    }
}

impl PageGeometry {
    pub fn column_width(&self) -> f32 {
        self.width - 2.0 * self.margin
    }

    pub fn column_height(&self) -> f32 {
        self.height - 2.0 * self.margin
    }

    /// Embedded images are drawn at 40% of the column width.
    pub fn image_width(&self) -> f32 {
        self.column_width() / 2.5
    }

    fn top(&self) -> f32 {
        self.height - self.margin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextColor {
    Black,
    LinkBlue,
    Gray,
}

impl TextColor {
    pub fn rgb(self) -> (f32, f32, f32) {
        match self {
            Self::Black => (0.0, 0.0, 0.0),
            Self::LinkBlue => (6.0 / 255.0, 69.0 / 255.0, 173.0 / 255.0),
            Self::Gray => (0.45, 0.45, 0.45),
        }
    }
}

/// One positioned drawing instruction. `y` is the text baseline or the image's bottom edge.
#[derive(Debug, Clone, PartialEq)]
pub enum LayoutBlock {
    Text {
        x: f32,
        y: f32,
        text: String,
        style: FontStyle,
        color: TextColor,
    },
    Link {
        x: f32,
        y: f32,
        text: String,
        url: String,
        width: f32,
    },
    Image {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        resource_name: String,
    },
    Rule {
        x1: f32,
        x2: f32,
        y: f32,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LayoutPage {
    pub blocks: Vec<LayoutBlock>,
}

/// Where each record landed; one entry per record, in record order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayoutEntry {
    pub sequence: usize,
    pub page_index: usize,
    pub header: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentLayout {
    pub geometry: PageGeometry,
    pub pages: Vec<LayoutPage>,
    pub entries: Vec<LayoutEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentHeader {
    pub channel_name: String,
    /// Display-formatted export time.
    pub exported_on: String,
    pub requested_by: Option<String>,
}

impl DocumentHeader {
    pub fn title(&self) -> String {
        format!("{} Channel Archive", self.channel_name)
    }

    pub fn export_line(&self) -> String {
        match self.requested_by.as_deref() {
            Some(requester) if !requester.trim().is_empty() => {
                format!("Exported on {} by {}", self.exported_on, requester.trim())
            }
            _ => format!("Exported on {}", self.exported_on),
        }
    }
}

struct LayoutCursor {
    geometry: PageGeometry,
    pages: Vec<LayoutPage>,
    y: f32,
}

impl LayoutCursor {
    fn new(geometry: PageGeometry) -> Self {
        Self {
            geometry,
            pages: vec![LayoutPage::default()],
            y: geometry.top(),
        }
    }

    fn page_index(&self) -> usize {
        self.pages.len() - 1
    }

    /// Starts a new page unless `height` more points fit above the bottom margin.
    fn reserve(&mut self, height: f32) {
        let on_fresh_page = self.y >= self.geometry.top();
        if !on_fresh_page && self.y - height < self.geometry.margin {
            self.pages.push(LayoutPage::default());
            self.y = self.geometry.top();
        }
    }

    fn push(&mut self, block: LayoutBlock) {
        if let Some(page) = self.pages.last_mut() {
            page.blocks.push(block);
        }
    }

    fn text_line(&mut self, text: String, style: FontStyle, color: TextColor) {
        let line_height = self.geometry.line_height;
        self.reserve(line_height);
        let baseline = self.y - self.geometry.font_size;
        self.push(LayoutBlock::Text {
            x: self.geometry.margin,
            y: baseline,
            text,
            style,
            color,
        });
        self.y -= line_height;
    }

    fn link_line(&mut self, text: String, url: String) {
        let line_height = self.geometry.line_height;
        self.reserve(line_height);
        let width = text_width(FontStyle::Regular, self.geometry.font_size, &text)
            .min(self.geometry.column_width());
        let baseline = self.y - self.geometry.font_size;
        self.push(LayoutBlock::Link {
            x: self.geometry.margin,
            y: baseline,
            text,
            url,
            width,
        });
        self.y -= line_height;
    }

    fn paragraph(&mut self, text: &str, style: FontStyle) {
        let lines = wrap_text(
            text,
            style,
            self.geometry.font_size,
            self.geometry.column_width(),
        );
        for line in lines {
            self.text_line(line, style, TextColor::Black);
        }
    }

    fn image(&mut self, resource_name: &str, width_px: u32, height_px: u32) {
        let (width, height) = fit_image(&self.geometry, width_px, height_px);
        self.reserve(height);
        self.y -= height;
        self.push(LayoutBlock::Image {
            x: self.geometry.margin,
            y: self.y,
            width,
            height,
            resource_name: resource_name.to_string(),
        });
        self.y -= self.geometry.line_height;
    }

    fn gap(&mut self, height: f32) {
        self.y -= height;
    }

    fn rule(&mut self) {
        let half_line = self.geometry.line_height / 2.0;
        self.reserve(half_line);
        self.y -= half_line;
        let inset = self.geometry.margin / 2.0;
        self.push(LayoutBlock::Rule {
            x1: inset,
            x2: self.geometry.width - inset,
            y: self.y,
        });
        self.y -= half_line;
    }
}

/// Image size in points: 40% of the column wide, shrunk to fit one page.
pub fn fit_image(geometry: &PageGeometry, width_px: u32, height_px: u32) -> (f32, f32) {
    let width = geometry.image_width();
    let aspect = height_px.max(1) as f32 / width_px.max(1) as f32;
    let height = width * aspect;
    let max_height = geometry.column_height();
    if height > max_height {
        (max_height / aspect, max_height)
    } else {
        (width, height)
    }
}

/// Greedy word wrap to `max_width` points; words longer than a line are split.
pub fn wrap_text(text: &str, style: FontStyle, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in to_latin1_text(text).split('\n') {
        let mut current = String::new();
        for word in paragraph.split(' ') {
            let candidate = if current.is_empty() {
                word.to_string()
            } else {
                format!("{current} {word}")
            };
            if text_width(style, size, &candidate) <= max_width {
                current = candidate;
                continue;
            }
            if !current.is_empty() {
                lines.push(std::mem::take(&mut current));
            }
            for ch in word.chars() {
                let mut extended = current.clone();
                extended.push(ch);
                if !current.is_empty() && text_width(style, size, &extended) > max_width {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = extended;
                }
            }
        }
        lines.push(current);
    }
    lines
}

fn record_header(record: &NormalizedRecord) -> String {
    match record.kind {
        RecordKind::ChannelJoin => record.display_timestamp.clone(),
        _ => format!("{} on {}", record.author, record.display_timestamp),
    }
}

/// Lays out the archive header followed by one entry per record.
pub fn layout_document(
    header: &DocumentHeader,
    records: &[NormalizedRecord],
    images: &ImageSet,
    geometry: PageGeometry,
) -> DocumentLayout {
    let mut cursor = LayoutCursor::new(geometry);
    let mut entries = Vec::with_capacity(records.len());

    cursor.paragraph(&header.title(), FontStyle::Bold);
    cursor.paragraph(&header.export_line(), FontStyle::Regular);
    cursor.gap(geometry.line_height);

    for record in records {
        let header_text = to_latin1_text(&record_header(record));
        cursor.reserve(geometry.line_height);
        entries.push(LayoutEntry {
            sequence: record.sequence,
            page_index: cursor.page_index(),
            header: header_text.clone(),
        });
        cursor.paragraph(&header_text, FontStyle::Regular);
        if !record.text.trim().is_empty() {
            cursor.paragraph(&record.text, FontStyle::Regular);
        }
        for attachment in &record.attachments {
            let link_text = to_latin1_text(&format!("File: {}", attachment.filename));
            match images.slot(record.sequence, &attachment.filename) {
                ImageSlot::Embedded(image) => {
                    cursor.image(&image.resource_name, image.width_px, image.height_px);
                }
                ImageSlot::Unavailable => {
                    cursor.text_line(
                        to_latin1_text(&format!("[Image unavailable: {}]", attachment.filename)),
                        FontStyle::Regular,
                        TextColor::Gray,
                    );
                    cursor.link_line(link_text, attachment.link_url.clone());
                }
                ImageSlot::NotEmbedded => {
                    cursor.link_line(link_text, attachment.link_url.clone());
                }
            }
        }
        cursor.rule();
    }

    DocumentLayout {
        geometry,
        pages: cursor.pages,
        entries,
    }
}
