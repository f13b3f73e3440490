//! Paginated PDF rendering of normalized records.
//!
//! Rendering happens in three steps: [`collect_images`] downloads and decodes
//! image attachments, [`layout_document`] positions every block on US Letter
//! pages, and [`encode_pdf`] turns the layout into bytes with `lopdf`.

mod font_metrics;
mod images;
mod layout;
mod pdf_writer;

use std::path::Path;

use courier_core::write_bytes_atomic;
use tracing::info;

pub use font_metrics::{text_width, to_latin1_text, FontStyle};
pub use images::{collect_images, message_directory, EmbeddedImage, ImageSet, ImageSlot, RenderWarning};
pub use layout::{
    fit_image, layout_document, wrap_text, DocumentHeader, DocumentLayout, LayoutBlock,
    LayoutEntry, LayoutPage, PageGeometry, TextColor,
};
pub use pdf_writer::encode_pdf;

use crate::{ArchiveError, NormalizedRecord};

/// Summary of a rendered document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedDocument {
    pub entries: Vec<LayoutEntry>,
    pub page_count: usize,
    pub bytes_written: u64,
}

/// Lays out and encodes `records`, then writes the PDF to `path` atomically.
pub fn write_document(
    path: &Path,
    header: &DocumentHeader,
    records: &[NormalizedRecord],
    images: &ImageSet,
) -> Result<RenderedDocument, ArchiveError> {
    let layout = layout_document(header, records, images, PageGeometry::default());
    let bytes = encode_pdf(&layout, images)?;
    write_bytes_atomic(path, &bytes).map_err(ArchiveError::Storage)?;
    info!(
        path = %path.display(),
        records = layout.entries.len(),
        pages = layout.pages.len(),
        bytes = bytes.len(),
        "wrote archive document"
    );
    Ok(RenderedDocument {
        page_count: layout.pages.len(),
        entries: layout.entries,
        bytes_written: bytes.len() as u64,
    })
}
