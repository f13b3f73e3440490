use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::font_metrics::{win_ansi_bytes, FontStyle};
use super::images::ImageSet;
use super::layout::{DocumentLayout, LayoutBlock, TextColor};
use crate::ArchiveError;

const RULE_WIDTH: f32 = 0.72;

/// Encodes a finished layout as PDF bytes.
pub fn encode_pdf(layout: &DocumentLayout, images: &ImageSet) -> Result<Vec<u8>, ArchiveError> {
    let mut document = Document::with_version("1.5");
    let pages_id = document.new_object_id();

    let mut fonts = Dictionary::new();
    for style in [FontStyle::Regular, FontStyle::Bold] {
        let font_id = document.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => style.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(style.resource_name(), font_id);
    }
    let mut xobjects = Dictionary::new();
    for image in images.embedded() {
        let image_id = document.add_object(image.stream.clone());
        xobjects.set(image.resource_name.as_str(), image_id);
    }
    let resources_id = document.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let geometry = layout.geometry;
    let mut page_ids: Vec<Object> = Vec::with_capacity(layout.pages.len());
    for page in &layout.pages {
        let mut operations = Vec::new();
        let mut annotations: Vec<Object> = Vec::new();
        for block in &page.blocks {
            match block {
                LayoutBlock::Text {
                    x,
                    y,
                    text,
                    style,
                    color,
                } => push_text(&mut operations, *x, *y, text, *style, *color, geometry.font_size),
                LayoutBlock::Link {
                    x,
                    y,
                    text,
                    url,
                    width,
                } => {
                    push_text(
                        &mut operations,
                        *x,
                        *y,
                        text,
                        FontStyle::Regular,
                        TextColor::LinkBlue,
                        geometry.font_size,
                    );
                    let annotation_id = add_link_annotation(
                        &mut document,
                        [*x, *y - 2.0, *x + *width, *y + geometry.font_size],
                        url,
                    );
                    annotations.push(annotation_id.into());
                }
                LayoutBlock::Image {
                    x,
                    y,
                    width,
                    height,
                    resource_name,
                } => {
                    operations.push(Operation::new("q", vec![]));
                    operations.push(Operation::new(
                        "cm",
                        vec![
                            (*width).into(),
                            0.into(),
                            0.into(),
                            (*height).into(),
                            (*x).into(),
                            (*y).into(),
                        ],
                    ));
                    operations.push(Operation::new(
                        "Do",
                        vec![Object::Name(resource_name.as_bytes().to_vec())],
                    ));
                    operations.push(Operation::new("Q", vec![]));
                }
                LayoutBlock::Rule { x1, x2, y } => {
                    operations.push(Operation::new("RG", vec![0.into(), 0.into(), 0.into()]));
                    operations.push(Operation::new("w", vec![RULE_WIDTH.into()]));
                    operations.push(Operation::new("m", vec![(*x1).into(), (*y).into()]));
                    operations.push(Operation::new("l", vec![(*x2).into(), (*y).into()]));
                    operations.push(Operation::new("S", vec![]));
                }
            }
        }

        let content = Content { operations }.encode()?;
        let content_id = document.add_object(Stream::new(dictionary! {}, content));
        let mut page_dictionary = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !annotations.is_empty() {
            page_dictionary.set("Annots", annotations);
        }
        page_ids.push(document.add_object(page_dictionary).into());
    }

    let page_count = page_ids.len() as i64;
    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => page_ids,
        "Count" => page_count,
        "Resources" => resources_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            geometry.width.into(),
            geometry.height.into(),
        ],
    };
    document.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = document.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    document.trailer.set("Root", catalog_id);
    document.compress();

    let mut bytes = Vec::new();
    document
        .save_to(&mut bytes)
        .map_err(|error| ArchiveError::Document(error.to_string()))?;
    Ok(bytes)
}

fn push_text(
    operations: &mut Vec<Operation>,
    x: f32,
    y: f32,
    text: &str,
    style: FontStyle,
    color: TextColor,
    font_size: f32,
) {
    if text.is_empty() {
        return;
    }
    let (red, green, blue) = color.rgb();
    operations.push(Operation::new("BT", vec![]));
    operations.push(Operation::new(
        "Tf",
        vec![
            Object::Name(style.resource_name().as_bytes().to_vec()),
            font_size.into(),
        ],
    ));
    operations.push(Operation::new("rg", vec![red.into(), green.into(), blue.into()]));
    operations.push(Operation::new("Td", vec![x.into(), y.into()]));
    operations.push(Operation::new(
        "Tj",
        vec![Object::string_literal(win_ansi_bytes(text))],
    ));
    operations.push(Operation::new("ET", vec![]));
}

fn add_link_annotation(document: &mut Document, rect: [f32; 4], url: &str) -> ObjectId {
    document.add_object(dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => rect.iter().map(|value| Object::from(*value)).collect::<Vec<_>>(),
        "Border" => vec![0.into(), 0.into(), 0.into()],
        "A" => dictionary! {
            "S" => "URI",
            "URI" => Object::string_literal(url.as_bytes().to_vec()),
        },
    })
}
