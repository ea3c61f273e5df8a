//! OOXML presentation reader.
//!
//! Opens the `.pptx` zip container, resolves the slide parts in
//! presentation order via the relationship table, and lowers each slide's
//! shape tree into the closed [`Shape`] union the renderer consumes.
//! Anything the renderer has no drawing rule for (pictures, tables,
//! connectors, shapes without resolvable geometry) is lowered to
//! [`Shape::Other`] and ignored downstream.

use crate::error::DeckPressError;
use crate::types::Emu;
use std::collections::HashMap;
use std::io::{Cursor, Read};

/// A parsed presentation. Immutable once loaded; dropped after
/// rasterization completes.
#[derive(Debug, Clone)]
pub struct Presentation {
    pub slide_width: Emu,
    pub slide_height: Emu,
    pub slides: Vec<Slide>,
}

impl Presentation {
    /// A slide's canvas dimensions: its own size when it carries one,
    /// otherwise the presentation-wide slide size.
    pub fn slide_size(&self, slide: &Slide) -> (Emu, Emu) {
        slide.size.unwrap_or((self.slide_width, self.slide_height))
    }
}

/// An ordered shape list. OOXML slides inherit their size from the
/// presentation, so `size` stays `None` for parsed input; it exists for
/// sources that size slides individually.
#[derive(Debug, Clone, Default)]
pub struct Slide {
    pub size: Option<(Emu, Emu)>,
    pub shapes: Vec<Shape>,
}

/// Position and extent in native units, taken verbatim from `a:xfrm`.
/// Values are not validated here; the renderer rejects what it cannot draw.
#[derive(Debug, Clone, Copy)]
pub struct Frame {
    pub left: Emu,
    pub top: Emu,
    pub width: Emu,
    pub height: Emu,
}

#[derive(Debug, Clone)]
pub enum Shape {
    /// Outline-only rectangle (`a:prstGeom prst="rect"`).
    Rect(Frame),
    /// Text block; the payload may be empty, which renders nothing.
    Text(Frame, String),
    /// Everything the renderer does not recognize, kept so shape counts
    /// and progress fractions reflect the document. The string is the
    /// element or shape name, for log messages only.
    Other(String),
}

type ZipBytes = zip::ZipArchive<Cursor<Vec<u8>>>;

/// Parse raw `.pptx` bytes into a [`Presentation`].
pub fn parse(bytes: &[u8]) -> Result<Presentation, DeckPressError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes.to_vec()))
        .map_err(|err| DeckPressError::Parse(format!("not an OOXML container: {err}")))?;

    let presentation_xml = read_part(&mut archive, "ppt/presentation.xml")?;
    let rels_xml = read_part(&mut archive, "ppt/_rels/presentation.xml.rels")?;

    let rels = parse_relationships(&rels_xml)?;
    let (slide_width, slide_height, slide_rel_ids) = parse_presentation(&presentation_xml)?;

    let mut slides = Vec::with_capacity(slide_rel_ids.len());
    for rel_id in &slide_rel_ids {
        let target = rels.get(rel_id).ok_or_else(|| {
            DeckPressError::Parse(format!("slide relationship {rel_id} has no target part"))
        })?;
        let xml = read_part(&mut archive, &resolve_part_name(target))?;
        slides.push(parse_slide(&xml)?);
    }

    Ok(Presentation {
        slide_width,
        slide_height,
        slides,
    })
}

fn read_part(archive: &mut ZipBytes, name: &str) -> Result<String, DeckPressError> {
    let mut file = archive
        .by_name(name)
        .map_err(|err| DeckPressError::Parse(format!("missing part {name}: {err}")))?;
    let mut xml = String::new();
    file.read_to_string(&mut xml)
        .map_err(|err| DeckPressError::Parse(format!("unreadable part {name}: {err}")))?;
    Ok(xml)
}

/// Relationship targets are relative to `ppt/`; a leading slash marks a
/// package-absolute target.
fn resolve_part_name(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("ppt/{target}"),
    }
}

fn parse_relationships(xml: &str) -> Result<HashMap<String, String>, DeckPressError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|err| DeckPressError::Parse(format!("malformed relationships part: {err}")))?;
    let mut rels = HashMap::new();
    // The rels part lives in a default namespace; match on local names.
    for node in doc
        .descendants()
        .filter(|n| n.tag_name().name() == "Relationship")
    {
        if let (Some(id), Some(target)) = (node.attribute("Id"), node.attribute("Target")) {
            rels.insert(id.to_string(), target.to_string());
        }
    }
    Ok(rels)
}

/// Returns the presentation-wide slide size and the slide relationship ids
/// in presentation order (`p:sldIdLst` is the ordering authority).
fn parse_presentation(xml: &str) -> Result<(Emu, Emu, Vec<String>), DeckPressError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|err| DeckPressError::Parse(format!("malformed presentation part: {err}")))?;

    let sld_sz = doc
        .descendants()
        .find(|n| n.tag_name().name() == "sldSz")
        .ok_or_else(|| DeckPressError::Parse("presentation has no p:sldSz element".into()))?;
    let width = emu_attribute(sld_sz, "cx")
        .ok_or_else(|| DeckPressError::Parse("p:sldSz has no usable cx".into()))?;
    let height = emu_attribute(sld_sz, "cy")
        .ok_or_else(|| DeckPressError::Parse("p:sldSz has no usable cy".into()))?;

    let mut rel_ids = Vec::new();
    if let Some(list) = doc.descendants().find(|n| n.tag_name().name() == "sldIdLst") {
        for sld_id in list.children().filter(|n| n.tag_name().name() == "sldId") {
            // The unqualified id attribute is the slide number; the
            // namespaced r:id points at the slide part.
            let rel = sld_id
                .attributes()
                .find(|a| a.name() == "id" && a.namespace().is_some())
                .map(|a| a.value().to_string());
            if let Some(rel) = rel {
                rel_ids.push(rel);
            }
        }
    }

    Ok((width, height, rel_ids))
}

fn parse_slide(xml: &str) -> Result<Slide, DeckPressError> {
    let doc = roxmltree::Document::parse(xml)
        .map_err(|err| DeckPressError::Parse(format!("malformed slide part: {err}")))?;

    let Some(sp_tree) = doc.descendants().find(|n| n.tag_name().name() == "spTree") else {
        return Ok(Slide::default());
    };

    let mut shapes = Vec::new();
    for node in sp_tree.children().filter(|n| n.is_element()) {
        match node.tag_name().name() {
            "sp" => shapes.push(classify_sp(node)),
            // Pictures, tables/charts, connectors, and groups have no
            // drawing rule; they still occupy a slot in the shape order.
            "pic" | "graphicFrame" | "cxnSp" | "grpSp" => {
                shapes.push(Shape::Other(shape_name(node)))
            }
            _ => {}
        }
    }
    Ok(Slide { size: None, shapes })
}

fn classify_sp(node: roxmltree::Node<'_, '_>) -> Shape {
    // Shapes without resolvable geometry (e.g. placeholders that inherit
    // their frame from the layout) cannot be positioned.
    let Some(frame) = parse_frame(node) else {
        return Shape::Other(shape_name(node));
    };

    // PowerPoint puts an (often empty) txBody inside every sp, rectangles
    // included, so the element's presence alone does not make a text
    // block; only actual run text does.
    let text = extract_text(node);
    if !text.trim().is_empty() {
        return Shape::Text(frame, text);
    }

    let has_rect_geom = node
        .descendants()
        .any(|n| n.tag_name().name() == "prstGeom" && n.attribute("prst") == Some("rect"));
    if has_rect_geom {
        Shape::Rect(frame)
    } else {
        Shape::Other(shape_name(node))
    }
}

fn parse_frame(node: roxmltree::Node<'_, '_>) -> Option<Frame> {
    let xfrm = node.descendants().find(|n| n.tag_name().name() == "xfrm")?;
    let off = xfrm.children().find(|n| n.tag_name().name() == "off")?;
    let ext = xfrm.children().find(|n| n.tag_name().name() == "ext")?;
    Some(Frame {
        left: emu_attribute(off, "x")?,
        top: emu_attribute(off, "y")?,
        width: emu_attribute(ext, "cx")?,
        height: emu_attribute(ext, "cy")?,
    })
}

/// Concatenates the run text of each `a:p` paragraph, paragraphs joined
/// with newlines.
fn extract_text(node: roxmltree::Node<'_, '_>) -> String {
    let Some(tx_body) = node.descendants().find(|n| n.tag_name().name() == "txBody") else {
        return String::new();
    };
    let mut paragraphs = Vec::new();
    for p in tx_body.children().filter(|n| n.tag_name().name() == "p") {
        let mut text = String::new();
        for t in p.descendants().filter(|n| n.tag_name().name() == "t") {
            if let Some(value) = t.text() {
                text.push_str(value);
            }
        }
        paragraphs.push(text);
    }
    paragraphs.join("\n")
}

fn emu_attribute(node: roxmltree::Node<'_, '_>, name: &str) -> Option<Emu> {
    node.attribute(name)?.parse::<i64>().ok().map(Emu::new)
}

fn shape_name(node: roxmltree::Node<'_, '_>) -> String {
    node.descendants()
        .find(|n| n.tag_name().name() == "cNvPr")
        .and_then(|n| n.attribute("name"))
        .map(str::to_string)
        .unwrap_or_else(|| node.tag_name().name().to_string())
}
