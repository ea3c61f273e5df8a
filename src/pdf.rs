//! Document assembly.
//!
//! Turns a parsed presentation into one serialized PDF: page physical size
//! comes from the first slide only and is applied uniformly, each slide's
//! raster is persisted as a PNG artifact in a scoped temp workspace and
//! then embedded as a JPEG image XObject stretched to fill its page. The
//! workspace is released when this function returns, on success or error.

use crate::error::DeckPressError;
use crate::pptx::Presentation;
use crate::progress::ProgressSink;
use crate::raster::rasterize_slide;
use crate::types::PageSizeMm;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Document as LoDocument, Object as LoObject, Stream as LoStream, dictionary};
use std::path::Path;

/// Fidelity of the page images in the assembled document before any
/// quality-tier recompression.
pub(crate) const BASE_JPEG_QUALITY: u8 = 85;

#[derive(Debug)]
pub(crate) struct AssembledDocument {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    pub page_size: PageSizeMm,
}

pub(crate) fn assemble(
    presentation: &Presentation,
    progress: &dyn ProgressSink,
) -> Result<AssembledDocument, DeckPressError> {
    let Some(first_slide) = presentation.slides.first() else {
        return Err(DeckPressError::EmptyPresentation);
    };
    let (first_width, first_height) = presentation.slide_size(first_slide);
    let page_size = PageSizeMm::from_emu(first_width, first_height);
    let page_width_pt = first_width.to_pt() as f32;
    let page_height_pt = first_height.to_pt() as f32;

    let workspace = tempfile::TempDir::new()
        .map_err(|err| DeckPressError::Assembly(format!("cannot create workspace: {err}")))?;

    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<LoObject> = Vec::new();

    let total = presentation.slides.len();
    for (index, slide) in presentation.slides.iter().enumerate() {
        let status = format!("rendering slide {}/{}", index + 1, total);
        let (width, height) = presentation.slide_size(slide);
        let canvas = rasterize_slide(slide, width, height, |done, shape_total| {
            let local = done as f32 / shape_total.max(1) as f32;
            progress.progress((index as f32 + local) / total as f32, &status);
        })?;

        let artifact = workspace.path().join(format!("slide_{index}.png"));
        let png = canvas
            .encode_png()
            .map_err(|err| DeckPressError::Assembly(format!("png encode failed: {err}")))?;
        std::fs::write(&artifact, &png).map_err(|err| {
            DeckPressError::Assembly(format!("cannot persist {}: {err}", artifact.display()))
        })?;

        let (jpeg, px_width, px_height) = artifact_to_jpeg(&artifact)?;
        append_page(
            &mut doc,
            pages_id,
            &mut kids,
            index,
            jpeg,
            px_width,
            px_height,
            page_width_pt,
            page_height_pt,
        );
        progress.progress((index + 1) as f32 / total as f32, &status);
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Kids" => kids,
        "Count" => total as i64,
    };
    doc.objects.insert(pages_id, LoObject::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let info_id = doc.add_object(dictionary! {
        "Producer" => LoObject::string_literal("deckpress"),
    });
    doc.trailer.set("Info", info_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| DeckPressError::Assembly(format!("cannot serialize document: {err}")))?;

    Ok(AssembledDocument {
        bytes,
        page_count: total,
        page_size,
    })
}

/// Reloads the slide's PNG artifact and re-encodes it as baseline JPEG for
/// the page's image XObject.
fn artifact_to_jpeg(path: &Path) -> Result<(Vec<u8>, u32, u32), DeckPressError> {
    let img = image::open(path)
        .map_err(|err| DeckPressError::Assembly(format!("cannot reload artifact: {err}")))?
        .to_rgb8();
    let (width, height) = img.dimensions();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, BASE_JPEG_QUALITY)
        .encode(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .map_err(|err| DeckPressError::Assembly(format!("jpeg encode failed: {err}")))?;
    Ok((jpeg, width, height))
}

/// Appends one page whose content stream stretches the slide raster to
/// fill the uniform page box, whatever the raster's own aspect ratio.
#[allow(clippy::too_many_arguments)]
fn append_page(
    doc: &mut LoDocument,
    pages_id: lopdf::ObjectId,
    kids: &mut Vec<LoObject>,
    index: usize,
    jpeg: Vec<u8>,
    px_width: u32,
    px_height: u32,
    page_width_pt: f32,
    page_height_pt: f32,
) {
    let image_id = doc.add_object(LoStream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => px_width as i64,
            "Height" => px_height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "Filter" => "DCTDecode",
        },
        jpeg,
    ));
    let image_name = format!("Im{index}");
    let content = format!("q\n{page_width_pt} 0 0 {page_height_pt} 0 0 cm\n/{image_name} Do\nQ")
        .into_bytes();
    let content_id = doc.add_object(LoStream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![
            0.into(),
            0.into(),
            page_width_pt.into(),
            page_height_pt.into(),
        ],
        "Resources" => dictionary! {
            "XObject" => dictionary! { image_name => image_id },
        },
        "Contents" => content_id,
    });
    kids.push(page_id.into());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::{Frame, Shape, Slide};
    use crate::progress::{NoopProgress, RecordingSink};
    use crate::types::Emu;

    fn inch(value: f64) -> Emu {
        Emu::from_inches(value)
    }

    fn rect_slide() -> Slide {
        Slide {
            size: None,
            shapes: vec![Shape::Rect(Frame {
                left: inch(1.0),
                top: inch(1.0),
                width: inch(2.0),
                height: inch(1.0),
            })],
        }
    }

    fn presentation(slides: Vec<Slide>) -> Presentation {
        Presentation {
            slide_width: inch(10.0),
            slide_height: inch(7.5),
            slides,
        }
    }

    fn media_box(doc: &LoDocument, page_id: lopdf::ObjectId) -> Vec<f32> {
        doc.get_dictionary(page_id)
            .unwrap()
            .get(b"MediaBox")
            .and_then(LoObject::as_array)
            .unwrap()
            .iter()
            .map(|o| o.as_float().unwrap())
            .collect()
    }

    #[test]
    fn three_slides_produce_three_pages_in_order() {
        let prs = presentation(vec![rect_slide(), Slide::default(), rect_slide()]);
        let assembled = assemble(&prs, &NoopProgress).unwrap();
        assert_eq!(assembled.page_count, 3);

        let doc = LoDocument::load_mem(&assembled.bytes).unwrap();
        let pages: Vec<_> = doc.get_pages().into_iter().collect();
        assert_eq!(pages.len(), 3);
        for (i, (_, page_id)) in pages.iter().enumerate() {
            let content = doc.get_page_content(*page_id).unwrap();
            let content = String::from_utf8_lossy(&content);
            assert!(
                content.contains(&format!("/Im{i} Do")),
                "page {i} draws the wrong raster: {content}"
            );
        }
    }

    #[test]
    fn every_page_inherits_the_first_slides_physical_size() {
        let mut odd = rect_slide();
        odd.size = Some((inch(13.333), inch(7.5)));
        let prs = presentation(vec![rect_slide(), odd, Slide::default()]);
        let assembled = assemble(&prs, &NoopProgress).unwrap();
        assert!((assembled.page_size.width - 254.0).abs() < 1e-6);
        assert!((assembled.page_size.height - 190.5).abs() < 1e-6);

        let doc = LoDocument::load_mem(&assembled.bytes).unwrap();
        let boxes: Vec<_> = doc
            .get_pages()
            .into_values()
            .map(|id| media_box(&doc, id))
            .collect();
        assert_eq!(boxes.len(), 3);
        for b in &boxes {
            assert_eq!(b, &boxes[0]);
        }
        assert!((boxes[0][2] - 720.0).abs() < 0.01);
        assert!((boxes[0][3] - 540.0).abs() < 0.01);
    }

    #[test]
    fn empty_presentation_is_rejected() {
        let err = assemble(&presentation(Vec::new()), &NoopProgress).unwrap_err();
        assert!(matches!(err, DeckPressError::EmptyPresentation), "got {err:?}");
    }

    #[test]
    fn progress_fractions_never_decrease_and_reach_one() {
        let prs = presentation(vec![rect_slide(), rect_slide()]);
        let sink = RecordingSink::new();
        assemble(&prs, &sink).unwrap();
        let events = sink.events.lock().unwrap();
        assert!(!events.is_empty());
        let mut last = 0.0f32;
        for (fraction, _) in events.iter() {
            assert!(*fraction >= last, "progress went backwards: {events:?}");
            last = *fraction;
        }
        assert_eq!(last, 1.0);
    }

    #[test]
    fn document_carries_a_producer_entry() {
        let prs = presentation(vec![rect_slide()]);
        let assembled = assemble(&prs, &NoopProgress).unwrap();
        let doc = LoDocument::load_mem(&assembled.bytes).unwrap();
        let info_id = doc.trailer.get(b"Info").and_then(LoObject::as_reference).unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        assert!(info.get(b"Producer").is_ok());
    }
}
