//! Quality-tiered recompression of an assembled document.
//!
//! Every page image XObject is decoded and re-encoded as JPEG at the
//! tier's fidelity; page count, order, size, and document metadata are
//! untouched. Smaller output is a heuristic expectation of the lossier
//! encode, not a guarantee.

use crate::error::DeckPressError;
use crate::progress::ProgressSink;
use image::codecs::jpeg::JpegEncoder;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId};
use std::fmt;
use std::str::FromStr;

/// Ordered fidelity knob for the output document. `None` skips
/// recompression entirely; the other tiers map onto increasing JPEG
/// quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    None,
    Low,
    Medium,
    High,
}

impl Quality {
    /// The token used in cache keys and at the caller boundary.
    pub fn token(self) -> &'static str {
        match self {
            Quality::None => "none",
            Quality::Low => "low",
            Quality::Medium => "medium",
            Quality::High => "high",
        }
    }

    /// JPEG quality for the tier; `None` means the compressor is
    /// bypassed and the assembled document ships as-is.
    pub fn jpeg_quality(self) -> Option<u8> {
        match self {
            Quality::None => None,
            Quality::Low => Some(30),
            Quality::Medium => Some(50),
            Quality::High => Some(70),
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Quality {
    type Err = DeckPressError;

    fn from_str(raw: &str) -> Result<Quality, DeckPressError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Quality::None),
            "low" => Ok(Quality::Low),
            "medium" => Ok(Quality::Medium),
            "high" => Ok(Quality::High),
            other => Err(DeckPressError::InvalidConfiguration(format!(
                "unknown quality tier {other:?}"
            ))),
        }
    }
}

/// Re-encodes every page image of `pdf` at `jpeg_quality`, returning a new
/// serialized document. Any decode or encode failure fails the whole
/// recompression; the caller decides whether to fall back.
pub(crate) fn recompress(
    pdf: &[u8],
    jpeg_quality: u8,
    progress: &dyn ProgressSink,
) -> Result<Vec<u8>, DeckPressError> {
    let mut doc = LoDocument::load_mem(pdf)
        .map_err(|err| DeckPressError::Compression(format!("cannot reload document: {err}")))?;

    let image_ids: Vec<ObjectId> = doc
        .objects
        .iter()
        .filter_map(|(id, object)| match object {
            LoObject::Stream(stream) if is_jpeg_image(&stream.dict) => Some(*id),
            _ => None,
        })
        .collect();

    let total = image_ids.len();
    for (index, id) in image_ids.into_iter().enumerate() {
        let Some(LoObject::Stream(stream)) = doc.objects.get_mut(&id) else {
            continue;
        };
        let decoded = image::load_from_memory(&stream.content)
            .map_err(|err| DeckPressError::Compression(format!("page image unreadable: {err}")))?
            .to_rgb8();
        let (width, height) = decoded.dimensions();
        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, jpeg_quality)
            .encode(
                decoded.as_raw(),
                width,
                height,
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|err| DeckPressError::Compression(format!("re-encode failed: {err}")))?;
        stream.set_content(jpeg);
        progress.progress(
            (index + 1) as f32 / total as f32,
            &format!("recompressing page {}/{}", index + 1, total),
        );
    }

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|err| DeckPressError::Compression(format!("cannot serialize document: {err}")))?;
    Ok(bytes)
}

fn is_jpeg_image(dict: &lopdf::Dictionary) -> bool {
    let is_image = matches!(
        dict.get(b"Subtype"),
        Ok(LoObject::Name(name)) if name.as_slice() == b"Image"
    );
    if !is_image {
        return false;
    }
    match dict.get(b"Filter") {
        Ok(LoObject::Name(name)) => name.as_slice() == b"DCTDecode",
        Ok(LoObject::Array(filters)) => filters
            .iter()
            .any(|f| matches!(f, LoObject::Name(name) if name.as_slice() == b"DCTDecode")),
        _ => false,
    }
}
