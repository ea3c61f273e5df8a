//! deckpress converts PowerPoint presentations into paged image-based
//! PDF documents.
//!
//! Each slide is rasterized onto a fixed-resolution white canvas (only
//! rectangle outlines and plain text blocks are drawn; everything else is
//! skipped), the canvases become uniformly sized PDF pages, and the result
//! is optionally recompressed at a coarse quality tier and cached by a
//! digest of the input bytes.
//!
//! ```no_run
//! use deckpress::{DeckPress, DirCache, Quality};
//!
//! let converter = DeckPress::builder()
//!     .quality(Quality::Medium)
//!     .cache(Box::new(DirCache::new("/var/cache/deckpress")?))
//!     .build()?;
//! let input = std::fs::read("talk.pptx")?;
//! let output = converter.convert(&input)?;
//! std::fs::write("talk.pdf", &output.bytes)?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod cache;
mod compress;
mod error;
mod pdf;
mod pptx;
mod progress;
mod raster;
mod types;

pub use cache::{CacheStore, DirCache, cache_key};
pub use compress::Quality;
pub use error::DeckPressError;
pub use pptx::{Frame, Presentation, Shape, Slide, parse as parse_presentation};
pub use progress::{NoopProgress, ProgressSink};
pub use types::{Emu, PageSizeMm};

use progress::ScaledProgress;
use std::sync::Arc;

/// File extension tokens accepted at the upload boundary. The converter
/// itself never sees a file name; callers gate on these.
pub const ACCEPTED_EXTENSIONS: [&str; 2] = ["ppt", "pptx"];

pub const DEFAULT_MAX_INPUT_SIZE: usize = 50 * 1024 * 1024;

/// Share of the overall progress interval spent on assembly when a
/// recompression stage follows it.
const ASSEMBLE_PROGRESS_SHARE: f32 = 0.85;

/// The conversion pipeline driver. Construct via [`DeckPress::builder`];
/// one instance handles any number of sequential conversions.
pub struct DeckPress {
    quality: Quality,
    max_input_size: usize,
    cache: Option<Box<dyn CacheStore>>,
    progress: Arc<dyn ProgressSink>,
}

#[derive(Default)]
pub struct DeckPressBuilder {
    quality: Quality,
    max_input_size: Option<usize>,
    cache: Option<Box<dyn CacheStore>>,
    progress: Option<Arc<dyn ProgressSink>>,
}

impl DeckPressBuilder {
    pub fn new() -> DeckPressBuilder {
        DeckPressBuilder::default()
    }

    pub fn quality(mut self, quality: Quality) -> DeckPressBuilder {
        self.quality = quality;
        self
    }

    pub fn max_input_size(mut self, bytes: usize) -> DeckPressBuilder {
        self.max_input_size = Some(bytes);
        self
    }

    pub fn cache(mut self, cache: Box<dyn CacheStore>) -> DeckPressBuilder {
        self.cache = Some(cache);
        self
    }

    pub fn progress(mut self, sink: Arc<dyn ProgressSink>) -> DeckPressBuilder {
        self.progress = Some(sink);
        self
    }

    pub fn build(self) -> Result<DeckPress, DeckPressError> {
        let max_input_size = self.max_input_size.unwrap_or(DEFAULT_MAX_INPUT_SIZE);
        if max_input_size == 0 {
            return Err(DeckPressError::InvalidConfiguration(
                "max input size must be non-zero".into(),
            ));
        }
        Ok(DeckPress {
            quality: self.quality,
            max_input_size,
            cache: self.cache,
            progress: self.progress.unwrap_or_else(|| Arc::new(NoopProgress)),
        })
    }
}

/// A finished conversion: the serialized document plus a best-effort
/// report of what it contains.
#[derive(Debug)]
pub struct ConversionOutput {
    pub bytes: Vec<u8>,
    pub page_count: usize,
    /// Uniform physical page size; `None` when the document came straight
    /// from the cache.
    pub page_size: Option<PageSizeMm>,
    pub from_cache: bool,
}

impl DeckPress {
    pub fn builder() -> DeckPressBuilder {
        DeckPressBuilder::new()
    }

    /// Runs the whole pipeline on raw presentation bytes:
    /// cache lookup, parse, per-slide rasterization, assembly,
    /// quality-tier recompression, cache store.
    ///
    /// Recompression failure is not fatal; the uncompressed document is
    /// returned instead. Cache failures are absorbed entirely.
    pub fn convert(&self, input: &[u8]) -> Result<ConversionOutput, DeckPressError> {
        if input.len() > self.max_input_size {
            return Err(DeckPressError::InputTooLarge {
                size: input.len(),
                limit: self.max_input_size,
            });
        }

        let key = cache_key(input, self.quality);
        if let Some(cache) = &self.cache {
            if let Some(bytes) = cache.lookup(&key) {
                // A corrupt entry falls through to a fresh conversion.
                match lopdf::Document::load_mem(&bytes) {
                    Ok(doc) => {
                        self.progress.progress(1.0, "served from cache");
                        return Ok(ConversionOutput {
                            page_count: doc.get_pages().len(),
                            bytes,
                            page_size: None,
                            from_cache: true,
                        });
                    }
                    Err(err) => {
                        log::warn!("cache entry {key} unreadable, reconverting: {err}");
                        // Evict it so the reconverted document can be stored.
                        cache.invalidate(&key);
                    }
                }
            }
        }

        let presentation = pptx::parse(input)?;
        log::debug!(
            "parsed presentation: {} slides, {}x{} EMU",
            presentation.slides.len(),
            presentation.slide_width.raw(),
            presentation.slide_height.raw(),
        );

        let assemble_share = match self.quality.jpeg_quality() {
            Some(_) => ASSEMBLE_PROGRESS_SHARE,
            None => 1.0,
        };
        let assembled = pdf::assemble(
            &presentation,
            &ScaledProgress::new(self.progress.as_ref(), 0.0, assemble_share),
        )?;

        let mut bytes = assembled.bytes;
        if let Some(jpeg_quality) = self.quality.jpeg_quality() {
            let sink = ScaledProgress::new(self.progress.as_ref(), ASSEMBLE_PROGRESS_SHARE, 1.0);
            match compress::recompress(&bytes, jpeg_quality, &sink) {
                Ok(recompressed) => {
                    log::debug!(
                        "recompressed at tier {}: {} -> {} bytes",
                        self.quality,
                        bytes.len(),
                        recompressed.len(),
                    );
                    bytes = recompressed;
                }
                Err(err) => {
                    log::warn!("keeping uncompressed document: {err}");
                }
            }
        }

        if let Some(cache) = &self.cache {
            cache.store(&key, &bytes);
        }
        self.progress.progress(1.0, "done");

        Ok(ConversionOutput {
            bytes,
            page_count: assembled.page_count,
            page_size: Some(assembled.page_size),
            from_cache: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pptx::fixtures;
    use crate::progress::RecordingSink;

    fn three_slide_deck() -> Vec<u8> {
        fixtures::pptx(&[
            vec![
                fixtures::rect_sp(914_400, 914_400, 1_828_800, 914_400),
                fixtures::text_sp(914_400, 2_743_200, 3_657_600, 914_400, "Title"),
            ],
            vec![fixtures::rect_sp(457_200, 457_200, 2_743_200, 1_828_800)],
            vec![],
        ])
    }

    #[test]
    fn full_pipeline_produces_a_paged_document() {
        let converter = DeckPress::builder().build().unwrap();
        let output = converter.convert(&three_slide_deck()).unwrap();
        assert!(!output.from_cache);
        assert_eq!(output.page_count, 3);
        assert!(output.bytes.starts_with(b"%PDF"));
        let size = output.page_size.unwrap();
        assert!((size.width - 254.0).abs() < 1e-6);
        assert!((size.height - 190.5).abs() < 1e-6);
    }

    #[test]
    fn second_identical_conversion_is_a_byte_identical_cache_hit() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = three_slide_deck();

        let convert = || {
            DeckPress::builder()
                .quality(Quality::Medium)
                .cache(Box::new(DirCache::new(dir.path()).unwrap()))
                .build()
                .unwrap()
                .convert(&input)
                .unwrap()
        };
        let first = convert();
        let second = convert();
        assert!(!first.from_cache);
        assert!(second.from_cache);
        assert_eq!(first.bytes, second.bytes);
        assert_eq!(first.page_count, second.page_count);
    }

    #[test]
    fn corrupt_cache_entry_falls_back_to_a_fresh_conversion() {
        let dir = tempfile::TempDir::new().unwrap();
        let input = three_slide_deck();
        let cache = DirCache::new(dir.path()).unwrap();
        cache.store(&cache_key(&input, Quality::None), b"not a document");

        let converter = DeckPress::builder()
            .cache(Box::new(DirCache::new(dir.path()).unwrap()))
            .build()
            .unwrap();
        let output = converter.convert(&input).unwrap();
        assert!(!output.from_cache);
        assert_eq!(output.page_count, 3);

        // The unreadable entry was evicted and replaced, so the next call
        // is served the fresh document from the cache.
        let again = converter.convert(&input).unwrap();
        assert!(again.from_cache);
        assert_eq!(again.bytes, output.bytes);
    }

    #[test]
    fn quality_tiers_order_output_size() {
        let input = three_slide_deck();
        let convert_at = |quality| {
            DeckPress::builder()
                .quality(quality)
                .build()
                .unwrap()
                .convert(&input)
                .unwrap()
                .bytes
        };
        let low = convert_at(Quality::Low);
        let high = convert_at(Quality::High);
        assert!(
            low.len() <= high.len(),
            "low tier {} bytes, high tier {}",
            low.len(),
            high.len()
        );
    }

    #[test]
    fn oversized_input_is_rejected_before_parsing() {
        let converter = DeckPress::builder().max_input_size(16).build().unwrap();
        let err = converter.convert(&[0u8; 17]).unwrap_err();
        assert!(
            matches!(err, DeckPressError::InputTooLarge { size: 17, limit: 16 }),
            "got {err:?}"
        );
    }

    #[test]
    fn zero_size_limit_is_a_configuration_error() {
        // `DeckPress` holds trait objects and has no Debug impl, so take
        // the error out of the Result by hand.
        let err = DeckPress::builder().max_input_size(0).build().err().unwrap();
        assert!(
            matches!(err, DeckPressError::InvalidConfiguration(_)),
            "got {err:?}"
        );
    }

    #[test]
    fn progress_spans_the_whole_pipeline_and_ends_at_one() {
        let sink = std::sync::Arc::new(RecordingSink::new());
        let converter = DeckPress::builder()
            .quality(Quality::Low)
            .progress(sink.clone())
            .build()
            .unwrap();
        converter.convert(&three_slide_deck()).unwrap();

        let events = sink.events.lock().unwrap();
        assert!(!events.is_empty());
        let mut last = 0.0f32;
        for (fraction, _) in events.iter() {
            assert!(*fraction >= last, "progress went backwards");
            last = *fraction;
        }
        assert_eq!(last, 1.0);
        assert!(events.iter().any(|(_, s)| s.starts_with("rendering slide")));
        assert!(events.iter().any(|(_, s)| s.starts_with("recompressing page")));
    }

    #[test]
    fn parse_failure_surfaces_and_writes_no_cache_entry() {
        let dir = tempfile::TempDir::new().unwrap();
        let converter = DeckPress::builder()
            .cache(Box::new(DirCache::new(dir.path()).unwrap()))
            .build()
            .unwrap();
        let err = converter.convert(b"corrupt container").unwrap_err();
        assert!(matches!(err, DeckPressError::Parse(_)), "got {err:?}");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }
}
