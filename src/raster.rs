//! Slide rasterization.
//!
//! One white RGB pixmap per slide, shapes drawn in document order so later
//! shapes overdraw earlier ones. A shape that cannot be drawn is reported
//! as a warning and skipped; nothing a single shape does can abort the
//! slide. Rectangles stroke an unfilled black outline; text blocks fill
//! black glyph outlines at a fixed default size with no wrapping.

use crate::error::DeckPressError;
use crate::pptx::{Frame, Shape, Slide};
use crate::types::Emu;
use std::fmt;
use std::sync::{Arc, OnceLock};
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};
use ttf_parser::{GlyphId, OutlineBuilder};

const STROKE_WIDTH_PX: f32 = 1.5;
const FONT_SIZE_PX: f32 = 14.0;
const LINE_HEIGHT_FACTOR: f32 = 1.2;

/// Non-fatal failure while drawing a single shape. The rasterizer logs
/// these and moves on to the next shape.
#[derive(Debug)]
pub(crate) enum RenderWarning {
    Geometry(String),
    Font(String),
}

impl fmt::Display for RenderWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderWarning::Geometry(message) => write!(f, "bad geometry: {}", message),
            RenderWarning::Font(message) => write!(f, "text not drawn: {}", message),
        }
    }
}

/// Rasterizes one slide onto a fresh white canvas. `on_shape` is invoked
/// after every shape with `(shapes_drawn, total_shapes)`; the caller turns
/// that into a progress fraction.
///
/// The only error path here is an unusable canvas size; per-shape failures
/// are absorbed into warnings.
pub(crate) fn rasterize_slide(
    slide: &Slide,
    width: Emu,
    height: Emu,
    mut on_shape: impl FnMut(usize, usize),
) -> Result<Pixmap, DeckPressError> {
    let width_px = width.to_px_floor();
    let height_px = height.to_px_floor();
    let canvas_size = u32::try_from(width_px)
        .ok()
        .zip(u32::try_from(height_px).ok());
    let mut canvas = canvas_size
        .and_then(|(w, h)| Pixmap::new(w, h))
        .ok_or_else(|| {
            DeckPressError::Assembly(format!("invalid canvas size {width_px}x{height_px}"))
        })?;
    canvas.fill(tiny_skia::Color::from_rgba8(255, 255, 255, 255));

    let total = slide.shapes.len();
    for (index, shape) in slide.shapes.iter().enumerate() {
        if let Err(warning) = render_shape(shape, &mut canvas, 0.0, 0.0) {
            log::warn!("shape {} of {} skipped: {}", index + 1, total, warning);
        }
        on_shape(index + 1, total);
    }
    Ok(canvas)
}

/// Draws one shape at `(offset_x + left, offset_y + top)`, mutating the
/// canvas in place.
pub(crate) fn render_shape(
    shape: &Shape,
    canvas: &mut Pixmap,
    offset_x: f32,
    offset_y: f32,
) -> Result<(), RenderWarning> {
    match shape {
        Shape::Rect(frame) => stroke_rect(canvas, frame, offset_x, offset_y),
        Shape::Text(frame, text) => draw_text(canvas, frame, text, offset_x, offset_y),
        Shape::Other(name) => {
            log::debug!("no drawing rule for shape {name:?}");
            Ok(())
        }
    }
}

fn black_paint() -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(0, 0, 0, 255);
    paint.anti_alias = true;
    paint
}

fn stroke_rect(
    canvas: &mut Pixmap,
    frame: &Frame,
    offset_x: f32,
    offset_y: f32,
) -> Result<(), RenderWarning> {
    let x = offset_x + frame.left.to_px();
    let y = offset_y + frame.top.to_px();
    let width = frame.width.to_px();
    let height = frame.height.to_px();
    let rect = Rect::from_xywh(x, y, width, height).ok_or_else(|| {
        RenderWarning::Geometry(format!("unstrokable rectangle {width}x{height} at ({x}, {y})"))
    })?;
    let path = PathBuilder::from_rect(rect);
    let stroke = Stroke {
        width: STROKE_WIDTH_PX,
        ..Stroke::default()
    };
    canvas.stroke_path(&path, &black_paint(), &stroke, Transform::identity(), None);
    Ok(())
}

fn draw_text(
    canvas: &mut Pixmap,
    frame: &Frame,
    text: &str,
    offset_x: f32,
    offset_y: f32,
) -> Result<(), RenderWarning> {
    if text.is_empty() {
        return Ok(());
    }
    let font_data = default_font_bytes()
        .ok_or_else(|| RenderWarning::Font("no usable default font on this system".into()))?;
    let face = ttf_parser::Face::parse(&font_data, 0)
        .map_err(|err| RenderWarning::Font(format!("default font unparsable: {err}")))?;

    let origin_x = offset_x + frame.left.to_px();
    let top = offset_y + frame.top.to_px();
    let paint = black_paint();
    // Top-left anchored: the first baseline sits one font size below the
    // frame top, later lines advance by a fixed leading. No wrapping.
    for (line_index, line) in text.lines().enumerate() {
        let baseline_y = top + FONT_SIZE_PX * (1.0 + LINE_HEIGHT_FACTOR * line_index as f32);
        for placement in layout_line(&face, line, origin_x, baseline_y) {
            let mut builder =
                GlyphPathBuilder::new(placement.origin_x, placement.origin_y, placement.scale);
            if face
                .outline_glyph(GlyphId(placement.glyph_id), &mut builder)
                .is_none()
            {
                continue;
            }
            let Some(path) = builder.finish() else {
                continue;
            };
            canvas.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);
        }
    }
    Ok(())
}

struct GlyphPlacement {
    glyph_id: u16,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

/// Unshaped horizontal layout: codepoint-to-glyph mapping with the face's
/// own advances, half an em for anything unmapped.
fn layout_line(
    face: &ttf_parser::Face<'_>,
    line: &str,
    origin_x: f32,
    baseline_y: f32,
) -> Vec<GlyphPlacement> {
    let units_per_em = face.units_per_em().max(1) as f32;
    let scale = FONT_SIZE_PX / units_per_em;

    let mut out = Vec::new();
    let mut pen_x = 0.0f32;
    for ch in line.chars() {
        let gid = face.glyph_index(ch).map(|id| id.0).unwrap_or(0);
        if gid == 0 {
            pen_x += FONT_SIZE_PX * 0.5;
            continue;
        }
        out.push(GlyphPlacement {
            glyph_id: gid,
            origin_x: origin_x + pen_x,
            origin_y: baseline_y,
            scale,
        });
        let advance_units = face.glyph_hor_advance(GlyphId(gid)).unwrap_or(0) as f32;
        let mut advance = (advance_units / units_per_em) * FONT_SIZE_PX;
        if advance <= 0.0 {
            advance = FONT_SIZE_PX * 0.5;
        }
        pen_x += advance;
    }
    out
}

/// Builds a tiny-skia path from a glyph outline, mapping font units (y-up,
/// origin at the baseline) into pixel space (y-down).
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    origin_y: f32,
    scale: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, origin_y: f32, scale: f32) -> GlyphPathBuilder {
        GlyphPathBuilder {
            builder: PathBuilder::new(),
            origin_x,
            origin_y,
            scale,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (
            self.origin_x + x * self.scale,
            self.origin_y - y * self.scale,
        )
    }

    fn finish(self) -> Option<Path> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.map(x, y);
        self.builder.move_to(px, py);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (px, py) = self.map(x, y);
        self.builder.line_to(px, py);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (px1, py1) = self.map(x1, y1);
        let (px, py) = self.map(x, y);
        self.builder.quad_to(px1, py1, px, py);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (px1, py1) = self.map(x1, y1);
        let (px2, py2) = self.map(x2, y2);
        let (px, py) = self.map(x, y);
        self.builder.cubic_to(px1, py1, px2, py2, px, py);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}

static DEFAULT_FONT: OnceLock<Option<Arc<Vec<u8>>>> = OnceLock::new();

/// Loads the first available sans-serif face from well-known system
/// locations, once per process. Text degrades to a warning when nothing
/// is found.
fn default_font_bytes() -> Option<Arc<Vec<u8>>> {
    DEFAULT_FONT
        .get_or_init(|| {
            const CANDIDATES: &[&str] = &[
                "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/dejavu/DejaVuSans.ttf",
                "/usr/share/fonts/TTF/DejaVuSans.ttf",
                "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
                "/usr/share/fonts/liberation-sans/LiberationSans-Regular.ttf",
                "/usr/share/fonts/truetype/freefont/FreeSans.ttf",
                "/System/Library/Fonts/Supplemental/Arial.ttf",
                "/Library/Fonts/Arial.ttf",
                "/System/Library/Fonts/Helvetica.ttc",
                "C:\\Windows\\Fonts\\arial.ttf",
            ];
            for candidate in CANDIDATES {
                if let Ok(bytes) = std::fs::read(candidate) {
                    if ttf_parser::Face::parse(&bytes, 0).is_ok() {
                        return Some(Arc::new(bytes));
                    }
                }
            }
            log::warn!("no default font found; text blocks will not be drawn");
            None
        })
        .clone()
}
