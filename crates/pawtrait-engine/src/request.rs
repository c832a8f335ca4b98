use pawtrait_contracts::entities::{ElementSelection, GenerationRequest, UploadHandle};
use pawtrait_contracts::styles::StyleElementSpec;

use crate::truncate_text;

pub const PROMPT_MAX_CHARS: usize = 1500;

/// Element weights snap onto a 50-step grid between the mode floor and the
/// element's declared maximum.
pub const ELEMENT_WEIGHT_STEPS: u32 = 50;
pub const ELEMENT_WEIGHT_FLOOR_FAST: f64 = 0.1;
pub const ELEMENT_WEIGHT_FLOOR_QUALITY: f64 = 0.3;

pub const INIT_STRENGTH_MIN: f64 = 0.1;
pub const INIT_STRENGTH_MAX: f64 = 0.9;

/// Provider numeric constraints on output dimensions. Axes are quantized
/// down to multiples of 8 and the total pixel count is capped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionLimits {
    pub min_dim: u32,
    pub max_dim: u32,
    pub pixel_budget: u64,
    pub default_width: u32,
    pub default_height: u32,
}

impl Default for DimensionLimits {
    fn default() -> Self {
        Self {
            min_dim: 512,
            max_dim: 1536,
            pixel_budget: 1_048_576,
            default_width: 1024,
            default_height: 1024,
        }
    }
}

/// Derives the output dimensions for a source photo.
///
/// Missing or degenerate source dimensions yield the fixed defaults.
/// Otherwise the source aspect ratio is kept while the short axis is
/// raised to at least `min_dim`, the long axis is clamped to `max_dim`,
/// and the pair is scaled down to fit `pixel_budget`. Every step rounds
/// down to a multiple of 8, and the transform is a fixed point on its own
/// output.
pub fn normalize_dimensions(limits: &DimensionLimits, source: Option<(u32, u32)>) -> (u32, u32) {
    let Some((source_width, source_height)) = source.filter(|(w, h)| *w > 0 && *h > 0) else {
        return (limits.default_width, limits.default_height);
    };

    let wide = source_width >= source_height;
    let (long_src, short_src) = if wide {
        (source_width as u64, source_height as u64)
    } else {
        (source_height as u64, source_width as u64)
    };
    let min = limits.min_dim as u64;
    let max = limits.max_dim as u64;

    let mut short = floor_to_multiple(short_src, 8).max(min);
    let mut long = floor_to_multiple(mul_div(short, long_src, short_src), 8);
    if long > max {
        long = floor_to_multiple(max, 8);
        short = floor_to_multiple(mul_div(long, short_src, long_src), 8).max(min);
    }

    let (mut width, mut height) = if wide { (long, short) } else { (short, long) };
    let pixels = width.saturating_mul(height);
    if pixels > limits.pixel_budget {
        let scale = (limits.pixel_budget as f64 / pixels as f64).sqrt();
        width = floor_to_multiple((width as f64 * scale) as u64, 8).max(min);
        height = floor_to_multiple((height as f64 * scale) as u64, 8).max(min);
    }

    (width as u32, height as u32)
}

/// Weight floor applied to style elements; the fast pipeline accepts
/// lighter element influence than the quality one.
pub fn element_weight_floor(fast_mode: bool) -> f64 {
    if fast_mode {
        ELEMENT_WEIGHT_FLOOR_FAST
    } else {
        ELEMENT_WEIGHT_FLOOR_QUALITY
    }
}

/// Snaps a requested element weight onto the discrete grid of
/// `ELEMENT_WEIGHT_STEPS` steps between `min` and `max`, then clamps into
/// that band. Exactly `ELEMENT_WEIGHT_STEPS + 1` values are reachable.
pub fn normalize_element_weight(min: f64, max: f64, weight: f64) -> f64 {
    if !(max > min) {
        return min;
    }
    let step = (max - min) / ELEMENT_WEIGHT_STEPS as f64;
    let snapped = ((weight - min) / step).round() * step + min;
    snapped.clamp(min, max)
}

pub fn clamp_init_strength(value: f64) -> f64 {
    value.clamp(INIT_STRENGTH_MIN, INIT_STRENGTH_MAX)
}

/// Assembles the provider job payload inputs into one request value.
#[allow(clippy::too_many_arguments)]
pub fn build_generation_request(
    limits: &DimensionLimits,
    prompt: &str,
    init_image: &UploadHandle,
    source_dims: Option<(u32, u32)>,
    init_strength: f64,
    style_elements: &[StyleElementSpec],
    style_reference_id: Option<String>,
    fast_mode: bool,
) -> GenerationRequest {
    let (width, height) = normalize_dimensions(limits, source_dims);
    let floor = element_weight_floor(fast_mode);
    let elements = style_elements
        .iter()
        .map(|element| ElementSelection {
            ak_uuid: element.ak_uuid.clone(),
            weight: normalize_element_weight(floor, element.max_weight, element.weight),
        })
        .collect();

    GenerationRequest {
        width,
        height,
        prompt: truncate_text(prompt, PROMPT_MAX_CHARS),
        init_image_id: init_image.id.clone(),
        init_strength: clamp_init_strength(init_strength),
        elements,
        style_reference_id,
        fast_mode,
    }
}

fn floor_to_multiple(value: u64, step: u64) -> u64 {
    value - value % step
}

fn mul_div(value: u64, numerator: u64, denominator: u64) -> u64 {
    ((value as u128 * numerator as u128) / denominator.max(1) as u128) as u64
}
