//! Pure score-to-visual mappings shared by the scorer and frame assembler.

/// Linear interpolation between `a` and `b`.
pub fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

fn clamp01(s: f64) -> f64 {
    s.clamp(0.0, 1.0)
}

/// Converts a score in [0,1] into a red→yellow→green hex color.
///
/// Piecewise-linear in two halves: `#e60000` at 0, `#ffd700` at 0.5,
/// `#00b050` at 1. Inputs outside [0,1] are clamped.
pub fn score_to_color_hex(score01: f64) -> String {
    let s = clamp01(score01);
    let (r, g, b) = if s <= 0.5 {
        let t = s / 0.5;
        (lerp(230.0, 255.0, t), lerp(0.0, 215.0, t), 0.0)
    } else {
        let t = (s - 0.5) / 0.5;
        (
            lerp(255.0, 0.0, t),
            lerp(215.0, 176.0, t),
            lerp(0.0, 80.0, t),
        )
    };
    format!(
        "#{:02x}{:02x}{:02x}",
        r.round() as u8,
        g.round() as u8,
        b.round() as u8
    )
}

/// Converts a score in [0,1] into an integer rating in [1,100].
///
/// `rating = round(1 + 99 * score)`; inputs outside [0,1] are clamped.
pub fn score_to_rating(score01: f64) -> i32 {
    (1.0 + 99.0 * clamp01(score01)).round() as i32
}

/// Min-max normalizes a sequence of optional values to [0,1].
///
/// The range is taken over the valid values only. A degenerate range
/// (`max == min`), or a sequence with no valid values at all, normalizes
/// everything to 0. A `None` inside a non-degenerate sequence also maps to
/// 0, so no NaN can reach the score.
pub fn min_max_normalize(values: &[Option<f64>]) -> Vec<f64> {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values.iter().flatten() {
        min = min.min(*v);
        max = max.max(*v);
    }

    if !min.is_finite() || !max.is_finite() || max == min {
        return vec![0.0; values.len()];
    }

    values
        .iter()
        .map(|v| match v {
            Some(x) => (x - min) / (max - min),
            None => 0.0,
        })
        .collect()
}
