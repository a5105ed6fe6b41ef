use std::collections::HashSet;

/// Case-insensitive, trimmed string equality (0.0 or 1.0)
///
/// Empty values never match, not even each other.
#[inline]
pub fn exact_match(a: &str, b: &str) -> f64 {
    let a = a.trim();
    let b = b.trim();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    if a.to_lowercase() == b.to_lowercase() {
        1.0
    } else {
        0.0
    }
}

fn normalized_set(values: &[String]) -> HashSet<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
        .collect()
}

/// Jaccard index |A ∩ B| / |A ∪ B| over normalized sets
///
/// Entries are trimmed, lower-cased, deduplicated and blank entries dropped.
/// If either side is empty after that, the score is 0.0.
pub fn set_overlap(a: &[String], b: &[String]) -> f64 {
    let a = normalized_set(a);
    let b = normalized_set(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let intersection = a.intersection(&b).count();
    let union = a.union(&b).count();

    intersection as f64 / union as f64
}

/// Proximity of two integers, scaled by the smaller one
///
/// `1 - |a - b| / max(min(a, b), 1)`, floored at 0.0. The same absolute gap
/// costs more between small values than between large ones.
#[inline]
pub fn numeric_proximity(a: Option<i64>, b: Option<i64>) -> f64 {
    let (Some(a), Some(b)) = (a, b) else {
        return 0.0;
    };

    let diff = a.abs_diff(b) as f64;
    let scale = a.min(b).max(1) as f64;

    (1.0 - diff / scale).max(0.0)
}

/// Cosine similarity of two embedding vectors
///
/// Returns 0.0 for zero-norm vectors and for vectors of different length.
/// Negative similarity is clamped to 0.0 so field scores stay within [0, 1].
pub fn cosine_similarity(u: &[f32], v: &[f32]) -> f64 {
    if u.len() != v.len() || u.is_empty() {
        return 0.0;
    }

    let (mut dot, mut norm_u, mut norm_v) = (0.0f64, 0.0f64, 0.0f64);
    for (&x, &y) in u.iter().zip(v) {
        let (x, y) = (x as f64, y as f64);
        dot += x * y;
        norm_u += x * x;
        norm_v += y * y;
    }

    let denom = norm_u.sqrt() * norm_v.sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return 0.0;
    }

    (dot / denom).clamp(0.0, 1.0)
}

/// Round to a fixed number of decimal digits for presentation
#[inline]
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
