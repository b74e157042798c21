//! Pixel overlap counts and the score computed from them.

use crate::image::matrix32::MATRIX_SIZE;
use crate::recog::reference::HaloMatrix;
use crate::utils::config::OcrConfig;

const MATRIX_PIXELS: u32 = (MATRIX_SIZE * MATRIX_SIZE) as u32;

/// Overlap counts between a target and a reference bitmap.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Overlap {
    /// Pixels set in both bitmaps.
    pub black: u32,
    /// Pixels set in neither bitmap.
    pub white: u32,
    /// Unmatched target pixels per reference halo layer.
    pub target_halo: Vec<u32>,
    /// Unmatched reference pixels per target halo layer.
    pub reference_halo: Vec<u32>,
}

/// Counts overlapping pixels. Without `refined` all unmatched pixels fall into
/// a single halo bucket; with it they are distributed over `halo_size`
/// buckets by distance, the last bucket taking whatever is left.
pub fn overlap(target: &HaloMatrix, reference: &HaloMatrix, halo_size: usize, refined: bool) -> Overlap {
    let black = target.matrix.and_count(&reference.matrix);
    let target_unmatched = target.pixels - black;
    let reference_unmatched = reference.pixels - black;
    let white = MATRIX_PIXELS - black - target_unmatched - reference_unmatched;

    if !refined || halo_size <= 1 {
        return Overlap {
            black,
            white,
            target_halo: vec![target_unmatched],
            reference_halo: vec![reference_unmatched],
        };
    }
    Overlap {
        black,
        white,
        target_halo: distribute(target, reference, target_unmatched, halo_size),
        reference_halo: distribute(reference, target, reference_unmatched, halo_size),
    }
}

/// Buckets the unmatched pixels of `bitmap` by the halo ring of `other`
/// they fall into.
fn distribute(bitmap: &HaloMatrix, other: &HaloMatrix, unmatched: u32, halo_size: usize) -> Vec<u32> {
    let mut buckets = Vec::with_capacity(halo_size);
    let mut remaining = unmatched;
    for ring in other.halo.iter().take(halo_size - 1) {
        let count = bitmap.matrix.and_count(ring);
        buckets.push(count);
        remaining -= count;
    }
    buckets.push(remaining);
    buckets
}

/// Weighted score of an overlap. Positive scores are multiplied by the
/// reference's score modifier.
pub fn score(overlap: &Overlap, score_modifier: f32, config: &OcrConfig) -> i32 {
    let mut score = config.base_score
        + overlap.black as i32 * config.black_pixel_score
        + overlap.white as i32 * config.white_pixel_score;
    for (count, weight) in overlap.target_halo.iter().zip(&config.target_halo_scores) {
        score += *count as i32 * weight;
    }
    for (count, weight) in overlap.reference_halo.iter().zip(&config.reference_halo_scores) {
        score += *count as i32 * weight;
    }
    if score > 1 {
        score = (score_modifier * score as f32) as i32;
    }
    score
}
