//! Component refinement: moves and stretches the connected parts of a
//! reference glyph one at a time to fit the target better.

use std::sync::Arc;

use crate::image::matrix32::Matrix32;
use crate::recog::reference::{Component, HaloMatrix};
use crate::recog::result::OcrResult;
use crate::recog::score::{Overlap, overlap, score};
use crate::recog::transform::Transformation;
use crate::utils::config::OcrConfig;
use crate::utils::error::Result;

const MAX_TRANSLATE: i32 = 1;
const MAX_STRETCH: i32 = 4;

/// Reassembles a glyph from its components, each moved by its own
/// transformation.
///
/// Stretching both axes of one component is rejected with
/// [`OcrError::InvalidTransformation`](crate::utils::error::OcrError::InvalidTransformation).
pub fn transform_components(components: &[Component], transforms: &[Transformation]) -> Result<Matrix32> {
    let mut matrix = Matrix32::new();
    for (component, t) in components.iter().zip(transforms) {
        if t.horizontal_stretch != 0 || t.vertical_stretch != 0 {
            let (stretched, bounds) =
                component
                    .matrix
                    .stretched(&component.bounds, t.horizontal_stretch, t.vertical_stretch)?;
            matrix.copy_bits(&stretched, &bounds, t.horizontal_translate, t.vertical_translate);
        } else {
            matrix.copy_bits(
                &component.matrix,
                &component.bounds,
                t.horizontal_translate,
                t.vertical_translate,
            );
        }
    }
    Ok(matrix)
}

/// Candidate adjustments for one component: small moves combined with a
/// stretch along at most one axis.
fn adjustments() -> impl Iterator<Item = Transformation> {
    (-MAX_TRANSLATE..=MAX_TRANSLATE).flat_map(|dx| {
        (-MAX_TRANSLATE..=MAX_TRANSLATE).flat_map(move |dy| {
            (0..=MAX_STRETCH).flat_map(move |sx| {
                (0..=MAX_STRETCH)
                    .filter(move |&sy| sx == 0 || sy == 0)
                    .map(move |sy| Transformation::new(dx, dy, sx, sy))
            })
        })
    })
}

struct Scorer<'a> {
    result: &'a OcrResult,
    config: &'a OcrConfig,
}

impl Scorer<'_> {
    fn evaluate(&self, transforms: &[Transformation]) -> Result<(Overlap, i32)> {
        let matrix = transform_components(&self.result.reference.components, transforms)?;
        let bitmap = HaloMatrix::new(matrix, self.config.halo_size.saturating_sub(1));
        let overlap = overlap(&self.result.target.bitmap, &bitmap, self.config.halo_size, true);
        let score = score(&overlap, self.result.reference.score_modifier, self.config);
        Ok((overlap, score))
    }
}

/// Improves `result` by adjusting each component of its reference glyph in
/// turn. A component is frozen at its best adjustment before the next one is
/// tried; adjustments that do not raise the score are dropped.
pub fn refine_components(result: &OcrResult, config: &OcrConfig) -> Result<OcrResult> {
    let components = &result.reference.components;
    if components.is_empty() {
        return Ok(result.clone());
    }
    let scorer = Scorer { result, config };
    let mut transforms = vec![Transformation::default(); components.len()];
    let (_, mut best_score) = scorer.evaluate(&transforms)?;

    for i in 0..components.len() {
        let mut best = transforms[i];
        for adjustment in adjustments() {
            transforms[i] = adjustment;
            let (_, score) = scorer.evaluate(&transforms)?;
            if score > best_score {
                best_score = score;
                best = adjustment;
            }
        }
        transforms[i] = best;
    }

    let (overlap, score) = scorer.evaluate(&transforms)?;
    Ok(OcrResult {
        target: Arc::clone(&result.target),
        reference: Arc::clone(&result.reference),
        overlap,
        score,
        refined: true,
        component_transforms: transforms,
    })
}
