//! Matches target bitmaps against whole reference glyphs.

use std::collections::HashSet;
use std::sync::Arc;

use crate::recog::reference::ReferenceMatrix;
use crate::recog::result::{OcrResult, ResultQueue, combine_results};
use crate::recog::score::{overlap, score};
use crate::recog::transform::TargetMatrix;
use crate::utils::config::OcrConfig;

/// Aligns one target with one reference.
pub fn align(target: &Arc<TargetMatrix>, reference: &Arc<ReferenceMatrix>, config: &OcrConfig, refined: bool) -> OcrResult {
    let overlap = overlap(&target.bitmap, &reference.bitmap, config.halo_size, refined);
    let score = score(&overlap, reference.score_modifier, config);
    OcrResult {
        target: Arc::clone(target),
        reference: Arc::clone(reference),
        overlap,
        score,
        refined,
        component_transforms: Vec::new(),
    }
}

/// Best-scoring target for one reference.
fn best_target(targets: &[Arc<TargetMatrix>], reference: &Arc<ReferenceMatrix>, config: &OcrConfig) -> Option<OcrResult> {
    targets
        .iter()
        .map(|target| align(target, reference, config, true))
        .reduce(|best, result| if result.score > best.score { result } else { best })
}

/// Aligns every target against every reference and keeps the `keep` best
/// references, each with its best target. Ordered best first.
pub fn align_characters(
    targets: &[Arc<TargetMatrix>],
    references: &[Arc<ReferenceMatrix>],
    config: &OcrConfig,
    keep: usize,
) -> Vec<OcrResult> {
    let mut queue = ResultQueue::new(keep);
    for reference in references {
        if let Some(result) = best_target(targets, reference, config) {
            queue.push(result);
        }
    }
    queue.into_sorted()
}

/// Realigns the characters found by an earlier stage against every font in
/// `fonts`, merging per character.
pub fn align_candidates(
    targets: &[Arc<TargetMatrix>],
    fonts: &[&[Arc<ReferenceMatrix>]],
    candidates: &[OcrResult],
    config: &OcrConfig,
    keep: usize,
) -> Vec<OcrResult> {
    let characters: HashSet<char> = candidates.iter().map(OcrResult::character).collect();
    let mut results = Vec::new();
    for references in fonts {
        let selected: Vec<Arc<ReferenceMatrix>> = references
            .iter()
            .filter(|r| characters.contains(&r.character))
            .cloned()
            .collect();
        results.extend(align_characters(targets, &selected, config, keep));
    }
    combine_results(results, keep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::matrix32::Matrix32;
    use crate::recog::reference::HaloMatrix;
    use crate::recog::transform::Transformation;

    fn bar(x: i32, width: i32) -> Matrix32 {
        let mut m = Matrix32::new();
        for y in 2..30 {
            for xx in x..x + width {
                m.set(xx, y);
            }
        }
        m
    }

    fn reference(character: char, font: &str, matrix: Matrix32) -> Arc<ReferenceMatrix> {
        Arc::new(ReferenceMatrix {
            character,
            bitmap: HaloMatrix::new(matrix, 2),
            score_modifier: 1.0,
            font: font.into(),
            components: Vec::new(),
        })
    }

    fn target(matrix: Matrix32, dx: i32) -> Arc<TargetMatrix> {
        Arc::new(TargetMatrix {
            bitmap: HaloMatrix::new(matrix.shifted(dx, 0), 2),
            char_index: 0,
            transform: Transformation::new(dx, 0, 0, 0),
        })
    }

    #[test]
    fn test_best_target_and_reference() {
        let config = OcrConfig::default();
        let targets = vec![target(bar(10, 4), -1), target(bar(10, 4), 0), target(bar(10, 4), 1)];
        let references = vec![reference('|', "A", bar(11, 4)), reference('l', "A", bar(20, 2))];
        let results = align_characters(&targets, &references, &config, 1);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].character(), '|');
        assert_eq!(results[0].transform().horizontal_translate, 1);
        assert_eq!(results[0].overlap.target_halo, vec![0, 0, 0]);
    }

    #[test]
    fn test_candidates_merged_across_fonts() {
        let config = OcrConfig::default();
        let targets = vec![target(bar(10, 4), 0)];
        let font_a = vec![reference('|', "A", bar(11, 4)), reference('l', "A", bar(10, 3))];
        let font_b = vec![reference('|', "B", bar(10, 4)), reference('-', "B", bar(10, 4))];
        let stage1 = align_characters(&targets, &font_a, &config, 2);
        let fonts: Vec<&[Arc<ReferenceMatrix>]> = vec![&font_a, &font_b];
        let results = align_candidates(&targets, &fonts, &stage1, &config, 10);
        // '-' was not a stage 1 candidate
        let chars: Vec<char> = results.iter().map(|r| r.character()).collect();
        assert_eq!(chars, vec!['|', 'l']);
        assert_eq!(results[0].font(), "B");
    }
}
