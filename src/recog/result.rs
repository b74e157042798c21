//! Alignment results and the collections built from them.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::image::geom::Rect;
use crate::recog::reference::ReferenceMatrix;
use crate::recog::score::Overlap;
use crate::recog::transform::{TargetMatrix, Transformation};

/// Outcome of aligning one target bitmap with one reference glyph.
#[derive(Debug, Clone)]
pub struct OcrResult {
    pub target: Arc<TargetMatrix>,
    pub reference: Arc<ReferenceMatrix>,
    pub overlap: Overlap,
    pub score: i32,
    /// True if unmatched pixels were bucketed by halo layer.
    pub refined: bool,
    /// Per-component adjustments found by component refinement, empty
    /// before that stage.
    pub component_transforms: Vec<Transformation>,
}

impl OcrResult {
    pub fn character(&self) -> char {
        self.reference.character
    }

    pub fn font(&self) -> &str {
        &self.reference.font
    }

    pub fn char_index(&self) -> usize {
        self.target.char_index
    }

    pub fn transform(&self) -> Transformation {
        self.target.transform
    }
}

impl fmt::Display for OcrResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}) score:{} black:{} white:{} target halo:{:?} reference halo:{:?} transform:{}",
            self.character(),
            self.font(),
            self.score,
            self.overlap.black,
            self.overlap.white,
            self.overlap.target_halo,
            self.overlap.reference_halo,
            self.transform()
        )
    }
}

/// Heap entry ordered so the worst result sits on top.
struct Worst(OcrResult);

impl PartialEq for Worst {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Worst {}

impl PartialOrd for Worst {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Worst {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .0
            .score
            .cmp(&self.0.score)
            .then_with(|| other.0.character().cmp(&self.0.character()))
    }
}

/// Keeps the `capacity` best results seen so far.
pub struct ResultQueue {
    capacity: usize,
    heap: BinaryHeap<Worst>,
}

impl ResultQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: BinaryHeap::with_capacity(capacity + 1),
        }
    }

    pub fn push(&mut self, result: OcrResult) {
        if self.capacity == 0 {
            return;
        }
        if self.heap.len() == self.capacity {
            match self.heap.peek() {
                Some(worst) if worst.0.score >= result.score => return,
                _ => {}
            }
            self.heap.pop();
        }
        self.heap.push(Worst(result));
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Results ordered best first.
    pub fn into_sorted(self) -> Vec<OcrResult> {
        // ascending by `Worst` is descending by score
        self.heap.into_sorted_vec().into_iter().map(|w| w.0).collect()
    }
}

/// Sorts results best first. Ties keep code point order.
pub fn sort_results(results: &mut [OcrResult]) {
    results.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.character().cmp(&b.character())));
}

/// Keeps the best result per character across fonts, best first, truncated
/// to `keep` entries.
pub fn combine_results(results: Vec<OcrResult>, keep: usize) -> Vec<OcrResult> {
    let mut best: HashMap<char, OcrResult> = HashMap::new();
    for result in results {
        match best.get(&result.character()) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                best.insert(result.character(), result);
            }
        }
    }
    let mut combined: Vec<OcrResult> = best.into_values().collect();
    sort_results(&mut combined);
    combined.truncate(keep);
    combined
}

/// Recognition output for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct OcrResults {
    /// Candidate characters per position, best first.
    pub characters: Vec<String>,
    /// Scores matching `characters`.
    pub scores: Vec<Vec<i32>>,
    /// Source rectangle of each position.
    pub locations: Vec<Rect>,
    /// Reading direction of the recognized text.
    pub vertical: bool,
}

impl OcrResults {
    /// Best candidate of every position.
    pub fn best_match(&self) -> String {
        self.characters.iter().filter_map(|c| c.chars().next()).collect()
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}

impl fmt::Display for OcrResults {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.best_match())?;
        for (candidates, location) in self.characters.iter().zip(&self.locations) {
            write!(f, "\n  {} at {},{} {}x{}", candidates, location.x, location.y, location.width, location.height)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::matrix32::Matrix32;
    use crate::recog::reference::HaloMatrix;

    fn result(character: char, font: &str, score: i32) -> OcrResult {
        let bitmap = HaloMatrix::new(Matrix32::new(), 0);
        OcrResult {
            target: Arc::new(TargetMatrix {
                bitmap: bitmap.clone(),
                char_index: 0,
                transform: Transformation::default(),
            }),
            reference: Arc::new(ReferenceMatrix {
                character,
                bitmap,
                score_modifier: 1.0,
                font: font.to_string(),
                components: Vec::new(),
            }),
            overlap: Overlap::default(),
            score,
            refined: true,
            component_transforms: Vec::new(),
        }
    }

    #[test]
    fn test_queue_keeps_best() {
        let mut queue = ResultQueue::new(2);
        queue.push(result('a', "f", 10));
        queue.push(result('b', "f", 30));
        queue.push(result('c', "f", 20));
        queue.push(result('d', "f", 5));
        assert_eq!(queue.len(), 2);
        let chars: Vec<char> = queue.into_sorted().iter().map(|r| r.character()).collect();
        assert_eq!(chars, vec!['b', 'c']);
    }

    #[test]
    fn test_combine_across_fonts() {
        let results = vec![
            result('日', "A", 100),
            result('日', "B", 150),
            result('月', "A", 120),
            result('木', "B", 10),
        ];
        let combined = combine_results(results, 2);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].character(), '日');
        assert_eq!(combined[0].font(), "B");
        assert_eq!(combined[1].character(), '月');
    }

    #[test]
    fn test_best_match() {
        let results = OcrResults {
            characters: vec!["日曰".into(), "本".into()],
            scores: vec![vec![10, 9], vec![8]],
            locations: vec![Rect::new(0, 0, 10, 10), Rect::new(0, 12, 10, 10)],
            vertical: true,
        };
        assert_eq!(results.best_match(), "日本");
        assert_eq!(results.len(), 2);
    }
}
