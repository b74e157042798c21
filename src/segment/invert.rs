//! Background inversion for white-on-black text.
//!
//! The image is divided into square blocks. Runs of nearly solid black
//! blocks are flood-filled into regions; regions large enough are inverted
//! so their text becomes ink, and a separator line is drawn along every edge
//! that borders a non-inverted block. Components touching that line are
//! later discarded like components touching the image border.

use std::collections::VecDeque;

use log::debug;

use crate::image::geom::Rect;
use crate::segment::task::SegmentationTask;
use crate::utils::config::{CharacterColor, Config};

const BLACK_BLOCK_RATIO: f32 = 0.95;
const NEIGHBOUR_BONUS: f32 = 0.25;
const MIN_REGION_BLOCKS: usize = 4;
const MAX_GAP_BLOCKS: i32 = 8;
const MIN_ELLIPSE_CHECK: i32 = 3;
const GAP_ELLIPSE_SIZE: f32 = 0.9;
const GAP_MIN_INK_RATIO: f32 = 0.1;

/// Runs the inversion mode selected by `config`.
pub fn invert_image(task: &mut SegmentationTask, config: &Config) {
    if config.fixed_black_level.is_some() {
        return;
    }
    match config.color {
        CharacterColor::BlackOnWhite => {}
        CharacterColor::WhiteOnBlack => {
            let (w, h) = (task.width(), task.height());
            invert_region(task, Rect::new(0, 0, w, h), [false; 4]);
        }
        CharacterColor::Automatic => {
            let mut detector = BlockInverter::new(task);
            detector.detect(task);
            let inverted = detector.invert.iter().filter(|&&b| b).count();
            if inverted > 0 {
                debug!("inverting {} of {} blocks", inverted, detector.invert.len());
            }
            detector.apply(task);
            task.inverted = detector.invert;
        }
    }
}

struct BlockInverter {
    width: i32,
    height: i32,
    block_size: i32,
    visited: Vec<bool>,
    invert: Vec<bool>,
    neighbours_inverted: Vec<i32>,
}

impl BlockInverter {
    fn new(task: &SegmentationTask) -> Self {
        let n = task.blocks_x * task.blocks_y;
        BlockInverter {
            width: task.blocks_x as i32,
            height: task.blocks_y as i32,
            block_size: task.block_size as i32,
            visited: vec![false; n],
            invert: vec![false; n],
            neighbours_inverted: vec![0; n],
        }
    }

    #[inline]
    fn idx(&self, x: i32, y: i32) -> usize {
        (y * self.width + x) as usize
    }

    fn inverted(&self, x: i32, y: i32) -> bool {
        x >= 0 && y >= 0 && x < self.width && y < self.height && self.invert[self.idx(x, y)]
    }

    fn detect(&mut self, task: &SegmentationTask) {
        for x in 0..self.width {
            for y in 0..self.height {
                self.check_block(task, x, y);
            }
        }
    }

    fn apply(&self, task: &mut SegmentationTask) {
        for x in 0..self.width {
            for y in 0..self.height {
                if !self.invert[self.idx(x, y)] {
                    continue;
                }
                let edges = [
                    y > 0 && !self.inverted(x, y - 1),
                    y < self.height - 1 && !self.inverted(x, y + 1),
                    x > 0 && !self.inverted(x - 1, y),
                    x < self.width - 1 && !self.inverted(x + 1, y),
                ];
                let rect = Rect::new(
                    x * self.block_size,
                    y * self.block_size,
                    self.block_size,
                    self.block_size,
                );
                invert_region(task, rect, edges);
            }
        }
    }

    /// Ink ratio of one block, clipped to the image.
    fn block_ratio(&self, task: &SegmentationTask, bx: i32, by: i32) -> f32 {
        let rect = Rect::new(bx * self.block_size, by * self.block_size, self.block_size, self.block_size)
            .intersection(&task.binary.bounds());
        if rect.is_empty() {
            return 0.0;
        }
        task.count_pixels(&rect, false, true) as f32 / rect.area() as f32
    }

    /// Ink ratio inside an ellipse inscribed in a block region.
    fn ellipse_ratio(&self, task: &SegmentationTask, blocks: Rect) -> f32 {
        let p_width = blocks.width * self.block_size;
        let p_height = blocks.height * self.block_size;
        let a2 = (p_width as f32 / 2.0 * GAP_ELLIPSE_SIZE).powi(2);
        let b2 = (p_height as f32 / 2.0 * GAP_ELLIPSE_SIZE).powi(2);
        let px_min = blocks.x * self.block_size;
        let py_min = blocks.y * self.block_size;
        let px_center = px_min + p_width / 2;
        let py_center = py_min + p_height / 2;

        let mut black = 0usize;
        let mut all = 0usize;
        for px in px_min..(px_min + p_width).min(task.width()) {
            for py in py_min..(py_min + p_height).min(task.height()) {
                let value = ((px - px_center) as f32).powi(2) / a2
                    + ((py - py_center) as f32).powi(2) / b2;
                if value > 1.0 {
                    continue;
                }
                if task.pixel(px, py) {
                    black += 1;
                }
                all += 1;
            }
        }
        if all == 0 { 0.0 } else { black as f32 / all as f32 }
    }

    fn check_block(&mut self, task: &SegmentationTask, x: i32, y: i32) {
        let mut marked = Vec::new();
        let mut black_blocks = 0;
        let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
        let mut todo = VecDeque::from([(x, y)]);

        while let Some((bx, by)) = todo.pop_front() {
            let i = self.idx(bx, by);
            if self.visited[i] {
                continue;
            }
            self.visited[i] = true;
            let ratio = self.block_ratio(task, bx, by);
            let threshold = BLACK_BLOCK_RATIO - self.neighbours_inverted[i] as f32 * NEIGHBOUR_BONUS;
            if ratio >= threshold {
                self.mark_block(bx, by, &mut todo);
                marked.push((bx, by));
            }
            if ratio >= BLACK_BLOCK_RATIO {
                black_blocks += 1;
            }
            min_x = min_x.min(bx);
            max_x = max_x.max(bx);
            min_y = min_y.min(by);
            max_y = max_y.max(by);
        }

        let quad_blocks = marked
            .iter()
            .filter(|&&(bx, by)| {
                self.inverted(bx + 1, by) && self.inverted(bx, by + 1) && self.inverted(bx + 1, by + 1)
            })
            .count();
        if quad_blocks < MIN_REGION_BLOCKS || black_blocks < MIN_REGION_BLOCKS {
            for (bx, by) in marked {
                let i = self.idx(bx, by);
                self.invert[i] = false;
            }
            return;
        }
        self.fill_gaps(task, Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1));
    }

    fn mark_block(&mut self, x: i32, y: i32, todo: &mut VecDeque<(i32, i32)>) {
        let i = self.idx(x, y);
        self.invert[i] = true;
        for (nx, ny) in [(x - 1, y), (x + 1, y), (x, y - 1), (x, y + 1)] {
            if nx < 0 || ny < 0 || nx >= self.width || ny >= self.height {
                continue;
            }
            let n = self.idx(nx, ny);
            self.neighbours_inverted[n] += 1;
            todo.push_back((nx, ny));
        }
    }

    /// Marks small holes inside an inverted region (typically speech text
    /// blocks on a dark panel) as inverted too.
    fn fill_gaps(&mut self, task: &SegmentationTask, region: Rect) {
        let internal = region.inflate(-1, -1);
        if internal.is_empty() {
            return;
        }
        let mut visited = vec![false; self.invert.len()];
        for x in internal.x..=internal.max_x() {
            for y in internal.y..=internal.max_y() {
                let start = self.idx(x, y);
                if self.invert[start] || visited[start] {
                    continue;
                }
                let (mut min_x, mut max_x, mut min_y, mut max_y) = (x, x, y, y);
                let mut marked = Vec::new();
                let mut touches_border = false;
                let mut todo = VecDeque::from([(x, y)]);
                while let Some((bx, by)) = todo.pop_front() {
                    if !internal.contains(bx, by) {
                        if !self.inverted(bx, by) {
                            touches_border = true;
                        }
                        continue;
                    }
                    let i = self.idx(bx, by);
                    if self.invert[i] || visited[i] {
                        continue;
                    }
                    visited[i] = true;
                    marked.push(i);
                    todo.extend([(bx, by - 1), (bx, by + 1), (bx - 1, by), (bx + 1, by)]);
                    min_x = min_x.min(bx);
                    max_x = max_x.max(bx);
                    min_y = min_y.min(by);
                    max_y = max_y.max(by);
                }
                if touches_border {
                    continue;
                }
                let gap = Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1);
                if gap.width > MAX_GAP_BLOCKS && gap.height > MAX_GAP_BLOCKS {
                    continue;
                }
                if gap.width >= MIN_ELLIPSE_CHECK
                    && gap.height >= MIN_ELLIPSE_CHECK
                    && self.ellipse_ratio(task, gap) < GAP_MIN_INK_RATIO
                {
                    continue;
                }
                for i in marked {
                    self.invert[i] = true;
                }
            }
        }
    }
}

/// Flips every pixel of `rect` and draws separator lines on the requested
/// edges (`[top, bottom, left, right]`).
fn invert_region(task: &mut SegmentationTask, rect: Rect, edges: [bool; 4]) {
    let clipped = rect.intersection(&task.binary.bounds());
    if clipped.is_empty() {
        return;
    }
    for y in clipped.y..=clipped.max_y() {
        for x in clipped.x..=clipped.max_x() {
            task.binary.flip(x, y);
        }
    }
    let [top, bottom, left, right] = edges;
    let mut line = |x: i32, y: i32| {
        task.binary.set(x, y, true);
        task.border.set(x, y, true);
    };
    if top {
        (rect.x..=rect.max_x()).for_each(|x| line(x, rect.y));
    }
    if bottom {
        (rect.x..=rect.max_x()).for_each(|x| line(x, rect.max_y()));
    }
    if left {
        (rect.y..=rect.max_y()).for_each(|y| line(rect.x, y));
    }
    if right {
        (rect.y..=rect.max_y()).for_each(|y| line(rect.max_x(), y));
    }
}
