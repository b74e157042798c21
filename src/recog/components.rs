//! Splits a reference glyph into 4-connected components.

use crate::image::geom::Rect;
use crate::image::matrix32::{MATRIX_SIZE, Matrix32};
use crate::recog::reference::Component;

struct Group {
    bits: Matrix32,
    bounds: Rect,
    pixels: u32,
}

/// Where a component's bits are stored.
enum Storage {
    Base,
    Layer(usize),
}

/// Finds the connected components of `matrix` in column-major scan order and
/// packs them into as few matrices as possible.
///
/// A component whose bounding box holds no foreign pixels shares the glyph
/// matrix itself. Other components go to extra layers, where no two members
/// have bits inside each other's bounds.
pub fn build_components(matrix: &Matrix32) -> Vec<Component> {
    let groups = find_groups(matrix);

    let mut layers: Vec<(Matrix32, Vec<Rect>)> = Vec::new();
    let mut storage = Vec::with_capacity(groups.len());
    for group in &groups {
        if matrix.count_in(&group.bounds) == group.pixels {
            storage.push(Storage::Base);
            continue;
        }
        let free = layers.iter().position(|(layer, members)| {
            layer.count_in(&group.bounds) == 0 && members.iter().all(|b| group.bits.count_in(b) == 0)
        });
        let index = match free {
            Some(index) => index,
            None => {
                layers.push((Matrix32::new(), Vec::new()));
                layers.len() - 1
            }
        };
        let (layer, members) = &mut layers[index];
        layer.or_assign(&group.bits);
        members.push(group.bounds);
        storage.push(Storage::Layer(index));
    }

    groups
        .iter()
        .zip(storage)
        .map(|(group, storage)| Component {
            bounds: group.bounds,
            matrix: match storage {
                Storage::Base => *matrix,
                Storage::Layer(index) => layers[index].0,
            },
            pixels: group.pixels,
        })
        .collect()
}

fn find_groups(matrix: &Matrix32) -> Vec<Group> {
    let mut visited = Matrix32::new();
    let mut groups = Vec::new();
    for x in 0..MATRIX_SIZE {
        for y in 0..MATRIX_SIZE {
            if !matrix.get(x, y) || visited.get(x, y) {
                continue;
            }
            groups.push(flood(matrix, &mut visited, x, y));
        }
    }
    groups
}

fn flood(matrix: &Matrix32, visited: &mut Matrix32, x: i32, y: i32) -> Group {
    let mut bits = Matrix32::new();
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (x, y, x, y);
    let mut pixels = 0;
    let mut stack = vec![(x, y)];
    visited.set(x, y);
    while let Some((px, py)) = stack.pop() {
        bits.set(px, py);
        pixels += 1;
        min_x = min_x.min(px);
        min_y = min_y.min(py);
        max_x = max_x.max(px);
        max_y = max_y.max(py);
        for (nx, ny) in [(px - 1, py), (px + 1, py), (px, py - 1), (px, py + 1)] {
            if matrix.get(nx, ny) && !visited.get(nx, ny) {
                visited.set(nx, ny);
                stack.push((nx, ny));
            }
        }
    }
    Group {
        bits,
        bounds: Rect::new(min_x, min_y, max_x - min_x + 1, max_y - min_y + 1),
        pixels,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(m: &mut Matrix32, rect: Rect) {
        for y in rect.y..=rect.max_y() {
            for x in rect.x..=rect.max_x() {
                m.set(x, y);
            }
        }
    }

    #[test]
    fn test_separate_strokes_use_base_layer() {
        let mut m = Matrix32::new();
        fill(&mut m, Rect::new(2, 2, 3, 10));
        fill(&mut m, Rect::new(10, 2, 3, 10));
        let components = build_components(&m);
        assert_eq!(components.len(), 2);
        assert_eq!(components[0].bounds, Rect::new(2, 2, 3, 10));
        assert_eq!(components[1].pixels, 30);
        assert!(components.iter().all(|c| c.matrix == m));
    }

    #[test]
    fn test_diagonal_pixels_are_not_connected() {
        let mut m = Matrix32::new();
        m.set(5, 5);
        m.set(6, 6);
        assert_eq!(build_components(&m).len(), 2);
    }

    #[test]
    fn test_enclosed_component_gets_own_layer() {
        let mut m = Matrix32::new();
        // frame around a dot
        fill(&mut m, Rect::new(2, 2, 9, 1));
        fill(&mut m, Rect::new(2, 10, 9, 1));
        fill(&mut m, Rect::new(2, 2, 1, 9));
        fill(&mut m, Rect::new(10, 2, 1, 9));
        m.set(6, 6);
        let components = build_components(&m);
        assert_eq!(components.len(), 2);
        let frame = &components[0];
        let dot = &components[1];
        assert_eq!(frame.bounds, Rect::new(2, 2, 9, 9));
        assert_eq!(frame.matrix.count_in(&frame.bounds), frame.pixels);
        assert_eq!(dot.matrix, m);
        assert!(!frame.matrix.get(6, 6));
    }
}
