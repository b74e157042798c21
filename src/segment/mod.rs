//! Character segmentation: connected components, reading columns and
//! orientation.

pub mod area;
pub mod column;
pub mod connections;
pub mod detector;
pub mod find_areas;
pub mod find_columns;
pub mod furigana;
pub mod invert;
pub mod merge_areas;
pub mod orientation;
pub mod punctuation;
pub mod selection;
pub mod spatial_index;
pub mod split_areas;
pub mod task;

pub use area::Area;
pub use column::{Column, ColumnId, ColumnSet};
pub use detector::{Segmentation, segment};
pub use selection::SubImage;
pub use spatial_index::SpatialIndex;
