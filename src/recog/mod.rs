//! Bitmap matching against cached reference glyphs.

pub mod align;
pub mod cache;
pub mod components;
pub mod engine;
pub mod reference;
pub mod refine;
pub mod result;
pub mod scheduler;
pub mod score;
pub mod transform;

pub use cache::{ReferenceCache, ReferenceCacheBuilder, load_or_get};
pub use engine::recognize;
pub use reference::{Component, HaloMatrix, ReferenceMatrix};
pub use result::{OcrResult, OcrResults};
pub use scheduler::WorkerPool;
pub use transform::{TargetMatrix, Transformation};
