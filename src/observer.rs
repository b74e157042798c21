//! Diagnostic hooks called at fixed points of segmentation and recognition.
//!
//! An observer never influences results. Errors returned from a hook are
//! logged and dropped.

use log::warn;

use crate::image::pixel_grid::PixelGrid;
use crate::recog::result::OcrResult;
use crate::segment::area::Area;
use crate::segment::column::ColumnSet;
use crate::utils::error::Result;

/// Receives intermediate results. Every hook defaults to a no-op.
pub trait Observer: Send + Sync {
    /// Binary image after thresholding and inversion.
    fn on_binary_image(&self, _binary: &PixelGrid) -> Result<()> {
        Ok(())
    }

    /// Areas found by connected-component extraction.
    fn on_areas(&self, _areas: &[Area]) -> Result<()> {
        Ok(())
    }

    /// Columns after a named step. `vertical` is `None` once both
    /// orientations have been combined.
    fn on_columns(&self, _step: &str, _vertical: Option<bool>, _columns: &ColumnSet) -> Result<()> {
        Ok(())
    }

    /// Best results of a recognition stage for one character.
    fn on_ocr_stage(&self, _stage: u8, _character: usize, _results: &[OcrResult]) -> Result<()> {
        Ok(())
    }
}

/// Runs a hook if an observer is present, swallowing its error.
pub(crate) fn notify<F>(observer: Option<&dyn Observer>, hook: &str, f: F)
where
    F: FnOnce(&dyn Observer) -> Result<()>,
{
    if let Some(observer) = observer {
        if let Err(err) = f(observer) {
            warn!("observer hook {} failed: {}", hook, err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::OcrError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing {
        calls: AtomicUsize,
    }

    impl Observer for Failing {
        fn on_areas(&self, areas: &[Area]) -> Result<()> {
            self.calls.fetch_add(areas.len(), Ordering::SeqCst);
            Err(OcrError::InvalidArg("disk full".into()))
        }
    }

    #[test]
    fn test_hook_error_is_swallowed() {
        let observer = Failing { calls: AtomicUsize::new(0) };
        let areas = vec![Area::new(crate::image::geom::Rect::new(0, 0, 2, 2), 4)];
        notify(Some(&observer), "areas", |o| o.on_areas(&areas));
        notify(None, "areas", |o| o.on_areas(&areas));
        assert_eq!(observer.calls.load(Ordering::SeqCst), 1);
    }
}
