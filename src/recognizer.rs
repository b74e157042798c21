//! Entry point tying segmentation, the reference cache and the worker pool
//! together.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info};

use crate::image::geom::{Point, Rect};
use crate::image::image_formats::Pixmap;
use crate::image::pixel_grid::PixelGrid;
use crate::observer::Observer;
use crate::recog::cache::{ReferenceCache, load_or_get};
use crate::recog::engine::recognize;
use crate::recog::result::{OcrResult, OcrResults};
use crate::recog::scheduler::WorkerPool;
use crate::segment::column::ColumnSet;
use crate::segment::detector::{Segmentation, segment};
use crate::segment::selection::{SubImage, sub_images_at, sub_images_in};
use crate::utils::config::Config;
use crate::utils::error::{OcrError, Result};

/// Recognizes Japanese characters in a target image.
///
/// ```ignore
/// use kanji_ocr::{Config, Point, Recognizer};
///
/// let mut ocr = Recognizer::new(Config::default())?;
/// ocr.load_references()?;
/// ocr.set_target_image(&screenshot)?;
/// if let Some(results) = ocr.run_at(Point::new(120, 45))? {
///     println!("{}", results.best_match());
/// }
/// ```
pub struct Recognizer {
    config: Arc<Config>,
    pool: WorkerPool,
    references: Option<Arc<ReferenceCache>>,
    segmentation: Option<Segmentation>,
    observer: Option<Arc<dyn Observer>>,
}

impl Recognizer {
    /// Validates `config` and starts the worker pool.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let pool = WorkerPool::new(config.ocr.threads, config.ocr.queue_capacity)?;
        Ok(Self {
            config: Arc::new(config),
            pool,
            references: None,
            segmentation: None,
            observer: None,
        })
    }

    /// Attaches a diagnostics observer.
    pub fn with_observer(mut self, observer: Arc<dyn Observer>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Uses an already loaded reference cache instead of reading files.
    pub fn with_references(mut self, references: Arc<ReferenceCache>) -> Self {
        self.references = Some(references);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Loads the reference cache now instead of on the first request.
    pub fn load_references(&mut self) -> Result<()> {
        if self.references.is_none() {
            self.references = Some(load_or_get(&self.config)?);
        }
        Ok(())
    }

    /// Segments `image` and keeps it as the target of later requests.
    pub fn set_target_image(&mut self, image: &Pixmap) -> Result<()> {
        let segmentation = segment(image, &self.config, self.observer.as_deref())?;
        self.segmentation = Some(segmentation);
        Ok(())
    }

    /// Columns found in the target image.
    pub fn columns(&self) -> Option<&ColumnSet> {
        self.segmentation.as_ref().map(|s| &s.columns)
    }

    /// Recognizes the characters starting at the one nearest to `point`.
    /// `Ok(None)` if no character is close enough.
    pub fn run_at(&mut self, point: Point) -> Result<Option<OcrResults>> {
        let segmentation = self.segmentation.as_ref().ok_or(OcrError::NoTargetImage)?;
        let sub_images = sub_images_at(
            &segmentation.task.binary,
            &segmentation.columns,
            point,
            self.config.ocr.max_characters,
        )?;
        self.run(sub_images)
    }

    /// Recognizes one character per rectangle. `Ok(None)` for an empty list.
    pub fn run_in(&mut self, rects: &[Rect]) -> Result<Option<OcrResults>> {
        let segmentation = self.segmentation.as_ref().ok_or(OcrError::NoTargetImage)?;
        let sub_images = sub_images_in(&segmentation.task.binary, rects)?;
        self.run(sub_images)
    }

    fn run(&mut self, sub_images: Vec<SubImage>) -> Result<Option<OcrResults>> {
        if sub_images.is_empty() {
            debug!("no characters selected");
            return Ok(None);
        }
        let started = Instant::now();
        self.load_references()?;
        let references = self
            .references
            .clone()
            .ok_or_else(|| OcrError::MissingFont(self.config.primary_font().cache_key()))?;

        let config = Arc::clone(&self.config);
        let observer = self.observer.clone();
        let images: Vec<(usize, PixelGrid)> = sub_images
            .iter()
            .enumerate()
            .map(|(index, sub)| (index, sub.image.clone()))
            .collect();
        let results = self
            .pool
            .map(images, move |(index, image)| {
                recognize(&image, index, &config, &references, observer.as_deref())
            })?
            .into_iter()
            .collect::<Result<Vec<_>>>()?;

        let output = collect_results(&sub_images, &results);
        info!(
            "recognized {} in {} ms",
            output.best_match(),
            started.elapsed().as_millis()
        );
        Ok(Some(output))
    }

    /// Stops the worker pool. Later requests fail.
    pub fn shutdown(&mut self) {
        self.pool.shutdown();
    }
}

impl Drop for Recognizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn collect_results(sub_images: &[SubImage], results: &[Vec<OcrResult>]) -> OcrResults {
    OcrResults {
        characters: results
            .iter()
            .map(|r| r.iter().map(OcrResult::character).collect())
            .collect(),
        scores: results
            .iter()
            .map(|r| r.iter().map(|result| result.score).collect())
            .collect(),
        locations: sub_images.iter().map(|s| s.rect).collect(),
        vertical: sub_images.last().and_then(|s| s.vertical).unwrap_or(true),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requests_need_target_image() {
        let mut ocr = Recognizer::new(Config::default()).unwrap();
        assert!(matches!(ocr.run_at(Point::new(1, 1)), Err(OcrError::NoTargetImage)));
        assert!(matches!(ocr.run_in(&[Rect::new(0, 0, 4, 4)]), Err(OcrError::NoTargetImage)));
        assert!(ocr.columns().is_none());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = Config::default();
        config.fonts.clear();
        assert!(matches!(Recognizer::new(config), Err(OcrError::Config(_))));
    }

    #[test]
    fn test_empty_selection_is_not_an_error() {
        let mut ocr = Recognizer::new(Config::default())
            .unwrap()
            .with_references(Arc::new(ReferenceCache::new()));
        let blank = Pixmap::from_pixel(40, 40, crate::image::image_formats::Pixel::white());
        ocr.set_target_image(&blank).unwrap();
        assert!(ocr.run_at(Point::new(10, 10)).unwrap().is_none());
        assert!(ocr.run_in(&[]).unwrap().is_none());
    }

    #[test]
    fn test_vertical_flag_from_last_image() {
        let image = PixelGrid::new(2, 2).unwrap();
        let sub = |vertical| SubImage {
            image: image.clone(),
            rect: Rect::new(0, 0, 2, 2),
            column: None,
            vertical,
        };
        let results = vec![Vec::new(), Vec::new()];
        assert!(!collect_results(&[sub(Some(true)), sub(Some(false))], &results).vertical);
        assert!(collect_results(&[sub(None)], &results[..1]).vertical);
    }
}
