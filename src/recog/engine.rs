//! Three-stage recognition of a single glyph image.

use std::time::Instant;

use log::{debug, trace};

use crate::image::pixel_grid::PixelGrid;
use crate::observer::{Observer, notify};
use crate::recog::align::{align_candidates, align_characters};
use crate::recog::cache::ReferenceCache;
use crate::recog::refine::refine_components;
use crate::recog::result::{OcrResult, sort_results};
use crate::recog::transform::TargetTransformer;
use crate::utils::config::Config;
use crate::utils::error::Result;

/// Recognizes the glyph in `image`, returning candidates best first.
///
/// 1. Small moves against the primary font.
/// 2. Wider moves and stretches against all fonts, limited to the stage 1
///    characters.
/// 3. Per-component refinement of the stage 2 survivors.
pub fn recognize(
    image: &PixelGrid,
    char_index: usize,
    config: &Config,
    cache: &ReferenceCache,
    observer: Option<&dyn Observer>,
) -> Result<Vec<OcrResult>> {
    let started = Instant::now();
    let ocr = &config.ocr;
    let mut transformer = TargetTransformer::new(image, config, char_index)?;

    let targets = transformer.targets(1, 1, 1)?;
    let primary = cache.get(&config.primary_font().cache_key())?;
    let stage1 = align_characters(&targets, primary, ocr, ocr.keep_results_stage1);
    notify(observer, "ocr stage 1", |o| o.on_ocr_stage(1, char_index, &stage1));
    trace!("character {} stage 1: {} targets, {} results", char_index, targets.len(), stage1.len());

    let targets = transformer.targets(2, 2, 4)?;
    let fonts = config
        .fonts
        .iter()
        .map(|font| cache.get(&font.cache_key()))
        .collect::<Result<Vec<_>>>()?;
    let stage2 = align_candidates(&targets, &fonts, &stage1, ocr, ocr.keep_results_stage2);
    notify(observer, "ocr stage 2", |o| o.on_ocr_stage(2, char_index, &stage2));
    trace!("character {} stage 2: {} targets, {} results", char_index, targets.len(), stage2.len());

    let mut stage3 = stage2
        .iter()
        .map(|result| refine_components(result, ocr))
        .collect::<Result<Vec<_>>>()?;
    sort_results(&mut stage3);
    notify(observer, "ocr stage 3", |o| o.on_ocr_stage(3, char_index, &stage3));

    debug!(
        "character {} recognized as {:?} in {} ms",
        char_index,
        stage3.first().map(OcrResult::character),
        started.elapsed().as_millis()
    );
    Ok(stage3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recog::cache::ReferenceCacheBuilder;
    use crate::recog::transform::Transformation;
    use crate::utils::error::OcrError;
    use std::sync::Mutex;

    fn glyph(rects: &[(usize, usize, usize, usize)]) -> PixelGrid {
        PixelGrid::from_fn(24, 24, |x, y| {
            rects
                .iter()
                .any(|&(rx, ry, w, h)| (rx..rx + w).contains(&x) && (ry..ry + h).contains(&y))
        })
        .unwrap()
    }

    fn cache_with(config: &Config, glyphs: &[(char, PixelGrid)]) -> ReferenceCache {
        let mut cache = ReferenceCache::new();
        for font in &config.fonts {
            let mut builder = ReferenceCacheBuilder::new(font, config);
            for (character, image) in glyphs {
                let mut transformer = TargetTransformer::new(image, config, 0).unwrap();
                let target = transformer.transform(Transformation::default()).unwrap();
                builder.add(*character, target.bitmap.matrix);
            }
            cache.insert(font.cache_key(), builder.build());
        }
        cache
    }

    #[derive(Default)]
    struct Stages(Mutex<Vec<(u8, usize)>>);

    impl Observer for Stages {
        fn on_ocr_stage(&self, stage: u8, _character: usize, results: &[OcrResult]) -> Result<()> {
            self.0.lock().unwrap().push((stage, results.len()));
            Ok(())
        }
    }

    #[test]
    fn test_exact_glyph_wins() {
        let config = Config::default();
        let cross = glyph(&[(2, 10, 20, 4), (10, 2, 4, 20)]);
        let bars = glyph(&[(2, 4, 20, 3), (2, 16, 20, 3)]);
        let cache = cache_with(&config, &[('十', cross.clone()), ('二', bars)]);

        let stages = Stages::default();
        let results = recognize(&cross, 3, &config, &cache, Some(&stages)).unwrap();
        assert_eq!(results[0].character(), '十');
        assert_eq!(results[0].char_index(), 3);
        assert!(results[0].overlap.target_halo.iter().all(|&c| c == 0));
        assert!(results[0].overlap.reference_halo.iter().all(|&c| c == 0));
        assert_eq!(*stages.0.lock().unwrap(), vec![(1, 2), (2, 2), (3, 2)]);
    }

    #[test]
    fn test_missing_font_in_cache() {
        let config = Config::default();
        let cache = ReferenceCache::new();
        let result = recognize(&glyph(&[(2, 2, 10, 10)]), 0, &config, &cache, None);
        assert!(matches!(result, Err(OcrError::MissingFont(_))));
    }
}
