//! Recognition configuration.
//!
//! A `Config` value is built once (defaults, TOML file or code) and passed by
//! reference to every stage. Nothing reads configuration from global state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::utils::error::{OcrError, Result};

/// Reading direction the segmenter should produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrientationTarget {
    /// Build both hypotheses and pick per region.
    #[default]
    Automatic,
    Vertical,
    Horizontal,
}

/// Expected text color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CharacterColor {
    /// Detect dark background regions and invert them.
    #[default]
    Automatic,
    BlackOnWhite,
    WhiteOnBlack,
}

/// One reference font used to render the glyph cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceFont {
    pub name: String,
    #[serde(default)]
    pub bold: bool,
}

impl ReferenceFont {
    pub fn new(name: impl Into<String>, bold: bool) -> Self {
        Self {
            name: name.into(),
            bold,
        }
    }

    /// Key used for cache lookups and file names.
    pub fn cache_key(&self) -> String {
        if self.bold {
            format!("{} Bold", self.name)
        } else {
            self.name.clone()
        }
    }
}

/// Fixed ink color. When set, a pixel is ink only if every channel lies
/// within `range` of the given level; sharpening and inversion are skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedBlackLevel {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
    pub range: u8,
}

/// Thresholds used by the segmentation pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Channel value below which a pixel counts as ink.
    pub pixel_rgb_threshold: u8,
    pub unsharp_amount: f32,
    pub unsharp_radius: usize,
    pub unsharp_threshold: i32,
    /// Side of the square blocks used for background inversion.
    pub invert_block_size: usize,
    /// Components wider or taller than this are discarded.
    pub max_area_size: i32,
    /// Components with fewer pixels are dropped after noise rejection.
    pub min_area_pixels: i32,
    /// Components above this pixel count must reach `min_sparse_density`.
    pub sparse_area_pixels: i32,
    pub min_sparse_density: f32,
    pub bubble_min_size: i32,
    pub bubble_ellipse_size: f32,
    pub bubble_outside_ratio: f32,
    pub dither_tile_size: i32,
    pub dither_tile_overlap: i32,
    pub dither_cluster_count: usize,
    /// Maximum intensity difference between columns that may be merged.
    pub rgb_max_delta: i32,
    /// Columns this thin or thinner are removed after orientation resolution.
    pub min_column_thickness: i32,
    /// Areas longer than this multiple of the column thickness are split.
    pub split_min_length: f32,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            pixel_rgb_threshold: 140,
            unsharp_amount: 4.0,
            unsharp_radius: 2,
            unsharp_threshold: 2,
            invert_block_size: 15,
            max_area_size: 120,
            min_area_pixels: 3,
            sparse_area_pixels: 300,
            min_sparse_density: 0.09,
            bubble_min_size: 80,
            bubble_ellipse_size: 0.88,
            bubble_outside_ratio: 0.92,
            dither_tile_size: 80,
            dither_tile_overlap: 8,
            dither_cluster_count: 80,
            rgb_max_delta: 100,
            min_column_thickness: 7,
            split_min_length: 1.25,
        }
    }
}

/// Bitmap matching parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    pub black_pixel_score: i32,
    pub white_pixel_score: i32,
    pub base_score: i32,
    /// Penalty per target pixel found in reference halo layer i.
    pub target_halo_scores: Vec<i32>,
    /// Penalty per reference pixel found in target halo layer i.
    pub reference_halo_scores: Vec<i32>,
    pub keep_results_stage1: usize,
    pub keep_results_stage2: usize,
    /// Maximum characters recognized per request.
    pub max_characters: usize,
    pub threads: usize,
    /// Size of the glyph inside the 32×32 matrix.
    pub target_size: i32,
    /// Number of halo layers, the last one absorbing all remaining pixels.
    pub halo_size: usize,
    pub queue_capacity: usize,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            black_pixel_score: 4,
            white_pixel_score: 4,
            base_score: 1000,
            target_halo_scores: vec![-1, -5, -12],
            reference_halo_scores: vec![-1, -4, -10],
            keep_results_stage1: 30,
            keep_results_stage2: 10,
            max_characters: 4,
            threads: 4,
            target_size: 30,
            halo_size: 3,
            queue_capacity: 10,
        }
    }
}

/// Complete recognition configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub orientation: OrientationTarget,
    pub color: CharacterColor,
    pub cache_dir: PathBuf,
    /// Primary font first, secondary fonts after it.
    pub fonts: Vec<ReferenceFont>,
    /// Characters held by the reference cache. Part of the cache file name.
    pub characters: String,
    pub fixed_black_level: Option<FixedBlackLevel>,
    pub segmentation: SegmentationConfig,
    pub ocr: OcrConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            orientation: OrientationTarget::default(),
            color: CharacterColor::default(),
            cache_dir: PathBuf::from("cache"),
            fonts: vec![
                ReferenceFont::new("MS Gothic", false),
                ReferenceFont::new("MS Gothic", true),
            ],
            characters: default_characters(),
            fixed_black_level: None,
            segmentation: SegmentationConfig::default(),
            ocr: OcrConfig::default(),
        }
    }
}

/// Hiragana and katakana.
fn default_characters() -> String {
    ('\u{3041}'..='\u{3096}').chain('\u{30A1}'..='\u{30FA}').collect()
}

impl Config {
    /// Parses a TOML document. Missing keys keep their default values.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.fonts.is_empty() {
            return Err(OcrError::Config("at least one reference font is required".into()));
        }
        if self.characters.is_empty() {
            return Err(OcrError::Config("character set is empty".into()));
        }
        if self.ocr.threads == 0 {
            return Err(OcrError::Config("ocr.threads must be positive".into()));
        }
        if self.ocr.queue_capacity == 0 {
            return Err(OcrError::Config("ocr.queue_capacity must be positive".into()));
        }
        if self.ocr.halo_size == 0 {
            return Err(OcrError::Config("ocr.halo_size must be at least 1".into()));
        }
        if self.ocr.target_size < 8 || self.ocr.target_size > 32 {
            return Err(OcrError::Config(format!(
                "ocr.target_size {} outside 8..=32",
                self.ocr.target_size
            )));
        }
        if self.ocr.target_halo_scores.len() < self.ocr.halo_size
            || self.ocr.reference_halo_scores.len() < self.ocr.halo_size
        {
            return Err(OcrError::Config(format!(
                "halo score arrays must hold {} entries",
                self.ocr.halo_size
            )));
        }
        if self.segmentation.invert_block_size == 0 {
            return Err(OcrError::Config("segmentation.invert_block_size must be positive".into()));
        }
        Ok(())
    }

    /// The primary reference font.
    pub fn primary_font(&self) -> &ReferenceFont {
        &self.fonts[0]
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Config::from_toml_str(&content)
}

/// Save configuration to file
pub fn save_config(config: &Config, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.segmentation.pixel_rgb_threshold, 140);
        assert_eq!(config.ocr.target_halo_scores, vec![-1, -5, -12]);
        assert_eq!(config.primary_font().cache_key(), "MS Gothic");
        assert_eq!(config.fonts[1].cache_key(), "MS Gothic Bold");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = Config::from_toml_str(
            r#"
orientation = "vertical"

[ocr]
threads = 2
"#,
        )
        .unwrap();
        assert_eq!(config.orientation, OrientationTarget::Vertical);
        assert_eq!(config.ocr.threads, 2);
        assert_eq!(config.ocr.keep_results_stage1, 30);
        assert_eq!(config.segmentation.rgb_max_delta, 100);
    }

    #[test]
    fn test_roundtrip_file() {
        let mut config = Config::default();
        config.color = CharacterColor::WhiteOnBlack;
        config.fixed_black_level = Some(FixedBlackLevel {
            red: 10,
            green: 20,
            blue: 30,
            range: 50,
        });
        let file = NamedTempFile::new().unwrap();
        save_config(&config, file.path()).unwrap();
        let loaded = load_config(file.path()).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let result = Config::from_toml_str("[ocr]\nthreads = 0\n");
        assert!(matches!(result, Err(OcrError::Config(_))));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let mut temp_file = NamedTempFile::new().unwrap();
        writeln!(temp_file, "this is not valid toml {{{{").unwrap();
        let result = load_config(temp_file.path());
        assert!(matches!(result, Err(OcrError::Config(_))));
    }

    #[test]
    fn test_load_config_missing_file() {
        let result = load_config(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(OcrError::Io(_))));
    }
}
