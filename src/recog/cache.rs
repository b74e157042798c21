//! Persistent cache of reference glyph matrices.
//!
//! One file is written per reference font. Its name is derived from the font,
//! the target size, the halo size and the character set, so a change in any
//! of them points the loader to a different file.
//!
//! File layout (big endian):
//!
//! ```text
//! "KOCR" | version u16 | font string | record count u32
//! record: char u32 | score modifier f32 | pixels u32 | 32 rows
//!         | halo count u8 | halo rows ...
//!         | component count u16 | (bounds, pixels u32, 32 rows) ...
//! ```

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Instant;

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use log::{debug, info};

use crate::image::matrix32::Matrix32;
use crate::recog::components::build_components;
use crate::recog::reference::{Component, HaloMatrix, ReferenceMatrix};
use crate::utils::bytes_ext::{ReadCacheExt, WriteCacheExt};
use crate::utils::config::{Config, ReferenceFont};
use crate::utils::error::{OcrError, Result};

const MAGIC: &[u8; 4] = b"KOCR";
const VERSION: u16 = 1;

/// Reference matrices of every loaded font.
#[derive(Debug, Default)]
pub struct ReferenceCache {
    fonts: HashMap<String, Vec<Arc<ReferenceMatrix>>>,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, font: impl Into<String>, references: Vec<ReferenceMatrix>) {
        self.fonts
            .insert(font.into(), references.into_iter().map(Arc::new).collect());
    }

    /// References rendered with `font`.
    pub fn get(&self, font: &str) -> Result<&[Arc<ReferenceMatrix>]> {
        self.fonts
            .get(font)
            .map(Vec::as_slice)
            .ok_or_else(|| OcrError::MissingFont(font.to_string()))
    }

    pub fn fonts(&self) -> impl Iterator<Item = &str> {
        self.fonts.keys().map(String::as_str)
    }

    /// Total number of references over all fonts.
    pub fn len(&self) -> usize {
        self.fonts.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reads the cache files of every configured font.
    pub fn load(config: &Config) -> Result<Self> {
        let started = Instant::now();
        let mut cache = Self::new();
        for font in &config.fonts {
            let path = cache_path(config, font);
            if !path.exists() {
                return Err(OcrError::MissingCache { path });
            }
            info!("Loading references from {}", path.display());
            let mut reader = BufReader::new(File::open(&path)?);
            let (name, references) = read_references(&mut reader)?;
            if name != font.cache_key() {
                return Err(OcrError::CorruptCache(format!(
                    "{} holds font {}, expected {}",
                    path.display(),
                    name,
                    font.cache_key()
                )));
            }
            cache.insert(name, references);
        }
        debug!("Reference cache loaded in {} ms", started.elapsed().as_millis());
        Ok(cache)
    }
}

/// Loads the cache for `config` on first use and shares it afterwards.
/// Configurations that resolve to the same files share one cache.
pub fn load_or_get(config: &Config) -> Result<Arc<ReferenceCache>> {
    static CACHES: OnceLock<Mutex<HashMap<Vec<PathBuf>, Arc<ReferenceCache>>>> = OnceLock::new();

    let key: Vec<PathBuf> = config.fonts.iter().map(|f| cache_path(config, f)).collect();
    let caches = CACHES.get_or_init(|| Mutex::new(HashMap::new()));
    let mut guard = match caches.lock() {
        Ok(g) => g,
        Err(poisoned) => poisoned.into_inner(),
    };
    if let Some(cache) = guard.get(&key) {
        return Ok(Arc::clone(cache));
    }
    let cache = Arc::new(ReferenceCache::load(config)?);
    guard.insert(key, Arc::clone(&cache));
    Ok(cache)
}

/// Mixes the bits of `h` so nearby inputs spread over the whole range.
fn smear(h: i32) -> i32 {
    let h = h as u32;
    let h = h ^ (h >> 20) ^ (h >> 12);
    (h ^ (h >> 7) ^ (h >> 4)) as i32
}

/// Polynomial string hash over UTF-16 units.
fn string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(unit as i32))
}

/// Cache file name for one font.
pub fn cache_file_name(font: &str, target_size: i32, halo_size: usize, characters: &str) -> String {
    let mut hash = smear(string_hash(font));
    hash = hash.wrapping_add(smear(target_size.wrapping_mul(1000)));
    hash = hash.wrapping_add(smear((halo_size as i32).wrapping_mul(1_000_000)));
    for unit in characters.encode_utf16() {
        hash = hash.wrapping_add(smear(unit as i32));
    }
    format!("CHARACTERS_{:X}.cache", hash as u32)
}

/// Full path of the cache file of `font`.
pub fn cache_path(config: &Config, font: &ReferenceFont) -> PathBuf {
    config.cache_dir.join(cache_file_name(
        &font.cache_key(),
        config.ocr.target_size,
        config.ocr.halo_size,
        &config.characters,
    ))
}

fn corrupt(err: io::Error) -> OcrError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => OcrError::CorruptCache("file is truncated".into()),
        io::ErrorKind::InvalidData => OcrError::CorruptCache(err.to_string()),
        _ => OcrError::Io(err),
    }
}

/// Serializes the references of one font.
pub fn write_references<W: Write>(writer: &mut W, font: &str, references: &[ReferenceMatrix]) -> Result<()> {
    writer.write_all(MAGIC)?;
    writer.write_u16::<BigEndian>(VERSION)?;
    writer.write_string(font)?;
    writer.write_u32::<BigEndian>(references.len() as u32)?;
    for reference in references {
        writer.write_u32::<BigEndian>(reference.character as u32)?;
        writer.write_f32::<BigEndian>(reference.score_modifier)?;
        writer.write_u32::<BigEndian>(reference.bitmap.pixels)?;
        writer.write_matrix(&reference.bitmap.matrix)?;
        writer.write_u8(reference.bitmap.halo.len() as u8)?;
        for layer in &reference.bitmap.halo {
            writer.write_matrix(layer)?;
        }
        writer.write_u16::<BigEndian>(reference.components.len() as u16)?;
        for component in &reference.components {
            writer.write_rect(&component.bounds)?;
            writer.write_u32::<BigEndian>(component.pixels)?;
            writer.write_matrix(&component.matrix)?;
        }
    }
    Ok(())
}

/// Reads a file written by [`write_references`], returning the font name
/// and its references.
pub fn read_references<R: Read>(reader: &mut R) -> Result<(String, Vec<ReferenceMatrix>)> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(corrupt)?;
    if &magic != MAGIC {
        return Err(OcrError::CorruptCache(format!("bad magic {:?}", magic)));
    }
    let version = reader.read_u16::<BigEndian>().map_err(corrupt)?;
    if version != VERSION {
        return Err(OcrError::CorruptCache(format!("unsupported version {}", version)));
    }
    let font = reader.read_string().map_err(corrupt)?;
    let count = reader.read_u32::<BigEndian>().map_err(corrupt)?;

    let mut references = Vec::with_capacity(count.min(1 << 16) as usize);
    for _ in 0..count {
        references.push(read_record(reader, &font)?);
    }
    Ok((font, references))
}

fn read_record<R: Read>(reader: &mut R, font: &str) -> Result<ReferenceMatrix> {
    let code = reader.read_u32::<BigEndian>().map_err(corrupt)?;
    let character = char::from_u32(code)
        .ok_or_else(|| OcrError::CorruptCache(format!("invalid character code {:#x}", code)))?;
    let score_modifier = reader.read_f32::<BigEndian>().map_err(corrupt)?;
    let pixels = reader.read_u32::<BigEndian>().map_err(corrupt)?;
    let matrix = reader.read_matrix().map_err(corrupt)?;
    if matrix.count_ones() != pixels {
        return Err(OcrError::CorruptCache(format!(
            "pixel count mismatch for {}",
            character
        )));
    }

    let layers = reader.read_u8().map_err(corrupt)?;
    let mut halo = Vec::with_capacity(layers as usize);
    for _ in 0..layers {
        halo.push(reader.read_matrix().map_err(corrupt)?);
    }

    let component_count = reader.read_u16::<BigEndian>().map_err(corrupt)?;
    let mut components = Vec::with_capacity(component_count as usize);
    for _ in 0..component_count {
        let bounds = reader.read_rect().map_err(corrupt)?;
        let pixels = reader.read_u32::<BigEndian>().map_err(corrupt)?;
        let matrix = reader.read_matrix().map_err(corrupt)?;
        components.push(Component { bounds, matrix, pixels });
    }

    Ok(ReferenceMatrix {
        character,
        bitmap: HaloMatrix { matrix, halo, pixels },
        score_modifier,
        font: font.to_string(),
        components,
    })
}

struct Glyph {
    character: char,
    matrix: Matrix32,
    score_modifier: f32,
}

/// Builds the reference file of one font from rendered 32×32 glyphs.
pub struct ReferenceCacheBuilder {
    font: String,
    halo_layers: usize,
    glyphs: Vec<Glyph>,
}

impl ReferenceCacheBuilder {
    pub fn new(font: &ReferenceFont, config: &Config) -> Self {
        Self {
            font: font.cache_key(),
            halo_layers: config.ocr.halo_size.saturating_sub(1),
            glyphs: Vec::new(),
        }
    }

    /// Adds a glyph with the neutral score modifier.
    pub fn add(&mut self, character: char, matrix: Matrix32) -> &mut Self {
        self.add_with_modifier(character, matrix, 1.0)
    }

    /// Adds a glyph. Characters already added are ignored.
    pub fn add_with_modifier(&mut self, character: char, matrix: Matrix32, score_modifier: f32) -> &mut Self {
        if !self.glyphs.iter().any(|g| g.character == character) {
            self.glyphs.push(Glyph {
                character,
                matrix,
                score_modifier,
            });
        }
        self
    }

    /// Computes halo layers and components of every glyph.
    pub fn build(&self) -> Vec<ReferenceMatrix> {
        #[cfg(feature = "rayon")]
        {
            use rayon::prelude::*;
            self.glyphs.par_iter().map(|g| self.reference(g)).collect()
        }
        #[cfg(not(feature = "rayon"))]
        {
            self.glyphs.iter().map(|g| self.reference(g)).collect()
        }
    }

    fn reference(&self, glyph: &Glyph) -> ReferenceMatrix {
        ReferenceMatrix {
            character: glyph.character,
            bitmap: HaloMatrix::new(glyph.matrix, self.halo_layers),
            score_modifier: glyph.score_modifier,
            font: self.font.clone(),
            components: build_components(&glyph.matrix),
        }
    }

    /// Builds the references and writes them to `path`.
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let references = self.build();
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let mut writer = BufWriter::new(File::create(path)?);
        write_references(&mut writer, &self.font, &references)?;
        writer.flush()?;
        info!("{} references for {} written to {}", references.len(), self.font, path.display());
        Ok(())
    }

    /// Writes the cache file the loader expects for this font and `config`.
    pub fn write(&self, font: &ReferenceFont, config: &Config) -> Result<PathBuf> {
        let path = cache_path(config, font);
        self.write_to(&path)?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn glyph(x: i32, width: i32) -> Matrix32 {
        let mut m = Matrix32::new();
        for y in 2..28 {
            for xx in x..x + width {
                m.set(xx, y);
            }
        }
        m
    }

    #[test]
    fn test_smear() {
        assert_eq!(smear(0), 0);
        assert_eq!(smear(1 << 20), 0x0011_2113);
        // shifts are unsigned
        assert_eq!(smear(-1) as u32, 0xf1f0_ef1f);
    }

    #[test]
    fn test_string_hash() {
        assert_eq!(string_hash(""), 0);
        assert_eq!(string_hash("a"), 97);
        assert_eq!(string_hash("ab"), 97 * 31 + 98);
    }

    #[test]
    fn test_file_name_depends_on_inputs() {
        let name = cache_file_name("MS Gothic", 30, 3, "あい");
        assert!(name.starts_with("CHARACTERS_"));
        assert!(name.ends_with(".cache"));
        assert_eq!(name, cache_file_name("MS Gothic", 30, 3, "あい"));
        assert_ne!(name, cache_file_name("MS Gothic Bold", 30, 3, "あい"));
        assert_ne!(name, cache_file_name("MS Gothic", 28, 3, "あい"));
        assert_ne!(name, cache_file_name("MS Gothic", 30, 3, "あ"));
        let hex = &name["CHARACTERS_".len()..name.len() - ".cache".len()];
        assert_eq!(hex, hex.to_uppercase());
    }

    #[test]
    fn test_builder_skips_duplicates() {
        let config = Config::default();
        let mut builder = ReferenceCacheBuilder::new(config.primary_font(), &config);
        builder.add('一', glyph(4, 3)).add('一', glyph(8, 3)).add('二', glyph(10, 2));
        let refs = builder.build();
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].bitmap.pixels, 78);
        assert_eq!(refs[0].bitmap.halo.len(), 2);
        assert_eq!(refs[0].components.len(), 1);
    }

    #[test]
    fn test_bad_magic() {
        let mut cursor = Cursor::new(b"DJVU\x00\x01".to_vec());
        assert!(matches!(read_references(&mut cursor), Err(OcrError::CorruptCache(_))));
    }

    #[test]
    fn test_truncated_record() {
        let config = Config::default();
        let mut builder = ReferenceCacheBuilder::new(config.primary_font(), &config);
        builder.add('一', glyph(4, 3));
        let mut buf = Vec::new();
        write_references(&mut buf, "MS Gothic", &builder.build()).unwrap();
        buf.truncate(buf.len() - 10);
        let result = read_references(&mut Cursor::new(buf));
        assert!(matches!(result, Err(OcrError::CorruptCache(_))));
    }

    #[test]
    fn test_missing_font() {
        let cache = ReferenceCache::new();
        assert!(matches!(cache.get("Meiryo"), Err(OcrError::MissingFont(f)) if f == "Meiryo"));
    }

    #[test]
    fn test_missing_cache_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        assert!(matches!(ReferenceCache::load(&config), Err(OcrError::MissingCache { .. })));
    }
}
