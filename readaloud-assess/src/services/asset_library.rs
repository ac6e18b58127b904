//! Pre-rendered narration clips
//!
//! Loads the asset manifest, decodes every referenced clip into memory once,
//! and serves a random variant per category. The clip table is immutable
//! after load, so concurrent readers never contend.
//!
//! Loading fails closed: if any category ends up with no usable clip, the
//! whole library is rejected and narration falls back to direct synthesis.

use crate::error::{AssessError, AssessResult};
use crate::models::AssetManifest;
use crate::utils::decode_audio_file;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

/// One decoded mono clip
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub source: PathBuf,
}

impl AudioClip {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// In-memory table of decoded clips per category
pub struct AssetLibrary {
    voice_id: String,
    clips: HashMap<String, Vec<Arc<AudioClip>>>,
    /// Seeded generator for reproducible selection; `None` uses `thread_rng`
    seeded_rng: Option<Mutex<StdRng>>,
}

impl AssetLibrary {
    /// Read and validate the manifest, then decode every variant.
    ///
    /// Relative variant paths resolve against `assets_dir`. Missing or
    /// corrupt files are logged and skipped.
    ///
    /// # Errors
    /// * `AssetLoad` - manifest unreadable or invalid, or a category left
    ///   without any usable clip
    pub fn load(manifest_path: &Path, assets_dir: &Path, seed: Option<u64>) -> AssessResult<Self> {
        let json = std::fs::read_to_string(manifest_path).map_err(|e| {
            AssessError::AssetLoad(format!(
                "Failed to read manifest {}: {}",
                manifest_path.display(),
                e
            ))
        })?;

        let manifest = AssetManifest::from_json(&json).map_err(AssessError::AssetLoad)?;
        Self::from_manifest(manifest, assets_dir, seed)
    }

    /// Decode every clip of an already-parsed manifest
    pub fn from_manifest(manifest: AssetManifest, assets_dir: &Path, seed: Option<u64>) -> AssessResult<Self> {
        manifest.validate().map_err(AssessError::AssetLoad)?;

        let mut clips = HashMap::with_capacity(manifest.categories.len());
        let mut total_clips = 0usize;
        let mut skipped = 0usize;

        for (category, entry) in &manifest.categories {
            let mut loaded = Vec::with_capacity(entry.variants.len());

            for variant in &entry.variants {
                let path = assets_dir.join(variant);
                match decode_audio_file(&path) {
                    Ok(decoded) => loaded.push(Arc::new(AudioClip {
                        samples: decoded.samples,
                        sample_rate: decoded.sample_rate,
                        source: path,
                    })),
                    Err(e) => {
                        skipped += 1;
                        warn!(
                            category = %category,
                            path = %path.display(),
                            error = %e,
                            "Skipping unusable narration asset"
                        );
                    }
                }
            }

            if loaded.is_empty() {
                return Err(AssessError::AssetLoad(format!(
                    "Category '{}' has no usable variants after preload",
                    category
                )));
            }

            total_clips += loaded.len();
            clips.insert(category.clone(), loaded);
        }

        info!(
            voice_id = %manifest.voice_id,
            categories = clips.len(),
            clips = total_clips,
            skipped = skipped,
            "Narration assets loaded"
        );

        Ok(Self {
            voice_id: manifest.voice_id,
            clips,
            seeded_rng: seed.map(|s| Mutex::new(StdRng::seed_from_u64(s))),
        })
    }

    /// Voice the clips were rendered with
    pub fn voice_id(&self) -> &str {
        &self.voice_id
    }

    pub fn has_category(&self, category: &str) -> bool {
        self.clips.get(category).is_some_and(|c| !c.is_empty())
    }

    /// Uniformly random variant of `category`.
    ///
    /// # Errors
    /// * `AssetCategory` - unknown category or no loaded variants
    pub fn pick(&self, category: &str) -> AssessResult<Arc<AudioClip>> {
        let variants = self
            .clips
            .get(category)
            .filter(|v| !v.is_empty())
            .ok_or_else(|| {
                AssessError::AssetCategory(format!("No variants loaded for category '{}'", category))
            })?;

        let chosen = match &self.seeded_rng {
            Some(rng) => {
                let mut rng = rng
                    .lock()
                    .map_err(|_| AssessError::AssetCategory("Variant selector poisoned".to_string()))?;
                variants.choose(&mut *rng)
            }
            None => variants.choose(&mut rand::thread_rng()),
        };

        chosen.cloned().ok_or_else(|| {
            AssessError::AssetCategory(format!("No variants loaded for category '{}'", category))
        })
    }
}
