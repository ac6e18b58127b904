//! Narration asset manifest
//!
//! ```json
//! { "voiceId": "Kore",
//!   "categories": { "perfect": { "variants": ["perfect/1.wav"] } } }
//! ```
//! Variant paths are relative to the assets root directory.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Celebration for an error-free reading
pub const CATEGORY_PERFECT: &str = "perfect";
/// Encouraging lead-in before corrections
pub const CATEGORY_NEEDS_WORK_INTRO: &str = "needs-work-intro";
/// Positive ending after corrections
pub const CATEGORY_CLOSING: &str = "closing";

/// Categories the narration composer picks from
pub const REQUIRED_CATEGORIES: [&str; 3] =
    [CATEGORY_PERFECT, CATEGORY_NEEDS_WORK_INTRO, CATEGORY_CLOSING];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryEntry {
    pub variants: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetManifest {
    pub voice_id: String,
    pub categories: BTreeMap<String, CategoryEntry>,
}

impl AssetManifest {
    /// Parse and validate manifest JSON
    pub fn from_json(json: &str) -> Result<Self, String> {
        let manifest: AssetManifest =
            serde_json::from_str(json).map_err(|e| format!("Malformed manifest: {}", e))?;
        manifest.validate()?;
        Ok(manifest)
    }

    /// Every category must list at least one variant, and every required
    /// category must be present.
    pub fn validate(&self) -> Result<(), String> {
        for (name, entry) in &self.categories {
            if entry.variants.is_empty() {
                return Err(format!("Category '{}' has no variants", name));
            }
        }

        for required in REQUIRED_CATEGORIES {
            if !self.categories.contains_key(required) {
                return Err(format!("Manifest missing required category '{}'", required));
            }
        }

        Ok(())
    }
}
