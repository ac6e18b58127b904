//! Narration asset fixtures

use super::audio_generator::{generate_test_wav, AudioConfig};
use std::path::{Path, PathBuf};

fn tone(dir: &Path, relative: &str, frequency: f32) {
    let path = dir.join(relative);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    generate_test_wav(
        &path,
        &AudioConfig {
            duration_seconds: 0.2,
            sample_rate: 22050,
            frequency,
            ..Default::default()
        },
    )
    .unwrap();
}

/// Write clips for every category plus a manifest; returns the manifest path.
///
/// With `include_closing = false` the manifest has no `closing` category.
pub fn write_assets(assets_dir: &Path, include_closing: bool) -> PathBuf {
    tone(assets_dir, "perfect/perfect_1.wav", 660.0);
    tone(assets_dir, "perfect/perfect_2.wav", 880.0);
    tone(assets_dir, "intro/intro_1.wav", 330.0);
    tone(assets_dir, "closing/closing_1.wav", 550.0);

    let closing = if include_closing {
        r#", "closing": { "variants": ["closing/closing_1.wav"] }"#
    } else {
        ""
    };

    let manifest = format!(
        r#"{{
    "voiceId": "Kore",
    "categories": {{
        "perfect": {{ "variants": ["perfect/perfect_1.wav", "perfect/perfect_2.wav"] }},
        "needs-work-intro": {{ "variants": ["intro/intro_1.wav"] }}{}
    }}
}}"#,
        closing
    );

    let manifest_path = assets_dir.join("manifest.json");
    std::fs::write(&manifest_path, manifest).unwrap();
    manifest_path
}
