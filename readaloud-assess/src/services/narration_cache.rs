//! Disk-backed narration cache
//!
//! Maps (trimmed text, voice id) to synthesized WAV bytes. Entries live as
//! `<sha256>.wav` files in the cache directory and survive restarts; the
//! in-memory index is rebuilt from the directory on open.
//!
//! **Concurrency:**
//! - Hits take the index read lock and bump an atomic recency tick
//! - Insert + evict take the write lock
//! - Files are written to a temp name and renamed, so a reader never sees
//!   partial data
//!
//! Total size is kept at or below the configured ceiling by evicting the
//! least recently used entries. The entry just inserted is never evicted, so
//! the ceiling can be exceeded by at most that one entry.

use crate::error::{AssessError, AssessResult};
use crate::services::gemini_client::SpeechSynthesizer;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "wav";
const TEMP_MARKER: &str = ".tmp-";

/// Content address of a narration clip
pub fn cache_key(text: &str, voice_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.trim().as_bytes());
    hasher.update([0u8]);
    hasher.update(voice_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[derive(Debug)]
struct CacheEntry {
    size: u64,
    last_access: AtomicU64,
}

#[derive(Debug, Default)]
struct CacheIndex {
    entries: HashMap<String, CacheEntry>,
    total_bytes: u64,
}

impl CacheIndex {
    fn insert(&mut self, key: String, size: u64, tick: u64) {
        let entry = CacheEntry {
            size,
            last_access: AtomicU64::new(tick),
        };
        if let Some(previous) = self.entries.insert(key, entry) {
            self.total_bytes = self.total_bytes.saturating_sub(previous.size);
        }
        self.total_bytes += size;
    }

    fn remove(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.total_bytes = self.total_bytes.saturating_sub(entry.size);
        Some(entry)
    }

    /// Evict LRU entries (never `keep`) until within `max_bytes`; returns evicted keys
    fn evict_to(&mut self, max_bytes: u64, keep: Option<&str>) -> Vec<String> {
        let mut evicted = Vec::new();

        while self.total_bytes > max_bytes {
            let victim = self
                .entries
                .iter()
                .filter(|(key, _)| Some(key.as_str()) != keep)
                .min_by_key(|(_, entry)| entry.last_access.load(Ordering::Relaxed))
                .map(|(key, _)| key.clone());

            match victim {
                Some(key) => {
                    self.remove(&key);
                    evicted.push(key);
                }
                None => break,
            }
        }

        evicted
    }
}

/// Cache occupancy snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: u64,
}

/// Size-bounded, content-addressed cache of synthesized narration
pub struct NarrationCache {
    dir: PathBuf,
    max_bytes: u64,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    style_hint: String,
    index: RwLock<CacheIndex>,
    tick: AtomicU64,
}

impl NarrationCache {
    /// Open (creating if needed) the cache directory and rebuild the index.
    ///
    /// Recency of existing entries follows file modification time. Leftover
    /// temp files are removed and the ceiling is enforced before returning.
    pub fn open(
        dir: &Path,
        max_bytes: u64,
        synthesizer: Arc<dyn SpeechSynthesizer>,
        style_hint: impl Into<String>,
    ) -> AssessResult<Self> {
        std::fs::create_dir_all(dir)?;

        let mut found: Vec<(String, u64, SystemTime)> = Vec::new();
        for dir_entry in std::fs::read_dir(dir)? {
            let dir_entry = dir_entry?;
            let path = dir_entry.path();
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if file_name.contains(TEMP_MARKER) {
                if let Err(e) = std::fs::remove_file(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale temp file");
                }
                continue;
            }

            let Some(key) = entry_key(&path) else {
                continue;
            };

            let metadata = dir_entry.metadata()?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH);
            found.push((key, metadata.len(), modified));
        }

        found.sort_by_key(|(_, _, modified)| *modified);

        let mut index = CacheIndex::default();
        let mut tick = 0u64;
        for (key, size, _) in found {
            tick += 1;
            index.insert(key, size, tick);
        }

        let evicted = index.evict_to(max_bytes, None);
        for key in &evicted {
            remove_entry_file(dir, key);
        }

        info!(
            dir = %dir.display(),
            entries = index.entries.len(),
            total_bytes = index.total_bytes,
            max_bytes = max_bytes,
            evicted = evicted.len(),
            "Narration cache opened"
        );

        Ok(Self {
            dir: dir.to_path_buf(),
            max_bytes,
            synthesizer,
            style_hint: style_hint.into(),
            index: RwLock::new(index),
            tick: AtomicU64::new(tick),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn max_bytes(&self) -> u64 {
        self.max_bytes
    }

    pub fn stats(&self) -> CacheStats {
        match self.index.read() {
            Ok(index) => CacheStats {
                entries: index.entries.len(),
                total_bytes: index.total_bytes,
            },
            Err(poisoned) => {
                let index = poisoned.into_inner();
                CacheStats {
                    entries: index.entries.len(),
                    total_bytes: index.total_bytes,
                }
            }
        }
    }

    /// True when (text, voice) is indexed
    pub fn contains(&self, text: &str, voice_id: &str) -> bool {
        let key = cache_key(text, voice_id);
        self.index
            .read()
            .map(|index| index.entries.contains_key(&key))
            .unwrap_or(false)
    }

    /// Cached WAV bytes for (text, voice), synthesizing and storing on a miss.
    ///
    /// # Errors
    /// * `TtsGeneration` - empty text or synthesis failure (nothing is cached)
    pub async fn get_or_generate(&self, text: &str, voice_id: &str) -> AssessResult<Vec<u8>> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssessError::TtsGeneration("Narration text is empty".to_string()));
        }

        let key = cache_key(text, voice_id);

        if let Some(bytes) = self.read_hit(&key).await {
            debug!(key = %key, bytes = bytes.len(), cache_hit = true, "Narration cache hit");
            return Ok(bytes);
        }

        debug!(key = %key, cache_hit = false, "Narration cache miss");

        let audio = self.synthesizer.synthesize(text, voice_id, &self.style_hint).await?;
        let wav = audio.to_wav()?;

        if let Err(e) = self.store(&key, &wav).await {
            warn!(key = %key, error = %e, "Failed to store narration in cache");
        }

        Ok(wav)
    }

    fn next_tick(&self) -> u64 {
        self.tick.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        entry_path(&self.dir, key)
    }

    async fn read_hit(&self, key: &str) -> Option<Vec<u8>> {
        let indexed = {
            let index = self.index.read().ok()?;
            match index.entries.get(key) {
                Some(entry) => {
                    entry.last_access.store(self.next_tick(), Ordering::Relaxed);
                    true
                }
                None => false,
            }
        };
        if !indexed {
            return None;
        }

        match tokio::fs::read(self.entry_path(key)).await {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                // File vanished underneath the index; forget it and regenerate
                warn!(key = %key, error = %e, "Cached narration unreadable; dropping entry");
                if let Ok(mut index) = self.index.write() {
                    index.remove(key);
                }
                None
            }
        }
    }

    async fn store(&self, key: &str, wav: &[u8]) -> AssessResult<()> {
        let final_path = self.entry_path(key);
        let temp_path = self
            .dir
            .join(format!("{}{}{:016x}", key, TEMP_MARKER, rand::random::<u64>()));

        tokio::fs::write(&temp_path, wav).await?;

        // Rename, index update and eviction deletes share one write-lock
        // section, so no store can delete a file another store just committed
        let committed = match self.index.write() {
            Ok(mut index) => match std::fs::rename(&temp_path, &final_path) {
                Ok(()) => {
                    let tick = self.next_tick();
                    index.insert(key.to_string(), wav.len() as u64, tick);
                    let evicted = index.evict_to(self.max_bytes, Some(key));
                    for victim in &evicted {
                        remove_entry_file(&self.dir, victim);
                    }
                    Ok(evicted)
                }
                Err(e) => Err(AssessError::from(e)),
            },
            Err(_) => Err(AssessError::TtsGeneration(
                "Narration cache index poisoned".to_string(),
            )),
        };

        let evicted = match committed {
            Ok(evicted) => evicted,
            Err(e) => {
                let _ = tokio::fs::remove_file(&temp_path).await;
                return Err(e);
            }
        };

        if !evicted.is_empty() {
            let stats = self.stats();
            info!(
                evicted = evicted.len(),
                entries = stats.entries,
                total_bytes = stats.total_bytes,
                "Narration cache evicted entries"
            );
        }

        Ok(())
    }
}

fn entry_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
}

/// Key for a `<64 hex>.wav` file name, `None` for anything else
fn entry_key(path: &Path) -> Option<String> {
    if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    if stem.len() == 64 && stem.chars().all(|c| c.is_ascii_hexdigit()) {
        Some(stem.to_string())
    } else {
        None
    }
}

fn remove_entry_file(dir: &Path, key: &str) {
    let path = entry_path(dir, key);
    if let Err(e) = std::fs::remove_file(&path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "Failed to delete evicted narration");
        }
    }
}
