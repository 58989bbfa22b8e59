//! Metadata Cache Module
//!
//! Two-tier cache for extracted dependency metadata, so unchanged files are
//! not parsed again across runs.
//!
//! Cache structure:
//! - memory tier: LRU with per-entry expiry, shared by all batch workers
//! - disk tier: `<cache_dir>/<key>.bin`, one bincode `CacheRecord` per key
//!
//! The key is derived from the file path and its modification time, so
//! editing a file orphans its old entry instead of serving stale data.
//! Orphans stay on disk until `clear` is called.

use std::fs::{self, File};
use std::io::{Read, Write};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::config::AnalyzerConfig;
use crate::common::error::CacheError;
use crate::domain::metadata::DependencyMetadata;

const RECORD_EXTENSION: &str = "bin";
// staging files for atomic record writes
const STAGING_PREFIX: &str = ".record-";
const SECONDS_PER_DAY: u64 = 24 * 60 * 60;

/// Modification time of a source file, as stored in the key and the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub secs: u64,
    pub nanos: u32,
}

impl FileStamp {
    pub fn of(path: &Path) -> Result<Self, CacheError> {
        let io_err = |source| CacheError::Io {
            path: path.to_path_buf(),
            source,
        };
        let modified = fs::metadata(path).and_then(|m| m.modified()).map_err(io_err)?;
        let since_epoch = modified.duration_since(UNIX_EPOCH).unwrap_or_default();
        Ok(Self {
            secs: since_epoch.as_secs(),
            nanos: since_epoch.subsec_nanos(),
        })
    }
}

/// Opaque content-derived cache key (BLAKE3 hex digest).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn derive(path: &Path, stamp: FileStamp) -> Self {
        let mut hasher = blake3::Hasher::new();
        hasher.update(path.to_string_lossy().as_bytes());
        hasher.update(b":");
        hasher.update(format!("{}.{:09}", stamp.secs, stamp.nanos).as_bytes());
        Self(hasher.finalize().to_hex().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persisted form of one cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRecord {
    pub version: u32,
    pub source_path: String,
    pub stamp: FileStamp,
    /// Unix seconds at write time, used by age-bounded `clear`.
    pub created_at: u64,
    pub metadata: DependencyMetadata,
}

impl CacheRecord {
    pub const CURRENT_VERSION: u32 = 1;
}

struct MemoryEntry {
    metadata: DependencyMetadata,
    inserted_at: Instant,
}

/// Counter snapshot for the metrics collector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub memory_hits: u64,
    pub disk_hits: u64,
    pub misses: u64,
    /// Attempts to read the disk tier, hit or not.
    pub disk_reads: u64,
    pub writes: u64,
}

impl CacheStats {
    pub fn hits(&self) -> u64 {
        self.memory_hits + self.disk_hits
    }
}

#[derive(Default)]
struct Counters {
    memory_hits: AtomicU64,
    disk_hits: AtomicU64,
    misses: AtomicU64,
    disk_reads: AtomicU64,
    writes: AtomicU64,
}

/// Metadata Cache Manager
pub struct MetadataCache {
    enabled: bool,
    cache_dir: PathBuf,
    ttl: Duration,
    memory: Mutex<LruCache<CacheKey, MemoryEntry>>,
    counters: Counters,
}

impl MetadataCache {
    pub fn new(config: &AnalyzerConfig) -> Self {
        Self::with_settings(
            config.cache_enabled,
            config.cache_directory.clone(),
            config.memory_cache_capacity,
            config.memory_cache_ttl(),
        )
    }

    pub fn with_settings(enabled: bool, cache_dir: PathBuf, capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            enabled,
            cache_dir,
            ttl,
            memory: Mutex::new(LruCache::new(capacity)),
            counters: Counters::default(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Key for the file's current path and modification time.
    pub fn key(&self, path: &Path) -> Result<CacheKey, CacheError> {
        Ok(CacheKey::derive(path, FileStamp::of(path)?))
    }

    /// Look up cached metadata for `path`. Any failure is a miss.
    pub fn get(&self, path: &Path) -> Option<DependencyMetadata> {
        if !self.enabled {
            return None;
        }

        let stamp = match FileStamp::of(path) {
            Ok(stamp) => stamp,
            Err(e) => {
                debug!("Cache lookup skipped: {}", e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                return None;
            }
        };
        let key = CacheKey::derive(path, stamp);

        if let Some(metadata) = self.memory_get(&key) {
            self.counters.memory_hits.fetch_add(1, Ordering::Relaxed);
            return Some(metadata);
        }

        self.counters.disk_reads.fetch_add(1, Ordering::Relaxed);
        match self.read_record(&key) {
            Ok(Some(record))
                if record.version == CacheRecord::CURRENT_VERSION && record.stamp == stamp =>
            {
                self.memory_put(key, record.metadata.clone());
                self.counters.disk_hits.fetch_add(1, Ordering::Relaxed);
                Some(record.metadata)
            }
            Ok(_) => {
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
            Err(e) => {
                debug!("Ignoring unreadable cache record: {}", e);
                self.counters.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Store metadata for `path` in both tiers, keyed by its current
    /// modification time. Disk failures are logged only.
    pub fn put(&self, path: &Path, metadata: &DependencyMetadata) {
        match FileStamp::of(path) {
            Ok(stamp) => self.put_stamped(path, stamp, metadata),
            Err(e) => debug!("Not caching metadata: {}", e),
        }
    }

    /// Store metadata extracted from `path` as it was at `stamp`.
    pub fn put_stamped(&self, path: &Path, stamp: FileStamp, metadata: &DependencyMetadata) {
        if !self.enabled {
            return;
        }

        let key = CacheKey::derive(path, stamp);
        self.memory_put(key.clone(), metadata.clone());

        let record = CacheRecord {
            version: CacheRecord::CURRENT_VERSION,
            source_path: path.to_string_lossy().into_owned(),
            stamp,
            created_at: unix_now(),
            metadata: metadata.clone(),
        };
        match self.write_record(&key, &record) {
            Ok(()) => {
                self.counters.writes.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!("Failed to persist cache entry for {}: {}", path.display(), e),
        }
    }

    /// Remove persisted entries, all of them or only those older than
    /// `older_than_days`. The memory tier is always emptied. Only record
    /// files and staging leftovers are touched. Returns the number of files
    /// removed.
    pub fn clear(&self, older_than_days: Option<u64>) -> usize {
        self.memory.lock().clear();

        let entries = match fs::read_dir(&self.cache_dir) {
            Ok(entries) => entries,
            Err(_) => return 0,
        };

        let cutoff = older_than_days.map(|days| {
            unix_now().saturating_sub(days.saturating_mul(SECONDS_PER_DAY))
        });

        let mut removed = 0;
        for entry in entries.flatten() {
            let path = entry.path();
            if !path.is_file() || !is_cache_file(&path) {
                continue;
            }
            if let Some(cutoff) = cutoff {
                if self.entry_created_at(&path) >= cutoff {
                    continue;
                }
            }
            match fs::remove_file(&path) {
                Ok(()) => removed += 1,
                Err(e) => warn!("Failed to remove cache file {}: {}", path.display(), e),
            }
        }
        debug!("Cleared {} cache files from {}", removed, self.cache_dir.display());
        removed
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            memory_hits: self.counters.memory_hits.load(Ordering::Relaxed),
            disk_hits: self.counters.disk_hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            disk_reads: self.counters.disk_reads.load(Ordering::Relaxed),
            writes: self.counters.writes.load(Ordering::Relaxed),
        }
    }

    pub fn memory_len(&self) -> usize {
        self.memory.lock().len()
    }

    /// On-disk location of the record for `key`.
    pub fn record_path(&self, key: &CacheKey) -> PathBuf {
        self.cache_dir
            .join(format!("{}.{}", key.as_str(), RECORD_EXTENSION))
    }

    // ─────────────────────────────────────────────────────────────────────
    // Private helpers
    // ─────────────────────────────────────────────────────────────────────

    fn memory_get(&self, key: &CacheKey) -> Option<DependencyMetadata> {
        let mut memory = self.memory.lock();
        let expired = match memory.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => {
                return Some(entry.metadata.clone());
            }
            Some(_) => true,
            None => false,
        };
        if expired {
            memory.pop(key);
        }
        None
    }

    fn memory_put(&self, key: CacheKey, metadata: DependencyMetadata) {
        self.memory.lock().put(
            key,
            MemoryEntry {
                metadata,
                inserted_at: Instant::now(),
            },
        );
    }

    fn read_record(&self, key: &CacheKey) -> Result<Option<CacheRecord>, CacheError> {
        let path = self.record_path(key);
        let mut file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(source) => return Err(CacheError::Io { path, source }),
        };
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)
            .map_err(|source| CacheError::Io { path: path.clone(), source })?;
        let record = bincode::deserialize(&bytes).map_err(|source| CacheError::Decode { path, source })?;
        Ok(Some(record))
    }

    /// Temp file plus rename, so readers never observe a partial record.
    fn write_record(&self, key: &CacheKey, record: &CacheRecord) -> Result<(), CacheError> {
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| CacheError::Io { path, source }
        };

        fs::create_dir_all(&self.cache_dir).map_err(io_err(&self.cache_dir))?;
        let bytes = bincode::serialize(record).map_err(CacheError::Encode)?;

        let mut tmp = tempfile::Builder::new()
            .prefix(STAGING_PREFIX)
            .tempfile_in(&self.cache_dir)
            .map_err(io_err(&self.cache_dir))?;
        tmp.write_all(&bytes).map_err(io_err(tmp.path()))?;
        let target = self.record_path(key);
        tmp.persist(&target).map_err(|e| CacheError::Io {
            path: target.clone(),
            source: e.error,
        })?;
        Ok(())
    }

    /// Creation time of a persisted entry: the recorded timestamp, or the
    /// file's own timestamps when the record cannot be decoded.
    fn entry_created_at(&self, path: &Path) -> u64 {
        let recorded = fs::read(path)
            .ok()
            .and_then(|bytes| bincode::deserialize::<CacheRecord>(&bytes).ok())
            .map(|record| record.created_at);
        if let Some(created_at) = recorded {
            return created_at;
        }
        fs::metadata(path)
            .and_then(|m| m.created().or_else(|_| m.modified()))
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// `<blake3-hex>.bin` records, plus staging files left by an interrupted write.
fn is_cache_file(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    if name.starts_with(STAGING_PREFIX) {
        return true;
    }
    match name.strip_suffix(RECORD_EXTENSION).and_then(|n| n.strip_suffix('.')) {
        Some(stem) => stem.len() == 64 && stem.bytes().all(|b| b.is_ascii_hexdigit()),
        None => false,
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn cache_in(dir: &Path) -> MetadataCache {
        MetadataCache::with_settings(true, dir.join(".cache"), 100, Duration::from_secs(300))
    }

    fn sample() -> DependencyMetadata {
        let mut m = DependencyMetadata::new();
        m.insert("main".to_string(), vec!["helper".to_string()]);
        m.insert("helper".to_string(), vec![]);
        m
    }

    #[test]
    fn test_cache_miss_when_empty() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let src = dir.path().join("a.py");
        fs::write(&src, "def a(): pass").unwrap();

        assert!(cache.get(&src).is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_key_depends_on_path_and_mtime() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let a = dir.path().join("a.py");
        let b = dir.path().join("b.py");
        fs::write(&a, "x").unwrap();
        fs::write(&b, "x").unwrap();

        let key_a = cache.key(&a).unwrap();
        assert_eq!(key_a, cache.key(&a).unwrap());
        assert_ne!(key_a, cache.key(&b).unwrap());

        let stamp = FileStamp::of(&a).unwrap();
        let later = FileStamp { secs: stamp.secs + 1, ..stamp };
        assert_ne!(CacheKey::derive(&a, stamp), CacheKey::derive(&a, later));
        assert_eq!(key_a.as_str().len(), 64);
    }

    #[test]
    fn test_disk_hit_backfills_memory() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.py");
        fs::write(&src, "def a(): pass").unwrap();

        cache_in(dir.path()).put(&src, &sample());

        let fresh = cache_in(dir.path());
        assert_eq!(fresh.memory_len(), 0);
        assert_eq!(fresh.get(&src), Some(sample()));
        assert_eq!(fresh.memory_len(), 1);
        assert_eq!(fresh.stats().disk_hits, 1);
    }

    #[test]
    fn test_expired_memory_entry_falls_through() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.py");
        fs::write(&src, "x").unwrap();
        let cache = MetadataCache::with_settings(true, dir.path().join(".cache"), 10, Duration::ZERO);

        cache.put(&src, &sample());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get(&src), Some(sample()));
        let stats = cache.stats();
        assert_eq!(stats.memory_hits, 0);
        assert_eq!(stats.disk_hits, 1);
    }

    #[test]
    fn test_corrupt_record_is_a_miss() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.py");
        fs::write(&src, "x").unwrap();
        let cache = cache_in(dir.path());
        let key = cache.key(&src).unwrap();

        fs::create_dir_all(cache.cache_dir()).unwrap();
        fs::write(cache.record_path(&key), b"\xff\xff not bincode").unwrap();

        assert!(cache.get(&src).is_none());
    }

    #[test]
    fn test_disabled_cache_is_inert() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.py");
        fs::write(&src, "x").unwrap();
        let cache = MetadataCache::with_settings(false, dir.path().join(".cache"), 10, Duration::from_secs(60));

        cache.put(&src, &sample());
        assert!(cache.get(&src).is_none());
        assert!(!cache.cache_dir().exists());
    }

    #[test]
    fn test_clear_by_age_keeps_recent_entries() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let fresh_src = dir.path().join("fresh.py");
        let old_src = dir.path().join("old.py");
        fs::write(&fresh_src, "x").unwrap();
        fs::write(&old_src, "y").unwrap();

        cache.put(&fresh_src, &sample());
        let old_key = cache.key(&old_src).unwrap();
        let old_record = CacheRecord {
            version: CacheRecord::CURRENT_VERSION,
            source_path: old_src.to_string_lossy().into_owned(),
            stamp: FileStamp::of(&old_src).unwrap(),
            created_at: unix_now() - 10 * SECONDS_PER_DAY,
            metadata: sample(),
        };
        cache.write_record(&old_key, &old_record).unwrap();

        assert_eq!(cache.clear(Some(7)), 1);
        assert_eq!(cache.memory_len(), 0);
        assert!(cache.record_path(&cache.key(&fresh_src).unwrap()).exists());
        assert!(!cache.record_path(&old_key).exists());

        assert_eq!(cache.clear(None), 1);
        assert!(cache.get(&fresh_src).is_none());
    }

    #[test]
    fn test_only_cache_files_are_recognized() {
        let hex = "a".repeat(64);
        assert!(is_cache_file(Path::new(&format!("/c/{}.bin", hex))));
        assert!(is_cache_file(Path::new("/c/.record-Xy12ab")));
        assert!(!is_cache_file(Path::new("/c/notes.bin")));
        assert!(!is_cache_file(Path::new(&format!("/c/{}.txt", hex))));
        assert!(!is_cache_file(Path::new(&format!("/c/{}.bin", "g".repeat(64)))));
        assert!(!is_cache_file(Path::new("/c/Cargo.toml")));
    }

    #[test]
    fn test_put_stamped_keys_by_given_stamp() {
        let dir = tempdir().unwrap();
        let src = dir.path().join("a.py");
        fs::write(&src, "x").unwrap();
        let cache = cache_in(dir.path());

        let stamp = FileStamp::of(&src).unwrap();
        let stale = FileStamp { secs: stamp.secs.saturating_sub(60), ..stamp };
        cache.put_stamped(&src, stale, &sample());

        // stored under the older stamp, so the current file does not match
        assert!(cache.get(&src).is_none());
        assert!(cache.record_path(&CacheKey::derive(&src, stale)).exists());
    }
}
