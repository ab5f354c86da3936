//! Result cache.
//!
//! A best-set is stored under a key derived from the whole input text and
//! the query name, so editing anything in the input invalidates every
//! entry. Read failures count as misses; write failures are reported to
//! the caller, which only logs them.
//!
//! # Cache Directory Structure
//!
//! ```text
//! $TMPDIR/strata-cache/
//! ├── <key>.bin    # Bincode-encoded BestSet
//! └── ...
//! ```

use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};

use rustc_hash::{FxHashMap, FxHasher};
use thiserror::Error;

use crate::BestSet;

/// Cache key: a hash of (input text, query name).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey(u64);

impl CacheKey {
    pub fn new(input: &str, query: &str) -> Self {
        let mut hasher = FxHasher::default();
        (input, query).hash(&mut hasher);
        CacheKey(hasher.finish())
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot encode best-set: {0}")]
    Encode(#[from] bincode::Error),
}

/// Storage for best-sets.
pub trait PlanCache {
    /// The stored best-set, or `None` on a miss or an unreadable entry.
    fn get(&self, key: &CacheKey) -> Option<BestSet>;

    fn put(&self, key: &CacheKey, best: &BestSet) -> Result<(), CacheError>;
}

impl<C: PlanCache + ?Sized> PlanCache for &C {
    fn get(&self, key: &CacheKey) -> Option<BestSet> {
        (**self).get(key)
    }

    fn put(&self, key: &CacheKey, best: &BestSet) -> Result<(), CacheError> {
        (**self).put(key, best)
    }
}

/// One bincode file per entry in a directory.
#[derive(Clone, Debug)]
pub struct FsPlanCache {
    dir: PathBuf,
}

impl FsPlanCache {
    /// Cache rooted at `dir`; the directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsPlanCache { dir: dir.into() }
    }

    /// `$STRATA_CACHE_DIR`, or `strata-cache` under the system temp dir.
    pub fn default_dir() -> PathBuf {
        std::env::var_os("STRATA_CACHE_DIR")
            .map_or_else(|| std::env::temp_dir().join("strata-cache"), PathBuf::from)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, key: &CacheKey) -> PathBuf {
        self.dir.join(format!("{key}.bin"))
    }

    #[must_use]
    pub fn has(&self, key: &CacheKey) -> bool {
        self.path(key).exists()
    }

    /// Remove every entry.
    pub fn clear(&self) -> Result<(), CacheError> {
        if self.dir.exists() {
            std::fs::remove_dir_all(&self.dir)?;
        }
        Ok(())
    }
}

impl PlanCache for FsPlanCache {
    fn get(&self, key: &CacheKey) -> Option<BestSet> {
        let path = self.path(key);
        let data = match std::fs::read(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %path.display(), "cannot read cache entry: {e}");
                return None;
            }
        };
        match bincode::deserialize(&data) {
            Ok(best) => Some(best),
            Err(e) => {
                tracing::warn!(path = %path.display(), "ignoring unreadable cache entry: {e}");
                None
            }
        }
    }

    fn put(&self, key: &CacheKey, best: &BestSet) -> Result<(), CacheError> {
        let data = bincode::serialize(best)?;
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(key), data)?;
        Ok(())
    }
}

/// In-process cache, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryPlanCache {
    entries: RefCell<FxHashMap<CacheKey, BestSet>>,
}

impl MemoryPlanCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl PlanCache for MemoryPlanCache {
    fn get(&self, key: &CacheKey) -> Option<BestSet> {
        self.entries.borrow().get(key).cloned()
    }

    fn put(&self, key: &CacheKey, best: &BestSet) -> Result<(), CacheError> {
        self.entries.borrow_mut().insert(*key, best.clone());
        Ok(())
    }
}

/// Caching disabled: always misses, never stores.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoCache;

impl PlanCache for NoCache {
    fn get(&self, _key: &CacheKey) -> Option<BestSet> {
        None
    }

    fn put(&self, _key: &CacheKey, _best: &BestSet) -> Result<(), CacheError> {
        Ok(())
    }
}
