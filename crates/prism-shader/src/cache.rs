//! Process-wide results cache.
//!
//! Compiled artifacts are keyed by a content hash over everything that can
//! change the output: platform format, preprocessed source (length plus
//! checksum), compiler version, flags, and language standard version.
//! Determinism of the pipeline (identical inputs → identical bytes) is what
//! makes this safe.
//!
//! Lookups are plain get-or-compute. Two jobs racing on the same key both
//! compile and one insert wins; the duplicated work is harmless, so no
//! cross-job locking is held during compilation.

use std::sync::{Arc, Mutex};

use hashbrown::HashMap;

use crate::compile::{CompileFailure, CompiledShader};
use crate::env::CompilerFlags;

/// Compiler version string participating in cache keys.
pub const COMPILER_VERSION: &str = "prism-shader 1.0";

/// Bump to invalidate every cached artifact when output *semantics* change
/// in a way that still compiles (slot layout, header encoding, patching).
pub const PIPELINE_CACHE_VERSION: u32 = 1;

/// A content-derived cache key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheKey([u8; 32]);

/// The inputs a cache key is derived from.
#[derive(Debug, Clone, Copy)]
pub struct CacheKeyInputs<'a> {
    /// Platform format name (e.g. `vulkan`).
    pub format: &'a str,
    /// Preprocessed source bytes.
    pub source: &'a [u8],
    /// Compiler version string; see [`COMPILER_VERSION`].
    pub compiler_version: &'a str,
    /// Compiler flags for the job.
    pub flags: CompilerFlags,
    /// Target language standard version.
    pub standard_version: u32,
}

/// Derives the cache key for one compile.
pub fn compute_cache_key(inputs: &CacheKeyInputs<'_>) -> CacheKey {
    let mut hasher = blake3::Hasher::new();
    hasher.update(b"prism-shader results cache");
    hasher.update(&PIPELINE_CACHE_VERSION.to_le_bytes());
    hasher.update(&(inputs.format.len() as u32).to_le_bytes());
    hasher.update(inputs.format.as_bytes());
    // Length and checksum stand in for the source text itself.
    hasher.update(&(inputs.source.len() as u64).to_le_bytes());
    hasher.update(&xxhash_rust::xxh3::xxh3_64(inputs.source).to_le_bytes());
    hasher.update(&(inputs.compiler_version.len() as u32).to_le_bytes());
    hasher.update(inputs.compiler_version.as_bytes());
    hasher.update(&inputs.flags.bits().to_le_bytes());
    hasher.update(&inputs.standard_version.to_le_bytes());
    CacheKey(*hasher.finalize().as_bytes())
}

/// Cache hit/miss counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Lookups served from the cache.
    pub hits: u64,
    /// Lookups that had to compile.
    pub misses: u64,
    /// Compiles that completed and were stored.
    pub stored: u64,
}

#[derive(Default)]
struct CacheInner {
    map: HashMap<CacheKey, Arc<CompiledShader>>,
    stats: CacheStats,
}

/// Shared get-or-compute cache over compiled stages.
#[derive(Default)]
pub struct ResultsCache {
    inner: Mutex<CacheInner>,
}

impl ResultsCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached artifact for `key`, or runs `compile` and stores
    /// its result.
    ///
    /// `compile` runs without the cache lock held; concurrent callers with
    /// the same key may both compile, and the first insert wins.
    pub fn get_or_compile<F>(
        &self,
        key: CacheKey,
        compile: F,
    ) -> Result<Arc<CompiledShader>, CompileFailure>
    where
        F: FnOnce() -> Result<CompiledShader, CompileFailure>,
    {
        {
            let mut inner = self.inner.lock().expect("results cache poisoned");
            if let Some(hit) = inner.map.get(&key) {
                let hit = Arc::clone(hit);
                inner.stats.hits += 1;
                return Ok(hit);
            }
            inner.stats.misses += 1;
        }

        let artifact = Arc::new(compile()?);

        let mut inner = self.inner.lock().expect("results cache poisoned");
        let stored = inner
            .map
            .entry(key)
            .or_insert_with(|| Arc::clone(&artifact));
        let stored = Arc::clone(stored);
        inner.stats.stored += 1;
        Ok(stored)
    }

    /// Current counters.
    pub fn stats(&self) -> CacheStats {
        self.inner.lock().expect("results cache poisoned").stats
    }

    /// Number of cached artifacts.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("results cache poisoned").map.len()
    }

    /// Returns `true` when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::ShaderHeader;
    use crate::stage::ShaderStage;

    fn dummy_artifact() -> CompiledShader {
        CompiledShader {
            stage: ShaderStage::Pixel,
            ir: vec![1, 2, 3],
            header: ShaderHeader {
                stage: ShaderStage::Pixel,
                source_hash: 0,
                ir_checksum: 0,
                inputs: Vec::new(),
                outputs: Vec::new(),
                input_mask: 0,
                output_mask: 0,
                globals: Vec::new(),
                uniform_buffers: Vec::new(),
                packed_globals: Vec::new(),
                packed_arrays: Vec::new(),
                packed_buffers: Vec::new(),
                copy_ranges: Vec::new(),
                input_attachments: Vec::new(),
                side_table_slot: None,
            },
            header_bytes: Vec::new(),
            annotations: None,
        }
    }

    fn key(source: &[u8], flags: CompilerFlags) -> CacheKey {
        compute_cache_key(&CacheKeyInputs {
            format: "vulkan",
            source,
            compiler_version: COMPILER_VERSION,
            flags,
            standard_version: 450,
        })
    }

    #[test]
    fn second_lookup_hits_without_recompiling() {
        let cache = ResultsCache::new();
        let k = key(b"float4 main() {}", CompilerFlags::empty());

        let mut compiles = 0;
        for _ in 0..2 {
            cache
                .get_or_compile(k, || {
                    compiles += 1;
                    Ok(dummy_artifact())
                })
                .unwrap();
        }

        assert_eq!(compiles, 1);
        let stats = cache.stats();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn differing_flags_produce_distinct_keys() {
        let plain = key(b"src", CompilerFlags::empty());
        let debug = key(b"src", CompilerFlags::DEBUG);
        assert_ne!(plain, debug);
    }

    #[test]
    fn failures_are_not_cached() {
        let cache = ResultsCache::new();
        let k = key(b"bad", CompilerFlags::empty());

        let failure = cache.get_or_compile(k, || {
            Err(CompileFailure {
                phase: crate::compile::CompilePhase::Reflecting,
                errors: Vec::new(),
            })
        });
        assert!(failure.is_err());
        assert!(cache.is_empty());

        // A later attempt with the same key compiles again.
        cache.get_or_compile(k, || Ok(dummy_artifact())).unwrap();
        assert_eq!(cache.len(), 1);
    }
}
