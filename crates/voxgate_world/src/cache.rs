//! The chunk cache: single-flight generation, TTL eviction, optional LRU
//! cap.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use glam::IVec3;
use lru::LruCache;
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::coords::origin_of_coords;
use crate::{ChunkError, GenerationPipeline, SharedChunk};

/// Cache policy, loaded from the `chunkGenerator` config section.
#[derive(Clone, Debug)]
pub struct CacheConfig {
    /// Hard lifetime measured from generation time.
    pub ttl: Duration,
    /// Optional cap on resident chunks; the least recently accessed entry
    /// is evicted first when the cap is hit.
    pub lru_capacity: Option<usize>,
    /// Radius of the square chunk ring generated at startup.
    pub initial_radius: i32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(30 * 60),
            lru_capacity: None,
            initial_radius: 2,
        }
    }
}

struct Entry {
    chunk: SharedChunk,
    created_at: Instant,
    last_access: Instant,
}

type Waiter = oneshot::Sender<Result<SharedChunk, ChunkError>>;

struct Inner {
    entries: LruCache<IVec3, Entry>,
    /// Keys with a generation in flight, each with its subscriber list.
    /// A key in here is pinned: the eviction sweep only sees `entries`.
    pending: FxHashMap<IVec3, Vec<Waiter>>,
}

struct SharedCache {
    pipeline: GenerationPipeline,
    config: CacheConfig,
    inner: Mutex<Inner>,
    hits: AtomicU64,
    misses: AtomicU64,
    generated: AtomicU64,
}

/// A snapshot of the cache's observable state.
#[derive(Clone, Debug)]
pub struct CacheMetrics {
    pub cached: usize,
    pub total_generated: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
    pub pipeline_steps: usize,
    pub seed: i32,
    pub ttl: Duration,
    pub initial_radius: i32,
}

/// Shared handle to the chunk store. Cloning is cheap; all clones see the
/// same cache.
#[derive(Clone)]
pub struct ChunkCache(Arc<SharedCache>);

impl ChunkCache {
    pub fn new(pipeline: GenerationPipeline, config: CacheConfig) -> Self {
        let entries = match config.lru_capacity.and_then(NonZeroUsize::new) {
            Some(cap) => LruCache::new(cap),
            None => LruCache::unbounded(),
        };

        Self(Arc::new(SharedCache {
            pipeline,
            config,
            inner: Mutex::new(Inner {
                entries,
                pending: FxHashMap::default(),
            }),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            generated: AtomicU64::new(0),
        }))
    }

    pub fn config(&self) -> &CacheConfig {
        &self.0.config
    }

    /// Returns the chunk at `origin`, generating it on first demand.
    ///
    /// Concurrent callers for a cold key share one pipeline execution and
    /// receive the same chunk instance. A generation failure fans out to
    /// every waiter; retrying is the caller's choice.
    pub async fn get(&self, origin: IVec3) -> Result<SharedChunk, ChunkError> {
        let rx = {
            let mut inner = self.0.inner.lock();

            if let Some(entry) = inner.entries.get_mut(&origin) {
                entry.last_access = Instant::now();
                self.0.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry.chunk.clone());
            }

            self.0.misses.fetch_add(1, Ordering::Relaxed);

            let (tx, rx) = oneshot::channel();
            match inner.pending.entry(origin) {
                std::collections::hash_map::Entry::Occupied(mut waiters) => {
                    waiters.get_mut().push(tx);
                }
                std::collections::hash_map::Entry::Vacant(slot) => {
                    slot.insert(vec![tx]);
                    self.spawn_generation(origin);
                }
            }

            rx
        };

        rx.await.map_err(|_| ChunkError::GenerationAborted)?
    }

    /// Whether a chunk is resident, without touching recency or metrics.
    pub fn contains(&self, origin: IVec3) -> bool {
        self.0.inner.lock().entries.contains(&origin)
    }

    pub fn len(&self) -> usize {
        self.0.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn spawn_generation(&self, origin: IVec3) {
        let cache = self.clone();

        tokio::spawn(async move {
            let result = cache
                .0
                .pipeline
                .generate(origin)
                .await
                .map(|chunk| Arc::new(RwLock::new(chunk)));

            let waiters = {
                let mut inner = cache.0.inner.lock();
                let waiters = inner.pending.remove(&origin).unwrap_or_default();

                if let Ok(chunk) = &result {
                    cache.0.generated.fetch_add(1, Ordering::Relaxed);

                    let now = Instant::now();
                    inner.entries.put(
                        origin,
                        Entry {
                            chunk: chunk.clone(),
                            created_at: now,
                            last_access: now,
                        },
                    );
                }

                waiters
            };

            for waiter in waiters {
                let _ = waiter.send(result.clone());
            }
        });
    }

    /// Removes entries older than the TTL. Returns how many were evicted.
    /// Runs on a timer from the server's tick systems.
    pub fn evict_expired(&self) -> usize {
        let now = Instant::now();
        let mut inner = self.0.inner.lock();

        let expired: Vec<IVec3> = inner
            .entries
            .iter()
            .filter(|(_, entry)| now.duration_since(entry.created_at) > self.0.config.ttl)
            .map(|(origin, _)| *origin)
            .collect();

        for origin in &expired {
            inner.entries.pop(origin);
        }

        if !expired.is_empty() {
            debug!(count = expired.len(), "evicted expired chunks");
        }

        expired.len()
    }

    /// Pre-generates the square ring of chunks around the world origin.
    /// Runs the generations concurrently, all subject to single-flight.
    pub async fn populate_initial(&self) -> Result<usize, ChunkError> {
        let radius = self.0.config.initial_radius;
        let mut tasks = tokio::task::JoinSet::new();

        for cx in -radius..=radius {
            for cz in -radius..=radius {
                let cache = self.clone();
                let origin = origin_of_coords(IVec3::new(cx, 0, cz));

                tasks.spawn(async move { cache.get(origin).await.map(|_| ()) });
            }
        }

        let mut populated = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(Ok(())) => populated += 1,
                Ok(Err(e)) => {
                    warn!("initial chunk generation failed: {e}");
                    return Err(e);
                }
                Err(_) => return Err(ChunkError::GenerationAborted),
            }
        }

        info!(populated, radius, "initial chunk ring ready");
        Ok(populated)
    }

    pub fn metrics(&self) -> CacheMetrics {
        let hits = self.0.hits.load(Ordering::Relaxed);
        let misses = self.0.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;

        CacheMetrics {
            cached: self.len(),
            total_generated: self.0.generated.load(Ordering::Relaxed),
            hits,
            misses,
            hit_rate: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            pipeline_steps: self.0.pipeline.step_count(),
            seed: self.0.pipeline.seed(),
            ttl: self.0.config.ttl,
            initial_radius: self.0.config.initial_radius,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU32;

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{BlockKind, GenerationContext, GenerationStep};

    struct CountingStep(Arc<AtomicU32>);

    #[async_trait]
    impl GenerationStep for CountingStep {
        fn name(&self) -> &str {
            "counting"
        }

        async fn run(&self, ctx: &mut GenerationContext) -> anyhow::Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            // A touch of latency widens the window concurrent callers
            // could slip through if single-flight were broken.
            tokio::time::sleep(Duration::from_millis(10)).await;
            ctx.chunk.fill(BlockKind::Stone);
            Ok(())
        }
    }

    fn counting_cache(config: CacheConfig) -> (ChunkCache, Arc<AtomicU32>) {
        let runs = Arc::new(AtomicU32::new(0));
        let mut pipeline = GenerationPipeline::new(1);
        pipeline.add_step(CountingStep(runs.clone()));

        (ChunkCache::new(pipeline, config), runs)
    }

    #[tokio::test]
    async fn cold_concurrent_gets_run_one_generation() {
        let (cache, runs) = counting_cache(CacheConfig::default());
        let origin = IVec3::ZERO;

        let mut tasks = tokio::task::JoinSet::new();
        for _ in 0..16 {
            let cache = cache.clone();
            tasks.spawn(async move { cache.get(origin).await.unwrap() });
        }

        let mut chunks = Vec::new();
        while let Some(chunk) = tasks.join_next().await {
            chunks.push(chunk.unwrap());
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1, "single-flight was violated");
        assert!(
            chunks.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])),
            "every caller must receive the identical chunk instance"
        );
    }

    #[tokio::test]
    async fn hits_do_not_regenerate() {
        let (cache, runs) = counting_cache(CacheConfig::default());

        cache.get(IVec3::ZERO).await.unwrap();
        cache.get(IVec3::ZERO).await.unwrap();

        assert_eq!(runs.load(Ordering::SeqCst), 1);

        let metrics = cache.metrics();
        assert_eq!(metrics.hits, 1);
        assert_eq!(metrics.misses, 1);
        assert_eq!(metrics.total_generated, 1);
    }

    #[tokio::test]
    async fn expired_entries_are_swept_and_regenerate() {
        let (cache, runs) = counting_cache(CacheConfig {
            ttl: Duration::ZERO,
            ..CacheConfig::default()
        });

        cache.get(IVec3::ZERO).await.unwrap();
        assert_eq!(cache.evict_expired(), 1);
        assert!(cache.is_empty());

        cache.get(IVec3::ZERO).await.unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lru_cap_bounds_residency() {
        let (cache, _) = counting_cache(CacheConfig {
            lru_capacity: Some(2),
            ..CacheConfig::default()
        });

        for cx in 0..3 {
            cache.get(origin_of_coords(IVec3::new(cx, 0, 0))).await.unwrap();
        }

        assert_eq!(cache.len(), 2);
        // The first chunk was the least recently used.
        assert!(!cache.contains(IVec3::ZERO));
    }

    #[tokio::test]
    async fn initial_ring_has_the_documented_size() {
        let (cache, runs) = counting_cache(CacheConfig {
            initial_radius: 2,
            ..CacheConfig::default()
        });

        let populated = cache.populate_initial().await.unwrap();

        assert_eq!(populated, 25);
        assert_eq!(cache.len(), 25);
        assert_eq!(runs.load(Ordering::SeqCst), 25);
    }

    #[tokio::test]
    async fn failures_fan_out_and_do_not_poison_the_key() {
        struct FlakyStep(Arc<AtomicU32>);

        #[async_trait]
        impl GenerationStep for FlakyStep {
            fn name(&self) -> &str {
                "flaky"
            }

            async fn run(&self, _ctx: &mut GenerationContext) -> anyhow::Result<()> {
                if self.0.fetch_add(1, Ordering::SeqCst) == 0 {
                    anyhow::bail!("first run fails")
                }
                Ok(())
            }
        }

        let attempts = Arc::new(AtomicU32::new(0));
        let mut pipeline = GenerationPipeline::new(1);
        pipeline.add_step(FlakyStep(attempts.clone()));
        let cache = ChunkCache::new(pipeline, CacheConfig::default());

        let err = cache.get(IVec3::ZERO).await.unwrap_err();
        assert!(matches!(err, ChunkError::GenerationFailure { .. }));

        // The failed key is not stuck; a retry generates fresh.
        cache.get(IVec3::ZERO).await.unwrap();
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
