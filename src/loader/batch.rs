//! Generic key to value batching
//!
//! Every `load` registers a demand in the current scheduling window instead
//! of querying immediately. A window closes once the registering future has
//! yielded to the scheduler `yield_count` times; the first demand to resume
//! after that takes every key gathered so far and spawns one batch task for
//! them. Demands only wait on their own result channel.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use log::{debug, trace, warn};
use tokio::sync::oneshot;

use crate::{
    config,
    core::error::{DataError, DataResult},
    metrics,
};

pub use crate::config::ErrorPolicy;

/// Outcome for one position of a batch call
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<V> {
    Value(V),
    Missing,
    Failed(DataError),
}

impl<V> From<Option<V>> for Slot<V> {
    fn from(value: Option<V>) -> Self {
        match value {
            Some(v) => Slot::Value(v),
            None => Slot::Missing,
        }
    }
}

/// Resolves an ordered set of distinct keys in one downstream round trip.
///
/// The returned vector is positional: `slots[i]` answers `keys[i]`. A short
/// vector marks the trailing keys as missing. `Err` fails the whole batch.
#[async_trait]
pub trait BatchFn<K, V>: Send + Sync {
    async fn load(&self, keys: &[K]) -> DataResult<Vec<Slot<V>>>;
}

#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Label used in logs and metrics
    pub name: &'static str,
    pub yield_count: usize,
    pub max_batch_size: Option<usize>,
    pub error_policy: ErrorPolicy,
}

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            name: "loader",
            yield_count: config::Loader::default_yield_count(),
            max_batch_size: None,
            error_policy: ErrorPolicy::default(),
        }
    }
}

impl LoaderOptions {
    pub fn from_config(name: &'static str, cfg: &config::Loader) -> Self {
        Self {
            name,
            yield_count: cfg.yield_count,
            max_batch_size: cfg.max_batch_size,
            error_policy: cfg.error_policy,
        }
    }
}

/// Counters for the batch calls issued by one loader instance
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoaderStats {
    pub batches: u64,
    pub keys: u64,
}

type Waiter<V> = oneshot::Sender<DataResult<Option<V>>>;

struct Window<K, V> {
    keys: Vec<K>,
    waiters: HashMap<K, Vec<Waiter<V>>>,
}

impl<K, V> Default for Window<K, V> {
    fn default() -> Self {
        Self {
            keys: Vec::new(),
            waiters: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash + Clone, V> Window<K, V> {
    fn push(&mut self, key: K, waiter: Waiter<V>) {
        match self.waiters.get_mut(&key) {
            Some(waiters) => waiters.push(waiter),
            None => {
                self.keys.push(key.clone());
                self.waiters.insert(key, vec![waiter]);
            }
        }
    }

    fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

struct LoaderState<K, V> {
    cache: HashMap<K, V>,
    window: Window<K, V>,
    in_flight: HashMap<K, Vec<Waiter<V>>>,
    generation: u64,
    stats: LoaderStats,
}

struct Shared<K, V> {
    batch_fn: Arc<dyn BatchFn<K, V>>,
    options: LoaderOptions,
    state: Mutex<LoaderState<K, V>>,
}

/// Per-request batching loader with a dedup cache.
///
/// Not meant to outlive the request that created it: the cache never expires.
/// Closed windows run on their own task, so a caller that stops waiting
/// never takes the batch down with it.
pub struct BatchLoader<K, V> {
    shared: Arc<Shared<K, V>>,
}

impl<K, V> BatchLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(batch_fn: Arc<dyn BatchFn<K, V>>) -> Self {
        Self::with_options(batch_fn, LoaderOptions::default())
    }

    pub fn with_options(batch_fn: Arc<dyn BatchFn<K, V>>, options: LoaderOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                batch_fn,
                options,
                state: Mutex::new(LoaderState {
                    cache: HashMap::new(),
                    window: Window::default(),
                    in_flight: HashMap::new(),
                    generation: 0,
                    stats: LoaderStats::default(),
                }),
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.shared.options.name
    }

    /// Load one key. `Ok(None)` means the store has no such record.
    pub async fn load(&self, key: K) -> DataResult<Option<V>> {
        let name = self.name();
        let (receiver, generation) = {
            let mut state = self.shared.lock();
            if let Some(value) = state.cache.get(&key) {
                trace!("{name}: cache hit for {key:?}");
                return Ok(Some(value.clone()));
            }

            let (sender, receiver) = oneshot::channel();
            if let Some(waiters) = state.in_flight.get_mut(&key) {
                waiters.push(sender);
                (receiver, None)
            } else {
                state.window.push(key, sender);
                (receiver, Some(state.generation))
            }
        };

        if let Some(generation) = generation {
            for _ in 0..self.shared.options.yield_count.max(1) {
                tokio::task::yield_now().await;
            }
            self.dispatch_window(generation);
        }

        receiver.await.unwrap_or_else(|_| {
            Err(DataError::Cancelled(format!(
                "{name} batch dropped before resolving"
            )))
        })
    }

    /// Load several keys; the i-th result answers `keys[i]`, duplicates included.
    pub async fn load_many<I>(&self, keys: I) -> Vec<DataResult<Option<V>>>
    where
        I: IntoIterator<Item = K>,
    {
        futures::future::join_all(keys.into_iter().map(|key| self.load(key))).await
    }

    /// Seed the cache. Existing entries are kept.
    pub fn prime(&self, key: K, value: V) {
        self.shared.lock().cache.entry(key).or_insert(value);
    }

    pub fn clear(&self, key: &K) {
        self.shared.lock().cache.remove(key);
    }

    pub fn clear_all(&self) {
        self.shared.lock().cache.clear();
    }

    pub fn stats(&self) -> LoaderStats {
        self.shared.lock().stats
    }

    fn dispatch_window(&self, generation: u64) {
        let keys = {
            let mut state = self.shared.lock();
            if state.generation != generation || state.window.is_empty() {
                return;
            }
            state.generation += 1;
            let window = std::mem::take(&mut state.window);
            for (key, waiters) in window.waiters {
                state.in_flight.insert(key, waiters);
            }
            window.keys
        };

        let mut dispatch = Dispatch {
            shared: self.shared.clone(),
            keys,
            resolved: 0,
        };
        tokio::spawn(async move { dispatch.run().await });
    }
}

impl<K, V> Shared<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn lock(&self) -> MutexGuard<'_, LoaderState<K, V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, keys: &[K], outcome: DataResult<Vec<Slot<V>>>) {
        let slots = match outcome {
            Ok(mut slots) => {
                if slots.len() > keys.len() {
                    warn!(
                        "{}: batch returned {} results for {} keys, ignoring the surplus",
                        self.options.name,
                        slots.len(),
                        keys.len()
                    );
                    slots.truncate(keys.len());
                }
                slots.resize_with(keys.len(), || Slot::Missing);
                slots
            }
            Err(err) => {
                warn!("{}: batch of {} keys failed: {err}", self.options.name, keys.len());
                keys.iter().map(|_| Slot::Failed(err.clone())).collect()
            }
        };

        let mut state = self.lock();
        for (key, slot) in keys.iter().zip(slots) {
            let result = match slot {
                Slot::Value(value) => {
                    state.cache.insert(key.clone(), value.clone());
                    Ok(Some(value))
                }
                Slot::Missing => Ok(None),
                Slot::Failed(err) => self.apply_policy(key, err),
            };

            for waiter in state.in_flight.remove(key).unwrap_or_default() {
                // receiver gone means the caller stopped waiting
                let _ = waiter.send(result.clone());
            }
        }
    }

    fn apply_policy(&self, key: &K, err: DataError) -> DataResult<Option<V>> {
        match self.options.error_policy {
            ErrorPolicy::Propagate => Err(err),
            ErrorPolicy::Absent => {
                warn!("{}: treating {:?} as absent after error: {err}", self.options.name, key);
                Ok(None)
            }
        }
    }

    fn cancel(&self, keys: &[K]) {
        let mut state = self.lock();
        for key in keys {
            for waiter in state.in_flight.remove(key).unwrap_or_default() {
                let _ = waiter.send(Err(DataError::Cancelled(format!(
                    "{} batch abandoned while loading {:?}",
                    self.options.name, key
                ))));
            }
        }
    }
}

/// One closed window being resolved. If its task dies early (a panicking
/// batch fn, runtime shutdown) whatever is still unresolved is cancelled.
struct Dispatch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    shared: Arc<Shared<K, V>>,
    keys: Vec<K>,
    resolved: usize,
}

impl<K, V> Dispatch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    async fn run(&mut self) {
        let name = self.shared.options.name;
        let chunk_size = self
            .shared
            .options
            .max_batch_size
            .unwrap_or(self.keys.len())
            .max(1);

        while self.resolved < self.keys.len() {
            let end = (self.resolved + chunk_size).min(self.keys.len());
            let chunk = &self.keys[self.resolved..end];

            debug!("{name}: dispatching batch of {} keys", chunk.len());
            {
                let mut state = self.shared.lock();
                state.stats.batches += 1;
                state.stats.keys += chunk.len() as u64;
            }
            metrics::record_batch(name, chunk.len());

            let outcome = self.shared.batch_fn.load(chunk).await;
            self.shared.resolve(chunk, outcome);
            self.resolved = end;
        }
    }
}

impl<K, V> Drop for Dispatch<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn drop(&mut self) {
        if self.resolved < self.keys.len() {
            self.shared.cancel(&self.keys[self.resolved..]);
        }
    }
}
