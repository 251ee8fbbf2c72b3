//! One-to-many loading (e.g. orders by customer) on top of `BatchLoader`

use std::{collections::HashMap, fmt::Debug, hash::Hash, marker::PhantomData, sync::Arc};

use async_trait::async_trait;

use super::batch::{BatchFn, BatchLoader, LoaderOptions, LoaderStats, Slot};
use crate::core::error::DataResult;

/// Fetches every child of a set of parents in one query
#[async_trait]
pub trait GroupFn<K, V>: Send + Sync {
    async fn load_children(&self, parents: &[K]) -> DataResult<Vec<V>>;

    /// Foreign key linking a child to its parent
    fn parent_key(&self, child: &V) -> Option<K>;
}

struct Grouped<K, V> {
    group_fn: Arc<dyn GroupFn<K, V>>,
    _marker: PhantomData<fn() -> (K, V)>,
}

#[async_trait]
impl<K, V> BatchFn<K, Vec<V>> for Grouped<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Send + Sync + 'static,
{
    async fn load(&self, keys: &[K]) -> DataResult<Vec<Slot<Vec<V>>>> {
        let children = self.group_fn.load_children(keys).await?;

        let mut groups: HashMap<K, Vec<V>> =
            keys.iter().map(|key| (key.clone(), Vec::new())).collect();
        for child in children {
            let Some(parent) = self.group_fn.parent_key(&child) else {
                continue;
            };
            if let Some(group) = groups.get_mut(&parent) {
                group.push(child);
            }
        }

        Ok(keys
            .iter()
            .map(|key| Slot::Value(groups.remove(key).unwrap_or_default()))
            .collect())
    }
}

/// Loader whose value per key is a possibly empty list of children
pub struct RelationshipLoader<K, V> {
    inner: BatchLoader<K, Vec<V>>,
}

impl<K, V> RelationshipLoader<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new(group_fn: Arc<dyn GroupFn<K, V>>) -> Self {
        Self::with_options(group_fn, LoaderOptions::default())
    }

    pub fn with_options(group_fn: Arc<dyn GroupFn<K, V>>, options: LoaderOptions) -> Self {
        let grouped = Grouped {
            group_fn,
            _marker: PhantomData,
        };
        Self {
            inner: BatchLoader::with_options(Arc::new(grouped), options),
        }
    }

    /// Children of `key`. A parent without children yields an empty list.
    pub async fn load(&self, key: K) -> DataResult<Vec<V>> {
        Ok(self.inner.load(key).await?.unwrap_or_default())
    }

    pub async fn load_many<I>(&self, keys: I) -> Vec<DataResult<Vec<V>>>
    where
        I: IntoIterator<Item = K>,
    {
        self.inner
            .load_many(keys)
            .await
            .into_iter()
            .map(|result| result.map(Option::unwrap_or_default))
            .collect()
    }

    pub fn clear(&self, key: &K) {
        self.inner.clear(key);
    }

    pub fn stats(&self) -> LoaderStats {
        self.inner.stats()
    }
}
