//! In-memory document store
//!
//! Records every query it receives so callers can assert how many round
//! trips a resolver tree actually issued.

use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use dashmap::DashMap;
use log::trace;

use crate::{
    core::{
        error::{DataError, DataResult},
        traits::DocumentStore,
    },
    model::{Customer, Order, Product},
};

#[derive(Debug, Default)]
pub struct MemoryStore {
    customers: DashMap<String, Customer>,
    orders: DashMap<String, Order>,
    products: DashMap<String, Product>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
    fail_next: Mutex<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_customer(&self, customer: Customer) {
        self.customers.insert(customer.id.clone(), customer);
    }

    pub fn insert_order(&self, order: Order) {
        self.orders.insert(order.id.clone(), order);
    }

    pub fn insert_product(&self, product: Product) {
        self.products.insert(product.id.clone(), product);
    }

    /// Every query so far as `(collection, ids)`
    pub fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn query_count(&self, collection: &str) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|(name, _)| name == collection)
            .count()
    }

    /// Make the next query fail with a store error
    pub fn fail_next(&self, message: &str) {
        *self.fail_next.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    fn record(&self, collection: &str, ids: &[String]) -> DataResult<()> {
        trace!("memory store query on {collection}: {ids:?}");
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((collection.to_string(), ids.to_vec()));

        match self
            .fail_next
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            Some(message) => Err(DataError::Store(message)),
            None => Ok(()),
        }
    }
}

fn find_in<V: Clone>(map: &DashMap<String, V>, ids: &[String]) -> Vec<V> {
    ids.iter()
        .filter_map(|id| map.get(id).map(|entry| entry.value().clone()))
        .collect()
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn find_customers(&self, ids: &[String]) -> DataResult<Vec<Customer>> {
        self.record("customers", ids)?;
        Ok(find_in(&self.customers, ids))
    }

    async fn find_orders(&self, ids: &[String]) -> DataResult<Vec<Order>> {
        self.record("orders", ids)?;
        Ok(find_in(&self.orders, ids))
    }

    async fn find_products(&self, ids: &[String]) -> DataResult<Vec<Product>> {
        self.record("products", ids)?;
        Ok(find_in(&self.products, ids))
    }

    async fn find_orders_by_customers(&self, customer_ids: &[String]) -> DataResult<Vec<Order>> {
        self.record("orders_by_customer", customer_ids)?;
        Ok(self
            .orders
            .iter()
            .filter(|entry| {
                entry
                    .value()
                    .customer_id
                    .as_ref()
                    .is_some_and(|id| customer_ids.contains(id))
            })
            .map(|entry| entry.value().clone())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_skips_unknown_ids() {
        let store = MemoryStore::new();
        store.insert_product(Product {
            id: "p1".to_string(),
            ..Default::default()
        });

        let found = store
            .find_products(&["p1".to_string(), "p2".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(store.query_count("products"), 1);
    }

    #[tokio::test]
    async fn test_fail_next_only_fails_once() {
        let store = MemoryStore::new();
        store.fail_next("offline");

        assert_eq!(
            store.find_orders(&[]).await.unwrap_err(),
            DataError::Store("offline".to_string())
        );
        assert!(store.find_orders(&[]).await.unwrap().is_empty());
    }
}
