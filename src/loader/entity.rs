//! Store-backed batch functions for customers, orders and products

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;

use super::{
    batch::{BatchFn, Slot},
    relationship::GroupFn,
};
use crate::{
    core::{
        error::{DataError, DataResult},
        traits::DocumentStore,
    },
    model::{Customer, Order, Product},
};

/// Re-orders an unordered store answer to match the requested ids
fn reorder<V>(ids: &[String], found: Vec<V>, id_of: impl Fn(&V) -> &str) -> Vec<Slot<V>> {
    let mut by_id: HashMap<String, V> = found
        .into_iter()
        .map(|doc| (id_of(&doc).to_string(), doc))
        .collect();
    ids.iter().map(|id| by_id.remove(id).into()).collect()
}

fn store_failure(entity: &str, err: DataError) -> DataError {
    match err {
        DataError::Store(msg) => crate::store_error!("failed to load {}: {}", entity, msg),
        other => crate::store_error!("failed to load {}: {}", entity, other),
    }
}

pub struct CustomerBatch {
    store: Arc<dyn DocumentStore>,
}

impl CustomerBatch {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<String, Customer> for CustomerBatch {
    async fn load(&self, ids: &[String]) -> DataResult<Vec<Slot<Customer>>> {
        let customers = self
            .store
            .find_customers(ids)
            .await
            .map_err(|e| store_failure("customers", e))?;
        Ok(reorder(ids, customers, |c| c.id.as_str()))
    }
}

pub struct OrderBatch {
    store: Arc<dyn DocumentStore>,
}

impl OrderBatch {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<String, Order> for OrderBatch {
    async fn load(&self, ids: &[String]) -> DataResult<Vec<Slot<Order>>> {
        let orders = self
            .store
            .find_orders(ids)
            .await
            .map_err(|e| store_failure("orders", e))?;
        Ok(reorder(ids, orders, |o| o.id.as_str()))
    }
}

pub struct ProductBatch {
    store: Arc<dyn DocumentStore>,
}

impl ProductBatch {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl BatchFn<String, Product> for ProductBatch {
    async fn load(&self, ids: &[String]) -> DataResult<Vec<Slot<Product>>> {
        let products = self
            .store
            .find_products(ids)
            .await
            .map_err(|e| store_failure("products", e))?;
        Ok(reorder(ids, products, |p| p.id.as_str()))
    }
}

/// Groups orders under the customer they reference
pub struct OrdersByCustomer {
    store: Arc<dyn DocumentStore>,
}

impl OrdersByCustomer {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl GroupFn<String, Order> for OrdersByCustomer {
    async fn load_children(&self, customer_ids: &[String]) -> DataResult<Vec<Order>> {
        self.store
            .find_orders_by_customers(customer_ids)
            .await
            .map_err(|e| store_failure("orders by customer", e))
    }

    fn parent_key(&self, order: &Order) -> Option<String> {
        order.customer_id.clone()
    }
}
