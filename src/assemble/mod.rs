//! Response assembly
//!
//! Resolvers for one request call these helpers with the request's context.
//! Sibling lookups started together land in the same batch, so resolving a
//! list of orders with their customers costs one store round trip per entity
//! kind rather than one per order.

use futures::future::join_all;
use log::warn;
use serde::Serialize;

use crate::{
    core::{
        context::RequestContext,
        error::{DataError, DataResult},
    },
    internal_error,
    model::{Customer, Order, OrderItem, Product, TrackingInfo},
};

pub const NO_REASON: &str = "No reason provided";

/// Pair every key with the result at the same position
pub fn zip_ordered<K, R>(keys: Vec<K>, results: Vec<R>) -> DataResult<Vec<(K, R)>> {
    if keys.len() != results.len() {
        return Err(internal_error!(
            "{} results for {} keys",
            results.len(),
            keys.len()
        ));
    }
    Ok(keys.into_iter().zip(results).collect())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderView {
    #[serde(flatten)]
    pub order: Order,
    pub customer: Option<Customer>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    #[serde(flatten)]
    pub item: OrderItem,
    pub product: Option<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerView {
    #[serde(flatten)]
    pub customer: Customer,
    pub orders: Vec<Order>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendationView {
    pub product: Product,
    pub score: f64,
    pub reason: String,
}

// Field-level lookups never fail the response, a failed load reads as absent
fn settle<T>(what: &str, result: DataResult<Option<T>>) -> Option<T> {
    result.unwrap_or_else(|e| {
        warn!("{what}: resolving as null after error: {e}");
        None
    })
}

/// Attach each order's customer, loading every customer in one batch
pub async fn orders_with_customers(ctx: &RequestContext, orders: Vec<Order>) -> Vec<OrderView> {
    let customers = join_all(orders.iter().map(|order| async move {
        match &order.customer_id {
            Some(id) => settle("order.customer", ctx.loaders.customer.load(id.clone()).await),
            None => None,
        }
    }))
    .await;

    orders
        .into_iter()
        .zip(customers)
        .map(|(order, customer)| OrderView { order, customer })
        .collect()
}

pub async fn order_lines(ctx: &RequestContext, order: &Order) -> Vec<OrderLine> {
    let products = ctx
        .loaders
        .product
        .load_many(order.items.iter().map(|item| item.product_id.clone()))
        .await;

    order
        .items
        .iter()
        .cloned()
        .zip(products)
        .map(|(item, product)| OrderLine {
            item,
            product: settle("orderItem.product", product),
        })
        .collect()
}

pub async fn customer_with_orders(ctx: &RequestContext, customer_id: &str) -> Option<CustomerView> {
    let id = customer_id.to_string();
    let (customer, orders) = futures::join!(
        ctx.loaders.customer.load(id.clone()),
        ctx.loaders.customer_orders.load(id),
    );

    let customer = settle("customer", customer)?;
    let orders = orders.unwrap_or_else(|e| {
        warn!("customer.orders: resolving as empty after error: {e}");
        Vec::new()
    });
    Some(CustomerView { customer, orders })
}

/// Recommendations with their products for one customer.
///
/// Fails only when the customer itself cannot be found or loaded. A
/// misbehaving recommendation engine yields an empty list.
pub async fn customer_recommendations(
    ctx: &RequestContext,
    customer_id: &str,
    limit: usize,
) -> DataResult<Vec<RecommendationView>> {
    let customer = ctx
        .loaders
        .customer
        .load(customer_id.to_string())
        .await?
        .ok_or_else(|| DataError::NotFound(format!("customer {customer_id}")))?;

    let recommendations = ctx
        .proxies
        .recommendations
        .recommendations(&customer.id, limit)
        .await;

    let products = ctx
        .loaders
        .product
        .load_many(recommendations.iter().map(|rec| rec.product_id.clone()))
        .await;

    let paired = zip_ordered(recommendations, products)?;
    Ok(paired
        .into_iter()
        .filter_map(|(rec, product)| match settle("recommendation.product", product) {
            Some(product) => Some(RecommendationView {
                product,
                score: rec.score.unwrap_or(0.0),
                reason: rec.reason.unwrap_or_else(|| NO_REASON.to_string()),
            }),
            None => {
                warn!("Product not found for recommendation: {}", rec.product_id);
                None
            }
        })
        .collect())
}

/// Products recommended to a customer, using the request's default limit
pub async fn customer_recommended_products(ctx: &RequestContext, customer: &Customer) -> Vec<Product> {
    let recommendations = ctx
        .proxies
        .recommendations
        .recommendations(&customer.id, ctx.recommendation_limit)
        .await;

    ctx.loaders
        .product
        .load_many(recommendations.into_iter().map(|rec| rec.product_id))
        .await
        .into_iter()
        .filter_map(|product| settle("customer.recommendations", product))
        .collect()
}

/// Tracking for an order, or `None` while it has not shipped or has no reference
pub async fn order_tracking(ctx: &RequestContext, order: &Order) -> Option<TrackingInfo> {
    if !order.is_trackable() {
        return None;
    }
    let reference = order.tracking_reference()?;
    ctx.proxies.shipping.tracking(reference).await
}

/// Tracking looked up by order id. Orders without a reference are tracked by their id.
pub async fn order_tracking_by_id(
    ctx: &RequestContext,
    order_id: &str,
) -> DataResult<Option<TrackingInfo>> {
    let order = ctx
        .loaders
        .order
        .load(order_id.to_string())
        .await?
        .ok_or_else(|| DataError::NotFound(format!("order {order_id}")))?;

    if !order.is_trackable() {
        return Ok(None);
    }
    let reference = order.tracking_reference().unwrap_or(order.id.as_str());
    Ok(ctx.proxies.shipping.tracking(reference).await)
}
