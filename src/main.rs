use std::{env, process, sync::Arc};

use log::{debug, info};
use serde::Deserialize;
use tokio::sync::watch;

use shopgraph::{
    assemble,
    config::Config,
    core::{error::ErrorContext, ContextFactory, DataResult},
    logging::Logger,
    metrics,
    model::{Customer, Order, Product},
    store::MemoryStore,
};

/// Documents to seed the in-memory store with
#[derive(Debug, Default, Deserialize)]
struct Fixture {
    #[serde(default)]
    customers: Vec<Customer>,
    #[serde(default)]
    orders: Vec<Order>,
    #[serde(default)]
    products: Vec<Product>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: {} <config.yaml> <fixture.json>", args[0]);
        process::exit(2);
    }

    if let Err(e) = run(&args[1], &args[2]).await {
        eprintln!("shopgraph: {e}");
        process::exit(1);
    }
}

async fn run(config_path: &str, fixture_path: &str) -> DataResult<()> {
    let config = Config::load_from_yaml(config_path)?;

    // Initialize logging
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let log_task = match config.log.clone() {
        Some(log_cfg) => {
            let mut logger = Logger::new(log_cfg);
            logger.init_env_logger()?;
            Some(tokio::spawn(async move { logger.run(shutdown_rx).await }))
        }
        None => {
            env_logger::init();
            None
        }
    };

    let raw = tokio::fs::read_to_string(fixture_path)
        .await
        .with_context("Unable to read fixture file")?;
    let fixture: Fixture = serde_json::from_str(&raw).with_context("Invalid fixture file")?;
    info!(
        "Seeding store with {} customers, {} orders, {} products",
        fixture.customers.len(),
        fixture.orders.len(),
        fixture.products.len()
    );

    let store = MemoryStore::new();
    let order_ids: Vec<String> = fixture.orders.iter().map(|o| o.id.clone()).collect();
    fixture.customers.into_iter().for_each(|c| store.insert_customer(c));
    fixture.orders.into_iter().for_each(|o| store.insert_order(o));
    fixture.products.into_iter().for_each(|p| store.insert_product(p));

    let factory = ContextFactory::new(config, Arc::new(store));
    let ctx = factory.create_context();

    let orders = ctx
        .loaders
        .order
        .load_many(order_ids)
        .await
        .into_iter()
        .collect::<DataResult<Vec<_>>>()?
        .into_iter()
        .flatten()
        .collect();
    let views = assemble::orders_with_customers(&ctx, orders).await;
    println!(
        "{}",
        serde_json::to_string_pretty(&views).with_context("Failed to render orders")?
    );

    info!(
        "Request {} used {} store round trips",
        ctx.request_id,
        ctx.stats().store_round_trips()
    );
    debug!("{}", metrics::gather_text());
    drop(ctx);

    let _ = shutdown_tx.send(true);
    if let Some(task) = log_task {
        task.await.with_context("Log writer stopped unexpectedly")??;
    }
    Ok(())
}
