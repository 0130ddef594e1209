//! # Basket Demo
//!
//! Walks one shopper through the cart lifecycle against a real database:
//! browse anonymously, sign in, see the carts merged.
//!
//! ## Usage
//! ```bash
//! RUST_LOG=debug BASKET_DATABASE_PATH=./basket_dev.db cargo run -p basket-cart --bin basket-demo
//! ```

use anyhow::{Context, Result};
use basket_cart::{CartConfig, CartService, MergeOutcome, RequestIdentity};
use basket_core::{FulfillmentType, Money, OwnerKey};
use basket_db::InventoryItem;
use tracing::info;
use tracing_subscriber::EnvFilter;

const SESSION_ID: &str = "demo-session";
const USER_ID: &str = "demo-user";

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = CartConfig::load().context("reading BASKET_* environment")?;
    info!(
        path = %config.database_path,
        vat_bps = config.vat_rate_bps,
        delivery_charge = %config.delivery_charge,
        "Starting basket demo"
    );

    let service = CartService::open(&config)
        .await
        .context("opening cart database")?;
    seed_inventory(&service).await?;

    // Anonymous browsing
    let session = OwnerKey::session(SESSION_ID);
    service
        .add_item(&session, "DEMO-PAINT", FulfillmentType::ForCollection, 2)
        .await?;
    service
        .add_item(&session, "DEMO-ROLLER", FulfillmentType::ForDelivery, 1)
        .await?;

    // Same person, earlier visit, signed in
    let user = OwnerKey::user(USER_ID);
    service
        .add_item(&user, "DEMO-PAINT", FulfillmentType::ForCollection, 1)
        .await?;

    match service.on_authenticated(SESSION_ID, USER_ID).await? {
        MergeOutcome::NoAnonymousCart => info!("Nothing to merge"),
        MergeOutcome::Promoted { .. } => info!("Anonymous cart promoted"),
        MergeOutcome::Merged {
            lines_merged,
            lines_added,
            ..
        } => info!(lines_merged, lines_added, "Carts merged"),
    }

    let request = RequestIdentity {
        session_id: Some(SESSION_ID.to_string()),
        user_id: Some(USER_ID.to_string()),
    };
    let priced = service
        .resolve_and_get(&request)
        .await?
        .context("signed-in shopper has no cart")?;

    println!("{}", serde_json::to_string_pretty(&priced)?);

    // Leave the database ready for the next run
    service.clear_cart(&user).await?;

    Ok(())
}

async fn seed_inventory(service: &CartService<basket_cart::SqliteCartStore>) -> Result<()> {
    let inventory = service.store().database().inventory();

    let items = [
        InventoryItem::new("DEMO-PAINT", "Emulsion 5L", Money::from_minor(2499), None),
        InventoryItem::new(
            "DEMO-ROLLER",
            "Paint Roller",
            Money::from_minor(899),
            Some(Money::from_minor(699)),
        ),
    ];
    for item in &items {
        inventory.upsert(item).await?;
    }

    info!(
        count = items.len(),
        total = inventory.count().await?,
        "Demo inventory ready"
    );
    Ok(())
}
