//! # Seed Data Generator
//!
//! Populates the inventory table with demo products for development.
//!
//! ## Usage
//! ```bash
//! # Generate 200 inventory units (default)
//! cargo run -p basket-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p basket-db --bin seed -- --count 1000
//!
//! # Specify database path
//! cargo run -p basket-db --bin seed -- --db ./data/basket.db
//! ```
//!
//! Each unit gets a reference `{RANGE}-{NAME}-{NNN}`, a VAT-inclusive retail
//! price between £1.99 and £49.99, and every fifth unit a promotional price
//! 20% below retail.

use basket_core::Money;
use basket_db::{Database, DbConfig, InventoryItem};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Product ranges for realistic test data
const RANGES: &[(&str, &[&str])] = &[
    (
        "GDN",
        &[
            "Garden Hose",
            "Rake",
            "Trowel",
            "Watering Can",
            "Compost",
            "Plant Pot",
            "Secateurs",
            "Gloves",
        ],
    ),
    (
        "KIT",
        &[
            "Kettle",
            "Toaster",
            "Frying Pan",
            "Chef Knife",
            "Chopping Board",
            "Mixing Bowl",
        ],
    ),
    (
        "DIY",
        &[
            "Hammer",
            "Drill Bits",
            "Screwdriver Set",
            "Wood Glue",
            "Sandpaper",
            "Tape Measure",
            "Paint Roller",
        ],
    ),
    (
        "LIT",
        &["LED Bulb", "Desk Lamp", "Torch", "Fairy Lights", "Floor Lamp"],
    ),
];

/// Size variants with a price uplift in pence.
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 150),
    ("Large", 400),
    ("XL", 900),
    ("Twin Pack", 600),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 200;
    let mut db_path = String::from("./basket_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(200);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Basket Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of inventory units (default: 200)");
                println!("  -d, --db <PATH>    Database file path (default: ./basket_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding inventory");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let inventory = db.inventory();

    let existing = inventory.count().await?;
    if existing > 0 {
        warn!(existing, "Inventory already populated, skipping seed");
        println!("Database already has {} inventory units.", existing);
        println!("Delete the database file to regenerate.");
        return Ok(());
    }

    let start = std::time::Instant::now();
    let mut generated = 0;

    'outer: for (range_idx, (range_code, names)) in RANGES.iter().enumerate() {
        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, uplift)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let item = generate_item(
                    range_code,
                    name,
                    size,
                    *uplift,
                    range_idx * 1000 + name_idx * 20 + size_idx,
                );

                if let Err(e) = inventory.upsert(&item).await {
                    warn!(inventory_ref = %item.inventory_ref, error = %e, "Failed to insert");
                    continue;
                }

                generated += 1;
            }
        }
    }

    let elapsed = start.elapsed();
    println!("Generated {} inventory units in {:?}", generated, elapsed);

    db.close().await;
    Ok(())
}

/// Builds one inventory unit from its position in the catalogue.
fn generate_item(range: &str, name: &str, size: &str, uplift: i64, seed: usize) -> InventoryItem {
    let code: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(3)
        .collect::<String>()
        .to_uppercase();
    let inventory_ref = format!("{}-{}-{:03}", range, code, seed % 1000);

    // £1.99 - £39.99 base plus size uplift
    let base = 199 + ((seed * 37) % 3800) as i64;
    let retail = base + uplift;

    let promotional_price = (seed % 5 == 0).then(|| Money::from_minor(retail * 80 / 100));

    InventoryItem::new(
        inventory_ref,
        format!("{} {}", name, size),
        Money::from_minor(retail),
        promotional_price,
    )
}
