//! # Seed Data Generator
//!
//! Populates a development database with suppliers and product variants.
//!
//! ## Usage
//! ```bash
//! cargo run -p toko-db --bin seed
//! cargo run -p toko-db --bin seed -- --db ./data/toko.db
//! ```
//!
//! Stock is not seeded here. Aggregates are written only by the reconciler,
//! so opening stock is recorded as purchases through the API.

use chrono::Utc;
use std::env;
use toko_core::{ProductVariant, Supplier};
use toko_db::{Database, DbConfig};
use uuid::Uuid;

const SUPPLIERS: &[(&str, &str)] = &[
    ("CV Sumber Rejeki", "0812-1000-2000"),
    ("PT Maju Bersama", "0813-3000-4000"),
    ("UD Sinar Jaya", "0857-5000-6000"),
];

/// (product, variant names, base price in minor units)
const PRODUCTS: &[(&str, &[&str], i64)] = &[
    ("Beras Pandan Wangi", &["1kg", "5kg"], 14_500),
    ("Gula Pasir", &["500g", "1kg"], 8_000),
    ("Minyak Goreng", &["1L", "2L"], 17_000),
    ("Teh Celup", &["25s", "50s"], 6_500),
    ("Kopi Bubuk", &["100g", "200g"], 12_000),
    ("Susu UHT", &["200ml", "1L"], 5_500),
    ("Mie Instan Goreng", &["pcs", "dus"], 3_100),
    ("Sabun Mandi", &["85g", "3 pack"], 4_200),
];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("info,toko_db=debug")
        .init();

    let args: Vec<String> = env::args().collect();
    let mut db_path = "./toko_dev.db".to_string();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Toko Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -d, --db <PATH>    Database file path (default: ./toko_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("Toko Seed Data Generator");
    println!("========================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;
    println!("✓ Connected, migrations applied");

    let existing = db.variants().list(false, 1).await?;
    if !existing.is_empty() {
        println!("⚠ Database already has variants, skipping seed.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    for (name, phone) in SUPPLIERS {
        db.suppliers()
            .insert(&Supplier {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                phone: Some(phone.to_string()),
                created_at: Utc::now(),
            })
            .await?;
    }
    println!("✓ {} suppliers", SUPPLIERS.len());

    let mut generated = 0;
    for (product_idx, (product, variants, base_price)) in PRODUCTS.iter().enumerate() {
        let product_id = Uuid::new_v4().to_string();

        for (variant_idx, size) in variants.iter().enumerate() {
            let variant = generate_variant(&product_id, product, size, *base_price, product_idx * 10 + variant_idx);

            if let Err(e) = db.variants().insert(&variant).await {
                eprintln!("Failed to insert {}: {}", variant.barcode, e);
                continue;
            }
            generated += 1;
        }
    }

    println!("✓ {} variants", generated);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Larger packs cost proportionally more.
fn generate_variant(product_id: &str, product: &str, size: &str, base_price: i64, seed: usize) -> ProductVariant {
    let now = Utc::now();
    let multiplier = 1 + (seed % 10) as i64 * 3;

    ProductVariant {
        id: Uuid::new_v4().to_string(),
        product_id: product_id.to_string(),
        name: format!("{} {}", product, size),
        barcode: format!("899{:010}", seed),
        unit: "pcs".to_string(),
        selling_price: base_price * multiplier,
        is_active: true,
        created_at: now,
        updated_at: now,
    }
}
