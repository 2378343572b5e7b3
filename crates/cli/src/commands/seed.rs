//! Seed the catalog from a YAML file.
//!
//! Categories are matched by name, products by name within their category.
//! Matches are updated in place, everything else is created. Nothing is
//! deleted, so the command is safe to re-run.
//!
//! A running server is not notified. It keeps serving its cached catalog
//! until those entries expire (5 minutes), so restart it if the seeded data
//! must show up at once.
//!
//! ```yaml
//! categories:
//!   - name: Drinks
//!     description: Cold drinks and juices
//!     products:
//!       - name: Milo Packet
//!         price: "1.20"
//!         stock: 40
//!       - name: Apple Juice
//!         price: "1.50"
//!         stock: 8
//!         image: https://cdn.example.com/apple-juice.png
//! ```

use std::collections::HashSet;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{error, info};

use etuckshop_server::cache::CatalogCache;
use etuckshop_server::db::RepositoryError;
use etuckshop_server::db::categories::{CategoryFields, CategoryRepository};
use etuckshop_server::db::products::{ProductFields, ProductRepository};
use etuckshop_server::error::AppError;
use etuckshop_server::services::CatalogService;

use super::{ConnectError, connect};

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("{0} validation errors found")]
    Invalid(usize),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("{0}")]
    Catalog(#[from] AppError),
}

/// Top-level seed file.
#[derive(Debug, Deserialize)]
pub struct CatalogSeed {
    #[serde(default)]
    pub categories: Vec<SeedCategory>,
}

/// A category and its products.
#[derive(Debug, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub products: Vec<SeedProduct>,
}

/// A product to upsert.
#[derive(Debug, Deserialize)]
pub struct SeedProduct {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub price: Decimal,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub image: Option<String>,
}

/// Counts reported after seeding.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub categories_created: usize,
    pub categories_updated: usize,
    pub products_created: usize,
    pub products_updated: usize,
}

/// Check a parsed seed file before touching the database.
///
/// Returns one message per problem; an empty list means the file is usable.
#[must_use]
pub fn validate(seed: &CatalogSeed) -> Vec<String> {
    let mut errors = Vec::new();
    let mut category_names = HashSet::new();

    for category in &seed.categories {
        let name = category.name.trim();
        if name.is_empty() {
            errors.push("category with an empty name".to_string());
            continue;
        }
        if !category_names.insert(name.to_lowercase()) {
            errors.push(format!("category '{name}' is listed twice"));
        }

        let mut product_names = HashSet::new();
        for product in &category.products {
            let product_name = product.name.trim();
            if product_name.is_empty() {
                errors.push(format!("{name}: product with an empty name"));
                continue;
            }
            if !product_names.insert(product_name.to_lowercase()) {
                errors.push(format!("{name}: product '{product_name}' is listed twice"));
            }
            if product.price <= Decimal::ZERO {
                errors.push(format!("{name}: '{product_name}' must have a positive price"));
            }
            if product.stock < 0 {
                errors.push(format!("{name}: '{product_name}' has negative stock"));
            }
        }
    }

    errors
}

/// Seed categories and products from a YAML file.
///
/// # Errors
///
/// Returns an error if the file can't be read or fails validation, or if a
/// database write is rejected.
pub async fn catalog(file_path: &str) -> Result<SeedSummary, SeedError> {
    let path = Path::new(file_path);
    if !path.exists() {
        return Err(SeedError::FileNotFound(file_path.to_owned()));
    }

    info!(path = %file_path, "Loading catalog from file");

    // Read and validate YAML before connecting to database
    let content = tokio::fs::read_to_string(path).await?;
    let seed: CatalogSeed = serde_yaml::from_str(&content)?;

    info!(categories = seed.categories.len(), "Parsed catalog");

    let errors = validate(&seed);
    if !errors.is_empty() {
        error!("Catalog validation failed:");
        for err in &errors {
            error!("  - {err}");
        }
        return Err(SeedError::Invalid(errors.len()));
    }

    let pool = connect().await?;

    // Writes go through the service for its validation. This cache is
    // process-local and discarded on exit; the server's own cache is untouched
    let cache = CatalogCache::default();
    let service = CatalogService::new(&pool, &cache);
    let categories = CategoryRepository::new(&pool);
    let products = ProductRepository::new(&pool);

    let mut summary = SeedSummary::default();

    for category in seed.categories {
        let fields = CategoryFields {
            name: category.name.trim().to_owned(),
            description: category.description,
        };

        let category_id = match categories.find_by_name(&fields.name).await? {
            Some(existing) => {
                summary.categories_updated += 1;
                service.update_category(existing.id, fields).await?.id
            }
            None => {
                summary.categories_created += 1;
                service.create_category(fields).await?.id
            }
        };

        for product in category.products {
            let fields = ProductFields {
                name: product.name.trim().to_owned(),
                description: product.description,
                price: product.price,
                stock: product.stock,
                category_id,
                image: product.image,
            };

            match products.find_by_name(category_id, &fields.name).await? {
                Some(existing) => {
                    service.update_product(existing.id, fields).await?;
                    summary.products_updated += 1;
                }
                None => {
                    service.create_product(fields).await?;
                    summary.products_created += 1;
                }
            }
        }
    }

    info!("Seeding complete!");
    info!(
        "  Categories: {} created, {} updated",
        summary.categories_created, summary.categories_updated
    );
    info!(
        "  Products: {} created, {} updated",
        summary.products_created, summary.products_updated
    );

    Ok(summary)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
categories:
  - name: Drinks
    description: Cold drinks
    products:
      - name: Milo Packet
        price: "1.20"
        stock: 40
      - name: Apple Juice
        price: 1.5
  - name: Snacks
"#;

    #[test]
    fn test_parses_sample_with_defaults() {
        let seed: CatalogSeed = serde_yaml::from_str(SAMPLE).unwrap();

        assert_eq!(seed.categories.len(), 2);
        let drinks = &seed.categories[0];
        assert_eq!(drinks.products[0].price, Decimal::new(120, 2));
        assert_eq!(drinks.products[1].stock, 0);
        assert!(drinks.products[1].image.is_none());
        assert!(seed.categories[1].products.is_empty());
        assert!(validate(&seed).is_empty());
    }

    #[test]
    fn test_rejects_duplicates_and_bad_numbers() {
        let seed: CatalogSeed = serde_yaml::from_str(
            r#"
categories:
  - name: Drinks
    products:
      - { name: Milo, price: "0", stock: 1 }
      - { name: milo, price: "1.00", stock: -2 }
  - name: " drinks "
"#,
        )
        .unwrap();

        let errors = validate(&seed);

        assert_eq!(errors.len(), 4, "{errors:?}");
        assert!(errors.iter().any(|e| e.contains("positive price")));
        assert!(errors.iter().any(|e| e.contains("negative stock")));
        assert!(errors.iter().any(|e| e.contains("'milo' is listed twice")));
        assert!(errors.iter().any(|e| e.contains("'drinks' is listed twice")));
    }

    #[test]
    fn test_missing_price_is_a_parse_error() {
        let result: Result<CatalogSeed, _> =
            serde_yaml::from_str("categories:\n  - name: Drinks\n    products:\n      - name: Milo\n");
        assert!(result.is_err());
    }
}
