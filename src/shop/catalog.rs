//! Catalog store: listing, detail and staff maintenance of products.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, info};

use crate::cache::{AppCache, CatalogPage};
use crate::db::Store;
use crate::error::{AppError, Result};
use crate::forms::FormErrors;
use crate::models::{NewProduct, Product};

use super::pagination::Page;
use super::pricing::round_money;

pub const PRODUCTS_PER_PAGE: i64 = 6;
pub const SLUG_MAX_LEN: usize = 50;

/// URL-safe slug: lowercase ASCII alphanumerics, other runs collapse to `-`
pub fn slugify(name: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(SLUG_MAX_LEN);
    slug.trim_end_matches('-').to_string()
}

fn is_valid_slug(slug: &str) -> bool {
    !slug.is_empty()
        && slug.len() <= SLUG_MAX_LEN
        && slug
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Storage path for a product image: `products/{id}.{ext}`
pub fn image_file_path(product_id: i64, filename: &str) -> String {
    let ext = filename.rsplit('.').next().unwrap_or(filename).to_lowercase();
    format!("products/{}.{}", product_id, ext)
}

/// One page of the in-sale catalog, served from cache when warm
pub async fn catalog_page(store: &dyn Store, cache: &AppCache, number: i64) -> Result<Arc<CatalogPage>> {
    if let Some(cached) = cache.catalog_pages.get(&number).await {
        debug!("Cache HIT for catalog page: {}", number);
        return Ok(cached);
    }
    debug!("Cache MISS for catalog page: {}", number);

    let total = store.count_products_in_sale().await?;
    let page = Page::new(number, PRODUCTS_PER_PAGE, total)?;
    let products = store.products_in_sale(page.per_page, page.offset()).await?;
    let listing = Arc::new(CatalogPage { products, page });
    cache.catalog_pages.insert(number, listing.clone()).await;
    Ok(listing)
}

/// A product by slug, whether or not it is on sale
pub async fn product_detail(store: &dyn Store, cache: &AppCache, slug: &str) -> Result<Arc<Product>> {
    if let Some(cached) = cache.products.get(slug).await {
        debug!("Cache HIT for product: {}", slug);
        return Ok(cached);
    }
    debug!("Cache MISS for product: {}", slug);

    let product = store
        .find_product_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound)?;
    let product = Arc::new(product);
    cache.products.insert(slug.to_string(), product.clone()).await;
    Ok(product)
}

pub async fn product_by_slug(store: &dyn Store, slug: &str) -> Result<Product> {
    store
        .find_product_by_slug(slug)
        .await?
        .ok_or(AppError::NotFound)
}

fn parse_price(raw: &str) -> Result<Decimal> {
    let price = raw
        .trim()
        .parse::<Decimal>()
        .map_err(|_| AppError::invalid("price", "Enter a number."))?;
    if price.is_sign_negative() || price.scale() > 2 || price >= Decimal::from(100_000_000) {
        return Err(AppError::invalid(
            "price",
            "Enter a non-negative amount with at most 2 decimal places.",
        ));
    }
    let mut price = round_money(price, 2);
    price.rescale(2);
    Ok(price)
}

/// Staff form for a new product
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub in_sale: Option<String>,
}

impl ProductForm {
    pub fn parse(&self) -> Result<NewProduct> {
        let mut errors = FormErrors::default();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.add("name", "This field is required.");
        } else if name.chars().count() > 300 {
            errors.add("name", "Ensure this value has at most 300 characters.");
        }

        let slug = if self.slug.trim().is_empty() {
            slugify(&name)
        } else {
            self.slug.trim().to_string()
        };
        if !is_valid_slug(&slug) {
            errors.add("slug", "Enter a valid slug of letters, numbers, underscores or hyphens.");
        }

        let price = if self.price.trim().is_empty() {
            Ok(Decimal::ZERO)
        } else {
            parse_price(&self.price)
        };
        let price = match price {
            Ok(price) => price,
            Err(AppError::Validation(e)) => {
                errors.extend(e);
                Decimal::ZERO
            }
            Err(e) => return Err(e),
        };

        errors.into_result()?;
        Ok(NewProduct {
            name,
            slug,
            description: self.description.trim().to_string(),
            price,
            in_sale: self.in_sale.is_some(),
        })
    }
}

pub async fn create_product(store: &dyn Store, form: &ProductForm) -> Result<Product> {
    let product = match store.create_product(form.parse()?).await {
        Ok(product) => product,
        Err(AppError::Conflict(_)) => {
            return Err(AppError::invalid("slug", "Product with this slug already exists."))
        }
        Err(e) => return Err(e),
    };
    info!(product_id = product.id, slug = %product.slug, "Product created");
    Ok(product)
}

pub async fn set_price(store: &dyn Store, slug: &str, raw_price: &str) -> Result<Product> {
    let product = product_by_slug(store, slug).await?;
    let price = parse_price(raw_price)?;
    store.set_product_price(product.id, price).await?;
    info!(product_id = product.id, %price, "Price updated");
    product_by_slug(store, slug).await
}

/// Put products on sale or withdraw them; returns how many changed
pub async fn set_in_sale(store: &dyn Store, ids: &[i64], in_sale: bool) -> Result<u64> {
    let updated = store.set_in_sale(ids, in_sale).await?;
    info!(updated, in_sale, "Bulk sale status change");
    Ok(updated)
}

pub async fn delete_product(store: &dyn Store, id: i64) -> Result<()> {
    store.delete_product(id).await?;
    info!(product_id = id, "Product deleted");
    Ok(())
}

/// Validate an uploaded image and store it under the media root
pub async fn save_product_image(
    store: &dyn Store,
    media_root: &Path,
    product: &Product,
    filename: &str,
    bytes: &[u8],
) -> Result<String> {
    if image::guess_format(bytes).is_err() {
        return Err(AppError::invalid("image", "Upload a valid image."));
    }

    let relative = image_file_path(product.id, filename);
    let target: PathBuf = media_root.join(&relative);
    if let Some(dir) = target.parent() {
        tokio::fs::create_dir_all(dir).await?;
    }
    tokio::fs::write(&target, bytes).await?;
    store.set_product_image(product.id, &relative).await?;

    info!(product_id = product.id, path = %relative, "Product image stored");
    Ok(relative)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::shop::test_support::seed_product;
    use rust_decimal_macros::dec;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Rust for Beginners"), "rust-for-beginners");
        assert_eq!(slugify("  C++ & Go!  "), "c-go");
        assert_eq!(slugify("2024: Year in review"), "2024-year-in-review");
        assert!(slugify(&"long name ".repeat(20)).len() <= SLUG_MAX_LEN);
        assert!(!slugify(&"ab ".repeat(30)).ends_with('-'));
    }

    #[test]
    fn test_image_file_path() {
        assert_eq!(image_file_path(7, "Cover.PNG"), "products/7.png");
        assert_eq!(image_file_path(7, "archive.tar.JPG"), "products/7.jpg");
    }

    #[test]
    fn test_product_form() {
        let form = ProductForm {
            name: "Rust Basics".into(),
            price: "10.5".into(),
            in_sale: Some("on".into()),
            ..Default::default()
        };
        let product = form.parse().unwrap();
        assert_eq!(product.slug, "rust-basics");
        assert_eq!(product.price, dec!(10.50));
        assert!(product.in_sale);

        let bad = ProductForm {
            name: String::new(),
            price: "-1".into(),
            ..Default::default()
        };
        match bad.parse() {
            Err(AppError::Validation(errors)) => {
                assert!(errors.get("name").is_some());
                assert!(errors.get("price").is_some());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_a_form_error() {
        let store = MemoryStore::new();
        seed_product(&store, "rust-basics", dec!(1.00)).await;

        let form = ProductForm {
            name: "Rust Basics".into(),
            ..Default::default()
        };
        match create_product(&store, &form).await {
            Err(AppError::Validation(errors)) => assert!(errors.get("slug").is_some()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_catalog_page_lists_in_sale_only() {
        let store = MemoryStore::new();
        let cache = AppCache::new();
        for i in 0..8 {
            seed_product(&store, &format!("p{}", i), dec!(1.00)).await;
        }
        let hidden = seed_product(&store, "hidden", dec!(1.00)).await;
        store.set_in_sale(&[hidden.id], false).await.unwrap();

        let first = catalog_page(&store, &cache, 1).await.unwrap();
        assert_eq!(first.products.len(), 6);
        assert_eq!(first.page.total_pages, 2);

        let second = catalog_page(&store, &cache, 2).await.unwrap();
        assert_eq!(second.products.len(), 2);
        assert!(second.products.iter().all(|p| p.in_sale));

        assert!(matches!(catalog_page(&store, &cache, 3).await, Err(AppError::NotFound)));
    }

    #[tokio::test]
    async fn test_bulk_withdraw_counts() {
        let store = MemoryStore::new();
        let a = seed_product(&store, "a", dec!(1.00)).await;
        let b = seed_product(&store, "b", dec!(1.00)).await;

        assert_eq!(set_in_sale(&store, &[a.id, b.id], false).await.unwrap(), 2);
        assert_eq!(store.count_products_in_sale().await.unwrap(), 0);
        assert_eq!(set_in_sale(&store, &[a.id], true).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_save_product_image() {
        let store = MemoryStore::new();
        let product = seed_product(&store, "rust", dec!(1.00)).await;
        let media = std::env::temp_dir().join(format!("courseshop-test-{}", uuid::Uuid::new_v4()));

        let path = save_product_image(&store, &media, &product, "cover.PNG", PNG_HEADER)
            .await
            .unwrap();
        assert_eq!(path, format!("products/{}.png", product.id));
        assert!(media.join(&path).exists());

        let stored = store.find_product_by_slug("rust").await.unwrap().unwrap();
        assert_eq!(stored.image.as_deref(), Some(path.as_str()));

        let err = save_product_image(&store, &media, &product, "notes.txt", b"hello")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let _ = std::fs::remove_dir_all(&media);
    }
}
