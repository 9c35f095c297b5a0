// src/db.rs

use sqlx::error::DatabaseError;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

use crate::models::{Cart, CartItem, Payment, Product};

pub fn map_product_row(r: &PgRow) -> Product {
    Product {
        id: r.get("id"),
        title: r.get("title"),
        description: r.get("description"),
        price: r.get("price"),
        image: r.get("image"),
        category: r.get("category"),
        author: r.get("author"),
        stock: r.get("stock"),
        is_available: r.get("is_available"),
        created_at: r.get("created_at"),
    }
}

pub async fn list_available_products(
    pool: &PgPool,
    category: Option<&str>,
) -> Result<Vec<Product>, sqlx::Error> {
    let rows = match category {
        Some(category) => {
            sqlx::query(
                r#"SELECT id, title, description, price::text as price, image, category,
                          author, stock, is_available, created_at
                   FROM products
                   WHERE is_available = true AND category = $1
                   ORDER BY title ASC"#,
            )
            .bind(category)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(
                r#"SELECT id, title, description, price::text as price, image, category,
                          author, stock, is_available, created_at
                   FROM products
                   WHERE is_available = true
                   ORDER BY title ASC"#,
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.iter().map(map_product_row).collect())
}

pub async fn get_product(pool: &PgPool, id: i32) -> Result<Option<Product>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, title, description, price::text as price, image, category,
                  author, stock, is_available, created_at
           FROM products
           WHERE id = $1"#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.as_ref().map(map_product_row))
}

/// Every user has exactly one cart; it is created lazily on first access.
pub async fn get_or_create_cart(pool: &PgPool, user_id: i32) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO carts (user_id)
           VALUES ($1)
           ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
           RETURNING id"#,
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("id"))
}

pub async fn load_cart(pool: &PgPool, user_id: i32) -> Result<Cart, sqlx::Error> {
    let cart_id = get_or_create_cart(pool, user_id).await?;

    let item_rows = sqlx::query(
        r#"SELECT ci.product_id, p.title, ci.quantity, ci.price::text as price
           FROM cart_items ci
           JOIN products p ON p.id = ci.product_id
           WHERE ci.cart_id = $1
           ORDER BY ci.id ASC"#,
    )
    .bind(cart_id)
    .fetch_all(pool)
    .await?;

    let items = item_rows
        .into_iter()
        .map(|r| CartItem {
            product_id: r.get("product_id"),
            title: r.get("title"),
            quantity: r.get("quantity"),
            price: r.get("price"),
        })
        .collect();

    let total: String = sqlx::query(r#"SELECT total::text as total FROM carts WHERE id = $1"#)
        .bind(cart_id)
        .fetch_one(pool)
        .await?
        .get("total");

    Ok(Cart {
        id: cart_id,
        user_id,
        items,
        total,
    })
}

/// Recomputes the denormalized cart total from its line items.
/// Called after every cart mutation so `total == sum(price * quantity)` holds.
pub async fn recompute_cart_total(pool: &PgPool, cart_id: i32) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"UPDATE carts
           SET total = (
               SELECT COALESCE(SUM(price * quantity), 0)
               FROM cart_items
               WHERE cart_id = $1
           ),
           updated_at = NOW()
           WHERE id = $1"#,
    )
    .bind(cart_id)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn clear_cart(pool: &PgPool, user_id: i32) -> Result<(), sqlx::Error> {
    let cart_id = get_or_create_cart(pool, user_id).await?;
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1")
        .bind(cart_id)
        .execute(pool)
        .await?;
    recompute_cart_total(pool, cart_id).await
}

pub fn map_payment_row(r: &PgRow) -> Payment {
    Payment {
        id: r.get("id"),
        user_id: r.get("user_id"),
        title: r.get("title"),
        description: r.get("description"),
        amount: r.get("amount"),
        status: r.get("status"),
        reference: r.get("reference"),
        product_ids: r.get("product_ids"),
        verified_by: r.get("verified_by"),
        verified_at: r.get("verified_at"),
        receipt_code: r.get("receipt_code"),
        admin_notes: r.get("admin_notes"),
        created_at: r.get("created_at"),
    }
}

pub const PAYMENT_COLUMNS: &str = r#"id, user_id, title, description, amount::text as amount,
    status, reference, product_ids, verified_by, verified_at, receipt_code,
    admin_notes, created_at"#;

pub async fn get_payment(pool: &PgPool, id: i32) -> Result<Option<Payment>, sqlx::Error> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = $1");
    let row = sqlx::query(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(map_payment_row))
}

pub async fn get_payment_by_reference(
    pool: &PgPool,
    reference: &str,
) -> Result<Option<Payment>, sqlx::Error> {
    let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reference = $1");
    let row = sqlx::query(&sql).bind(reference).fetch_optional(pool).await?;
    Ok(row.as_ref().map(map_payment_row))
}

/// Maps a unique-violation error to the conflicting field name, if any.
pub fn duplicate_key_field(err: &sqlx::Error) -> Option<&'static str> {
    let db_err = match err {
        sqlx::Error::Database(e) => e,
        _ => return None,
    };
    if db_err.code().as_deref() != Some("23505") {
        return None;
    }
    match db_err.constraint() {
        Some("users_email_key") => Some("email"),
        Some("users_username_key") => Some("username"),
        Some("payments_reference_key") => Some("reference"),
        Some("payments_receipt_code_key") => Some("receipt_code"),
        Some("quizzes_share_code_key") => Some("share_code"),
        Some("cart_items_cart_product_key") => Some("product_id"),
        Some("rate_limits_user_action_key") => Some("action"),
        Some("carts_user_id_key") => Some("user_id"),
        _ => Some("unique"),
    }
}
