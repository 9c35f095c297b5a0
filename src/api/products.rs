// src/api/products.rs

use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;
use sqlx::error::DatabaseError;
use sqlx::Row;

use crate::{db, AppState};

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub category: Option<String>,
}

#[get("/products")]
pub async fn list_products(
    state: web::Data<AppState>,
    query: web::Query<ListQuery>,
) -> impl Responder {
    match db::list_available_products(&state.pool, query.category.as_deref()).await {
        Ok(products) => HttpResponse::Ok().json(json!({ "products": products })),
        Err(e) => {
            log::error!("list_products db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[get("/products/{id}")]
pub async fn get_product(state: web::Data<AppState>, path: web::Path<i32>) -> impl Responder {
    match db::get_product(&state.pool, path.into_inner()).await {
        Ok(Some(product)) => HttpResponse::Ok().json(json!({ "product": product })),
        Ok(None) => HttpResponse::NotFound().json(json!({ "error": "product not found" })),
        Err(e) => {
            log::error!("get_product db error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductRequest {
    pub title: String,
    pub description: Option<String>,
    pub price: String,
    pub image: Option<String>,
    pub category: String,
    pub author: Option<String>,
    pub stock: Option<i32>,
    pub is_available: Option<bool>,
}

#[post("/products")]
pub async fn admin_create_product(
    state: web::Data<AppState>,
    payload: web::Json<ProductRequest>,
) -> impl Responder {
    if payload.title.trim().is_empty() || payload.category.trim().is_empty() {
        return HttpResponse::BadRequest().json(json!({ "error": "title and category are required" }));
    }
    if payload.price.parse::<f64>().map(|p| p < 0.0).unwrap_or(true) {
        return HttpResponse::BadRequest().json(json!({ "error": "price must be a non-negative number" }));
    }

    let row = match sqlx::query(
        r#"INSERT INTO products (title, description, price, image, category, author, stock, is_available)
           VALUES ($1, $2, $3::numeric, $4, $5, $6, $7, $8)
           RETURNING id"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(&payload.price)
    .bind(payload.image.as_deref())
    .bind(payload.category.trim())
    .bind(payload.author.as_deref())
    .bind(payload.stock.unwrap_or(0))
    .bind(payload.is_available.unwrap_or(true))
    .fetch_one(&state.pool)
    .await
    {
        Ok(r) => r,
        Err(e) => {
            log::error!("create product error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let id: i32 = row.get("id");
    match db::get_product(&state.pool, id).await {
        Ok(Some(product)) => HttpResponse::Ok().json(json!({ "product": product })),
        _ => HttpResponse::Ok().json(json!({ "id": id })),
    }
}

#[put("/products/{id}")]
pub async fn admin_update_product(
    state: web::Data<AppState>,
    path: web::Path<i32>,
    payload: web::Json<ProductRequest>,
) -> impl Responder {
    let id = path.into_inner();

    if payload.price.parse::<f64>().map(|p| p < 0.0).unwrap_or(true) {
        return HttpResponse::BadRequest().json(json!({ "error": "price must be a non-negative number" }));
    }

    let result = sqlx::query(
        r#"UPDATE products
           SET title = $1, description = $2, price = $3::numeric, image = $4,
               category = $5, author = $6, stock = $7, is_available = $8
           WHERE id = $9"#,
    )
    .bind(payload.title.trim())
    .bind(payload.description.as_deref())
    .bind(&payload.price)
    .bind(payload.image.as_deref())
    .bind(payload.category.trim())
    .bind(payload.author.as_deref())
    .bind(payload.stock.unwrap_or(0))
    .bind(payload.is_available.unwrap_or(true))
    .bind(id)
    .execute(&state.pool)
    .await;

    match result {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "product not found" }))
        }
        Ok(_) => match db::get_product(&state.pool, id).await {
            Ok(Some(product)) => HttpResponse::Ok().json(json!({ "product": product })),
            _ => HttpResponse::Ok().json(json!({ "id": id })),
        },
        Err(e) => {
            log::error!("update product error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/products/{id}")]
pub async fn admin_delete_product(
    state: web::Data<AppState>,
    path: web::Path<i32>,
) -> impl Responder {
    match sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(path.into_inner())
        .execute(&state.pool)
        .await
    {
        Ok(r) if r.rows_affected() == 0 => {
            HttpResponse::NotFound().json(json!({ "error": "product not found" }))
        }
        Ok(_) => HttpResponse::Ok().json(json!({ "deleted": true })),
        Err(e) => {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.code().as_deref() == Some("23503") {
                    return HttpResponse::BadRequest().json(json!({
                        "error": "product is referenced by carts or payments; mark it unavailable instead"
                    }));
                }
            }
            log::error!("delete product error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
