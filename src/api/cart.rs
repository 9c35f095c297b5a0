// src/api/cart.rs

use actix_web::web::ReqData;
use actix_web::{delete, get, post, put, web, HttpResponse, Responder};
use serde::Deserialize;
use serde_json::json;

use crate::{db, AppState};

#[get("/cart")]
pub async fn get_cart(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    match db::load_cart(&state.pool, *user_id).await {
        Ok(cart) => HttpResponse::Ok().json(json!({ "cart": cart })),
        Err(e) => {
            log::error!("get_cart error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    pub product_id: i32,
    pub quantity: Option<i32>,
}

/// Adds a product to the cart, capturing its price at add time. Re-adding
/// the same product increments the quantity but keeps the captured price.
#[post("/cart/items")]
pub async fn add_item(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    payload: web::Json<AddItemRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let quantity = payload.quantity.unwrap_or(1);

    if quantity < 1 {
        return HttpResponse::BadRequest().json(json!({ "error": "quantity must be positive" }));
    }

    let product = match db::get_product(&state.pool, payload.product_id).await {
        Ok(Some(p)) if p.is_available => p,
        Ok(_) => {
            return HttpResponse::NotFound().json(json!({ "error": "product not available" }))
        }
        Err(e) => {
            log::error!("add_item product lookup error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let cart_id = match db::get_or_create_cart(&state.pool, user_id).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("add_item cart error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let insert = sqlx::query(
        r#"INSERT INTO cart_items (cart_id, product_id, quantity, price)
           VALUES ($1, $2, $3, $4::numeric)
           ON CONFLICT (cart_id, product_id)
           DO UPDATE SET quantity = cart_items.quantity + EXCLUDED.quantity"#,
    )
    .bind(cart_id)
    .bind(product.id)
    .bind(quantity)
    .bind(&product.price)
    .execute(&state.pool)
    .await;

    if let Err(e) = insert {
        log::error!("add_item insert error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = db::recompute_cart_total(&state.pool, cart_id).await {
        log::error!("add_item total recompute error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    match db::load_cart(&state.pool, user_id).await {
        Ok(cart) => HttpResponse::Ok().json(json!({ "cart": cart })),
        Err(e) => {
            log::error!("add_item reload error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Sets a line-item quantity; zero removes the line.
#[put("/cart/items/{product_id}")]
pub async fn update_item(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
    payload: web::Json<UpdateItemRequest>,
) -> impl Responder {
    let user_id = *user_id;
    let product_id = path.into_inner();

    if payload.quantity < 0 {
        return HttpResponse::BadRequest().json(json!({ "error": "quantity must not be negative" }));
    }

    let cart_id = match db::get_or_create_cart(&state.pool, user_id).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("update_item cart error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    let result = if payload.quantity == 0 {
        sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
            .bind(cart_id)
            .bind(product_id)
            .execute(&state.pool)
            .await
    } else {
        sqlx::query(
            r#"UPDATE cart_items SET quantity = $1
               WHERE cart_id = $2 AND product_id = $3"#,
        )
        .bind(payload.quantity)
        .bind(cart_id)
        .bind(product_id)
        .execute(&state.pool)
        .await
    };

    match result {
        Ok(r) if r.rows_affected() == 0 && payload.quantity > 0 => {
            return HttpResponse::NotFound().json(json!({ "error": "item not in cart" }));
        }
        Ok(_) => {}
        Err(e) => {
            log::error!("update_item error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    }

    if let Err(e) = db::recompute_cart_total(&state.pool, cart_id).await {
        log::error!("update_item total recompute error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    match db::load_cart(&state.pool, user_id).await {
        Ok(cart) => HttpResponse::Ok().json(json!({ "cart": cart })),
        Err(e) => {
            log::error!("update_item reload error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/cart/items/{product_id}")]
pub async fn remove_item(
    state: web::Data<AppState>,
    user_id: ReqData<i32>,
    path: web::Path<i32>,
) -> impl Responder {
    let user_id = *user_id;
    let product_id = path.into_inner();

    let cart_id = match db::get_or_create_cart(&state.pool, user_id).await {
        Ok(id) => id,
        Err(e) => {
            log::error!("remove_item cart error: {e}");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND product_id = $2")
        .bind(cart_id)
        .bind(product_id)
        .execute(&state.pool)
        .await
    {
        log::error!("remove_item error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    if let Err(e) = db::recompute_cart_total(&state.pool, cart_id).await {
        log::error!("remove_item total recompute error: {e}");
        return HttpResponse::InternalServerError().finish();
    }

    match db::load_cart(&state.pool, user_id).await {
        Ok(cart) => HttpResponse::Ok().json(json!({ "cart": cart })),
        Err(e) => {
            log::error!("remove_item reload error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}

#[delete("/cart")]
pub async fn clear_cart(state: web::Data<AppState>, user_id: ReqData<i32>) -> impl Responder {
    match db::clear_cart(&state.pool, *user_id).await {
        Ok(()) => HttpResponse::Ok().json(json!({ "cleared": true })),
        Err(e) => {
            log::error!("clear_cart error: {e}");
            HttpResponse::InternalServerError().finish()
        }
    }
}
