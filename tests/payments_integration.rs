use actix_web::dev::Service;
use actix_web::test::TestRequest;
use actix_web::{test, web, App, HttpMessage};
use serde_json::json;
use sqlx::Row;

use ifumsa_backend::api::cart::add_item;
use ifumsa_backend::api::payments::{
    create_annual_dues, create_payment, payment_webhook, submit_proof,
};

mod support;

#[actix_web::test]
async fn checkout_with_empty_cart_is_rejected() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "empty_cart", "empty_cart@example.com").await;

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(user_id);
                let fut = srv.call(req);
                async move { fut.await }
            })
            .service(create_payment),
    )
    .await;

    let req = TestRequest::post().uri("/payment/create").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["error"], "Cart is empty");
}

#[actix_web::test]
async fn checkout_copies_cart_total_into_pending_payment() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "buyer", "buyer@example.com").await;
    let scrubs = support::insert_product(pool, "Ward Coat", "1500.00").await;
    let manual = support::insert_product(pool, "Skills Manual", "2500.00").await;

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(user_id);
                let fut = srv.call(req);
                async move { fut.await }
            })
            .service(add_item)
            .service(create_payment),
    )
    .await;

    let req = TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "product_id": scrubs, "quantity": 2 }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "product_id": manual }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = TestRequest::post().uri("/payment/create").to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    let payment = &body["payment"];
    assert_eq!(payment["status"], "pending");
    assert_eq!(payment["amount"], "5500.00");
    assert!(payment["reference"].as_str().unwrap().starts_with("PAY-"));
    let title = payment["title"].as_str().unwrap();
    assert!(title.contains("Ward Coat"));
    assert!(title.contains("Skills Manual"));

    // Checkout does not clear the cart; that happens at proof or completion.
    let items: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM cart_items ci
         JOIN carts c ON c.id = ci.cart_id WHERE c.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count items")
    .get("n");
    assert_eq!(items, 2);
}

#[actix_web::test]
async fn annual_dues_returns_existing_open_payment() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "dues_user", "dues@example.com").await;

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(user_id);
                let fut = srv.call(req);
                async move { fut.await }
            })
            .service(create_annual_dues),
    )
    .await;

    let req = TestRequest::post().uri("/payment/annual-dues").to_request();
    let first: serde_json::Value =
        test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(first["payment"]["title"], "Annual Dues");
    assert_eq!(first["payment"]["amount"], "1000.00");
    let first_id = first["payment"]["id"].as_i64().unwrap();

    let req = TestRequest::post().uri("/payment/annual-dues").to_request();
    let second: serde_json::Value =
        test::read_body_json(test::call_service(&app, req).await).await;
    assert_eq!(second["payment"]["id"].as_i64().unwrap(), first_id);
    assert_eq!(second["existing"], true);

    let count: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM payments WHERE user_id = $1 AND title = 'Annual Dues'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count dues")
    .get("n");
    assert_eq!(count, 1);
}

#[actix_web::test]
async fn proof_submission_requires_pending_then_clears_cart_and_notifies_admins() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "proof_user", "proof@example.com").await;
    // On the configured admin list in support::build_state.
    let admin_id = support::insert_user(pool, "the_admin", "admin@ifumsa.org").await;
    let product = support::insert_product(pool, "Tie Pin", "800.00").await;

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(user_id);
                let fut = srv.call(req);
                async move { fut.await }
            })
            .service(add_item)
            .service(create_payment)
            .service(submit_proof),
    )
    .await;

    let req = TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "product_id": product }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = TestRequest::post().uri("/payment/create").to_request();
    let created: serde_json::Value =
        test::read_body_json(test::call_service(&app, req).await).await;
    let payment_id = created["payment"]["id"].as_i64().unwrap();

    let req = TestRequest::post()
        .uri(&format!("/payment/{payment_id}/proof"))
        .set_json(json!({ "proof_image": "data:image/png;base64,iVBORw0KGgo=" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["payment"]["status"], "submitted");

    let items: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM cart_items ci
         JOIN carts c ON c.id = ci.cart_id WHERE c.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count items")
    .get("n");
    assert_eq!(items, 0);

    let admin_notes: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications WHERE recipient_id = $1 AND type = 'payment'",
    )
    .bind(admin_id)
    .fetch_one(pool)
    .await
    .expect("count admin notifications")
    .get("n");
    assert_eq!(admin_notes, 1);

    // A second proof on the now-submitted payment is rejected.
    let req = TestRequest::post()
        .uri(&format!("/payment/{payment_id}/proof"))
        .set_json(json!({ "proof_image": "data:image/png;base64,iVBORw0KGgo=" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);
}

#[actix_web::test]
async fn webhook_confirmation_assigns_receipt_code_and_notifies_owner() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "owner", "owner@example.com").await;
    let reference = "PAY-1700000000000-deadbeef";

    sqlx::query(
        r#"INSERT INTO payments (user_id, title, amount, status, reference, proof_image)
           VALUES ($1, 'Annual Dues', 1000, 'submitted', $2, 'proof')"#,
    )
    .bind(user_id)
    .bind(reference)
    .execute(pool)
    .await
    .expect("insert payment");

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(payment_webhook),
    )
    .await;

    let req = TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(json!({
            "reference": reference,
            "status": "confirmed",
            "approvalMessage": "Transfer received, welcome aboard."
        }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());

    let body: serde_json::Value = test::read_body_json(resp).await;
    let code = body["payment"]["receipt_code"].as_str().expect("receipt code");
    assert_eq!(code.len(), 6);
    assert!(code
        .chars()
        .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
    assert!(body["payment"]["verified_at"].is_string());

    let row = sqlx::query(
        "SELECT message FROM notifications
         WHERE recipient_id = $1 AND type = 'payment_approval'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("owner notification");
    let message: String = row.get("message");
    assert_eq!(message, "Transfer received, welcome aboard.");
}

#[actix_web::test]
async fn webhook_rejects_bad_input_and_disallowed_transitions() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "locked", "locked@example.com").await;
    let reference = "PAY-1700000000001-cafebabe";

    sqlx::query(
        r#"INSERT INTO payments (user_id, title, amount, status, reference)
           VALUES ($1, 'Annual Dues', 1000, 'completed', $2)"#,
    )
    .bind(user_id)
    .bind(reference)
    .execute(pool)
    .await
    .expect("insert payment");

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new().app_data(state.clone()).service(payment_webhook),
    )
    .await;

    // Terminal state: nothing moves.
    let req = TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(json!({ "reference": reference, "status": "submitted" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // Unknown status value.
    let req = TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(json!({ "reference": reference, "status": "refunded" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 400);

    // Unknown reference.
    let req = TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(json!({ "reference": "PAY-0-00000000", "status": "confirmed" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), 404);
}

#[actix_web::test]
async fn webhook_completion_clears_cart_and_notifies_owner() {
    let test_db = support::init_test_db().await;
    let pool = &test_db.pool;

    let user_id = support::insert_user(pool, "finisher", "finisher@example.com").await;
    let product = support::insert_product(pool, "Lapel Pin", "300.00").await;
    let reference = "PAY-1700000000002-0badf00d";

    sqlx::query(
        r#"INSERT INTO payments (user_id, title, amount, status, reference)
           VALUES ($1, 'Lapel Pin', 300, 'confirmed', $2)"#,
    )
    .bind(user_id)
    .bind(reference)
    .execute(pool)
    .await
    .expect("insert payment");

    let state = web::Data::new(support::build_state(pool.clone()));
    let app = test::init_service(
        App::new()
            .app_data(state.clone())
            .wrap_fn(move |req, srv| {
                req.extensions_mut().insert(user_id);
                let fut = srv.call(req);
                async move { fut.await }
            })
            .service(add_item)
            .service(payment_webhook),
    )
    .await;

    let req = TestRequest::post()
        .uri("/cart/items")
        .set_json(json!({ "product_id": product }))
        .to_request();
    assert!(test::call_service(&app, req).await.status().is_success());

    let req = TestRequest::post()
        .uri("/api/payment/webhook")
        .set_json(json!({ "reference": reference, "status": "completed" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert!(resp.status().is_success());
    let body: serde_json::Value = test::read_body_json(resp).await;
    assert_eq!(body["payment"]["status"], "completed");

    let items: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM cart_items ci
         JOIN carts c ON c.id = ci.cart_id WHERE c.user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count items")
    .get("n");
    assert_eq!(items, 0);

    let approvals: i64 = sqlx::query(
        "SELECT COUNT(*) AS n FROM notifications
         WHERE recipient_id = $1 AND type = 'payment_approval'",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await
    .expect("count approvals")
    .get("n");
    assert_eq!(approvals, 1);
}
