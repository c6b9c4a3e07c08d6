//! HTTP 端到端流程
//!
//! 通过 `build_app` + `tower::ServiceExt::oneshot` 驱动完整路由:
//! 注册 → 验证码 → 下单 → 上传凭证 → 管理员确认收款。

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use http::{Method, Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use boxhub_server::db::DbService;
use boxhub_server::db::models::UserRole;
use boxhub_server::db::repository::user::NewUser;
use boxhub_server::services::mailer::MemoryMailClient;
use boxhub_server::{Config, ServerState, build_app};

const BOUNDARY: &str = "boxhub-test-boundary";

struct TestApp {
    app: Router,
    state: ServerState,
    mail: Arc<MemoryMailClient>,
    _dir: tempfile::TempDir,
}

impl TestApp {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::for_tests(dir.path().to_string_lossy().to_string());
        let db = DbService::in_memory().await.unwrap();
        let mail = Arc::new(MemoryMailClient::new());
        let state = ServerState::new(config, db, mail.clone());
        Self {
            app: build_app(state.clone()),
            state,
            mail,
            _dir: dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn json(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.send(request).await
    }

    async fn admin_token(&self) -> String {
        let admin = self
            .state
            .users
            .create(NewUser {
                name: "Admin".into(),
                email: "admin@example.com".into(),
                password_hash: "unused".into(),
                role: UserRole::Admin,
                is_verified: true,
            })
            .await
            .unwrap();
        self.state.jwt_service.generate_token(&admin).unwrap()
    }

    /// Code from the most recent mail sent to `email`
    async fn last_code(&self, email: &str, expected_mails: usize) -> String {
        let sent = self.mail.wait_for(expected_mails, Duration::from_secs(2)).await;
        let text = sent
            .iter()
            .rev()
            .find(|m| m.to == email)
            .and_then(|m| m.body_text.clone())
            .expect("no mail for recipient");
        let digits: Vec<char> = text.chars().collect();
        digits
            .windows(6)
            .find(|w| w.iter().all(char::is_ascii_digit))
            .map(|w| w.iter().collect())
            .expect("no code in mail")
    }
}

fn multipart_file(field: &str, filename: &str, data: &[u8]) -> (String, Vec<u8>) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={BOUNDARY}"), body)
}

#[tokio::test]
async fn test_purchase_flow_over_http() {
    let t = TestApp::new().await;
    let admin = t.admin_token().await;

    // Catalog
    let (status, body) = t
        .json(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Island Tea Box", "price": 24.99, "stock": 5 })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = t.json(Method::GET, "/api/products", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 1);
    assert_eq!(body["pagination"]["page"], 1);

    // Registration
    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ana", "email": "Ana@Example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user"]["email"], "ana@example.com");
    assert_eq!(body["data"]["user"]["is_verified"], false);
    assert!(body["data"]["user"].get("password_hash").is_none());

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unverified accounts can sign in but not buy
    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "s3cret-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let unverified = body["data"]["token"].as_str().unwrap().to_string();

    let order_body = json!({
        "items": [{ "product": product_id, "quantity": 3 }],
        "shipping_address": {
            "street": "12 Harbour Road",
            "city": "Suva",
            "island": "Viti Levu",
            "postal_code": "0000"
        },
        "payment_method": "bankTransfer"
    });
    let (status, _) = t
        .json(Method::POST, "/api/orders", Some(&unverified), Some(order_body.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Email verification
    let code = t.last_code("ana@example.com", 1).await;
    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/verify-otp",
            None,
            Some(json!({ "email": "ana@example.com", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["user"]["is_verified"], true);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // Order
    let (status, body) = t
        .json(Method::POST, "/api/orders", Some(&token), Some(order_body))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["payment_status"], "pending");
    assert_eq!(body["data"]["total_price"], 74.97);

    let (_, body) = t
        .json(Method::GET, &format!("/api/products/{product_id}"), None, None)
        .await;
    assert_eq!(body["data"]["stock"], 2);

    let (status, body) = t
        .json(Method::GET, "/api/orders/myorders", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    // Receipt
    let (content_type, payload) = multipart_file("receipt", "receipt.pdf", b"%PDF-1.4 transfer");
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/orders/{order_id}/receipt"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(payload))
        .unwrap();
    let (status, body) = t.send(request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "pending_verification");

    let (status, body) = t
        .json(Method::GET, "/api/payments/pending", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 1);

    // Customers cannot review payments
    let (status, body) = t
        .json(
            Method::POST,
            &format!("/api/payments/verify/{order_id}"),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);

    let (status, body) = t
        .json(
            Method::POST,
            &format!("/api/payments/verify/{order_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "verified");
    assert_eq!(body["data"]["is_paid"], true);
    assert!(body["data"]["paid_at"].is_i64());

    // Invoice download
    let request = Request::builder()
        .uri(format!("/api/orders/{order_id}/invoice"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "application/pdf"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.starts_with(b"%PDF"));
}

#[tokio::test]
async fn test_reject_with_reason_over_http() {
    let t = TestApp::new().await;
    let admin = t.admin_token().await;

    let (_, body) = t
        .json(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Snack Box", "price": 10.0, "stock": 3 })),
        )
        .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    // Admins may order and upload on any order
    let (status, body) = t
        .json(
            Method::POST,
            "/api/orders",
            Some(&admin),
            Some(json!({
                "items": [{ "product": product_id, "quantity": 1 }],
                "shipping_address": {
                    "street": "1 Main St", "city": "Apia", "island": "Upolu", "postal_code": "WS1"
                },
                "payment_method": "bankTransfer"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    // Rejecting before any receipt exists is refused
    let (status, _) = t
        .json(
            Method::POST,
            &format!("/api/payments/reject/{order_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (content_type, payload) = multipart_file("receipt", "receipt.pdf", b"%PDF-1.4 transfer");
    let request = Request::builder()
        .method(Method::POST)
        .uri(format!("/api/orders/{order_id}/receipt"))
        .header(header::AUTHORIZATION, format!("Bearer {admin}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(payload))
        .unwrap();
    let (status, _) = t.send(request).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = t
        .json(
            Method::POST,
            &format!("/api/payments/reject/{order_id}"),
            Some(&admin),
            Some(json!({ "reason": "blurry image" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "rejected");
    assert_eq!(body["data"]["payment_rejection_reason"], "blurry image");
    assert!(body["data"]["receipt"].is_null());
    assert_eq!(body["data"]["is_paid"], false);
}

#[tokio::test]
async fn test_error_envelopes() {
    let t = TestApp::new().await;

    // 401 without a token
    let (status, body) = t.json(Method::GET, "/api/orders/myorders", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert!(body["error"].is_string());

    let (status, _) = t
        .json(Method::GET, "/api/auth/me", Some("not-a-token"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 404 for unknown catalog entries
    let (status, body) = t
        .json(Method::GET, "/api/products/does-not-exist", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);

    // 400 for invalid input
    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "short" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "nobody@example.com", "password": "whatever123" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // 403 for non-admins on admin routes
    let user = t
        .state
        .users
        .create(NewUser {
            name: "Ben".into(),
            email: "ben@example.com".into(),
            password_hash: "unused".into(),
            role: UserRole::User,
            is_verified: true,
        })
        .await
        .unwrap();
    let token = t.state.jwt_service.generate_token(&user).unwrap();
    for uri in ["/api/orders", "/api/users", "/api/contact", "/api/newsletter/subscribers"] {
        let (status, _) = t.json(Method::GET, uri, Some(&token), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{uri}");
    }

    let (status, body) = t.json(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["database"], "ok");
}

#[tokio::test]
async fn test_password_reset_flow() {
    let t = TestApp::new().await;

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({ "name": "Ana", "email": "ana@example.com", "password": "first-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "ana@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let code = t.last_code("ana@example.com", 2).await;

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/reset-password",
            None,
            Some(json!({ "email": "ana@example.com", "code": code, "password": "second-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "first-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = t
        .json(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "email": "ana@example.com", "password": "second-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    // Reset proves mailbox ownership
    let (status, body) = t.json(Method::GET, "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_verified"], true);

    // Unknown addresses get the same answer
    let (status, _) = t
        .json(
            Method::POST,
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "ghost@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_engagement_endpoints() {
    let t = TestApp::new().await;
    let admin = t.admin_token().await;

    // Contact form
    let (status, body) = t
        .json(
            Method::POST,
            "/api/contact",
            None,
            Some(json!({
                "name": "Ana",
                "email": "ana@example.com",
                "subject": "Shipping",
                "message": "Do you ship to Tonga?"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let message_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = t
        .json(
            Method::POST,
            &format!("/api/contact/{message_id}/reply"),
            Some(&admin),
            Some(json!({ "reply": "Yes, every month." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "replied");
    let sent = t.mail.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent[0].to, "ana@example.com");
    assert_eq!(sent[0].subject, "Re: Shipping");

    let (status, _) = t
        .json(Method::DELETE, "/api/contact/missing", Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Newsletter
    for _ in 0..2 {
        let (status, _) = t
            .json(
                Method::POST,
                "/api/newsletter/subscribe",
                None,
                Some(json!({ "email": "Fan@Example.com" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = t
        .json(Method::GET, "/api/newsletter/subscribers", Some(&admin), None)
        .await;
    assert_eq!(body["total"], 1);
    assert_eq!(body["data"][0]["email"], "fan@example.com");

    let (status, _) = t
        .json(
            Method::POST,
            "/api/newsletter/unsubscribe",
            None,
            Some(json!({ "email": "stranger@example.com" })),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Site content
    let (status, _) = t
        .json(
            Method::PUT,
            "/api/content/about",
            Some(&admin),
            Some(json!({ "title": "About us", "body": "Curated boxes from the islands." })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = t.json(Method::GET, "/api/content/about", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "About us");
    let (status, _) = t.json(Method::GET, "/api/content/faq", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_wishlist_and_user_admin() {
    let t = TestApp::new().await;
    let admin = t.admin_token().await;

    let (_, body) = t
        .json(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Coffee Box", "price": 30.0, "stock": 10 })),
        )
        .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let user = t
        .state
        .users
        .create(NewUser {
            name: "Ben".into(),
            email: "ben@example.com".into(),
            password_hash: "unused".into(),
            role: UserRole::User,
            is_verified: true,
        })
        .await
        .unwrap();
    let token = t.state.jwt_service.generate_token(&user).unwrap();

    for _ in 0..2 {
        let (status, _) = t
            .json(
                Method::POST,
                &format!("/api/wishlist/{product_id}"),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (_, body) = t.json(Method::GET, "/api/wishlist", Some(&token), None).await;
    assert_eq!(body["data"]["products"].as_array().unwrap().len(), 1);

    let (status, _) = t
        .json(Method::POST, "/api/wishlist/missing", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Deleting the product prunes wishlists
    let (status, _) = t
        .json(
            Method::DELETE,
            &format!("/api/products/{product_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = t.json(Method::GET, "/api/wishlist", Some(&token), None).await;
    assert!(body["data"]["products"].as_array().unwrap().is_empty());

    // Role management
    let (status, body) = t
        .json(
            Method::PUT,
            &format!("/api/users/{}/role", user.key()),
            Some(&admin),
            Some(json!({ "role": "admin" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "admin");

    let admin_id = t
        .state
        .users
        .find_by_email("admin@example.com")
        .await
        .unwrap()
        .unwrap()
        .key();
    let (status, _) = t
        .json(
            Method::DELETE,
            &format!("/api/users/{admin_id}"),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = t
        .json(
            Method::DELETE,
            &format!("/api/users/{}", user.key()),
            Some(&admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

fn receipt_count(t: &TestApp) -> usize {
    std::fs::read_dir(t.state.config.uploads_dir().join("receipts"))
        .map(|dir| dir.count())
        .unwrap_or(0)
}

fn receipt_upload(order_id: &str, token: &str) -> Request<Body> {
    let (content_type, payload) = multipart_file("receipt", "receipt.pdf", b"%PDF-1.4 transfer");
    Request::builder()
        .method(Method::POST)
        .uri(format!("/api/orders/{order_id}/receipt"))
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .header(header::CONTENT_TYPE, content_type)
        .body(Body::from(payload))
        .unwrap()
}

#[tokio::test]
async fn test_receipt_upload_checks_owner_and_blank_reason() {
    let t = TestApp::new().await;
    let admin = t.admin_token().await;

    let (_, body) = t
        .json(
            Method::POST,
            "/api/products",
            Some(&admin),
            Some(json!({ "name": "Fruit Box", "price": 12.5, "stock": 4 })),
        )
        .await;
    let product_id = body["data"]["id"].as_str().unwrap().to_string();

    let (_, body) = t
        .json(
            Method::POST,
            "/api/orders",
            Some(&admin),
            Some(json!({
                "items": [{ "product": product_id, "quantity": 1 }],
                "shipping_address": {
                    "street": "3 Bay Rd", "city": "Nadi", "island": "Viti Levu", "postal_code": "FJ1"
                },
                "payment_method": "bankTransfer"
            })),
        )
        .await;
    let order_id = body["data"]["id"].as_str().unwrap().to_string();

    let stranger = t
        .state
        .users
        .create(NewUser {
            name: "Cai".into(),
            email: "cai@example.com".into(),
            password_hash: "unused".into(),
            role: UserRole::User,
            is_verified: true,
        })
        .await
        .unwrap();
    let stranger = t.state.jwt_service.generate_token(&stranger).unwrap();

    let (status, body) = t.send(receipt_upload(&order_id, &stranger)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["success"], false);
    assert_eq!(receipt_count(&t), 0);

    let (status, _) = t.send(receipt_upload(&order_id, &admin)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt_count(&t), 1);

    // Blank reasons are stored as absent
    let (status, body) = t
        .json(
            Method::POST,
            &format!("/api/payments/reject/{order_id}"),
            Some(&admin),
            Some(json!({ "reason": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["payment_status"], "rejected");
    assert!(body["data"]["payment_rejection_reason"].is_null());
    assert_eq!(receipt_count(&t), 0);
}
