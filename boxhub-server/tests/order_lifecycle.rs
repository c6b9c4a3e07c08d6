//! 订单生命周期测试
//!
//! 内存数据库 + 临时上传目录 + 记录型邮件客户端, 直接调用 OrderService。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use boxhub_server::db::DbService;
use boxhub_server::db::models::{
    Order, OrderItemRequest, OrderStatus, PaymentMethod, PaymentStatus, PlaceOrderRequest,
    Product, ProductCreate, ProductUpdate, ShippingAddress, UserRole,
};
use boxhub_server::db::repository::user::NewUser;
use boxhub_server::services::mailer::MemoryMailClient;
use boxhub_server::services::storage::UploadedFile;
use boxhub_server::{Config, CurrentUser, ErrorCode, ServerState};
use tempfile::TempDir;

struct Harness {
    state: ServerState,
    mail: Arc<MemoryMailClient>,
    dir: TempDir,
    customer: CurrentUser,
    admin: CurrentUser,
}

async fn register(state: &ServerState, email: &str, role: UserRole) -> CurrentUser {
    let user = state
        .users
        .create(NewUser {
            name: format!("{} tester", role.as_str()),
            email: email.into(),
            password_hash: "not-used".into(),
            role,
            is_verified: true,
        })
        .await
        .unwrap();
    CurrentUser {
        id: user.key(),
        email: user.email,
        name: user.name,
        role,
        verified: true,
    }
}

async fn harness() -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = Config::for_tests(dir.path().to_string_lossy().to_string());
    let db = DbService::in_memory().await.unwrap();
    let mail = Arc::new(MemoryMailClient::new());
    let state = ServerState::new(config, db, mail.clone());

    let customer = register(&state, "ana@example.com", UserRole::User).await;
    let admin = register(&state, "admin@example.com", UserRole::Admin).await;
    Harness {
        state,
        mail,
        dir,
        customer,
        admin,
    }
}

async fn product(state: &ServerState, name: &str, price: f64, stock: i64) -> Product {
    state
        .products
        .create(ProductCreate {
            name: name.into(),
            description: Some("Monthly box".into()),
            price,
            stock,
            category: Some("boxes".into()),
            images: None,
            is_featured: None,
            is_current_box: None,
            is_active: None,
        })
        .await
        .unwrap()
}

async fn stock_of(state: &ServerState, product: &Product) -> i64 {
    state
        .products
        .find_by_id(&product.key())
        .await
        .unwrap()
        .unwrap()
        .stock
}

fn address() -> ShippingAddress {
    ShippingAddress {
        street: "12 Harbour Road".into(),
        city: "Suva".into(),
        island: "Viti Levu".into(),
        postal_code: "0000".into(),
    }
}

fn request(lines: &[(&Product, i64)], method: PaymentMethod) -> PlaceOrderRequest {
    PlaceOrderRequest {
        items: lines
            .iter()
            .map(|(p, quantity)| OrderItemRequest {
                product: p.key(),
                quantity: *quantity,
            })
            .collect(),
        shipping_address: address(),
        payment_method: method,
    }
}

fn receipt() -> UploadedFile {
    UploadedFile {
        filename: "transfer.pdf".into(),
        data: b"%PDF-1.4 bank transfer receipt".to_vec(),
    }
}

fn assert_payment_invariants(order: &Order) {
    match order.payment_status {
        PaymentStatus::Verified => {
            assert!(order.is_paid, "verified order must be paid");
            assert!(order.paid_at.is_some(), "verified order must have paid_at");
        }
        _ => {
            assert!(!order.is_paid, "{:?} order must not be paid", order.payment_status);
            assert!(order.paid_at.is_none());
        }
    }
}

fn receipt_files(h: &Harness) -> usize {
    std::fs::read_dir(h.dir.path().join("uploads").join("receipts"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_scenario_a_place_order_reserves_stock() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 24.99, 5).await;

    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 3)], PaymentMethod::BankTransfer))
        .await
        .unwrap();

    assert_eq!(stock_of(&h.state, &tea).await, 2);
    assert!((order.total_price - 74.97).abs() < 1e-9);
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.payment_status, PaymentStatus::Pending);
    assert_eq!(order.user_id, h.customer.id);
    assert!(order.order_number.starts_with("BOX-"));
    assert_payment_invariants(&order);

    let sent = h.mail.wait_for(1, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "ana@example.com");
}

#[tokio::test]
async fn test_scenario_b_receipt_then_verify() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 24.99, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 3)], PaymentMethod::BankTransfer))
        .await
        .unwrap();

    let order = h
        .state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::PendingVerification);
    assert!(order.receipt.is_some());
    assert!(order.receipt_uploaded_at.is_some());
    assert_payment_invariants(&order);

    let order = h.state.orders.verify_payment(&order.key()).await.unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Verified);
    assert!(order.is_paid);
    assert!(order.paid_at.is_some());
    assert_payment_invariants(&order);

    // confirmation + payment verified
    let sent = h.mail.wait_for(2, Duration::from_secs(2)).await;
    assert_eq!(sent.len(), 2);
    assert!(sent[1].subject.contains(&order.order_number));

    let err = h.state.orders.verify_payment(&order.key()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentAlreadyVerified);
    let err = h
        .state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentAlreadyVerified);
}

#[tokio::test]
async fn test_scenario_c_over_stock_creates_nothing() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 24.99, 5).await;

    let err = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 6)], PaymentMethod::BankTransfer))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductOutOfStock);
    assert_eq!(stock_of(&h.state, &tea).await, 5);

    let (orders, total) = h
        .state
        .orders
        .list(Default::default(), &Default::default())
        .await
        .unwrap();
    assert!(orders.is_empty());
    assert_eq!(total, 0);
}

#[tokio::test]
async fn test_scenario_d_reject_receipt() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 24.99, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
        .await
        .unwrap();
    h.state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap();
    assert_eq!(receipt_files(&h), 1);

    let order = h
        .state
        .orders
        .reject_payment(&order.key(), Some("blurry image".into()))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::Rejected);
    assert!(order.receipt.is_none());
    assert_payment_invariants(&order);
    assert_eq!(receipt_files(&h), 0);

    let stored = h
        .state
        .orders
        .get_order(&h.customer, &order.key())
        .await
        .unwrap();
    assert_eq!(stored.payment_rejection_reason.as_deref(), Some("blurry image"));

    // The customer may try again
    let order = h
        .state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap();
    assert_eq!(order.payment_status, PaymentStatus::PendingVerification);

    let sent = h.mail.wait_for(2, Duration::from_secs(2)).await;
    assert!(sent.iter().any(|m| m.subject.starts_with("Payment issue")));
}

#[tokio::test]
async fn test_line_prices_are_frozen() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 10.10, 10).await;
    let snacks = product(&h.state, "Snack Box", 0.20, 10).await;

    let order = h
        .state
        .orders
        .place_order(
            &h.customer,
            request(&[(&tea, 3), (&snacks, 1)], PaymentMethod::CashOnDelivery),
        )
        .await
        .unwrap();
    assert!((order.total_price - 30.50).abs() < 1e-9);

    h.state
        .products
        .update(
            &tea.key(),
            ProductUpdate {
                price: Some(99.0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let stored = h
        .state
        .orders
        .get_order(&h.customer, &order.key())
        .await
        .unwrap();
    assert_eq!(stored.items[0].price, 10.10);
    assert!((stored.total_price - 30.50).abs() < 1e-9);
}

#[tokio::test]
async fn test_duplicate_lines_are_merged() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 4).await;

    let order = h
        .state
        .orders
        .place_order(
            &h.customer,
            request(&[(&tea, 2), (&tea, 2)], PaymentMethod::CashOnDelivery),
        )
        .await
        .unwrap();
    assert_eq!(order.items.len(), 1);
    assert_eq!(order.items[0].quantity, 4);
    assert_eq!(stock_of(&h.state, &tea).await, 0);

    // 3 + 2 > 4 even though each line alone fits
    let coffee = product(&h.state, "Coffee Box", 5.0, 4).await;
    let err = h
        .state
        .orders
        .place_order(
            &h.customer,
            request(&[(&coffee, 3), (&coffee, 2)], PaymentMethod::CashOnDelivery),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductOutOfStock);
    assert_eq!(stock_of(&h.state, &coffee).await, 4);
}

#[tokio::test]
async fn test_multi_line_failure_leaves_all_stock() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let snacks = product(&h.state, "Snack Box", 3.0, 2).await;

    let err = h
        .state
        .orders
        .place_order(
            &h.customer,
            request(&[(&tea, 3), (&snacks, 5)], PaymentMethod::BankTransfer),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductOutOfStock);
    assert_eq!(stock_of(&h.state, &tea).await, 5);
    assert_eq!(stock_of(&h.state, &snacks).await, 2);

    let err = h
        .state
        .orders
        .place_order(
            &h.customer,
            PlaceOrderRequest {
                items: vec![
                    OrderItemRequest {
                        product: tea.key(),
                        quantity: 1,
                    },
                    OrderItemRequest {
                        product: "missing".into(),
                        quantity: 1,
                    },
                ],
                shipping_address: address(),
                payment_method: PaymentMethod::BankTransfer,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductNotFound);
    assert_eq!(stock_of(&h.state, &tea).await, 5);
}

#[tokio::test]
async fn test_invalid_requests() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;

    let err = h
        .state
        .orders
        .place_order(&h.customer, request(&[], PaymentMethod::BankTransfer))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderEmpty);

    let err = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 0)], PaymentMethod::BankTransfer))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);

    let mut bad_address = request(&[(&tea, 1)], PaymentMethod::BankTransfer);
    bad_address.shipping_address.city = "  ".into();
    let err = h
        .state
        .orders
        .place_order(&h.customer, bad_address)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidShippingAddress);

    assert_eq!(stock_of(&h.state, &tea).await, 5);
}

#[tokio::test]
async fn test_huge_duplicate_quantities_leave_stock_alone() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;

    let err = h
        .state
        .orders
        .place_order(
            &h.customer,
            request(&[(&tea, i64::MAX), (&tea, i64::MAX)], PaymentMethod::BankTransfer),
        )
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ValidationFailed);
    assert_eq!(stock_of(&h.state, &tea).await, 5);
}

#[tokio::test]
async fn test_concurrent_orders_never_oversell() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;

    let mut tasks = Vec::new();
    for _ in 0..12 {
        let orders = h.state.orders.clone();
        let customer = h.customer.clone();
        let req = request(&[(&tea, 1)], PaymentMethod::CashOnDelivery);
        tasks.push(tokio::spawn(async move {
            orders.place_order(&customer, req).await
        }));
    }

    let mut placed = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => placed += 1,
            Err(e) => assert_eq!(e.code, ErrorCode::ProductOutOfStock),
        }
    }
    assert_eq!(placed, 5);
    assert_eq!(stock_of(&h.state, &tea).await, 0);
}

#[tokio::test]
async fn test_cash_on_delivery_receipt_rejected() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    let err = h
        .state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::PaymentInvalidMethod);
    assert_eq!(receipt_files(&h), 0);

    let err = h
        .state
        .orders
        .upload_receipt(&h.customer, &order.key(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NoFileProvided);

    let stored = h
        .state
        .orders
        .get_order(&h.customer, &order.key())
        .await
        .unwrap();
    assert_eq!(stored.payment_status, PaymentStatus::Pending);
}

#[tokio::test]
async fn test_payment_guards() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
        .await
        .unwrap();

    let err = h.state.orders.verify_payment(&order.key()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::ReceiptRequired);
    let err = h
        .state
        .orders
        .reject_payment(&order.key(), None)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ReceiptRequired);

    // Direct admin set keeps the paid flags in sync both ways
    let order = h
        .state
        .orders
        .update_payment_status(&order.key(), PaymentStatus::Verified)
        .await
        .unwrap();
    assert_payment_invariants(&order);
    let order = h
        .state
        .orders
        .update_payment_status(&order.key(), PaymentStatus::Rejected)
        .await
        .unwrap();
    assert_payment_invariants(&order);

    let pending = h.state.orders.pending_verifications().await.unwrap();
    assert!(pending.is_empty());
}

#[tokio::test]
async fn test_pending_verification_queue() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 10).await;

    let mut keys = Vec::new();
    for _ in 0..3 {
        let order = h
            .state
            .orders
            .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
            .await
            .unwrap();
        keys.push(order.key());
    }
    for key in &keys[..2] {
        h.state
            .orders
            .upload_receipt(&h.admin, key, Some(receipt()))
            .await
            .unwrap();
        // distinct upload timestamps
        tokio::time::sleep(Duration::from_millis(3)).await;
    }

    let pending: Vec<String> = h
        .state
        .orders
        .pending_verifications()
        .await
        .unwrap()
        .iter()
        .map(|o| o.key())
        .collect();
    assert_eq!(pending, keys[..2].to_vec());
}

#[tokio::test]
async fn test_fulfillment_flow() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::CashOnDelivery))
        .await
        .unwrap();

    // Skipping ahead is allowed
    let order = h
        .state
        .orders
        .update_status(&order.key(), OrderStatus::Shipped)
        .await
        .unwrap();
    assert_eq!(order.status, OrderStatus::Shipped);
    assert!(!order.is_delivered);

    let err = h
        .state
        .orders
        .update_status(&order.key(), OrderStatus::Processing)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);

    let order = h
        .state
        .orders
        .set_tracking(&order.key(), " TRK-123 ")
        .await
        .unwrap();
    assert_eq!(order.tracking_number.as_deref(), Some("TRK-123"));

    let order = h
        .state
        .orders
        .update_status(&order.key(), OrderStatus::Delivered)
        .await
        .unwrap();
    assert!(order.is_delivered);
    assert!(order.delivered_at.is_some());

    let err = h
        .state
        .orders
        .update_status(&order.key(), OrderStatus::Cancelled)
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::InvalidStatusTransition);

    // Cancelling never gives stock back
    let second = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 2)], PaymentMethod::CashOnDelivery))
        .await
        .unwrap();
    h.state
        .orders
        .update_status(&second.key(), OrderStatus::Cancelled)
        .await
        .unwrap();
    assert_eq!(stock_of(&h.state, &tea).await, 2);
}

#[tokio::test]
async fn test_orders_are_private_to_their_owner() {
    let h = harness().await;
    let stranger = register(&h.state, "eve@example.com", UserRole::User).await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
        .await
        .unwrap();

    let err = h
        .state
        .orders
        .get_order(&stranger, &order.key())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotResourceOwner);
    let err = h
        .state
        .orders
        .upload_receipt(&stranger, &order.key(), Some(receipt()))
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotResourceOwner);
    let err = h
        .state
        .orders
        .invoice(&stranger, &order.key())
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::NotResourceOwner);

    assert!(h.state.orders.get_order(&h.admin, &order.key()).await.is_ok());
    let (pdf, filename) = h.state.orders.invoice(&h.customer, &order.key()).await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert_eq!(filename, format!("invoice-{}.pdf", order.order_number));

    let err = h
        .state
        .orders
        .get_order(&h.customer, "missing")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}

#[tokio::test]
async fn test_delete_order_removes_receipt() {
    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 5.0, 5).await;
    let order = h
        .state
        .orders
        .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
        .await
        .unwrap();
    h.state
        .orders
        .upload_receipt(&h.customer, &order.key(), Some(receipt()))
        .await
        .unwrap();
    assert_eq!(receipt_files(&h), 1);

    h.state.orders.delete_order(&order.key()).await.unwrap();
    assert_eq!(receipt_files(&h), 0);
    let err = h.state.orders.delete_order(&order.key()).await.unwrap_err();
    assert_eq!(err.code, ErrorCode::OrderNotFound);
}

#[tokio::test]
async fn test_order_numbers_stay_unique() {
    const ORDER_COUNT: usize = 300;

    let h = harness().await;
    let tea = product(&h.state, "Tea Box", 1.0, ORDER_COUNT as i64).await;

    let mut numbers = HashSet::new();
    for _ in 0..ORDER_COUNT {
        let order = h
            .state
            .orders
            .place_order(&h.customer, request(&[(&tea, 1)], PaymentMethod::CashOnDelivery))
            .await
            .unwrap();
        assert!(numbers.insert(order.order_number));
    }
    assert_eq!(numbers.len(), ORDER_COUNT);
    assert_eq!(stock_of(&h.state, &tea).await, 0);
}

#[tokio::test]
async fn test_my_orders_listing() {
    let h = harness().await;
    let stranger = register(&h.state, "eve@example.com", UserRole::User).await;
    let tea = product(&h.state, "Tea Box", 5.0, 10).await;

    for user in [&h.customer, &h.customer, &stranger] {
        h.state
            .orders
            .place_order(user, request(&[(&tea, 1)], PaymentMethod::BankTransfer))
            .await
            .unwrap();
    }

    let filter = boxhub_server::orders::OrderFilter {
        user_id: Some(h.customer.id.clone()),
        ..Default::default()
    };
    let (orders, total) = h
        .state
        .orders
        .list(filter, &Default::default())
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(orders.iter().all(|o| o.user_id == h.customer.id));
    assert!(orders[0].created_at >= orders[1].created_at);
}
