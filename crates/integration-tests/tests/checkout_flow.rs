//! Checkout from shipping details to a completed order.
//!
//! ```bash
//! cargo test -p marigold-integration-tests --test checkout_flow
//! ```

#![allow(clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use marigold_core::{OrderId, Price};
use marigold_integration_tests::{FakeStore, Failure, Op, signed_in};
use marigold_storefront::api::{ApiError, FieldErrors};
use marigold_storefront::cache::CacheKey;
use marigold_storefront::checkout::{
    CheckoutError, PaymentMethod, ShippingField, ShippingForm, ShippingMethod, Stage,
};
use marigold_storefront::session::{CurrentUser, keys};
use marigold_storefront::{Notice, Storefront};
use pretty_assertions::assert_eq;

fn valid_form() -> ShippingForm {
    ShippingForm {
        first_name: "Lan".to_string(),
        last_name: "Nguyen".to_string(),
        country: "Vietnam".to_string(),
        street: "12 Ly Thuong Kiet".to_string(),
        city: "Hanoi".to_string(),
        state: String::new(),
        zip: "100000".to_string(),
        phone: "0912345678".to_string(),
    }
}

/// Signed-in storefront with two checked cart lines (2 × 100.000 and 1 × 50.000)
/// and a checkout started on them.
async fn checkout_ready(fake: &Arc<FakeStore>) -> (Storefront, CurrentUser) {
    let shirt = fake.add_product(1, "Linen shirt", 100_000);
    let scarf = fake.add_product(2, "Silk scarf", 50_000);
    let (storefront, user) = signed_in(fake).await;
    fake.seed_line(user.id, &shirt, 2);
    fake.seed_line(user.id, &scarf, 1);

    let cart = storefront.cart();
    cart.load().await.unwrap();
    cart.set_all_checked(true).await;
    storefront
        .checkout()
        .begin(user.clone(), cart.checkout_items().await)
        .await;
    storefront.checkout().set_form(valid_form()).await.unwrap();
    (storefront, user)
}

/// Advance a ready checkout to the payment stage with terms and a method chosen.
async fn ready_to_place(storefront: &Storefront) {
    let checkout = storefront.checkout();
    checkout.submit_shipping().await.unwrap();
    checkout
        .select_payment_method(PaymentMethod::CashOnDelivery)
        .await
        .unwrap();
    checkout.accept_terms(true).await.unwrap();
}

// =============================================================================
// Happy path
// =============================================================================

#[tokio::test]
async fn test_full_checkout() {
    let fake = FakeStore::new();
    let (storefront, user) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();

    checkout.set_shipping_method(ShippingMethod::Fast).await.unwrap();
    let order = checkout.submit_shipping().await.unwrap();
    assert_eq!(order.id, Some(OrderId::new(1)));
    assert_eq!(checkout.stage().await, Some(Stage::Payment));

    let breakdown = checkout.price_breakdown().await.unwrap();
    assert_eq!(breakdown.product_price, Price::from_units(250_000));
    assert_eq!(breakdown.shipping_fee, Price::from_units(100_000));
    assert_eq!(breakdown.subtotal, Price::from_units(350_000));

    // Cached once fetched.
    checkout.price_breakdown().await.unwrap();
    assert_eq!(fake.calls(Op::OrderDetail), 1);

    checkout
        .select_payment_method(PaymentMethod::Card)
        .await
        .unwrap();
    checkout.accept_terms(true).await.unwrap();
    let placed = checkout.place_order().await.unwrap();
    assert_eq!(placed, order);
    assert_eq!(checkout.stage().await, Some(Stage::Completed));
    assert!(fake.cart_of(user.id).is_empty());

    checkout.return_to_catalog().await.unwrap();
    assert_eq!(checkout.stage().await, None);

    assert_eq!(fake.calls(Op::CreateOrder), 1);
    assert_eq!(fake.calls(Op::ClearCart), 1);
    assert_eq!(
        storefront
            .cache()
            .invalidation_count(&CacheKey::Cart(user.id))
            .await,
        1
    );
}

#[tokio::test]
async fn test_order_creation_invalidates_order_listings() {
    let fake = FakeStore::new();
    let (storefront, user) = checkout_ready(&fake).await;

    storefront.checkout().submit_shipping().await.unwrap();

    let cache = storefront.cache();
    assert_eq!(
        cache
            .invalidation_count(&CacheKey::LatestOrder(user.email.clone()))
            .await,
        1
    );
    assert_eq!(cache.invalidation_count(&CacheKey::Cart(user.id)).await, 0);
}

// =============================================================================
// Shipping stage
// =============================================================================

#[tokio::test]
async fn test_invalid_phone_is_rejected_locally() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();

    checkout
        .edit_field(ShippingField::Phone, "0123456789")
        .await
        .unwrap();
    let err = checkout.submit_shipping().await.unwrap_err();

    let CheckoutError::Validation(fields) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(fields.get("phone"), Some("Invalid Vietnam phone number"));
    assert_eq!(fields.len(), 1);
    assert_eq!(fake.calls(Op::CreateOrder), 0);
    assert_eq!(checkout.stage().await, Some(Stage::Shipping));

    // Editing the field clears its message.
    checkout
        .edit_field(ShippingField::Phone, "+84912345678")
        .await
        .unwrap();
    assert!(checkout.field_errors().await.is_empty());
    checkout.submit_shipping().await.unwrap();
    assert_eq!(fake.calls(Op::CreateOrder), 1);
}

#[tokio::test]
async fn test_missing_required_fields_are_reported_together() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();

    checkout.set_form(ShippingForm::default()).await.unwrap();
    let err = checkout.submit_shipping().await.unwrap_err();

    let CheckoutError::Validation(fields) = err else {
        panic!("expected a validation error");
    };
    assert_eq!(fields.get("zip"), Some("Zip-code is required"));
    assert_eq!(fields.get("phone"), Some("Phone number is required"));
    assert_eq!(fields.get("state"), None);
    assert_eq!(fields.len(), 7);
    assert_eq!(fake.calls(Op::CreateOrder), 0);
}

#[tokio::test]
async fn test_empty_order_is_blocked() {
    let fake = FakeStore::new();
    let (storefront, user) = signed_in(&fake).await;
    let checkout = storefront.checkout();

    checkout.begin(user, vec![]).await;
    checkout.set_form(valid_form()).await.unwrap();
    let err = checkout.submit_shipping().await.unwrap_err();

    assert!(matches!(err, CheckoutError::EmptyOrder));
    assert_eq!(
        err.notice(),
        Notice::Blocking("There are no items in this order".to_string())
    );
    assert_eq!(fake.calls(Op::CreateOrder), 0);
}

#[tokio::test]
async fn test_three_failure_shapes_keep_shipping_stage() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();

    let fields: FieldErrors = [("zip", "Unknown zip-code")].into_iter().collect();
    fake.fail_next(Op::CreateOrder, Failure::Fields(fields.clone()));
    let err = checkout.submit_shipping().await.unwrap_err();
    assert_eq!(err.notice(), Notice::Fields(fields.clone()));
    assert_eq!(checkout.field_errors().await, fields);

    fake.fail_next(
        Op::CreateOrder,
        Failure::Rejected {
            status: 400,
            message: "Product 2 is out of stock".to_string(),
        },
    );
    let err = checkout.submit_shipping().await.unwrap_err();
    assert_eq!(
        err.notice(),
        Notice::Blocking("Product 2 is out of stock".to_string())
    );

    fake.fail_next(Op::CreateOrder, Failure::Unreachable);
    let err = checkout.submit_shipping().await.unwrap_err();
    assert_eq!(err.notice(), Notice::NetworkUnreachable);

    assert_eq!(checkout.stage().await, Some(Stage::Shipping));
    assert!(fake.orders().is_empty());

    checkout.submit_shipping().await.unwrap();
    assert_eq!(checkout.stage().await, Some(Stage::Payment));
    assert_eq!(fake.calls(Op::CreateOrder), 4);
}

#[tokio::test]
async fn test_double_submit_creates_one_order() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();
    fake.set_latency(Op::CreateOrder, Duration::from_millis(30));

    let (first, second) = tokio::join!(checkout.submit_shipping(), checkout.submit_shipping());

    assert!(first.is_ok());
    assert!(matches!(second, Err(CheckoutError::AlreadyPending)));
    assert!(!checkout.is_pending());
    assert_eq!(fake.calls(Op::CreateOrder), 1);
    assert_eq!(fake.orders().len(), 1);
}

#[tokio::test]
async fn test_cart_edits_after_begin_do_not_change_the_order() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let cart = storefront.cart();
    let shirt_line = cart.items().await[0].cart_item_id;

    cart.change_quantity(shirt_line, 3).await.unwrap();
    assert_eq!(storefront.checkout().items().await[0].quantity.get(), 2);

    storefront.checkout().submit_shipping().await.unwrap();
    let orders = fake.orders();
    assert_eq!(orders[0].order_items[0].quantity, 2);
    assert_eq!(orders[0].total_price, Price::from_units(250_000));
}

// =============================================================================
// Payment stage
// =============================================================================

#[tokio::test]
async fn test_breakdown_falls_back_to_latest_order() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    fake.omit_order_body(true);
    let checkout = storefront.checkout();

    let order = checkout.submit_shipping().await.unwrap();
    assert_eq!(order.id, None);

    let breakdown = checkout.price_breakdown().await.unwrap();
    assert_eq!(breakdown.subtotal, Price::from_units(250_000));
    assert_eq!(fake.calls(Op::LatestOrder), 1);
    assert_eq!(fake.calls(Op::OrderDetail), 0);
}

#[tokio::test]
async fn test_terms_and_payment_method_are_required() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();
    checkout.submit_shipping().await.unwrap();

    let err = checkout.place_order().await.unwrap_err();
    assert!(matches!(err, CheckoutError::TermsNotAccepted));

    checkout.accept_terms(true).await.unwrap();
    let err = checkout.place_order().await.unwrap_err();
    assert!(matches!(err, CheckoutError::NoPaymentMethod));

    assert_eq!(fake.calls(Op::ClearCart), 0);
    assert_eq!(checkout.stage().await, Some(Stage::Payment));
}

#[tokio::test]
async fn test_actions_outside_their_stage() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    let checkout = storefront.checkout();

    let err = checkout
        .select_payment_method(PaymentMethod::BankTransfer)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CheckoutError::WrongStage {
            expected: Stage::Payment,
            actual: Stage::Shipping
        }
    ));
    assert!(matches!(
        checkout.return_to_catalog().await,
        Err(CheckoutError::WrongStage { .. })
    ));

    checkout.submit_shipping().await.unwrap();
    assert!(matches!(
        checkout.edit_field(ShippingField::City, "Hue").await,
        Err(CheckoutError::WrongStage { .. })
    ));

    checkout.abandon().await;
    assert!(matches!(
        checkout.price_breakdown().await,
        Err(CheckoutError::NotStarted)
    ));
}

// =============================================================================
// Cart clearing after the order exists
// =============================================================================

#[tokio::test]
async fn test_failed_clear_is_retried_without_recreating_the_order() {
    let fake = FakeStore::new();
    let (storefront, user) = checkout_ready(&fake).await;
    ready_to_place(&storefront).await;
    let checkout = storefront.checkout();

    fake.fail_next(Op::ClearCart, Failure::Unreachable);
    let err = checkout.place_order().await.unwrap_err();
    assert!(matches!(err, CheckoutError::Api(ApiError::Unreachable(_))));
    assert_eq!(err.notice(), Notice::NetworkUnreachable);
    assert_eq!(checkout.stage().await, Some(Stage::Payment));
    assert_eq!(fake.cart_of(user.id).len(), 2);

    let marker = storefront
        .session()
        .get(keys::PENDING_CART_CLEAR)
        .await
        .unwrap()
        .unwrap();
    let marker: serde_json::Value = serde_json::from_str(&marker).unwrap();
    assert_eq!(marker["orderId"], 1);
    assert_eq!(marker["userId"], user.id.as_i64());

    checkout.place_order().await.unwrap();
    assert_eq!(checkout.stage().await, Some(Stage::Completed));
    assert!(fake.cart_of(user.id).is_empty());
    assert_eq!(fake.calls(Op::CreateOrder), 1);
    assert_eq!(fake.calls(Op::ClearCart), 2);
    assert!(
        storefront
            .session()
            .get(keys::PENDING_CART_CLEAR)
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_pending_clear_is_resumed_later() {
    let fake = FakeStore::new();
    let (storefront, user) = checkout_ready(&fake).await;
    ready_to_place(&storefront).await;
    let checkout = storefront.checkout();

    fake.fail_next(Op::ClearCart, Failure::Unreachable);
    checkout.place_order().await.unwrap_err();
    checkout.abandon().await;

    let resolved = checkout.resume_pending_clear().await.unwrap().unwrap();
    assert_eq!(resolved.order_id, Some(OrderId::new(1)));
    assert_eq!(resolved.user_id, user.id);
    assert!(fake.cart_of(user.id).is_empty());
    assert_eq!(fake.calls(Op::CreateOrder), 1);

    assert!(checkout.resume_pending_clear().await.unwrap().is_none());
    assert_eq!(fake.calls(Op::ClearCart), 2);
}

#[tokio::test]
async fn test_resume_completes_the_matching_checkout() {
    let fake = FakeStore::new();
    let (storefront, _) = checkout_ready(&fake).await;
    ready_to_place(&storefront).await;
    let checkout = storefront.checkout();

    fake.fail_next(Op::ClearCart, Failure::Unreachable);
    checkout.place_order().await.unwrap_err();

    fake.fail_next(Op::ClearCart, Failure::Unreachable);
    assert!(checkout.resume_pending_clear().await.is_err());
    assert_eq!(checkout.stage().await, Some(Stage::Payment));

    checkout.resume_pending_clear().await.unwrap().unwrap();
    assert_eq!(checkout.stage().await, Some(Stage::Completed));
}
