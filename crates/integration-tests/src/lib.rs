//! Integration test support for the Marigold storefront client.
//!
//! [`FakeStore`] is an in-memory implementation of the remote service with
//! per-operation call counters, injectable failures and optional latency, so
//! the scenario tests under `tests/` can drive the real cart, checkout and
//! history components end to end.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p marigold-integration-tests
//! ```

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use marigold_core::{
    CartItemId, Email, OrderId, OrderItemId, OrderStatus, Price, ProductId, UserId,
};
use marigold_storefront::Storefront;
use marigold_storefront::api::{
    AddToCartRequest, ApiError, CommerceApi, FieldErrors, Order, OrderItem, OrderRequest, Product,
};
use marigold_storefront::cart::{CartLineItem, Quantity};
use marigold_storefront::config::ClientConfig;
use marigold_storefront::session::{CurrentUser, MemorySessionStore, SessionStore};

/// Remote operations, for call counting and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    FetchCart,
    AddToCart,
    UpdateQuantity,
    DeleteItem,
    ClearCart,
    CreateOrder,
    LatestOrder,
    OrderDetail,
    OrdersByStatus,
    Wishlist,
    AddToWishlist,
    RemoveFromWishlist,
}

/// A failure to return instead of performing an operation.
#[derive(Debug, Clone)]
pub enum Failure {
    Unreachable,
    NotFound(String),
    Rejected { status: u16, message: String },
    Fields(FieldErrors),
}

impl Failure {
    fn into_error(self) -> ApiError {
        match self {
            Self::Unreachable => ApiError::Unreachable("connection refused".to_string()),
            Self::NotFound(message) => ApiError::NotFound(message),
            Self::Rejected { status, message } => ApiError::Rejected { status, message },
            Self::Fields(fields) => ApiError::FieldErrors(fields),
        }
    }
}

#[derive(Default)]
struct FakeState {
    products: HashMap<ProductId, Product>,
    carts: HashMap<UserId, Vec<CartLineItem>>,
    orders: Vec<(Email, Order)>,
    wishlist: Vec<ProductId>,
    next_cart_item: i64,
    next_order: i64,
    calls: HashMap<Op, usize>,
    failures: HashMap<Op, VecDeque<Failure>>,
    latency: HashMap<Op, Duration>,
    omit_order_body: bool,
}

/// In-memory remote service.
#[derive(Default)]
pub struct FakeStore {
    state: Mutex<FakeState>,
}

impl FakeStore {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    #[allow(clippy::unwrap_used)]
    fn lock(&self) -> MutexGuard<'_, FakeState> {
        self.state.lock().unwrap()
    }

    /// Register a catalog product.
    pub fn add_product(&self, id: i64, name: &str, price: i64) -> Product {
        let product = Product {
            product_id: ProductId::new(id),
            product_name: Some(name.to_string()),
            description: None,
            price: Some(Price::from_units(price)),
            stock_quantity: Some(100),
            image_url: None,
            category_name: None,
            sizes: vec![],
            colors: vec![],
        };
        self.lock().products.insert(product.product_id, product.clone());
        product
    }

    /// Put a line straight into a user's cart.
    pub fn seed_line(&self, user: UserId, product: &Product, quantity: u32) -> CartItemId {
        let mut state = self.lock();
        state.next_cart_item += 1;
        let id = CartItemId::new(state.next_cart_item);
        state.carts.entry(user).or_default().push(CartLineItem {
            cart_item_id: id,
            product: product.clone(),
            quantity: Quantity::new(quantity.max(1)).unwrap_or(Quantity::ONE),
            color: None,
            size: None,
            checked: false,
        });
        id
    }

    /// Server-side cart of `user`.
    #[must_use]
    pub fn cart_of(&self, user: UserId) -> Vec<CartLineItem> {
        self.lock().carts.get(&user).cloned().unwrap_or_default()
    }

    /// Every order created so far.
    #[must_use]
    pub fn orders(&self) -> Vec<Order> {
        self.lock().orders.iter().map(|(_, o)| o.clone()).collect()
    }

    /// Set an order's status.
    pub fn set_status(&self, order: OrderId, status: OrderStatus) {
        for (_, o) in &mut self.lock().orders {
            if o.id == order {
                o.order_status = status;
            }
        }
    }

    /// How many times `op` was invoked (including injected failures).
    #[must_use]
    pub fn calls(&self, op: Op) -> usize {
        self.lock().calls.get(&op).copied().unwrap_or(0)
    }

    /// Make the next invocation of `op` fail. Failures queue up.
    pub fn fail_next(&self, op: Op, failure: Failure) {
        self.lock().failures.entry(op).or_default().push_back(failure);
    }

    /// Delay every invocation of `op`.
    pub fn set_latency(&self, op: Op, latency: Duration) {
        self.lock().latency.insert(op, latency);
    }

    /// Acknowledge order creation without returning the created order.
    pub fn omit_order_body(&self, omit: bool) {
        self.lock().omit_order_body = omit;
    }

    /// Count the call, wait out any latency, then pop an injected failure.
    async fn enter(&self, op: Op) -> Result<(), ApiError> {
        let latency = {
            let mut state = self.lock();
            *state.calls.entry(op).or_insert(0) += 1;
            state.latency.get(&op).copied()
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        let failure = self
            .lock()
            .failures
            .get_mut(&op)
            .and_then(VecDeque::pop_front);
        failure.map_or(Ok(()), |f| Err(f.into_error()))
    }
}

#[async_trait]
impl CommerceApi for FakeStore {
    async fn fetch_cart(&self, user: UserId) -> Result<Vec<CartLineItem>, ApiError> {
        self.enter(Op::FetchCart).await?;
        Ok(self.cart_of(user))
    }

    async fn add_to_cart(&self, user: UserId, item: &AddToCartRequest) -> Result<(), ApiError> {
        self.enter(Op::AddToCart).await?;
        let mut state = self.lock();
        let product = state
            .products
            .get(&item.product_id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("product {}", item.product_id)))?;

        let cart = state.carts.entry(user).or_default();
        if let Some(line) = cart.iter_mut().find(|l| {
            l.product.product_id == item.product_id && l.color == item.color && l.size == item.size
        }) {
            line.quantity = line.quantity.apply_delta(i64::from(item.quantity.get()));
            return Ok(());
        }

        state.next_cart_item += 1;
        let id = CartItemId::new(state.next_cart_item);
        state.carts.entry(user).or_default().push(CartLineItem {
            cart_item_id: id,
            product,
            quantity: item.quantity,
            color: item.color.clone(),
            size: item.size.clone(),
            checked: false,
        });
        Ok(())
    }

    async fn update_quantity(
        &self,
        item: CartItemId,
        quantity: Quantity,
    ) -> Result<Option<CartLineItem>, ApiError> {
        self.enter(Op::UpdateQuantity).await?;
        let mut state = self.lock();
        let line = state
            .carts
            .values_mut()
            .flat_map(|lines| lines.iter_mut())
            .find(|l| l.cart_item_id == item)
            .ok_or_else(|| ApiError::NotFound(format!("Cart item {item} not found")))?;
        line.quantity = quantity;
        Ok(Some(line.clone()))
    }

    async fn delete_item(&self, item: CartItemId) -> Result<(), ApiError> {
        self.enter(Op::DeleteItem).await?;
        let mut state = self.lock();
        for lines in state.carts.values_mut() {
            if let Some(pos) = lines.iter().position(|l| l.cart_item_id == item) {
                lines.remove(pos);
                return Ok(());
            }
        }
        Err(ApiError::NotFound(format!("Cart item {item} not found")))
    }

    async fn clear_cart(&self, user: UserId) -> Result<(), ApiError> {
        self.enter(Op::ClearCart).await?;
        self.lock().carts.remove(&user);
        Ok(())
    }

    async fn create_order(
        &self,
        order: &OrderRequest,
        email: &Email,
    ) -> Result<Option<Order>, ApiError> {
        self.enter(Op::CreateOrder).await?;
        let mut state = self.lock();

        let mut items = Vec::with_capacity(order.order_items.len());
        for (index, item) in order.order_items.iter().enumerate() {
            let product = state
                .products
                .get(&item.product_id)
                .ok_or_else(|| ApiError::Rejected {
                    status: 400,
                    message: format!("Unknown product {}", item.product_id),
                })?;
            items.push(OrderItem {
                id: Some(OrderItemId::new(i64::try_from(index).unwrap_or(0) + 1)),
                product_id: item.product_id,
                product_name: product.product_name.clone(),
                quantity: item.quantity.get(),
                price: product.unit_price(),
                color: item.color.clone(),
                size: item.size.clone(),
            });
        }

        let total: Price = items.iter().map(|i| i.price.times(i.quantity)).sum();
        state.next_order += 1;
        let created = Order {
            id: OrderId::new(state.next_order),
            user_id: None,
            order_status: OrderStatus::Pending,
            shipping_address: Some(format!("{}, {}", order.street, order.city)),
            shipping_method: Some(order.shipping_method.to_string()),
            shipping_fee: order.shipping_price,
            total_price: total,
            subtotal: Some(total + order.shipping_price),
            created_at: None,
            order_items: items,
        };
        state.orders.push((email.clone(), created.clone()));

        Ok((!state.omit_order_body).then_some(created))
    }

    async fn latest_order(&self, email: &Email) -> Result<Order, ApiError> {
        self.enter(Op::LatestOrder).await?;
        self.lock()
            .orders
            .iter()
            .rev()
            .find(|(owner, _)| owner == email)
            .map(|(_, o)| o.clone())
            .ok_or_else(|| ApiError::NotFound("No orders yet".to_string()))
    }

    async fn order_detail(&self, order: OrderId) -> Result<Order, ApiError> {
        self.enter(Op::OrderDetail).await?;
        self.lock()
            .orders
            .iter()
            .find(|(_, o)| o.id == order)
            .map(|(_, o)| o.clone())
            .ok_or_else(|| ApiError::NotFound(format!("Order {order} not found")))
    }

    async fn orders_by_status(
        &self,
        status: OrderStatus,
        email: &Email,
    ) -> Result<Vec<Order>, ApiError> {
        self.enter(Op::OrdersByStatus).await?;
        Ok(self
            .lock()
            .orders
            .iter()
            .filter(|(owner, o)| owner == email && o.order_status == status)
            .map(|(_, o)| o.clone())
            .collect())
    }

    async fn wishlist(&self) -> Result<Vec<Product>, ApiError> {
        self.enter(Op::Wishlist).await?;
        let state = self.lock();
        Ok(state
            .wishlist
            .iter()
            .filter_map(|id| state.products.get(id).cloned())
            .collect())
    }

    async fn add_to_wishlist(&self, product: ProductId) -> Result<(), ApiError> {
        self.enter(Op::AddToWishlist).await?;
        let mut state = self.lock();
        if !state.products.contains_key(&product) {
            return Err(ApiError::NotFound(format!("product {product}")));
        }
        if !state.wishlist.contains(&product) {
            state.wishlist.push(product);
        }
        Ok(())
    }

    async fn remove_from_wishlist(&self, product: ProductId) -> Result<(), ApiError> {
        self.enter(Op::RemoveFromWishlist).await?;
        self.lock().wishlist.retain(|p| *p != product);
        Ok(())
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// The default test buyer.
#[must_use]
pub fn alice() -> CurrentUser {
    CurrentUser {
        id: UserId::new(7),
        email: Email::parse("alice@shop.vn").unwrap_or_else(|e| panic!("fixture email: {e}")),
    }
}

/// A storefront wired to `fake` with an in-memory session.
#[must_use]
pub fn storefront(fake: &Arc<FakeStore>) -> Storefront {
    let api: Arc<dyn CommerceApi> = Arc::clone(fake) as Arc<dyn CommerceApi>;
    let session: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let config = ClientConfig::from_lookup(|_| None).unwrap_or_else(|e| panic!("config: {e}"));
    Storefront::with_parts(config, api, session)
}

/// A storefront with [`alice`] signed in.
pub async fn signed_in(fake: &Arc<FakeStore>) -> (Storefront, CurrentUser) {
    let storefront = storefront(fake);
    let user = alice();
    storefront
        .sign_in(user.clone(), Some("test-token".to_string()))
        .await
        .unwrap_or_else(|e| panic!("sign in: {e}"));
    (storefront, user)
}
