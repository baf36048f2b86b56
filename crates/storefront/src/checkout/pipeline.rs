//! Checkout state machine.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::form::{ShippingField, ShippingForm, ShippingMethod};
use super::CheckoutError;
use crate::api::{ApiError, CommerceApi, FieldErrors, OrderItemRequest, OrderRef, PriceBreakdown};
use crate::cart::CartGateway;
use crate::orders::OrderHistory;
use crate::session::{self, CurrentUser, PendingCartClear, SessionStore, keys};

/// Checkout stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Shipping,
    Payment,
    Completed,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Shipping => "shipping",
            Self::Payment => "payment",
            Self::Completed => "completed",
        })
    }
}

/// Payment method picked on the payment stage. No processor is involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PaymentMethod {
    CashOnDelivery,
    Card,
    BankTransfer,
}

impl PaymentMethod {
    pub const ALL: [Self; 3] = [Self::CashOnDelivery, Self::Card, Self::BankTransfer];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CashOnDelivery => "cod",
            Self::Card => "card",
            Self::BankTransfer => "bank",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown payment method '{s}' (expected cod, card or bank)"))
    }
}

/// State of one checkout attempt.
#[derive(Debug, Clone)]
struct CheckoutState {
    stage: Stage,
    user: CurrentUser,
    /// Captured when checkout began; later cart edits never touch it.
    items: Vec<OrderItemRequest>,
    form: ShippingForm,
    method: ShippingMethod,
    field_errors: FieldErrors,
    order: Option<OrderRef>,
    breakdown: Option<PriceBreakdown>,
    payment: Option<PaymentMethod>,
    terms_accepted: bool,
}

impl CheckoutState {
    fn require(&self, expected: Stage) -> Result<(), CheckoutError> {
        if self.stage == expected {
            Ok(())
        } else {
            Err(CheckoutError::WrongStage {
                expected,
                actual: self.stage,
            })
        }
    }
}

/// Clears the in-flight flag when the submitting call ends, however it ends.
struct PendingGuard<'a>(&'a AtomicBool);

impl<'a> PendingGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, CheckoutError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| Self(flag))
            .map_err(|_| CheckoutError::AlreadyPending)
    }
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Drives one checkout from shipping details to a completed order.
///
/// Submitting actions (`submit_shipping`, `place_order`,
/// `resume_pending_clear`) share one in-flight gate: while one is running,
/// the others fail fast with [`CheckoutError::AlreadyPending`].
#[derive(Clone)]
pub struct CheckoutPipeline {
    inner: Arc<CheckoutPipelineInner>,
}

struct CheckoutPipelineInner {
    api: Arc<dyn CommerceApi>,
    cart: CartGateway,
    orders: OrderHistory,
    session: Arc<dyn SessionStore>,
    state: Mutex<Option<CheckoutState>>,
    pending: AtomicBool,
}

impl CheckoutPipeline {
    #[must_use]
    pub fn new(
        api: Arc<dyn CommerceApi>,
        cart: CartGateway,
        orders: OrderHistory,
        session: Arc<dyn SessionStore>,
    ) -> Self {
        Self {
            inner: Arc::new(CheckoutPipelineInner {
                api,
                cart,
                orders,
                session,
                state: Mutex::new(None),
                pending: AtomicBool::new(false),
            }),
        }
    }

    /// Start a checkout for `user` with the order lines selected in the cart.
    ///
    /// Replaces any checkout in progress.
    pub async fn begin(&self, user: CurrentUser, items: Vec<OrderItemRequest>) {
        debug!(user_id = %user.id, items = items.len(), "Checkout started");
        *self.inner.state.lock().await = Some(CheckoutState {
            stage: Stage::Shipping,
            user,
            items,
            form: ShippingForm::default(),
            method: ShippingMethod::default(),
            field_errors: FieldErrors::new(),
            order: None,
            breakdown: None,
            payment: None,
            terms_accepted: false,
        });
    }

    /// Current stage, or `None` when no checkout is in progress.
    pub async fn stage(&self) -> Option<Stage> {
        self.inner.state.lock().await.as_ref().map(|s| s.stage)
    }

    /// Whether a submitting action is in flight.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::Acquire)
    }

    /// Order lines captured when checkout began.
    pub async fn items(&self) -> Vec<OrderItemRequest> {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .map(|s| s.items.clone())
            .unwrap_or_default()
    }

    /// Field errors from the last shipping submission.
    pub async fn field_errors(&self) -> FieldErrors {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .map(|s| s.field_errors.clone())
            .unwrap_or_default()
    }

    /// Reference to the created order, once past the shipping stage.
    pub async fn order(&self) -> Option<OrderRef> {
        self.inner
            .state
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.order.clone())
    }

    // =========================================================================
    // Shipping
    // =========================================================================

    /// Update one shipping field; its error (if any) is cleared.
    ///
    /// # Errors
    ///
    /// Returns an error outside the shipping stage.
    pub async fn edit_field(
        &self,
        field: ShippingField,
        value: impl Into<String> + Send,
    ) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Shipping)?;
        state.form.set(field, value);
        state.field_errors.clear_field(field.wire_name());
        Ok(())
    }

    /// Replace the whole shipping form.
    ///
    /// # Errors
    ///
    /// Returns an error outside the shipping stage.
    pub async fn set_form(&self, form: ShippingForm) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Shipping)?;
        state.form = form;
        state.field_errors = FieldErrors::new();
        Ok(())
    }

    /// Choose the delivery speed.
    ///
    /// # Errors
    ///
    /// Returns an error outside the shipping stage.
    pub async fn set_shipping_method(&self, method: ShippingMethod) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Shipping)?;
        state.method = method;
        Ok(())
    }

    /// Validate the shipping form and create the order.
    ///
    /// Advances to Payment on success. On failure the pipeline stays on
    /// Shipping; server field errors are kept for [`Self::field_errors`].
    ///
    /// # Errors
    ///
    /// `Validation` and `EmptyOrder` are raised locally without a request;
    /// otherwise the service error is returned.
    #[instrument(skip(self))]
    pub async fn submit_shipping(&self) -> Result<OrderRef, CheckoutError> {
        let _pending = PendingGuard::acquire(&self.inner.pending)?;

        let (request, email) = {
            let mut guard = self.inner.state.lock().await;
            let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
            state.require(Stage::Shipping)?;

            let errors = state.form.validate();
            state.field_errors = errors.clone();
            if !errors.is_empty() {
                debug!(fields = errors.len(), "Shipping form rejected locally");
                return Err(CheckoutError::Validation(errors));
            }
            if state.items.is_empty() {
                return Err(CheckoutError::EmptyOrder);
            }

            (
                state.form.to_request(state.method, state.items.clone()),
                state.user.email.clone(),
            )
        };

        match self.inner.api.create_order(&request, &email).await {
            Ok(created) => {
                self.inner.cart.cache().invalidate_orders(&email).await;
                let order = OrderRef {
                    id: created.map(|o| o.id),
                    email,
                };
                info!(order_id = ?order.id, "Order created");

                if let Some(state) = self.inner.state.lock().await.as_mut()
                    && state.stage == Stage::Shipping
                {
                    state.stage = Stage::Payment;
                    state.order = Some(order.clone());
                    state.field_errors = FieldErrors::new();
                }
                Ok(order)
            }
            Err(e) => {
                warn!(error = %e, "Order creation failed");
                if let ApiError::FieldErrors(fields) = &e
                    && let Some(state) = self.inner.state.lock().await.as_mut()
                {
                    state.field_errors = fields.clone();
                }
                Err(e.into())
            }
        }
    }

    // =========================================================================
    // Payment
    // =========================================================================

    /// Authoritative price breakdown of the created order.
    ///
    /// # Errors
    ///
    /// Returns an error outside the payment stage or if the fetch fails.
    #[instrument(skip(self))]
    pub async fn price_breakdown(&self) -> Result<PriceBreakdown, CheckoutError> {
        let order = {
            let guard = self.inner.state.lock().await;
            let state = guard.as_ref().ok_or(CheckoutError::NotStarted)?;
            state.require(Stage::Payment)?;
            if let Some(breakdown) = state.breakdown {
                return Ok(breakdown);
            }
            state.order.clone().ok_or(CheckoutError::NotStarted)?
        };

        let breakdown = self.inner.orders.breakdown(&order).await?;
        if let Some(state) = self.inner.state.lock().await.as_mut() {
            state.breakdown = Some(breakdown);
        }
        Ok(breakdown)
    }

    /// Pick a payment method.
    ///
    /// # Errors
    ///
    /// Returns an error outside the payment stage.
    pub async fn select_payment_method(&self, method: PaymentMethod) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Payment)?;
        state.payment = Some(method);
        Ok(())
    }

    /// Record whether the terms were accepted.
    ///
    /// # Errors
    ///
    /// Returns an error outside the payment stage.
    pub async fn accept_terms(&self, accepted: bool) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_mut().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Payment)?;
        state.terms_accepted = accepted;
        Ok(())
    }

    /// Confirm the order: clear the cart and complete.
    ///
    /// The order already exists server-side, so this only clears the cart and
    /// may be retried freely. If clearing fails, a pending-clear marker is
    /// stored in the session and the pipeline stays on Payment.
    ///
    /// # Errors
    ///
    /// Returns a logic error when terms or payment method are missing, or the
    /// service error from clearing the cart.
    #[instrument(skip(self))]
    pub async fn place_order(&self) -> Result<OrderRef, CheckoutError> {
        let _pending = PendingGuard::acquire(&self.inner.pending)?;

        let (user, order) = {
            let guard = self.inner.state.lock().await;
            let state = guard.as_ref().ok_or(CheckoutError::NotStarted)?;
            state.require(Stage::Payment)?;
            if !state.terms_accepted {
                return Err(CheckoutError::TermsNotAccepted);
            }
            if state.payment.is_none() {
                return Err(CheckoutError::NoPaymentMethod);
            }
            let order = state.order.clone().ok_or(CheckoutError::NotStarted)?;
            (state.user.id, order)
        };

        if let Err(e) = self.inner.cart.clear_cart_confirmed(user).await {
            let marker = PendingCartClear {
                order_id: order.id,
                user_id: user,
            };
            if let Err(store_err) =
                session::set_json(self.inner.session.as_ref(), keys::PENDING_CART_CLEAR, &marker)
                    .await
            {
                warn!(error = %store_err, "Failed to record pending cart clear");
            }
            return Err(e.into());
        }

        if let Err(e) = self.inner.session.remove(keys::PENDING_CART_CLEAR).await {
            warn!(error = %e, "Failed to drop pending cart clear marker");
        }

        if let Some(state) = self.inner.state.lock().await.as_mut()
            && state.stage == Stage::Payment
        {
            state.stage = Stage::Completed;
        }
        info!(order_id = ?order.id, "Order completed");
        Ok(order)
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Leave a completed checkout.
    ///
    /// # Errors
    ///
    /// Returns an error unless the checkout is completed.
    pub async fn return_to_catalog(&self) -> Result<(), CheckoutError> {
        let mut guard = self.inner.state.lock().await;
        let state = guard.as_ref().ok_or(CheckoutError::NotStarted)?;
        state.require(Stage::Completed)?;
        *guard = None;
        Ok(())
    }

    /// Drop any checkout in progress. An order that was already created stays.
    pub async fn abandon(&self) {
        *self.inner.state.lock().await = None;
    }

    /// Retry a cart clear left pending by an earlier `place_order`.
    ///
    /// Returns the marker that was resolved, or `None` when nothing was pending.
    ///
    /// # Errors
    ///
    /// Returns the service error (the marker is kept) or a session error.
    #[instrument(skip(self))]
    pub async fn resume_pending_clear(&self) -> Result<Option<PendingCartClear>, CheckoutError> {
        let _pending = PendingGuard::acquire(&self.inner.pending)?;

        let Some(marker) = session::get_json::<PendingCartClear>(
            self.inner.session.as_ref(),
            keys::PENDING_CART_CLEAR,
        )
        .await?
        else {
            return Ok(None);
        };

        self.inner.cart.clear_cart_confirmed(marker.user_id).await?;
        self.inner
            .session
            .remove(keys::PENDING_CART_CLEAR)
            .await?;

        let mut guard = self.inner.state.lock().await;
        if let Some(state) = guard.as_mut()
            && state.stage == Stage::Payment
            && state.user.id == marker.user_id
            && state.order.as_ref().and_then(|o| o.id) == marker.order_id
        {
            state.stage = Stage::Completed;
        }
        info!(order_id = ?marker.order_id, "Pending cart clear resolved");
        Ok(Some(marker))
    }
}
