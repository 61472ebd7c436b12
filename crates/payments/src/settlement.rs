//! Payment settlement engine.
//!
//! An order is settled by one version-checked update that moves it from
//! pending to paid and attaches the payment details. The verify call, the
//! webhook and the simulated UPI collection all go through that update, so
//! whichever commits first wins and the rest observe `paid` without
//! touching the recorded details.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use document_store::{DocumentQuery, DocumentStore, WriteBatch};
use domain::{
    Caller, Money, Order, OrderStatus, PaymentDetails, PaymentIntent, PaymentStatus, RecordBatch,
    Repository, RetryPolicy, UpiApp, UpiDetails, Versioned, retry_on_conflict,
};

use crate::error::PaymentError;
use crate::gateway::{IntentRequest, PaymentGateway};
use crate::signature;
use crate::webhook::{PaymentEntity, WebhookEvent};

/// Settings for the settlement engine.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// Currency for intents and simulated payments.
    pub currency: String,
    /// Secret the provider signs webhooks with. Without it every webhook is
    /// rejected.
    pub webhook_secret: Option<String>,
    pub upi_simulation_enabled: bool,
    pub retry: RetryPolicy,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            currency: "INR".to_string(),
            webhook_secret: None,
            upi_simulation_enabled: false,
            retry: RetryPolicy::default(),
        }
    }
}

/// A payment opened at the provider, as handed to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentCreated {
    pub key_id: String,
    pub gateway_order_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// What a verified webhook did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    Settled(OrderId),
    /// The order was already paid; nothing changed.
    AlreadySettled(OrderId),
    /// Acknowledged without acting on it.
    Ignored(&'static str),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentStatusView {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub payment_details: Option<PaymentDetails>,
    pub total_amount: Money,
    pub date_order: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
enum Channel {
    Verify,
    Webhook,
    Upi,
}

impl Channel {
    fn label(&self) -> &'static str {
        match self {
            Channel::Verify => "verify",
            Channel::Webhook => "webhook",
            Channel::Upi => "upi",
        }
    }
}

/// UPI apps a client may pay with.
pub fn supported_apps() -> [UpiApp; 3] {
    UpiApp::ALL
}

/// Drives an order's payment from intent to settlement.
#[derive(Clone)]
pub struct SettlementEngine<S> {
    repo: Repository<S>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    config: SettlementConfig,
}

impl<S: DocumentStore> SettlementEngine<S> {
    pub fn new(
        store: S,
        gateway: Option<Arc<dyn PaymentGateway>>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            repo: Repository::new(store),
            gateway,
            config,
        }
    }

    pub fn upi_simulation_enabled(&self) -> bool {
        self.config.upi_simulation_enabled
    }

    fn gateway(&self) -> Result<&dyn PaymentGateway, PaymentError> {
        self.gateway
            .as_deref()
            .ok_or(PaymentError::NotConfigured("Payment gateway"))
    }

    /// Opens a payment at the provider for the caller's pending order.
    ///
    /// The charge is the order's frozen total in minor units. The order is
    /// left untouched; only the intent ledger records the provider's id.
    #[tracing::instrument(skip(self))]
    pub async fn create_intent(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<IntentCreated, PaymentError> {
        observe("create_intent", self.open_intent(caller, order_id).await)
    }

    async fn open_intent(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<IntentCreated, PaymentError> {
        let order = self.repo.require::<Order>(&order_id.to_string()).await?.record;
        caller.ensure_is(order.user)?;
        ensure_payable(&order)?;

        let amount_minor = order.total_price.minor();
        if amount_minor <= 0 {
            return Err(PaymentError::Validation(
                "Order total must be greater than zero".to_string(),
            ));
        }

        let gateway = self.gateway()?;
        let request = IntentRequest {
            order: order.id,
            user: order.user,
            amount_minor,
            currency: self.config.currency.clone(),
        };
        let intent = gateway.create_intent(&request).await?;

        let record = PaymentIntent {
            gateway_order_id: intent.gateway_order_id.clone(),
            order: order.id,
            user: order.user,
            amount_minor: intent.amount_minor,
            currency: intent.currency.clone(),
            created_at: Utc::now(),
        };
        self.repo
            .commit(WriteBatch::new().insert_record(&record)?)
            .await?;

        tracing::info!(
            %order_id,
            gateway_order_id = %intent.gateway_order_id,
            amount_minor,
            "payment intent created"
        );

        Ok(IntentCreated {
            key_id: gateway.key_id().to_string(),
            gateway_order_id: intent.gateway_order_id,
            amount_minor: intent.amount_minor,
            currency: intent.currency,
        })
    }

    /// Settles an order from the signature the provider gave the client.
    ///
    /// The signature is checked before anything is read. The intent must
    /// have been opened for this order, so a valid signature for one order
    /// cannot pay another.
    #[tracing::instrument(skip(self, signature))]
    pub async fn verify_and_settle(
        &self,
        caller: &Caller,
        order_id: OrderId,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, PaymentError> {
        observe(
            "verify",
            self.verify(caller, order_id, gateway_order_id, payment_id, signature)
                .await,
        )
    }

    async fn verify(
        &self,
        caller: &Caller,
        order_id: OrderId,
        gateway_order_id: &str,
        payment_id: &str,
        signature: &str,
    ) -> Result<Order, PaymentError> {
        if [gateway_order_id, payment_id, signature]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(PaymentError::Validation(
                "Missing payment verification fields".to_string(),
            ));
        }

        let gateway = self.gateway()?;
        if !gateway.verify_payment_signature(gateway_order_id, payment_id, signature) {
            return Err(PaymentError::InvalidSignature);
        }

        let intent = match self.repo.load::<PaymentIntent>(gateway_order_id).await? {
            Some(intent) if intent.record.order == order_id => intent.record,
            _ => {
                return Err(PaymentError::Validation(
                    "Payment does not belong to this order".to_string(),
                ));
            }
        };

        self.settle(order_id, Some(caller), Channel::Verify, |order| PaymentDetails {
            transaction_id: payment_id.to_string(),
            payment_status: PaymentStatus::Completed,
            payment_date: Utc::now(),
            amount: order.total_price,
            currency: intent.currency.clone(),
            upi_details: None,
        })
        .await
    }

    /// Handles a provider webhook.
    ///
    /// The body's signature is checked before any field is trusted or any
    /// order is looked up. Replays and events for orders that are already
    /// paid succeed without changes; only signature failures are errors.
    #[tracing::instrument(skip_all)]
    pub async fn handle_webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        observe("webhook", self.webhook(body, signature_header).await)
    }

    async fn webhook(
        &self,
        body: &[u8],
        signature_header: Option<&str>,
    ) -> Result<WebhookOutcome, PaymentError> {
        let secret = self.config.webhook_secret.as_deref().unwrap_or_default();
        let verified = signature_header
            .is_some_and(|sig| signature::verify(secret.as_bytes(), body, sig));
        if !verified {
            return Err(PaymentError::InvalidSignature);
        }

        let event = WebhookEvent::parse(body)?;
        metrics::counter!("webhook_events_total", "event" => event.event.clone()).increment(1);

        let Some(payment) = event.captured_payment() else {
            tracing::warn!(event = %event.event, "ignoring webhook event");
            return Ok(WebhookOutcome::Ignored("unhandled event"));
        };

        let Some(order_id) = self.resolve_order(payment).await? else {
            tracing::warn!(payment_id = %payment.id, "captured payment for unknown order");
            return Ok(WebhookOutcome::Ignored("unknown order"));
        };

        let Some(Versioned { record: order, .. }) =
            self.repo.load::<Order>(&order_id.to_string()).await?
        else {
            tracing::warn!(%order_id, payment_id = %payment.id, "captured payment for unknown order");
            return Ok(WebhookOutcome::Ignored("unknown order"));
        };

        if payment
            .amount
            .is_some_and(|amount| amount != order.total_price.minor())
        {
            tracing::warn!(
                %order_id,
                payment_id = %payment.id,
                captured = ?payment.amount,
                expected = order.total_price.minor(),
                "captured amount does not match order total"
            );
            return Ok(WebhookOutcome::Ignored("amount mismatch"));
        }

        if order.status.is_settled() {
            tracing::info!(%order_id, "webhook for already paid order");
            return Ok(WebhookOutcome::AlreadySettled(order_id));
        }

        let currency = payment
            .currency
            .clone()
            .unwrap_or_else(|| self.config.currency.clone());
        let settled = self
            .settle(order_id, None, Channel::Webhook, |order| PaymentDetails {
                transaction_id: payment.id.clone(),
                payment_status: PaymentStatus::Completed,
                payment_date: Utc::now(),
                amount: order.total_price,
                currency: currency.clone(),
                upi_details: None,
            })
            .await;

        match settled {
            Ok(_) => Ok(WebhookOutcome::Settled(order_id)),
            Err(PaymentError::AlreadyPaid) => Ok(WebhookOutcome::AlreadySettled(order_id)),
            Err(PaymentError::NotPayable(status)) => {
                tracing::warn!(%order_id, %status, "captured payment for order that cannot be paid");
                Ok(WebhookOutcome::Ignored("order not payable"))
            }
            Err(e) => Err(e),
        }
    }

    /// Finds our order for a captured payment: the notes first, then the
    /// intent ledger.
    async fn resolve_order(
        &self,
        payment: &PaymentEntity,
    ) -> Result<Option<OrderId>, PaymentError> {
        if let Some(order) = payment.noted_order() {
            return Ok(Some(order));
        }
        let Some(gateway_order_id) = payment.order_id.as_deref() else {
            return Ok(None);
        };
        Ok(self
            .repo
            .load::<PaymentIntent>(gateway_order_id)
            .await?
            .map(|intent| intent.record.order))
    }

    /// Simulates a UPI collect request and settles the order with it.
    #[tracing::instrument(skip(self))]
    pub async fn process_upi(
        &self,
        caller: &Caller,
        order_id: OrderId,
        upi_id: &str,
        upi_app: &str,
    ) -> Result<Order, PaymentError> {
        observe("upi", self.collect_upi(caller, order_id, upi_id, upi_app).await)
    }

    async fn collect_upi(
        &self,
        caller: &Caller,
        order_id: OrderId,
        upi_id: &str,
        upi_app: &str,
    ) -> Result<Order, PaymentError> {
        if !self.config.upi_simulation_enabled {
            return Err(PaymentError::SimulationDisabled);
        }
        if !is_valid_upi_id(upi_id) {
            return Err(PaymentError::Validation("Invalid UPI ID format".to_string()));
        }
        let app = UpiApp::parse(upi_app)
            .ok_or_else(|| PaymentError::Validation(format!("Unsupported UPI app: {upi_app}")))?;

        self.settle(order_id, Some(caller), Channel::Upi, |order| PaymentDetails {
            transaction_id: format!("UPI{}", Utc::now().timestamp_millis()),
            payment_status: PaymentStatus::Completed,
            payment_date: Utc::now(),
            amount: order.total_price,
            currency: self.config.currency.clone(),
            upi_details: Some(UpiDetails {
                app,
                upi_id: upi_id.to_string(),
            }),
        })
        .await
    }

    /// Payment state of one of the caller's orders.
    #[tracing::instrument(skip(self))]
    pub async fn payment_status(
        &self,
        caller: &Caller,
        order_id: OrderId,
    ) -> Result<PaymentStatusView, PaymentError> {
        let order = self.repo.require::<Order>(&order_id.to_string()).await?.record;
        caller.ensure_is(order.user)?;

        Ok(PaymentStatusView {
            order_id: order.id,
            status: order.status,
            payment_details: order.payment_details,
            total_amount: order.total_price,
            date_order: order.date_order,
        })
    }

    /// The caller's paid orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn payment_history(
        &self,
        caller: &Caller,
        user: UserId,
    ) -> Result<Vec<Order>, PaymentError> {
        caller.ensure_is(user)?;
        let mut orders = self
            .repo
            .find::<Order>(
                DocumentQuery::default()
                    .filter("user", user.to_string())
                    .sort_desc("dateOrder"),
            )
            .await?;
        orders.retain(|order| order.status.is_settled());
        Ok(orders)
    }

    /// Moves a pending order to paid with the details built by `details`.
    ///
    /// Reloads on every attempt; a concurrent settlement that commits first
    /// turns this one into `AlreadyPaid`.
    async fn settle<F>(
        &self,
        order_id: OrderId,
        caller: Option<&Caller>,
        channel: Channel,
        details: F,
    ) -> Result<Order, PaymentError>
    where
        F: Fn(&Order) -> PaymentDetails,
    {
        let order = retry_on_conflict(&self.config.retry, "settle_payment", || async {
            let Versioned {
                record: mut order,
                version,
            } = self.repo.require::<Order>(&order_id.to_string()).await?;

            if let Some(caller) = caller {
                caller.ensure_is(order.user)?;
            }
            ensure_payable(&order)?;

            let payment = details(&order);
            order.record_payment(payment)?;
            self.repo
                .commit(WriteBatch::new().update_record(&order, version)?)
                .await?;
            Ok::<_, PaymentError>(order)
        })
        .await?;

        metrics::counter!("payments_settled_total", "channel" => channel.label()).increment(1);
        tracing::info!(
            %order_id,
            channel = channel.label(),
            transaction_id = order
                .payment_details
                .as_ref()
                .map(|p| p.transaction_id.as_str())
                .unwrap_or_default(),
            "order paid"
        );
        Ok(order)
    }
}

fn ensure_payable(order: &Order) -> Result<(), PaymentError> {
    if order.status.is_settled() {
        Err(PaymentError::AlreadyPaid)
    } else if !order.status.is_payable() {
        Err(PaymentError::NotPayable(order.status))
    } else {
        Ok(())
    }
}

/// `handle@provider`, both parts non-empty, no whitespace.
fn is_valid_upi_id(upi_id: &str) -> bool {
    if upi_id.chars().any(char::is_whitespace) {
        return false;
    }
    match upi_id.split_once('@') {
        Some((handle, provider)) => {
            !handle.is_empty() && !provider.is_empty() && !provider.contains('@')
        }
        None => false,
    }
}

/// Records rejected and failed payment operations.
fn observe<T>(operation: &'static str, result: Result<T, PaymentError>) -> Result<T, PaymentError> {
    if let Err(err) = &result {
        metrics::counter!("payments_rejected_total", "reason" => rejection_reason(err))
            .increment(1);
        match err {
            PaymentError::Gateway(_)
            | PaymentError::NotConfigured(_)
            | PaymentError::Domain(_)
            | PaymentError::Store(_) => {
                tracing::error!(operation, error = %err, "payment operation failed");
            }
            _ => tracing::warn!(operation, error = %err, "payment rejected"),
        }
    }
    result
}

fn rejection_reason(err: &PaymentError) -> &'static str {
    match err {
        PaymentError::NotFound { .. } => "not_found",
        PaymentError::Forbidden(_) => "forbidden",
        PaymentError::Validation(_) => "validation",
        PaymentError::AlreadyPaid => "already_paid",
        PaymentError::NotPayable(_) => "not_payable",
        PaymentError::InvalidSignature => "invalid_signature",
        PaymentError::Gateway(_) => "gateway",
        PaymentError::NotConfigured(_) => "not_configured",
        PaymentError::SimulationDisabled => "disabled",
        PaymentError::Domain(_) | PaymentError::Store(_) => "internal",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upi_id_format() {
        assert!(is_valid_upi_id("alice@okaxis"));
        assert!(is_valid_upi_id("98765.43210@ybl"));
        assert!(!is_valid_upi_id("alice"));
        assert!(!is_valid_upi_id("@okaxis"));
        assert!(!is_valid_upi_id("alice@"));
        assert!(!is_valid_upi_id("al ice@okaxis"));
        assert!(!is_valid_upi_id("alice@ok@axis"));
    }

    #[test]
    fn supported_apps_in_display_order() {
        let names: Vec<_> = supported_apps().iter().map(|a| a.display_name()).collect();
        assert_eq!(names, ["Google Pay", "PhonePe", "Paytm"]);
    }
}
