use std::sync::Arc;

use common::{OrderId, UserId};
use document_store::InMemoryDocumentStore;
use domain::{
    Caller, CatalogService, CheckoutService, Money, NewProduct, Order, OrderService, OrderStatus,
    PaymentStatus, RetryPolicy, ShippingInfo, UpiApp,
};
use payments::signature;
use payments::{
    InMemoryPaymentGateway, PaymentError, PaymentGateway, SettlementConfig, SettlementEngine,
    WebhookOutcome,
};

const WEBHOOK_SECRET: &str = "whsec_test";

struct Shop {
    store: InMemoryDocumentStore,
    gateway: Arc<InMemoryPaymentGateway>,
    engine: SettlementEngine<InMemoryDocumentStore>,
    orders: OrderService<InMemoryDocumentStore>,
    admin: Caller,
}

impl Shop {
    fn new() -> Self {
        Self::with_config(SettlementConfig {
            webhook_secret: Some(WEBHOOK_SECRET.to_string()),
            upi_simulation_enabled: true,
            ..SettlementConfig::default()
        })
    }

    fn with_config(config: SettlementConfig) -> Self {
        let store = InMemoryDocumentStore::new();
        let gateway = Arc::new(InMemoryPaymentGateway::default());
        let engine = SettlementEngine::new(
            store.clone(),
            Some(gateway.clone() as Arc<dyn PaymentGateway>),
            config,
        );
        Self {
            orders: OrderService::new(store.clone(), RetryPolicy::default()),
            store,
            gateway,
            engine,
            admin: Caller::admin(UserId::new()),
        }
    }

    /// Places a pending order for a fresh user: 2 units at 10.00.
    async fn pending_order(&self) -> (Caller, Order) {
        let catalog = CatalogService::new(self.store.clone(), RetryPolicy::default());
        let checkout = CheckoutService::new(self.store.clone(), RetryPolicy::default());

        let product = catalog
            .create_product(
                &self.admin,
                NewProduct {
                    name: "Widget".to_string(),
                    price: Money::from_minor(1000).unwrap(),
                    count_in_stock: 5,
                },
            )
            .await
            .unwrap();

        let user = UserId::new();
        let caller = Caller::user(user);
        let details = checkout
            .direct_purchase(
                &caller,
                user,
                product.id,
                2,
                ShippingInfo::new("1 MG Road", "Pune", "411001", "9999999999"),
            )
            .await
            .unwrap();
        (caller, details.order)
    }

    async fn reload(&self, order: OrderId) -> Order {
        self.orders.get_order(&self.admin, order).await.unwrap().order
    }

    async fn assert_unpaid(&self, order: OrderId) {
        let order = self.reload(order).await;
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(order.payment_details.is_none());
    }
}

fn captured_event(
    order: Option<OrderId>,
    gateway_order_id: &str,
    payment_id: &str,
    amount: i64,
) -> Vec<u8> {
    let notes = match order {
        Some(order) => serde_json::json!({ "orderId": order.to_string() }),
        None => serde_json::json!([]),
    };
    serde_json::json!({
        "event": "payment.captured",
        "payload": {
            "payment": {
                "entity": {
                    "id": payment_id,
                    "order_id": gateway_order_id,
                    "amount": amount,
                    "currency": "INR",
                    "notes": notes
                }
            }
        }
    })
    .to_string()
    .into_bytes()
}

fn sign_webhook(body: &[u8]) -> String {
    signature::sign(WEBHOOK_SECRET.as_bytes(), body).unwrap()
}

mod intents {
    use super::*;

    #[tokio::test]
    async fn intent_charges_frozen_total_in_minor_units() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;

        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();

        assert_eq!(intent.amount_minor, 2000);
        assert_eq!(intent.currency, "INR");
        assert_eq!(intent.key_id, "test_key");
        assert_eq!(shop.gateway.intents_created(), 1);
        // Opening a payment does not touch the order
        shop.assert_unpaid(order.id).await;
    }

    #[tokio::test]
    async fn intent_on_paid_order_is_rejected_without_gateway_call() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        shop.engine
            .process_upi(&caller, order.id, "alice@okaxis", "gpay")
            .await
            .unwrap();

        let err = shop.engine.create_intent(&caller, order.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyPaid));
        assert_eq!(shop.gateway.intents_created(), 0);
    }

    #[tokio::test]
    async fn intent_for_someone_elses_order_is_forbidden() {
        let shop = Shop::new();
        let (_, order) = shop.pending_order().await;
        let stranger = Caller::user(UserId::new());

        let err = shop.engine.create_intent(&stranger, order.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::Forbidden(_)));
        assert_eq!(shop.gateway.intents_created(), 0);
    }

    #[tokio::test]
    async fn intent_on_cancelled_order_is_not_payable() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        shop.orders
            .update_status(&shop.admin, order.id, OrderStatus::Cancelled)
            .await
            .unwrap();

        let err = shop.engine.create_intent(&caller, order.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::NotPayable(OrderStatus::Cancelled)));
    }

    #[tokio::test]
    async fn gateway_failure_is_reported() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        shop.gateway.set_failing(true);

        let err = shop.engine.create_intent(&caller, order.id).await.unwrap_err();

        assert!(matches!(err, PaymentError::Gateway(_)));
    }

    #[tokio::test]
    async fn missing_gateway_is_not_configured() {
        let store = InMemoryDocumentStore::new();
        let engine = SettlementEngine::new(store, None, SettlementConfig::default());

        let err = engine
            .verify_and_settle(&Caller::user(UserId::new()), OrderId::new(), "o", "p", "s")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::NotConfigured(_)));
    }
}

mod verify {
    use super::*;

    #[tokio::test]
    async fn valid_signature_settles_order() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_1");

        let paid = shop
            .engine
            .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap();

        assert_eq!(paid.status, OrderStatus::Paid);
        let details = paid.payment_details.unwrap();
        assert_eq!(details.transaction_id, "pay_1");
        assert_eq!(details.payment_status, PaymentStatus::Completed);
        assert_eq!(details.amount, order.total_price);
        assert_eq!(details.currency, "INR");
    }

    #[tokio::test]
    async fn second_verify_is_already_paid_and_keeps_details() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_1");

        let first = shop
            .engine
            .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap();
        let err = shop
            .engine
            .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyPaid));
        assert_eq!(shop.reload(order.id).await.payment_details, first.payment_details);
    }

    #[tokio::test]
    async fn bad_signature_leaves_order_pending() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_other");

        let err = shop
            .engine
            .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::InvalidSignature));
        let reloaded = shop.reload(order.id).await;
        assert_eq!(reloaded.status, OrderStatus::Pending);
        assert!(reloaded.payment_details.is_none());
    }

    #[tokio::test]
    async fn missing_fields_are_rejected() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;

        let err = shop
            .engine
            .verify_and_settle(&caller, order.id, "order_1", " ", "abc")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn signature_for_another_order_cannot_settle_this_one() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let (_, other) = shop.pending_order().await;
        let other_owner = Caller::user(other.user);
        let other_intent = shop.engine.create_intent(&other_owner, other.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&other_intent.gateway_order_id, "pay_1");

        let err = shop
            .engine
            .verify_and_settle(&caller, order.id, &other_intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Validation(_)));
        assert_eq!(shop.reload(order.id).await.status, OrderStatus::Pending);
        assert_eq!(shop.reload(other.id).await.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn non_owner_cannot_settle() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_1");
        let stranger = Caller::user(UserId::new());

        let err = shop
            .engine
            .verify_and_settle(&stranger, order.id, &intent.gateway_order_id, "pay_1", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::Forbidden(_)));
        assert_eq!(shop.reload(order.id).await.status, OrderStatus::Pending);
    }
}

mod webhook {
    use super::*;

    #[tokio::test]
    async fn captured_payment_settles_order() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let body = captured_event(Some(order.id), &intent.gateway_order_id, "pay_w", 2000);

        let outcome = shop
            .engine
            .handle_webhook(&body, Some(&sign_webhook(&body)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Settled(order.id));
        let reloaded = shop.reload(order.id).await;
        assert_eq!(reloaded.status, OrderStatus::Paid);
        assert_eq!(reloaded.payment_details.unwrap().transaction_id, "pay_w");
    }

    #[tokio::test]
    async fn order_is_found_through_intent_when_notes_are_empty() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let body = captured_event(None, &intent.gateway_order_id, "pay_w", 2000);

        let outcome = shop
            .engine
            .handle_webhook(&body, Some(&sign_webhook(&body)))
            .await
            .unwrap();

        assert_eq!(outcome, WebhookOutcome::Settled(order.id));
    }

    #[tokio::test]
    async fn tampered_body_is_rejected_without_mutation() {
        let shop = Shop::new();
        let (_, order) = shop.pending_order().await;
        let original = captured_event(Some(order.id), "order_x", "pay_w", 2000);
        let sig = sign_webhook(&original);
        let tampered = captured_event(Some(order.id), "order_x", "pay_evil", 2000);

        let err = shop.engine.handle_webhook(&tampered, Some(&sig)).await.unwrap_err();

        assert!(matches!(err, PaymentError::InvalidSignature));
        shop.assert_unpaid(order.id).await;
    }

    #[tokio::test]
    async fn missing_signature_or_secret_is_rejected() {
        let shop = Shop::new();
        let (_, order) = shop.pending_order().await;
        let body = captured_event(Some(order.id), "order_x", "pay_w", 2000);

        let err = shop.engine.handle_webhook(&body, None).await.unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));

        let unconfigured = Shop::with_config(SettlementConfig::default());
        let err = unconfigured
            .engine
            .handle_webhook(&body, Some(&sign_webhook(&body)))
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::InvalidSignature));
    }

    #[tokio::test]
    async fn redelivery_is_a_quiet_no_op() {
        let shop = Shop::new();
        let (_, order) = shop.pending_order().await;
        let body = captured_event(Some(order.id), "order_x", "pay_w", 2000);
        let sig = sign_webhook(&body);

        shop.engine.handle_webhook(&body, Some(&sig)).await.unwrap();
        let paid = shop.reload(order.id).await;
        let outcome = shop.engine.handle_webhook(&body, Some(&sig)).await.unwrap();

        assert_eq!(outcome, WebhookOutcome::AlreadySettled(order.id));
        assert_eq!(shop.reload(order.id).await, paid);
    }

    #[tokio::test]
    async fn anomalies_are_acknowledged_without_mutation() {
        let shop = Shop::new();
        let (_, order) = shop.pending_order().await;

        let wrong_amount = captured_event(Some(order.id), "order_x", "pay_w", 1);
        let outcome = shop
            .engine
            .handle_webhook(&wrong_amount, Some(&sign_webhook(&wrong_amount)))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("amount mismatch"));

        let unknown = captured_event(Some(OrderId::new()), "order_x", "pay_w", 2000);
        let outcome = shop
            .engine
            .handle_webhook(&unknown, Some(&sign_webhook(&unknown)))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("unknown order"));

        let failed = br#"{"event":"payment.failed","payload":{}}"#;
        let outcome = shop
            .engine
            .handle_webhook(failed, Some(&sign_webhook(failed)))
            .await
            .unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("unhandled event"));

        shop.assert_unpaid(order.id).await;
    }

    #[tokio::test]
    async fn verify_after_webhook_is_already_paid() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let body = captured_event(Some(order.id), &intent.gateway_order_id, "pay_w", 2000);
        shop.engine
            .handle_webhook(&body, Some(&sign_webhook(&body)))
            .await
            .unwrap();

        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_w");
        let err = shop
            .engine
            .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_w", &sig)
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyPaid));
    }

    #[tokio::test]
    async fn racing_verify_and_webhook_settle_once() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        let intent = shop.engine.create_intent(&caller, order.id).await.unwrap();
        let sig = shop.gateway.sign_payment(&intent.gateway_order_id, "pay_v");
        let body = captured_event(Some(order.id), &intent.gateway_order_id, "pay_w", 2000);
        let webhook_sig = sign_webhook(&body);

        let (verified, hooked) = tokio::join!(
            shop.engine
                .verify_and_settle(&caller, order.id, &intent.gateway_order_id, "pay_v", &sig),
            shop.engine.handle_webhook(&body, Some(&webhook_sig)),
        );

        let hooked = hooked.unwrap();
        let reloaded = shop.reload(order.id).await;
        let transaction = reloaded.payment_details.unwrap().transaction_id;
        match verified {
            Ok(_) => {
                assert_eq!(hooked, WebhookOutcome::AlreadySettled(order.id));
                assert_eq!(transaction, "pay_v");
            }
            Err(PaymentError::AlreadyPaid) => {
                assert_eq!(hooked, WebhookOutcome::Settled(order.id));
                assert_eq!(transaction, "pay_w");
            }
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
}

mod upi {
    use super::*;

    #[tokio::test]
    async fn simulated_collection_records_upi_details() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;

        let paid = shop
            .engine
            .process_upi(&caller, order.id, "alice@okaxis", "phonepe")
            .await
            .unwrap();

        let details = paid.payment_details.unwrap();
        assert!(details.transaction_id.starts_with("UPI"));
        assert!(details.transaction_id[3..].parse::<i64>().is_ok());
        let upi = details.upi_details.unwrap();
        assert_eq!(upi.app, UpiApp::Phonepe);
        assert_eq!(upi.upi_id, "alice@okaxis");
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_lookup() {
        let shop = Shop::new();
        let caller = Caller::user(UserId::new());

        let bad_id = shop
            .engine
            .process_upi(&caller, OrderId::new(), "alice", "gpay")
            .await
            .unwrap_err();
        let bad_app = shop
            .engine
            .process_upi(&caller, OrderId::new(), "alice@okaxis", "bhim")
            .await
            .unwrap_err();

        assert!(matches!(bad_id, PaymentError::Validation(_)));
        assert!(matches!(bad_app, PaymentError::Validation(_)));
    }

    #[tokio::test]
    async fn disabled_simulation_is_rejected() {
        let shop = Shop::with_config(SettlementConfig::default());
        let (caller, order) = shop.pending_order().await;

        let err = shop
            .engine
            .process_upi(&caller, order.id, "alice@okaxis", "gpay")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::SimulationDisabled));
        assert_eq!(shop.reload(order.id).await.status, OrderStatus::Pending);
    }

    #[tokio::test]
    async fn second_collection_is_already_paid() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;
        shop.engine
            .process_upi(&caller, order.id, "alice@okaxis", "gpay")
            .await
            .unwrap();

        let err = shop
            .engine
            .process_upi(&caller, order.id, "alice@okaxis", "gpay")
            .await
            .unwrap_err();

        assert!(matches!(err, PaymentError::AlreadyPaid));
    }
}

mod queries {
    use super::*;

    #[tokio::test]
    async fn status_reports_payment_for_owner_only() {
        let shop = Shop::new();
        let (caller, order) = shop.pending_order().await;

        let before = shop.engine.payment_status(&caller, order.id).await.unwrap();
        assert_eq!(before.status, OrderStatus::Pending);
        assert!(before.payment_details.is_none());
        assert_eq!(before.total_amount, order.total_price);

        shop.engine
            .process_upi(&caller, order.id, "alice@okaxis", "paytm")
            .await
            .unwrap();
        let after = shop.engine.payment_status(&caller, order.id).await.unwrap();
        assert_eq!(after.status, OrderStatus::Paid);
        assert!(after.payment_details.is_some());

        let err = shop
            .engine
            .payment_status(&Caller::user(UserId::new()), order.id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden(_)));

        let err = shop
            .engine
            .payment_status(&caller, OrderId::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::NotFound { .. }));
    }

    #[tokio::test]
    async fn history_lists_only_paid_orders() {
        let shop = Shop::new();
        let (caller, paid) = shop.pending_order().await;
        shop.engine
            .process_upi(&caller, paid.id, "alice@okaxis", "gpay")
            .await
            .unwrap();

        let history = shop
            .engine
            .payment_history(&caller, caller.user_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].id, paid.id);

        let err = shop
            .engine
            .payment_history(&Caller::user(UserId::new()), caller.user_id)
            .await
            .unwrap_err();
        assert!(matches!(err, PaymentError::Forbidden(_)));
    }
}
