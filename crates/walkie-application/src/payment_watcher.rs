//! Subscription purchase and payment-status polling.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, bail};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use walkie_core::account::AccountRefresh;
use walkie_core::notification::Notifier;
use walkie_core::payment::{BillingPeriod, PaymentStatus, SubscriptionOrder};
use walkie_infrastructure::api::ApiError;
use walkie_infrastructure::api::dto::BuySubscriptionRequest;

use crate::backend::PaymentBackend;

pub const PAYMENT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const SELECT_CRYPTO_MESSAGE: &str = "Please select a cryptocurrency";
pub const SUBSCRIPTION_FAILED_MESSAGE: &str = "Failed to process subscription";

pub struct PaymentWatcher {
    backend: Arc<dyn PaymentBackend>,
    notifier: Notifier,
    account: Arc<dyn AccountRefresh>,
    interval: Duration,
}

impl PaymentWatcher {
    pub fn new(
        backend: Arc<dyn PaymentBackend>,
        notifier: Notifier,
        account: Arc<dyn AccountRefresh>,
    ) -> Self {
        Self {
            backend,
            notifier,
            account,
            interval: PAYMENT_POLL_INTERVAL,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Places a subscription order and returns the payment details.
    pub async fn buy_subscription(
        &self,
        subscription_id: i64,
        crypto: &str,
        period: BillingPeriod,
        token: &str,
    ) -> Result<SubscriptionOrder> {
        if crypto.trim().is_empty() {
            self.notifier.error(SELECT_CRYPTO_MESSAGE);
            bail!(SELECT_CRYPTO_MESSAGE);
        }
        let request = BuySubscriptionRequest {
            subscriptionid: subscription_id,
            crypto: crypto.to_string(),
            period,
        };
        match self.backend.buy_subscription(&request, token).await {
            Ok(order) => {
                tracing::info!("[PaymentWatcher] Order {} created", order.orderid);
                Ok(order)
            }
            Err(e) => {
                match &e {
                    ApiError::Cancelled => {}
                    ApiError::Rejected { message, .. } if !message.is_empty() => {
                        self.notifier.error(message.clone())
                    }
                    _ => self.notifier.error(SUBSCRIPTION_FAILED_MESSAGE),
                }
                Err(e.into())
            }
        }
    }

    /// Polls the order until it is paid or processed.
    ///
    /// Returns `None` when `cancel` fires first. Failed polls are logged and
    /// retried on the next tick.
    pub async fn wait_for_settlement(
        &self,
        order_id: &str,
        token: &str,
        cancel: &CancellationToken,
    ) -> Option<PaymentStatus> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("[PaymentWatcher] Stopped watching {}", order_id);
                    return None;
                }
                _ = ticker.tick() => {}
            }

            match self.backend.payment_status(order_id, token).await {
                Ok(response) if response.status.is_settled() => {
                    tracing::info!("[PaymentWatcher] Order {} {}", order_id, response.status);
                    self.notifier.success(response.message);
                    self.account.refresh_account().await;
                    return Some(response.status);
                }
                Ok(response) => {
                    tracing::debug!("[PaymentWatcher] Order {} {}", order_id, response.status);
                }
                Err(e) => {
                    tracing::warn!("[PaymentWatcher] Status check for {} failed: {}", order_id, e);
                }
            }
        }
    }
}
