//! Subscription and payment types.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BillingPeriod {
    Monthly,
    Yearly,
}

/// Crypto payment instructions returned when a subscription is bought.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionOrder {
    pub orderid: String,
    pub amount: String,
    pub address: String,
    pub network: String,
    pub crypto: String,
    /// QR code image (data URL or remote URL).
    pub qr: String,
    pub subscription: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
pub enum PaymentStatus {
    Waiting,
    Paid,
    Processed,
}

impl PaymentStatus {
    /// Whether polling can stop.
    pub fn is_settled(&self) -> bool {
        matches!(self, PaymentStatus::Paid | PaymentStatus::Processed)
    }
}
