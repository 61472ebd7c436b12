//! Value objects for the order domain.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::money::Money;

/// Street address an order ships to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub zip: String,
}

/// Where and to whom an order ships.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub shipping_address: Address,
    pub phone: String,
}

impl ShippingInfo {
    pub fn new(
        street: impl Into<String>,
        city: impl Into<String>,
        zip: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            shipping_address: Address {
                street: street.into(),
                city: city.into(),
                zip: zip.into(),
            },
            phone: phone.into(),
        }
    }

    /// Checks every field is present and non-blank.
    pub fn validate(&self) -> Result<(), DomainError> {
        let fields = [
            ("street", &self.shipping_address.street),
            ("city", &self.shipping_address.city),
            ("zip", &self.shipping_address.zip),
            ("phone", &self.phone),
        ];
        match fields.iter().find(|(_, value)| value.trim().is_empty()) {
            Some((name, _)) => Err(DomainError::Validation(format!(
                "shipping {name} is required"
            ))),
            None => Ok(()),
        }
    }
}

/// State of the payment recorded against an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

/// UPI apps a customer can pay with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpiApp {
    Gpay,
    Phonepe,
    Paytm,
}

impl UpiApp {
    pub const ALL: [UpiApp; 3] = [UpiApp::Gpay, UpiApp::Phonepe, UpiApp::Paytm];

    pub fn id(&self) -> &'static str {
        match self {
            UpiApp::Gpay => "gpay",
            UpiApp::Phonepe => "phonepe",
            UpiApp::Paytm => "paytm",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            UpiApp::Gpay => "Google Pay",
            UpiApp::Phonepe => "PhonePe",
            UpiApp::Paytm => "Paytm",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|app| app.id() == value)
    }
}

/// UPI specifics of a payment made through a UPI app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpiDetails {
    pub app: UpiApp,
    pub upi_id: String,
}

/// Payment sub-record of an order. Absent until a payment is settled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentDetails {
    pub transaction_id: String,
    pub payment_status: PaymentStatus,
    pub payment_date: DateTime<Utc>,
    pub amount: Money,
    pub currency: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upi_details: Option<UpiDetails>,
}
