use std::{collections::BTreeMap, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::timestamp;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub const ALL: [PaymentStatus; 4] = [
        PaymentStatus::Pending,
        PaymentStatus::Paid,
        PaymentStatus::Failed,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            PaymentStatus::Pending => "Pending",
            PaymentStatus::Paid => "Paid",
            PaymentStatus::Failed => "Failed",
            PaymentStatus::Refunded => "Refunded",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            "refunded" => Ok(PaymentStatus::Refunded),
            other => Err(format!("unknown payment status {other:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(default)]
    pub application_id: Option<Uuid>,
    pub amount: f64,
    pub currency: String,
    pub status: PaymentStatus,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// Paid and outstanding sums per currency.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PaymentTotals {
    pub paid: BTreeMap<String, f64>,
    pub pending: BTreeMap<String, f64>,
}

impl PaymentTotals {
    pub fn of<'a>(payments: impl IntoIterator<Item = &'a Payment>) -> Self {
        let mut totals = Self::default();
        for payment in payments {
            let bucket = match payment.status {
                PaymentStatus::Paid => &mut totals.paid,
                PaymentStatus::Pending => &mut totals.pending,
                PaymentStatus::Failed | PaymentStatus::Refunded => continue,
            };
            *bucket.entry(payment.currency.clone()).or_default() += payment.amount;
        }
        totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payment(amount: f64, currency: &str, status: PaymentStatus) -> Payment {
        Payment {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            application_id: None,
            amount,
            currency: currency.to_owned(),
            status,
            description: None,
            created_at: None,
        }
    }

    #[test]
    fn totals_group_by_currency_and_status() {
        let payments = vec![
            payment(100.0, "USD", PaymentStatus::Paid),
            payment(50.0, "USD", PaymentStatus::Paid),
            payment(200.0, "EUR", PaymentStatus::Pending),
            payment(75.0, "USD", PaymentStatus::Refunded),
        ];

        let totals = PaymentTotals::of(&payments);
        assert_eq!(totals.paid.get("USD"), Some(&150.0));
        assert_eq!(totals.pending.get("EUR"), Some(&200.0));
        assert_eq!(totals.paid.get("EUR"), None);
    }
}
