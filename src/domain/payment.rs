//! Payment request domain entity.
//! Framework-agnostic representation of a mobile-money deposit or withdrawal.

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentType {
    Deposit,
    Withdrawal,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Deposit => "deposit",
            PaymentType::Withdrawal => "withdrawal",
        }
    }

    /// Prefix used for correlation references handed to the provider.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            PaymentType::Deposit => "DEP",
            PaymentType::Withdrawal => "WDR",
        }
    }
}

impl fmt::Display for PaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "deposit" => Ok(PaymentType::Deposit),
            "withdrawal" | "withdraw" => Ok(PaymentType::Withdrawal),
            other => Err(format!("unknown payment type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Queued,
    Completed,
    Failed,
    Canceled,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Queued => "queued",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Completed | PaymentStatus::Failed | PaymentStatus::Canceled
        )
    }

    /// Maps a provider status string onto the canonical set.
    ///
    /// Unrecognized values are treated as still in progress.
    pub fn from_provider(raw: &str) -> Self {
        let upper = raw.trim().to_ascii_uppercase();
        match upper.as_str() {
            "SUCCESS" => PaymentStatus::Completed,
            "QUEUED" => PaymentStatus::Queued,
            "FAILED" => PaymentStatus::Failed,
            "PENDING" => PaymentStatus::Pending,
            s if s.contains("CANCEL") || s.contains("REJECT") => PaymentStatus::Canceled,
            _ => PaymentStatus::Pending,
        }
    }

    /// A stored status may only move forward: terminal states are final and
    /// `queued` never falls back to `pending`.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        match self {
            s if s.is_terminal() => false,
            PaymentStatus::Queued => next != PaymentStatus::Pending,
            _ => true,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(PaymentStatus::Pending),
            "queued" => Ok(PaymentStatus::Queued),
            "completed" => Ok(PaymentStatus::Completed),
            "failed" => Ok(PaymentStatus::Failed),
            "canceled" => Ok(PaymentStatus::Canceled),
            other => Err(format!("unknown payment status '{}'", other)),
        }
    }
}

/// Domain entity representing a payment request correlated with the provider.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    pub reference: String,
    pub user_id: Uuid,
    pub payment_type: PaymentType,
    pub amount: BigDecimal,
    pub phone: String,
    pub status: PaymentStatus,
    pub provider_reference: Option<String>,
    pub checkout_id: Option<String>,
    pub provider_data: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRequest {
    pub fn new(user_id: Uuid, payment_type: PaymentType, amount: BigDecimal, phone: String) -> Self {
        let now = Utc::now();
        Self {
            reference: generate_reference(payment_type),
            user_id,
            payment_type,
            amount,
            phone,
            status: PaymentStatus::Pending,
            provider_reference: None,
            checkout_id: None,
            provider_data: None,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn generate_reference(payment_type: PaymentType) -> String {
    format!(
        "{}-{}",
        payment_type.reference_prefix(),
        Uuid::new_v4().simple().to_string().to_ascii_uppercase()
    )
}

/// Progress or outcome reported by the provider for a reference.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderUpdate {
    pub provider_reference: Option<String>,
    pub checkout_id: Option<String>,
    pub provider_data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryType {
    Deposit,
    Withdrawal,
    Refund,
}

impl LedgerEntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerEntryType::Deposit => "deposit",
            LedgerEntryType::Withdrawal => "withdrawal",
            LedgerEntryType::Refund => "refund",
        }
    }
}

/// Immutable ledger line. Positive amounts are credits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub transaction_type: String,
    pub currency: String,
    pub amount: BigDecimal,
    pub status: String,
    pub description: String,
    pub reference: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn new(
        user_id: Uuid,
        entry_type: LedgerEntryType,
        currency: &str,
        amount: BigDecimal,
        description: String,
        reference: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            transaction_type: entry_type.as_str().to_string(),
            currency: currency.to_string(),
            amount,
            status: PaymentStatus::Completed.as_str().to_string(),
            description,
            reference,
            created_at: Utc::now(),
        }
    }
}

/// Balance mutation and ledger line applied together with a terminal transition.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEffect {
    pub balance_delta: Option<BigDecimal>,
    pub entry: LedgerEntry,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserBalance {
    pub user_id: Uuid,
    pub fiat_balance: BigDecimal,
    pub crypto_balances: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_known_provider_statuses() {
        assert_eq!(PaymentStatus::from_provider("SUCCESS"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_provider("success"), PaymentStatus::Completed);
        assert_eq!(PaymentStatus::from_provider("QUEUED"), PaymentStatus::Queued);
        assert_eq!(PaymentStatus::from_provider("FAILED"), PaymentStatus::Failed);
        assert_eq!(PaymentStatus::from_provider("PENDING"), PaymentStatus::Pending);
    }

    #[test]
    fn cancel_and_reject_map_to_canceled() {
        assert_eq!(PaymentStatus::from_provider("CANCELLED"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::from_provider("USER_CANCELED"), PaymentStatus::Canceled);
        assert_eq!(PaymentStatus::from_provider("Rejected"), PaymentStatus::Canceled);
    }

    #[test]
    fn unknown_status_defaults_to_pending() {
        assert_eq!(PaymentStatus::from_provider(""), PaymentStatus::Pending);
        assert_eq!(PaymentStatus::from_provider("PROCESSING"), PaymentStatus::Pending);
    }

    #[test]
    fn terminal_states_never_regress() {
        for terminal in [
            PaymentStatus::Completed,
            PaymentStatus::Failed,
            PaymentStatus::Canceled,
        ] {
            assert!(terminal.is_terminal());
            assert!(!terminal.can_transition_to(PaymentStatus::Pending));
            assert!(!terminal.can_transition_to(PaymentStatus::Completed));
        }
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Queued));
        assert!(PaymentStatus::Queued.can_transition_to(PaymentStatus::Failed));
        assert!(!PaymentStatus::Queued.can_transition_to(PaymentStatus::Pending));
    }

    #[test]
    fn references_carry_type_prefix() {
        let deposit = generate_reference(PaymentType::Deposit);
        let withdrawal = generate_reference(PaymentType::Withdrawal);
        assert!(deposit.starts_with("DEP-"));
        assert!(withdrawal.starts_with("WDR-"));
        assert_eq!(deposit.len(), 4 + 32);
        assert_ne!(deposit, generate_reference(PaymentType::Deposit));
    }

    #[test]
    fn parses_payment_type() {
        assert_eq!("deposit".parse::<PaymentType>(), Ok(PaymentType::Deposit));
        assert_eq!(" Withdrawal ".parse::<PaymentType>(), Ok(PaymentType::Withdrawal));
        assert!("transfer".parse::<PaymentType>().is_err());
    }
}
