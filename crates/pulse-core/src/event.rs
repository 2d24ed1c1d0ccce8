//! Inbound event parsing and classification.
//!
//! Every text frame from the push endpoint is a JSON object whose `type`
//! field names the event. The set of discriminators is open-ended: the server
//! can introduce new kinds at any time, so unknown values map to
//! [`EventKind::Other`] and a missing (or non-string) `type` maps to
//! [`EventKind::Untagged`]. Nothing is rejected except frames that are not a
//! JSON object at all.

use serde_json::{Map, Value};

use crate::error::PulseError;

/// Field holding the discriminator in every frame.
pub const DISCRIMINATOR_FIELD: &str = "type";

// ---------------------------------------------------------------------------
// Event kinds
// ---------------------------------------------------------------------------

/// Semantic event type carried by an inbound frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventKind {
    // --- User dashboard ---
    Connected,
    BalanceUpdate,
    DepositApproved,
    WithdrawalApproved,
    WithdrawalRejected,
    InvestmentApproved,
    InvestmentRejected,
    InvestmentTopup,
    DepositTopup,
    ProfitAdded,
    NewNotification,
    AdminBalanceAdjustment,
    AccountBlocked,
    AccountUnblocked,

    // --- Admin dashboard ---
    AdminConnected,
    UserRegistered,
    DepositSubmitted,
    WithdrawalSubmitted,
    InvestmentCreated,

    /// A discriminator this client does not know about.
    Other(String),
    /// The frame had no string discriminator.
    Untagged,
}

impl EventKind {
    /// Classify a raw discriminator value.
    pub fn from_discriminator(discriminator: Option<&str>) -> Self {
        let Some(d) = discriminator else {
            return Self::Untagged;
        };
        match d {
            "CONNECTED" => Self::Connected,
            "BALANCE_UPDATE" => Self::BalanceUpdate,
            "DEPOSIT_APPROVED" => Self::DepositApproved,
            "WITHDRAWAL_APPROVED" => Self::WithdrawalApproved,
            "WITHDRAWAL_REJECTED" => Self::WithdrawalRejected,
            "INVESTMENT_APPROVED" => Self::InvestmentApproved,
            "INVESTMENT_REJECTED" => Self::InvestmentRejected,
            "INVESTMENT_TOPUP" => Self::InvestmentTopup,
            "DEPOSIT_TOPUP" => Self::DepositTopup,
            "PROFIT_ADDED" => Self::ProfitAdded,
            "NEW_NOTIFICATION" => Self::NewNotification,
            "ADMIN_BALANCE_ADJUSTMENT" => Self::AdminBalanceAdjustment,
            "ACCOUNT_BLOCKED" => Self::AccountBlocked,
            "ACCOUNT_UNBLOCKED" => Self::AccountUnblocked,
            "ADMIN_CONNECTED" => Self::AdminConnected,
            "USER_REGISTERED" => Self::UserRegistered,
            "DEPOSIT_SUBMITTED" => Self::DepositSubmitted,
            "WITHDRAWAL_SUBMITTED" => Self::WithdrawalSubmitted,
            "INVESTMENT_CREATED" => Self::InvestmentCreated,
            other => Self::Other(other.to_string()),
        }
    }

    /// Data sets the host should re-fetch after this event.
    pub fn refreshes(&self) -> &'static [Refresh] {
        use Refresh::*;
        match self {
            Self::BalanceUpdate | Self::AdminBalanceAdjustment => &[Balances],
            Self::DepositApproved
            | Self::WithdrawalApproved
            | Self::WithdrawalRejected
            | Self::DepositTopup
            | Self::ProfitAdded => &[Balances, Transactions],
            Self::InvestmentApproved => &[Balances, Investments],
            Self::InvestmentRejected => &[Transactions],
            Self::InvestmentTopup => &[Balances, Investments, Transactions],
            Self::NewNotification => &[Notifications],
            Self::UserRegistered | Self::InvestmentCreated => &[Dashboard],
            Self::DepositSubmitted => &[Dashboard, PendingDeposits],
            Self::WithdrawalSubmitted => &[Dashboard, PendingWithdrawals],
            Self::Connected
            | Self::AdminConnected
            | Self::AccountBlocked
            | Self::AccountUnblocked
            | Self::Other(_)
            | Self::Untagged => &[],
        }
    }

    /// The server revoked access; the host should end the session.
    pub fn ends_session(&self) -> bool {
        matches!(self, Self::AccountBlocked)
    }
}

/// A data set the host application keeps and re-fetches on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Refresh {
    Balances,
    Transactions,
    Investments,
    Notifications,
    Dashboard,
    PendingDeposits,
    PendingWithdrawals,
}

impl std::fmt::Display for Refresh {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balances => write!(f, "balances"),
            Self::Transactions => write!(f, "transactions"),
            Self::Investments => write!(f, "investments"),
            Self::Notifications => write!(f, "notifications"),
            Self::Dashboard => write!(f, "dashboard"),
            Self::PendingDeposits => write!(f, "pending_deposits"),
            Self::PendingWithdrawals => write!(f, "pending_withdrawals"),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound event
// ---------------------------------------------------------------------------

/// One parsed inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    discriminator: Option<String>,
    kind: EventKind,
    payload: Map<String, Value>,
}

impl InboundEvent {
    /// Raw discriminator, `None` when the frame carried no string `type`.
    pub fn discriminator(&self) -> Option<&str> {
        self.discriminator.as_deref()
    }

    pub fn kind(&self) -> &EventKind {
        &self.kind
    }

    /// The whole frame object, discriminator included.
    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }

    /// One-line human-readable description, as a dashboard would show it.
    pub fn summary(&self) -> String {
        let amount = self.amount_text();
        let message = |fallback: &str| self.str_field("message").unwrap_or(fallback).to_string();

        match &self.kind {
            EventKind::Connected => "Real-time updates are now active".into(),
            EventKind::BalanceUpdate => message("Your balances have been updated"),
            EventKind::DepositApproved => format!("Deposit of ${amount} has been approved"),
            EventKind::WithdrawalApproved => format!("Withdrawal of ${amount} has been approved"),
            EventKind::WithdrawalRejected => message("Your withdrawal request was rejected"),
            EventKind::InvestmentApproved => {
                format!("Your investment of ${amount} has been approved and activated")
            }
            EventKind::InvestmentRejected => message("Your investment request was rejected"),
            EventKind::InvestmentTopup => format!("Admin added a new investment of ${amount} to your account"),
            EventKind::DepositTopup => format!("Admin added ${amount} to your deposit balance"),
            EventKind::ProfitAdded => format!("${amount} profit has been added to your account"),
            EventKind::NewNotification => self
                .payload
                .get("notification")
                .and_then(|n| n.get("title"))
                .and_then(Value::as_str)
                .unwrap_or("New notification")
                .to_string(),
            EventKind::AdminBalanceAdjustment => message("Admin has adjusted your balance"),
            EventKind::AccountBlocked => "Your account has been blocked by admin".into(),
            EventKind::AccountUnblocked => "Your account has been reactivated".into(),
            EventKind::AdminConnected => "Real-time updates active".into(),
            EventKind::UserRegistered => {
                let username =
                    self.payload.get("user").and_then(|u| u.get("username")).and_then(Value::as_str).unwrap_or("?");
                format!("User {username} registered")
            }
            EventKind::DepositSubmitted => format!("${amount} deposit pending"),
            EventKind::WithdrawalSubmitted => format!("${amount} withdrawal pending"),
            EventKind::InvestmentCreated => format!("${amount} investment submitted"),
            EventKind::Other(d) => format!("unhandled event type {d}"),
            EventKind::Untagged => "event without a type".into(),
        }
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    /// `amount` arrives as a number or a decimal string depending on the route.
    fn amount_text(&self) -> String {
        match self.payload.get("amount") {
            Some(Value::Number(n)) => n.to_string(),
            Some(Value::String(s)) => s.clone(),
            _ => "?".into(),
        }
    }
}

/// Parse one inbound text frame.
///
/// Fails only when the text is not a single JSON object.
pub fn parse_frame(text: &str) -> Result<InboundEvent, PulseError> {
    let value: Value = serde_json::from_str(text).map_err(|e| PulseError::Parse(e.to_string()))?;
    let Value::Object(payload) = value else {
        return Err(PulseError::Parse(format!("expected a JSON object, got: {}", truncate(text, 64))));
    };

    let discriminator = payload.get(DISCRIMINATOR_FIELD).and_then(Value::as_str).map(str::to_string);
    let kind = EventKind::from_discriminator(discriminator.as_deref());

    Ok(InboundEvent { discriminator, kind, payload })
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_event() {
        let ev = parse_frame(r#"{"type":"DEPOSIT_APPROVED","amount":250.5,"depositBalance":1000}"#).unwrap();
        assert_eq!(ev.kind(), &EventKind::DepositApproved);
        assert_eq!(ev.discriminator(), Some("DEPOSIT_APPROVED"));
        assert_eq!(ev.payload()["depositBalance"], 1000);
        assert_eq!(ev.summary(), "Deposit of $250.5 has been approved");
        assert_eq!(ev.kind().refreshes(), &[Refresh::Balances, Refresh::Transactions]);
    }

    #[test]
    fn unknown_discriminator_passes_through() {
        let ev = parse_frame(r#"{"type":"REFERRAL_BONUS","amount":"12.00"}"#).unwrap();
        assert_eq!(ev.kind(), &EventKind::Other("REFERRAL_BONUS".into()));
        assert_eq!(ev.discriminator(), Some("REFERRAL_BONUS"));
        assert!(ev.kind().refreshes().is_empty());
    }

    #[test]
    fn missing_discriminator_is_untagged() {
        let ev = parse_frame(r#"{"amount":5}"#).unwrap();
        assert_eq!(ev.kind(), &EventKind::Untagged);
        assert_eq!(ev.discriminator(), None);
        assert_eq!(ev.payload()["amount"], 5);
    }

    #[test]
    fn non_string_discriminator_is_untagged() {
        let ev = parse_frame(r#"{"type":7}"#).unwrap();
        assert_eq!(ev.kind(), &EventKind::Untagged);
        assert_eq!(ev.payload()["type"], 7);
    }

    #[test]
    fn malformed_frames_rejected() {
        assert!(matches!(parse_frame("not json"), Err(PulseError::Parse(_))));
        assert!(matches!(parse_frame("[1,2,3]"), Err(PulseError::Parse(_))));
        assert!(matches!(parse_frame(r#""CONNECTED""#), Err(PulseError::Parse(_))));
        assert!(matches!(parse_frame(""), Err(PulseError::Parse(_))));
    }

    #[test]
    fn summaries_fall_back_to_defaults() {
        let ev = parse_frame(r#"{"type":"WITHDRAWAL_REJECTED"}"#).unwrap();
        assert_eq!(ev.summary(), "Your withdrawal request was rejected");

        let ev = parse_frame(r#"{"type":"WITHDRAWAL_REJECTED","message":"Insufficient balance"}"#).unwrap();
        assert_eq!(ev.summary(), "Insufficient balance");

        let ev = parse_frame(r#"{"type":"PROFIT_ADDED"}"#).unwrap();
        assert_eq!(ev.summary(), "$? profit has been added to your account");
    }

    #[test]
    fn nested_fields_in_summaries() {
        let ev = parse_frame(r#"{"type":"NEW_NOTIFICATION","notification":{"title":"Plan matured"}}"#).unwrap();
        assert_eq!(ev.summary(), "Plan matured");
        assert_eq!(ev.kind().refreshes(), &[Refresh::Notifications]);

        let ev = parse_frame(r#"{"type":"USER_REGISTERED","user":{"username":"jdoe"}}"#).unwrap();
        assert_eq!(ev.summary(), "User jdoe registered");
        assert_eq!(ev.kind().refreshes(), &[Refresh::Dashboard]);
    }

    #[test]
    fn admin_submissions_refresh_pending_queues() {
        let kind = EventKind::from_discriminator(Some("DEPOSIT_SUBMITTED"));
        assert_eq!(kind.refreshes(), &[Refresh::Dashboard, Refresh::PendingDeposits]);
        let kind = EventKind::from_discriminator(Some("WITHDRAWAL_SUBMITTED"));
        assert_eq!(kind.refreshes(), &[Refresh::Dashboard, Refresh::PendingWithdrawals]);
    }

    #[test]
    fn only_account_blocked_ends_session() {
        assert!(EventKind::AccountBlocked.ends_session());
        assert!(!EventKind::AccountUnblocked.ends_session());
        assert!(!EventKind::Untagged.ends_session());
    }
}
