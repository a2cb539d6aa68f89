use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Verification state of an uploaded payment proof.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    EnumIter,
    EnumString,
    Display,
)]
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "payment_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PaymentStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl PaymentStatus {
    /// A new proof may replace the current one until the payment is approved.
    pub const fn accepts_upload(self) -> bool {
        !matches!(self, Self::Approved)
    }

    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved | Self::Rejected) | (Self::Rejected, Self::Pending)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_approved_payment_is_frozen() {
        assert!(!PaymentStatus::Approved.accepts_upload());
        assert!(PaymentStatus::Rejected.accepts_upload());
        assert!(PaymentStatus::Pending.accepts_upload());
    }

    #[test]
    fn test_payment_transitions() {
        assert!(PaymentStatus::Pending.can_transition_to(PaymentStatus::Approved));
        assert!(PaymentStatus::Rejected.can_transition_to(PaymentStatus::Pending));
        assert!(!PaymentStatus::Approved.can_transition_to(PaymentStatus::Rejected));
        assert!(!PaymentStatus::Rejected.can_transition_to(PaymentStatus::Approved));
    }
}
