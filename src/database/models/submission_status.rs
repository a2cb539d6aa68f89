use sea_orm::DeriveActiveEnum;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Review state of an abstract submission.
///
/// The only legal moves are `Pending → Approved` and `Pending → Rejected`.
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
#[sea_orm(rs_type = "String", db_type = "Enum", enum_name = "submission_status")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SubmissionStatus {
    #[sea_orm(string_value = "pending")]
    #[default]
    Pending,
    #[sea_orm(string_value = "approved")]
    Approved,
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

impl SubmissionStatus {
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Approved) | (Self::Pending, Self::Rejected)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pending_moves_to_a_decision() {
        assert!(SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Approved));
        assert!(SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Rejected));
    }

    #[test]
    fn test_decisions_are_final() {
        for from in [SubmissionStatus::Approved, SubmissionStatus::Rejected] {
            for to in [
                SubmissionStatus::Pending,
                SubmissionStatus::Approved,
                SubmissionStatus::Rejected,
            ] {
                assert!(!from.can_transition_to(to), "{from} -> {to} must be refused");
            }
        }
    }

    #[test]
    fn test_pending_cannot_stay_pending() {
        assert!(!SubmissionStatus::Pending.can_transition_to(SubmissionStatus::Pending));
    }
}
