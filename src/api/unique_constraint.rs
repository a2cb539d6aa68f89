use sea_orm::DbErr;

/// Whether `error` is a unique violation on `index_name`.
///
/// Used where two requests may race to insert the same natural key and the
/// loser should re-read the winner's row.
pub fn is_unique_violation(error: &DbErr, index_name: &str) -> bool {
    let message = error.to_string();
    message.contains("duplicate key value violates unique constraint") && message.contains(index_name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matches_duplicate_key_on_index() {
        let error = DbErr::Custom(
            "duplicate key value violates unique constraint \"app_user_email_key\"".to_string(),
        );

        assert!(is_unique_violation(&error, "app_user_email_key"));
        assert!(!is_unique_violation(&error, "email_log_message_id_key"));
    }

    #[test]
    fn test_other_errors_do_not_match() {
        let error = DbErr::RecordNotFound("user".to_string());

        assert!(!is_unique_violation(&error, "app_user_email_key"));
    }
}
