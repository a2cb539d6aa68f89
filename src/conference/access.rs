use sea_orm::{ActiveModelTrait, ColumnTrait, ConnectionTrait, DbErr, EntityTrait, QueryFilter, Set};
use tracing::info;
use uuid::Uuid;

use crate::{
    api::{unique_constraint::is_unique_violation, ApiError},
    config::AccessConfig,
    database::models::{user, user_role::UserRole},
};

const USER_EMAIL_INDEX: &str = "app_user_email_key";

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn listed(list: &[String], email: &str) -> bool {
    list.iter().any(|entry| normalize_email(entry) == email)
}

/// An empty allow-list admits everyone.
pub fn ensure_can_submit(access: &AccessConfig, email: &str) -> Result<(), ApiError> {
    if access.allow_list.is_empty() || listed(&access.allow_list, &normalize_email(email)) {
        Ok(())
    } else {
        Err(ApiError::EmailNotAllowed)
    }
}

async fn find_user<C: ConnectionTrait>(db: &C, email: &str) -> Result<Option<user::Model>, DbErr> {
    user::Entity::find()
        .filter(user::Column::Email.eq(email))
        .one(db)
        .await
}

async fn create_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    name: &str,
    role: UserRole,
) -> Result<user::Model, DbErr> {
    let inserted = user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(email.to_string()),
        name: Set(name.to_string()),
        role: Set(role),
        ..Default::default()
    }
    .insert(db)
    .await;

    match inserted {
        // Another request created the same user first
        Err(e) if is_unique_violation(&e, USER_EMAIL_INDEX) => find_user(db, email)
            .await?
            .ok_or_else(|| DbErr::RecordNotFound(format!("user {email}"))),
        other => other,
    }
}

/// Looks a user up by email, creating a regular user on first contact.
///
/// Must not run inside a transaction: a lost insert race aborts it.
pub async fn find_or_create_user<C: ConnectionTrait>(
    db: &C,
    email: &str,
    name: &str,
) -> Result<user::Model, DbErr> {
    let email = normalize_email(email);
    match find_user(db, &email).await? {
        Some(user) => Ok(user),
        None => create_user(db, &email, name, UserRole::User).await,
    }
}

/// Resolves a reviewer. Emails in `admin_emails` are created or promoted to
/// admin on the spot.
pub async fn authorize_admin<C: ConnectionTrait>(
    db: &C,
    access: &AccessConfig,
    email: &str,
) -> Result<user::Model, ApiError> {
    let email = normalize_email(email);
    let existing = find_user(db, &email).await?;

    if let Some(user) = &existing {
        if user.is_admin() {
            return Ok(user.clone());
        }
    }

    if !listed(&access.admin_emails, &email) {
        return Err(ApiError::Forbidden(
            "Only admins can review submissions".to_string(),
        ));
    }

    let admin = match existing {
        Some(user) => {
            info!(email = %email, "Promoting user to admin");
            let mut active: user::ActiveModel = user.into();
            active.role = Set(UserRole::Admin);
            active.update(db).await?
        }
        None => {
            info!(email = %email, "Creating admin user");
            let name = email.split('@').next().unwrap_or_default().to_string();
            create_user(db, &email, &name, UserRole::Admin).await?
        }
    };

    Ok(admin)
}
