use chrono::{NaiveDateTime, TimeDelta};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{Job, JobError};
use crate::{app::App, database::models::email_log};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupEmailLogsArguments {
    pub retention_days: u32,
    pub batch_size: u64,
}

/// `None` when the retention period reaches past the earliest representable time.
fn retention_cutoff(now: NaiveDateTime, retention_days: u32) -> Option<NaiveDateTime> {
    TimeDelta::try_days(i64::from(retention_days)).and_then(|age| now.checked_sub_signed(age))
}

/// Deletes Email API audit rows older than the retention period, in batches.
pub struct CleanupEmailLogsJob;

impl Job for CleanupEmailLogsJob {
    type Arguments = CleanupEmailLogsArguments;

    async fn execute(app: &App, arguments: Self::Arguments) -> Result<(), JobError> {
        let Some(cutoff) = retention_cutoff(chrono::Utc::now().naive_utc(), arguments.retention_days)
        else {
            debug!(
                "🧹 Retention of {} days reaches past the earliest timestamp, nothing to delete",
                arguments.retention_days
            );
            return Ok(());
        };
        let batch_size = arguments.batch_size.max(1);
        let mut deleted = 0;

        loop {
            let ids: Vec<uuid::Uuid> = email_log::Entity::find()
                .select_only()
                .column(email_log::Column::Id)
                .filter(email_log::Column::CreatedAt.lt(cutoff))
                .order_by_asc(email_log::Column::CreatedAt)
                .limit(batch_size)
                .into_tuple()
                .all(app.db.as_ref())
                .await
                .map_err(|e| JobError::TryAgainLater(e.to_string()))?;

            if ids.is_empty() {
                break;
            }

            let result = email_log::Entity::delete_many()
                .filter(email_log::Column::Id.is_in(ids))
                .exec(app.db.as_ref())
                .await
                .map_err(|e| JobError::TryAgainLater(e.to_string()))?;

            deleted += result.rows_affected;
            debug!("🧹 Deleted batch of {} email log rows", result.rows_affected);
        }

        if deleted > 0 {
            info!(
                "🧹 Removed {} email log rows older than {} days",
                deleted, arguments.retention_days
            );
        }

        Ok(())
    }

    fn name() -> &'static str {
        "cleanup_email_logs"
    }
}
