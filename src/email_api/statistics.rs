use std::{collections::BTreeMap, time::Duration};

use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{DbBackend, DbErr, FromQueryResult, Statement};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::app::App;

pub const DEFAULT_DAYS: u32 = 7;

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct StatisticsQuery {
    #[validate(range(min = 1, max = 90, message = "must be between 1 and 90"))]
    pub days: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Totals {
    pub sent: i64,
    pub failed: i64,
    pub total: i64,
    /// Percentage of attempts that were delivered, 0 when nothing was sent
    pub success_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyCount {
    pub date: NaiveDate,
    pub sent: i64,
    pub failed: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailStatistics {
    pub days: u32,
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub totals: Totals,
    pub daily: Vec<DailyCount>,
    /// Notification rows by delivery status
    pub notifications: BTreeMap<String, i64>,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct DailyStatusRow {
    pub day: NaiveDate,
    pub status: String,
    pub count: i64,
}

#[derive(Debug, Clone, FromQueryResult)]
pub struct StatusRow {
    pub status: String,
    pub count: i64,
}

fn cache_key(days: u32) -> String {
    format!("email_statistics:{days}")
}

/// Statistics for the last `days` days, served from the cache when fresh.
pub async fn statistics(app: &App, days: u32) -> Result<EmailStatistics, DbErr> {
    let key = cache_key(days);
    if let Some(mut cached) = app.cache.get_as::<EmailStatistics>(&key) {
        cached.cached = true;
        return Ok(cached);
    }

    let now = Utc::now();
    let period_start = first_day(now.date_naive(), days);

    let daily_rows = DailyStatusRow::find_by_statement(Statement::from_sql_and_values(
        DbBackend::Postgres,
        r"SELECT created_at::date AS day, status::text AS status, COUNT(*) AS count
          FROM email_log
          WHERE created_at >= $1
          GROUP BY 1, 2
          ORDER BY 1",
        [period_start.and_hms_opt(0, 0, 0).unwrap_or_default().into()],
    ))
    .all(app.db.as_ref())
    .await?;

    let notification_rows = StatusRow::find_by_statement(Statement::from_string(
        DbBackend::Postgres,
        "SELECT status::text AS status, COUNT(*) AS count FROM email_notification GROUP BY 1",
    ))
    .all(app.db.as_ref())
    .await?;

    let statistics = summarize(days, now, &daily_rows, &notification_rows);
    app.cache.set_as(
        &key,
        &statistics,
        Duration::from_secs(app.config.email_api.statistics_cache_seconds),
    );

    Ok(statistics)
}

fn first_day(today: NaiveDate, days: u32) -> NaiveDate {
    today - chrono::Days::new(u64::from(days.saturating_sub(1)))
}

/// Folds grouped rows into totals and a gap-free per-day series.
pub fn summarize(
    days: u32,
    now: DateTime<Utc>,
    daily_rows: &[DailyStatusRow],
    notification_rows: &[StatusRow],
) -> EmailStatistics {
    let today = now.date_naive();
    let period_start = first_day(today, days);

    let mut daily: BTreeMap<NaiveDate, DailyCount> = period_start
        .iter_days()
        .take_while(|date| *date <= today)
        .map(|date| {
            (
                date,
                DailyCount {
                    date,
                    sent: 0,
                    failed: 0,
                },
            )
        })
        .collect();

    for row in daily_rows {
        let Some(entry) = daily.get_mut(&row.day) else {
            continue;
        };
        match row.status.as_str() {
            "sent" => entry.sent += row.count,
            "failed" => entry.failed += row.count,
            _ => {}
        }
    }

    let sent: i64 = daily.values().map(|day| day.sent).sum();
    let failed: i64 = daily.values().map(|day| day.failed).sum();
    let total = sent + failed;
    #[allow(clippy::cast_precision_loss)]
    let success_rate = if total == 0 {
        0.0
    } else {
        (sent as f64 / total as f64 * 10_000.0).round() / 100.0
    };

    EmailStatistics {
        days,
        period_start,
        period_end: today,
        totals: Totals {
            sent,
            failed,
            total,
            success_rate,
        },
        daily: daily.into_values().collect(),
        notifications: notification_rows
            .iter()
            .map(|row| (row.status.clone(), row.count))
            .collect(),
        generated_at: now,
        cached: false,
    }
}
