use sea_orm::{DatabaseConnection, DbErr};
use sea_orm_migration::{MigrationStatus, MigratorTrait};

use crate::{
    boot::BootError,
    cli::MigrateAction,
    config::Config,
    database::{migrations::Migrator, setup_database_connection},
};

pub async fn handle_migrate_command(config: &Config, action: MigrateAction) -> Result<(), BootError> {
    // A plain connection; nothing runs in the background here
    let db = setup_database_connection(&config.database).await?;

    run(&db, action).await.map_err(|e| {
        eprintln!("❌ Migration failed: {e}");
        e.into()
    })
}

async fn run(db: &DatabaseConnection, action: MigrateAction) -> Result<(), DbErr> {
    match action {
        MigrateAction::Up { steps } => up(db, steps).await,
        MigrateAction::Down { steps } => down(db, steps).await,
        MigrateAction::Status => status(db).await,
        MigrateAction::Reset => {
            println!("🔄 Resetting the database, every table will be dropped");
            Migrator::reset(db).await?;
            up(db, None).await
        }
    }
}

async fn up(db: &DatabaseConnection, steps: Option<u32>) -> Result<(), DbErr> {
    let pending = names(Migrator::get_pending_migrations(db).await?);
    let selected = to_apply(&pending, steps);

    if selected.is_empty() {
        println!("✅ Nothing to migrate");
        return Ok(());
    }

    println!("⬆️  Applying {} migration(s):", selected.len());
    for name in selected {
        println!("  📄 {name}");
    }

    Migrator::up(db, steps).await?;
    println!("✅ Migrations applied");
    Ok(())
}

async fn down(db: &DatabaseConnection, steps: u32) -> Result<(), DbErr> {
    let applied = names(Migrator::get_applied_migrations(db).await?);
    let selected = to_roll_back(&applied, steps);

    if selected.is_empty() {
        println!("❌ No applied migrations to roll back");
        return Ok(());
    }

    println!("⬇️  Rolling back {} migration(s):", selected.len());
    for name in selected {
        println!("  📄 {name}");
    }

    Migrator::down(db, Some(steps)).await?;
    println!("✅ Rollback completed");
    Ok(())
}

async fn status(db: &DatabaseConnection) -> Result<(), DbErr> {
    for migration in Migrator::get_migration_with_status(db).await? {
        let marker = match migration.status() {
            MigrationStatus::Applied => "✓",
            MigrationStatus::Pending => "·",
        };
        println!("  {marker} {}", migration.name());
    }
    Ok(())
}

fn names(migrations: Vec<sea_orm_migration::Migration>) -> Vec<String> {
    migrations.iter().map(|m| m.name().to_string()).collect()
}

/// The first `steps` pending migrations, or all of them.
fn to_apply<T>(pending: &[T], steps: Option<u32>) -> &[T] {
    let count = steps.map_or(pending.len(), |steps| pending.len().min(steps as usize));
    &pending[..count]
}

/// The last `steps` applied migrations, newest first.
fn to_roll_back<T>(applied: &[T], steps: u32) -> Vec<&T> {
    applied.iter().rev().take(steps as usize).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const APPLIED: [&str; 3] = ["m1_jobs", "m2_conference", "m3_email_log"];

    #[test]
    fn test_up_without_steps_applies_everything() {
        assert_eq!(to_apply(&APPLIED, None), APPLIED);
        assert_eq!(to_apply(&APPLIED, Some(1)), ["m1_jobs"]);
        assert_eq!(to_apply(&APPLIED, Some(10)).len(), 3);
    }

    #[test]
    fn test_down_starts_from_newest() {
        assert_eq!(to_roll_back(&APPLIED, 2), vec![&"m3_email_log", &"m2_conference"]);
        assert!(to_roll_back::<&str>(&[], 1).is_empty());
    }
}
