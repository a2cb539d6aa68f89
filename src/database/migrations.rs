pub use sea_orm_migration::prelude::*;

mod m20251001_000001_create_job_queue;
mod m20251001_000002_create_conference;
mod m20251001_000003_create_email_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20251001_000001_create_job_queue::Migration),
            Box::new(m20251001_000002_create_conference::Migration),
            Box::new(m20251001_000003_create_email_log::Migration),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        let names: Vec<String> = Migrator::migrations()
            .iter()
            .map(|migration| migration.name().to_string())
            .collect();

        let mut sorted = names.clone();
        sorted.sort();
        sorted.dedup();

        assert_eq!(names, sorted);
        assert_eq!(names.len(), 3);
    }
}
