use sea_orm_migration::prelude::*;

mod m001_create_upload_sessions;
mod m002_create_analysis_runs;
mod m003_create_error_logs;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m001_create_upload_sessions::Migration),
            Box::new(m002_create_analysis_runs::Migration),
            Box::new(m003_create_error_logs::Migration),
        ]
    }
}
