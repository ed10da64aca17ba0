use sea_orm_migration::prelude::*;

use crate::migrations;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(migrations::m202607200001_create_topics::Migration),
            Box::new(migrations::m202607200002_create_tasks::Migration),
            Box::new(migrations::m202607200003_create_submissions::Migration),
            Box::new(migrations::m202607200004_create_student_accounts::Migration),
        ]
    }
}
