//! # Gatehouse Database Migrations
//!
//! Sea-ORM migrations for the credential store: user identities,
//! refresh-token records, the access-token blacklist, and the two
//! single-use token tables.

pub use sea_orm_migration::prelude::*;

mod m20260805_000001_create_users_table;
mod m20260805_000002_create_refresh_tokens_table;
mod m20260805_000003_create_token_blacklist_table;
mod m20260805_000004_create_password_reset_tokens_table;
mod m20260805_000005_create_password_setup_tokens_table;

/// The main migrator that coordinates all migration operations.
///
/// Migrations are executed in the order they appear in this list.
#[derive(Debug)]
pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260805_000001_create_users_table::Migration),
            Box::new(m20260805_000002_create_refresh_tokens_table::Migration),
            Box::new(m20260805_000003_create_token_blacklist_table::Migration),
            Box::new(m20260805_000004_create_password_reset_tokens_table::Migration),
            Box::new(m20260805_000005_create_password_setup_tokens_table::Migration),
        ]
    }
}

/// Database connection helper for CLI usage.
pub async fn connect(database_url: &str) -> Result<sea_orm::DatabaseConnection, sea_orm::DbErr> {
    sea_orm::Database::connect(database_url).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_registered() {
        assert_eq!(Migrator::migrations().len(), 5);
    }
}
