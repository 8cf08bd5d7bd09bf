use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(TokenBlacklist::Table)
                    .if_not_exists()
                    .col(string(TokenBlacklist::TokenId).primary_key())
                    .col(uuid(TokenBlacklist::UserId))
                    .col(timestamp_with_time_zone(TokenBlacklist::ExpiresAt))
                    .col(string_null(TokenBlacklist::Reason))
                    .col(
                        timestamp_with_time_zone(TokenBlacklist::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // The sweep prunes by natural token expiry.
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_token_blacklist_expires_at")
                    .table(TokenBlacklist::Table)
                    .col(TokenBlacklist::ExpiresAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(TokenBlacklist::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum TokenBlacklist {
    Table,
    TokenId,
    UserId,
    ExpiresAt,
    Reason,
    CreatedAt,
}
