use sea_orm_migration::{prelude::*, schema::*};

use crate::m20260805_000001_create_users_table::Users;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(PasswordSetupTokens::Table)
                    .if_not_exists()
                    .col(pk_auto(PasswordSetupTokens::Id))
                    .col(uuid(PasswordSetupTokens::UserId))
                    .col(string(PasswordSetupTokens::TokenHash))
                    .col(timestamp_with_time_zone(PasswordSetupTokens::ExpiresAt))
                    .col(timestamp_with_time_zone_null(PasswordSetupTokens::UsedAt))
                    .col(string_null(PasswordSetupTokens::Origin))
                    .col(string_null(PasswordSetupTokens::ClientSignature))
                    .col(
                        timestamp_with_time_zone(PasswordSetupTokens::CreatedAt)
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_password_setup_tokens_user_id")
                            .from(PasswordSetupTokens::Table, PasswordSetupTokens::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_password_setup_tokens_token_hash")
                    .table(PasswordSetupTokens::Table)
                    .col(PasswordSetupTokens::TokenHash)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_password_setup_tokens_user_created")
                    .table(PasswordSetupTokens::Table)
                    .col(PasswordSetupTokens::UserId)
                    .col(PasswordSetupTokens::CreatedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(PasswordSetupTokens::Table).to_owned())
            .await?;

        Ok(())
    }
}

#[derive(DeriveIden)]
pub enum PasswordSetupTokens {
    Table,
    Id,
    UserId,
    TokenHash,
    ExpiresAt,
    UsedAt,
    Origin,
    ClientSignature,
    CreatedAt,
}
