//! Users Entity
//!
//! User identities. `password_hash` is nullable: tenant provisioning may
//! create a user before a password is set (the setup-token flow fills it
//! in). Users are never hard-deleted in normal operation.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id:            Uuid,
    #[sea_orm(unique)]
    pub email:         String,
    pub password_hash: Option<String>,
    pub name:          String,
    pub is_admin:      bool,
    pub created_at:    chrono::DateTime<chrono::Utc>,
    pub updated_at:    chrono::DateTime<chrono::Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::refresh_tokens::Entity")]
    RefreshTokens,
    #[sea_orm(has_many = "super::password_reset_tokens::Entity")]
    PasswordResetTokens,
    #[sea_orm(has_many = "super::password_setup_tokens::Entity")]
    PasswordSetupTokens,
}

impl Related<super::refresh_tokens::Entity> for Entity {
    fn to() -> RelationDef { Relation::RefreshTokens.def() }
}

impl Related<super::password_reset_tokens::Entity> for Entity {
    fn to() -> RelationDef { Relation::PasswordResetTokens.def() }
}

impl Related<super::password_setup_tokens::Entity> for Entity {
    fn to() -> RelationDef { Relation::PasswordSetupTokens.def() }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// True once the user has completed password setup.
    #[must_use]
    pub fn has_password(&self) -> bool {
        self.password_hash
            .as_deref()
            .map(|h| !h.trim().is_empty())
            .unwrap_or(false)
    }
}
