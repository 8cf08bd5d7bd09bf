//! Entity definitions for the Gatehouse credential store
//!
//! Sea-ORM models for user identities, refresh-token records, the access
//! token blacklist, and the two single-use token tables.

pub mod password_reset_tokens;
pub mod password_setup_tokens;
pub mod refresh_tokens;
pub mod token_blacklist;
pub mod users;

pub use password_reset_tokens::Entity as PasswordResetTokens;
pub use password_setup_tokens::Entity as PasswordSetupTokens;
pub use refresh_tokens::Entity as RefreshTokens;
pub use token_blacklist::Entity as TokenBlacklist;
pub use users::Entity as Users;
