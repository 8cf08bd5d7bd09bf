//! Request and response types exchanged with the external HTTP layer.

pub mod auth;
pub mod recovery;
