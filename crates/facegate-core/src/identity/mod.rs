//! Enrolled identities: one username, one password credential and one reference face each.

pub mod credential;
pub mod persistence;
pub mod store;

use serde::{Deserialize, Serialize};

use crate::images::ImageRef;

pub use credential::PasswordCredential;
pub use persistence::{
    read_identity_table, write_identity_table, IdentityPersistence, JsonFilePersistence,
};
pub use store::IdentityStore;

/// Created once by registration and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityRecord {
    pub username: String,
    pub credential: PasswordCredential,
    pub reference_image: ImageRef,
    pub enrolled_at: String,
}
