pub mod dto;
#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;

pub use dto::PublicAccount;
pub use repo::{AccountStore, PgAccountStore, StoreError};
pub use repo_types::{Account, AccountChanges, AuthProvider, Gender, NewAccount};
