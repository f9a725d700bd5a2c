use crate::accounts::Gender;

/// Identity asserted by an external provider after successful verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalIdentity {
    /// The provider's subject identifier.
    pub external_id: String,
    pub email: String,
    pub display_name: String,
    pub avatar_url: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

/// Profile fields the user supplies alongside an OAuth login.
/// Required before a new account can be created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SupplementalProfile {
    pub name: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<Gender>,
}

impl SupplementalProfile {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref().map(str::trim).filter(|n| !n.is_empty())
    }
}
