use serde::{Deserialize, Serialize};

record_id!(
    /// Identity of a client, provider or administrator account.
    AccountId
);

/// The capacity an account acts in for a given operation.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Client,
    Mechanic,
    Shop,
    Admin,
}

impl Role {
    pub const fn label(self) -> &'static str {
        match self {
            Role::Client => "client",
            Role::Mechanic => "mechanic",
            Role::Shop => "shop",
            Role::Admin => "admin",
        }
    }

    pub const fn is_provider(self) -> bool {
        matches!(self, Role::Mechanic | Role::Shop)
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub id: AccountId,
    pub role: Role,
}

impl Actor {
    pub fn new(id: u64, role: Role) -> Self {
        Self {
            id: AccountId(id),
            role,
        }
    }

    pub fn client(id: u64) -> Self {
        Self::new(id, Role::Client)
    }

    pub fn mechanic(id: u64) -> Self {
        Self::new(id, Role::Mechanic)
    }

    pub fn shop(id: u64) -> Self {
        Self::new(id, Role::Shop)
    }

    pub fn admin(id: u64) -> Self {
        Self::new(id, Role::Admin)
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}
