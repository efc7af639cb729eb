//! Caller identity as issued by the external identity collaborator.

use common::UserId;
use serde::{Deserialize, Serialize};

/// Role attached to an authenticated caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Customer,
    Admin,
    /// The payment gateway, authenticated by shared key rather than session.
    Gateway,
}

/// The party on whose behalf an operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn customer(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Customer,
        }
    }

    pub fn admin(user_id: UserId) -> Self {
        Self {
            user_id,
            role: Role::Admin,
        }
    }

    /// The payment gateway. Carries a nil user id; it owns no orders.
    pub fn gateway() -> Self {
        Self {
            user_id: UserId::from_uuid(uuid::Uuid::nil()),
            role: Role::Gateway,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// Owners and admins may read and cancel an order.
    pub fn can_access(&self, owner: Option<UserId>) -> bool {
        self.is_admin() || (self.role == Role::Customer && owner == Some(self.user_id))
    }

    /// Admins and the gateway may write payment status.
    pub fn can_manage_payments(&self) -> bool {
        matches!(self.role, Role::Admin | Role::Gateway)
    }
}
