use std::sync::Arc;

use tracing::info;

use relay_db::Database;
use relay_types::UserId;
use relay_types::models::Role;

use crate::error::{RelayError, Result};

/// Single source of truth for roles.
///
/// Mutating methods do not check who is calling. Entry points must pass the
/// caller through [`Permissions::require_owner`] first.
#[derive(Clone)]
pub struct Permissions {
    db: Arc<Database>,
    owner_id: UserId,
}

impl Permissions {
    pub fn new(db: Arc<Database>, owner_id: UserId) -> Self {
        Self { db, owner_id }
    }

    pub fn is_owner(&self, user_id: UserId) -> bool {
        user_id == self.owner_id
    }

    pub fn resolve(&self, user_id: UserId) -> Result<Role> {
        if self.is_owner(user_id) {
            return Ok(Role::Owner);
        }
        if self.db.get_role_grant(user_id)?.is_some() {
            return Ok(Role::Admin);
        }
        Ok(Role::User)
    }

    pub fn can_initiate_send(&self, user_id: UserId) -> Result<bool> {
        Ok(self.resolve(user_id)?.can_initiate_send())
    }

    pub fn require_owner(&self, caller: UserId) -> Result<()> {
        if self.is_owner(caller) {
            Ok(())
        } else {
            Err(RelayError::PermissionDenied)
        }
    }

    pub fn grant(&self, subject: UserId, granter: UserId) -> Result<()> {
        if self.is_owner(subject) {
            return Err(RelayError::InvalidSubject);
        }
        if self.db.get_user(subject)?.is_none() {
            return Err(RelayError::UnknownUser(subject));
        }
        if !self.db.insert_role_grant(subject, granter)? {
            return Err(RelayError::AlreadyGranted(subject));
        }

        info!("User {} granted admin by {}", subject, granter);
        Ok(())
    }

    pub fn revoke(&self, subject: UserId) -> Result<()> {
        if self.is_owner(subject) {
            return Err(RelayError::InvalidSubject);
        }
        if !self.db.delete_role_grant(subject)? {
            return Err(RelayError::NotGranted(subject));
        }

        info!("Admin revoked from user {}", subject);
        Ok(())
    }

    /// Soft delete. The owner can never be deactivated.
    pub fn deactivate_user(&self, subject: UserId) -> Result<()> {
        if self.is_owner(subject) {
            return Err(RelayError::InvalidSubject);
        }
        if !self.db.deactivate_user(subject)? {
            return Err(RelayError::UnknownUser(subject));
        }

        info!("User {} deactivated", subject);
        Ok(())
    }

    /// Hard delete with cascade. The owner can never be deleted.
    pub fn hard_delete_user(&self, subject: UserId) -> Result<()> {
        if self.is_owner(subject) {
            return Err(RelayError::InvalidSubject);
        }
        if !self.db.hard_delete_user(subject)? {
            return Err(RelayError::UnknownUser(subject));
        }
        Ok(())
    }
}
