//! Permission registry and enforcement.
//!
//! Every protected operation is bound to exactly one [`Permission`] at
//! compile time through [`Operation::required_permission`]. Permissions
//! cannot be constructed from request data.

use crate::auth::claims::ClaimSet;
use crate::errors::AuthError;
use std::fmt;

/// A permission string such as `read:works`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Permission(&'static str);

impl Permission {
    pub const READ_PERFORMERS: Permission = Permission("read:performers");
    pub const CREATE_PERFORMERS: Permission = Permission("create:performers");
    pub const MODIFY_PERFORMERS: Permission = Permission("modify:performers");
    pub const REMOVE_PERFORMERS: Permission = Permission("remove:performers");
    pub const READ_WORKS: Permission = Permission("read:works");
    pub const CREATE_WORKS: Permission = Permission("create:works");
    pub const MODIFY_WORKS: Permission = Permission("modify:works");
    pub const REMOVE_WORKS: Permission = Permission("remove:works");

    pub const fn as_str(self) -> &'static str {
        self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Protected endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListPerformers,
    GetPerformer,
    CreatePerformer,
    ModifyPerformer,
    RemovePerformer,
    ListWorks,
    GetWork,
    CreateWork,
    ModifyWork,
    RemoveWork,
    ListCast,
    AddCastMember,
}

impl Operation {
    pub const ALL: [Operation; 12] = [
        Operation::ListPerformers,
        Operation::GetPerformer,
        Operation::CreatePerformer,
        Operation::ModifyPerformer,
        Operation::RemovePerformer,
        Operation::ListWorks,
        Operation::GetWork,
        Operation::CreateWork,
        Operation::ModifyWork,
        Operation::RemoveWork,
        Operation::ListCast,
        Operation::AddCastMember,
    ];

    /// The single permission a caller must hold to perform this operation.
    pub const fn required_permission(self) -> Permission {
        match self {
            Operation::ListPerformers | Operation::GetPerformer => Permission::READ_PERFORMERS,
            Operation::CreatePerformer => Permission::CREATE_PERFORMERS,
            Operation::ModifyPerformer => Permission::MODIFY_PERFORMERS,
            Operation::RemovePerformer => Permission::REMOVE_PERFORMERS,
            Operation::ListWorks | Operation::GetWork | Operation::ListCast => {
                Permission::READ_WORKS
            }
            Operation::CreateWork => Permission::CREATE_WORKS,
            Operation::ModifyWork | Operation::AddCastMember => Permission::MODIFY_WORKS,
            Operation::RemoveWork => Permission::REMOVE_WORKS,
        }
    }

    /// Stable name for logs.
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::ListPerformers => "list_performers",
            Operation::GetPerformer => "get_performer",
            Operation::CreatePerformer => "create_performer",
            Operation::ModifyPerformer => "modify_performer",
            Operation::RemovePerformer => "remove_performer",
            Operation::ListWorks => "list_works",
            Operation::GetWork => "get_work",
            Operation::CreateWork => "create_work",
            Operation::ModifyWork => "modify_work",
            Operation::RemoveWork => "remove_work",
            Operation::ListCast => "list_cast",
            Operation::AddCastMember => "add_cast_member",
        }
    }
}

/// Check that the verified claims grant `required`.
///
/// # Errors
///
/// Returns `AuthError::InsufficientPermission` if the permission is absent.
pub fn enforce(claims: &ClaimSet, required: Permission) -> Result<(), AuthError> {
    if claims.has_permission(required.as_str()) {
        Ok(())
    } else {
        tracing::debug!(
            target: "casting.auth.permissions",
            required = %required,
            granted = claims.permissions.len(),
            "Permission not granted"
        );
        Err(AuthError::InsufficientPermission)
    }
}
