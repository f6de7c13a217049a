//! Caller identity and row-level access scope

use serde::{Deserialize, Serialize};

/// Role level at or above which a caller sees all customers' data.
pub const UNRESTRICTED_ROLE_LEVEL: i32 = 50;

/// What slice of the fleet a caller may see.
///
/// An explicit tagged variant instead of an overloaded customer-ID list:
/// an empty list below the admin threshold means no access, never all access.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessScope {
    /// Role level >= 50: no customer filtering at all.
    Unrestricted,
    /// May only see rows belonging to these customer IDs.
    RestrictedTo(Vec<String>),
    /// No customer assignments: every query must return zero rows.
    NoAccess,
}

impl AccessScope {
    /// Build the scope from the raw role level and customer list the
    /// authorization layer hands us.
    pub fn from_grants(role_level: i32, customer_ids: Option<Vec<String>>) -> Self {
        if role_level >= UNRESTRICTED_ROLE_LEVEL {
            return AccessScope::Unrestricted;
        }
        match customer_ids {
            None => AccessScope::Unrestricted,
            Some(ids) if ids.is_empty() => AccessScope::NoAccess,
            Some(ids) => AccessScope::RestrictedTo(ids),
        }
    }
}

/// Immutable per-request caller context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallerContext {
    pub user_id: String,
    pub role_name: String,
    pub role_level: i32,
    pub scope: AccessScope,
}

impl CallerContext {
    pub fn new(
        user_id: impl Into<String>,
        role_name: impl Into<String>,
        role_level: i32,
        customer_ids: Option<Vec<String>>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            role_name: role_name.into(),
            role_level,
            scope: AccessScope::from_grants(role_level, customer_ids),
        }
    }

    /// Short description of the caller's scope for prompt construction.
    pub fn scope_summary(&self) -> String {
        match &self.scope {
            AccessScope::Unrestricted => "all customers".to_string(),
            AccessScope::RestrictedTo(ids) => format!("customers: {}", ids.join(", ")),
            AccessScope::NoAccess => "no customer assignments".to_string(),
        }
    }
}
