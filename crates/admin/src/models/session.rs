//! Session-related types for staff authentication.
//!
//! Types stored in the session for authentication state and one-shot
//! page messages.

use serde::{Deserialize, Serialize};

use partsdesk_core::{Email, StaffUserId};

/// Session-stored staff identity.
///
/// Minimal data stored in the session to identify the logged-in staff
/// member. Permissions are not stored here; the staff context middleware
/// loads them on every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurrentStaff {
    /// Staff member's database ID.
    pub id: StaffUserId,
    /// Staff member's email address.
    pub email: Email,
    /// Staff member's display name.
    pub name: String,
}

/// One-shot messages shown on the next page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flash {
    pub success: Option<String>,
    pub error: Option<String>,
}

impl Flash {
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: Some(message.into()),
            error: None,
        }
    }

    #[must_use]
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: None,
            error: Some(message.into()),
        }
    }
}

/// Session keys for staff authentication data.
pub mod keys {
    /// Key for storing the current logged-in staff member.
    pub const CURRENT_STAFF: &str = "current_staff";

    /// Key for the flash message shown on the next page.
    pub const FLASH: &str = "flash";

    /// Key for field errors carried across a redirect back to a form.
    pub const ERRORS: &str = "errors";
}
