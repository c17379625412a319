//! Staff users, roles and the forms that edit their permissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

use partsdesk_core::{Email, PermissionName, RoleId, StaffUserId};

use crate::validation::{FieldErrors, not_blank};

/// A staff account as listed on the users page.
#[derive(Debug, Clone, Serialize)]
pub struct StaffUser {
    pub id: StaffUserId,
    pub name: String,
    pub email: Email,
    /// Role names, sorted.
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Staff member as a select option (employee filters and assignment).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StaffOption {
    pub id: StaffUserId,
    pub name: String,
}

/// A role with the permission names it grants.
#[derive(Debug, Clone, Serialize)]
pub struct Role {
    pub id: RoleId,
    pub name: String,
    pub permissions: Vec<String>,
}

/// `POST /users` body.
#[derive(Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct StaffForm {
    #[validate(custom(function = "not_blank"), length(max = 255))]
    pub name: String,
    pub email: String,
    #[validate(length(min = 8))]
    pub password: String,
}

/// A validated new staff account. The password is still plain text.
#[derive(Clone)]
pub struct StaffInput {
    pub name: String,
    pub email: Email,
    pub password: String,
}

impl std::fmt::Debug for StaffForm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaffForm")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl std::fmt::Debug for StaffInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StaffInput")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl StaffForm {
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn into_input(self) -> Result<StaffInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(&self);
        let email = Email::parse(&self.email)
            .map_err(|_| errors.add("email", "Email must be a valid email address."))
            .ok();

        match email {
            Some(email) => errors.finish(StaffInput {
                name: self.name.trim().to_owned(),
                email,
                password: self.password,
            }),
            None => Err(errors),
        }
    }
}

/// `POST /roles` and `PUT /roles/{id}` body.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RoleForm {
    #[validate(custom(function = "not_blank"), length(max = 100))]
    pub name: String,
    pub permissions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleInput {
    pub name: String,
    pub permissions: Vec<PermissionName>,
}

impl RoleForm {
    /// `known` is every permission name stored in the database.
    ///
    /// # Errors
    ///
    /// Returns every field error found.
    pub fn into_input(self, known: &[String]) -> Result<RoleInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        errors.check(&self);
        let permissions = permission_list(&mut errors, &self.permissions, known);
        errors.finish(RoleInput {
            name: self.name.trim().to_owned(),
            permissions,
        })
    }
}

/// `PUT /users/{id}/roles` body: the full list of role ids.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserRolesForm {
    pub roles: Vec<i32>,
}

impl UserRolesForm {
    /// # Errors
    ///
    /// Returns a `roles.{i}` error for each unknown role id.
    pub fn into_ids(self, known: &[RoleId]) -> Result<Vec<RoleId>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let mut ids: Vec<RoleId> = Vec::new();
        for (index, id) in self.roles.into_iter().map(RoleId::new).enumerate() {
            if !known.contains(&id) {
                errors.add(&format!("roles.{index}"), "Unknown role.");
            } else if !ids.contains(&id) {
                ids.push(id);
            }
        }
        errors.finish(ids)
    }
}

/// `PUT /users/{id}/permissions` body: the full list of direct permissions.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct UserPermissionsForm {
    pub permissions: Vec<String>,
}

impl UserPermissionsForm {
    /// # Errors
    ///
    /// Returns a `permissions.{i}` error for each unknown name.
    pub fn into_names(self, known: &[String]) -> Result<Vec<PermissionName>, FieldErrors> {
        let mut errors = FieldErrors::new();
        let names = permission_list(&mut errors, &self.permissions, known);
        errors.finish(names)
    }
}

/// Parse submitted permission names, keeping only those in `known`.
fn permission_list(
    errors: &mut FieldErrors,
    submitted: &[String],
    known: &[String],
) -> Vec<PermissionName> {
    let mut names: Vec<PermissionName> = Vec::new();
    for (index, raw) in submitted.iter().enumerate() {
        match PermissionName::parse(raw) {
            Ok(name) if known.iter().any(|k| k == name.as_str()) => {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
            _ => errors.add(&format!("permissions.{index}"), "Unknown permission."),
        }
    }
    names
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn known() -> Vec<String> {
        ["*", "leads.view", "orders.edit"]
            .iter()
            .map(ToString::to_string)
            .collect()
    }

    #[test]
    fn test_role_form() {
        let form = RoleForm {
            name: " Sales ".to_string(),
            permissions: vec![
                "leads.view".to_string(),
                "orders.edit".to_string(),
                "leads.view".to_string(),
            ],
        };
        let input = form.into_input(&known()).unwrap();
        assert_eq!(input.name, "Sales");
        assert_eq!(input.permissions.len(), 2);
    }

    #[test]
    fn test_unknown_permissions_are_field_errors() {
        let form = UserPermissionsForm {
            permissions: vec![
                "leads.view".to_string(),
                "leads.fly".to_string(),
                "NOPE".to_string(),
            ],
        };
        let errors = form.into_names(&known()).unwrap_err();
        assert!(!errors.has("permissions.0"));
        assert_eq!(errors.get("permissions.1"), Some("Unknown permission."));
        assert!(errors.has("permissions.2"));
    }

    #[test]
    fn test_empty_permission_list_is_valid() {
        let names = UserPermissionsForm::default().into_names(&known()).unwrap();
        assert!(names.is_empty());
    }

    #[test]
    fn test_user_roles_form() {
        let known = [RoleId::new(1), RoleId::new(2)];
        let ids = UserRolesForm {
            roles: vec![2, 1, 2],
        }
        .into_ids(&known)
        .unwrap();
        assert_eq!(ids, vec![RoleId::new(2), RoleId::new(1)]);

        let errors = UserRolesForm { roles: vec![3] }
            .into_ids(&known)
            .unwrap_err();
        assert!(errors.has("roles.0"));
    }

    #[test]
    fn test_staff_form() {
        let form = StaffForm {
            name: "Robin".to_string(),
            email: "Robin@PartsDesk.test".to_string(),
            password: "correct horse".to_string(),
        };
        let input = form.into_input().unwrap();
        assert_eq!(input.email.as_str(), "robin@partsdesk.test");

        let errors = StaffForm {
            name: String::new(),
            email: "robin".to_string(),
            password: "short".to_string(),
        }
        .into_input()
        .unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("email"));
        assert_eq!(
            errors.get("password"),
            Some("Password must be at least 8 characters.")
        );
    }
}
