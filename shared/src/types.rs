use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::table::TableError;

// ========== ROLE ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Manager,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "Admin",
            Role::Manager => "Manager",
            Role::User => "User",
        }
    }
}

impl FromStr for Role {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Admin" => Ok(Role::Admin),
            "Manager" => Ok(Role::Manager),
            "User" => Ok(Role::User),
            other => Err(TableError::Validation(format!("Unknown role: {}", other))),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== STATUS ==========
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Status {
    #[default]
    Active,
    Inactive,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Active => "Active",
            Status::Inactive => "Inactive",
        }
    }
}

impl FromStr for Status {
    type Err = TableError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(Status::Active),
            "Inactive" => Ok(Status::Inactive),
            other => Err(TableError::Validation(format!("Unknown status: {}", other))),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ========== USER ==========
/// A row of the `users` table as the server returns it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    pub status: Status,
    pub avatar: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Apply the supplied fields of a patch. Server-assigned fields are untouched.
    pub fn apply(&mut self, patch: &UserPatch) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(email) = &patch.email {
            self.email = email.clone();
        }
        if let Some(role) = patch.role {
            self.role = role;
        }
        if let Some(department) = &patch.department {
            self.department = department.clone();
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(avatar) = &patch.avatar {
            self.avatar = avatar.clone();
        }
    }
}

/// Request body for creating a user. `status` defaults to Active.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserDraft {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar: Option<String>,
}

impl UserDraft {
    /// Trim the text fields and check them. The trimmed draft is what gets stored.
    pub fn normalize(mut self) -> Result<Self, TableError> {
        self.name = require_text("name", &self.name)?;
        self.email = validate_email(&self.email)?;
        self.department = require_text("department", &self.department)?;
        self.avatar = self.avatar.as_deref().and_then(trim_avatar);
        Ok(self)
    }
}

/// Request body for updating a user. Only supplied fields are written.
///
/// `avatar` is doubly optional: absent leaves it alone, `null` clears it.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct UserPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,
    #[serde(
        default,
        deserialize_with = "nullable",
        skip_serializing_if = "Option::is_none"
    )]
    pub avatar: Option<Option<String>>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.role.is_none()
            && self.department.is_none()
            && self.status.is_none()
            && self.avatar.is_none()
    }

    /// Trim and check the supplied fields. A blank avatar clears it.
    pub fn normalize(mut self) -> Result<Self, TableError> {
        if let Some(name) = &self.name {
            self.name = Some(require_text("name", name)?);
        }
        if let Some(email) = &self.email {
            self.email = Some(validate_email(email)?);
        }
        if let Some(department) = &self.department {
            self.department = Some(require_text("department", department)?);
        }
        if let Some(avatar) = &self.avatar {
            self.avatar = Some(avatar.as_deref().and_then(trim_avatar));
        }
        Ok(self)
    }
}

fn nullable<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

fn require_text(field: &str, value: &str) -> Result<String, TableError> {
    let value = value.trim();
    if value.is_empty() {
        return Err(TableError::Validation(format!("{} is required", field)));
    }
    Ok(value.to_string())
}

fn trim_avatar(avatar: &str) -> Option<String> {
    Some(avatar.trim()).filter(|a| !a.is_empty()).map(str::to_string)
}

fn validate_email(email: &str) -> Result<String, TableError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email.to_string()),
        _ => Err(TableError::Validation(format!(
            "Invalid email address: {}",
            email
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft() -> UserDraft {
        UserDraft {
            name: "Ann".to_string(),
            email: "a@x.com".to_string(),
            role: Role::User,
            department: "Eng".to_string(),
            status: None,
            avatar: None,
        }
    }

    #[test]
    fn test_draft_validation() {
        assert_eq!(draft().normalize().unwrap(), draft());

        let mut blank_name = draft();
        blank_name.name = "   ".to_string();
        assert_eq!(
            blank_name.normalize().unwrap_err().message(),
            "name is required"
        );

        let mut bad_email = draft();
        bad_email.email = "ann.example.com".to_string();
        assert!(bad_email.normalize().is_err());

        let mut no_domain = draft();
        no_domain.email = "ann@".to_string();
        assert!(no_domain.normalize().is_err());
    }

    #[test]
    fn test_normalize_stores_trimmed_values() {
        let mut padded = draft();
        padded.name = "  Ann ".to_string();
        padded.email = " a@x.com ".to_string();
        padded.department = "\tEng\n".to_string();
        padded.avatar = Some("   ".to_string());

        let clean = padded.normalize().unwrap();
        assert_eq!(clean.name, "Ann");
        assert_eq!(clean.email, "a@x.com");
        assert_eq!(clean.department, "Eng");
        assert_eq!(clean.avatar, None);

        let patch = UserPatch {
            email: Some(" b@x.com".to_string()),
            avatar: Some(Some(" b.png ".to_string())),
            ..Default::default()
        }
        .normalize()
        .unwrap();
        assert_eq!(patch.email.as_deref(), Some("b@x.com"));
        assert_eq!(patch.avatar, Some(Some("b.png".to_string())));
        assert_eq!(patch.name, None);
    }

    #[test]
    fn test_patch_avatar_null_vs_absent() {
        let absent: UserPatch = serde_json::from_str(r#"{"status":"Inactive"}"#).unwrap();
        assert_eq!(absent.avatar, None);
        assert_eq!(absent.status, Some(Status::Inactive));

        let cleared: UserPatch = serde_json::from_str(r#"{"avatar":null}"#).unwrap();
        assert_eq!(cleared.avatar, Some(None));
        assert!(!cleared.is_empty());

        let set: UserPatch = serde_json::from_str(r#"{"avatar":"a.png"}"#).unwrap();
        assert_eq!(set.avatar, Some(Some("a.png".to_string())));
    }

    #[test]
    fn test_role_and_status_wire_names() {
        let json = serde_json::to_string(&draft()).unwrap();
        assert!(json.contains(r#""role":"User""#));
        assert!(!json.contains("status"));

        assert_eq!("Manager".parse::<Role>().unwrap(), Role::Manager);
        assert!("manager".parse::<Role>().is_err());
        assert_eq!("Inactive".parse::<Status>().unwrap(), Status::Inactive);
        assert_eq!(Status::default(), Status::Active);
    }

    #[test]
    fn test_apply_only_touches_supplied_fields() {
        let mut user = User {
            id: "1".to_string(),
            name: "Ann".to_string(),
            email: "a@x.com".to_string(),
            role: Role::User,
            department: "Eng".to_string(),
            status: Status::Active,
            avatar: Some("ann.png".to_string()),
            created_at: "2024-01-01T00:00:00+00:00".to_string(),
            updated_at: "2024-01-01T00:00:00+00:00".to_string(),
        };
        let before = user.clone();

        user.apply(&UserPatch {
            department: Some("Ops".to_string()),
            ..Default::default()
        });

        assert_eq!(user.department, "Ops");
        assert_eq!(user.name, before.name);
        assert_eq!(user.avatar, before.avatar);
        assert_eq!(user.status, before.status);
    }
}
