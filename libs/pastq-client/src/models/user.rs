use serde::{Deserialize, Serialize};

/// Profile as returned by `/users/profile/` and embedded in login answers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)] // role and status flags of the backend payload
pub struct UserProfile {
    pub id: i64,
    pub index_number: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub faculty: Option<String>,
    pub department: Option<String>,
    pub level: Option<String>,
    pub reputation_score: i64,
    pub upload_count: u64,
    pub successful_uploads: u64,
    pub download_count: u64,
    pub is_verified_uploader: bool,
    pub profile_picture: Option<String>,
    pub date_joined: Option<String>,
    pub last_login: Option<String>,
    pub phone_number: Option<String>,
    pub is_admin: bool,
    pub is_moderator: bool,
    pub is_staff: bool,
    pub is_active: bool,
}

impl UserProfile {
    /// Whether the server grants access to the admin surface.
    #[must_use]
    pub fn is_admin_user(&self) -> bool {
        self.is_staff || self.is_admin
    }

    /// Whether the user may work the moderation queue.
    #[must_use]
    pub fn can_moderate(&self) -> bool {
        self.is_admin_user() || self.is_moderator
    }

    #[must_use]
    pub fn full_name(&self) -> String {
        let name = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let name = name.trim();
        if name.is_empty() {
            self.index_number.clone()
        } else {
            name.to_owned()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    pub index_number: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub index_number: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
}

/// Editable profile fields. Unset fields are left untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub faculty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub email: &'a str,
}

#[derive(Debug, Clone, Serialize)]
pub struct PasswordResetConfirm {
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct ActiveFlag {
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LogoutRequest<'a> {
    pub refresh: &'a str,
}

#[derive(Deserialize)]
pub(crate) struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Login and registration answers. The backend has returned the token pair
/// both at the top level and nested under `tokens`.
#[derive(Deserialize)]
pub(crate) struct AuthEnvelope {
    #[serde(default)]
    access: Option<String>,
    #[serde(default)]
    refresh: Option<String>,
    #[serde(default)]
    tokens: Option<TokenPair>,
}

impl AuthEnvelope {
    pub fn into_tokens(self) -> Option<TokenPair> {
        match (self.tokens, self.access, self.refresh) {
            (Some(pair), _, _) => Some(pair),
            (None, Some(access), Some(refresh)) => Some(TokenPair { access, refresh }),
            _ => None,
        }
    }
}

/// Acknowledgement bodies such as `{"msg": "logged out successfully!"}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiMessage {
    #[serde(default, alias = "msg", alias = "detail", alias = "error")]
    pub message: Option<String>,
}
