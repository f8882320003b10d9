use http::StatusCode;
use pastq_session::{Route, SecretString, redirect_to_login};

use crate::client::PortalClient;
use crate::error::ApiError;
use crate::models::{
    ApiMessage, AuthEnvelope, ChangePasswordRequest, LoginRequest, LogoutRequest,
    PasswordResetConfirm, PasswordResetRequest, ProfileUpdate, RegisterRequest, UserProfile,
};
use crate::validators::{ValidationError, validate_email, validate_password, validate_registration};

const REGISTER_PATH: &str = "/users/register/";
const LOGOUT_PATH: &str = "/users/logout/";
const PROFILE_PATH: &str = "/users/profile/";
const CHANGE_PASSWORD_PATH: &str = "/users/profile/change-password";
const PASSWORD_RESET_PATH: &str = "/users/password-reset/";

/// Login, registration and the signed-in user's profile.
#[derive(Debug, Clone, Copy)]
pub struct AuthService<'a> {
    client: &'a PortalClient,
}

impl<'a> AuthService<'a> {
    pub(crate) fn new(client: &'a PortalClient) -> Self {
        Self { client }
    }

    /// Log in with an index number and password.
    ///
    /// Any previous session is discarded. On success the token pair is
    /// stored, the profile is fetched from the server and cached, and the
    /// navigator moves to the admin surface for staff and admins or to the
    /// dashboard otherwise. If the profile cannot be fetched the tokens are
    /// dropped again and the error returned.
    ///
    /// # Errors
    /// [`ApiError::InvalidCredentials`] when the backend refuses the
    /// credentials; other variants for transport or decoding failures.
    pub async fn login(&self, index_number: &str, password: &str) -> Result<UserProfile, ApiError> {
        if index_number.trim().is_empty() || password.is_empty() {
            return Err(ValidationError::new(
                "index_number",
                "Index number and password are required",
            )
            .into());
        }

        let session = self.client.session();
        session.clear()?;

        let request = LoginRequest {
            index_number: index_number.trim().to_owned(),
            password: password.to_owned(),
        };
        let envelope: AuthEnvelope = self
            .client
            .post_json(self.client.login_path(), &request)
            .await
            .map_err(credentials_error)?;
        let tokens = envelope.into_tokens().ok_or_else(|| {
            ApiError::Decode(serde::de::Error::custom("login response carried no tokens"))
        })?;
        session.save_tokens(
            &SecretString::new(tokens.access),
            &SecretString::new(tokens.refresh),
        )?;

        let profile = match self.profile().await {
            Ok(profile) => profile,
            Err(e) => {
                tracing::warn!(error = %e, "profile fetch failed after login, discarding tokens");
                session.clear()?;
                return Err(e);
            }
        };
        let landing = Route::landing(profile.is_admin_user());
        tracing::info!(user_id = profile.id, %landing, "logged in");
        self.client.navigator().navigate(landing);
        Ok(profile)
    }

    /// Create an account, then log in with the same credentials.
    ///
    /// # Errors
    /// [`ApiError::Validation`] for client-side rule violations, backend
    /// rejections as [`ApiError::Status`], then as [`login`](Self::login).
    pub async fn register(&self, data: &RegisterRequest) -> Result<UserProfile, ApiError> {
        validate_registration(data)?;
        let _: serde_json::Value = self.client.post_json(REGISTER_PATH, data).await?;
        tracing::info!(index_number = %data.index_number, "account registered");
        self.login(&data.index_number, &data.password).await
    }

    /// End the session.
    ///
    /// The refresh token is blacklisted on the server when possible; the
    /// local session is cleared and the navigator sent to the login page
    /// whatever the server says.
    ///
    /// # Errors
    /// Only local storage failures are reported.
    pub async fn logout(&self) -> Result<(), ApiError> {
        let session = self.client.session();
        if let Some(refresh) = session.refresh_token()? {
            let body = LogoutRequest {
                refresh: refresh.expose(),
            };
            match self.client.post_json::<_, serde_json::Value>(LOGOUT_PATH, &body).await {
                Ok(_) => tracing::debug!("refresh token revoked"),
                Err(e) => tracing::warn!(error = %e, "server-side logout failed, clearing local session anyway"),
            }
        }
        session.clear()?;
        redirect_to_login(self.client.navigator().as_ref());
        tracing::info!("logged out");
        Ok(())
    }

    /// Fetch the signed-in user's profile and refresh the cached copy.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn profile(&self) -> Result<UserProfile, ApiError> {
        let profile: UserProfile = self.client.get_json(PROFILE_PATH).await?;
        self.cache(&profile)?;
        Ok(profile)
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<UserProfile, ApiError> {
        if let Some(email) = &update.email {
            validate_email(email)?;
        }
        let profile: UserProfile = self.client.patch_json(PROFILE_PATH, update).await?;
        self.cache(&profile)?;
        Ok(profile)
    }

    /// # Errors
    /// [`ApiError::Validation`] for a weak or mismatching new password;
    /// backend rejections (wrong old password) as [`ApiError::Status`].
    pub async fn change_password(&self, request: &ChangePasswordRequest) -> Result<ApiMessage, ApiError> {
        validate_password(&request.new_password)?;
        if request.new_password != request.confirm_password {
            return Err(ValidationError::new("confirm_password", "Passwords do not match").into());
        }
        self.client.post_json(CHANGE_PASSWORD_PATH, request).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn request_password_reset(&self, email: &str) -> Result<ApiMessage, ApiError> {
        validate_email(email)?;
        self.client
            .post_json(PASSWORD_RESET_PATH, &PasswordResetRequest { email })
            .await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn confirm_password_reset(
        &self,
        user_id: i64,
        request: &PasswordResetConfirm,
    ) -> Result<ApiMessage, ApiError> {
        validate_password(&request.new_password)?;
        if request.new_password != request.confirm_password {
            return Err(ValidationError::new("confirm_password", "Passwords do not match").into());
        }
        self.client
            .post_json(&format!("/users/password-reset-confirm/{user_id}/"), request)
            .await
    }

    /// Resume a stored session at start-up.
    ///
    /// When both an access token and a cached profile exist, the profile is
    /// re-fetched from the server. If that fails the session is cleared.
    ///
    /// # Errors
    /// Only local storage failures are reported.
    pub async fn restore(&self) -> Result<Option<UserProfile>, ApiError> {
        let session = self.client.session();
        if !session.is_authenticated() || session.user_json()?.is_none() {
            return Ok(None);
        }
        match self.profile().await {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "stored session could not be restored");
                session.clear()?;
                Ok(None)
            }
        }
    }

    /// Profile cached at the last login or profile fetch.
    ///
    /// # Errors
    /// Fails when the store cannot be read or the cached JSON is invalid.
    pub fn current_user(&self) -> Result<Option<UserProfile>, ApiError> {
        match self.client.session().user_json()? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn cache(&self, profile: &UserProfile) -> Result<(), ApiError> {
        let raw = serde_json::to_string(profile)?;
        self.client.session().set_user_json(&raw)?;
        Ok(())
    }
}

/// Login answers 400 (serializer validation) or 401 for bad credentials.
fn credentials_error(err: ApiError) -> ApiError {
    match err {
        ApiError::Status { status, message }
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::BAD_REQUEST =>
        {
            ApiError::InvalidCredentials(message)
        }
        other => other,
    }
}
