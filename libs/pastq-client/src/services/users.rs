use serde::Serialize;

use crate::client::PortalClient;
use crate::error::ApiError;
use crate::models::{ActiveFlag, ApiMessage, Listing, UserProfile};

const USERS_PATH: &str = "/users/users/";

/// Filters for the admin user list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserQuery {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
}

/// User management for administrators.
#[derive(Debug, Clone, Copy)]
pub struct UserAdminService<'a> {
    client: &'a PortalClient,
}

impl<'a> UserAdminService<'a> {
    pub(crate) fn new(client: &'a PortalClient) -> Self {
        Self { client }
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn list(&self, query: &UserQuery) -> Result<Listing<UserProfile>, ApiError> {
        self.client.get_json_with(USERS_PATH, query).await
    }

    /// # Errors
    /// See [`ApiError`].
    pub async fn get(&self, id: i64) -> Result<UserProfile, ApiError> {
        self.client.get_json(&format!("{USERS_PATH}{id}/")).await
    }

    /// Activate or suspend an account.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn set_active(&self, id: i64, is_active: bool) -> Result<UserProfile, ApiError> {
        let user: UserProfile = self
            .client
            .patch_json(&format!("{USERS_PATH}{id}/"), &ActiveFlag { is_active })
            .await?;
        tracing::info!(user_id = id, is_active, "account status changed");
        Ok(user)
    }

    /// Deactivate an account. The backend keeps the record.
    ///
    /// # Errors
    /// See [`ApiError`].
    pub async fn delete(&self, id: i64) -> Result<ApiMessage, ApiError> {
        let message = self.client.delete(&format!("{USERS_PATH}{id}/")).await?;
        tracing::info!(user_id = id, "account deleted");
        Ok(message)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::client::test_client;
    use httpmock::prelude::*;
    use pastq_session::SecretString;

    #[tokio::test]
    async fn suspend_patches_active_flag() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PATCH)
                .path("/users/users/9/")
                .header("authorization", "Bearer ADMIN")
                .json_body(serde_json::json!({"is_active": false}));
            then.status(200)
                .body(r#"{"id":9,"index_number":"10900009","is_active":false}"#);
        });
        let (client, _) = test_client(&server.base_url());
        client
            .session()
            .save_tokens(&SecretString::new("ADMIN"), &SecretString::new("R"))
            .unwrap();

        let user = client.users().set_active(9, false).await.unwrap();
        mock.assert();
        assert!(!user.is_active);
    }

    #[tokio::test]
    async fn list_accepts_bare_arrays() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/users/users/").query_param("search", "yaw");
            then.status(200).body(r#"[{"id":1},{"id":2}]"#);
        });
        let (client, _) = test_client(&server.base_url());

        let users = client
            .users()
            .list(&UserQuery {
                search: Some("yaw".to_owned()),
                ..UserQuery::default()
            })
            .await
            .unwrap();
        assert_eq!(users.total(), 2);
        assert!(!users.has_next());
    }
}
