#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Login, token renewal and session expiry through the public client API.

use std::sync::Arc;
use std::time::Duration;

use httpmock::prelude::*;
use pastq_client::models::CourseQuery;
use pastq_client::{ApiError, ClientConfig, InAppNavigator, Navigator, PortalClient, Route};
use pastq_session::{FileStore, MemoryStore, SessionStore};

const PROFILE: &str = r#"{"id":7,"index_number":"10900007","email":"ama@st.ug.edu.gh","is_staff":false}"#;

fn client_with(server: &MockServer, store: Arc<dyn SessionStore>) -> (PortalClient, Arc<InAppNavigator>) {
    let nav = Arc::new(InAppNavigator::new(Route::Login));
    let client = PortalClient::new(&ClientConfig::for_testing(server.base_url()), store, nav.clone())
        .unwrap();
    (client, nav)
}

fn mock_login(server: &MockServer, profile: &'static str) {
    server.mock(|when, then| {
        when.method(POST).path("/users/login/");
        then.status(200)
            .body(r#"{"access":"A1","refresh":"R1","user":{"id":7}}"#);
    });
    server.mock(|when, then| {
        when.method(GET)
            .path("/users/profile/")
            .header("authorization", "Bearer A1");
        then.status(200).body(profile);
    });
}

#[tokio::test]
async fn login_stores_session_and_routes_by_role() {
    let server = MockServer::start();
    mock_login(&server, PROFILE);
    let (client, nav) = client_with(&server, Arc::new(MemoryStore::new()));

    let profile = client.auth().login("10900007", "Secret123").await.unwrap();

    assert_eq!(profile.email, "ama@st.ug.edu.gh");
    assert_eq!(nav.current(), Route::Dashboard);
    let session = client.session();
    assert_eq!(session.access_token().unwrap().unwrap().expose(), "A1");
    assert_eq!(session.refresh_token().unwrap().unwrap().expose(), "R1");
    assert!(session.user_json().unwrap().unwrap().contains("10900007"));
}

#[tokio::test]
async fn staff_login_lands_on_admin() {
    let server = MockServer::start();
    mock_login(&server, r#"{"id":1,"index_number":"admin","is_staff":true}"#);
    let (client, nav) = client_with(&server, Arc::new(MemoryStore::new()));

    let profile = client.auth().login("admin", "Admin123").await.unwrap();

    assert!(profile.is_admin_user());
    assert_eq!(nav.current(), Route::Admin);
}

#[tokio::test]
async fn expired_token_is_renewed_for_all_pending_calls() {
    let server = MockServer::start();
    mock_login(&server, PROFILE);
    let expired = server.mock(|when, then| {
        when.method(GET)
            .path("/courses/")
            .header("authorization", "Bearer A1");
        then.status(401)
            .body(r#"{"detail":"Given token not valid for any token type","code":"token_not_valid"}"#);
    });
    let renewed = server.mock(|when, then| {
        when.method(GET)
            .path("/courses/")
            .header("authorization", "Bearer A2");
        then.status(200)
            .body(r#"{"count":1,"results":[{"id":1,"code":"DCIT101"}]}"#);
    });
    let refresh = server.mock(|when, then| {
        when.method(POST)
            .path("/api/token/refresh/")
            .json_body(serde_json::json!({"refresh": "R1"}));
        then.status(200)
            .delay(Duration::from_millis(150))
            .body(r#"{"access":"A2"}"#);
    });
    let (client, nav) = client_with(&server, Arc::new(MemoryStore::new()));
    client.auth().login("10900007", "Secret123").await.unwrap();

    let query = CourseQuery::default();
    let courses = client.courses();
    let results = futures::future::join_all((0..4).map(|_| courses.list(&query))).await;

    for listing in results {
        assert_eq!(listing.unwrap().items()[0].code, "DCIT101");
    }
    refresh.assert_calls(1);
    expired.assert_calls(4);
    renewed.assert_calls(4);
    assert_eq!(client.refresh_count(), 1);
    assert_eq!(nav.current(), Route::Dashboard);

    client.courses().list(&query).await.unwrap();
    renewed.assert_calls(5);
    expired.assert_calls(4);
}

#[tokio::test]
async fn rejected_refresh_expires_the_session_for_everyone() {
    let server = MockServer::start();
    mock_login(&server, PROFILE);
    server.mock(|when, then| {
        when.method(GET).path("/past-questions/my-uploads/");
        then.status(401);
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/api/token/refresh/");
        then.status(401)
            .delay(Duration::from_millis(100))
            .body(r#"{"detail":"Token is blacklisted","code":"token_not_valid"}"#);
    });
    let (client, nav) = client_with(&server, Arc::new(MemoryStore::new()));
    client.auth().login("10900007", "Secret123").await.unwrap();

    let past_questions = client.past_questions();
    let results =
        futures::future::join_all((0..3).map(|_| past_questions.my_uploads())).await;

    for r in results {
        let err = r.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired(_)), "got {err:?}");
        assert!(err.requires_login());
    }
    refresh.assert_calls(1);
    assert!(!client.session().is_authenticated());
    assert!(client.session().refresh_token().unwrap().is_none());
    assert!(client.session().user_json().unwrap().is_none());
    assert_eq!(nav.current(), Route::Login);
}

#[tokio::test]
async fn wrong_password_does_not_refresh() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/users/login/");
        then.status(401)
            .body(r#"{"detail":"No active account found with the given credentials"}"#);
    });
    let refresh = server.mock(|when, then| {
        when.method(POST).path("/api/token/refresh/");
        then.status(200).body(r#"{"access":"A2"}"#);
    });
    let (client, nav) = client_with(&server, Arc::new(MemoryStore::new()));

    let err = client.auth().login("10900007", "wrong").await.unwrap_err();

    assert!(matches!(err, ApiError::InvalidCredentials(ref m) if m.contains("No active account")));
    refresh.assert_calls(0);
    assert_eq!(nav.current(), Route::Login);
}

#[tokio::test]
async fn file_backed_session_survives_restart() {
    let server = MockServer::start();
    mock_login(&server, PROFILE);
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("session.json");

    {
        let (client, _) = client_with(&server, Arc::new(FileStore::open(&path).unwrap()));
        client.auth().login("10900007", "Secret123").await.unwrap();
    }

    let (client, _) = client_with(&server, Arc::new(FileStore::open(&path).unwrap()));
    let restored = client.auth().restore().await.unwrap();
    assert_eq!(restored.map(|p| p.id), Some(7));
    assert_eq!(client.auth().current_user().unwrap().unwrap().index_number, "10900007");
}
