mod common;

use std::io::Write;
use std::time::Duration;

use common::{bearer, build_app, seed_session, REFRESH_PATH};
use futures::future::join_all;
use jobdesk::models::LoginCredentials;
use jobdesk::{ApiRequest, SessionError, SessionState};
use mockito::{Matcher, Server};
use reqwest::StatusCode;

const CONCURRENT_REQUESTS: usize = 8;

#[tokio::test]
async fn concurrent_401s_share_a_single_refresh() {
    let mut server = Server::new_async().await;
    let expired = server
        .mock("GET", "/jobs/")
        .match_header("authorization", bearer("T1").as_str())
        .with_status(401)
        .with_body(r#"{"detail": "Given token not valid for any token type"}"#)
        .expect(CONCURRENT_REQUESTS)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .match_body(Matcher::Json(serde_json::json!({"refresh": "R1"})))
        .with_status(200)
        .with_body(r#"{"access": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let renewed = server
        .mock("GET", "/jobs/")
        .match_header("authorization", bearer("T2").as_str())
        .with_status(200)
        .with_body("[]")
        .expect(CONCURRENT_REQUESTS)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let results = join_all(
        (0..CONCURRENT_REQUESTS).map(|_| app.client().dispatch(ApiRequest::get("/jobs/"))),
    )
    .await;

    for result in results {
        let response = result.expect("retried request should succeed");
        assert_eq!(response.status(), StatusCode::OK);
    }
    expired.assert_async().await;
    refresh.assert_async().await;
    renewed.assert_async().await;
    assert_eq!(app.client().refresh_coordinator().refresh_count(), 1);
    assert_eq!(
        app.client().store().access_token().await.unwrap().as_deref(),
        Some("T2")
    );
    assert_eq!(
        app.client().store().refresh_token().await.unwrap().as_deref(),
        Some("R1")
    );
}

#[tokio::test]
async fn failed_refresh_is_delivered_to_every_waiter_and_clears_session() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/jobs/")
        .with_status(401)
        .expect(CONCURRENT_REQUESTS)
        .create_async()
        .await;
    // The slow answer keeps the refresh in flight until every 401 has joined it.
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .with_status(401)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(200));
            w.write_all(br#"{"detail": "Token is blacklisted"}"#)
        })
        .expect(1)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;
    app.sessions.restore().await;
    assert_eq!(app.session().state(), SessionState::Authenticated);

    let results = join_all(
        (0..CONCURRENT_REQUESTS).map(|_| app.client().dispatch(ApiRequest::get("/jobs/"))),
    )
    .await;

    for result in results {
        match result {
            Err(SessionError::RefreshFailure(reason)) => {
                assert_eq!(reason, "Token is blacklisted")
            }
            other => panic!("expected refresh failure, got {:?}", other.map(|r| r.status())),
        }
    }
    refresh.assert_async().await;

    let store = app.client().store();
    assert_eq!(store.access_token().await.unwrap(), None);
    assert_eq!(store.refresh_token().await.unwrap(), None);
    assert_eq!(store.cached_profile_raw().await.unwrap(), None);
    assert_eq!(app.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn retried_request_is_not_retried_again() {
    let mut server = Server::new_async().await;
    let first = server
        .mock("GET", "/auth/profile/")
        .match_header("authorization", bearer("T1").as_str())
        .with_status(401)
        .expect(1)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_body(r#"{"access": "T2"}"#)
        .expect(1)
        .create_async()
        .await;
    let second = server
        .mock("GET", "/auth/profile/")
        .match_header("authorization", bearer("T2").as_str())
        .with_status(401)
        .with_body(r#"{"detail": "User is inactive"}"#)
        .expect(1)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let err = app
        .client()
        .dispatch(ApiRequest::get("/auth/profile/"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Unauthorized { .. }));
    assert_eq!(err.server_message().as_deref(), Some("User is inactive"));
    first.assert_async().await;
    refresh.assert_async().await;
    second.assert_async().await;
    assert_eq!(app.client().refresh_coordinator().refresh_count(), 1);
}

#[tokio::test]
async fn refresh_endpoint_401_does_not_trigger_a_refresh() {
    let mut server = Server::new_async().await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .with_status(401)
        .expect(1)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let request = ApiRequest::post(REFRESH_PATH)
        .json(&serde_json::json!({"refresh": "R1"}))
        .unwrap();
    let err = app.client().dispatch(request).await.unwrap_err();

    assert!(matches!(err, SessionError::Unauthorized { .. }));
    refresh.assert_async().await;
    assert_eq!(app.client().refresh_coordinator().refresh_count(), 0);
    // Nothing was cleared: no refresh happened.
    assert_eq!(
        app.client().store().access_token().await.unwrap().as_deref(),
        Some("T1")
    );
}

#[tokio::test]
async fn missing_refresh_token_surfaces_original_401() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/jobs/1/")
        .with_status(401)
        .with_body(r#"{"detail": "Authentication credentials were not provided."}"#)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .expect(0)
        .create_async()
        .await;

    let app = build_app(server.url()).await;

    let err = app
        .client()
        .dispatch(ApiRequest::get("/jobs/1/"))
        .await
        .unwrap_err();

    assert_eq!(
        err.server_message().as_deref(),
        Some("Authentication credentials were not provided.")
    );
    assert!(matches!(err, SessionError::Unauthorized { .. }));
    refresh.assert_async().await;
}

#[tokio::test]
async fn unauthenticated_requests_carry_no_authorization_header() {
    let mut server = Server::new_async().await;
    let listing = server
        .mock("GET", "/jobs/")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("[]")
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    app.client()
        .dispatch(ApiRequest::get("/jobs/"))
        .await
        .expect("anonymous request should go through");

    listing.assert_async().await;
}

#[tokio::test]
async fn server_errors_pass_through_without_refresh() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/jobs/")
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .expect(0)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let err = app
        .client()
        .dispatch(ApiRequest::get("/jobs/"))
        .await
        .unwrap_err();

    match err {
        SessionError::Http { status, body } => {
            assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
            assert_eq!(body, "boom");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
    refresh.assert_async().await;
    assert_eq!(
        app.client().store().access_token().await.unwrap().as_deref(),
        Some("T1")
    );
}

#[tokio::test]
async fn rotated_refresh_token_is_stored() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/auth/profile/")
        .match_header("authorization", bearer("T1").as_str())
        .with_status(401)
        .create_async()
        .await;
    server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_body(r#"{"access": "T2", "refresh": "R2"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/auth/profile/")
        .match_header("authorization", bearer("T2").as_str())
        .with_status(200)
        .with_body(r#"{"id": 1, "username": "a", "email": "a@example.com"}"#)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let profile = app.sessions.fetch_profile().await.unwrap();

    assert_eq!(profile.email.as_deref(), Some("a@example.com"));
    assert_eq!(app.session().user(), Some(profile));
    assert_eq!(
        app.client().store().refresh_token().await.unwrap().as_deref(),
        Some("R2")
    );
}

#[tokio::test]
async fn network_failure_is_surfaced_unchanged() {
    // Nothing listens on the discard port.
    let app = build_app("http://127.0.0.1:9".to_string()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;

    let err = app
        .client()
        .dispatch(ApiRequest::get("/jobs/"))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::Network(_)));
    assert_eq!(
        app.client().store().refresh_token().await.unwrap().as_deref(),
        Some("R1")
    );
}

const IN_FLIGHT_WAITERS: usize = 3;
// Long enough for every 401 to join the refresh before the session changes.
const SESSION_CHANGE_DELAY: Duration = Duration::from_millis(100);

#[tokio::test]
async fn logout_during_refresh_keeps_tokens_cleared() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/jobs/")
        .match_header("authorization", bearer("T1").as_str())
        .with_status(401)
        .expect(IN_FLIGHT_WAITERS)
        .create_async()
        .await;
    let refresh = server
        .mock("POST", REFRESH_PATH)
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(300));
            w.write_all(br#"{"access": "T2"}"#)
        })
        .expect(1)
        .create_async()
        .await;
    let replay = server
        .mock("GET", "/jobs/")
        .match_header("authorization", bearer("T2").as_str())
        .expect(0)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;
    app.sessions.restore().await;

    let requests =
        join_all((0..IN_FLIGHT_WAITERS).map(|_| app.client().dispatch(ApiRequest::get("/jobs/"))));
    let logout = async {
        tokio::time::sleep(SESSION_CHANGE_DELAY).await;
        app.sessions.logout().await;
    };
    let (results, ()) = tokio::join!(requests, logout);

    for result in results {
        match result {
            Err(SessionError::RefreshFailure(reason)) => {
                assert_eq!(reason, "session ended during refresh")
            }
            other => panic!("expected refresh failure, got {:?}", other.map(|r| r.status())),
        }
    }
    refresh.assert_async().await;
    replay.assert_async().await;
    let store = app.client().store();
    assert_eq!(store.access_token().await.unwrap(), None);
    assert_eq!(store.refresh_token().await.unwrap(), None);
    assert_eq!(app.session().state(), SessionState::Anonymous);
}

#[tokio::test]
async fn failed_refresh_spares_a_session_started_meanwhile() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/jobs/")
        .match_header("authorization", bearer("T1").as_str())
        .with_status(401)
        .expect(IN_FLIGHT_WAITERS)
        .create_async()
        .await;
    server
        .mock("POST", REFRESH_PATH)
        .with_status(401)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_millis(300));
            w.write_all(br#"{"detail": "Token is blacklisted"}"#)
        })
        .expect(1)
        .create_async()
        .await;
    server
        .mock("POST", "/auth/login/")
        .with_status(200)
        .with_body(r#"{"access": "T9", "refresh": "R9"}"#)
        .create_async()
        .await;
    server
        .mock("GET", "/auth/profile/")
        .match_header("authorization", bearer("T9").as_str())
        .with_status(200)
        .with_body(r#"{"id": 2, "username": "b"}"#)
        .create_async()
        .await;

    let app = build_app(server.url()).await;
    seed_session(app.client().store(), "T1", "R1", "a").await;
    app.sessions.restore().await;

    let requests =
        join_all((0..IN_FLIGHT_WAITERS).map(|_| app.client().dispatch(ApiRequest::get("/jobs/"))));
    let relogin = async {
        tokio::time::sleep(SESSION_CHANGE_DELAY).await;
        app.sessions.logout().await;
        app.sessions
            .login(&LoginCredentials::new("b", "pw"))
            .await
            .expect("login should succeed")
    };
    let (results, user) = tokio::join!(requests, relogin);

    for result in results {
        match result {
            Err(SessionError::RefreshFailure(reason)) => {
                assert_eq!(reason, "Token is blacklisted")
            }
            other => panic!("expected refresh failure, got {:?}", other.map(|r| r.status())),
        }
    }
    let store = app.client().store();
    assert_eq!(store.access_token().await.unwrap().as_deref(), Some("T9"));
    assert_eq!(store.refresh_token().await.unwrap().as_deref(), Some("R9"));
    assert_eq!(app.session().user(), Some(user));
    assert_eq!(app.session().state(), SessionState::Authenticated);
}
