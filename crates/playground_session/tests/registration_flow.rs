
use fixtures::*;
use playground_session::{
    ClientAction, EventOutcome, MemoryStore, PersistedState, RegistrationSession,
    RegistrationState, SdkEvent, SessionError, SessionStatus, StateStore, StoreError,
};
use std::io;
use std::sync::Arc;
use tokio::time::{advance, Duration, Instant};

struct Harness {
    sdk: Arc<FakeSdk>,
    app_server: Arc<FakeAppServer>,
    store: Arc<MemoryStore>,
    session: RegistrationSession,
}

fn harness() -> Harness {
    let sdk = FakeSdk::new();
    let app_server = FakeAppServer::new();
    let store = Arc::new(MemoryStore::new());
    let session = build_session(&sdk, &app_server, &store);
    Harness {
        sdk,
        app_server,
        store,
        session,
    }
}

async fn registered() -> Harness {
    let mut h = harness();
    h.session
        .register(SENDER_ID, Some("deviceA"))
        .await
        .unwrap();
    h
}

#[tokio::test]
async fn test_register_completes_and_persists() {
    let mut h = harness();

    let status = h.session.register(SENDER_ID, Some("deviceA")).await.unwrap();

    assert_eq!(status, SessionStatus::Registered);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
    assert!(h.session.state().pending.is_none());
    assert_eq!(
        h.sdk.calls(),
        vec![SdkCall::RegisterForToken(vec![SENDER_ID.to_string()])]
    );

    let request = h.app_server.last_request();
    assert_eq!(request.action, ClientAction::RegisterNewClient);
    assert_eq!(request.registration_token, "tok-1");
    assert_eq!(request.string_identifier.as_deref(), Some("deviceA"));

    let stored = h.store.current();
    assert!(stored.registered);
    assert_eq!(stored.reg_token.as_deref(), Some("tok-1"));
    assert_eq!(stored.sender_id.as_deref(), Some(SENDER_ID));
    assert!(stored.registered_at.is_some());
}

#[tokio::test]
async fn test_register_rejects_blank_sender() {
    let mut h = harness();

    let err = h.session.register("   ", None).await.unwrap_err();

    assert!(matches!(err, SessionError::InvalidInput(_)));
    assert_eq!(h.session.status(), SessionStatus::Unregistered);
    assert!(h.sdk.calls().is_empty());
}

#[tokio::test]
async fn test_register_sdk_failure_returns_to_unregistered() {
    let mut h = harness();
    h.sdk.fail_token("SERVICE_NOT_AVAILABLE");

    let err = h.session.register(SENDER_ID, None).await.unwrap_err();

    assert_eq!(
        err,
        SessionError::TokenIssuanceFailed("SERVICE_NOT_AVAILABLE".to_string())
    );
    assert_eq!(h.session.status(), SessionStatus::Unregistered);
    assert!(h.app_server.requests().is_empty());
    assert_eq!(h.store.current(), PersistedState::default());

    // Retry is allowed straight away.
    let status = h.session.register(SENDER_ID, None).await.unwrap();
    assert_eq!(status, SessionStatus::Registered);
}

#[tokio::test]
async fn test_app_server_failure_keeps_token_unconfirmed() {
    let mut h = harness();
    h.app_server.script(Scripted::Fail(500));

    let err = h.session.register(SENDER_ID, None).await.unwrap_err();

    assert!(matches!(err, SessionError::AppServerRegistrationFailed(_)));
    assert!(err.is_warning());
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
    assert!(!h.store.current().registered);

    // Registering again from Unconfirmed gets a fresh token and completes.
    let status = h.session.register(SENDER_ID, None).await.unwrap();
    assert_eq!(status, SessionStatus::Registered);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-2"));
}

#[tokio::test]
async fn test_register_twice_is_rejected() {
    let mut h = registered().await;

    let err = h.session.register(SENDER_ID, None).await.unwrap_err();

    assert_eq!(
        err,
        SessionError::InvalidState {
            operation: "register",
            status: SessionStatus::Registered,
        }
    );
    assert_eq!(h.sdk.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_app_server_timeout_marks_unconfirmed() {
    let mut h = harness();
    h.app_server.script(Scripted::Hang);

    let err = h.session.register(SENDER_ID, None).await.unwrap_err();

    assert!(matches!(err, SessionError::AppServerRegistrationFailed(_)));
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);
    assert!(h.session.state().pending.is_none());
}

#[tokio::test]
async fn test_tunnelled_reply_completes_registration() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);

    let status = h.session.register(SENDER_ID, None).await.unwrap();
    assert_eq!(status, SessionStatus::Registering);
    assert!(h.session.state().token.is_none());
    assert!(!h.store.current().registered);

    let correlation_id = h.app_server.last_request().correlation_id;
    assert_eq!(
        h.session.snapshot().pending_correlation_id.as_deref(),
        Some(correlation_id.as_str())
    );

    let outcome = h
        .session
        .handle_event(reply("register_new_client", "registered", &correlation_id))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Registered);
    assert_eq!(h.session.status(), SessionStatus::Registered);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
    assert!(h.store.current().registered);
}

#[tokio::test]
async fn test_reply_without_id_matches_by_token() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);
    h.session.register(SENDER_ID, None).await.unwrap();

    let outcome = h
        .session
        .handle_event(downstream(&[
            ("action", "register_new_client"),
            ("status", "registered"),
            ("registration_token", "tok-1"),
        ]))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Registered);
}

#[tokio::test]
async fn test_stale_reply_is_discarded() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);
    h.session.register(SENDER_ID, None).await.unwrap();
    let before = h.session.state().clone();

    let outcome = h
        .session
        .handle_event(reply("register_new_client", "registered", "not-the-pending-id"))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::Discarded);

    let outcome = h
        .session
        .handle_event(downstream(&[
            ("action", "unregister_client"),
            ("status", "unregistered"),
            ("registration_token", "tok-1"),
        ]))
        .await
        .unwrap();
    assert_eq!(outcome, EventOutcome::Discarded);

    assert_eq!(h.session.state(), &before);
}

#[tokio::test]
async fn test_reply_when_idle_is_discarded() {
    let mut h = registered().await;
    let before = h.session.state().clone();

    let outcome = h
        .session
        .handle_event(reply("register_new_client", "registered", "late"))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Discarded);
    assert_eq!(h.session.state(), &before);
}

#[tokio::test]
async fn test_negative_reply_marks_unconfirmed() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);
    h.session.register(SENDER_ID, None).await.unwrap();
    let correlation_id = h.app_server.last_request().correlation_id;

    let err = h
        .session
        .handle_event(reply("register_new_client", "rejected", &correlation_id))
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AppServerRegistrationFailed(_)));
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_busy_while_reply_pending() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);
    h.session.register(SENDER_ID, None).await.unwrap();
    let correlation_id = h.app_server.last_request().correlation_id;

    let err = h.session.register(SENDER_ID, None).await.unwrap_err();
    assert_eq!(
        err,
        SessionError::Busy {
            correlation_id: correlation_id.clone()
        }
    );
    let err = h.session.unregister().await.unwrap_err();
    assert!(matches!(err, SessionError::Busy { .. }));
    assert_eq!(h.sdk.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_pending_reply_expires() {
    let mut h = harness();
    h.app_server.script(Scripted::AwaitReply);
    h.session.register(SENDER_ID, None).await.unwrap();

    assert!(h.session.expire_pending(Instant::now()).is_none());
    assert_eq!(h.session.status(), SessionStatus::Registering);

    advance(Duration::from_secs(6)).await;
    let err = h.session.expire_pending(Instant::now()).unwrap();

    assert!(matches!(err, SessionError::AppServerRegistrationFailed(_)));
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
    assert!(h.session.pending_deadline().is_none());
}

#[tokio::test]
async fn test_unregister_clears_everything() {
    let mut h = registered().await;

    let status = h.session.unregister().await.unwrap();

    assert_eq!(status, SessionStatus::Unregistered);
    assert_eq!(h.session.state(), &RegistrationState::default());
    assert_eq!(h.store.current(), PersistedState::default());

    let request = h.app_server.last_request();
    assert_eq!(request.action, ClientAction::UnregisterClient);
    assert_eq!(request.registration_token, "tok-1");
    assert!(h.sdk.calls().contains(&SdkCall::UnregisterToken));
}

#[tokio::test]
async fn test_unregister_sdk_failure_restores_status() {
    let mut h = registered().await;
    h.sdk.fail_unregister("network down");

    let err = h.session.unregister().await.unwrap_err();

    assert_eq!(
        err,
        SessionError::UnregistrationFailed("network down".to_string())
    );
    assert_eq!(h.session.status(), SessionStatus::Registered);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-1"));
    assert!(h.store.current().registered);
    assert_eq!(h.app_server.requests().len(), 1);
}

#[tokio::test]
async fn test_unregister_app_server_failure_still_unregisters() {
    let mut h = registered().await;
    h.app_server.script(Scripted::Fail(500));

    let err = h.session.unregister().await.unwrap_err();

    assert!(matches!(err, SessionError::AppServerUnregistrationFailed(_)));
    assert!(err.is_warning());
    assert_eq!(h.session.status(), SessionStatus::Unregistered);
    assert!(h.session.state().token.is_none());
    assert_eq!(h.store.current(), PersistedState::default());
}

#[tokio::test]
async fn test_unregister_from_unconfirmed() {
    let mut h = harness();
    h.app_server.script(Scripted::Fail(503));
    let _ = h.session.register(SENDER_ID, None).await;
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);

    let status = h.session.unregister().await.unwrap();
    assert_eq!(status, SessionStatus::Unregistered);
}

#[tokio::test]
async fn test_unregister_when_unregistered_is_rejected() {
    let mut h = harness();

    let err = h.session.unregister().await.unwrap_err();

    assert_eq!(
        err,
        SessionError::InvalidState {
            operation: "unregister",
            status: SessionStatus::Unregistered,
        }
    );
    assert!(h.sdk.calls().is_empty());
}

#[tokio::test]
async fn test_tunnelled_unregister_reply() {
    let mut h = registered().await;
    h.app_server.script(Scripted::AwaitReply);

    let status = h.session.unregister().await.unwrap();
    assert_eq!(status, SessionStatus::Unregistering);
    let correlation_id = h.app_server.last_request().correlation_id;

    let outcome = h
        .session
        .handle_event(reply("unregister_client", "unregistered", &correlation_id))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Unregistered);
    assert_eq!(h.session.status(), SessionStatus::Unregistered);
    assert_eq!(h.store.current(), PersistedState::default());
}

#[tokio::test]
async fn test_plain_downstream_is_recorded() {
    let mut h = registered().await;

    let outcome = h
        .session
        .handle_event(downstream(&[("message", "hello")]))
        .await
        .unwrap();

    match outcome {
        EventOutcome::Downstream(message) => {
            assert_eq!(message.data.get("message").map(String::as_str), Some("hello"))
        }
        other => panic!("unexpected outcome {:?}", other),
    }
    assert!(h.session.state().last_downstream.is_some());
    assert_eq!(h.session.status(), SessionStatus::Registered);
}

#[tokio::test]
async fn test_token_invalidated_resets_session() {
    let mut h = registered().await;

    let outcome = h.session.handle_event(SdkEvent::TokenInvalidated).await.unwrap();

    assert_eq!(outcome, EventOutcome::Unregistered);
    assert_eq!(h.session.status(), SessionStatus::Unregistered);
    assert_eq!(h.store.current(), PersistedState::default());

    let outcome = h.session.handle_event(SdkEvent::TokenInvalidated).await.unwrap();
    assert_eq!(outcome, EventOutcome::Ignored);
}

#[tokio::test]
async fn test_token_invalidated_ignored_when_unregistered() {
    let mut h = harness();
    h.session
        .handle_event(downstream(&[("message", "hello")]))
        .await
        .unwrap();

    let outcome = h.session.handle_event(SdkEvent::TokenInvalidated).await.unwrap();

    assert_eq!(outcome, EventOutcome::Ignored);
    assert!(h.session.state().last_downstream.is_some());
}

#[tokio::test]
async fn test_token_refresh_reregisters() {
    let mut h = registered().await;

    let outcome = h
        .session
        .handle_event(SdkEvent::TokenRefreshed {
            token: "tok-rotated".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Registered);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-rotated"));
    assert_eq!(h.store.current().reg_token.as_deref(), Some("tok-rotated"));

    let request = h.app_server.last_request();
    assert_eq!(request.action, ClientAction::RegisterNewClient);
    assert_eq!(request.registration_token, "tok-rotated");
    assert_eq!(request.string_identifier.as_deref(), Some("deviceA"));
}

#[tokio::test]
async fn test_failed_token_refresh_is_not_restored() {
    let mut h = registered().await;
    h.app_server.script(Scripted::Fail(500));

    let err = h
        .session
        .handle_event(SdkEvent::TokenRefreshed {
            token: "tok-rotated".to_string(),
        })
        .await
        .unwrap_err();

    assert!(matches!(err, SessionError::AppServerRegistrationFailed(_)));
    assert_eq!(h.session.status(), SessionStatus::Unconfirmed);
    assert_eq!(h.session.state().token.as_deref(), Some("tok-rotated"));
    assert_eq!(h.store.current(), PersistedState::default());

    let restarted = RegistrationSession::restore(
        h.sdk.clone(),
        h.app_server.clone(),
        h.store.clone(),
        test_settings(),
    )
    .unwrap();
    assert_eq!(restarted.status(), SessionStatus::Unregistered);
    assert_eq!(restarted.state().token, None);
}

#[tokio::test]
async fn test_token_refresh_ignored_when_unregistered() {
    let mut h = harness();

    let outcome = h
        .session
        .handle_event(SdkEvent::TokenRefreshed {
            token: "tok-x".to_string(),
        })
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Ignored);
    assert!(h.app_server.requests().is_empty());
}

#[tokio::test]
async fn test_restore_from_store() {
    let sdk = FakeSdk::new();
    let app_server = FakeAppServer::new();
    let store = Arc::new(MemoryStore::with_state(PersistedState::registered(
        "tok-saved".to_string(),
        Some(SENDER_ID.to_string()),
        Some("deviceA".to_string()),
    )));

    let session =
        RegistrationSession::restore(sdk.clone(), app_server.clone(), store, test_settings())
            .unwrap();

    assert_eq!(session.status(), SessionStatus::Registered);
    assert_eq!(session.state().token.as_deref(), Some("tok-saved"));
    assert_eq!(session.state().sender_id.as_deref(), Some(SENDER_ID));
    assert!(sdk.calls().is_empty());
    assert!(app_server.requests().is_empty());
}

#[tokio::test]
async fn test_restore_ignores_incomplete_record() {
    let store = Arc::new(MemoryStore::with_state(PersistedState {
        registered: false,
        reg_token: Some("tok-half".to_string()),
        ..PersistedState::default()
    }));

    let session = RegistrationSession::restore(
        FakeSdk::new(),
        FakeAppServer::new(),
        store,
        test_settings(),
    )
    .unwrap();

    assert_eq!(session.status(), SessionStatus::Unregistered);
    assert!(session.state().token.is_none());
}

struct ReadOnlyStore;

impl StateStore for ReadOnlyStore {
    fn load(&self) -> Result<PersistedState, StoreError> {
        Ok(PersistedState::default())
    }

    fn save(&self, _state: &PersistedState) -> Result<(), StoreError> {
        Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only").into())
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

#[tokio::test]
async fn test_storage_failure_after_registration() {
    let mut session = RegistrationSession::new(
        FakeSdk::new(),
        FakeAppServer::new(),
        Arc::new(ReadOnlyStore),
        test_settings(),
    );

    let err = session.register(SENDER_ID, None).await.unwrap_err();

    assert!(matches!(err, SessionError::Storage(_)));
    assert_eq!(session.status(), SessionStatus::Registered);
    assert_eq!(session.state().token.as_deref(), Some("tok-1"));
}
