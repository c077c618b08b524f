
use fixtures::*;
use playground_session::{
    EventOutcome, MemoryStore, SessionActor, SessionError, SessionNotice, SessionStatus,
};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test]
async fn test_actor_register_publishes_status() {
    let sdk = FakeSdk::new();
    let session = build_session(&sdk, &FakeAppServer::new(), &Arc::new(MemoryStore::new()));
    let (handle, _task) = SessionActor::spawn(session);
    let mut notices = handle.subscribe_notices();

    let status = handle
        .register(SENDER_ID, Some("deviceA".to_string()))
        .await
        .unwrap();

    assert_eq!(status, SessionStatus::Registered);
    assert_eq!(
        notices.recv().await.unwrap(),
        SessionNotice::StatusChanged {
            status: SessionStatus::Registered
        }
    );

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.token.as_deref(), Some("tok-1"));
    assert_eq!(snapshot.client_label.as_deref(), Some("deviceA"));
}

#[tokio::test]
async fn test_actor_applies_tunnelled_reply() {
    let app_server = FakeAppServer::new();
    app_server.script(Scripted::AwaitReply);
    let session = build_session(&FakeSdk::new(), &app_server, &Arc::new(MemoryStore::new()));
    let (handle, _task) = SessionActor::spawn(session);

    let status = handle.register(SENDER_ID, None).await.unwrap();
    assert_eq!(status, SessionStatus::Registering);

    let correlation_id = app_server.last_request().correlation_id;
    let outcome = handle
        .deliver_event(reply("register_new_client", "registered", &correlation_id))
        .await
        .unwrap();

    assert_eq!(outcome, EventOutcome::Registered);
    assert_eq!(
        handle.snapshot().await.unwrap().status,
        SessionStatus::Registered
    );
}

#[tokio::test(start_paused = true)]
async fn test_actor_expires_unanswered_registration() {
    let app_server = FakeAppServer::new();
    app_server.script(Scripted::AwaitReply);
    let session = build_session(&FakeSdk::new(), &app_server, &Arc::new(MemoryStore::new()));
    let (handle, _task) = SessionActor::spawn(session);
    let mut notices = handle.subscribe_notices();

    handle.register(SENDER_ID, None).await.unwrap();
    assert_eq!(
        notices.recv().await.unwrap(),
        SessionNotice::StatusChanged {
            status: SessionStatus::Registering
        }
    );

    tokio::time::sleep(Duration::from_secs(6)).await;

    assert!(matches!(
        notices.recv().await.unwrap(),
        SessionNotice::Warning { .. }
    ));
    assert_eq!(
        notices.recv().await.unwrap(),
        SessionNotice::StatusChanged {
            status: SessionStatus::Unconfirmed
        }
    );
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Unconfirmed);
    assert_eq!(snapshot.token.as_deref(), Some("tok-1"));
}

#[tokio::test]
async fn test_actor_forwards_downstream_messages() {
    let sdk = FakeSdk::new();
    let session = build_session(&sdk, &FakeAppServer::new(), &Arc::new(MemoryStore::new()));
    let (handle, _task) = SessionActor::spawn(session);
    let mut notices = handle.subscribe_notices();

    handle
        .deliver_event(downstream(&[("message", "hello")]))
        .await
        .unwrap();

    match notices.recv().await.unwrap() {
        SessionNotice::Downstream { message } => {
            assert_eq!(message.data["message"], "hello")
        }
        other => panic!("unexpected notice {:?}", other),
    }
}

#[tokio::test]
async fn test_closed_actor_reports_error() {
    let session = build_session(
        &FakeSdk::new(),
        &FakeAppServer::new(),
        &Arc::new(MemoryStore::new()),
    );
    let (handle, task) = SessionActor::spawn(session);
    task.abort();
    let _ = task.await;

    assert_eq!(
        handle.unregister().await.unwrap_err(),
        SessionError::ActorClosed
    );
    assert_eq!(handle.snapshot().await.unwrap_err(), SessionError::ActorClosed);
}
