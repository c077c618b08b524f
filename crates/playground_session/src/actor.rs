//! Single-task owner of a [`RegistrationSession`].
//!
//! User actions and SDK callbacks reach the session as [`SessionCommand`]s on
//! one mpsc channel, so they are applied strictly in arrival order. The actor
//! also watches the deadline of the pending app-server exchange and fails it
//! when it passes. Status changes, downstream messages and warnings are
//! published on a broadcast channel for whoever displays the session.

use serde::Serialize;
use serde_json::Value;
use std::future;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use crate::error::SessionError;
use crate::models::DownstreamMessage;
use crate::sdk::SdkEvent;
use crate::session::{EventOutcome, RegistrationSession, SubscriptionOutcome};
use crate::state::{SessionSnapshot, SessionStatus};

const COMMAND_BUFFER: usize = 32;
const NOTICE_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, SessionError>>;

/// Work for the actor; every variant answers on its own oneshot.
#[derive(Debug)]
pub enum SessionCommand {
    Register {
        sender_id: String,
        client_label: Option<String>,
        respond_to: Reply<SessionStatus>,
    },
    Unregister {
        respond_to: Reply<SessionStatus>,
    },
    SendUpstream {
        payload: Value,
        respond_to: Reply<String>,
    },
    SendUpstreamRaw {
        payload: String,
        respond_to: Reply<String>,
    },
    Subscribe {
        topic: String,
        respond_to: Reply<SubscriptionOutcome>,
    },
    Unsubscribe {
        topic: String,
        respond_to: Reply<()>,
    },
    Event {
        event: SdkEvent,
        respond_to: Reply<EventOutcome>,
    },
    Snapshot {
        respond_to: oneshot::Sender<SessionSnapshot>,
    },
}

/// Published after anything visible happened to the session.
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionNotice {
    StatusChanged { status: SessionStatus },
    Downstream { message: DownstreamMessage },
    Warning { message: String },
}

pub struct SessionActor {
    session: RegistrationSession,
    receiver: mpsc::Receiver<SessionCommand>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionActor {
    /// Moves `session` into a new task and returns the handle that drives it.
    ///
    /// The task ends once every handle is dropped.
    pub fn spawn(session: RegistrationSession) -> (SessionHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(COMMAND_BUFFER);
        let (notices, _) = broadcast::channel(NOTICE_BUFFER);

        let actor = Self {
            session,
            receiver,
            notices: notices.clone(),
        };
        let task = tokio::spawn(actor.run());
        (SessionHandle { sender, notices }, task)
    }

    async fn run(mut self) {
        info!("Session actor starting ({})", self.session.status());

        loop {
            let deadline = self.session.pending_deadline();
            tokio::select! {
                command = self.receiver.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                _ = wait_for(deadline) => self.expire_pending(),
            }
        }

        info!("Session actor stopped ({})", self.session.status());
    }

    async fn handle_command(&mut self, command: SessionCommand) {
        let before = self.session.status();

        match command {
            SessionCommand::Register {
                sender_id,
                client_label,
                respond_to,
            } => {
                let result = self
                    .session
                    .register(&sender_id, client_label.as_deref())
                    .await;
                self.answer(respond_to, result);
            }
            SessionCommand::Unregister { respond_to } => {
                let result = self.session.unregister().await;
                self.answer(respond_to, result);
            }
            SessionCommand::SendUpstream {
                payload,
                respond_to,
            } => {
                let result = self.session.send_upstream(payload).await;
                self.answer(respond_to, result);
            }
            SessionCommand::SendUpstreamRaw {
                payload,
                respond_to,
            } => {
                let result = self.session.send_upstream_raw(&payload).await;
                self.answer(respond_to, result);
            }
            SessionCommand::Subscribe { topic, respond_to } => {
                let result = self.session.subscribe_topic(&topic).await;
                self.answer(respond_to, result);
            }
            SessionCommand::Unsubscribe { topic, respond_to } => {
                let result = self.session.unsubscribe_topic(&topic).await;
                self.answer(respond_to, result);
            }
            SessionCommand::Event { event, respond_to } => {
                let result = self.session.handle_event(event).await;
                if let Ok(EventOutcome::Downstream(message)) = &result {
                    self.publish(SessionNotice::Downstream {
                        message: message.clone(),
                    });
                }
                self.answer(respond_to, result);
            }
            SessionCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(self.session.snapshot());
            }
        }

        self.publish_status_change(before);
    }

    fn expire_pending(&mut self) {
        let before = self.session.status();
        if let Some(err) = self.session.expire_pending(Instant::now()) {
            self.publish(SessionNotice::Warning {
                message: err.to_string(),
            });
        }
        self.publish_status_change(before);
    }

    fn answer<T>(&self, respond_to: Reply<T>, result: Result<T, SessionError>) {
        if let Err(err) = &result {
            if err.is_warning() {
                self.publish(SessionNotice::Warning {
                    message: err.to_string(),
                });
            }
        }
        // The caller may have given up waiting.
        let _ = respond_to.send(result);
    }

    fn publish_status_change(&self, before: SessionStatus) {
        let status = self.session.status();
        if status != before {
            debug!("Session status {} -> {}", before, status);
            self.publish(SessionNotice::StatusChanged { status });
        }
    }

    fn publish(&self, notice: SessionNotice) {
        // No subscribers is fine.
        let _ = self.notices.send(notice);
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => future::pending().await,
    }
}

/// Cloneable front end of a running [`SessionActor`].
#[derive(Debug, Clone)]
pub struct SessionHandle {
    sender: mpsc::Sender<SessionCommand>,
    notices: broadcast::Sender<SessionNotice>,
}

impl SessionHandle {
    pub async fn register(
        &self,
        sender_id: impl Into<String>,
        client_label: Option<String>,
    ) -> Result<SessionStatus, SessionError> {
        let sender_id = sender_id.into();
        self.request(|respond_to| SessionCommand::Register {
            sender_id,
            client_label,
            respond_to,
        })
        .await
    }

    pub async fn unregister(&self) -> Result<SessionStatus, SessionError> {
        self.request(|respond_to| SessionCommand::Unregister { respond_to })
            .await
    }

    pub async fn send_upstream(&self, payload: Value) -> Result<String, SessionError> {
        self.request(|respond_to| SessionCommand::SendUpstream {
            payload,
            respond_to,
        })
        .await
    }

    pub async fn send_upstream_raw(&self, payload: impl Into<String>) -> Result<String, SessionError> {
        let payload = payload.into();
        self.request(|respond_to| SessionCommand::SendUpstreamRaw {
            payload,
            respond_to,
        })
        .await
    }

    pub async fn subscribe_topic(
        &self,
        topic: impl Into<String>,
    ) -> Result<SubscriptionOutcome, SessionError> {
        let topic = topic.into();
        self.request(|respond_to| SessionCommand::Subscribe { topic, respond_to })
            .await
    }

    pub async fn unsubscribe_topic(&self, topic: impl Into<String>) -> Result<(), SessionError> {
        let topic = topic.into();
        self.request(|respond_to| SessionCommand::Unsubscribe { topic, respond_to })
            .await
    }

    /// Feeds an SDK callback to the session and waits until it is applied.
    pub async fn deliver_event(&self, event: SdkEvent) -> Result<EventOutcome, SessionError> {
        self.request(|respond_to| SessionCommand::Event { event, respond_to })
            .await
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(SessionCommand::Snapshot { respond_to })
            .await
            .map_err(|_| SessionError::ActorClosed)?;
        response.await.map_err(|_| SessionError::ActorClosed)
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<SessionNotice> {
        self.notices.subscribe()
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(Reply<T>) -> SessionCommand,
    ) -> Result<T, SessionError> {
        let (respond_to, response) = oneshot::channel();
        if self.sender.send(command(respond_to)).await.is_err() {
            warn!("Session actor is gone, dropping command");
            return Err(SessionError::ActorClosed);
        }
        response.await.map_err(|_| SessionError::ActorClosed)?
    }
}
