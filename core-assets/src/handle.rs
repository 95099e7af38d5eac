//! Message channel into a running worker.
//!
//! The worker owns its state on its own task; the application only posts
//! events and awaits replies. Lifecycle events are handled in arrival
//! order. Fetches and notification events run concurrently with each other.

use bridge_traits::http::HttpMethod;
use bridge_traits::notification::NativeNotification;
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::error::{AssetError, Result};
use crate::worker::{AssetCacheWorker, FetchOutcome, WorkerState};

const QUEUE_DEPTH: usize = 64;

enum WorkerMessage {
    Install(oneshot::Sender<Result<usize>>),
    Activate(oneshot::Sender<Result<Vec<String>>>),
    State(oneshot::Sender<WorkerState>),
    Fetch {
        method: HttpMethod,
        url: String,
        reply: oneshot::Sender<Result<FetchOutcome>>,
    },
    Push {
        data: Option<Bytes>,
        reply: oneshot::Sender<Result<NativeNotification>>,
    },
    Click {
        notification: NativeNotification,
        reply: oneshot::Sender<Result<()>>,
    },
}

/// Cloneable sender side of a spawned worker. The worker task exits once
/// every handle is dropped.
#[derive(Clone)]
pub struct WorkerHandle {
    sender: mpsc::Sender<WorkerMessage>,
}

impl WorkerHandle {
    /// Move `worker` onto its own task. Must be called within a tokio
    /// runtime.
    pub fn spawn(worker: AssetCacheWorker) -> Self {
        let (sender, receiver) = mpsc::channel(QUEUE_DEPTH);
        tokio::spawn(run(Arc::new(worker), receiver));
        Self { sender }
    }

    pub async fn install(&self) -> Result<usize> {
        self.call(WorkerMessage::Install).await?
    }

    pub async fn activate(&self) -> Result<Vec<String>> {
        self.call(WorkerMessage::Activate).await?
    }

    pub async fn state(&self) -> Result<WorkerState> {
        self.call(WorkerMessage::State).await
    }

    pub async fn fetch(&self, method: HttpMethod, url: impl Into<String>) -> Result<FetchOutcome> {
        let url = url.into();
        self.call(|reply| WorkerMessage::Fetch { method, url, reply })
            .await?
    }

    pub async fn push(&self, data: Option<Bytes>) -> Result<NativeNotification> {
        self.call(|reply| WorkerMessage::Push { data, reply }).await?
    }

    pub async fn notification_click(&self, notification: NativeNotification) -> Result<()> {
        self.call(|reply| WorkerMessage::Click {
            notification,
            reply,
        })
        .await?
    }

    async fn call<T>(
        &self,
        message: impl FnOnce(oneshot::Sender<T>) -> WorkerMessage,
    ) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(message(reply))
            .await
            .map_err(|_| AssetError::WorkerStopped)?;
        response.await.map_err(|_| AssetError::WorkerStopped)
    }
}

async fn run(worker: Arc<AssetCacheWorker>, mut receiver: mpsc::Receiver<WorkerMessage>) {
    while let Some(message) = receiver.recv().await {
        match message {
            WorkerMessage::Install(reply) => {
                let _ = reply.send(worker.install().await);
            }
            WorkerMessage::Activate(reply) => {
                let _ = reply.send(worker.activate().await);
            }
            WorkerMessage::State(reply) => {
                let _ = reply.send(worker.state());
            }
            WorkerMessage::Fetch { method, url, reply } => {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let _ = reply.send(worker.fetch(method, &url).await);
                });
            }
            WorkerMessage::Push { data, reply } => {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let _ = reply.send(worker.on_push(data.as_deref()).await);
                });
            }
            WorkerMessage::Click {
                notification,
                reply,
            } => {
                let worker = Arc::clone(&worker);
                tokio::spawn(async move {
                    let _ = reply.send(worker.on_notification_click(&notification).await);
                });
            }
        }
    }
    debug!("Asset worker stopped");
}
