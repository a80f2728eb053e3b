//! Per-chat update queues.
//!
//! Updates from one chat are handled one at a time, in arrival order, by a
//! single worker task. Chats do not wait for each other. A worker that stays
//! idle for `idle_timeout` removes its queue and exits; the next update from
//! that chat starts a fresh one.

use dashmap::DashMap;
use insurance_flow::{Dispatcher, InboundMessage, UserId};
use std::{sync::Arc, time::Duration};
use tokio::sync::mpsc::{self, UnboundedSender, error::SendError};
use tracing::{Instrument, Span, debug, info_span, warn};
use uuid::Uuid;

use super::Update;

const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

struct Job {
    message: InboundMessage,
    span: Span,
}

/// Entry point for every update, whether it came from polling or the webhook.
#[derive(Clone)]
pub struct UpdateQueue {
    dispatcher: Dispatcher,
    chats: Arc<DashMap<UserId, UnboundedSender<Job>>>,
    idle_timeout: Duration,
}

impl UpdateQueue {
    pub fn new(dispatcher: Dispatcher) -> Self {
        Self::with_idle_timeout(dispatcher, DEFAULT_IDLE_TIMEOUT)
    }

    pub fn with_idle_timeout(dispatcher: Dispatcher, idle_timeout: Duration) -> Self {
        Self {
            dispatcher,
            chats: Arc::new(DashMap::new()),
            idle_timeout,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Chats that currently have a worker.
    pub fn active_chats(&self) -> usize {
        self.chats.len()
    }

    /// Queue `update` behind any earlier updates from the same chat.
    pub fn enqueue(&self, update: Update) {
        let correlation_id = Uuid::new_v4().to_string();
        let span = info_span!(
            "update",
            update_id = update.update_id,
            correlation_id = %correlation_id
        );

        let Some(message) = update.message.as_ref().and_then(|m| m.to_inbound()) else {
            span.in_scope(|| debug!("ignoring update without text or photo"));
            return;
        };

        let user_id = message.user_id.clone();
        let job = Job { message, span };

        // The shard lock held by `entry` orders this send against a worker retiring.
        let mut sender = self
            .chats
            .entry(user_id.clone())
            .or_insert_with(|| self.spawn_worker(user_id.clone()));
        if let Err(SendError(job)) = sender.send(job) {
            warn!(user_id = %user_id, "chat worker died, starting a new one");
            *sender = self.spawn_worker(user_id.clone());
            if sender.send(job).is_err() {
                warn!(user_id = %user_id, "dropping update, chat worker unavailable");
            }
        }
    }

    fn spawn_worker(&self, user_id: UserId) -> UnboundedSender<Job> {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let dispatcher = self.dispatcher.clone();
        let chats = Arc::clone(&self.chats);
        let idle_timeout = self.idle_timeout;

        tokio::spawn(async move {
            loop {
                match tokio::time::timeout(idle_timeout, receiver.recv()).await {
                    Ok(Some(job)) => {
                        // The dispatcher already logged and apologized.
                        let _ = dispatcher.handle(job.message).instrument(job.span).await;
                    }
                    Ok(None) => break,
                    Err(_) => {
                        if chats
                            .remove_if(&user_id, |_, _| receiver.is_empty())
                            .is_some()
                        {
                            debug!(user_id = %user_id, "chat worker retired");
                            break;
                        }
                    }
                }
            }
        });

        sender
    }
}
