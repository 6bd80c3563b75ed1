//! Delivery of command side effects.
//!
//! Commands return an [`Outcome`]: their value plus the [`Effects`] they
//! produced. A [`Dispatcher`] pushes notifications through a [`Notifier`]
//! and spawns mail sends. Delivery is fire-and-forget: failures are logged
//! and never reach the command caller.

use std::future::Future;
use std::sync::Arc;

use opsboard_proto::event::{Delivery, Dispatch, Notification};
use opsboard_proto::operative::RoomId;
use tokio::task::JoinHandle;

use crate::mail::{MailNotice, Mailer};

/// Errors a notifier can report for a single delivery.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    /// The notification could not be encoded for the wire.
    #[error("failed to encode notification: {0}")]
    Encode(String),
    /// The notifier has shut down.
    #[error("notifier is closed")]
    Closed,
}

/// Real-time delivery to connected clients.
pub trait Notifier: Send + Sync {
    /// Sends to every connected client. Returns how many received it.
    fn broadcast(
        &self,
        notification: &Notification,
    ) -> impl Future<Output = Result<usize, NotifyError>> + Send;

    /// Sends to connections subscribed to `room`. Returns how many received it.
    fn send_to_room(
        &self,
        room: &RoomId,
        notification: &Notification,
    ) -> impl Future<Output = Result<usize, NotifyError>> + Send;
}

/// Side effects produced by a command, in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Effects {
    pub events: Vec<Dispatch>,
    pub mail: Vec<MailNotice>,
}

impl Effects {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues a notification for every connected client.
    pub fn broadcast(&mut self, notification: Notification) {
        self.events.push(Dispatch::broadcast(notification));
    }

    /// Queues a notification for one room.
    pub fn to_room(&mut self, room: RoomId, notification: Notification) {
        self.events.push(Dispatch::to_room(room, notification));
    }

    /// Queues a mail notice.
    pub fn mail(&mut self, notice: MailNotice) {
        self.mail.push(notice);
    }
}

/// A command result together with the effects it produced.
#[derive(Debug, Clone)]
pub struct Outcome<T> {
    pub value: T,
    pub effects: Effects,
}

impl<T> Outcome<T> {
    #[must_use]
    pub const fn new(value: T, effects: Effects) -> Self {
        Self { value, effects }
    }

    /// Splits into value and effects.
    pub fn into_parts(self) -> (T, Effects) {
        (self.value, self.effects)
    }
}

/// Summary of one [`Dispatcher::deliver`] call.
#[derive(Debug, Default)]
pub struct DeliveryReport {
    /// Total connections that received a notification.
    pub delivered: usize,
    /// Notifications the notifier rejected.
    pub failed: usize,
    /// Background mail sends, for callers that want to wait on them.
    pub mail: Vec<JoinHandle<()>>,
}

/// Consumes [`Effects`] and delivers them.
pub struct Dispatcher<N, M> {
    notifier: Arc<N>,
    mailer: Arc<M>,
}

impl<N, M> Clone for Dispatcher<N, M> {
    fn clone(&self) -> Self {
        Self {
            notifier: Arc::clone(&self.notifier),
            mailer: Arc::clone(&self.mailer),
        }
    }
}

impl<N, M> Dispatcher<N, M>
where
    N: Notifier,
    M: Mailer,
{
    /// Creates a dispatcher over the given collaborators.
    #[must_use]
    pub const fn new(notifier: Arc<N>, mailer: Arc<M>) -> Self {
        Self { notifier, mailer }
    }

    /// Delivers notifications in order, then spawns mail sends.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn deliver(&self, effects: Effects) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        for dispatch in effects.events {
            let name = dispatch.notification.name();
            let result = match &dispatch.delivery {
                Delivery::Broadcast => self.notifier.broadcast(&dispatch.notification).await,
                Delivery::Room(room) => {
                    self.notifier
                        .send_to_room(room, &dispatch.notification)
                        .await
                }
            };
            match result {
                Ok(count) => {
                    tracing::debug!(event = name, delivery = ?dispatch.delivery, count, "notification delivered");
                    report.delivered += count;
                }
                Err(e) => {
                    tracing::warn!(event = name, error = %e, "notification delivery failed");
                    report.failed += 1;
                }
            }
        }

        for notice in effects.mail {
            let mailer = Arc::clone(&self.mailer);
            report.mail.push(tokio::spawn(async move {
                match mailer.send(&notice).await {
                    Ok(()) => tracing::info!(to = %notice.to, kind = ?notice.kind, "mail notice sent"),
                    Err(e) => {
                        tracing::warn!(to = %notice.to, error = %e, "mail notice failed");
                    }
                }
            }));
        }

        report
    }

    /// Delivers the effects of `outcome` and returns its value.
    pub async fn settle<T>(&self, outcome: Outcome<T>) -> T {
        let (value, effects) = outcome.into_parts();
        self.deliver(effects).await;
        value
    }
}
