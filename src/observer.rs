//! Push-based delivery: observers, subscriptions and the task that drives them
//!
//! An [`Observer`] receives any number of `on_next` calls followed by at most
//! one terminal call (`on_error` or `on_completed`). Cancelling a
//! [`Subscription`] stops delivery without any terminal call.

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::pin_mut;
use futures_util::stream::StreamExt;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::{StreamError, StreamResult};

/// Receiver of the notifications of one event stream
#[async_trait]
pub trait Observer<T>: Send + 'static
where
    T: Send + 'static,
{
    async fn on_next(&mut self, item: T);

    async fn on_error(&mut self, error: StreamError);

    async fn on_completed(&mut self);
}

/// Observer that forwards notifications into a bounded channel.
///
/// Values and the failure become channel items; completion closes the
/// channel. A dropped receiver silently discards notifications.
pub struct ChannelObserver<T> {
    tx: Option<mpsc::Sender<StreamResult<T>>>,
}

impl<T> ChannelObserver<T> {
    pub fn new(tx: mpsc::Sender<StreamResult<T>>) -> Self {
        Self { tx: Some(tx) }
    }

    /// True once the receiving side is gone or a terminal signal was sent
    pub fn is_closed(&self) -> bool {
        self.tx.as_ref().map_or(true, |tx| tx.is_closed())
    }
}

#[async_trait]
impl<T> Observer<T> for ChannelObserver<T>
where
    T: Send + 'static,
{
    async fn on_next(&mut self, item: T) {
        if let Some(tx) = &self.tx {
            if tx.send(Ok(item)).await.is_err() {
                log::trace!("observer channel closed, dropping item");
            }
        }
    }

    async fn on_error(&mut self, error: StreamError) {
        if let Some(tx) = self.tx.take() {
            if tx.send(Err(error)).await.is_err() {
                log::trace!("observer channel closed, dropping failure");
            }
        }
    }

    async fn on_completed(&mut self) {
        self.tx.take();
    }
}

/// A live registration of an observer on a stream
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl Subscription {
    pub(crate) fn new(token: CancellationToken, handle: JoinHandle<()>) -> Self {
        Self {
            id: Uuid::new_v4(),
            token,
            handle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Request cooperative cancellation. No further notifications are
    /// delivered once the driving task observes it.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            log::debug!("cancelling subscription {}", self.id);
            self.token.cancel();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// True once the driving task has returned
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the driving task to return, either after a terminal
    /// notification or after cancellation.
    pub async fn join(self) -> Result<(), JoinError> {
        self.handle.await
    }
}

/// Subscribe `observer` to `source` on a spawned task.
///
/// The stream is polled until it ends, fails or the subscription is
/// cancelled; on cancellation the stream is dropped, which releases any
/// transport call it owns.
pub fn subscribe<T, S, O>(source: S, observer: O) -> Subscription
where
    T: Send + 'static,
    S: Stream<Item = StreamResult<T>> + Send + 'static,
    O: Observer<T>,
{
    let token = CancellationToken::new();
    let handle = tokio::spawn(drive(source, observer, token.clone()));
    Subscription::new(token, handle)
}

enum Step<T> {
    Cancelled,
    Item(Option<StreamResult<T>>),
}

async fn drive<T, S, O>(source: S, mut observer: O, token: CancellationToken)
where
    T: Send + 'static,
    S: Stream<Item = StreamResult<T>> + Send + 'static,
    O: Observer<T>,
{
    pin_mut!(source);

    loop {
        let step = tokio::select! {
            biased;
            _ = token.cancelled() => Step::Cancelled,
            item = source.next() => Step::Item(item),
        };

        match step {
            Step::Cancelled => {
                log::debug!("subscription cancelled, releasing source");
                return;
            }
            Step::Item(Some(Ok(item))) => observer.on_next(item).await,
            Step::Item(Some(Err(err))) => {
                observer.on_error(err).await;
                return;
            }
            Step::Item(None) => {
                observer.on_completed().await;
                return;
            }
        }
    }
}
