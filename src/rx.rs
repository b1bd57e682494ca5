//! Event streams and the operators layered on them
//!
//! An [`EventStream`] is a boxed stream of `StreamResult` items. `Ok` items
//! are values; an `Err` item is the failure signal and is always the last
//! item; the stream ending without an `Err` is normal completion.

use async_stream::stream;
use futures::stream::FuturesUnordered;
use futures_core::Stream;
use futures_util::pin_mut;
use futures_util::{
    future,
    stream::{self, BoxStream, StreamExt, TryStreamExt},
};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{StreamError, StreamResult};
use crate::reorder_buffer::ReorderBuffer;

/// A boxed, push-terminated stream of values with at most one failure
pub type EventStream<T> = BoxStream<'static, StreamResult<T>>;

// ================================
// Constructors
// ================================

/// Emit a single value and complete
pub fn emit<T>(item: T) -> EventStream<T>
where
    T: Send + 'static,
{
    stream::once(future::ready(Ok(item))).boxed()
}

/// Complete immediately without values
pub fn empty<T>() -> EventStream<T>
where
    T: Send + 'static,
{
    stream::empty().boxed()
}

/// Fail immediately
pub fn fail<T>(error: StreamError) -> EventStream<T>
where
    T: Send + 'static,
{
    stream::once(future::ready(Err(error))).boxed()
}

/// Emit every value of an iterator, then complete
pub fn from_iter<I, T>(iter: I) -> EventStream<T>
where
    I: IntoIterator<Item = T> + Send + 'static,
    <I as IntoIterator>::IntoIter: Send,
    T: Send + 'static,
{
    stream::iter(iter.into_iter().map(Ok)).boxed()
}

/// Lift an infallible stream into an event stream
pub fn from_values<S, T>(values: S) -> EventStream<T>
where
    S: Stream<Item = T> + Send + 'static,
    T: Send + 'static,
{
    values.map(Ok).boxed()
}

/// Emit a single value after a delay
pub fn emit_after<T>(item: T, duration: Duration) -> EventStream<T>
where
    T: Send + 'static,
{
    stream::once(async move {
        sleep(duration).await;
        Ok(item)
    })
    .boxed()
}

// ================================
// Ordered concurrent mapping
// ================================

enum MapStep<T, U> {
    Completed(usize, StreamResult<U>),
    Source(Option<StreamResult<T>>),
}

/// Run `transform` over every element with at most `max_concurrency`
/// transforms in flight, emitting results in source order.
///
/// Each source element gets a sequence index on arrival. Completed results
/// whose index is ahead of the emission cursor wait in a [`ReorderBuffer`]
/// until every earlier result has been emitted. `None` means unbounded; a
/// bound of zero is treated as one.
///
/// The bound applies to running transforms, not to buffered results: while
/// the element at the cursor is slow, finished successors keep freeing slots
/// and the buffer can grow past the bound.
///
/// The output completes once the source has completed and every launched
/// transform has been emitted. A failing transform or source terminates the
/// output with that error; transforms still in flight are abandoned.
///
/// # Examples
/// ```
/// use rx_rpc_stream::rx::*;
/// use futures_util::stream::StreamExt;
/// use std::time::Duration;
///
/// # async fn example() {
/// let output = ordered_concurrent_map(from_iter(vec![1u64, 2, 3]), Some(3), |i| async move {
///     tokio::time::sleep(Duration::from_millis(30 - i * 10)).await;
///     Ok(i * 10)
/// });
/// let result = output.collect::<Vec<_>>().await;
/// assert_eq!(result, vec![Ok(10), Ok(20), Ok(30)]);
/// # }
/// ```
pub fn ordered_concurrent_map<T, U, F, Fut>(
    source: EventStream<T>,
    max_concurrency: Option<usize>,
    mut transform: F,
) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> Fut + Send + 'static,
    Fut: Future<Output = StreamResult<U>> + Send + 'static,
{
    let limit = max_concurrency.unwrap_or(usize::MAX).max(1);

    stream! {
        let mut source = source;
        let mut in_flight = FuturesUnordered::new();
        let mut reorder = ReorderBuffer::new();
        let mut next_index: usize = 0;
        let mut source_done = false;

        loop {
            if source_done && in_flight.is_empty() {
                break;
            }
            let can_pull = !source_done && in_flight.len() < limit;

            let step = tokio::select! {
                biased;
                Some((index, result)) = in_flight.next(), if !in_flight.is_empty() => {
                    MapStep::Completed(index, result)
                },
                item = source.next(), if can_pull => MapStep::Source(item),
            };

            match step {
                MapStep::Completed(index, Ok(value)) => {
                    for ready in reorder.complete(index, value) {
                        yield Ok(ready);
                    }
                }
                MapStep::Completed(index, Err(err)) => {
                    log::warn!(
                        "transform for element {} failed, abandoning {} in flight: {}",
                        index,
                        in_flight.len(),
                        err
                    );
                    yield Err(err);
                    break;
                }
                MapStep::Source(Some(Ok(item))) => {
                    let index = next_index;
                    next_index += 1;
                    let fut = transform(item);
                    in_flight.push(async move { (index, fut.await) });
                }
                MapStep::Source(Some(Err(err))) => {
                    yield Err(err);
                    break;
                }
                MapStep::Source(None) => {
                    log::trace!("source completed after {} elements", next_index);
                    source_done = true;
                }
            }
        }

        log::trace!(
            "ordered map finished at cursor {}, reorder high-water mark {}",
            reorder.cursor(),
            reorder.high_water_mark()
        );
    }
    .boxed()
}

/// Stream-producing form of [`ordered_concurrent_map`].
///
/// Every inner stream is run to completion and its values are emitted
/// contiguously, in the order of the source elements that produced them.
pub fn ordered_concurrent_flat_map<T, U, F, S>(
    source: EventStream<T>,
    max_concurrency: Option<usize>,
    mut transform: F,
) -> EventStream<U>
where
    T: Send + 'static,
    U: Send + 'static,
    F: FnMut(T) -> S + Send + 'static,
    S: Stream<Item = StreamResult<U>> + Send + 'static,
{
    ordered_concurrent_map(source, max_concurrency, move |item| {
        transform(item).try_collect::<Vec<U>>()
    })
    .flat_map(|batch| match batch {
        Ok(values) => stream::iter(values.into_iter().map(Ok)).boxed(),
        Err(err) => stream::once(future::ready(Err(err))).boxed(),
    })
    .boxed()
}

// ================================
// Retry
// ================================

/// Resubscribe to a fresh source after every failure, forever.
///
/// The first subscription starts immediately; each later one waits `delay`.
/// Values are forwarded as they arrive, failures are logged and swallowed,
/// and normal completion of any attempt completes the output. A source that
/// always fails yields an endless series of attempts; bound it by dropping
/// the stream or cancelling its subscription.
pub fn retry_after_delay<T, F, S>(mut factory: F, delay: Duration) -> EventStream<T>
where
    T: Send + 'static,
    F: FnMut() -> S + Send + 'static,
    S: Stream<Item = StreamResult<T>> + Send + 'static,
{
    stream! {
        let mut attempt: u64 = 0;

        loop {
            if attempt > 0 {
                sleep(delay).await;
            }
            attempt += 1;
            log::debug!("subscribing to source, attempt {}", attempt);

            let source = factory();
            pin_mut!(source);

            let mut failure = None;
            while let Some(item) = source.next().await {
                match item {
                    Ok(value) => yield Ok(value),
                    Err(err) => {
                        failure = Some(err);
                        break;
                    }
                }
            }

            match failure {
                None => break,
                Some(err) => log::warn!(
                    "attempt {} failed: {}; resubscribing in {:?}",
                    attempt,
                    err,
                    delay
                ),
            }
        }
    }
    .boxed()
}

// Re-export the extension trait
pub use crate::rx_stream_ext::RxStreamExt;
