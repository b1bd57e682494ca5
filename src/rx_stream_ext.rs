use futures_core::Stream;
use futures_util::stream::StreamExt;
use std::future::Future;
use std::time::Duration;

use crate::error::StreamResult;
use crate::observer::{self, Observer, Subscription};
use crate::rx::{ordered_concurrent_flat_map, ordered_concurrent_map, retry_after_delay, EventStream};

/// Extension trait providing the event-stream operators as methods
pub trait RxStreamExt<T>: Stream<Item = StreamResult<T>> + Sized + Send + 'static
where
    T: Send + 'static,
{
    /// Ordered, concurrency-bounded async map. See [`ordered_concurrent_map`].
    fn ordered_concurrent_map_rx<U, F, Fut>(
        self,
        max_concurrency: Option<usize>,
        transform: F,
    ) -> EventStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> Fut + Send + 'static,
        Fut: Future<Output = StreamResult<U>> + Send + 'static,
    {
        ordered_concurrent_map(self.boxed(), max_concurrency, transform)
    }

    /// Ordered, concurrency-bounded flat map. See [`ordered_concurrent_flat_map`].
    fn ordered_concurrent_flat_map_rx<U, F, S>(
        self,
        max_concurrency: Option<usize>,
        transform: F,
    ) -> EventStream<U>
    where
        U: Send + 'static,
        F: FnMut(T) -> S + Send + 'static,
        S: Stream<Item = StreamResult<U>> + Send + 'static,
    {
        ordered_concurrent_flat_map(self.boxed(), max_concurrency, transform)
    }

    /// Use this stream for the first attempt and `factory` for every
    /// resubscription after a failure. See [`retry_after_delay`].
    fn retry_after_delay_rx<F, S>(self, delay: Duration, mut factory: F) -> EventStream<T>
    where
        F: FnMut() -> S + Send + 'static,
        S: Stream<Item = StreamResult<T>> + Send + 'static,
    {
        let mut first = Some(self.boxed());
        retry_after_delay(
            move || match first.take() {
                Some(stream) => stream,
                None => factory().boxed(),
            },
            delay,
        )
    }

    /// Drive this stream into `observer` on a spawned task
    fn subscribe_rx<O>(self, observer: O) -> Subscription
    where
        O: Observer<T>,
    {
        observer::subscribe(self, observer)
    }
}

impl<T, S> RxStreamExt<T> for S
where
    S: Stream<Item = StreamResult<T>> + Sized + Send + 'static,
    T: Send + 'static,
{
}
