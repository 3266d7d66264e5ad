use core::pin::Pin;
use core::task::{Context, Poll};
use std::time::Duration;

use config::shared::BatchConfig;
use futures::future::BoxFuture;
use futures::{Future, FutureExt, Stream, ready};
use pin_project_lite::pin_project;
use tracing::info;

use crate::concurrency::shutdown::{ShutdownResult, ShutdownRx};

/// Groups `source` into batches of at most `max_size` items.
///
/// A batch is emitted as soon as `max_size` items are pending, or once `max_fill` has elapsed
/// since the first item of the pending batch arrived. Empty batches are never emitted. When
/// `source` ends, a non-empty partial batch is flushed and the stream ends. A `max_size` of zero
/// is treated as one.
pub fn take<S: Stream>(source: S, max_size: usize, max_fill: Duration) -> BatchStream<S> {
    BatchStream::new(source, max_size, max_fill, None)
}

// Polling structure follows tokio-stream's `chunks_timeout`, with the timer armed on the first
// pending item instead of at batch start.
pin_project! {
    /// Stream adapter produced by [`take`] and [`BatchStream::wrap`].
    ///
    /// Yields [`ShutdownResult::Ok`] for regular batches. When wrapped with a shutdown receiver
    /// and shutdown is requested, yields the pending items once as
    /// [`ShutdownResult::Shutdown`] (possibly empty) and ends.
    #[must_use = "streams do nothing unless polled"]
    pub struct BatchStream<S: Stream> {
        #[pin]
        stream: S,
        #[pin]
        deadline: Option<tokio::time::Sleep>,
        shutdown: Option<BoxFuture<'static, ()>>,
        items: Vec<S::Item>,
        max_size: usize,
        max_fill: Duration,
        inner_stream_ended: bool,
        stream_stopped: bool,
    }
}

impl<S: Stream> BatchStream<S> {
    /// Creates a [`BatchStream`] sized by `batch_config` that also stops on shutdown.
    pub fn wrap(stream: S, batch_config: &BatchConfig, shutdown_rx: ShutdownRx) -> Self {
        let shutdown = wait_for_shutdown(shutdown_rx);

        Self::new(
            stream,
            batch_config.max_size,
            Duration::from_millis(batch_config.max_fill_ms),
            Some(shutdown),
        )
    }

    fn new(
        stream: S,
        max_size: usize,
        max_fill: Duration,
        shutdown: Option<BoxFuture<'static, ()>>,
    ) -> Self {
        let max_size = max_size.max(1);

        Self {
            stream,
            deadline: None,
            shutdown,
            items: Vec::with_capacity(max_size),
            max_size,
            max_fill,
            inner_stream_ended: false,
            stream_stopped: false,
        }
    }
}

/// Resolves once a shutdown is signalled. A dropped sender never resolves.
fn wait_for_shutdown(mut shutdown_rx: ShutdownRx) -> BoxFuture<'static, ()> {
    async move {
        if shutdown_rx.changed().await.is_err() {
            futures::future::pending::<()>().await;
        }
    }
    .boxed()
}

impl<S: Stream> Stream for BatchStream<S> {
    type Item = ShutdownResult<Vec<S::Item>, Vec<S::Item>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let mut this = self.project();

        if *this.inner_stream_ended || *this.stream_stopped {
            return Poll::Ready(None);
        }

        loop {
            // Shutdown takes priority over everything else.
            if let Some(shutdown) = this.shutdown.as_mut() {
                if shutdown.as_mut().poll(cx).is_ready() {
                    info!(
                        pending_items = this.items.len(),
                        "batch stream stopped due to shutdown signal"
                    );

                    *this.stream_stopped = true;
                    *this.shutdown = None;
                    this.deadline.set(None);

                    return Poll::Ready(Some(ShutdownResult::Shutdown(std::mem::take(
                        this.items,
                    ))));
                }
            }

            match this.stream.as_mut().poll_next(cx) {
                Poll::Pending => break,
                Poll::Ready(Some(item)) => {
                    if this.items.is_empty() {
                        this.deadline
                            .set(Some(tokio::time::sleep(*this.max_fill)));
                        this.items.reserve_exact(*this.max_size);
                    }

                    this.items.push(item);

                    if this.items.len() >= *this.max_size {
                        this.deadline.set(None);
                        return Poll::Ready(Some(ShutdownResult::Ok(std::mem::take(this.items))));
                    }
                }
                Poll::Ready(None) => {
                    *this.inner_stream_ended = true;
                    this.deadline.set(None);

                    if this.items.is_empty() {
                        return Poll::Ready(None);
                    }

                    return Poll::Ready(Some(ShutdownResult::Ok(std::mem::take(this.items))));
                }
            }
        }

        if this.items.is_empty() {
            return Poll::Pending;
        }

        if let Some(deadline) = this.deadline.as_mut().as_pin_mut() {
            ready!(deadline.poll(cx));
        }
        this.deadline.set(None);

        Poll::Ready(Some(ShutdownResult::Ok(std::mem::take(this.items))))
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use futures::future::poll_fn;
    use tokio::sync::mpsc;

    use super::*;
    use crate::concurrency::shutdown::create_shutdown_channel;

    fn channel_stream(rx: mpsc::UnboundedReceiver<i32>) -> impl Stream<Item = i32> {
        futures::stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|i| (i, rx)) })
    }

    fn expect_ok<T: std::fmt::Debug>(batch: Option<ShutdownResult<Vec<T>, Vec<T>>>) -> Vec<T> {
        match batch {
            Some(ShutdownResult::Ok(items)) => items,
            other => panic!("expected a regular batch, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn emits_full_batches_then_flushes_remainder_on_close() {
        let mut stream = Box::pin(take(
            futures::stream::iter(1..=5),
            2,
            Duration::from_secs(60),
        ));

        assert_eq!(expect_ok(stream.next().await), vec![1, 2]);
        assert_eq!(expect_ok(stream.next().await), vec![3, 4]);
        assert_eq!(expect_ok(stream.next().await), vec![5]);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn empty_source_yields_no_batches() {
        let mut stream = Box::pin(take(
            futures::stream::iter(Vec::<i32>::new()),
            3,
            Duration::from_millis(10),
        ));

        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn max_size_one_delivers_each_item() {
        let batches: Vec<_> = take(futures::stream::iter(vec![7, 8]), 1, Duration::ZERO)
            .collect()
            .await;

        assert_eq!(
            batches,
            vec![ShutdownResult::Ok(vec![7]), ShutdownResult::Ok(vec![8])]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_counts_from_first_pending_item() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut stream = Box::pin(take(channel_stream(rx), 10, Duration::from_secs(5)));

        // Nothing pending: waiting longer than the timeout must not produce an empty batch.
        poll_fn(|cx| match stream.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Ready(()),
            other => panic!("expected pending, got {other:?}"),
        })
        .await;
        tokio::time::advance(Duration::from_secs(30)).await;

        tx.send(1).unwrap();
        let started = tokio::time::Instant::now();
        let batch = expect_ok(stream.next().await);

        assert_eq!(batch, vec![1]);
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn shutdown_yields_pending_items_and_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (shutdown_tx, shutdown_rx) = create_shutdown_channel();
        let batch_config = BatchConfig {
            max_size: 10,
            max_fill_ms: 60_000,
        };
        let mut stream = Box::pin(BatchStream::wrap(
            channel_stream(rx),
            &batch_config,
            shutdown_rx,
        ));

        tx.send(1).unwrap();
        tx.send(2).unwrap();
        poll_fn(|cx| match stream.as_mut().poll_next(cx) {
            Poll::Pending => Poll::Ready(()),
            other => panic!("expected pending, got {other:?}"),
        })
        .await;

        shutdown_tx.shutdown().unwrap();

        match stream.next().await {
            Some(ShutdownResult::Shutdown(items)) => assert_eq!(items, vec![1, 2]),
            other => panic!("expected shutdown flush, got {other:?}"),
        }
        assert!(stream.next().await.is_none());
    }
}
