use futures::Stream;
use tokio::sync::mpsc;

/// Turns the receiving half of a channel into a stream that ends once every sender is dropped.
pub fn channel_source<T: Send + 'static>(rx: mpsc::Receiver<T>) -> impl Stream<Item = T> + Send {
    futures::stream::unfold(rx, |mut rx| async move {
        let item = rx.recv().await?;
        Some((item, rx))
    })
}
