//! Helpers for catalogs that produce file scan tasks lazily.
//!
//! Enumerations hold catalog resources open (connections, manifest readers).
//! Both helpers here tie those resources to the lifetime of the stream handed
//! to the planner, so they are released when the stream is exhausted or
//! dropped early, without the consumer having to close anything.
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::stream::BoxStream;
use futures::{Future, Stream, StreamExt};
use tokio::sync::mpsc::{Receiver, Sender};
use tokio::task::JoinSet;
use tracing::{Instrument, Span};

use super::{CatalogError, CatalogResult};

/// Creates a stream from a collection of producing tasks, routing panics to the stream.
///
/// Similar to `ReceiverStream` from tokio-stream, except that it
///
/// 1. owns the producing tasks (`spawn()`),
/// 2. propagates producer panics and errors to the receiver,
/// 3. aborts any outstanding producer when the stream is dropped.
#[derive(Debug)]
pub struct ReceiverStreamBuilder<O> {
    tx: Sender<CatalogResult<O>>,
    rx: Receiver<CatalogResult<O>>,
    join_set: JoinSet<CatalogResult<()>>,
}

impl<O: Send + 'static> ReceiverStreamBuilder<O> {
    /// Create new channels with the specified buffer size
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = tokio::sync::mpsc::channel(capacity.max(1));

        Self {
            tx,
            rx,
            join_set: JoinSet::new(),
        }
    }

    /// Get a handle for sending data to the output
    pub fn tx(&self) -> Sender<CatalogResult<O>> {
        self.tx.clone()
    }

    /// Spawn a task that will be aborted if this builder (or the stream
    /// built from it) are dropped. The task runs inside the current span.
    pub fn spawn<F>(&mut self, task: F)
    where
        F: Future<Output = CatalogResult<()>>,
        F: Send + 'static,
    {
        self.join_set.spawn(task.instrument(Span::current()));
    }

    /// Create a stream of all data written to `tx`
    pub fn build(self) -> BoxStream<'static, CatalogResult<O>> {
        let Self {
            tx,
            rx,
            mut join_set,
        } = self;

        // Doesn't need tx
        drop(tx);

        // future that checks the result of the join set, and propagates panic if seen
        let check = async move {
            while let Some(result) = join_set.join_next().await {
                match result {
                    Ok(Ok(())) => continue,
                    // the producer failed
                    Ok(Err(error)) => return Some(Err(error)),
                    Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                    // only reachable if the join set was aborted, in which case
                    // the receiver is gone as well
                    Err(e) => {
                        return Some(Err(CatalogError::Io {
                            source: Box::new(e),
                        }))
                    }
                }
            }
            None
        };

        let check_stream = futures::stream::once(check).filter_map(|item| async move { item });

        let rx_stream = futures::stream::unfold(rx, |mut rx| async move {
            let next_item = rx.recv().await;
            next_item.map(|next_item| (next_item, rx))
        });

        // whichever is ready first produces the next item
        futures::stream::select(rx_stream, check_stream).boxed()
    }
}

/// Attach `guard` to `stream`; the guard is dropped together with the stream.
pub fn with_guard<T, G>(stream: BoxStream<'static, T>, guard: G) -> BoxStream<'static, T>
where
    T: Send + 'static,
    G: Send + Unpin + 'static,
{
    GuardedStream {
        inner: stream,
        guard,
    }
    .boxed()
}

struct GuardedStream<T, G> {
    inner: BoxStream<'static, T>,
    #[allow(dead_code)]
    guard: G,
}

impl<T, G: Unpin> Stream for GuardedStream<T, G> {
    type Item = T;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}
