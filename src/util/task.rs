use futures_channel::oneshot;
use leptos::prelude::{on_cleanup, Owner};
use leptos::task::spawn_local;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

/// Cancels the paired [`Cancellable`] when cancelled or dropped.
pub(crate) struct CancelToken(oneshot::Sender<()>);

impl CancelToken {
    pub fn cancel(self) {
        let _ = self.0.send(());
    }
}

/// A future that resolves to `None` once its token is gone. The inner future
/// is dropped without being polled again, which aborts any fetch it owns.
pub(crate) struct Cancellable<F> {
    inner: Pin<Box<F>>,
    cancelled: oneshot::Receiver<()>,
}

impl<F: Future> Cancellable<F> {
    pub fn new(fut: F) -> (Self, CancelToken) {
        let (tx, rx) = oneshot::channel();
        let task = Self {
            inner: Box::pin(fut),
            cancelled: rx,
        };
        (task, CancelToken(tx))
    }
}

impl<F: Future> Future for Cancellable<F> {
    type Output = Option<F::Output>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();

        // Both an explicit send and a dropped sender end the task.
        if Pin::new(&mut this.cancelled).poll(cx).is_ready() {
            return Poll::Ready(None);
        }

        this.inner.as_mut().poll(cx).map(Some)
    }
}

/// Spawn a task whose lifetime is bound to the current reactive owner: when
/// the view that spawned it is disposed, the task is cancelled.
///
/// Outside any owner (e.g. inside a DOM event handler) the task simply runs to
/// completion.
pub(crate) fn spawn_scoped(fut: impl Future<Output = ()> + 'static) {
    if Owner::current().is_none() {
        spawn_local(fut);
        return;
    }

    let (task, token) = Cancellable::new(fut);
    on_cleanup(move || token.cancel());
    spawn_local(async move {
        let _ = task.await;
    });
}
