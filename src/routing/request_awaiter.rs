use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures::FutureExt;
use futures::future::Shared;
use log::trace;
use tokio::sync::oneshot;

use crate::error::fixture_error::FixtureServerError;
use crate::error::fixture_error_enums::FixtureServerErrorKind;
use crate::http::request_response::fixture_request::FixtureRequest;

/// Resolves with the next request for the awaited path.
///
/// Clones share the same underlying slot, every clone resolves from the same
/// request. There is no built-in timeout; wrap it in `tokio::time::timeout`
/// when a test needs one. If the subscription is dropped by `reset()` or
/// `stop()` before a request arrives the future resolves to an
/// `AwaitCancelled` error.
#[derive(Clone)]
pub struct RequestFuture {
    path: String,
    inner: Shared<oneshot::Receiver<FixtureRequest>>,
}

impl RequestFuture {
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Blocks the current thread until the request arrives.
    ///
    /// Must not be called from inside an async runtime worker, use `.await` there.
    pub fn wait(self) -> Result<FixtureRequest, FixtureServerError> {
        futures::executor::block_on(self)
    }
}

impl Future for RequestFuture {
    type Output = Result<FixtureRequest, FixtureServerError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let path = self.path.clone();
        self.inner.poll_unpin(cx).map(|result| {
            result.map_err(|_| FixtureServerError::new(FixtureServerErrorKind::AwaitCancelled, format!("No request for {} before the subscription was dropped", path)))
        })
    }
}

impl fmt::Debug for RequestFuture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestFuture").field("path", &self.path).finish()
    }
}

// Pending slot stored in the registry. Fulfilling consumes it, so a slot can
// only ever be completed once.
pub(crate) struct Subscription {
    sender: oneshot::Sender<FixtureRequest>,
    future: RequestFuture,
}

impl Subscription {
    pub(crate) fn new(path: &str) -> Self {
        let (sender, receiver) = oneshot::channel();
        Subscription {
            sender,
            future: RequestFuture {
                path: path.to_string(),
                inner: receiver.shared(),
            },
        }
    }

    pub(crate) fn future(&self) -> RequestFuture {
        self.future.clone()
    }

    pub(crate) fn fulfill(self, request: FixtureRequest) {
        trace!("Fulfilling request await for {}", self.future.path);
        // Nobody left waiting is fine, the snapshot is simply discarded
        let _ = self.sender.send(request);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("path", &self.future.path).finish()
    }
}
