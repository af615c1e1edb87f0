//! The per-request decision: replay a stored response, go live, or fail.

use std::sync::Arc;

use url::Url;

use crate::config::Mode;
use crate::error::ReplayError;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::queue::Lookup;
use crate::queue::StubQueue;
use crate::recorder::Recorder;
use crate::transport::HttpRequest;
use crate::transport::HttpResponse;
use crate::transport::LiveTransport;
use crate::transport::TransportError;

tokio::task_local! {
    static LIVE_CALL: ();
}

/// True while the current task is inside a live call made by an
/// [`Interceptor`]. Hooks that route a client through the interceptor should
/// step aside when this is set.
pub fn in_live_call() -> bool {
    LIVE_CALL.try_with(|_| ()).is_ok()
}

pub struct Interceptor {
    queue: Arc<StubQueue>,
    mode: Mode,
    signature_endpoints: Vec<Url>,
    transport: Arc<dyn LiveTransport>,
    recorder: Option<Arc<Recorder>>,
}

impl std::fmt::Debug for Interceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interceptor")
            .field("mode", &self.mode)
            .field("pending", &self.queue.len())
            .field("signature_endpoints", &self.signature_endpoints)
            .field("recording", &self.recorder.is_some())
            .finish_non_exhaustive()
    }
}

impl Interceptor {
    pub fn new(queue: Arc<StubQueue>, mode: Mode, transport: Arc<dyn LiveTransport>) -> Self {
        Self {
            queue,
            mode,
            signature_endpoints: Vec::new(),
            transport,
            recorder: None,
        }
    }

    pub fn with_signature_endpoints(mut self, endpoints: Vec<Url>) -> Self {
        self.signature_endpoints = endpoints;
        self
    }

    pub fn with_recorder(mut self, recorder: Arc<Recorder>) -> Self {
        self.recorder = Some(recorder);
        self
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn queue(&self) -> &Arc<StubQueue> {
        &self.queue
    }

    /// Resolve one request.
    ///
    /// Stored responses are consumed in FIFO order per identifier. On a miss
    /// the mode decides between a live call and [`ReplayError::NoFixtureAvailable`].
    /// In capture mode every delivered outcome, replayed or live, is handed
    /// to the recorder.
    pub async fn intercept(&self, request: HttpRequest) -> Result<HttpResponse> {
        if in_live_call() {
            tracing::debug!("re-entrant request to {}, passing through", request.url);
            return self
                .transport
                .perform(&request)
                .await
                .map_err(ReplayError::from);
        }

        let identifier = Identifier::from_request(&request, &self.signature_endpoints)?;
        let outcome = match self.queue.dequeue(&identifier) {
            Lookup::Hit(stored) => {
                tracing::debug!("replaying stored response for {identifier}");
                stored.to_outcome()
            }
            Lookup::Exhausted | Lookup::Unknown if self.mode == Mode::ReplayOrFail => {
                tracing::debug!("no stored response for {identifier}, failing");
                return Err(ReplayError::NoFixtureAvailable { identifier });
            }
            miss => {
                let reason = match miss {
                    Lookup::Exhausted => "exhausted",
                    _ => "unknown",
                };
                tracing::debug!(reason, "no stored response for {identifier}, going live");
                self.perform_live(&request).await
            }
        };

        if self.mode.should_record() {
            self.record(identifier, &outcome);
        }
        outcome.map_err(ReplayError::from)
    }

    async fn perform_live(
        &self,
        request: &HttpRequest,
    ) -> std::result::Result<HttpResponse, TransportError> {
        LIVE_CALL.scope((), self.transport.perform(request)).await
    }

    fn record(
        &self,
        identifier: Identifier,
        outcome: &std::result::Result<HttpResponse, TransportError>,
    ) {
        match &self.recorder {
            Some(recorder) => recorder.record(identifier, outcome),
            None => tracing::debug!("no recorder attached, not recording {identifier}"),
        }
    }
}
