//! One installed replay session: queue, interceptor and recorder wired from a
//! [`ReplayConfig`].

use std::path::Path;
use std::sync::Arc;

use crate::config::ReplayConfig;
use crate::engine::Interceptor;
use crate::error::Result;
use crate::loader;
use crate::queue::StubQueue;
use crate::recorder::Recorder;
use crate::transport::HttpRequest;
use crate::transport::HttpResponse;
use crate::transport::LiveTransport;
use crate::transport::ReqwestTransport;
use crate::writer::FixtureWriter;

#[derive(Debug)]
pub struct ReplaySession {
    config: ReplayConfig,
    interceptor: Arc<Interceptor>,
    recorder: Option<Arc<Recorder>>,
}

impl ReplaySession {
    /// Build a session for `config`, or `None` when replay is inactive.
    ///
    /// The shared fixture is queued before the test-specific one. A fixture
    /// that cannot be read is logged and skipped; missing path settings are
    /// fatal. In capture mode this must run inside a tokio runtime.
    pub fn install(
        config: ReplayConfig,
        transport: Arc<dyn LiveTransport>,
    ) -> Result<Option<Self>> {
        if !config.is_active {
            tracing::debug!("replay inactive, not installing");
            return Ok(None);
        }

        let fixture_path = config.fixture_path()?;
        let queue = Arc::new(StubQueue::new());
        if let Some(shared) = config.shared_fixture_path() {
            enqueue_fixture(&queue, &shared);
        }
        enqueue_fixture(&queue, &fixture_path);

        let recorder = if config.mode.should_record() {
            let writer = FixtureWriter::new(fixture_path.clone());
            Some(Arc::new(Recorder::spawn(writer, config.mode)?))
        } else {
            None
        };

        let mut interceptor = Interceptor::new(Arc::clone(&queue), config.mode, transport)
            .with_signature_endpoints(config.graphql_endpoints.clone());
        if let Some(recorder) = &recorder {
            interceptor = interceptor.with_recorder(Arc::clone(recorder));
        }

        tracing::info!(
            "replay session installed: mode={}, fixture={}, {} stored responses",
            config.mode,
            fixture_path.display(),
            queue.len()
        );
        Ok(Some(Self {
            config,
            interceptor: Arc::new(interceptor),
            recorder,
        }))
    }

    /// Like [`ReplaySession::install`], with a [`ReqwestTransport`] using the
    /// configured live timeout.
    pub fn install_with_reqwest(config: ReplayConfig) -> Result<Option<Self>> {
        if !config.is_active {
            return Ok(None);
        }
        let transport = ReqwestTransport::new(config.live_timeout)?;
        Self::install(config, Arc::new(transport))
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    pub fn interceptor(&self) -> Arc<Interceptor> {
        Arc::clone(&self.interceptor)
    }

    pub fn queue(&self) -> &Arc<StubQueue> {
        self.interceptor.queue()
    }

    pub async fn intercept(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.interceptor.intercept(request).await
    }

    /// Flush pending recordings.
    pub async fn shutdown(&self) {
        if let Some(recorder) = &self.recorder {
            recorder.shutdown().await;
        }
    }
}

fn enqueue_fixture(queue: &StubQueue, path: &Path) {
    match loader::load_optional(path) {
        Ok(stubs) => {
            tracing::debug!("queued {} stubs from {}", stubs.len(), path.display());
            queue.enqueue_all(stubs);
        }
        Err(err) => tracing::warn!("ignoring fixture: {err}"),
    }
}
