//! Background recording of delivered responses.
//!
//! Recordings are queued on an unbounded channel and appended by a single
//! worker task, so the fixture grows in completion order and callers never
//! wait on disk I/O.

use std::sync::Mutex;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::Mode;
use crate::error::ReplayError;
use crate::error::Result;
use crate::identifier::Identifier;
use crate::stub::Stub;
use crate::stub::StubResponse;
use crate::transport::HttpResponse;
use crate::transport::TransportError;
use crate::writer::FixtureWriter;

#[derive(Debug)]
pub struct Recorder {
    mode: Mode,
    sender: Mutex<Option<mpsc::UnboundedSender<Stub>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl Recorder {
    /// Start the append worker on the current tokio runtime.
    pub fn spawn(writer: FixtureWriter, mode: Mode) -> Result<Self> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| ReplayError::config(format!("recorder needs a tokio runtime: {e}")))?;
        let (tx, mut rx) = mpsc::unbounded_channel::<Stub>();

        let worker = runtime.spawn(async move {
            while let Some(stub) = rx.recv().await {
                let writer = writer.clone();
                let identifier = stub.identifier.to_string();
                match tokio::task::spawn_blocking(move || writer.append_stub(&stub)).await {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        tracing::warn!("failed to record {identifier}: {err}");
                    }
                    Err(err) => {
                        tracing::warn!("recording task for {identifier} aborted: {err}");
                    }
                }
            }
            tracing::debug!("recorder worker stopped");
        });

        Ok(Self {
            mode,
            sender: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn should_record(&self) -> bool {
        self.mode.should_record()
    }

    /// Queue the outcome of a call for appending. Never blocks.
    pub fn record(
        &self,
        identifier: Identifier,
        outcome: &std::result::Result<HttpResponse, TransportError>,
    ) {
        let stub = Stub::new(identifier, StubResponse::from_outcome(outcome));
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        match sender.as_ref() {
            Some(tx) => {
                if let Err(err) = tx.send(stub) {
                    tracing::debug!("dropping recording for {}: worker gone", err.0.identifier);
                }
            }
            None => {
                tracing::debug!(
                    "dropping recording for {}: recorder shut down",
                    stub.identifier
                );
            }
        }
    }

    /// Stop accepting recordings and wait for queued appends to finish.
    pub async fn shutdown(&self) {
        let sender = self
            .sender
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        drop(sender);
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(worker) = worker
            && let Err(err) = worker.await
        {
            tracing::warn!("recorder worker failed: {err}");
        }
    }
}
