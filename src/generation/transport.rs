/*!
 * Progress transport: batch events and their wire format.
 *
 * Producers (the executor callbacks and the retry coordinator) push events
 * into an unbounded channel. A single consumer turns them into a text event
 * stream, one named event per message:
 *
 * ```text
 * event: progress
 * data: {"total":5,"completed":1,"failed":0,"currentLabel":"segment 1","percentage":20}
 *
 * ```
 *
 * Every message is flushed as soon as it is written. A write failure means
 * the client went away; the consumer keeps draining so the batch can run to
 * completion, since persisted results stay the source of truth.
 */

use log::{error, warn};
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio_util::sync::CancellationToken;

use crate::errors::BatchError;

use super::model::{BatchSummary, ProgressSnapshot};

/// Payload of a terminal `error` event
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorPayload {
    pub message: String,
    pub details: Vec<String>,
}

impl From<&BatchError> for ErrorPayload {
    fn from(error: &BatchError) -> Self {
        let details = match error {
            BatchError::InvalidConfig(errors) => errors.clone(),
            BatchError::Unreachable(reason) => vec![reason.clone()],
        };
        Self {
            message: error.to_string(),
            details,
        }
    }
}

/// One event of the progress stream
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum BatchEvent<O> {
    Progress(ProgressSnapshot),
    Complete(BatchSummary<O>),
    Error(ErrorPayload),
}

impl<O> BatchEvent<O> {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Progress(_) => "progress",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    /// `complete` and `error` end the stream
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

impl<O: Serialize> BatchEvent<O> {
    /// Encode as one text event stream message
    pub fn to_frame(&self) -> Result<String, serde_json::Error> {
        let data = match self {
            Self::Progress(snapshot) => serde_json::to_string(snapshot)?,
            Self::Complete(summary) => serde_json::to_string(summary)?,
            Self::Error(payload) => serde_json::to_string(payload)?,
        };
        Ok(format!("event: {}\ndata: {}\n\n", self.name(), data))
    }
}

/// Producer side of the event channel
#[derive(Debug)]
pub struct EventSender<O> {
    tx: UnboundedSender<BatchEvent<O>>,
    receiver_gone: AtomicBool,
}

impl<O> EventSender<O> {
    pub fn new(tx: UnboundedSender<BatchEvent<O>>) -> Self {
        Self {
            tx,
            receiver_gone: AtomicBool::new(false),
        }
    }

    pub fn progress(&self, snapshot: ProgressSnapshot) {
        self.send(BatchEvent::Progress(snapshot));
    }

    pub fn complete(&self, summary: BatchSummary<O>) {
        self.send(BatchEvent::Complete(summary));
    }

    pub fn error(&self, error: &BatchError) {
        self.send(BatchEvent::Error(ErrorPayload::from(error)));
    }

    fn send(&self, event: BatchEvent<O>) {
        if self.tx.send(event).is_err() && !self.receiver_gone.swap(true, Ordering::Relaxed) {
            warn!("Progress receiver dropped, batch continues without live updates");
        }
    }
}

/// What the consumer saw while draining the stream
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportReport {
    pub events_written: usize,
    /// Name of the terminal event, if one arrived
    pub terminal: Option<&'static str>,
    pub disconnected: bool,
}

/// Single consumer writing batch events to a client connection
pub struct EventWriter<W, O> {
    writer: W,
    stop_on_disconnect: Option<CancellationToken>,
    observer: Option<Box<dyn FnMut(&BatchEvent<O>) + Send>>,
}

impl<W, O> EventWriter<W, O>
where
    W: AsyncWrite + Unpin,
    O: Serialize,
{
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            stop_on_disconnect: None,
            observer: None,
        }
    }

    /// Cancel the batch when the client goes away
    pub fn stop_on_disconnect(mut self, cancel: CancellationToken) -> Self {
        self.stop_on_disconnect = Some(cancel);
        self
    }

    /// Observe every event before it is written, e.g. to drive a progress bar
    pub fn on_event(mut self, observer: impl FnMut(&BatchEvent<O>) + Send + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    /// Write events until the producers hang up
    pub async fn drain(mut self, mut events: UnboundedReceiver<BatchEvent<O>>) -> TransportReport {
        let mut report = TransportReport::default();

        while let Some(event) = events.recv().await {
            if let Some(observer) = self.observer.as_mut() {
                observer(&event);
            }
            if event.is_terminal() {
                report.terminal = Some(event.name());
            }
            if report.disconnected {
                continue;
            }

            let frame = match event.to_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    error!("Failed to encode {} event: {}", event.name(), e);
                    continue;
                }
            };

            match write_frame(&mut self.writer, &frame).await {
                Ok(()) => report.events_written += 1,
                Err(e) => {
                    warn!("Event stream client disconnected: {}", e);
                    report.disconnected = true;
                    if let Some(cancel) = &self.stop_on_disconnect {
                        cancel.cancel();
                    }
                }
            }
        }

        report
    }
}

async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, frame: &str) -> std::io::Result<()> {
    writer.write_all(frame.as_bytes()).await?;
    writer.flush().await
}

/// Write every event to `writer`, keeping the batch alive on disconnect
pub async fn write_event_stream<W, O>(events: UnboundedReceiver<BatchEvent<O>>, writer: W) -> TransportReport
where
    W: AsyncWrite + Unpin,
    O: Serialize,
{
    EventWriter::new(writer).drain(events).await
}
