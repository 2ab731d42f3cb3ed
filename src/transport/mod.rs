//! Client transport for inter-partition traffic.
//!
//! Protocol-agnostic: the actual wire (gRPC, TCP, in-process) lives behind
//! the `ClientOutput` trait. Two instances exist per partition, one for
//! management (discovery) traffic and one for subscription traffic.

use async_trait::async_trait;
use bytes::Bytes;
use slog::{debug, warn, Logger};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);

/// Registered endpoint handle.
///
/// Registration assigns a stable stream id per distinct address; sending
/// through the same `RemoteAddress` uses a single outgoing stream, which
/// preserves call order per destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAddress {
    pub stream_id: u32,
    pub address: String,
}

/// Errors that can occur during transport operations
#[derive(Debug, Clone)]
pub enum TransportError {
    /// No remote address could be resolved for the request
    NoRemoteAddress,

    /// The outgoing channel refused the frame
    SendFailed { address: String, reason: String },

    /// The remote end never produced a response
    NoResponse { address: String },

    /// The response did not pass the caller's acceptor
    ResponseRejected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::NoRemoteAddress => {
                write!(f, "No remote address available for request")
            }
            TransportError::SendFailed { address, reason } => {
                write!(f, "Failed to send to {}: {}", address, reason)
            }
            TransportError::NoResponse { address } => {
                write!(f, "No response from {}", address)
            }
            TransportError::ResponseRejected => {
                write!(f, "Response was rejected by the acceptor")
            }
        }
    }
}

impl std::error::Error for TransportError {}

/// A request did not complete within its deadline
#[derive(Debug, Clone)]
pub struct TimeoutError {
    pub deadline: Duration,
    pub last_failure: Option<TransportError>,
}

impl fmt::Display for TimeoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.last_failure {
            Some(failure) => write!(
                f,
                "Request did not complete within {:?}, last failure: {}",
                self.deadline, failure
            ),
            None => write!(f, "Request did not complete within {:?}", self.deadline),
        }
    }
}

impl std::error::Error for TimeoutError {}

/// Protocol-specific output implemented by each wire layer
#[async_trait]
pub trait ClientOutput: Send + Sync {
    /// Hand a frame to the outgoing stream. Non-blocking; returns `false`
    /// when the outgoing queue is saturated.
    fn send_message(&self, remote: &RemoteAddress, frame: Bytes) -> bool;

    /// Send a request frame and await the response frame.
    async fn send_request(
        &self,
        remote: &RemoteAddress,
        request: Bytes,
    ) -> Result<Bytes, TransportError>;
}

/// Client transport: remote-address registry plus retrying request support
/// layered over a `ClientOutput`.
pub struct ClientTransport {
    output: Arc<dyn ClientOutput>,
    remotes: RwLock<HashMap<String, RemoteAddress>>,
    next_stream_id: AtomicU32,
    retry_interval: Duration,
    logger: Logger,
}

impl ClientTransport {
    pub fn new(output: Arc<dyn ClientOutput>, logger: Logger) -> Self {
        Self {
            output,
            remotes: RwLock::new(HashMap::new()),
            next_stream_id: AtomicU32::new(0),
            retry_interval: DEFAULT_RETRY_INTERVAL,
            logger,
        }
    }

    /// Override the sleep between request attempts.
    pub fn with_retry_interval(mut self, retry_interval: Duration) -> Self {
        self.retry_interval = retry_interval;
        self
    }

    /// Register an endpoint. Idempotent: the same address always yields the
    /// same `RemoteAddress`.
    pub fn register_remote_address(&self, address: &str) -> RemoteAddress {
        if let Some(existing) = self.remotes.read().unwrap().get(address) {
            return existing.clone();
        }

        let mut remotes = self.remotes.write().unwrap();
        remotes
            .entry(address.to_string())
            .or_insert_with(|| {
                let stream_id = self.next_stream_id.fetch_add(1, Ordering::SeqCst);
                debug!(self.logger, "Registered remote address";
                    "address" => address, "stream_id" => stream_id);
                RemoteAddress {
                    stream_id,
                    address: address.to_string(),
                }
            })
            .clone()
    }

    /// Hand a frame to the outgoing stream; `false` on saturation.
    pub fn send_message(&self, remote: &RemoteAddress, frame: Bytes) -> bool {
        self.output.send_message(remote, frame)
    }

    /// Send a request, retrying until the acceptor accepts a response or
    /// the deadline expires. Each attempt re-invokes the resolver, so the
    /// request follows leader churn.
    pub async fn send_request_with_retry<R, A>(
        &self,
        resolver: R,
        acceptor: A,
        request: Bytes,
        deadline: Duration,
    ) -> Result<Bytes, TimeoutError>
    where
        R: Fn() -> Option<RemoteAddress> + Send + Sync,
        A: Fn(&Bytes) -> bool + Send + Sync,
    {
        let mut last_failure: Option<TransportError> = None;

        let attempts = async {
            loop {
                match resolver() {
                    Some(remote) => {
                        match self.output.send_request(&remote, request.clone()).await {
                            Ok(response) if acceptor(&response) => return response,
                            Ok(_) => {
                                last_failure = Some(TransportError::ResponseRejected);
                            }
                            Err(e) => {
                                warn!(self.logger, "Request attempt failed";
                                    "address" => remote.address.clone(), "error" => e.to_string());
                                last_failure = Some(e);
                            }
                        }
                    }
                    None => {
                        last_failure = Some(TransportError::NoRemoteAddress);
                    }
                }

                tokio::time::sleep(self.retry_interval).await;
            }
        };

        match tokio::time::timeout(deadline, attempts).await {
            Ok(response) => Ok(response),
            Err(_) => Err(TimeoutError {
                deadline,
                last_failure,
            }),
        }
    }
}

/// A one-way frame handed to the wire
#[derive(Debug, Clone)]
pub struct OutboundMessage {
    pub address: String,
    pub frame: Bytes,
}

/// A request frame awaiting a response
#[derive(Debug)]
pub struct OutboundRequest {
    pub address: String,
    pub frame: Bytes,
    pub response_tx: oneshot::Sender<Bytes>,
}

/// In-process `ClientOutput` over bounded channels.
///
/// A full outgoing queue makes `send_message` return `false`, which models
/// transport backpressure without a real wire.
pub struct ChannelOutput {
    messages: mpsc::Sender<OutboundMessage>,
    requests: mpsc::Sender<OutboundRequest>,
}

impl ChannelOutput {
    pub fn new(
        capacity: usize,
    ) -> (
        Self,
        mpsc::Receiver<OutboundMessage>,
        mpsc::Receiver<OutboundRequest>,
    ) {
        let (message_tx, message_rx) = mpsc::channel(capacity);
        let (request_tx, request_rx) = mpsc::channel(capacity);
        (
            Self {
                messages: message_tx,
                requests: request_tx,
            },
            message_rx,
            request_rx,
        )
    }
}

#[async_trait]
impl ClientOutput for ChannelOutput {
    fn send_message(&self, remote: &RemoteAddress, frame: Bytes) -> bool {
        self.messages
            .try_send(OutboundMessage {
                address: remote.address.clone(),
                frame,
            })
            .is_ok()
    }

    async fn send_request(
        &self,
        remote: &RemoteAddress,
        request: Bytes,
    ) -> Result<Bytes, TransportError> {
        let (response_tx, response_rx) = oneshot::channel();

        self.requests
            .send(OutboundRequest {
                address: remote.address.clone(),
                frame: request,
                response_tx,
            })
            .await
            .map_err(|e| TransportError::SendFailed {
                address: remote.address.clone(),
                reason: e.to_string(),
            })?;

        response_rx.await.map_err(|_| TransportError::NoResponse {
            address: remote.address.clone(),
        })
    }
}
