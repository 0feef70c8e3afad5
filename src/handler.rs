// Copyright 2024 Antonio Estévez
// SPDX-License-Identifier: Apache-2.0

//! # Message plane handle
//!
//! `HandleHelper` bundles the sending ends of the system's message plane:
//! the arbiter ingress and the responses/cancellations broadcast planes.
//! It implements the ask/tell protocol: `tell` queues one envelope to the
//! arbiter; `ask` additionally correlates the reply by message id over the
//! merged responses and cancellations planes and yields exactly one
//! outcome.
//!

use crate::{
    message::{Action, Envelope, MessageId, MessageResponse},
    ActorPath, Error,
};

use serde_json::Value;

use tokio::sync::{broadcast, mpsc};

use tracing::debug;

/// Cloneable handle to the system message plane.
///
/// Holding a handle does not keep any actor alive; it only grants the
/// ability to submit envelopes and observe replies.
pub struct HandleHelper {
    arbiter: mpsc::UnboundedSender<Envelope>,
    responses: broadcast::Sender<MessageResponse>,
    cancellations: broadcast::Sender<MessageResponse>,
}

impl HandleHelper {
    /// Creates a new handle over the plane senders.
    pub(crate) fn new(
        arbiter: mpsc::UnboundedSender<Envelope>,
        responses: broadcast::Sender<MessageResponse>,
        cancellations: broadcast::Sender<MessageResponse>,
    ) -> Self {
        Self {
            arbiter,
            responses,
            cancellations,
        }
    }

    /// Sender end of the responses plane.
    pub(crate) fn responses_sender(&self) -> broadcast::Sender<MessageResponse> {
        self.responses.clone()
    }

    /// Sender end of the cancellations plane.
    pub(crate) fn cancellations_sender(
        &self,
    ) -> broadcast::Sender<MessageResponse> {
        self.cancellations.clone()
    }

    /// Publishes a cancellation envelope for the given message id.
    pub(crate) fn publish_cancellation(&self, resp_id: MessageId) {
        let _ = self.cancellations.send(MessageResponse::cancelled(resp_id));
    }

    /// Queues one envelope to the arbiter. Delivery is strictly
    /// asynchronous relative to the caller: the envelope is observed by the
    /// target only after the arbiter task runs.
    pub(crate) fn tell(
        &self,
        address: ActorPath,
        action: Action,
        context_creator: Option<ActorPath>,
        message_id: Option<MessageId>,
    ) -> Result<(), Error> {
        let envelope = Envelope {
            message_id: message_id.unwrap_or_default(),
            address,
            action,
            context_creator,
        };
        debug!(
            "Telling message {} to actor {}.",
            envelope.message_id, envelope.address
        );
        self.arbiter
            .send(envelope)
            .map_err(|error| Error::Send(error.to_string()))
    }

    /// Submits one envelope and awaits its correlated outcome.
    ///
    /// Subscribes to the responses and cancellations planes before
    /// submitting, then takes the first envelope whose `resp_id` matches.
    /// A non-empty `errors` fails the ask with the first error; a
    /// cancellation completes without a value; otherwise the response value
    /// is yielded.
    ///
    /// Reusing a message id while another ask with the same id is in
    /// flight leaves the second caller's outcome undefined.
    pub(crate) async fn ask(
        &self,
        address: ActorPath,
        action: Action,
        context_creator: Option<ActorPath>,
        message_id: Option<MessageId>,
    ) -> Result<Option<Value>, Error> {
        let message_id = message_id.unwrap_or_default();
        let mut responses = self.responses.subscribe();
        let mut cancellations = self.cancellations.subscribe();

        self.tell(address, action, context_creator, Some(message_id.clone()))?;

        let mut responses_open = true;
        let mut cancellations_open = true;
        loop {
            tokio::select! {
                received = responses.recv(), if responses_open => {
                    match received {
                        Ok(response) if response.resp_id == message_id => {
                            if let Some(error) =
                                response.errors.into_iter().next()
                            {
                                return Err(error);
                            }
                            if response.cancelled {
                                return Ok(None);
                            }
                            return Ok(response.response);
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            continue
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            responses_open = false;
                        }
                    }
                }
                received = cancellations.recv(), if cancellations_open => {
                    match received {
                        Ok(response) if response.resp_id == message_id => {
                            return Ok(None);
                        }
                        Ok(_) => continue,
                        Err(broadcast::error::RecvError::Lagged(_)) => {
                            continue
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            cancellations_open = false;
                        }
                    }
                }
                else => {
                    return Err(Error::Send(
                        "message plane closed".to_owned(),
                    ));
                }
            }
        }
    }

    /// True if the arbiter ingress is closed.
    pub fn is_closed(&self) -> bool {
        self.arbiter.is_closed()
    }
}

impl Clone for HandleHelper {
    fn clone(&self) -> Self {
        Self {
            arbiter: self.arbiter.clone(),
            responses: self.responses.clone(),
            cancellations: self.cancellations.clone(),
        }
    }
}
