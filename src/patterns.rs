// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Pattern adapters
//!
//! The `patterns` module turns an actor's raw mailbox stream into typed
//! handler dispatch. An actor declares exactly one [`Behavior`]:
//!
//! - [`Behavior::Receive`] invokes a single callback per delivery,
//!   serially, in mailbox order.
//! - [`Behavior::Methods`] routes deliveries by action type to per-type
//!   stream handlers. Each handler receives its own call stream once, at
//!   install time, and answers through each call's responder. An action
//!   type with no route is answered with an `UnknownAction` error
//!   envelope.
//! - [`Behavior::Setup`] hands the actor the full incoming envelope
//!   stream and lifts every emitted [`SetupReply`] into a response
//!   envelope.
//!
//! The module also provides the supersession machinery: [`latest`], a
//! switch-style executor that aborts the in-flight handler whenever a
//! newer call arrives, and the `cleanup_cancelled_messages` wrapper
//! (exposed on the actor context) which answers every superseded call
//! with a cancellation envelope.
//!

use crate::{
    actor::ActorRef,
    mailbox::OutgoingSender,
    message::{Action, Envelope, MessageId, MessageResponse, SetupReply},
    Error,
};

use futures::future::{BoxFuture, FutureExt};

use serde_json::Value;

use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use tracing::{debug, warn};

use std::collections::HashMap;
use std::future::Future;

/// Stream of enriched calls routed to one handler.
pub type CallStream = mpsc::UnboundedReceiver<Delivery>;

/// A mapped-methods handler: invoked once at install time with the stream
/// of calls routed to its action type.
pub type MethodFn = Box<dyn FnOnce(CallStream) + Send>;

/// Raw incoming envelope stream handed to a stream-receive actor.
pub type EnvelopeStream = mpsc::UnboundedReceiver<Envelope>;

/// Stream of replies produced by a stream-receive actor.
pub type ReplyStream = mpsc::UnboundedReceiver<SetupReply>;

/// A stream-receive behavior: transforms the full mailbox stream into a
/// reply stream.
pub type SetupFn = Box<dyn FnOnce(EnvelopeStream) -> ReplyStream + Send>;

/// A callback behavior: invoked serially, once per delivery.
pub type ReceiveFn =
    Box<dyn FnMut(Delivery) -> BoxFuture<'static, Result<(), Error>> + Send>;

/// How an actor consumes its mailbox. Declared once per incarnation via
/// [`crate::Actor::behavior`].
pub enum Behavior {
    /// Callback dispatch.
    Receive(ReceiveFn),
    /// Per-action-type stream handlers.
    Methods(Methods),
    /// Whole-mailbox stream transformer.
    Setup(SetupFn),
}

impl Behavior {
    /// Builds a callback behavior from an async closure.
    ///
    /// The callback runs serially: the next delivery is not dispatched
    /// until the returned future completes. An `Err` is published as an
    /// error envelope for the delivery's message id.
    pub fn receive<F, Fut>(mut f: F) -> Self
    where
        F: FnMut(Delivery) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        Behavior::Receive(Box::new(move |delivery| f(delivery).boxed()))
    }

    /// Builds a stream-receive behavior.
    pub fn setup<F>(f: F) -> Self
    where
        F: FnOnce(EnvelopeStream) -> ReplyStream + Send + 'static,
    {
        Behavior::Setup(Box::new(f))
    }
}

impl From<Methods> for Behavior {
    fn from(methods: Methods) -> Self {
        Behavior::Methods(methods)
    }
}

/// Builder of per-action-type handlers for [`Behavior::Methods`].
#[derive(Default)]
pub struct Methods {
    routes: HashMap<String, MethodFn>,
}

impl Methods {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a serial handler for one action type: each call is
    /// processed to completion before the next is taken. An `Err` is
    /// published as an error envelope for that call.
    pub fn handle<F, Fut>(mut self, kind: &str, mut f: F) -> Self
    where
        F: FnMut(Delivery) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), Error>> + Send + 'static,
    {
        let route = kind.to_owned();
        self.routes.insert(
            kind.to_owned(),
            Box::new(move |mut calls: CallStream| {
                tokio::spawn(async move {
                    while let Some(call) = calls.recv().await {
                        let probe = call.clone();
                        if let Err(error) = f(call).await {
                            warn!(
                                "Handler for '{}' failed: {}",
                                route, error
                            );
                            probe.fail(error);
                        }
                    }
                });
            }),
        );
        self
    }

    /// Registers a raw stream handler for one action type. The function is
    /// invoked once with the call stream and owns its consumption; use
    /// this to install operators such as [`latest`] or the context's
    /// `cleanup_cancelled_messages` wrapper.
    pub fn stream<F>(mut self, kind: &str, f: F) -> Self
    where
        F: FnOnce(CallStream) + Send + 'static,
    {
        self.routes.insert(kind.to_owned(), Box::new(f));
        self
    }

    /// Installs every handler, returning the route table the dispatch loop
    /// feeds.
    pub(crate) fn install(
        self,
    ) -> HashMap<String, mpsc::UnboundedSender<Delivery>> {
        let mut routes = HashMap::with_capacity(self.routes.len());
        for (kind, method) in self.routes {
            let (sender, receiver) = mpsc::unbounded_channel();
            method(receiver);
            routes.insert(kind, sender);
        }
        routes
    }
}

/// A message delivered to a handler, enriched with a responder and the
/// sender's reference.
///
/// Responding publishes a response envelope onto the actor's outgoing
/// stream; the runtime pumps it to the system responses plane where the
/// originating ask correlates it.
pub struct Delivery {
    message_id: MessageId,
    action: Action,
    sender: Option<ActorRef>,
    outgoing: OutgoingSender,
}

impl Delivery {
    pub(crate) fn new(
        message_id: MessageId,
        action: Action,
        sender: Option<ActorRef>,
        outgoing: OutgoingSender,
    ) -> Self {
        Self {
            message_id,
            action,
            sender,
            outgoing,
        }
    }

    /// Correlation id of this delivery.
    pub fn message_id(&self) -> &MessageId {
        &self.message_id
    }

    /// The delivered action.
    pub fn action(&self) -> &Action {
        &self.action
    }

    /// The delivered action's payload.
    pub fn payload(&self) -> &Value {
        &self.action.payload
    }

    /// Reference to the sending actor, when the message carried sender
    /// provenance.
    pub fn sender(&self) -> Option<&ActorRef> {
        self.sender.as_ref()
    }

    /// Publishes a normal response for this delivery.
    pub fn respond(&self, value: Value) {
        let _ = self
            .outgoing
            .send(MessageResponse::ok(self.message_id.clone(), value));
    }

    /// Publishes a normal response carrying opaque handler state.
    pub fn respond_with_state(&self, value: Value, state: Value) {
        let _ = self.outgoing.send(MessageResponse::ok_with_state(
            self.message_id.clone(),
            value,
            state,
        ));
    }

    /// Publishes an error response for this delivery.
    pub fn fail(&self, error: Error) {
        let _ = self
            .outgoing
            .send(MessageResponse::fail(self.message_id.clone(), error));
    }

    /// Sender end of the stream this delivery responds into.
    pub(crate) fn outgoing(&self) -> OutgoingSender {
        self.outgoing.clone()
    }

    /// Clone of this delivery answering into a different stream.
    pub(crate) fn rewired(&self, outgoing: OutgoingSender) -> Self {
        Self {
            message_id: self.message_id.clone(),
            action: self.action.clone(),
            sender: self.sender.clone(),
            outgoing,
        }
    }
}

impl Clone for Delivery {
    fn clone(&self) -> Self {
        self.rewired(self.outgoing.clone())
    }
}

impl std::fmt::Debug for Delivery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Delivery")
            .field("message_id", &self.message_id)
            .field("action", &self.action)
            .finish()
    }
}

/// Switch-style executor: runs the handler for the most recent call only.
///
/// Each arriving call aborts the handler still in flight for the previous
/// one, so a superseded call never produces a response. Combine with the
/// context's `cleanup_cancelled_messages` wrapper to answer superseded
/// calls with cancellations instead of leaving their asks pending.
pub fn latest<F, Fut>(mut f: F) -> impl FnOnce(CallStream) + Send
where
    F: FnMut(Delivery) -> Fut + Send + 'static,
    Fut: Future<Output = Result<(), Error>> + Send + 'static,
{
    move |mut calls: CallStream| {
        tokio::spawn(async move {
            let mut in_flight: Option<JoinHandle<()>> = None;
            while let Some(call) = calls.recv().await {
                if let Some(previous) = in_flight.take() {
                    previous.abort();
                }
                let probe = call.clone();
                let handler = f(call);
                in_flight = Some(tokio::spawn(async move {
                    if let Err(error) = handler.await {
                        warn!(
                            "Handler for '{}' failed: {}",
                            probe.action().kind,
                            error
                        );
                        probe.fail(error);
                    }
                }));
            }
        });
    }
}

/// Supersession wrapper around a method handler.
///
/// Buffers the id of every call routed to the handler, in arrival order.
/// When the handler emits a response, every buffered id other than the
/// responding one is answered with a cancellation envelope on the
/// cancellations plane, the buffer is cleared, and the response is
/// forwarded downstream unchanged. For a burst of N calls under a
/// latest-wins handler this yields exactly one response and N-1
/// cancellations.
pub(crate) fn cleanup_cancelled_messages<F>(
    cancellations: broadcast::Sender<MessageResponse>,
    user_fn: F,
) -> MethodFn
where
    F: FnOnce(CallStream) + Send + 'static,
{
    Box::new(move |mut calls: CallStream| {
        let (user_sender, user_receiver) = mpsc::unbounded_channel();
        let (inter_sender, mut inter_receiver) =
            mpsc::unbounded_channel::<MessageResponse>();
        user_fn(user_receiver);

        tokio::spawn(async move {
            let mut all: Vec<MessageId> = Vec::new();
            let mut downstream: Option<OutgoingSender> = None;
            // Dropped once upstream closes so the user handler and the
            // intermediate stream can wind down.
            let mut user_sender = Some(user_sender);
            let mut inter_sender = Some(inter_sender);
            loop {
                tokio::select! {
                    received = calls.recv(), if inter_sender.is_some() => {
                        match received {
                            Some(call) => {
                                all.push(call.message_id().clone());
                                if downstream.is_none() {
                                    downstream = Some(call.outgoing());
                                }
                                let delivered = match (&user_sender, &inter_sender) {
                                    (Some(user), Some(inter)) => user
                                        .send(call.rewired(inter.clone()))
                                        .is_ok(),
                                    _ => false,
                                };
                                if !delivered {
                                    debug!("Superseding handler went away.");
                                    break;
                                }
                            }
                            None => {
                                user_sender = None;
                                inter_sender = None;
                            }
                        }
                    }
                    received = inter_receiver.recv() => {
                        match received {
                            Some(out) => {
                                for id in
                                    all.iter().filter(|id| **id != out.resp_id)
                                {
                                    let _ = cancellations.send(
                                        MessageResponse::cancelled(id.clone()),
                                    );
                                }
                                all.clear();
                                if let Some(downstream) = &downstream {
                                    let _ = downstream.send(out);
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        });
    })
}

#[cfg(test)]
mod tests {

    use super::*;

    use serde_json::json;

    use std::time::Duration;

    fn delivery(
        id: &str,
        outgoing: OutgoingSender,
    ) -> Delivery {
        Delivery::new(
            MessageId::from(id),
            Action::new("compute", json!(id)),
            None,
            outgoing,
        )
    }

    #[tokio::test]
    async fn test_methods_install_routes_by_kind() {
        let methods = Methods::new().handle("greet", |call: Delivery| async move {
            call.respond(json!("hi"));
            Ok(())
        });
        let routes = methods.install();
        let (outgoing, mut responses) = mpsc::unbounded_channel();
        routes
            .get("greet")
            .unwrap()
            .send(delivery("m-1", outgoing))
            .unwrap();
        let response = responses.recv().await.unwrap();
        assert_eq!(response.resp_id, MessageId::from("m-1"));
        assert_eq!(response.response, Some(json!("hi")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_cancels_superseded_burst() {
        let (cancellations, mut cancelled) = broadcast::channel(16);
        let wrapped = cleanup_cancelled_messages(
            cancellations,
            latest(|call: Delivery| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                call.respond(json!("done"));
                Ok(())
            }),
        );

        let (calls_sender, calls_receiver) = mpsc::unbounded_channel();
        wrapped(calls_receiver);

        let (outgoing, mut responses) = mpsc::unbounded_channel();
        for id in ["m-1", "m-2", "m-3"] {
            calls_sender.send(delivery(id, outgoing.clone())).unwrap();
        }

        let first = cancelled.recv().await.unwrap();
        let second = cancelled.recv().await.unwrap();
        assert_eq!(first.resp_id, MessageId::from("m-1"));
        assert_eq!(second.resp_id, MessageId::from("m-2"));
        assert!(first.cancelled && second.cancelled);

        let survivor = responses.recv().await.unwrap();
        assert_eq!(survivor.resp_id, MessageId::from("m-3"));
        assert_eq!(survivor.response, Some(json!("done")));
    }

    #[tokio::test]
    async fn test_respond_with_state_is_passthrough() {
        let (outgoing, mut responses) = mpsc::unbounded_channel();
        let call = delivery("m-1", outgoing);
        call.respond_with_state(json!("value"), json!({ "cursor": 7 }));
        let response = responses.recv().await.unwrap();
        assert_eq!(response.response, Some(json!("value")));
        assert_eq!(response.state, Some(json!({ "cursor": 7 })));
        assert!(!response.cancelled);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleanup_single_message_no_cancellation() {
        let (cancellations, mut cancelled) = broadcast::channel(16);
        let wrapped = cleanup_cancelled_messages(
            cancellations,
            latest(|call: Delivery| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                call.respond(json!("done"));
                Ok(())
            }),
        );

        let (calls_sender, calls_receiver) = mpsc::unbounded_channel();
        wrapped(calls_receiver);

        let (outgoing, mut responses) = mpsc::unbounded_channel();
        calls_sender.send(delivery("m-1", outgoing)).unwrap();

        let survivor = responses.recv().await.unwrap();
        assert_eq!(survivor.resp_id, MessageId::from("m-1"));
        assert!(cancelled.try_recv().is_err());
    }
}
