// Copyright 2024 Antonio Estévez
// SPDX-License-Identifier: Apache-2.0

//! # Actor runner
//!
//! The per-actor dispatch loop. The runner owns the receiving end of the
//! actor's incoming mailbox and feeds the installed pattern; a companion
//! pump task forwards everything the pattern writes to `outgoing` onto the
//! system responses plane. A `stop` action is forwarded to user code,
//! acknowledged, and ends the loop.
//!

use crate::{
    mailbox::{IncomingReceiver, OutgoingReceiver, OutgoingSender},
    message::{Envelope, MessageResponse, SetupReply, STOP_ACTION},
    patterns::{Behavior, Delivery, ReceiveFn},
    system::ActorSystem,
    ActorPath, Error,
};

use serde_json::Value;

use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use tracing::{debug, warn};

use std::collections::HashMap;

/// The pattern after install time.
enum Installed {
    Receive(ReceiveFn),
    Methods {
        routes: HashMap<String, mpsc::UnboundedSender<Delivery>>,
    },
    Setup {
        forward: mpsc::UnboundedSender<Envelope>,
    },
}

/// Per-actor dispatch loop.
pub(crate) struct ActorRunner {
    path: ActorPath,
    installed: Installed,
    incoming: IncomingReceiver,
    outgoing: OutgoingSender,
    system: ActorSystem,
    token: CancellationToken,
}

impl ActorRunner {
    /// Installs the behavior and creates the runner.
    pub(crate) fn new(
        path: ActorPath,
        behavior: Behavior,
        incoming: IncomingReceiver,
        outgoing: OutgoingSender,
        system: ActorSystem,
        token: CancellationToken,
    ) -> Self {
        debug!("Creating new actor runner for {}.", &path);
        let installed = match behavior {
            Behavior::Receive(receive) => Installed::Receive(receive),
            Behavior::Methods(methods) => Installed::Methods {
                routes: methods.install(),
            },
            Behavior::Setup(setup) => {
                let (forward, forward_receiver) = mpsc::unbounded_channel();
                let replies = setup(forward_receiver);
                spawn_reply_lift(replies, outgoing.clone());
                Installed::Setup { forward }
            }
        };
        Self {
            path,
            installed,
            incoming,
            outgoing,
            system,
            token,
        }
    }

    /// Main loop of the actor: dispatches mailbox envelopes to the
    /// installed pattern until the actor is stopped.
    pub(crate) async fn run(mut self) {
        debug!("Running actor {}.", &self.path);
        loop {
            tokio::select! {
                received = self.incoming.recv() => {
                    match received {
                        Some(envelope) => {
                            if !self.deliver(envelope).await {
                                break;
                            }
                        }
                        None => break,
                    }
                }
                _ = self.token.cancelled() => break,
            }
        }
        debug!("Actor {} dispatch ended.", &self.path);
    }

    /// Dispatches one envelope. Returns false when the loop must end.
    async fn deliver(&mut self, envelope: Envelope) -> bool {
        let stopping = envelope.action.kind == STOP_ACTION;
        let delivery = Delivery::new(
            envelope.message_id.clone(),
            envelope.action.clone(),
            sender_ref(&self.system, &envelope),
            self.outgoing.clone(),
        );
        match &mut self.installed {
            Installed::Receive(receive) => {
                if let Err(error) = receive(delivery).await {
                    warn!(
                        "Actor {} failed to handle '{}': {}",
                        &self.path, envelope.action.kind, error
                    );
                    let _ = self.outgoing.send(MessageResponse::fail(
                        envelope.message_id.clone(),
                        error,
                    ));
                }
            }
            Installed::Methods { routes } => {
                match routes.get(&envelope.action.kind) {
                    Some(route) => {
                        if route.send(delivery).is_err() {
                            warn!(
                                "Actor {} dropped its '{}' handler.",
                                &self.path, envelope.action.kind
                            );
                            let _ = self.outgoing.send(MessageResponse::fail(
                                envelope.message_id.clone(),
                                Error::Send(format!(
                                    "handler for '{}' is gone",
                                    envelope.action.kind
                                )),
                            ));
                        }
                    }
                    None if stopping => {}
                    None => {
                        warn!(
                            "Actor {} has no handler for '{}'.",
                            &self.path, envelope.action.kind
                        );
                        let _ = self.outgoing.send(MessageResponse::fail(
                            envelope.message_id.clone(),
                            Error::UnknownAction(
                                self.path.clone(),
                                envelope.action.kind.clone(),
                            ),
                        ));
                    }
                }
            }
            Installed::Setup { forward } => {
                let _ = forward.send(envelope.clone());
            }
        }
        if stopping {
            // Acknowledge the stop so a graceful ask completes even when
            // the actor declares no stop handler of its own.
            let _ = self.outgoing.send(MessageResponse::ok(
                envelope.message_id,
                Value::Null,
            ));
            self.token.cancel();
            return false;
        }
        true
    }

}

/// Materializes the sender reference from the envelope's provenance.
fn sender_ref(
    system: &ActorSystem,
    envelope: &Envelope,
) -> Option<crate::ActorRef> {
    envelope
        .context_creator
        .clone()
        .map(|creator| system.ref_for(creator))
}

/// Pumps the actor's outgoing stream onto the system responses plane.
/// Ends once every outgoing sender is dropped.
pub(crate) fn spawn_outgoing_pump(
    mut outgoing: OutgoingReceiver,
    responses: broadcast::Sender<MessageResponse>,
) {
    tokio::spawn(async move {
        while let Some(response) = outgoing.recv().await {
            let _ = responses.send(response);
        }
    });
}

/// Lifts stream-receive replies into response envelopes.
fn spawn_reply_lift(
    mut replies: mpsc::UnboundedReceiver<SetupReply>,
    outgoing: OutgoingSender,
) {
    tokio::spawn(async move {
        while let Some(reply) = replies.recv().await {
            let _ = outgoing
                .send(MessageResponse::ok(reply.message_id, reply.resp));
        }
    });
}
