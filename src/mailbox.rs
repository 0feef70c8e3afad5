// Copyright 2024 Antonio Estévez
// SPDX-License-Identifier: Apache-2.0

//! # Mailbox
//!
//! A mailbox is the per-actor pair of streams: `incoming` carries the
//! envelopes the arbiter routes to this address in arrival order, and
//! `outgoing` carries the response envelopes emitted by the actor's
//! pattern, pumped onto the system responses plane. A mailbox is installed
//! once at actor construction and replaced only on reincarnation.
//!

use crate::message::{Envelope, MessageResponse};

use tokio::sync::mpsc;

/// Incoming half senders/receivers.
pub type IncomingSender = mpsc::UnboundedSender<Envelope>;
pub type IncomingReceiver = mpsc::UnboundedReceiver<Envelope>;

/// Outgoing half senders/receivers.
pub type OutgoingSender = mpsc::UnboundedSender<MessageResponse>;
pub type OutgoingReceiver = mpsc::UnboundedReceiver<MessageResponse>;

/// Per-actor mailbox: an incoming envelope stream and an outgoing response
/// stream. Ordering on each half is FIFO.
pub(crate) struct Mailbox {
    pub incoming_sender: IncomingSender,
    pub incoming_receiver: IncomingReceiver,
    pub outgoing_sender: OutgoingSender,
    pub outgoing_receiver: OutgoingReceiver,
}

/// Mailbox factory.
pub(crate) fn mailbox() -> Mailbox {
    let (incoming_sender, incoming_receiver) = mpsc::unbounded_channel();
    let (outgoing_sender, outgoing_receiver) = mpsc::unbounded_channel();
    Mailbox {
        incoming_sender,
        incoming_receiver,
        outgoing_sender,
        outgoing_receiver,
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn test_mailbox() {
        let mailbox = mailbox();
        assert!(!mailbox.incoming_sender.is_closed());
        assert!(!mailbox.outgoing_sender.is_closed());
    }
}
