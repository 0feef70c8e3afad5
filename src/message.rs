// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Messages and envelopes
//!
//! The `message` module provides the wire shapes of the message plane:
//! actions, the envelopes the arbiter routes, and the response envelopes
//! the ask path correlates by message id.
//!

use crate::{ActorPath, Error};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use uuid::Uuid;

use std::fmt::{self, Formatter};

/// Action type of the synthetic stop message delivered by the supervision
/// operations.
pub const STOP_ACTION: &str = "stop";

/// Correlation identifier of a single ask or tell call.
///
/// Generated ids are UUID v4. A caller may supply its own id, but reusing
/// an id while another call with the same id is still in flight leaves the
/// second caller's outcome undefined.
#[derive(Clone, Hash, Eq, PartialEq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageId(String);

impl MessageId {
    /// Allocates a fresh unique message id.
    pub fn new() -> Self {
        MessageId(Uuid::new_v4().to_string())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for MessageId {
    fn from(value: &str) -> Self {
        MessageId(value.to_owned())
    }
}

impl From<String> for MessageId {
    fn from(value: String) -> Self {
        MessageId(value)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What an actor is asked to do: a dispatch type plus an opaque payload.
///
/// The `kind` field is the sole dispatch key of the mapped-methods pattern
/// and serializes as `type`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Action {
    /// Dispatch type of the action.
    #[serde(rename = "type")]
    pub kind: String,
    /// Opaque payload handed to the handler.
    #[serde(default)]
    pub payload: Value,
}

impl Action {
    /// Creates an action with a payload.
    pub fn new(kind: impl Into<String>, payload: Value) -> Self {
        Action {
            kind: kind.into(),
            payload,
        }
    }

    /// Creates a payload-less action.
    pub fn signal(kind: impl Into<String>) -> Self {
        Action {
            kind: kind.into(),
            payload: Value::Null,
        }
    }
}

/// Envelope routed by the arbiter to the addressed actor's mailbox.
///
/// `context_creator` carries the sender's address when the message was sent
/// through a reference obtained from an actor context; handlers use it to
/// materialize a reply-to reference. It is preserved verbatim end to end.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    /// Correlation id, unique per ask/tell call.
    pub message_id: MessageId,
    /// Destination address.
    pub address: ActorPath,
    /// The action to perform.
    pub action: Action,
    /// Address of the sending actor, if the message was sent from one.
    pub context_creator: Option<ActorPath>,
}

/// Reply envelope published on the responses plane.
///
/// `resp_id` equals the originating envelope's `message_id`. Exactly one of
/// three outcomes is encoded: a value (`response`), a failure (`errors`
/// non-empty, first error wins) or a cancellation (`cancelled`). `state` is
/// opaque passthrough for handlers that thread their own state alongside a
/// reply; the runtime never reads it.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    /// Correlation id of the originating message.
    pub resp_id: MessageId,
    /// Response value, if the handler produced one.
    pub response: Option<Value>,
    /// Errors raised while handling the message.
    pub errors: Vec<Error>,
    /// Opaque handler state passed through unchanged.
    pub state: Option<Value>,
    /// True if the message was superseded or its destination was lost.
    pub cancelled: bool,
}

impl MessageResponse {
    /// Creates a normal response envelope.
    pub fn ok(resp_id: MessageId, response: Value) -> Self {
        MessageResponse {
            resp_id,
            response: Some(response),
            errors: vec![],
            state: None,
            cancelled: false,
        }
    }

    /// Creates a normal response envelope carrying opaque handler state.
    pub fn ok_with_state(
        resp_id: MessageId,
        response: Value,
        state: Value,
    ) -> Self {
        MessageResponse {
            resp_id,
            response: Some(response),
            errors: vec![],
            state: Some(state),
            cancelled: false,
        }
    }

    /// Creates a failure envelope.
    pub fn fail(resp_id: MessageId, error: Error) -> Self {
        MessageResponse {
            resp_id,
            response: None,
            errors: vec![error],
            state: None,
            cancelled: false,
        }
    }

    /// Creates a cancellation envelope.
    pub fn cancelled(resp_id: MessageId) -> Self {
        MessageResponse {
            resp_id,
            response: None,
            errors: vec![],
            state: None,
            cancelled: true,
        }
    }
}

/// Element emitted by a stream-receive actor, lifted by the runtime into a
/// normal response envelope.
#[derive(Clone, Debug)]
pub struct SetupReply {
    /// Correlation id of the message being answered.
    pub message_id: MessageId,
    /// Response value.
    pub resp: Value,
}

#[cfg(test)]
mod tests {

    use super::*;

    use serde_json::json;

    #[test]
    fn test_message_ids_unique() {
        assert_ne!(MessageId::new(), MessageId::new());
    }

    #[test]
    fn test_action_serializes_type_key() {
        let action = Action::new("greet", json!("sam"));
        let encoded = serde_json::to_value(&action).unwrap();
        assert_eq!(encoded, json!({ "type": "greet", "payload": "sam" }));
    }

    #[test]
    fn test_response_constructors() {
        let id = MessageId::from("m-1");
        let ok = MessageResponse::ok(id.clone(), json!(1));
        assert!(!ok.cancelled && ok.errors.is_empty());

        let fail =
            MessageResponse::fail(id.clone(), Error::User("boom".to_owned()));
        assert!(fail.response.is_none());
        assert_eq!(fail.errors.len(), 1);

        let cancelled = MessageResponse::cancelled(id);
        assert!(cancelled.cancelled && cancelled.response.is_none());
    }
}
