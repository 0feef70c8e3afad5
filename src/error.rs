// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor runtime error types
//!
//! This module defines the error conditions of the runtime: delivery
//! failures, registration conflicts, supervision misuse and handler
//! failures. Errors are cloneable and comparable so they can travel inside
//! response envelopes across the message plane and be asserted on in tests.
//!

use crate::ActorPath;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error conditions raised by the actor runtime.
///
/// # Categories
///
/// ## Communication
/// - **Send**: an envelope could not be queued or a reply channel closed.
///
/// ## Registration and lookup
/// - **Exists**: an actor is already registered at the requested address.
/// - **NotFound**: an operation referenced an address with no live record.
///
/// ## Supervision
/// - **InvalidReference**: a supervision call received a reference that is
///   not a usable actor reference; raised synchronously to the caller.
/// - **Start** / **Stop**: a lifecycle hook failed.
///
/// ## Dispatch
/// - **UnknownAction**: the addressed actor has no handler for the action
///   type. Whether this surfaces is a property of the installed pattern;
///   the mapped-methods adapter answers with it, the other adapters hand
///   every action to user code.
/// - **User**: an error produced by actor code while handling a message.
///   It is carried as the first element of a response envelope's `errors`
///   and surfaced to the originating ask; on the tell path it is logged
///   and swallowed.
///
/// ## Selection
/// - **Selection**: an address pattern failed to compile.
///
/// A lost destination is intentionally NOT an error value: the arbiter
/// drops the envelope and resolves any pending ask as a cancellation.
#[derive(Clone, Debug, Error, PartialEq, Serialize, Deserialize)]
pub enum Error {
    /// Message delivery failure.
    #[error("An error occurred while sending a message to actor: {0}.")]
    Send(String),

    /// Attempt to create an actor at a path that already exists.
    #[error("Actor '{0}' already exists.")]
    Exists(ActorPath),

    /// Reference to an address with no registered actor.
    #[error("Actor '{0}' not found.")]
    NotFound(ActorPath),

    /// A supervision call received something that is not a valid reference.
    #[error("Invalid actor reference: {0}.")]
    InvalidReference(String),

    /// The addressed actor has no handler for the action's type.
    #[error("Actor '{0}' has no handler for action '{1}'.")]
    UnknownAction(ActorPath, String),

    /// Error raised by actor code while handling a message.
    #[error("{0}")]
    User(String),

    /// An actor failed to start.
    #[error("An error occurred while starting the actor: {0}.")]
    Start(String),

    /// An actor failed to stop.
    #[error("An error occurred while stopping the actor.")]
    Stop,

    /// An address pattern could not be compiled.
    #[error("Invalid selection pattern: {0}.")]
    Selection(String),
}
