// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Switchboard
//!
//! An in-process actor runtime: a library for structuring a program as a
//! hierarchy of independently addressed actors that communicate only by
//! asynchronous messages. The crate provides the coordination machinery so
//! application code can be written as pure message handlers:
//!
//! - canonical `/system/…` addresses and a registry mapping each address
//!   to at most one live actor;
//! - a single global arbiter routing every outgoing envelope to its
//!   target mailbox (FIFO per destination);
//! - the ask/tell protocol, correlating replies by message id and
//!   yielding exactly one outcome per ask: a value, an error, or a
//!   cancellation;
//! - pattern adapters turning raw mailbox streams into typed handler
//!   dispatch, including a supersession rule that answers every
//!   superseded request of a burst with a cancellation;
//! - per-actor lifecycle hooks, reincarnation and graceful stop
//!   sequences.
//!
//! ## Example
//!
//! ```ignore
//! use switchboard::{Action, Actor, ActorSystem, Behavior, Methods};
//! use serde_json::json;
//!
//! struct Greeter;
//!
//! #[async_trait::async_trait]
//! impl Actor for Greeter {
//!     fn behavior(&mut self) -> Behavior {
//!         Methods::new()
//!             .handle("greet", |call| async move {
//!                 let name = call.payload().as_str().unwrap_or("world");
//!                 call.respond(json!(format!("hi {name}")));
//!                 Ok(())
//!             })
//!             .into()
//!     }
//! }
//!
//! # async fn run() -> Result<(), switchboard::Error> {
//! let (system, mut runner) = ActorSystem::create(None);
//! tokio::spawn(async move { runner.run().await });
//!
//! let greeter = system.actor_of(|_, _| Box::new(Greeter), Some("greeter")).await?;
//! let reply = greeter.ask(Action::new("greet", json!("sam"))).await?;
//! assert_eq!(reply, Some(json!("hi sam")));
//! # Ok(())
//! # }
//! ```
//!
//! Timeouts are not provided at this layer; compose `tokio::time::timeout`
//! over the result of `ask`.
//!

mod actor;
mod error;
mod handler;
mod mailbox;
mod message;
mod path;
mod patterns;
mod runner;
mod selection;
mod system;

pub use actor::{Actor, ActorContext, ActorFactory, ActorRef};
pub use error::Error;
pub use handler::HandleHelper;
pub use mailbox::{
    IncomingReceiver, IncomingSender, OutgoingReceiver, OutgoingSender,
};
pub use message::{
    Action, Envelope, MessageId, MessageResponse, SetupReply, STOP_ACTION,
};
pub use path::{ActorPath, SYSTEM_ROOT};
pub use patterns::{
    latest, Behavior, CallStream, Delivery, EnvelopeStream, MethodFn, Methods,
    ReceiveFn, ReplyStream, SetupFn,
};
pub use system::{ActorSystem, SystemConfig, SystemRunner};
