// Copyright 2024 Antonio Estévez
// SPDX-License-Identifier: Apache-2.0

//! # Actor
//!
//! The `actor` module provides the `Actor` trait, the `ActorRef` handle and
//! the `ActorContext` capability object passed to every actor factory.
//!

use crate::{
    message::{Action, MessageId},
    patterns::{self, Behavior, CallStream, MethodFn},
    system::ActorSystem,
    ActorPath, Error, HandleHelper,
};

use async_trait::async_trait;

use serde_json::Value;

use std::sync::Arc;

/// The `Actor` trait is the behavior contract of an addressed actor.
///
/// [`Actor::behavior`] is called exactly once per incarnation, after
/// registration, to install the mailbox pattern. The lifecycle hooks are
/// optional overrides; each fires at most once per incarnation:
/// `pre_start` before registration, `post_start` after it, `post_stop`
/// during the stop sequences, and `pre_restart`/`post_restart` around
/// reincarnation.
#[async_trait]
pub trait Actor: Send + 'static {
    /// Declares how this actor consumes its mailbox.
    fn behavior(&mut self) -> Behavior;

    /// Called before the actor is registered. A failure aborts creation.
    async fn pre_start(&mut self, _ctx: &ActorContext) -> Result<(), Error> {
        Ok(())
    }

    /// Called after the actor is registered, before its pattern is
    /// installed.
    async fn post_start(&mut self, _ctx: &ActorContext) -> Result<(), Error> {
        Ok(())
    }

    /// Called on the doomed incarnation before it is replaced.
    async fn pre_restart(
        &mut self,
        _ctx: &ActorContext,
        _error: Option<&Error>,
    ) -> Result<(), Error> {
        Ok(())
    }

    /// Called on the replacement incarnation before it is registered.
    async fn post_restart(&mut self, _ctx: &ActorContext) -> Result<(), Error> {
        Ok(())
    }

    /// Called when the actor is stopped.
    async fn post_stop(&mut self, _ctx: &ActorContext) -> Result<(), Error> {
        Ok(())
    }
}

/// Factory invoked to construct an actor at an address. Kept by the
/// registry so the same factory can reincarnate the actor later.
pub type ActorFactory =
    Arc<dyn Fn(&ActorPath, &ActorContext) -> Box<dyn Actor> + Send + Sync>;

/// Reference to an actor, addressed by path.
///
/// This is the only handle external code may hold to an actor. It carries
/// no liveness guarantee: a tell to a defunct address is dropped and an ask
/// resolves as a cancellation. The reference holds only message-plane
/// senders, never actor state; the registry remains the single owner.
pub struct ActorRef {
    path: ActorPath,
    handle: HandleHelper,
    context_creator: Option<ActorPath>,
}

impl ActorRef {
    pub(crate) fn new(
        path: ActorPath,
        handle: HandleHelper,
        context_creator: Option<ActorPath>,
    ) -> Self {
        Self {
            path,
            handle,
            context_creator,
        }
    }

    /// Stamps this reference with the sending actor's address so messages
    /// sent through it carry sender provenance.
    pub(crate) fn with_creator(mut self, creator: ActorPath) -> Self {
        self.context_creator = Some(creator);
        self
    }

    /// The address of the referenced actor.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// Tells an action to the actor, fire and forget.
    ///
    /// Completes once the envelope is queued to the arbiter.
    pub fn tell(&self, action: Action) -> Result<(), Error> {
        self.handle.tell(
            self.path.clone(),
            action,
            self.context_creator.clone(),
            None,
        )
    }

    /// Tells an action with a caller-supplied message id.
    pub fn tell_with_id(
        &self,
        action: Action,
        message_id: MessageId,
    ) -> Result<(), Error> {
        self.handle.tell(
            self.path.clone(),
            action,
            self.context_creator.clone(),
            Some(message_id),
        )
    }

    /// Asks an action and awaits its single outcome: `Ok(Some(value))` on
    /// a response, `Ok(None)` on cancellation (including a lost
    /// destination), `Err` on a handler failure.
    pub async fn ask(&self, action: Action) -> Result<Option<Value>, Error> {
        self.handle
            .ask(
                self.path.clone(),
                action,
                self.context_creator.clone(),
                None,
            )
            .await
    }

    /// Asks an action with a caller-supplied message id.
    pub async fn ask_with_id(
        &self,
        action: Action,
        message_id: MessageId,
    ) -> Result<Option<Value>, Error> {
        self.handle
            .ask(
                self.path.clone(),
                action,
                self.context_creator.clone(),
                Some(message_id),
            )
            .await
    }

    /// True if the system message plane is gone.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

impl Clone for ActorRef {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            handle: self.handle.clone(),
            context_creator: self.context_creator.clone(),
        }
    }
}

impl std::fmt::Debug for ActorRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorRef").field("path", &self.path).finish()
    }
}

/// The per-actor capability object, handed to the factory at construction.
///
/// References obtained through a context carry the owning actor's address
/// as sender provenance, so handlers on the receiving side can materialize
/// a reply-to reference.
pub struct ActorContext {
    path: ActorPath,
    system: ActorSystem,
}

impl ActorContext {
    pub(crate) fn new(path: ActorPath, system: ActorSystem) -> Self {
        Self { path, system }
    }

    /// The address of this actor.
    pub fn path(&self) -> &ActorPath {
        &self.path
    }

    /// The actor system.
    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    /// Reference to this actor itself.
    pub fn self_ref(&self) -> ActorRef {
        self.system
            .ref_for(self.path.clone())
            .with_creator(self.path.clone())
    }

    /// Reference to this actor's parent, derived by dropping the last
    /// address segment; the parent of a top-level actor is the system
    /// prefix.
    pub fn parent(&self) -> ActorRef {
        self.system
            .ref_for(self.path.parent())
            .with_creator(self.path.clone())
    }

    /// Creates a child actor under this actor.
    ///
    /// # Arguments
    ///
    /// * `name` - The local name of the child; a UUID is allocated when
    ///   absent.
    /// * `factory` - The factory that constructs the child actor.
    ///
    /// # Returns
    ///
    /// Returns the reference of the child actor, stamped with this actor's
    /// address as sender provenance.
    ///
    /// # Errors
    ///
    /// Returns an error if the child actor could not be created.
    ///
    pub async fn create_child<F>(
        &self,
        name: Option<&str>,
        factory: F,
    ) -> Result<ActorRef, Error>
    where
        F: Fn(&ActorPath, &ActorContext) -> Box<dyn Actor>
            + Send
            + Sync
            + 'static,
    {
        let path = match name {
            Some(name) => self.path.clone() / name,
            None => {
                self.path.clone() / uuid::Uuid::new_v4().to_string().as_str()
            }
        };
        let child = self
            .system
            .create_actor_path(path, Arc::new(factory))
            .await?;
        Ok(child.with_creator(self.path.clone()))
    }

    /// Retrieves a child actor running under this actor, if it exists.
    pub async fn get_child(&self, name: &str) -> Option<ActorRef> {
        let path = self.path.clone() / name;
        self.system
            .get_actor(&path)
            .await
            .map(|child| child.with_creator(self.path.clone()))
    }

    /// Looks up registered actors by address pattern, anchored at this
    /// actor's own address when the pattern is relative.
    pub async fn actor_selection(
        &self,
        pattern: &str,
    ) -> Result<Vec<ActorRef>, Error> {
        let refs =
            self.system.actor_selection_from(pattern, &self.path).await?;
        Ok(refs
            .into_iter()
            .map(|r| r.with_creator(self.path.clone()))
            .collect())
    }

    /// Schedules the immediate stop sequence for the target.
    pub async fn stop(&self, target: &ActorRef) -> Result<(), Error> {
        self.system.stop(target).await
    }

    /// Runs the graceful stop sequence for each target, serially.
    pub async fn graceful_stop(
        &self,
        targets: &[ActorRef],
    ) -> Result<Vec<Result<Option<Value>, Error>>, Error> {
        self.system.graceful_stop(targets).await
    }

    /// Wraps a method stream handler so superseded calls are answered with
    /// cancellation envelopes. See the `patterns` module.
    pub fn cleanup_cancelled_messages<F>(&self, user_fn: F) -> MethodFn
    where
        F: FnOnce(CallStream) + Send + 'static,
    {
        patterns::cleanup_cancelled_messages(
            self.system.handle().cancellations_sender(),
            user_fn,
        )
    }
}

impl Clone for ActorContext {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            system: self.system.clone(),
        }
    }
}
