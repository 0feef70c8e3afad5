// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! # Actor system
//!
//! The `system` module provides the `ActorSystem` type: the registry of
//! live actors plus the message plane, and the supervision operations over
//! them. `ActorSystem::create` also returns the `SystemRunner`, the single
//! global arbiter task that routes every outgoing envelope to its target
//! mailbox; callers spawn it once and keep the system handle.
//!

use crate::{
    actor::{Actor, ActorContext, ActorFactory, ActorRef},
    mailbox::{mailbox, IncomingSender, Mailbox},
    message::{Action, Envelope, MessageId, STOP_ACTION},
    runner::{spawn_outgoing_pump, ActorRunner},
    selection, ActorPath, Error, HandleHelper,
};

use serde_json::Value;

use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tokio_util::sync::CancellationToken;

use tracing::{debug, error, warn};

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

/// Actor system options.
#[derive(Default)]
pub struct SystemConfig {
    /// Depth of the responses and cancellations broadcast planes. Must
    /// comfortably exceed the number of replies in flight at once; a slow
    /// asker that lags past it may miss its reply.
    pub plane_capacity: usize,
    /// Externally owned cancellation token for the whole system.
    pub token: Option<CancellationToken>,
}

impl SystemConfig {
    fn plane_capacity(&self) -> usize {
        if self.plane_capacity == 0 {
            128
        } else {
            self.plane_capacity
        }
    }
}

/// The live object registered at an address.
pub(crate) struct ActorRecord {
    /// Sender half of the actor's incoming mailbox.
    incoming: IncomingSender,
    /// The actor object, kept for lifecycle hooks and reincarnation.
    actor: Arc<Mutex<Box<dyn Actor>>>,
    /// The original factory, kept for reincarnation.
    factory: ActorFactory,
    /// Cancels this incarnation's dispatch loop.
    token: CancellationToken,
    /// Guards post_stop so it fires at most once per incarnation.
    stopped: Arc<AtomicBool>,
}

/// Actor system: registry plus message plane handle.
pub struct ActorSystem {
    /// The actors running in this actor system.
    registry: Arc<RwLock<HashMap<ActorPath, ActorRecord>>>,
    /// The message plane handle.
    handle: HandleHelper,
    /// The cancellation token for the actor system.
    token: CancellationToken,
}

impl ActorSystem {
    /// Create a new actor system.
    ///
    /// # Returns
    ///
    /// Returns a tuple with the system handle and the system runner. The
    /// runner is the arbiter: nothing is delivered until it is spawned.
    ///
    pub fn create(config: Option<SystemConfig>) -> (ActorSystem, SystemRunner) {
        let config = config.unwrap_or_default();
        let token = config.token.clone().unwrap_or_default();

        let (arbiter_sender, arbiter_receiver) = mpsc::unbounded_channel();
        let (responses, _) = broadcast::channel(config.plane_capacity());
        let (cancellations, _) = broadcast::channel(config.plane_capacity());
        let handle =
            HandleHelper::new(arbiter_sender, responses, cancellations);

        let system = ActorSystem {
            registry: Arc::new(RwLock::new(HashMap::new())),
            handle,
            token: token.clone(),
        };
        let runner = SystemRunner::new(system.clone(), arbiter_receiver, token);
        (system, runner)
    }

    /// The message plane handle.
    pub(crate) fn handle(&self) -> &HandleHelper {
        &self.handle
    }

    /// Builds a reference for an address without checking liveness.
    ///
    /// Operations through the reference follow the defunct-address rules:
    /// tells are dropped, asks resolve as cancellations.
    pub fn ref_for(&self, path: impl Into<ActorPath>) -> ActorRef {
        ActorRef::new(path.into(), self.handle.clone(), None)
    }

    /// Retrieves a reference to a registered actor, or `None` if no actor
    /// lives at the path.
    pub async fn get_actor(&self, path: &ActorPath) -> Option<ActorRef> {
        let registry = self.registry.read().await;
        registry.get(path).map(|_| self.ref_for(path.clone()))
    }

    /// Launches a new actor in this actor system.
    ///
    /// The registration sequence is: allocate the canonical address (a
    /// UUID under the system prefix when absent), build the context,
    /// construct the actor via the factory, fire `pre_start`, register,
    /// fire `post_start`, install the declared pattern.
    ///
    /// # Arguments
    ///
    /// * `factory` - The factory that constructs the actor.
    /// * `address` - The address to register at, if any.
    ///
    /// # Returns
    ///
    /// Returns the actor reference.
    ///
    /// # Errors
    ///
    /// Returns an error if an actor already exists at the address or if
    /// `pre_start` fails.
    ///
    pub async fn actor_of<F>(
        &self,
        factory: F,
        address: Option<&str>,
    ) -> Result<ActorRef, Error>
    where
        F: Fn(&ActorPath, &ActorContext) -> Box<dyn Actor>
            + Send
            + Sync
            + 'static,
    {
        let path = ActorPath::canonical(address);
        self.create_actor_path(path, Arc::new(factory)).await
    }

    /// Creates an actor at an exact path. If the actor already exists, an
    /// error is returned.
    pub(crate) async fn create_actor_path(
        &self,
        path: ActorPath,
        factory: ActorFactory,
    ) -> Result<ActorRef, Error> {
        {
            let registry = self.registry.read().await;
            if registry.contains_key(&path) {
                error!("Actor '{}' already exists!", &path);
                return Err(Error::Exists(path));
            }
        }

        let ctx = ActorContext::new(path.clone(), self.clone());
        let mut actor = factory(&path, &ctx);
        actor
            .pre_start(&ctx)
            .await
            .map_err(|error| Error::Start(error.to_string()))?;

        let mailbox = mailbox();
        let token = self.token.child_token();
        let actor = Arc::new(Mutex::new(actor));
        let record = ActorRecord {
            incoming: mailbox.incoming_sender.clone(),
            actor: actor.clone(),
            factory,
            token: token.clone(),
            stopped: Arc::new(AtomicBool::new(false)),
        };
        {
            let mut registry = self.registry.write().await;
            if registry.contains_key(&path) {
                error!("Actor '{}' already exists!", &path);
                return Err(Error::Exists(path));
            }
            registry.insert(path.clone(), record);
        }
        debug!("Actor '{}' registered.", &path);

        let behavior = {
            let mut guard = actor.lock().await;
            if let Err(err) = guard.post_start(&ctx).await {
                warn!("Actor '{}' post_start failed: {}", &path, err);
            }
            guard.behavior()
        };
        self.install(path.clone(), behavior, mailbox, token);
        Ok(self.ref_for(path))
    }

    /// Spawns the dispatch loop and the outgoing pump for a registered
    /// actor.
    fn install(
        &self,
        path: ActorPath,
        behavior: crate::patterns::Behavior,
        mailbox: Mailbox,
        token: CancellationToken,
    ) {
        spawn_outgoing_pump(
            mailbox.outgoing_receiver,
            self.handle.responses_sender(),
        );
        let runner = ActorRunner::new(
            path,
            behavior,
            mailbox.incoming_receiver,
            mailbox.outgoing_sender,
            self.clone(),
            token,
        );
        tokio::spawn(runner.run());
    }

    /// Replaces the actor at an address with a fresh incarnation built by
    /// the given factory.
    ///
    /// Fires `pre_restart` on the doomed record, cancels its dispatch
    /// loop, constructs the replacement with a new mailbox, fires
    /// `post_restart` and registers it in place of the old record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no actor lives at the address, or `Start` if
    /// `post_restart` fails.
    ///
    pub async fn reincarnate<F>(
        &self,
        address: impl Into<ActorPath>,
        factory: F,
    ) -> Result<ActorRef, Error>
    where
        F: Fn(&ActorPath, &ActorContext) -> Box<dyn Actor>
            + Send
            + Sync
            + 'static,
    {
        self.reincarnate_with(address.into().anchored(), Arc::new(factory))
            .await
    }

    /// Restarts the actor at an address with its original factory.
    pub async fn restart(
        &self,
        address: impl Into<ActorPath>,
    ) -> Result<ActorRef, Error> {
        let path = address.into().anchored();
        let factory = self
            .factory_of(&path)
            .await
            .ok_or_else(|| Error::NotFound(path.clone()))?;
        self.reincarnate_with(path, factory).await
    }

    async fn reincarnate_with(
        &self,
        path: ActorPath,
        factory: ActorFactory,
    ) -> Result<ActorRef, Error> {
        let doomed = {
            let registry = self.registry.read().await;
            registry
                .get(&path)
                .map(|record| (record.actor.clone(), record.token.clone()))
        };
        let Some((doomed_actor, doomed_token)) = doomed else {
            return Err(Error::NotFound(path));
        };

        let ctx = ActorContext::new(path.clone(), self.clone());
        if let Err(err) =
            doomed_actor.lock().await.pre_restart(&ctx, None).await
        {
            warn!("Actor '{}' pre_restart failed: {}", &path, err);
        }
        doomed_token.cancel();

        let mut actor = factory(&path, &ctx);
        actor
            .post_restart(&ctx)
            .await
            .map_err(|error| Error::Start(error.to_string()))?;
        let behavior = actor.behavior();

        let mailbox = mailbox();
        let token = self.token.child_token();
        let record = ActorRecord {
            incoming: mailbox.incoming_sender.clone(),
            actor: Arc::new(Mutex::new(actor)),
            factory,
            token: token.clone(),
            stopped: Arc::new(AtomicBool::new(false)),
        };
        {
            let mut registry = self.registry.write().await;
            registry.insert(path.clone(), record);
        }
        debug!("Actor '{}' reincarnated.", &path);

        self.install(path.clone(), behavior, mailbox, token);
        Ok(self.ref_for(path))
    }

    /// Looks up registered actors by address pattern.
    ///
    /// Relative patterns are anchored at the system prefix. The result is
    /// a snapshot of the registry at call time, not a live view.
    pub async fn actor_selection(
        &self,
        pattern: &str,
    ) -> Result<Vec<ActorRef>, Error> {
        self.actor_selection_from(pattern, &ActorPath::system_prefix())
            .await
    }

    /// Selection anchored at an explicit prefix instead of the system
    /// prefix.
    pub async fn actor_selection_from(
        &self,
        pattern: &str,
        prefix: &ActorPath,
    ) -> Result<Vec<ActorRef>, Error> {
        let compiled = selection::compile(pattern, prefix)?;
        let registry = self.registry.read().await;
        let mut refs: Vec<ActorRef> = registry
            .keys()
            .filter(|path| selection::matches(&compiled, path))
            .map(|path| self.ref_for(path.clone()))
            .collect();
        refs.sort_by(|a, b| a.path().cmp(b.path()));
        Ok(refs)
    }

    /// Asks an action to the actor at the address and awaits its single
    /// outcome.
    pub async fn ask(
        &self,
        address: impl Into<ActorPath>,
        action: Action,
    ) -> Result<Option<Value>, Error> {
        self.handle.ask(address.into(), action, None, None).await
    }

    /// Ask with a caller-supplied message id.
    pub async fn ask_with_id(
        &self,
        address: impl Into<ActorPath>,
        action: Action,
        message_id: MessageId,
    ) -> Result<Option<Value>, Error> {
        self.handle
            .ask(address.into(), action, None, Some(message_id))
            .await
    }

    /// Tells an action to the actor at the address, fire and forget.
    pub fn tell(
        &self,
        address: impl Into<ActorPath>,
        action: Action,
    ) -> Result<(), Error> {
        self.handle.tell(address.into(), action, None, None)
    }

    /// Tell with a caller-supplied message id.
    pub fn tell_with_id(
        &self,
        address: impl Into<ActorPath>,
        action: Action,
        message_id: MessageId,
    ) -> Result<(), Error> {
        self.handle
            .tell(address.into(), action, None, Some(message_id))
    }

    /// Schedules the immediate stop sequence for the target: tell a
    /// `stop` action, fire `post_stop`, deregister.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the target is not a usable reference.
    ///
    pub async fn stop(&self, target: &ActorRef) -> Result<(), Error> {
        validate_ref(target)?;
        let _ = self.tell(target.path().clone(), Action::signal(STOP_ACTION));
        self.finish_stop(target.path()).await;
        Ok(())
    }

    /// Runs the graceful stop sequence for each target, serially: ask a
    /// `stop` action and await its outcome, fire `post_stop`, deregister.
    ///
    /// # Returns
    ///
    /// Returns the per-target stop ask outcomes, in input order.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if any target is not a usable reference;
    /// in that case nothing is stopped.
    ///
    pub async fn graceful_stop(
        &self,
        targets: &[ActorRef],
    ) -> Result<Vec<Result<Option<Value>, Error>>, Error> {
        for target in targets {
            validate_ref(target)?;
        }
        let mut outcomes = Vec::with_capacity(targets.len());
        for target in targets {
            let outcome = self
                .ask(target.path().clone(), Action::signal(STOP_ACTION))
                .await;
            self.finish_stop(target.path()).await;
            outcomes.push(outcome);
        }
        Ok(outcomes)
    }

    /// Deregisters the record at the path, firing `post_stop` at most once
    /// per incarnation.
    async fn finish_stop(&self, path: &ActorPath) {
        let record = {
            let mut registry = self.registry.write().await;
            registry.remove(path)
        };
        if let Some(record) = record {
            if !record.stopped.swap(true, Ordering::SeqCst) {
                let ctx = ActorContext::new(path.clone(), self.clone());
                if record.actor.lock().await.post_stop(&ctx).await.is_err() {
                    error!("Actor '{}' failed to stop!", path);
                }
            }
            record.token.cancel();
            debug!("Actor '{}' deregistered.", path);
        }
    }

    /// Get the direct children of an address, from the registry snapshot.
    pub async fn children(&self, path: &ActorPath) -> Vec<ActorPath> {
        let registry = self.registry.read().await;
        let mut children = vec![];
        for actor in registry.keys() {
            if actor.is_child_of(path) {
                children.push(actor.clone());
            }
        }
        children.sort();
        children
    }

    /// Snapshot of every registered address.
    pub async fn addresses(&self) -> Vec<ActorPath> {
        let registry = self.registry.read().await;
        let mut addresses: Vec<ActorPath> = registry.keys().cloned().collect();
        addresses.sort();
        addresses
    }

    /// The original factory registered at an address, if any.
    pub(crate) async fn factory_of(
        &self,
        path: &ActorPath,
    ) -> Option<ActorFactory> {
        let registry = self.registry.read().await;
        registry.get(path).map(|record| record.factory.clone())
    }

    /// Routes one envelope to its target mailbox. A miss drops the
    /// envelope and resolves any pending ask for it as a cancellation.
    pub(crate) async fn route(&self, envelope: Envelope) {
        let target = {
            let registry = self.registry.read().await;
            registry
                .get(&envelope.address)
                .map(|record| record.incoming.clone())
        };
        match target {
            Some(incoming) => {
                if incoming.send(envelope.clone()).is_err() {
                    self.lost(envelope);
                }
            }
            None => self.lost(envelope),
        }
    }

    fn lost(&self, envelope: Envelope) {
        debug!(
            "No actor at '{}', dropping message {}.",
            envelope.address, envelope.message_id
        );
        self.handle.publish_cancellation(envelope.message_id);
    }

    /// Stops every registered actor, then cancels the system token so the
    /// arbiter exits.
    pub async fn shutdown(&self) {
        let paths = self.addresses().await;
        for path in paths {
            self.finish_stop(&path).await;
        }
        self.token.cancel();
    }
}

impl Clone for ActorSystem {
    fn clone(&self) -> Self {
        Self {
            registry: self.registry.clone(),
            handle: self.handle.clone(),
            token: self.token.clone(),
        }
    }
}

/// Rejects references that cannot address an actor in this system.
fn validate_ref(target: &ActorRef) -> Result<(), Error> {
    if target.path().is_empty() || !target.path().is_anchored() {
        return Err(Error::InvalidReference(target.path().to_string()));
    }
    Ok(())
}

/// System runner: the arbiter.
///
/// Single global ingress for outgoing messages; owns the sole receiving
/// end of the arbiter channel and routes each envelope to the mailbox of
/// the addressed actor. The loop survives every downstream failure and
/// ends only on token cancellation.
pub struct SystemRunner {
    system: ActorSystem,
    ingress: mpsc::UnboundedReceiver<Envelope>,
    token: CancellationToken,
}

impl SystemRunner {
    pub(crate) fn new(
        system: ActorSystem,
        ingress: mpsc::UnboundedReceiver<Envelope>,
        token: CancellationToken,
    ) -> Self {
        Self {
            system,
            ingress,
            token,
        }
    }

    /// Run the arbiter.
    pub async fn run(&mut self) {
        debug!("Running actor system arbiter...");
        loop {
            tokio::select! {
                received = self.ingress.recv() => {
                    match received {
                        Some(envelope) => {
                            self.system.route(envelope).await;
                        }
                        None => break,
                    }
                }
                _ = self.token.cancelled() => {
                    debug!("Actor system arbiter stopped.");
                    break;
                }
            }
        }
    }
}
