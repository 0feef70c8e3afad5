// Selection tests: glob patterns over the registry snapshot.

use switchboard::{
    Action, Actor, ActorContext, ActorPath, ActorSystem, Behavior, Delivery,
    Methods,
};

use async_trait::async_trait;

use serde_json::json;

fn spawn_system() -> ActorSystem {
    let (system, mut runner) = ActorSystem::create(None);
    tokio::spawn(async move { runner.run().await });
    system
}

struct Plain;

#[async_trait]
impl Actor for Plain {
    fn behavior(&mut self) -> Behavior {
        Methods::new()
            .handle("ping", |call: Delivery| async move {
                call.respond(json!("pong"));
                Ok(())
            })
            .into()
    }
}

async fn populate(system: &ActorSystem) {
    for address in ["a/1", "a/2", "b/1"] {
        system
            .actor_of(|_, _| Box::new(Plain) as Box<dyn Actor>, Some(address))
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn test_glob_selection() {
    let system = spawn_system();
    populate(&system).await;

    let refs = system.actor_selection("/system/a/*").await.unwrap();
    let paths: Vec<String> =
        refs.iter().map(|r| r.path().to_string()).collect();
    assert_eq!(paths, vec!["/system/a/1", "/system/a/2"]);
}

#[tokio::test]
async fn test_relative_pattern_anchors_to_system_prefix() {
    let system = spawn_system();
    populate(&system).await;

    let refs = system.actor_selection("a/*").await.unwrap();
    assert_eq!(refs.len(), 2);
    let refs = system.actor_selection("b/*").await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].path(), &ActorPath::from("/system/b/1"));
}

#[tokio::test]
async fn test_trailing_slash_is_stripped() {
    let system = spawn_system();
    populate(&system).await;

    let refs = system.actor_selection("/system/a/1/").await.unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].path(), &ActorPath::from("/system/a/1"));
}

#[tokio::test]
async fn test_selection_is_a_snapshot() {
    let system = spawn_system();
    populate(&system).await;

    let before = system.actor_selection("/system/a/*").await.unwrap();
    system
        .actor_of(|_, _| Box::new(Plain) as Box<dyn Actor>, Some("a/3"))
        .await
        .unwrap();

    // The earlier result does not grow; a new query sees the newcomer.
    assert_eq!(before.len(), 2);
    let after = system.actor_selection("/system/a/*").await.unwrap();
    assert_eq!(after.len(), 3);
}

#[tokio::test]
async fn test_selected_refs_are_askable() {
    let system = spawn_system();
    populate(&system).await;

    let refs = system.actor_selection("/system/b/*").await.unwrap();
    let reply = refs[0].ask(Action::signal("ping")).await.unwrap();
    assert_eq!(reply, Some(json!("pong")));
}

// Manager whose handler counts its own children through a
// context-anchored selection.
struct Manager {
    ctx: ActorContext,
}

#[async_trait]
impl Actor for Manager {
    fn behavior(&mut self) -> Behavior {
        let ctx = self.ctx.clone();
        Methods::new()
            .handle("count", move |call: Delivery| {
                let ctx = ctx.clone();
                async move {
                    let children = ctx.actor_selection("*").await?;
                    call.respond(json!(children.len()));
                    Ok(())
                }
            })
            .into()
    }

    async fn pre_start(
        &mut self,
        ctx: &ActorContext,
    ) -> Result<(), switchboard::Error> {
        ctx.create_child(Some("c1"), |_, _| Box::new(Plain) as Box<dyn Actor>)
            .await?;
        ctx.create_child(Some("c2"), |_, _| Box::new(Plain) as Box<dyn Actor>)
            .await?;
        Ok(())
    }
}

#[tokio::test]
async fn test_context_selection_anchors_to_own_address() {
    let system = spawn_system();
    let manager = system
        .actor_of(
            |_, ctx: &ActorContext| {
                Box::new(Manager { ctx: ctx.clone() }) as Box<dyn Actor>
            },
            Some("manager"),
        )
        .await
        .unwrap();

    let reply = manager.ask(Action::signal("count")).await.unwrap();
    assert_eq!(reply, Some(json!(2)));
}
