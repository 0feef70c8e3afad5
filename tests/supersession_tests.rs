// Supersession tests: bursts of same-type requests under the
// cleanup-cancelled-messages wrapper resolve to one response and N-1
// cancellations.

use switchboard::{
    latest, Action, Actor, ActorContext, ActorRef, ActorSystem, Behavior,
    Delivery, Methods,
};

use async_trait::async_trait;

use serde_json::{json, Value};

use tokio::sync::mpsc;

use std::time::Duration;

fn spawn_system() -> ActorSystem {
    let (system, mut runner) = ActorSystem::create(None);
    tokio::spawn(async move { runner.run().await });
    system
}

// Actor whose search handler only ever serves the most recent request;
// superseded requests are answered with cancellations.
struct Searcher {
    ctx: ActorContext,
}

#[async_trait]
impl Actor for Searcher {
    fn behavior(&mut self) -> Behavior {
        let wrapped = self.ctx.cleanup_cancelled_messages(latest(
            |call: Delivery| async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                let query =
                    call.payload().as_str().unwrap_or_default().to_owned();
                call.respond(json!(format!("result:{query}")));
                Ok(())
            },
        ));
        Methods::new().stream("search", wrapped).into()
    }
}

async fn spawn_searcher(system: &ActorSystem) -> ActorRef {
    system
        .actor_of(
            |_, ctx: &ActorContext| {
                Box::new(Searcher { ctx: ctx.clone() }) as Box<dyn Actor>
            },
            Some("searcher"),
        )
        .await
        .unwrap()
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_three_cancels_first_two() {
    let system = spawn_system();
    let searcher = spawn_searcher(&system).await;

    let (done, mut completions) = mpsc::unbounded_channel();
    let ask = |index: u32| {
        let searcher = searcher.clone();
        let done = done.clone();
        async move {
            let outcome = searcher
                .ask(Action::new("search", json!(format!("q{index}"))))
                .await
                .unwrap();
            done.send((index, outcome)).unwrap();
        }
    };

    // Three asks of the same type, subscribed in succession.
    tokio::join!(ask(1), ask(2), ask(3));
    drop(done);

    let mut order: Vec<(u32, Option<Value>)> = Vec::new();
    while let Some(completion) = completions.recv().await {
        order.push(completion);
    }

    // Asks 1 and 2 complete without a value; 3 yields the response.
    // Completion order is 1, 2, 3.
    assert_eq!(
        order,
        vec![
            (1, None),
            (2, None),
            (3, Some(json!("result:q3"))),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_burst_of_five_yields_one_response() {
    let system = spawn_system();
    let searcher = spawn_searcher(&system).await;

    let (done, mut completions) = mpsc::unbounded_channel();
    let ask = |index: u32| {
        let searcher = searcher.clone();
        let done = done.clone();
        async move {
            let outcome = searcher
                .ask(Action::new("search", json!(format!("q{index}"))))
                .await
                .unwrap();
            done.send(outcome).unwrap();
        }
    };

    tokio::join!(ask(1), ask(2), ask(3), ask(4), ask(5));
    drop(done);

    let mut outcomes: Vec<Option<Value>> = Vec::new();
    while let Some(outcome) = completions.recv().await {
        outcomes.push(outcome);
    }

    let cancelled = outcomes.iter().filter(|o| o.is_none()).count();
    let answered = outcomes.iter().filter(|o| o.is_some()).count();
    assert_eq!((cancelled, answered), (4, 1));
    assert_eq!(outcomes.last().unwrap(), &Some(json!("result:q5")));
}

#[tokio::test(start_paused = true)]
async fn test_single_request_is_not_cancelled() {
    let system = spawn_system();
    let searcher = spawn_searcher(&system).await;

    let outcome = searcher
        .ask(Action::new("search", json!("solo")))
        .await
        .unwrap();
    assert_eq!(outcome, Some(json!("result:solo")));
}

#[tokio::test(start_paused = true)]
async fn test_sequential_bursts_do_not_leak_cancellations() {
    let system = spawn_system();
    let searcher = spawn_searcher(&system).await;

    // First burst.
    let first = {
        let a = searcher.ask(Action::new("search", json!("a1")));
        let b = searcher.ask(Action::new("search", json!("a2")));
        tokio::join!(a, b)
    };
    assert_eq!(first.0.unwrap(), None);
    assert_eq!(first.1.unwrap(), Some(json!("result:a2")));

    // A later burst starts from a clean buffer: its winner is answered
    // normally and only its own members are cancelled.
    let second = {
        let a = searcher.ask(Action::new("search", json!("b1")));
        let b = searcher.ask(Action::new("search", json!("b2")));
        tokio::join!(a, b)
    };
    assert_eq!(second.0.unwrap(), None);
    assert_eq!(second.1.unwrap(), Some(json!("result:b2")));
}
