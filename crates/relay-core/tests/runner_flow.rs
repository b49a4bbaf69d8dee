//! End-to-end handshake against the in-memory bus, from the orchestrator's side.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use relay_core::domain::{Channels, RunOutcome, RunnerState, WorkflowIds};
use relay_core::impls::{BusEvent, InMemoryBus, Role};
use relay_core::{AppBuilder, Handler, HandlerError, RunnerOptions, Task};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Greet {
    first_name: String,
    last_name: String,
}

impl Task for Greet {
    const TYPE: &'static str = "demo.greet";
    type Output = GreetOutput;
}

#[derive(Debug, Serialize)]
struct GreetOutput {
    greeting: String,
}

struct GreetHandler;

#[async_trait]
impl Handler<Greet> for GreetHandler {
    async fn handle(&self, task: Greet) -> Result<GreetOutput, HandlerError> {
        if task.first_name.is_empty() {
            return Err(HandlerError::validation("firstName must not be empty"));
        }
        Ok(GreetOutput {
            greeting: format!("Hello, {} {}", task.first_name, task.last_name),
        })
    }
}

fn channels() -> Channels {
    Channels::new("ext:ready", "ext:in", "ext:out")
}

async fn wait_for_subscriber(bus: &InMemoryBus, channel: &str) {
    for _ in 0..500 {
        if bus.subscriber_count(channel) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("runner never subscribed to {channel}");
}

#[tokio::test]
async fn orchestrator_sees_ready_then_one_envelope() {
    let bus = InMemoryBus::new();
    let mut ready = bus.watch("ext:ready");
    let mut out = bus.watch("ext:out");

    let app = AppBuilder::new()
        .register::<Greet, _>(GreetHandler)
        .unwrap()
        .expect_tasks(&["demo.greet"])
        .build()
        .unwrap();
    let runner = app
        .runner(
            "demo.greet",
            Arc::new(bus.clone()),
            channels(),
            WorkflowIds::new("wi-9", "we-3"),
        )
        .unwrap();
    let mut state = runner.state();
    let handle = tokio::spawn(runner.run());

    assert_eq!(ready.recv().await.unwrap(), "");
    wait_for_subscriber(&bus, "ext:in").await;
    assert_eq!(*state.borrow_and_update(), RunnerState::AwaitingTask);

    bus.publish(
        "ext:in",
        r#"{"inputs":{"firstName":"Ada","lastName":"Lovelace"}}"#,
    );

    let body = out.recv().await.unwrap();
    let envelope: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(
        envelope,
        json!({
            "type": "completed",
            "workflowInstanceId": "wi-9",
            "workflowExtensionId": "we-3",
            "output": {"greeting": "Hello, Ada Lovelace"}
        })
    );

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.outcomes, vec![RunOutcome::Completed]);
    assert_eq!(*state.borrow(), RunnerState::Terminated);

    // readiness strictly before subscription, envelope before teardown
    let events = bus.events();
    let position = |wanted: &BusEvent| events.iter().position(|e| e == wanted).unwrap();
    let ready_at = position(&BusEvent::Published {
        channel: "ext:ready".into(),
        payload: String::new(),
    });
    let subscribed_at = position(&BusEvent::Subscribed {
        channel: "ext:in".into(),
    });
    let published_at = position(&BusEvent::Published {
        channel: "ext:out".into(),
        payload: body.clone(),
    });
    let unsubscribed_at = position(&BusEvent::Unsubscribed {
        channel: "ext:in".into(),
    });
    assert!(ready_at < subscribed_at);
    assert!(subscribed_at < published_at);
    assert!(published_at < unsubscribed_at);
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, BusEvent::Closed { .. }))
            .count(),
        2
    );
    assert!(events.contains(&BusEvent::Connected { role: Role::Subscriber }));
}

#[tokio::test]
async fn missing_field_fails_without_calling_handler() {
    let bus = InMemoryBus::new();
    let app = AppBuilder::new()
        .register::<Greet, _>(GreetHandler)
        .unwrap()
        .build()
        .unwrap();
    let runner = app
        .runner(
            "demo.greet",
            Arc::new(bus.clone()),
            channels(),
            WorkflowIds::new("wi", "we"),
        )
        .unwrap()
        .with_options(RunnerOptions {
            detailed_errors: true,
            ..RunnerOptions::default()
        });
    let handle = tokio::spawn(runner.run());

    wait_for_subscriber(&bus, "ext:in").await;
    bus.publish("ext:in", r#"{"inputs":{"firstName":"Ada"}}"#);

    let report = handle.await.unwrap().unwrap();
    assert_eq!(report.last_outcome(), Some(RunOutcome::Failed));

    let envelope: Value = serde_json::from_str(&bus.published_on("ext:out")[0]).unwrap();
    assert_eq!(envelope["type"], "failed");
    assert_eq!(envelope["error"]["kind"], "ValidationError");
    assert!(
        envelope["error"]["message"]
            .as_str()
            .unwrap()
            .contains("lastName")
    );
}

#[tokio::test]
async fn timed_out_runner_publishes_once_and_stops_listening() {
    let bus = InMemoryBus::new();
    let app = AppBuilder::new()
        .register::<Greet, _>(GreetHandler)
        .unwrap()
        .build()
        .unwrap();
    let runner = app
        .runner(
            "demo.greet",
            Arc::new(bus.clone()),
            channels(),
            WorkflowIds::new("wi", "we"),
        )
        .unwrap()
        .with_options(RunnerOptions {
            task_timeout: Some(Duration::from_millis(20)),
            ..RunnerOptions::default()
        });

    let report = runner.run().await.unwrap();
    assert_eq!(report.outcomes, vec![RunOutcome::TimedOut]);

    // a late task reaches nobody
    assert_eq!(bus.publish("ext:in", r#"{"inputs":{}}"#), 0);
    assert_eq!(bus.published_on("ext:out").len(), 1);
}
