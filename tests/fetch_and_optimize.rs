use std::sync::Arc;
use std::time::Duration;

use faction_ops::Error;
use faction_ops::api::{
    CircuitBreaker, CircuitBreakerConfig, HttpTransport, OutcomeKind, RateLimiter, ResilientClient,
    RetryPolicy,
};
use faction_ops::clock::{Clock, SystemClock, TokioSleeper};
use faction_ops::loader::{FactionLoader, Snapshot};
use faction_ops::optimizer::{MatchBasis, Matcher, OptimizerConfig};
use faction_ops::sync::{FactionSync, snapshot_path};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MEMBERS: &str = r#"{"members":[
    {"id":1,"name":"Vex","last_action":1741600000},
    {"id":2,"name":"Nyx"}
]}"#;

const TASKS: &str = r#"{"tasks":[
    {"id":50,"name":"Heist","difficulty":5,
     "reward":{"type":"money","amount":2000000},
     "slots":[
        {"position":"Hacker#1","position_id":100},
        {"position":"Muscle","position_id":101},
        {"position":"Driver","position_id":102,"user_id":9}
     ]}
]}"#;

const HISTORY: &str = r#"{"records":[
    {"user_id":1,"faction_id":7,"task_name":"Heist","position":"Hacker#2","success":true},
    {"user_id":1,"faction_id":7,"task_name":"Heist","position":"Hacker#2","success":true},
    {"user_id":2,"faction_id":7,"task_name":"Heist","position":"Muscle","success":true},
    {"user_id":2,"faction_id":7,"task_name":"Heist","position":"Muscle","success":false},
    {"user_id":2,"faction_id":3,"task_name":"Heist","position":"Muscle","success":false}
]}"#;

async fn mount_faction(server: &MockServer, id: u64) {
    Mock::given(method("GET"))
        .and(path(format!("/faction/{id}/members")))
        .respond_with(ResponseTemplate::new(200).set_body_string(MEMBERS))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/faction/{id}/tasks")))
        .and(query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_string(TASKS))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/faction/{id}/history")))
        .respond_with(ResponseTemplate::new(200).set_body_string(HISTORY))
        .mount(server)
        .await;
}

fn client() -> ResilientClient<HttpTransport> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    ResilientClient::new(
        HttpTransport::new(Duration::from_secs(5)).unwrap(),
        TokioSleeper::default(),
        Arc::new(CircuitBreaker::new(CircuitBreakerConfig::default(), Arc::clone(&clock))),
        Arc::new(RateLimiter::new(Duration::ZERO, clock)),
        RetryPolicy {
            max_retries: 2,
            initial_delay: Duration::from_millis(5),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10),
        },
    )
}

#[tokio::test]
async fn fetched_snapshot_feeds_the_optimizer() {
    let server = MockServer::start().await;
    mount_faction(&server, 7).await;
    let dir = tempfile::tempdir().unwrap();

    let client = client();
    let loader = FactionLoader::new(&client, server.uri(), "key");
    let sync = FactionSync::new(loader, Arc::new(SystemClock), Duration::ZERO, dir.path());
    let report = sync.run(&[7]).await;
    assert!(report.is_clean(), "{report:?}");

    let snapshot = Snapshot::load(&snapshot_path(dir.path(), 7)).unwrap();
    assert_eq!(snapshot.actors.len(), 2);
    // Filled Driver slot is not offered.
    assert_eq!(snapshot.slots.len(), 2);
    assert_eq!(snapshot.observations.len(), 1);

    let matcher = Matcher::new(OptimizerConfig::default(), snapshot.generated_at);
    let result = matcher.optimize(&snapshot.actors, &snapshot.slots, &snapshot.observations);

    assert_eq!(result.assignments.len(), 2);
    let vex = result
        .assignments
        .iter()
        .find(|a| a.actor.id == 1)
        .unwrap();
    // Hacker#2 history covers Hacker#1 through the shared role group.
    assert_eq!(vex.slot.position_id, 100);
    assert_eq!(vex.basis, MatchBasis::Capability);

    let nyx = result
        .assignments
        .iter()
        .find(|a| a.actor.id == 2)
        .unwrap();
    assert_eq!(nyx.slot.position_id, 101);
    assert_eq!(nyx.basis, MatchBasis::Fallback);
    assert!(nyx.reasoning.starts_with("Fallback"));
    assert!(result.unfilled_slots.is_empty());
    assert!(result.unassigned_actors.is_empty());
}

#[tokio::test]
async fn one_failing_faction_does_not_stop_the_rest() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/faction/8/members"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;
    mount_faction(&server, 9).await;
    let dir = tempfile::tempdir().unwrap();

    let client = client();
    let loader = FactionLoader::new(&client, format!("{}/", server.uri()), "key");
    let sync = FactionSync::new(loader, Arc::new(SystemClock), Duration::from_millis(1), dir.path());
    let report = sync.run(&[8, 9]).await;

    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].0, 8);
    assert_eq!(report.saved.len(), 1);
    assert!(snapshot_path(dir.path(), 9).exists());
    assert!(!snapshot_path(dir.path(), 8).exists());
}

#[tokio::test]
async fn loader_surfaces_api_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = client();
    let loader = FactionLoader::new(&client, server.uri(), "key");
    let err = loader.load(404, chrono::Utc::now()).await.unwrap_err();
    assert!(matches!(
        err,
        Error::Api {
            kind: OutcomeKind::NotFound,
            ..
        }
    ));
}
