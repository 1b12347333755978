//! Shared harness for integration tests: a client wired to a wiremock
//! server, with recording doubles behind the public capability traits.

use async_trait::async_trait;
use skillforge_client::events::{ClientEvents, NavigationHint, Severity};
use skillforge_client::resilience::Sleeper;
use skillforge_client::{SkillforgeClient, SkillforgeClientBuilder};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use wiremock::MockServer;

/// Events observer that records everything it sees.
#[derive(Default)]
pub struct RecordingEvents {
    notifications: Mutex<Vec<(String, Severity)>>,
    navigations: Mutex<Vec<(NavigationHint, Option<String>)>>,
}

impl RecordingEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<(String, Severity)> {
        self.notifications.lock().unwrap().clone()
    }

    pub fn navigations(&self) -> Vec<(NavigationHint, Option<String>)> {
        self.navigations.lock().unwrap().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.lock().unwrap().is_empty() && self.navigations.lock().unwrap().is_empty()
    }
}

#[async_trait]
impl ClientEvents for RecordingEvents {
    async fn notify(&self, message: &str, severity: Severity) {
        self.notifications
            .lock()
            .unwrap()
            .push((message.to_string(), severity));
    }

    async fn navigate(&self, hint: NavigationHint, return_to: Option<&str>) {
        self.navigations
            .lock()
            .unwrap()
            .push((hint, return_to.map(|s| s.to_string())));
    }
}

/// Sleeper that records requested pauses and returns immediately, so retry
/// schedules are observable without the test actually waiting.
#[derive(Default)]
pub struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recorded(&self) -> Vec<Duration> {
        self.slept.lock().unwrap().clone()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

pub struct Harness {
    pub server: MockServer,
    pub events: Arc<RecordingEvents>,
    pub sleeper: Arc<RecordingSleeper>,
    pub client: SkillforgeClient,
}

pub async fn harness() -> Harness {
    harness_configured(|builder| builder).await
}

pub async fn harness_configured(
    tune: impl FnOnce(SkillforgeClientBuilder) -> SkillforgeClientBuilder,
) -> Harness {
    let server = MockServer::start().await;
    let events = Arc::new(RecordingEvents::new());
    let sleeper = Arc::new(RecordingSleeper::new());
    let builder = SkillforgeClient::builder()
        .base_url(server.uri())
        .events(events.clone())
        .sleeper(sleeper.clone());
    let client = tune(builder).build().expect("client builds");
    Harness {
        server,
        events,
        sleeper,
        client,
    }
}
