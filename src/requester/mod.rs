//! Rate-limited, priority-queued upstream HTTP client.
//!
//! A single background worker dequeues requests highest-priority-first
//! (FIFO within a priority), enforces a minimum interval between dispatches,
//! and reports results back to callers via a one-shot channel — the async
//! equivalent of the upstream implementation's condition-variable wakeup
//! and blocking-caller design.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, oneshot};
use tokio::time::Instant;

use crate::config::Config;
use crate::error::{Error, RequesterError, Result};
use crate::types::RequestPriority;

struct PendingRequest {
    url: String,
    reply: oneshot::Sender<Result<String>>,
}

#[derive(Default)]
struct Queues {
    high: VecDeque<PendingRequest>,
    normal: VecDeque<PendingRequest>,
    low: VecDeque<PendingRequest>,
}

impl Queues {
    fn push(&mut self, priority: RequestPriority, req: PendingRequest) {
        match priority {
            RequestPriority::High => self.high.push_back(req),
            RequestPriority::Normal => self.normal.push_back(req),
            RequestPriority::Low => self.low.push_back(req),
        }
    }

    fn pop(&mut self) -> Option<PendingRequest> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty() && self.low.is_empty()
    }
}

/// Rate-limited requester. Cheap to clone — all state is `Arc`-wrapped.
pub struct Requester {
    queues: Arc<Mutex<Queues>>,
    notify: Arc<Notify>,
    client: reqwest::Client,
    config: Arc<Config>,
}

impl Requester {
    /// Builds a new requester and spawns its background dispatch worker.
    pub fn new(config: Arc<Config>) -> Self {
        let client = reqwest::Client::builder()
            .user_agent(config.catalog.user_agent.clone())
            .timeout(std::time::Duration::from_secs(config.requester.request_timeout_secs))
            .build()
            .unwrap_or_default();

        let requester = Self {
            queues: Arc::new(Mutex::new(Queues::default())),
            notify: Arc::new(Notify::new()),
            client,
            config,
        };

        requester.spawn_worker();
        requester
    }

    fn spawn_worker(&self) {
        let queues = self.queues.clone();
        let notify = self.notify.clone();
        let client = self.client.clone();
        let min_interval =
            std::time::Duration::from_millis(self.config.requester.min_dispatch_interval_ms);

        tokio::spawn(async move {
            let mut last_dispatch: Option<Instant> = None;
            loop {
                let next = {
                    let mut guard = queues.lock().await;
                    guard.pop()
                };

                let Some(pending) = next else {
                    notify.notified().await;
                    continue;
                };

                if let Some(last) = last_dispatch {
                    let elapsed = last.elapsed();
                    if elapsed < min_interval {
                        tokio::time::sleep(min_interval - elapsed).await;
                    }
                }

                last_dispatch = Some(Instant::now());
                let result = dispatch(&client, &pending.url).await;

                // Ignore send failure: the caller's future was dropped.
                let _ = pending.reply.send(result);
            }
        });
    }

    /// Enqueues `url` at the given priority and awaits the response body.
    ///
    /// Blocks the caller (via `.await`) until the background worker has
    /// dispatched this request and every request ahead of it in its
    /// priority band — matching the upstream's "request is synchronous from
    /// the caller's perspective" contract.
    pub async fn request(&self, url: String, priority: RequestPriority) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        {
            let mut guard = self.queues.lock().await;
            guard.push(priority, PendingRequest { url, reply: tx });
        }
        self.notify.notify_one();

        rx.await
            .map_err(|_| Error::Requester(RequesterError::Transport("worker task ended".into())))?
    }

    /// Number of requests currently queued, across all priorities.
    pub async fn queue_depth(&self) -> usize {
        let guard = self.queues.lock().await;
        guard.high.len() + guard.normal.len() + guard.low.len()
    }
}

async fn dispatch(client: &reqwest::Client, url: &str) -> Result<String> {
    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| Error::Requester(RequesterError::Transport(e.to_string())))?;

    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| Error::Requester(RequesterError::Transport(e.to_string())))?;

    if !status.is_success() {
        return Err(Error::Requester(RequesterError::UpstreamStatus {
            status: status.as_u16(),
            body,
        }));
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::time::Duration;

    fn test_config(base_url: String) -> Arc<Config> {
        let mut config = Config::default();
        config.catalog.base_url = base_url;
        config.catalog.api_key = Some("test-key".into());
        config.requester.min_dispatch_interval_ms = 5;
        Arc::new(config)
    }

    #[tokio::test]
    async fn dispatches_high_priority_before_normal() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let requester = Requester::new(test_config(server.uri()));
        let body = requester
            .request(format!("{}/probe", server.uri()), RequestPriority::High)
            .await
            .unwrap();
        assert_eq!(body, "ok");
    }

    #[tokio::test]
    async fn dispatch_floor_is_anchored_at_send_time_not_completion_time() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(200).set_body_string("ok").set_delay(
                std::time::Duration::from_millis(50),
            ))
            .mount(&server)
            .await;

        let mut config = Config::default();
        config.catalog.base_url = server.uri();
        config.catalog.api_key = Some("test-key".into());
        config.requester.min_dispatch_interval_ms = 60;
        let requester = Requester::new(Arc::new(config));

        let start = Instant::now();
        requester.request(format!("{}/a", server.uri()), RequestPriority::Normal).await.unwrap();
        requester.request(format!("{}/b", server.uri()), RequestPriority::Normal).await.unwrap();
        let elapsed = start.elapsed();

        // Two 50ms-latency requests with a 60ms floor: if the floor were
        // anchored at completion time this would take >= 50+60+50 = 160ms;
        // anchored at dispatch time it takes roughly max(50, 60) + 50 = 110ms.
        assert!(elapsed < Duration::from_millis(150), "elapsed was {elapsed:?}");
    }

    #[tokio::test]
    async fn surfaces_non_success_status() {
        let server = wiremock::MockServer::start().await;
        wiremock::Mock::given(wiremock::matchers::method("GET"))
            .respond_with(wiremock::ResponseTemplate::new(404).set_body_string("not found"))
            .mount(&server)
            .await;

        let requester = Requester::new(test_config(server.uri()));
        let err = requester
            .request(format!("{}/missing", server.uri()), RequestPriority::Normal)
            .await
            .unwrap_err();
        match err {
            Error::Requester(RequesterError::UpstreamStatus { status, .. }) => {
                assert_eq!(status, 404)
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
