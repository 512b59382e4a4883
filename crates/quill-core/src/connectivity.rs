//! Online/offline tracking.
//!
//! [`ConnectivityMonitor`] holds the current flag in a watch channel so any
//! number of tasks can observe transitions. In a native process nothing
//! fires browser-style `online`/`offline` events, so [`watch_reachability`]
//! polls a [`ReachabilityProbe`] and feeds the monitor instead.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, Result};
use crate::util::parse_endpoint;

const PROBE_TIMEOUT_SECS: u64 = 4;

/// Shared online flag. Clones observe and update the same flag.
#[derive(Debug, Clone)]
pub struct ConnectivityMonitor {
    sender: Arc<watch::Sender<bool>>,
}

impl ConnectivityMonitor {
    pub fn new(online: bool) -> Self {
        let (sender, _) = watch::channel(online);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Initialize the flag from a single probe
    pub async fn from_probe<P: ReachabilityProbe>(probe: &P) -> Self {
        Self::new(probe.check().await)
    }

    pub fn is_online(&self) -> bool {
        *self.sender.borrow()
    }

    /// Record the current state. Returns `true` if this was a transition.
    pub fn set_online(&self, online: bool) -> bool {
        self.sender.send_if_modified(|current| {
            if *current == online {
                false
            } else {
                *current = online;
                true
            }
        })
    }

    /// A receiver that wakes on every transition after this call
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for ConnectivityMonitor {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Answers "is the network usable right now?"
pub trait ReachabilityProbe: Send + Sync {
    fn check(&self) -> impl Future<Output = bool> + Send;
}

/// Treats any HTTP response from `url` as reachable
#[derive(Debug, Clone)]
pub struct HttpProbe {
    url: String,
    client: reqwest::Client,
}

impl HttpProbe {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let url = parse_endpoint(&url.into())
            .map_err(|reason| Error::InvalidInput(format!("reachability URL {reason}")))?;

        Ok(Self {
            url,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(PROBE_TIMEOUT_SECS))
                .build()?,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl ReachabilityProbe for HttpProbe {
    async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(error) => {
                tracing::debug!("Reachability probe to {} failed: {}", self.url, error);
                false
            }
        }
    }
}

/// Poll `probe` every `every` and publish the result to `monitor`.
///
/// Never returns; abort the task to stop polling.
pub async fn watch_reachability<P: ReachabilityProbe>(
    monitor: ConnectivityMonitor,
    probe: P,
    every: Duration,
) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        let online = probe.check().await;
        if monitor.set_online(online) {
            tracing::info!(
                "Connectivity changed: {}",
                if online { "online" } else { "offline" }
            );
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Replays a fixed sequence of answers, then repeats the last one
    pub(crate) struct ScriptedProbe {
        answers: Mutex<VecDeque<bool>>,
        last: Mutex<bool>,
    }

    impl ScriptedProbe {
        pub(crate) fn new(answers: impl IntoIterator<Item = bool>) -> Self {
            Self {
                answers: Mutex::new(answers.into_iter().collect()),
                last: Mutex::new(true),
            }
        }
    }

    impl ReachabilityProbe for ScriptedProbe {
        async fn check(&self) -> bool {
            let next = self.answers.lock().unwrap().pop_front();
            let mut last = self.last.lock().unwrap();
            if let Some(answer) = next {
                *last = answer;
            }
            *last
        }
    }

    #[test]
    fn set_online_reports_transitions_only() {
        let monitor = ConnectivityMonitor::new(true);
        assert!(!monitor.set_online(true));
        assert!(monitor.set_online(false));
        assert!(!monitor.is_online());
        assert!(!monitor.set_online(false));
        assert!(monitor.set_online(true));
    }

    #[tokio::test]
    async fn subscribers_see_transitions() {
        let monitor = ConnectivityMonitor::new(false);
        let mut receiver = monitor.subscribe();
        assert!(!receiver.has_changed().unwrap());

        monitor.set_online(false);
        assert!(!receiver.has_changed().unwrap());

        monitor.clone().set_online(true);
        receiver.changed().await.unwrap();
        assert!(*receiver.borrow_and_update());
    }

    #[tokio::test]
    async fn from_probe_uses_first_answer() {
        let monitor = ConnectivityMonitor::from_probe(&ScriptedProbe::new([false])).await;
        assert!(!monitor.is_online());
    }

    #[tokio::test(start_paused = true)]
    async fn polling_publishes_each_change() {
        let monitor = ConnectivityMonitor::new(true);
        let mut receiver = monitor.subscribe();
        let probe = ScriptedProbe::new([true, false, false, true]);
        let task = tokio::spawn(watch_reachability(
            monitor.clone(),
            probe,
            Duration::from_secs(5),
        ));

        receiver.changed().await.unwrap();
        assert!(!*receiver.borrow_and_update());
        receiver.changed().await.unwrap();
        assert!(*receiver.borrow_and_update());

        task.abort();
    }

    #[test]
    fn http_probe_requires_http_url() {
        assert!(HttpProbe::new("").is_err());
        assert!(HttpProbe::new("example.com").is_err());
        let probe = HttpProbe::new(" https://example.com/ ").unwrap();
        assert_eq!(probe.url(), "https://example.com");
    }
}
