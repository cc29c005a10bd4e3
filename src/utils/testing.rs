use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use anyhow::anyhow;
use chrono::{DateTime, Duration, Utc};
use futures::future::BoxFuture;

use super::{key_cache::Clock, Fetch, FetchRequest};

/// Scripted fetcher: every URL answers with a fixed body or error, unknown
/// URLs answer 404. All requests are recorded when they start.
#[derive(Default, Clone)]
pub struct FakeFetch {
    pages: HashMap<String, Result<String, String>>,
    delays: HashMap<String, std::time::Duration>,
    requests: Arc<Mutex<Vec<FetchRequest>>>,
}

impl FakeFetch {
    pub fn with_page(mut self, url: &str, body: &str) -> Self {
        self.pages.insert(url.into(), Ok(body.into()));
        self
    }

    pub fn with_error(mut self, url: &str, err: &str) -> Self {
        self.pages.insert(url.into(), Err(err.into()));
        self
    }

    /// Holds the answer for `url` back for `delay`.
    pub fn with_delay(mut self, url: &str, delay: std::time::Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.requests().into_iter().map(|r| r.url).collect()
    }

    pub fn count(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }
}

impl Fetch for FakeFetch {
    fn fetch(&self, request: FetchRequest) -> BoxFuture<'_, anyhow::Result<String>> {
        let answer = match self.pages.get(&request.url) {
            Some(Ok(body)) => Ok(body.clone()),
            Some(Err(err)) => Err(anyhow!("{err}")),
            None => Err(anyhow!("HTTP 404 for {}", request.url)),
        };
        let delay = self.delays.get(&request.url).copied();
        self.requests.lock().unwrap().push(request);

        Box::pin(async move {
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            answer
        })
    }
}

pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(DateTime::from_timestamp(1_700_000_000, 0).unwrap()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}
