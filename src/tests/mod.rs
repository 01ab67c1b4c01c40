
use crate::http::{HttpClient, HttpResponse, TransportError};
use async_trait::async_trait;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

#[derive(Clone)]
enum Reply {
    Response(HttpResponse),
    Fail(TransportError),
}

/// Scripted `HttpClient`. Unregistered URLs fail like an unreachable host.
/// Every call is recorded as `"GET <url>"` / `"HEAD <url>"`.
#[derive(Default)]
pub struct FakeHttp {
    get: HashMap<String, Reply>,
    head: HashMap<String, Reply>,
    delays: HashMap<String, Duration>,
    calls: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

fn response(url: &str, status: u16) -> HttpResponse {
    HttpResponse {
        status,
        final_url: url.to_string(),
        ..Default::default()
    }
}

impl FakeHttp {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_status(mut self, url: &str, status: u16) -> Self {
        self.get
            .insert(url.into(), Reply::Response(response(url, status)));
        self
    }

    pub fn get_text(mut self, url: &str, body: &str) -> Self {
        let resp = HttpResponse {
            content_type: Some("text/html; charset=utf-8".into()),
            body: body.as_bytes().to_vec(),
            ..response(url, 200)
        };
        self.get.insert(url.into(), Reply::Response(resp));
        self
    }

    pub fn get_json(mut self, url: &str, body: Value) -> Self {
        let resp = HttpResponse {
            content_type: Some("application/json".into()),
            body: body.to_string().into_bytes(),
            ..response(url, 200)
        };
        self.get.insert(url.into(), Reply::Response(resp));
        self
    }

    /// Followed redirect ending at `final_url`.
    pub fn get_redirect(mut self, url: &str, final_url: &str) -> Self {
        self.get
            .insert(url.into(), Reply::Response(response(final_url, 200)));
        self
    }

    pub fn get_fail(mut self, url: &str, err: TransportError) -> Self {
        self.get.insert(url.into(), Reply::Fail(err));
        self
    }

    pub fn head_ok(mut self, url: &str, content_type: &str) -> Self {
        let resp = HttpResponse {
            content_type: Some(content_type.to_string()).filter(|c| !c.is_empty()),
            content_length: Some(1024),
            ..response(url, 200)
        };
        self.head.insert(url.into(), Reply::Response(resp));
        self
    }

    pub fn head_status(mut self, url: &str, status: u16) -> Self {
        self.head
            .insert(url.into(), Reply::Response(response(url, status)));
        self
    }

    pub fn head_redirect(mut self, url: &str, final_url: &str) -> Self {
        self.head
            .insert(url.into(), Reply::Response(response(final_url, 200)));
        self
    }

    pub fn head_fail(mut self, url: &str, err: TransportError) -> Self {
        self.head.insert(url.into(), Reply::Fail(err));
        self
    }

    /// Hold every request to `url` for `delay` before answering.
    pub fn delay(mut self, url: &str, delay: Duration) -> Self {
        self.delays.insert(url.into(), delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Most requests that were ever waiting on a reply at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }

    async fn reply(
        &self,
        method: &str,
        table: &HashMap<String, Reply>,
        url: &str,
    ) -> Result<HttpResponse, TransportError> {
        self.calls.lock().unwrap().push(format!("{method} {url}"));

        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(url) {
            tokio::time::sleep(*delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        match table.get(url) {
            Some(Reply::Response(resp)) => Ok(resp.clone()),
            Some(Reply::Fail(err)) => Err(err.clone()),
            None => Err(TransportError::Connect(format!("no route to {url}"))),
        }
    }
}

#[async_trait]
impl HttpClient for FakeHttp {
    async fn get(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.reply("GET", &self.get, url).await
    }

    async fn head(&self, url: &str) -> Result<HttpResponse, TransportError> {
        self.reply("HEAD", &self.head, url).await
    }
}
