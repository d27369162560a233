use std::time::Duration;

use httpmock::prelude::*;
use httpmock::{
    Mock,
    Then,
    When,
};
use serde_json::json;

pub struct MockServerBuilder {
    server: MockServer,
    handlers: Vec<Box<dyn Fn(When, Then)>>,
    mock_ids: Vec<usize>,
}

impl MockServerBuilder {
    pub fn new() -> MockServerBuilder {
        MockServerBuilder {
            server: MockServer::start(),
            handlers: vec![],
            mock_ids: vec![],
        }
    }

    pub fn assert(&self) {
        for id in &self.mock_ids {
            println!("checking assertions for mock {id}");
            Mock::new(*id, &self.server).assert()
        }
    }

    pub fn handle<F: Fn(When, Then) + 'static>(&mut self, f: F) -> &mut Self {
        self.handlers.push(Box::new(f));
        self
    }

    // Responds to the (paged) initial list call for a resource path
    pub fn handle_list(&mut self, path: &str, body: serde_json::Value) -> &mut Self {
        let path = path.to_string();
        self.handle(move |when, then| {
            when.method(GET).path(&path).query_param("limit", "500");
            then.json_body(body.clone());
        })
    }

    // Responds to a watch call with the given (newline-delimited) events and then closes the
    // connection, which is what the apiserver does when a watch times out.  The delay holds the
    // response back, to keep watchers from reconnecting in a tight loop.
    pub fn handle_watch(&mut self, path: &str, body: String, delay: Duration) -> &mut Self {
        let path = path.to_string();
        self.handle(move |when, then| {
            when.method(GET).path(&path).query_param("watch", "true");
            then.header("content-type", "application/json")
                .delay(delay)
                .body(body.clone());
        })
    }

    pub fn build(&mut self) {
        for f in self.handlers.iter() {
            self.mock_ids.push(self.server.mock(f).id);
        }
    }

    pub fn url(&self) -> http::Uri {
        http::Uri::try_from(self.server.url("/")).unwrap()
    }
}

impl Default for MockServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub fn make_fake_apiserver() -> (MockServerBuilder, kube::Client) {
    let builder = MockServerBuilder::new();
    let config = kube::Config::new(builder.url());
    let client = kube::Client::try_from(config).unwrap();
    (builder, client)
}

pub fn status_forbidden() -> serde_json::Value {
    json!({
      "kind": "Status",
      "apiVersion": "v1",
      "metadata": {},
      "status": "Failure",
      "message": "namespaces is forbidden",
      "reason": "Forbidden",
      "code": 403
    })
}

pub fn status_unavailable() -> serde_json::Value {
    json!({
      "kind": "Status",
      "apiVersion": "v1",
      "metadata": {},
      "status": "Failure",
      "message": "the server is currently unable to handle the request",
      "reason": "ServiceUnavailable",
      "code": 503
    })
}
