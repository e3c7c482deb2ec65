//! JSON-over-HTTP helper shared by the embedding, generation and Qdrant clients.

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::config::HttpSettings;
use crate::error::{Error, Result};
use crate::retry::{with_retry, RetryPolicy};

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
}

impl HttpClient {
    pub fn new(settings: &HttpSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::InvalidConfig(format!("http client: {e}")))?;
        Ok(Self { client, retry: RetryPolicy::from_settings(settings) })
    }

    /// Send `body` as JSON and decode a JSON response.
    pub async fn send_json<B, R>(&self, service: &str, method: Method, url: &str, bearer: Option<&str>, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = serde_json::to_vec(body).map_err(|e| Error::external(service, format!("encode request: {e}")))?;
        let text = self.execute(service, method, url, bearer, Some(payload), false).await?;
        decode(service, &text.unwrap_or_default())
    }

    /// Like `send_json`, but a 404 yields `Ok(None)`.
    pub async fn send_json_optional<B, R>(
        &self,
        service: &str,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> Result<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = match body {
            Some(b) => Some(serde_json::to_vec(b).map_err(|e| Error::external(service, format!("encode request: {e}")))?),
            None => None,
        };
        match self.execute(service, method, url, bearer, payload, true).await? {
            Some(text) => decode(service, &text).map(Some),
            None => Ok(None),
        }
    }

    async fn execute(
        &self,
        service: &str,
        method: Method,
        url: &str,
        bearer: Option<&str>,
        payload: Option<Vec<u8>>,
        allow_missing: bool,
    ) -> Result<Option<String>> {
        with_retry(&self.retry, service, || {
            let mut req = self.client.request(method.clone(), url).header(ACCEPT, "application/json");
            if let Some(token) = bearer {
                req = req.bearer_auth(token);
            }
            if let Some(p) = &payload {
                req = req.header(CONTENT_TYPE, "application/json").body(p.clone());
            }
            async move {
                let resp = req.send().await.map_err(|e| from_reqwest(service, &e))?;
                let status = resp.status();
                if allow_missing && status == StatusCode::NOT_FOUND {
                    return Ok(None);
                }
                let text = resp.text().await.map_err(|e| from_reqwest(service, &e))?;
                if !status.is_success() {
                    return Err(classify(service, status, &text));
                }
                Ok(Some(text))
            }
        })
        .await
    }
}

fn decode<R: DeserializeOwned>(service: &str, text: &str) -> Result<R> {
    serde_json::from_str(text).map_err(|e| Error::external(service, format!("unexpected response: {e}")))
}

fn from_reqwest(service: &str, e: &reqwest::Error) -> Error {
    if e.is_timeout() || e.is_connect() || e.is_request() {
        Error::transient(service, e.to_string())
    } else {
        Error::external(service, e.to_string())
    }
}

fn classify(service: &str, status: StatusCode, body: &str) -> Error {
    let snippet: String = body.chars().take(300).collect();
    let message = format!("HTTP {status}: {snippet}");
    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        Error::transient(service, message)
    } else {
        Error::external(service, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client() -> HttpClient {
        HttpClient::new(&HttpSettings { timeout_secs: 5, max_retries: 2, backoff_ms: 1 }).expect("client")
    }

    #[tokio::test]
    async fn retries_server_errors_then_decodes() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/x")).respond_with(ResponseTemplate::new(503)).up_to_n_times(1).mount(&server).await;
        Mock::given(method("POST"))
            .and(path("/x"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let out: Value = client()
            .send_json("svc", Method::POST, &format!("{}/x", server.uri()), Some("secret"), &json!({"a": 1}))
            .await
            .expect("eventually succeeds");
        assert_eq!(out["ok"], true);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/x")).respond_with(ResponseTemplate::new(400).set_body_string("bad input")).expect(1).mount(&server).await;

        let err = client()
            .send_json::<_, Value>("svc", Method::POST, &format!("{}/x", server.uri()), None, &json!({}))
            .await
            .expect_err("400 fails");
        assert!(matches!(err, Error::ExternalService { retryable: false, .. }));
        assert!(err.to_string().contains("bad input"));
    }

    #[tokio::test]
    async fn missing_resource_is_none() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/c")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let out: Option<Value> = client()
            .send_json_optional::<Value, _>("svc", Method::GET, &format!("{}/c", server.uri()), None, None)
            .await
            .expect("404 is fine");
        assert!(out.is_none());
    }
}
