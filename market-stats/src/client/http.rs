use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Config, Endpoint, FetchError};

pub struct HttpApiClient {
    base_url: Url,
    http_client: ClientWithMiddleware,
}

impl HttpApiClient {
    pub fn new(config: Config) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|err| FetchError::InvalidRequest(format!("cannot build http client: {err}")))?;
        let http_client = config
            .middlewares
            .into_iter()
            .fold(ClientBuilder::new(client), |builder, middleware| {
                builder.with_arc(middleware)
            })
            .build();
        Ok(Self {
            base_url: config.url,
            http_client,
        })
    }

    /// Build the client and, if `probe_url` is set, make sure the backend
    /// answers its health endpoint.
    pub async fn connect(config: Config) -> Result<Self, FetchError> {
        let probe = config.probe_url;
        let client = Self::new(config)?;
        if probe {
            client.request(&health::HealthCheck).await?;
        }
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub async fn request<E: Endpoint>(&self, endpoint: &E) -> Result<E::Response, FetchError> {
        let url = endpoint
            .url(&self.base_url)
            .map_err(|err| FetchError::InvalidRequest(err.to_string()))?;
        let mut request = self.http_client.request(endpoint.method(), url);
        if let Some(headers) = endpoint.headers() {
            request = request.headers(headers);
        }
        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        if !status.is_success() {
            return Err(FetchError::Server {
                status: status.as_u16(),
                body: String::from_utf8_lossy(&body).into_owned(),
            });
        }
        let deserializer = &mut serde_json::Deserializer::from_slice(&body);
        serde_path_to_error::deserialize(deserializer)
            .map_err(|err| FetchError::Decode(err.to_string()))
    }

    /// Like [`request`](Self::request), but gives up as soon as `cancel`
    /// fires. The in-flight request is abandoned, not awaited.
    pub async fn request_cancellable<E: Endpoint>(
        &self,
        endpoint: &E,
        cancel: &CancellationToken,
    ) -> Result<E::Response, FetchError> {
        if cancel.is_cancelled() {
            return Err(FetchError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            response = self.request(endpoint) => response,
        }
    }
}

mod health {
    use serde::Deserialize;

    use crate::client::Endpoint;

    #[derive(Debug, Deserialize)]
    pub struct HealthCheckResponse {}

    pub struct HealthCheck;

    impl Endpoint for HealthCheck {
        type Response = HealthCheckResponse;

        fn path(&self) -> String {
            "/health".to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use wiremock::{
        matchers::{method, path, query_param},
        Mock, MockServer, ResponseTemplate,
    };

    use super::*;
    use crate::client::serialize_query;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Answer {
        value: u32,
    }

    struct Probe {
        q: Option<&'static str>,
    }

    impl Endpoint for Probe {
        type Response = Answer;

        fn path(&self) -> String {
            "/api/probe".to_string()
        }

        fn query(&self) -> Option<String> {
            self.q.and_then(|q| serialize_query(&[("q", q)]))
        }
    }

    async fn client(server: &MockServer) -> HttpApiClient {
        let config =
            Config::new(server.uri().parse().unwrap()).http_timeout(Duration::from_secs(2));
        HttpApiClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn decodes_successful_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/probe"))
            .and(query_param("q", "x"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": 7 })))
            .mount(&server)
            .await;

        let answer = client(&server).await.request(&Probe { q: Some("x") }).await;
        assert_eq!(answer, Ok(Answer { value: 7 }));
    }

    #[tokio::test]
    async fn server_errors_and_bad_bodies_are_typed() {
        let server = MockServer::start().await;
        Mock::given(path("/api/probe"))
            .and(query_param("q", "boom"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;
        Mock::given(path("/api/probe"))
            .and(query_param("q", "garbage"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "value": "seven" })))
            .mount(&server)
            .await;
        let client = client(&server).await;

        assert_eq!(
            client.request(&Probe { q: Some("boom") }).await,
            Err(FetchError::Server {
                status: 502,
                body: "bad gateway".to_string()
            })
        );
        match client.request(&Probe { q: Some("garbage") }).await {
            Err(FetchError::Decode(message)) => assert!(message.contains("value"), "{message}"),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_is_not_cancellation() {
        let server = MockServer::start().await;
        Mock::given(path("/api/probe"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": 1 }))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;
        let config = Config::new(server.uri().parse().unwrap())
            .http_timeout(Duration::from_millis(50));
        let client = HttpApiClient::new(config).unwrap();

        let err = client.request(&Probe { q: None }).await.unwrap_err();
        assert_eq!(err, FetchError::Timeout);
        assert!(!err.is_cancelled());
    }

    #[tokio::test]
    async fn cancellation_abandons_request() {
        let server = MockServer::start().await;
        Mock::given(path("/api/probe"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "value": 1 }))
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;
        let client = client(&server).await;
        let cancel = CancellationToken::new();

        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(20)).await;
                cancel.cancel();
            })
        };
        let result = client.request_cancellable(&Probe { q: None }, &cancel).await;
        canceller.await.unwrap();
        assert_eq!(result, Err(FetchError::Cancelled));

        // already fired token never reaches the network
        let result = client.request_cancellable(&Probe { q: None }, &cancel).await;
        assert_eq!(result, Err(FetchError::Cancelled));
    }
}
