//! The request/response primitive and its reqwest-backed implementation.

use futures_util::future::BoxFuture;
use reqwest::header::CONTENT_TYPE;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::config::HostConfig;
use crate::connection::node::Connection;
use crate::connection::request::{RawResponse, Request, SendError};
use crate::transport::Error;

/// Sends one request to one node.
///
/// Implementations must report network-level problems as [`SendError`] and
/// return every HTTP status (including errors) as a [`RawResponse`].
pub trait HttpSend: Send + Sync + fmt::Debug {
    fn send<'a>(
        &'a self,
        request: &'a Request,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResponse, SendError>>;
}

/// Builds the [`HttpSend`] handle for a host.
///
/// Called for seed hosts and again for every node discovered by a sniff.
pub trait ConnectionFactory: Send + Sync + fmt::Debug {
    fn create(&self, host: &HostConfig) -> Result<Arc<dyn HttpSend>, Error>;
}

/// Build fresh [`Connection`]s for every host.
pub fn build_connections(
    factory: &dyn ConnectionFactory,
    hosts: &[HostConfig],
) -> Result<Vec<Arc<Connection>>, Error> {
    hosts
        .iter()
        .map(|host| {
            let sender = factory.create(host)?;
            Ok::<_, Error>(Arc::new(Connection::new(host.clone(), sender)))
        })
        .collect()
}

/// HTTP node handle sharing one reqwest client (and its socket pool).
#[derive(Clone)]
pub struct HttpNode {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
}

impl HttpNode {
    pub fn new(client: reqwest::Client, host: &HostConfig) -> Self {
        Self {
            client,
            base_url: host.base_url(),
            username: host.username.clone(),
            password: host.password.clone(),
        }
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

impl fmt::Debug for HttpNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpNode")
            .field("base_url", &self.base_url)
            .field("auth", &self.username.is_some())
            .finish()
    }
}

impl HttpSend for HttpNode {
    fn send<'a>(
        &'a self,
        request: &'a Request,
        timeout: Duration,
    ) -> BoxFuture<'a, Result<RawResponse, SendError>> {
        Box::pin(async move {
            let mut builder = self
                .client
                .request(request.method.clone(), self.url_for(&request.path))
                .query(&request.params)
                .timeout(timeout);

            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(user) = &self.username {
                builder = builder.basic_auth(user, self.password.as_ref());
            }
            if let Some(body) = &request.body {
                if !request.has_header(CONTENT_TYPE.as_str()) {
                    builder = builder.header(CONTENT_TYPE, "application/json");
                }
                builder = builder.body(body.clone());
            }

            let response = builder.send().await.map_err(|e| classify(e, timeout))?;
            let status = response.status().as_u16();
            let headers = response.headers().clone();
            let body = response.bytes().await.map_err(|e| classify(e, timeout))?;

            Ok(RawResponse {
                status,
                headers,
                body: body.to_vec(),
            })
        })
    }
}

fn classify(error: reqwest::Error, timeout: Duration) -> SendError {
    if error.is_timeout() {
        SendError::Timeout(timeout)
    } else {
        SendError::Connection(error.to_string())
    }
}

/// Default factory: one shared reqwest client for every node.
#[derive(Debug, Clone)]
pub struct HttpConnectionFactory {
    client: reqwest::Client,
}

impl HttpConnectionFactory {
    pub fn new() -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::Configuration(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ConnectionFactory for HttpConnectionFactory {
    fn create(&self, host: &HostConfig) -> Result<Arc<dyn HttpSend>, Error> {
        let node: Arc<dyn HttpSend> = Arc::new(HttpNode::new(self.client.clone(), host));
        Ok(node)
    }
}
