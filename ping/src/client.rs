use std::future::Future;
use std::pin::Pin;
use std::task::Context;
use std::task::Poll;
use std::time::Duration;

use http::StatusCode;
use tower::BoxError;
use tower::Service;

/// What pong answered, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PongReply {
    pub status: StatusCode,
    pub body: String,
}

impl PongReply {
    pub fn new(status: StatusCode, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Issues `GET <url>` against pong.
///
/// Any HTTP status is a successful exchange and is returned as a [`PongReply`];
/// only failures to complete the exchange (connect, timeout, body read) are
/// errors.
#[derive(Debug, Clone)]
pub struct PongClient {
    http: reqwest::Client,
    url: String,
}

impl PongClient {
    /// Creates a client for `url`.
    ///
    /// Without a `timeout` a request that never gets an answer waits forever.
    pub fn new(url: impl Into<String>, timeout: Option<Duration>) -> Result<Self, reqwest::Error> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Service<()> for PongClient {
    type Response = PongReply;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<PongReply, BoxError>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, _req: ()) -> Self::Future {
        let request = self.http.get(&self.url);
        Box::pin(async move {
            let response = request.send().await?;
            let status = response.status();
            let body = response.text().await?;
            Ok(PongReply { status, body })
        })
    }
}
