// A RemoteStore talking to the HTTP server over reqwest.

use std::time::Duration;

use async_trait::async_trait;
use labstore::{
    BatchError, Document, Query, RecordKind, Rejection, RemoteError, RemoteStore,
    SnapshotCallback, Subscription,
};
use reqwest::{Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::server::{AvailabilityRequest, ErrorBody};

/// How often a subscription re-reads its query.
const POLL_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct HttpRemote {
    base: Url,
    client: reqwest::Client,
}

impl HttpRemote {
    pub fn new(port: u16) -> anyhow::Result<Self> {
        Ok(Self {
            base: Url::parse(&format!("http://127.0.0.1:{port}/"))?,
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()?,
        })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn url(&self, kind: RecordKind, rest: &[&str]) -> Url {
        self.endpoint([kind.collection()].into_iter().chain(rest.iter().copied()))
    }

    /// Simulates an outage of the hosted store.
    pub async fn set_available(&self, available: bool) -> Result<(), RemoteError> {
        self.client
            .post(self.endpoint(["admin", "availability"]))
            .json(&AvailabilityRequest { available })
            .send()
            .await
            .map_err(transport)?;
        Ok(())
    }
}

/// A request that never got an answer is a connectivity failure. One that
/// could not even be built is rejected.
fn transport(e: reqwest::Error) -> RemoteError {
    if e.is_builder() {
        return RemoteError::Rejected(Rejection::Invalid(e.to_string()));
    }
    RemoteError::Unavailable(e.to_string())
}

/// Decodes a successful answer. The server did answer, so a body that is not
/// the expected JSON is a rejection rather than an outage.
async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
    let body = response.bytes().await.map_err(transport)?;
    serde_json::from_slice(&body)
        .map_err(|e| RemoteError::Rejected(Rejection::Invalid(format!("malformed response: {e}"))))
}

async fn check(kind: RecordKind, id: &str, response: Response) -> Result<Response, (RemoteError, Option<usize>)> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: ErrorBody = response.json().await.unwrap_or_else(|e| ErrorBody {
        code: "unreadable".into(),
        message: e.to_string(),
        applied: None,
    });
    let error = match (status, body.code.as_str()) {
        (StatusCode::NOT_FOUND, "not_found") => RemoteError::NotFound {
            kind,
            id: id.to_string(),
        },
        (StatusCode::CONFLICT, _) => RemoteError::Rejected(Rejection::DuplicateId(body.message)),
        (StatusCode::FORBIDDEN, _) => RemoteError::Rejected(Rejection::PermissionDenied(body.message)),
        (StatusCode::UNPROCESSABLE_ENTITY | StatusCode::BAD_REQUEST, _) => {
            RemoteError::Rejected(Rejection::Invalid(body.message))
        }
        (status, _) if status.is_server_error() => RemoteError::Unavailable(body.message),
        (status, _) => RemoteError::Rejected(Rejection::Invalid(format!("{status}: {}", body.message))),
    };
    Err((error, body.applied))
}

async fn checked(kind: RecordKind, id: &str, response: Response) -> Result<Response, RemoteError> {
    check(kind, id, response).await.map_err(|(error, _)| error)
}

#[async_trait]
impl RemoteStore for HttpRemote {
    async fn get(&self, kind: RecordKind, id: &str) -> Result<Document, RemoteError> {
        let response = self
            .client
            .get(self.url(kind, &[id]))
            .send()
            .await
            .map_err(transport)?;
        read_json(checked(kind, id, response).await?).await
    }

    async fn add(&self, kind: RecordKind, document: Document) -> Result<(), RemoteError> {
        let id = document
            .get("id")
            .and_then(|id| id.as_str())
            .unwrap_or_default()
            .to_string();
        let response = self
            .client
            .post(self.url(kind, &[]))
            .json(&document)
            .send()
            .await
            .map_err(transport)?;
        checked(kind, &id, response).await.map(|_| ())
    }

    async fn update(&self, kind: RecordKind, id: &str, patch: Document) -> Result<(), RemoteError> {
        let response = self
            .client
            .patch(self.url(kind, &[id]))
            .json(&patch)
            .send()
            .await
            .map_err(transport)?;
        checked(kind, id, response).await.map(|_| ())
    }

    async fn delete(&self, kind: RecordKind, id: &str) -> Result<(), RemoteError> {
        let response = self
            .client
            .delete(self.url(kind, &[id]))
            .send()
            .await
            .map_err(transport)?;
        checked(kind, id, response).await.map(|_| ())
    }

    async fn list(&self, kind: RecordKind, query: &Query) -> Result<Vec<Document>, RemoteError> {
        let response = self
            .client
            .post(self.url(kind, &["query"]))
            .json(query)
            .send()
            .await
            .map_err(transport)?;
        read_json(checked(kind, "", response).await?).await
    }

    async fn update_batch(
        &self,
        kind: RecordKind,
        patches: Vec<(String, Document)>,
    ) -> Result<(), BatchError> {
        let response = self
            .client
            .post(self.url(kind, &["batch"]))
            .json(&patches)
            .send()
            .await
            .map_err(|e| BatchError {
                applied: 0,
                error: transport(e),
            })?;
        check(kind, "", response)
            .await
            .map(|_| ())
            .map_err(|(error, applied)| BatchError {
                applied: applied.unwrap_or(0),
                error,
            })
    }

    /// The server has no push channel, so changes are detected by polling.
    async fn subscribe(
        &self,
        kind: RecordKind,
        query: Query,
        callback: SnapshotCallback,
    ) -> Result<Subscription, RemoteError> {
        let mut last = self.list(kind, &query).await?;
        callback(last.clone());

        let remote = self.clone();
        let poller = tokio::spawn(async move {
            loop {
                tokio::time::sleep(POLL_INTERVAL).await;
                match remote.list(kind, &query).await {
                    Ok(snapshot) if snapshot != last => {
                        last = snapshot.clone();
                        callback(snapshot);
                    }
                    Ok(_) => {}
                    Err(e) => debug!(%kind, error = %e, "Subscription poll failed"),
                }
            }
        });
        Ok(Subscription::new(move || {
            debug!(%kind, "Subscription cancelled");
            poller.abort();
        }))
    }
}
