//! Qdrant vector store over its REST API.

use super::{rank, CollectionInfo, Point, ScoredPoint, VectorStore};
use crate::error::{RagChatError, Result};
use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info, instrument};
use url::Url;
use uuid::Uuid;

const SERVICE: &str = "vector store";

/// Qdrant-backed vector store.
pub struct QdrantVectorStore {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    result: T,
}

#[derive(Deserialize)]
struct ExistsResult {
    exists: bool,
}

#[derive(Deserialize)]
struct CollectionsResult {
    collections: Vec<CollectionDescription>,
}

#[derive(Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Deserialize)]
struct CollectionDetails {
    #[serde(default)]
    points_count: Option<u64>,
    config: CollectionConfig,
}

#[derive(Deserialize)]
struct CollectionConfig {
    params: CollectionParams,
}

#[derive(Deserialize)]
struct CollectionParams {
    vectors: VectorParams,
}

#[derive(Deserialize)]
struct VectorParams {
    size: usize,
}

#[derive(Deserialize)]
struct SearchHit {
    id: serde_json::Value,
    score: f32,
    #[serde(default)]
    payload: Option<serde_json::Value>,
}

impl QdrantVectorStore {
    /// Create a client for the Qdrant instance at `base_url`.
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self> {
        let mut base_url = Url::parse(base_url)
            .map_err(|e| RagChatError::Config(format!("Invalid Qdrant URL '{}': {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RagChatError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url,
            api_key: api_key.filter(|k| !k.is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| RagChatError::Config(format!("Invalid Qdrant path '{}': {}", path, e)))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
        let mut builder = self.client.request(method, self.endpoint(path)?);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        Ok(builder)
    }

    /// Send a request and decode the `result` field, mapping 404 to a missing collection.
    async fn send<T: for<'de> Deserialize<'de>>(
        &self,
        builder: RequestBuilder,
        collection: Option<&str>,
    ) -> Result<T> {
        let response = builder
            .send()
            .await
            .map_err(|e| RagChatError::unavailable(SERVICE, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            if let Some(name) = collection {
                return Err(RagChatError::CollectionNotFound(name.to_string()));
            }
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RagChatError::VectorStore(format!(
                "Qdrant returned {}: {}",
                status, body
            )));
        }

        let envelope: Envelope<T> = response
            .json()
            .await
            .map_err(|e| RagChatError::unavailable(SERVICE, format!("bad response: {}", e)))?;
        Ok(envelope.result)
    }
}

/// Result of a collection PUT. A concurrent create that won the race is not an error.
fn create_outcome(status: StatusCode, body: &str) -> Result<bool> {
    if status.is_success() {
        return Ok(true);
    }
    if status == StatusCode::CONFLICT
        || (status == StatusCode::BAD_REQUEST && body.contains("already exists"))
    {
        return Ok(false);
    }
    Err(RagChatError::VectorStore(format!(
        "Qdrant returned {}: {}",
        status, body
    )))
}

#[async_trait]
impl VectorStore for QdrantVectorStore {
    #[instrument(skip(self))]
    async fn create_collection(&self, name: &str, dimensions: usize) -> Result<bool> {
        if self.collection_exists(name).await? {
            return Ok(false);
        }

        let body = json!({ "vectors": { "size": dimensions, "distance": "Cosine" } });
        let response = self
            .request(Method::PUT, &format!("collections/{}", name))?
            .json(&body)
            .send()
            .await
            .map_err(|e| RagChatError::unavailable(SERVICE, e))?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        let created = create_outcome(status, &text)?;
        if created {
            info!("Created Qdrant collection {} ({} dims)", name, dimensions);
        } else {
            debug!("Qdrant collection {} was created concurrently", name);
        }
        Ok(created)
    }

    async fn collection_exists(&self, name: &str) -> Result<bool> {
        let result: ExistsResult = self
            .send(
                self.request(Method::GET, &format!("collections/{}/exists", name))?,
                None,
            )
            .await?;
        Ok(result.exists)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let result: CollectionsResult = self
            .send(self.request(Method::GET, "collections")?, None)
            .await?;
        let mut names: Vec<String> = result.collections.into_iter().map(|c| c.name).collect();
        names.sort();
        Ok(names)
    }

    async fn collection_info(&self, name: &str) -> Result<CollectionInfo> {
        let details: CollectionDetails = self
            .send(
                self.request(Method::GET, &format!("collections/{}", name))?,
                Some(name),
            )
            .await?;
        Ok(CollectionInfo {
            name: name.to_string(),
            dimensions: details.config.params.vectors.size,
            points: details.points_count.unwrap_or(0) as usize,
        })
    }

    #[instrument(skip(self, point), fields(id = %point.id))]
    async fn upsert(&self, collection: &str, point: &Point) -> Result<()> {
        let body = json!({
            "points": [{
                "id": point.id.to_string(),
                "vector": point.vector,
                "payload": point.payload,
            }]
        });
        let _: serde_json::Value = self
            .send(
                self.request(
                    Method::PUT,
                    &format!("collections/{}/points?wait=true", collection),
                )?
                .json(&body),
                Some(collection),
            )
            .await?;
        debug!("Upserted point {} into {}", point.id, collection);
        Ok(())
    }

    #[instrument(skip(self, vector))]
    async fn search(
        &self,
        collection: &str,
        vector: &[f32],
        limit: usize,
    ) -> Result<Vec<ScoredPoint>> {
        let body = json!({ "vector": vector, "limit": limit, "with_payload": true });
        let hits: Vec<SearchHit> = self
            .send(
                self.request(Method::POST, &format!("collections/{}/points/search", collection))?
                    .json(&body),
                Some(collection),
            )
            .await?;

        let hits = hits
            .into_iter()
            .map(|hit| ScoredPoint {
                id: hit
                    .id
                    .as_str()
                    .and_then(|s| Uuid::parse_str(s).ok())
                    .unwrap_or_default(),
                score: hit.score,
                payload: hit.payload.unwrap_or(serde_json::Value::Null),
            })
            .collect();

        // Qdrant already ranks; re-rank so the ordering contract holds for any server.
        Ok(rank(hits, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_keeps_base_path() {
        let store = QdrantVectorStore::new("http://qdrant.internal:6333/proxy", None).unwrap();
        assert_eq!(
            store.endpoint("collections/docs/exists").unwrap().as_str(),
            "http://qdrant.internal:6333/proxy/collections/docs/exists"
        );
    }

    #[test]
    fn test_create_race_is_not_an_error() {
        assert!(create_outcome(StatusCode::OK, "{}").unwrap());
        assert!(!create_outcome(StatusCode::CONFLICT, "").unwrap());
        assert!(!create_outcome(
            StatusCode::BAD_REQUEST,
            r#"{"status":{"error":"Wrong input: Collection `docs` already exists!"}}"#
        )
        .unwrap());
        assert!(matches!(
            create_outcome(StatusCode::BAD_REQUEST, "bad vector size"),
            Err(RagChatError::VectorStore(_))
        ));
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            QdrantVectorStore::new("not a url", None),
            Err(RagChatError::Config(_))
        ));
    }

    #[test]
    fn test_decode_search_hits() {
        let raw = r#"{"result":[{"id":"6f1c1b9e-59d2-4b44-9b3b-1f7f3f0c2a10","version":1,"score":0.91,"payload":{"text":"hello"}},{"id":7,"score":0.5}],"status":"ok","time":0.001}"#;
        let envelope: Envelope<Vec<SearchHit>> = serde_json::from_str(raw).unwrap();
        assert_eq!(envelope.result.len(), 2);
        assert_eq!(envelope.result[0].payload.as_ref().unwrap()["text"], "hello");
        assert!(envelope.result[1].payload.is_none());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_unavailable() {
        let store = QdrantVectorStore::new("http://127.0.0.1:9", None).unwrap();
        assert!(matches!(
            store.list_collections().await,
            Err(RagChatError::ExternalServiceUnavailable { .. })
        ));
    }
}
