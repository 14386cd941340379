use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, warn};
use url::Url;

use crate::{HarvestError, Result, StoredRecord};

pub const DEFAULT_COLLECTION: &str = "email";

/// Append-only record store keyed by store-assigned ids.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Appends a record and returns its id.
    async fn put(&self, collection: &str, record: &StoredRecord) -> Result<String>;

    async fn get_all(&self, collection: &str) -> Result<BTreeMap<String, StoredRecord>>;
}

/// Firebase Realtime Database over its REST API.
pub struct FirebaseStore {
    client: Client,
    base_url: Url,
}

#[derive(Deserialize)]
struct PushResponse {
    name: String,
}

impl FirebaseStore {
    pub fn new(base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            client: Client::builder().timeout(Duration::from_secs(30)).build()?,
            base_url,
        })
    }

    fn endpoint(&self, collection: &str) -> Result<Url> {
        Ok(self
            .base_url
            .join(&format!("{}.json", collection.trim_matches('/')))?)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(HarvestError::Store {
                status: status.as_u16(),
                message,
            });
        }
        Ok(resp)
    }
}

#[async_trait]
impl RecordStore for FirebaseStore {
    async fn put(&self, collection: &str, record: &StoredRecord) -> Result<String> {
        let resp = self
            .client
            .post(self.endpoint(collection)?)
            .json(record)
            .send()
            .await?;

        let pushed: PushResponse = Self::check(resp).await?.json().await?;
        debug!(id = %pushed.name, "stored record");
        Ok(pushed.name)
    }

    async fn get_all(&self, collection: &str) -> Result<BTreeMap<String, StoredRecord>> {
        let resp = self.client.get(self.endpoint(collection)?).send().await?;
        let body: serde_json::Value = Self::check(resp).await?.json().await?;
        Ok(decode_collection(body))
    }
}

/// Turns a collection snapshot into records. The database answers `null`
/// for an empty collection and an array when keys are small integers.
/// Entries that are not records are skipped.
pub fn decode_collection(body: serde_json::Value) -> BTreeMap<String, StoredRecord> {
    let entries: Vec<(String, serde_json::Value)> = match body {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Object(map) => map.into_iter().collect(),
        serde_json::Value::Array(values) => values
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(idx, v)| (idx.to_string(), v))
            .collect(),
        other => {
            warn!(kind = %json_kind(&other), "collection is not a map of records");
            Vec::new()
        }
    };

    let mut records = BTreeMap::new();
    for (id, value) in entries {
        if !value.is_object() {
            warn!(%id, "skipping non-record entry");
            continue;
        }
        match serde_json::from_value::<StoredRecord>(value) {
            Ok(record) => {
                records.insert(id, record);
            }
            Err(e) => warn!(%id, error = %e, "skipping malformed record"),
        }
    }
    records
}

fn json_kind(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "bool",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// In-process store, ids are zero-padded insertion counters.
#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, BTreeMap<String, StoredRecord>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn put(&self, collection: &str, record: &StoredRecord) -> Result<String> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(collection.to_string()).or_default();
        let id = format!("{:08}", records.len());
        records.insert(id.clone(), record.clone());
        Ok(id)
    }

    async fn get_all(&self, collection: &str) -> Result<BTreeMap<String, StoredRecord>> {
        Ok(self
            .collections
            .lock()
            .await
            .get(collection)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Debug, Default)]
pub struct UploadSummary {
    pub stored: usize,
    /// Index into the uploaded slice and the error for that record.
    pub failures: Vec<(usize, HarvestError)>,
}

/// Puts every record with at most `concurrency` requests in flight. A
/// failed put is recorded and the rest of the batch continues.
pub async fn upload<S: RecordStore + ?Sized>(
    store: &S,
    collection: &str,
    records: &[StoredRecord],
    concurrency: usize,
) -> UploadSummary {
    let results = stream::iter(records.iter().enumerate())
        .map(|(idx, record)| async move { (idx, store.put(collection, record).await) })
        .buffer_unordered(concurrency.max(1))
        .collect::<Vec<_>>()
        .await;

    let mut summary = UploadSummary::default();
    for (idx, result) in results {
        match result {
            Ok(_) => summary.stored += 1,
            Err(e) => {
                warn!(index = idx, error = %e, "failed to store record");
                summary.failures.push((idx, e));
            }
        }
    }
    summary.failures.sort_by_key(|(idx, _)| *idx);
    summary
}
