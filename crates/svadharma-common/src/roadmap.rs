/// Saved roadmap persistence.
///
/// The whole list lives under one key as a JSON array, newest first. Every mutation is a
/// full read-modify-write of that key; there is no cross-process coordination, so two
/// writers racing on the same key resolve as last-write-wins on the whole list.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::error::CommonError;
use crate::gemini::AiResponse;
use crate::kv::KvStore;

pub const DEFAULT_ROADMAP_KEY: &str = "svadharma_plans";

static ROADMAP_COUNTER: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SavedRoadmap {
    pub id: String,
    pub title: String,
    /// Human-readable creation date, e.g. "19 Oct 2026".
    pub date: String,
    pub response: AiResponse,
}

pub struct RoadmapStore {
    kv: Arc<dyn KvStore>,
    key: String,
}

impl RoadmapStore {
    pub fn open(kv: Arc<dyn KvStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        info!(backend = kv.backend(), key = %key, "roadmap store opened");
        Self { kv, key }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read every saved roadmap, newest first.
    ///
    /// Entries that no longer decode are dropped. A value that is not a JSON array at all
    /// is copied to `{key}.corrupt` and read as an empty list.
    pub async fn load(&self) -> Result<Vec<SavedRoadmap>, CommonError> {
        let Some(raw) = self.kv.get(&self.key).await? else {
            return Ok(Vec::new());
        };

        let entries = match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
            Ok(entries) => entries,
            Err(e) => {
                let backup_key = format!("{}.corrupt", self.key);
                warn!(error = %e, key = %self.key, backup_key = %backup_key, "saved roadmaps unreadable, starting empty");
                self.kv.set(&backup_key, &raw).await?;
                return Ok(Vec::new());
            }
        };

        let total = entries.len();
        let roadmaps: Vec<SavedRoadmap> = entries
            .into_iter()
            .enumerate()
            .filter_map(|(index, entry)| {
                serde_json::from_value(entry)
                    .inspect_err(|e| warn!(error = %e, index, "dropping unreadable saved roadmap"))
                    .ok()
            })
            .collect();
        if roadmaps.len() != total {
            warn!(kept = roadmaps.len(), total, "some saved roadmaps were dropped");
        }
        Ok(roadmaps)
    }

    /// Record `response` as a new roadmap titled after `query` and put it at the head of the list.
    ///
    /// No idempotency check: saving the same response twice yields two entries.
    pub async fn save(&self, query: &str, response: AiResponse) -> Result<SavedRoadmap, CommonError> {
        let mut roadmaps = self.load().await?;

        let mut id = new_roadmap_id();
        while roadmaps.iter().any(|r| r.id == id) {
            id = new_roadmap_id();
        }

        let roadmap = SavedRoadmap {
            id,
            title: capitalize_title(query),
            date: display_date(),
            response,
        };
        roadmaps.insert(0, roadmap.clone());
        self.persist(&roadmaps).await?;

        info!(id = %roadmap.id, title = %roadmap.title, count = roadmaps.len(), "roadmap saved");
        Ok(roadmap)
    }

    /// Remove the roadmap with `id`, returning the remaining list. An unknown id leaves the
    /// list unchanged but still rewrites it.
    pub async fn delete(&self, id: &str) -> Result<Vec<SavedRoadmap>, CommonError> {
        let mut roadmaps = self.load().await?;
        let before = roadmaps.len();
        roadmaps.retain(|r| r.id != id);
        self.persist(&roadmaps).await?;

        let removed = before != roadmaps.len();
        info!(id, removed, count = roadmaps.len(), "roadmap delete");
        Ok(roadmaps)
    }

    pub async fn close(&self) -> Result<(), CommonError> {
        self.kv.flush().await?;
        info!(backend = self.kv.backend(), "roadmap store closed");
        Ok(())
    }

    async fn persist(&self, roadmaps: &[SavedRoadmap]) -> Result<(), CommonError> {
        let raw = serde_json::to_string(roadmaps)?;
        self.kv.set(&self.key, &raw).await
    }
}

/// Upper-case the first character of the trimmed query, leaving the rest as typed.
pub fn capitalize_title(query: &str) -> String {
    let query = query.trim();
    let mut chars = query.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn display_date() -> String {
    chrono::Local::now().format("%-d %b %Y").to_string()
}

fn new_roadmap_id() -> String {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_else(|_| Duration::from_secs(0));
    let counter = ROADMAP_COUNTER.fetch_add(1, Ordering::Relaxed);
    let pid = std::process::id();

    let mut h = Sha256::new();
    h.update(now.as_nanos().to_le_bytes());
    h.update(pid.to_le_bytes());
    h.update(counter.to_le_bytes());
    let digest = h.finalize();
    hex_lower(&digest[..8])
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0x0f) as usize] as char);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gemini::SourceLink;
    use crate::kv::{FileKv, MemoryKv};

    fn response(text: &str) -> AiResponse {
        AiResponse {
            text: text.to_string(),
            links: vec![SourceLink {
                uri: "https://neet.nta.nic.in/".to_string(),
                title: Some("NTA".to_string()),
            }],
        }
    }

    fn memory_store() -> (Arc<MemoryKv>, RoadmapStore) {
        let kv = Arc::new(MemoryKv::new());
        let store = RoadmapStore::open(kv.clone(), DEFAULT_ROADMAP_KEY);
        (kv, store)
    }

    #[test]
    fn test_capitalize_title() {
        assert_eq!(capitalize_title("how to crack jee?"), "How to crack jee?");
        assert_eq!(capitalize_title("  mbbs abroad"), "Mbbs abroad");
        assert_eq!(capitalize_title("NEET"), "NEET");
        assert_eq!(capitalize_title("éducation"), "Éducation");
        assert_eq!(capitalize_title("   "), "");
    }

    #[test]
    fn ids_are_hex_and_distinct() {
        let a = new_roadmap_id();
        let b = new_roadmap_id();
        assert_eq!(a.len(), 16);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn load_without_key_is_empty() {
        let (_, store) = memory_store();
        assert!(store.load().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_puts_new_record_at_head() {
        let (_, store) = memory_store();
        let first = store.save("jee roadmap", response("one")).await.unwrap();
        let second = store.save("neet roadmap", response("two")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![second.clone(), first.clone()]);
        assert_eq!(loaded[0].title, "Neet roadmap");
        assert_ne!(first.id, second.id);
        assert!(!loaded[0].date.is_empty());
    }

    #[tokio::test]
    async fn delete_removes_only_matching_record() {
        let (_, store) = memory_store();
        let a = store.save("a", response("a")).await.unwrap();
        let b = store.save("b", response("b")).await.unwrap();
        let c = store.save("c", response("c")).await.unwrap();

        let remaining = store.delete(&b.id).await.unwrap();
        assert_eq!(remaining, vec![c.clone(), a.clone()]);
        assert_eq!(store.load().await.unwrap(), vec![c, a]);
    }

    #[tokio::test]
    async fn delete_unknown_id_is_noop() {
        let (_, store) = memory_store();
        let a = store.save("a", response("a")).await.unwrap();
        let remaining = store.delete("does-not-exist").await.unwrap();
        assert_eq!(remaining, vec![a.clone()]);
        assert_eq!(store.load().await.unwrap(), vec![a]);
    }

    #[tokio::test]
    async fn save_delete_save_keeps_only_second_record() {
        let (_, store) = memory_store();
        let first = store.save("plan", response("first")).await.unwrap();
        store.delete(&first.id).await.unwrap();
        let second = store.save("plan", response("second")).await.unwrap();

        let loaded = store.load().await.unwrap();
        assert_eq!(loaded, vec![second.clone()]);
        assert_ne!(first.id, second.id);
    }

    #[tokio::test]
    async fn unreadable_entries_are_dropped() {
        let (kv, store) = memory_store();
        let raw = r#"[
            {"id": "1", "title": "Good", "date": "1 Jan 2026", "response": {"text": "ok", "links": []}},
            {"id": "2", "title": "Missing response"},
            42,
            {"id": "3", "title": "No links", "date": "2 Jan 2026", "response": {"text": "ok"}}
        ]"#;
        kv.set(DEFAULT_ROADMAP_KEY, raw).await.unwrap();

        let loaded = store.load().await.unwrap();
        let ids: Vec<&str> = loaded.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "3"]);
    }

    #[tokio::test]
    async fn non_array_value_is_backed_up_and_read_as_empty() {
        let (kv, store) = memory_store();
        kv.set(DEFAULT_ROADMAP_KEY, "{not json").await.unwrap();

        assert!(store.load().await.unwrap().is_empty());
        assert_eq!(
            kv.get("svadharma_plans.corrupt").await.unwrap().as_deref(),
            Some("{not json")
        );

        let saved = store.save("fresh start", response("x")).await.unwrap();
        assert_eq!(store.load().await.unwrap(), vec![saved]);
    }

    #[tokio::test]
    async fn persisted_format_is_plain_json_array() {
        let dir = tempfile::TempDir::new().unwrap();
        let kv = Arc::new(FileKv::new(dir.path()));
        let store = RoadmapStore::open(kv, DEFAULT_ROADMAP_KEY);
        let saved = store.save("design colleges", response("UCEED first")).await.unwrap();
        store.close().await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("svadharma_plans.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["id"], saved.id.as_str());
        assert_eq!(value[0]["title"], "Design colleges");
        assert_eq!(value[0]["response"]["text"], "UCEED first");
        assert_eq!(value[0]["response"]["links"][0]["uri"], "https://neet.nta.nic.in/");
    }
}
