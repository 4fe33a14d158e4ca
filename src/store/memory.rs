use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::{Map, Value};

use super::{Document, DocumentStore, WriteBatch};

type Collection = BTreeMap<String, Map<String, Value>>;

#[derive(Default)]
pub struct MemoryStore {
    collections: Mutex<BTreeMap<String, Collection>>,
    failing_reads: Mutex<HashSet<String>>,
    failing_commits: Mutex<HashSet<String>>,
    commits: Mutex<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, collection: &str, id: &str, data: Value) {
        let data = match data {
            Value::Object(map) => map,
            other => panic!("document body must be an object, got {other}"),
        };
        self.collections
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), data);
    }

    pub fn doc(&self, collection: &str, id: &str) -> Option<Map<String, Value>> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .and_then(|docs| docs.get(id))
            .cloned()
    }

    pub fn ids(&self, collection: &str) -> Vec<String> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|docs| docs.keys().cloned().collect())
            .unwrap_or_default()
    }

    pub fn fail_reads_from(&self, collection: &str) {
        self.failing_reads.lock().unwrap().insert(collection.to_string());
    }

    pub fn fail_commits_to(&self, collection: &str) {
        self.failing_commits
            .lock()
            .unwrap()
            .insert(collection.to_string());
    }

    pub fn commit_count(&self) -> usize {
        *self.commits.lock().unwrap()
    }

    fn check_read(&self, collection: &str) -> anyhow::Result<()> {
        if self.failing_reads.lock().unwrap().contains(collection) {
            return Err(anyhow!("read from {collection} unavailable"));
        }
        Ok(())
    }

    fn snapshot(&self, collection: &str) -> Vec<Document> {
        self.collections
            .lock()
            .unwrap()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .map(|(id, data)| Document::new(id.clone(), data.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<Document>> {
        self.check_read(collection)?;
        Ok(self.snapshot(collection))
    }

    async fn get_ordered(&self, collection: &str, field: &str) -> anyhow::Result<Vec<Document>> {
        self.check_read(collection)?;
        let mut docs: Vec<Document> = self
            .snapshot(collection)
            .into_iter()
            .filter(|doc| doc.field(field).is_some())
            .collect();
        docs.sort_by(|a, b| {
            let (Some(x), Some(y)) = (a.field(field), b.field(field)) else {
                return Ordering::Equal;
            };
            compare_values(x, y).then_with(|| a.id.cmp(&b.id))
        });
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>> {
        self.check_read(collection)?;
        Ok(self
            .doc(collection, id)
            .map(|data| Document::new(id.to_string(), data)))
    }

    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()> {
        {
            let failing = self.failing_commits.lock().unwrap();
            if let Some(write) = batch
                .writes()
                .iter()
                .find(|write| failing.contains(&write.collection))
            {
                return Err(anyhow!("commit to {} rejected", write.collection));
            }
        }

        let commit_time = Utc::now();
        let mut collections = self.collections.lock().unwrap();
        for write in batch.writes() {
            let doc = collections
                .entry(write.collection.clone())
                .or_default()
                .entry(write.id.clone())
                .or_default();
            for (name, value) in write.resolve(commit_time) {
                doc.insert(name, value);
            }
        }
        *self.commits.lock().unwrap() += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FieldValue;
    use serde_json::json;

    #[tokio::test]
    async fn ordered_reads_skip_documents_without_the_field() {
        let store = MemoryStore::new();
        store.insert("semanas", "w3", json!({"nome": "Semana 3", "ordem": 3}));
        store.insert("semanas", "w1", json!({"nome": "Semana 1", "ordem": 1}));
        store.insert("semanas", "rascunho", json!({"nome": "Sem ordem"}));
        store.insert("semanas", "w2", json!({"nome": "Semana 2", "ordem": 2}));

        let docs = store.get_ordered("semanas", "ordem").await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["w1", "w2", "w3"]);
    }

    #[tokio::test]
    async fn mixed_order_values_sort_strings_then_numbers_then_booleans() {
        let store = MemoryStore::new();
        store.insert("semanas", "flag", json!({"ordem": true}));
        store.insert("semanas", "dois", json!({"ordem": 2}));
        store.insert("semanas", "texto", json!({"ordem": "10"}));
        store.insert("semanas", "um", json!({"ordem": 1.5}));
        store.insert("semanas", "vazio", json!({"ordem": null}));

        let docs = store.get_ordered("semanas", "ordem").await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["vazio", "texto", "um", "dois", "flag"]);
    }

    #[tokio::test]
    async fn merge_commit_keeps_unlisted_fields() {
        let store = MemoryStore::new();
        store.insert("ranking_total", "Aurora", json!({"total": 1, "cor": "azul"}));

        let mut batch = WriteBatch::new();
        batch.set_merge("ranking_total", "Aurora", [("total", FieldValue::from(json!(9)))]);
        store.commit(batch).await.unwrap();

        let doc = store.doc("ranking_total", "Aurora").unwrap();
        assert_eq!(doc["total"], json!(9));
        assert_eq!(doc["cor"], json!("azul"));
    }

    #[tokio::test]
    async fn rejected_commit_writes_nothing() {
        let store = MemoryStore::new();
        store.fail_commits_to("faltas_agregado");

        let mut batch = WriteBatch::new();
        batch
            .set_merge("ranking_total", "Aurora", [("total", FieldValue::from(json!(9)))])
            .set_merge("faltas_agregado", "default", [("faltas", FieldValue::from(json!(1)))]);

        assert!(store.commit(batch).await.is_err());
        assert!(store.ids("ranking_total").is_empty());
        assert_eq!(store.commit_count(), 0);
    }
}
