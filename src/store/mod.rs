use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

#[cfg(test)]
pub mod memory;
pub mod postgres;

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Map<String, Value>,
}

impl Document {
    pub fn new(id: impl Into<String>, data: Map<String, Value>) -> Self {
        Self {
            id: id.into(),
            data,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Value(Value),
    /// Replaced by the commit time of the batch that carries it.
    ServerTimestamp,
}

impl From<Value> for FieldValue {
    fn from(value: Value) -> Self {
        FieldValue::Value(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Value(Value::from(value))
    }
}

/// One `set(.., merge)` write: listed fields are overwritten, every other
/// field already on the document is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct SetMerge {
    pub collection: String,
    pub id: String,
    pub fields: BTreeMap<String, FieldValue>,
}

impl SetMerge {
    pub fn resolve(&self, commit_time: DateTime<Utc>) -> Map<String, Value> {
        self.fields
            .iter()
            .map(|(name, value)| {
                let value = match value {
                    FieldValue::Value(value) => value.clone(),
                    FieldValue::ServerTimestamp => Value::from(timestamp_text(commit_time)),
                };
                (name.clone(), value)
            })
            .collect()
    }
}

pub fn timestamp_text(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[derive(Debug, Default)]
pub struct WriteBatch {
    writes: Vec<SetMerge>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_merge<I, K>(&mut self, collection: &str, id: impl Into<String>, fields: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, FieldValue)>,
        K: Into<String>,
    {
        self.writes.push(SetMerge {
            collection: collection.to_string(),
            id: id.into(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        });
        self
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn writes(&self) -> &[SetMerge] {
        &self.writes
    }
}

#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn get_all(&self, collection: &str) -> anyhow::Result<Vec<Document>>;

    /// Documents carrying `field`, ascending by its value. Documents without
    /// the field are not returned.
    async fn get_ordered(&self, collection: &str, field: &str) -> anyhow::Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> anyhow::Result<Option<Document>>;

    async fn commit(&self, batch: WriteBatch) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn server_timestamps_resolve_to_commit_time() {
        let mut batch = WriteBatch::new();
        batch.set_merge(
            "ranking_total",
            "Aurora",
            [
                ("total", FieldValue::from(json!(13))),
                ("atualizadoEm", FieldValue::ServerTimestamp),
            ],
        );

        let commit_time = Utc.with_ymd_and_hms(2026, 3, 2, 12, 30, 0).unwrap();
        let resolved = batch.writes()[0].resolve(commit_time);

        assert_eq!(resolved["total"], json!(13));
        assert_eq!(resolved["atualizadoEm"], json!("2026-03-02T12:30:00.000Z"));
    }

    #[test]
    fn batches_keep_write_order() {
        let mut batch = WriteBatch::new();
        batch
            .set_merge("semanas", "w2", [("nome", FieldValue::from("Semana 2"))])
            .set_merge("semanas", "w1", [("nome", FieldValue::from("Semana 1"))]);

        let ids: Vec<&str> = batch.writes().iter().map(|w| w.id.as_str()).collect();
        assert_eq!(ids, vec!["w2", "w1"]);
        assert_eq!(batch.len(), 2);
    }
}
