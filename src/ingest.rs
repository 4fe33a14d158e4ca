use std::io::Read;
use std::path::Path;

use anyhow::Context;
use clap::ValueEnum;
use serde::Deserialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::attendance::recompute_attendance;
use crate::models::{fields, USERS, WEEKLY_ATTENDANCE, WEEKLY_POINTS, WEEKS};
use crate::ranking::recompute_ranking;
use crate::store::{DocumentStore, FieldValue, WriteBatch};
use crate::triggers::{self, ChangeEvent, ChangeOp};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ImportKind {
    /// Rows of `tribo,pontos`
    Points,
    /// Rows of `semana,presente,ausente`
    Attendance,
}

impl ImportKind {
    pub fn collection(self) -> &'static str {
        match self {
            ImportKind::Points => WEEKLY_POINTS,
            ImportKind::Attendance => WEEKLY_ATTENDANCE,
        }
    }
}

#[derive(Deserialize)]
struct PointsRow {
    tribo: String,
    pontos: f64,
}

#[derive(Deserialize)]
struct AttendanceRow {
    semana: String,
    presente: f64,
    ausente: f64,
}

pub fn import_batch<R: Read>(
    kind: ImportKind,
    reader: R,
) -> anyhow::Result<(WriteBatch, Option<String>)> {
    let mut reader = csv::Reader::from_reader(reader);
    let mut batch = WriteBatch::new();
    let mut last_id = None;

    match kind {
        ImportKind::Points => {
            for (line, result) in reader.deserialize::<PointsRow>().enumerate() {
                let row = result.with_context(|| format!("invalid points row {}", line + 1))?;
                let id = Uuid::new_v4().to_string();
                batch.set_merge(
                    WEEKLY_POINTS,
                    id.as_str(),
                    [
                        (fields::GROUP, FieldValue::from(json!(row.tribo))),
                        (fields::POINTS, FieldValue::from(json!(row.pontos))),
                    ],
                );
                last_id = Some(id);
            }
        }
        ImportKind::Attendance => {
            for (line, result) in reader.deserialize::<AttendanceRow>().enumerate() {
                let row =
                    result.with_context(|| format!("invalid attendance row {}", line + 1))?;
                let id = Uuid::new_v4().to_string();
                batch.set_merge(
                    WEEKLY_ATTENDANCE,
                    id.as_str(),
                    [
                        (fields::WEEK, FieldValue::from(json!(row.semana))),
                        (fields::PRESENT, FieldValue::from(json!(row.presente))),
                        (fields::ABSENT, FieldValue::from(json!(row.ausente))),
                    ],
                );
                last_id = Some(id);
            }
        }
    }

    Ok((batch, last_id))
}

/// Writes every row in one batch, then fires the change trigger once for the
/// imported collection.
pub async fn import_csv(
    store: &dyn DocumentStore,
    kind: ImportKind,
    csv_path: &Path,
) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let (batch, last_id) = import_batch(kind, file)?;
    let inserted = batch.len();

    let Some(last_id) = last_id else {
        return Ok(0);
    };

    store.commit(batch).await?;
    info!(collection = kind.collection(), inserted, "source rows imported");

    let event = ChangeEvent {
        collection: kind.collection().to_string(),
        id: last_id,
        op: ChangeOp::Create,
    };
    triggers::dispatch(store, &event).await?;

    Ok(inserted)
}

fn seed_batch() -> WriteBatch {
    let mut batch = WriteBatch::new();

    let weeks = [
        ("semana-01", "Semana 1", 1),
        ("semana-02", "Semana 2", 2),
        ("semana-03", "Semana 3", 3),
        ("semana-04", "Semana 4", 4),
    ];
    for (id, name, order) in weeks {
        batch.set_merge(
            WEEKS,
            id,
            [
                (fields::WEEK_NAME, FieldValue::from(name)),
                (fields::WEEK_ORDER, FieldValue::from(json!(order))),
            ],
        );
    }

    let points = [
        ("seed-pontos-001", "Aurora", 12),
        ("seed-pontos-002", "Boreal", 9),
        ("seed-pontos-003", "Cerrado", 15),
        ("seed-pontos-004", "Aurora", 7),
        ("seed-pontos-005", "Boreal", 11),
        ("seed-pontos-006", "Cerrado", 4),
    ];
    for (id, group, value) in points {
        batch.set_merge(
            WEEKLY_POINTS,
            id,
            [
                (fields::GROUP, FieldValue::from(group)),
                (fields::POINTS, FieldValue::from(json!(value))),
            ],
        );
    }

    let attendance = [
        ("seed-presenca-001", "Semana 1", 28, 2),
        ("seed-presenca-002", "Semana 1", 25, 5),
        ("seed-presenca-003", "Semana 2", 27, 3),
        ("seed-presenca-004", "Semana 3", 22, 8),
    ];
    for (id, week, present, absent) in attendance {
        batch.set_merge(
            WEEKLY_ATTENDANCE,
            id,
            [
                (fields::WEEK, FieldValue::from(week)),
                (fields::PRESENT, FieldValue::from(json!(present))),
                (fields::ABSENT, FieldValue::from(json!(absent))),
            ],
        );
    }

    let users = [
        ("coordenacao@groupscholar.com", "admin"),
        ("monitoria@groupscholar.com", "viewer"),
    ];
    for (email, role) in users {
        batch.set_merge(USERS, email, [(fields::ROLE, FieldValue::from(role))]);
    }

    batch
}

/// Loads a small, realistic program and builds its aggregates. Fixed ids make
/// reseeding idempotent.
pub async fn seed(store: &dyn DocumentStore) -> anyhow::Result<usize> {
    let batch = seed_batch();
    let written = batch.len();
    store.commit(batch).await?;

    recompute_ranking(store).await?;
    recompute_attendance(store).await?;
    Ok(written)
}
