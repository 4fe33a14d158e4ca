use std::collections::BTreeMap;

use tracing::info;

use crate::coerce;
use crate::error::AggregateError;
use crate::models::{fields, RankingRun, RANKING_TOTAL, WEEKLY_POINTS};
use crate::store::{Document, DocumentStore, FieldValue, WriteBatch};

pub fn total_by_group(records: &[Document]) -> (BTreeMap<String, f64>, usize) {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    let mut skipped = 0usize;

    for record in records {
        let Some(group) = coerce::text_key(record.field(fields::GROUP)) else {
            skipped += 1;
            continue;
        };

        let points = coerce::number(record.field(fields::POINTS));
        *totals.entry(group).or_insert(0.0) += points;
    }

    (totals, skipped)
}

pub fn ranking_batch(totals: &BTreeMap<String, f64>) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for (group, total) in totals {
        batch.set_merge(
            RANKING_TOTAL,
            group.as_str(),
            [
                (fields::TOTAL, FieldValue::Value(coerce::number_value(*total))),
                (fields::UPDATED_AT, FieldValue::ServerTimestamp),
            ],
        );
    }
    batch
}

/// Rebuilds `ranking_total` from `pontos_semanais`.
///
/// Groups that no longer have weekly points keep their last total.
pub async fn recompute_ranking(store: &dyn DocumentStore) -> Result<RankingRun, AggregateError> {
    let records = store.get_all(WEEKLY_POINTS).await?;
    let (totals, skipped) = total_by_group(&records);

    store.commit(ranking_batch(&totals)).await?;

    let run = RankingRun {
        scanned: records.len(),
        skipped,
        groups: totals.len(),
    };
    info!(
        scanned = run.scanned,
        skipped = run.skipped,
        groups = run.groups,
        "ranking recomputed"
    );
    Ok(run)
}
