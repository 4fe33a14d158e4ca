use std::collections::HashMap;

use tracing::{debug, info};

use crate::coerce;
use crate::error::AggregateError;
use crate::models::{
    fields, AttendanceRun, WeekTally, ABSENCE_SUMMARY, ABSENCE_SUMMARY_ID, ATTENDANCE_AGG,
    WEEKLY_ATTENDANCE, WEEKS,
};
use crate::store::{Document, DocumentStore, FieldValue, WriteBatch};

/// Week names in `ordem` order. A week without a usable `nome` is known by its
/// document id; repeated names keep their first position.
pub fn canonical_weeks(weeks: &[Document]) -> Vec<String> {
    let mut names: Vec<String> = Vec::with_capacity(weeks.len());
    for week in weeks {
        let name = coerce::text_key(week.field(fields::WEEK_NAME))
            .unwrap_or_else(|| week.id.clone());
        if !names.contains(&name) {
            names.push(name);
        }
    }
    names
}

pub fn tally_attendance(weeks: &[String], records: &[Document]) -> (Vec<WeekTally>, usize) {
    let mut tallies: Vec<WeekTally> = weeks.iter().map(WeekTally::empty).collect();
    let index: HashMap<&str, usize> = weeks
        .iter()
        .enumerate()
        .map(|(position, name)| (name.as_str(), position))
        .collect();
    let mut dropped = 0usize;

    for record in records {
        let position = coerce::text_key(record.field(fields::WEEK))
            .and_then(|week| index.get(week.as_str()).copied());
        let Some(position) = position else {
            dropped += 1;
            continue;
        };

        let tally = &mut tallies[position];
        tally.present += coerce::number(record.field(fields::PRESENT));
        tally.absent += coerce::number(record.field(fields::ABSENT));
    }

    (tallies, dropped)
}

pub fn total_absences(tallies: &[WeekTally]) -> f64 {
    tallies.iter().map(|tally| tally.absent).sum()
}

fn aggregate_batch(tallies: &[WeekTally]) -> WriteBatch {
    let mut batch = WriteBatch::new();
    for tally in tallies {
        batch.set_merge(
            ATTENDANCE_AGG,
            tally.week.as_str(),
            [
                (fields::WEEK, FieldValue::from(tally.week.as_str())),
                (fields::PRESENT, FieldValue::Value(coerce::number_value(tally.present))),
                (fields::ABSENT, FieldValue::Value(coerce::number_value(tally.absent))),
                (fields::UPDATED_AT, FieldValue::ServerTimestamp),
            ],
        );
    }
    batch
}

fn summary_batch(absences: f64) -> WriteBatch {
    let mut batch = WriteBatch::new();
    batch.set_merge(
        ABSENCE_SUMMARY,
        ABSENCE_SUMMARY_ID,
        [
            (fields::ABSENCES, FieldValue::Value(coerce::number_value(absences))),
            // Justified absences have no source collection yet.
            (fields::JUSTIFIED, FieldValue::Value(coerce::number_value(0.0))),
            (fields::UPDATED_AT, FieldValue::ServerTimestamp),
        ],
    );
    batch
}

pub async fn recompute_attendance(
    store: &dyn DocumentStore,
) -> Result<AttendanceRun, AggregateError> {
    let weeks = store.get_ordered(WEEKS, fields::WEEK_ORDER).await?;
    let names = canonical_weeks(&weeks);
    debug!(weeks = names.len(), "canonical weeks loaded");

    let records = store.get_all(WEEKLY_ATTENDANCE).await?;
    let (tallies, dropped) = tally_attendance(&names, &records);

    store.commit(aggregate_batch(&tallies)).await?;

    let absences = total_absences(&tallies);
    store.commit(summary_batch(absences)).await?;

    let run = AttendanceRun {
        weeks: tallies.len(),
        scanned: records.len(),
        dropped,
        absences,
    };
    info!(
        weeks = run.weeks,
        scanned = run.scanned,
        dropped = run.dropped,
        absences = run.absences,
        "attendance recomputed"
    );
    Ok(run)
}
