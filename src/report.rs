use std::fmt::Write;

use serde_json::Value;

use crate::attendance::canonical_weeks;
use crate::coerce;
use crate::models::{
    fields, AbsenceRow, RankingRow, WeekTally, ABSENCE_SUMMARY, ABSENCE_SUMMARY_ID,
    ATTENDANCE_AGG, RANKING_TOTAL, WEEKS,
};
use crate::store::{Document, DocumentStore};

#[derive(Debug, Clone, Default)]
pub struct ReportData {
    pub ranking: Vec<RankingRow>,
    pub weeks: Vec<WeekTally>,
    pub absences: Option<AbsenceRow>,
}

fn timestamp(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

/// Highest total first; ties by group name.
pub fn ranking_rows(docs: &[Document]) -> Vec<RankingRow> {
    let mut rows: Vec<RankingRow> = docs
        .iter()
        .map(|doc| RankingRow {
            group: doc.id.clone(),
            total: coerce::number(doc.field(fields::TOTAL)),
            updated_at: timestamp(doc.field(fields::UPDATED_AT)),
        })
        .collect();

    rows.sort_by(|a, b| {
        b.total
            .partial_cmp(&a.total)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.group.cmp(&b.group))
    });
    rows
}

/// Aggregates in canonical week order. Aggregates left behind by weeks that
/// were removed from `semanas` follow, by name.
pub fn week_rows(week_names: &[String], docs: &[Document]) -> Vec<WeekTally> {
    let tally = |doc: &Document| WeekTally {
        week: doc.id.clone(),
        present: coerce::number(doc.field(fields::PRESENT)),
        absent: coerce::number(doc.field(fields::ABSENT)),
    };

    let mut rows: Vec<WeekTally> = week_names
        .iter()
        .filter_map(|name| docs.iter().find(|doc| &doc.id == name).map(tally))
        .collect();

    let mut orphans: Vec<WeekTally> = docs
        .iter()
        .filter(|doc| !week_names.contains(&doc.id))
        .map(tally)
        .collect();
    orphans.sort_by(|a, b| a.week.cmp(&b.week));

    rows.extend(orphans);
    rows
}

pub async fn load(store: &dyn DocumentStore) -> anyhow::Result<ReportData> {
    let ranking = ranking_rows(&store.get_all(RANKING_TOTAL).await?);

    let week_names = canonical_weeks(&store.get_ordered(WEEKS, fields::WEEK_ORDER).await?);
    let weeks = week_rows(&week_names, &store.get_all(ATTENDANCE_AGG).await?);

    let absences = store
        .get(ABSENCE_SUMMARY, ABSENCE_SUMMARY_ID)
        .await?
        .map(|doc| AbsenceRow {
            absences: coerce::number(doc.field(fields::ABSENCES)),
            justified: coerce::number(doc.field(fields::JUSTIFIED)),
            updated_at: timestamp(doc.field(fields::UPDATED_AT)),
        });

    Ok(ReportData {
        ranking,
        weeks,
        absences,
    })
}

pub fn build_report(data: &ReportData) -> String {
    let mut output = String::new();

    let _ = writeln!(output, "# Weekly Aggregates Report");
    let _ = writeln!(output);
    let _ = writeln!(output, "## Group Ranking");

    if data.ranking.is_empty() {
        let _ = writeln!(output, "No group totals recorded yet.");
    } else {
        for (position, row) in data.ranking.iter().enumerate() {
            let _ = write!(output, "{}. {}: {} points", position + 1, row.group, row.total);
            if let Some(updated_at) = &row.updated_at {
                let _ = write!(output, " (updated {updated_at})");
            }
            let _ = writeln!(output);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Weekly Attendance");

    if data.weeks.is_empty() {
        let _ = writeln!(output, "No weekly attendance recorded yet.");
    } else {
        let _ = writeln!(output, "| Week | Present | Absent |");
        let _ = writeln!(output, "| --- | ---: | ---: |");
        for week in &data.weeks {
            let _ = writeln!(output, "| {} | {} | {} |", week.week, week.present, week.absent);
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Absences");

    match &data.absences {
        None => {
            let _ = writeln!(output, "Absence summary not computed yet.");
        }
        Some(row) => {
            let _ = writeln!(output, "- Total absences: {}", row.absences);
            let _ = writeln!(output, "- Justified absences: {}", row.justified);
            if let Some(updated_at) = &row.updated_at {
                let _ = writeln!(output, "- Updated {updated_at}");
            }
        }
    }

    output
}
