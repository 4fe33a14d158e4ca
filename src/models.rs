pub const WEEKLY_POINTS: &str = "pontos_semanais";
pub const RANKING_TOTAL: &str = "ranking_total";
pub const WEEKS: &str = "semanas";
pub const WEEKLY_ATTENDANCE: &str = "presencas_semanais";
pub const ATTENDANCE_AGG: &str = "presencas_semanais_agg";
pub const ABSENCE_SUMMARY: &str = "faltas_agregado";
pub const USERS: &str = "usuarios";

pub const ABSENCE_SUMMARY_ID: &str = "default";

pub mod fields {
    pub const GROUP: &str = "tribo";
    pub const POINTS: &str = "pontos";
    pub const TOTAL: &str = "total";
    pub const WEEK_NAME: &str = "nome";
    pub const WEEK_ORDER: &str = "ordem";
    pub const WEEK: &str = "semana";
    pub const PRESENT: &str = "presente";
    pub const ABSENT: &str = "ausente";
    pub const ABSENCES: &str = "faltas";
    pub const JUSTIFIED: &str = "justificadas";
    pub const ROLE: &str = "papel";
    pub const UPDATED_AT: &str = "atualizadoEm";
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RankingRun {
    pub scanned: usize,
    pub skipped: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AttendanceRun {
    pub weeks: usize,
    pub scanned: usize,
    pub dropped: usize,
    pub absences: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeekTally {
    pub week: String,
    pub present: f64,
    pub absent: f64,
}

impl WeekTally {
    pub fn empty(week: impl Into<String>) -> Self {
        Self {
            week: week.into(),
            present: 0.0,
            absent: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankingRow {
    pub group: String,
    pub total: f64,
    pub updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AbsenceRow {
    pub absences: f64,
    pub justified: f64,
    pub updated_at: Option<String>,
}
