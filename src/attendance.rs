use crate::error::CoreError;
use crate::model::{Attendance, AttendanceStatus, Student};
use crate::repo::RecordRepository;
use chrono::{Datelike, Duration, NaiveDate};
use serde::Serialize;
use std::collections::HashMap;

pub const WEEK_DAYS: i64 = 5;

/// Monday on or before `anchor`.
pub fn week_start(anchor: NaiveDate) -> NaiveDate {
    anchor - Duration::days(anchor.weekday().num_days_from_monday() as i64)
}

/// The five weekdays of the week containing `anchor`, Monday first.
pub fn week_window(anchor: NaiveDate) -> Vec<NaiveDate> {
    let start = week_start(anchor);
    (0..WEEK_DAYS).map(|i| start + Duration::days(i)).collect()
}

/// Moves `anchor` by whole weeks; negative goes back.
pub fn shift_week(anchor: NaiveDate, weeks: i64) -> NaiveDate {
    anchor + Duration::days(7 * weeks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CellStatus {
    Unset,
    Present,
    Absent,
    Tardy,
}

impl From<Option<AttendanceStatus>> for CellStatus {
    fn from(v: Option<AttendanceStatus>) -> Self {
        match v {
            None => CellStatus::Unset,
            Some(AttendanceStatus::Present) => CellStatus::Present,
            Some(AttendanceStatus::Absent) => CellStatus::Absent,
            Some(AttendanceStatus::Tardy) => CellStatus::Tardy,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCell {
    pub date: NaiveDate,
    pub record_id: Option<i64>,
    pub status: CellStatus,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRow {
    pub student_id: i64,
    pub display_name: String,
    pub cells: Vec<AttendanceCell>,
}

/// Student × weekday status grid for one class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceMatrix {
    pub class_id: i64,
    pub week_start: NaiveDate,
    pub dates: Vec<NaiveDate>,
    pub rows: Vec<AttendanceRow>,
    #[serde(skip)]
    by_cell: HashMap<(i64, NaiveDate), (i64, AttendanceStatus)>,
}

impl AttendanceMatrix {
    pub fn build_week(
        class_id: i64,
        roster: &[Student],
        attendance: &[Attendance],
        anchor: NaiveDate,
    ) -> Self {
        let mut by_cell = HashMap::new();
        for a in attendance {
            by_cell.entry((a.student_id, a.date)).or_insert((a.id, a.status));
        }
        let dates = week_window(anchor);
        let rows = roster
            .iter()
            .map(|s| AttendanceRow {
                student_id: s.id,
                display_name: s.display_name(),
                cells: dates
                    .iter()
                    .map(|d| {
                        let hit = by_cell.get(&(s.id, *d));
                        AttendanceCell {
                            date: *d,
                            record_id: hit.map(|(id, _)| *id),
                            status: hit.map(|(_, st)| *st).into(),
                        }
                    })
                    .collect(),
            })
            .collect();

        AttendanceMatrix {
            class_id,
            week_start: week_start(anchor),
            dates,
            rows,
            by_cell,
        }
    }

    pub fn get_status(&self, student_id: i64, date: NaiveDate) -> CellStatus {
        self.by_cell
            .get(&(student_id, date))
            .map(|(_, st)| *st)
            .into()
    }

    /// Marks every roster student present on `date`, skipping those already present.
    /// Failures are collected per student; the batch never stops early.
    pub fn mark_all_present<R>(
        &self,
        repo: &mut R,
        date: NaiveDate,
        roster: &[Student],
    ) -> MarkAllOutcome
    where
        R: RecordRepository<Attendance> + ?Sized,
    {
        let mut out = MarkAllOutcome::default();
        for s in roster {
            if self.get_status(s.id, date) == CellStatus::Present {
                out.skipped.push(s.id);
                continue;
            }
            match upsert_attendance(repo, s.id, date, AttendanceStatus::Present, self.class_id) {
                Ok(saved) => out.updated.push(saved),
                Err(e) => {
                    tracing::warn!(student_id = s.id, %date, error = %e, "mark present failed");
                    out.failures.push(MarkFailure {
                        student_id: s.id,
                        code: e.code(),
                        message: e.to_string(),
                    });
                }
            }
        }
        out
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkFailure {
    pub student_id: i64,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkAllOutcome {
    pub updated: Vec<Attendance>,
    pub skipped: Vec<i64>,
    pub failures: Vec<MarkFailure>,
}

/// Parses `status` and upserts the (student, date) record.
pub fn set_status<R>(
    repo: &mut R,
    student_id: i64,
    date: NaiveDate,
    status: &str,
    class_id: i64,
) -> Result<Attendance, CoreError>
where
    R: RecordRepository<Attendance> + ?Sized,
{
    let status: AttendanceStatus = status.parse()?;
    upsert_attendance(repo, student_id, date, status, class_id)
}

pub fn upsert_attendance<R>(
    repo: &mut R,
    student_id: i64,
    date: NaiveDate,
    status: AttendanceStatus,
    class_id: i64,
) -> Result<Attendance, CoreError>
where
    R: RecordRepository<Attendance> + ?Sized,
{
    let existing = repo
        .get_by_foreign_key("studentId", student_id)?
        .into_iter()
        .find(|a| a.date == date);

    match existing {
        Some(mut record) => {
            record.status = status;
            record.class_id = class_id;
            let id = record.id;
            let saved = repo.update(id, record)?;
            tracing::info!(record_id = id, student_id, %date, %status, "attendance updated");
            Ok(saved)
        }
        None => {
            let saved = repo.create(Attendance {
                id: 0,
                student_id,
                class_id,
                date,
                status,
                notes: String::new(),
            })?;
            tracing::info!(record_id = saved.id, student_id, %date, %status, "attendance created");
            Ok(saved)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassAttendanceStats {
    pub class_id: i64,
    pub total_sessions: usize,
    pub present_count: usize,
    pub absent_count: usize,
    pub tardy_count: usize,
    pub attendance_rate: f64,
}

/// Present share of `class_id`'s rows in `attendance`; rows of other classes are ignored.
pub fn compute_class_stats(class_id: i64, attendance: &[Attendance]) -> ClassAttendanceStats {
    let mut stats = ClassAttendanceStats {
        class_id,
        total_sessions: 0,
        present_count: 0,
        absent_count: 0,
        tardy_count: 0,
        attendance_rate: 0.0,
    };
    for a in attendance.iter().filter(|a| a.class_id == class_id) {
        stats.total_sessions += 1;
        match a.status {
            AttendanceStatus::Present => stats.present_count += 1,
            AttendanceStatus::Absent => stats.absent_count += 1,
            AttendanceStatus::Tardy => stats.tardy_count += 1,
        }
    }
    if stats.total_sessions > 0 {
        stats.attendance_rate = stats.present_count as f64 / stats.total_sessions as f64 * 100.0;
    }
    stats
}
