use crate::attendance::{self, shift_week, AttendanceMatrix};
use crate::ipc::error::{no_workspace, respond, HandlerErr};
use crate::ipc::params::{get_optional_i64, get_required_date, get_required_i64, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::model::Attendance;
use crate::repo::RecordRepository;
use crate::store::{load_class_roster, SqliteRepository};
use rusqlite::Connection;
use serde_json::{json, Value};

fn attendance_week(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_i64(params, "classId")?;
    let anchor = get_required_date(params, "anchorDate")?;
    let offset = get_optional_i64(params, "offsetWeeks")?.unwrap_or(0);
    let anchor = shift_week(anchor, offset);

    let (_, roster) = load_class_roster(conn, class_id)?;
    let records = SqliteRepository::<Attendance>::new(conn).get_all()?;
    let matrix = AttendanceMatrix::build_week(class_id, &roster, &records, anchor);
    Ok(json!({ "anchorDate": anchor, "matrix": matrix }))
}

fn attendance_set_status(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let date = get_required_date(params, "date")?;
    let status = get_required_str(params, "status")?;
    let class_id = get_required_i64(params, "classId")?;

    let mut repo = SqliteRepository::<Attendance>::new(conn);
    let record = attendance::set_status(&mut repo, student_id, date, status, class_id)?;
    Ok(json!({ "record": record }))
}

fn attendance_mark_all_present(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_i64(params, "classId")?;
    let date = get_required_date(params, "date")?;

    let (_, roster) = load_class_roster(conn, class_id)?;
    let mut repo = SqliteRepository::<Attendance>::new(conn);
    let records = repo.get_all()?;
    let matrix = AttendanceMatrix::build_week(class_id, &roster, &records, date);
    let outcome = matrix.mark_all_present(&mut repo, date, &roster);
    tracing::info!(
        class_id,
        %date,
        updated = outcome.updated.len(),
        skipped = outcome.skipped.len(),
        failed = outcome.failures.len(),
        "mark all present"
    );
    Ok(json!(outcome))
}

fn attendance_class_stats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let class_id = get_required_i64(params, "classId")?;
    let records = SqliteRepository::<Attendance>::new(conn).get_by_foreign_key("classId", class_id)?;
    Ok(json!({ "stats": attendance::compute_class_stats(class_id, &records) }))
}

fn with_conn(
    state: &mut AppState,
    req: &Request,
    f: fn(&Connection, &Value) -> Result<Value, HandlerErr>,
) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, f(conn, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "attendance.week" => Some(with_conn(state, req, attendance_week)),
        "attendance.setStatus" => Some(with_conn(state, req, attendance_set_status)),
        "attendance.markAllPresent" => Some(with_conn(state, req, attendance_mark_all_present)),
        "attendance.classStats" => Some(with_conn(state, req, attendance_class_stats)),
        _ => None,
    }
}
