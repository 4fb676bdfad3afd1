use crate::grades::GradeMatrix;
use crate::ipc::error::{no_workspace, respond, HandlerErr};
use crate::ipc::params::{get_raw_value, get_required_i64};
use crate::ipc::types::{today, AppState, Request};
use crate::model::{Assignment, Grade, Student};
use crate::repo::RecordRepository;
use crate::store::{load_class_roster, SqliteRepository};
use rusqlite::Connection;
use serde_json::json;

fn class_matrix(conn: &Connection, class_id: i64) -> Result<GradeMatrix, HandlerErr> {
    let (_, roster) = load_class_roster(conn, class_id)?;
    let assignments =
        SqliteRepository::<Assignment>::new(conn).get_by_foreign_key("classId", class_id)?;
    let grades = SqliteRepository::<Grade>::new(conn).get_all()?;
    Ok(GradeMatrix::build(&roster, &assignments, &grades))
}

fn grades_matrix(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let class_id = get_required_i64(params, "classId")?;
    let matrix = class_matrix(conn, class_id)?;
    Ok(json!({ "classId": class_id, "matrix": matrix }))
}

fn grades_set_score(conn: &Connection, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let assignment_id = get_required_i64(params, "assignmentId")?;
    let raw = get_raw_value(params, "value")?;

    SqliteRepository::<Student>::new(conn).get_by_id(student_id)?;
    let assignment = SqliteRepository::<Assignment>::new(conn).get_by_id(assignment_id)?;
    let matrix = class_matrix(conn, assignment.class_id)?;

    let mut repo = SqliteRepository::<Grade>::new(conn);
    let grade = matrix.set_score(&mut repo, student_id, assignment_id, &raw, today())?;

    let refreshed = class_matrix(conn, assignment.class_id)?;
    Ok(json!({
        "grade": grade,
        "score": refreshed.score(student_id, assignment_id),
        "average": refreshed.compute_average(student_id),
        "weightedAverage": refreshed.weighted_average(student_id),
    }))
}

fn handle_grades_matrix(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, grades_matrix(conn, &req.params))
}

fn handle_grades_set_score(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return no_workspace(&req.id);
    };
    respond(&req.id, grades_set_score(conn, &req.params))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.matrix" => Some(handle_grades_matrix(state, req)),
        "grades.setScore" => Some(handle_grades_set_score(state, req)),
        _ => None,
    }
}
