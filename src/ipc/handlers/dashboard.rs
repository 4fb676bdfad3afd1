use crate::dashboard::{self, DEFAULT_LIST_LIMIT};
use crate::ipc::error::{no_workspace, respond, HandlerErr};
use crate::ipc::params::{get_limit, get_optional_date};
use crate::ipc::types::{today, AppState, Request};
use crate::store::load_snapshot;
use rusqlite::Connection;
use serde_json::{json, Value};

fn dashboard_stats(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let as_of = get_optional_date(params, "asOf")?.unwrap_or_else(today);
    let snap = load_snapshot(conn)?;
    Ok(json!({ "asOf": as_of, "stats": dashboard::compute_stats(&snap, as_of) }))
}

fn dashboard_recent_activity(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let limit = get_limit(params, DEFAULT_LIST_LIMIT)?;
    let snap = load_snapshot(conn)?;
    Ok(json!({ "items": dashboard::recent_activity(&snap, limit) }))
}

fn dashboard_upcoming(conn: &Connection, params: &Value) -> Result<Value, HandlerErr> {
    let limit = get_limit(params, DEFAULT_LIST_LIMIT)?;
    let as_of = get_optional_date(params, "asOf")?.unwrap_or_else(today);
    let snap = load_snapshot(conn)?;
    Ok(json!({ "items": dashboard::upcoming_assignments(&snap, as_of, limit) }))
}

fn dashboard_class_performance(conn: &Connection, _params: &Value) -> Result<Value, HandlerErr> {
    let snap = load_snapshot(conn)?;
    Ok(json!({ "classes": dashboard::all_class_performance(&snap) }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let f: fn(&Connection, &Value) -> Result<Value, HandlerErr> = match req.method.as_str() {
        "dashboard.stats" => dashboard_stats,
        "dashboard.recentActivity" => dashboard_recent_activity,
        "dashboard.upcomingAssignments" => dashboard_upcoming,
        "dashboard.classPerformance" => dashboard_class_performance,
        _ => return None,
    };
    let Some(conn) = state.db.as_ref() else {
        return Some(no_workspace(&req.id));
    };
    Some(respond(&req.id, f(conn, &req.params)))
}
