use crate::error::CoreError;
use crate::grades::check_score;
use crate::ipc::error::{no_workspace, respond, HandlerErr};
use crate::ipc::params::{
    get_object, get_optional_object, get_required_i64, get_required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{Assignment, Attendance, Class, Employee, Grade, Record, Student};
use crate::repo::{merge_patch, RecordRepository};
use crate::roster::{self, RosterQuery, SortBy};
use crate::store::{SqlRecord, SqliteRepository};
use rusqlite::Connection;
use serde_json::{json, Value};

const OPS: &[&str] = &[
    "list",
    "get",
    "create",
    "update",
    "delete",
    "listBy",
    "filterOptions",
];

/// How `<collection>.list` and `<collection>.filterOptions` shape a collection.
trait Listing: SqlRecord {
    fn list_view(items: Vec<Self>, params: &Value) -> Result<Vec<Self>, HandlerErr>;

    fn filter_options(_items: &[Self], _field: &str) -> Result<Vec<String>, HandlerErr> {
        Err(HandlerErr::bad_params(format!(
            "{} has no filter options",
            Self::COLLECTION
        )))
    }

    /// Checks that need other collections; `existing` is the id on update.
    fn check_write(
        _conn: &Connection,
        _record: &Self,
        _existing: Option<i64>,
    ) -> Result<(), HandlerErr> {
        Ok(())
    }
}

fn roster_view<E: roster::Filterable + Clone>(
    items: Vec<E>,
    params: &Value,
) -> Result<Vec<E>, HandlerErr> {
    let query: RosterQuery = get_optional_object(params, "filter")?.unwrap_or_default();
    let sort: Option<SortBy> = get_optional_object(params, "sort")?;
    Ok(roster::view(&items, &query, sort.as_ref())?)
}

fn unfiltered<E: Record>(items: Vec<E>, params: &Value) -> Result<Vec<E>, HandlerErr> {
    if params.get("filter").is_some_and(|v| !v.is_null())
        || params.get("sort").is_some_and(|v| !v.is_null())
    {
        return Err(HandlerErr::bad_params(format!(
            "{} cannot be filtered or sorted",
            E::COLLECTION
        )));
    }
    Ok(items)
}

macro_rules! roster_listing {
    ($($ty:ty),+) => {
        $(impl Listing for $ty {
            fn list_view(items: Vec<Self>, params: &Value) -> Result<Vec<Self>, HandlerErr> {
                roster_view(items, params)
            }

            fn filter_options(items: &[Self], field: &str) -> Result<Vec<String>, HandlerErr> {
                Ok(roster::distinct_values(items, field)?)
            }
        })+
    };
}

macro_rules! plain_listing {
    ($($ty:ty),+) => {
        $(impl Listing for $ty {
            fn list_view(items: Vec<Self>, params: &Value) -> Result<Vec<Self>, HandlerErr> {
                unfiltered(items, params)
            }
        })+
    };
}

roster_listing!(Student, Employee, Class);
plain_listing!(Attendance);

impl Listing for Grade {
    fn list_view(items: Vec<Self>, params: &Value) -> Result<Vec<Self>, HandlerErr> {
        unfiltered(items, params)
    }

    /// Score must fit the assignment's points. Dangling assignment ids are stored as is.
    fn check_write(
        conn: &Connection,
        record: &Self,
        _existing: Option<i64>,
    ) -> Result<(), HandlerErr> {
        match SqliteRepository::<Assignment>::new(conn).get_by_id(record.assignment_id) {
            Ok(assignment) => {
                check_score(record.score, assignment.points)?;
                Ok(())
            }
            Err(CoreError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl Listing for Assignment {
    fn list_view(items: Vec<Self>, params: &Value) -> Result<Vec<Self>, HandlerErr> {
        unfiltered(items, params)
    }

    /// Points cannot drop below a score already recorded against the assignment.
    fn check_write(
        conn: &Connection,
        record: &Self,
        existing: Option<i64>,
    ) -> Result<(), HandlerErr> {
        let Some(id) = existing else {
            return Ok(());
        };
        let grades = SqliteRepository::<Grade>::new(conn).get_by_foreign_key("assignmentId", id)?;
        if let Some(top) = grades
            .iter()
            .map(|g| g.score)
            .filter(|score| *score > record.points)
            .reduce(f64::max)
        {
            return Err(CoreError::validation_with(
                "points cannot be lower than a recorded score",
                json!({ "field": "points", "value": record.points, "highestScore": top }),
            )
            .into());
        }
        Ok(())
    }
}

fn run_op<E: Listing>(conn: &Connection, op: &str, params: &Value) -> Result<Value, HandlerErr> {
    let mut repo = SqliteRepository::<E>::new(conn);
    match op {
        "list" => {
            let items = E::list_view(repo.get_all()?, params)?;
            Ok(json!({ "items": items }))
        }
        "get" => {
            let id = get_required_i64(params, "id")?;
            Ok(json!({ "record": repo.get_by_id(id)? }))
        }
        "create" => {
            let record: E = get_object(params, "record")?;
            record.validate()?;
            E::check_write(conn, &record, None)?;
            let created = repo.create(record)?;
            tracing::info!(collection = E::COLLECTION, id = created.id(), "record created");
            Ok(json!({ "record": created }))
        }
        "update" => {
            let id = get_required_i64(params, "id")?;
            let patch: Value = get_object(params, "patch")?;
            let existing = repo.get_by_id(id)?;
            let merged = merge_patch(&existing, &patch)?;
            merged.validate()?;
            E::check_write(conn, &merged, Some(id))?;
            let updated = repo.update(id, merged)?;
            tracing::info!(collection = E::COLLECTION, id, "record updated");
            Ok(json!({ "record": updated }))
        }
        "delete" => {
            let id = get_required_i64(params, "id")?;
            let deleted = repo.delete(id)?;
            tracing::info!(collection = E::COLLECTION, id, "record deleted");
            Ok(json!({ "deleted": deleted }))
        }
        "listBy" => {
            let field = get_required_str(params, "field")?;
            let value = get_required_i64(params, "value")?;
            Ok(json!({ "items": repo.get_by_foreign_key(field, value)? }))
        }
        "filterOptions" => {
            let field = get_required_str(params, "field")?;
            let values = E::filter_options(&repo.get_all()?, field)?;
            Ok(json!({ "values": values }))
        }
        other => Err(HandlerErr {
            code: "not_implemented",
            message: format!("unknown operation: {}", other),
            details: None,
        }),
    }
}

type OpFn = fn(&Connection, &str, &Value) -> Result<Value, HandlerErr>;

fn op_for_collection(collection: &str) -> Option<OpFn> {
    let f: OpFn = match collection {
        Student::COLLECTION => run_op::<Student>,
        Employee::COLLECTION => run_op::<Employee>,
        Class::COLLECTION => run_op::<Class>,
        Assignment::COLLECTION => run_op::<Assignment>,
        Grade::COLLECTION => run_op::<Grade>,
        Attendance::COLLECTION => run_op::<Attendance>,
        _ => return None,
    };
    Some(f)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let (collection, op) = req.method.split_once('.')?;
    if !OPS.contains(&op) {
        return None;
    }
    let run = op_for_collection(collection)?;
    let Some(conn) = state.db.as_ref() else {
        return Some(no_workspace(&req.id));
    };
    Some(respond(&req.id, run(conn, op, &req.params)))
}
