use crate::dashboard::Snapshot;
use crate::error::CoreError;
use crate::model::{
    Assignment, Attendance, Class, Employee, Grade, Record, Student, DATE_FORMAT,
};
use crate::repo::{check_foreign_key, RecordRepository};
use chrono::NaiveDate;
use rusqlite::types::{Type, Value};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row};
use std::marker::PhantomData;
use std::str::FromStr;

/// Column mapping for a record stored in its own SQLite table.
pub trait SqlRecord: Record {
    const TABLE: &'static str;
    /// Data columns in bind order; `id` is implicit and always selected first.
    const COLUMNS: &'static [&'static str];

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    fn to_values(&self) -> Result<Vec<Value>, CoreError>;

    /// Indexed column for a foreign key field, when one exists.
    fn fk_column(_field: &str) -> Option<&'static str> {
        None
    }
}

pub struct SqliteRepository<'a, E> {
    conn: &'a Connection,
    _marker: PhantomData<E>,
}

impl<'a, E: SqlRecord> SqliteRepository<'a, E> {
    pub fn new(conn: &'a Connection) -> Self {
        Self {
            conn,
            _marker: PhantomData,
        }
    }

    fn select_sql(where_clause: &str) -> String {
        format!(
            "SELECT id, {} FROM {} {} ORDER BY id",
            E::COLUMNS.join(", "),
            E::TABLE,
            where_clause
        )
    }

    fn not_found(id: i64) -> CoreError {
        CoreError::NotFound {
            entity: E::ENTITY,
            id,
        }
    }
}

impl<'a, E: SqlRecord> RecordRepository<E> for SqliteRepository<'a, E> {
    fn get_all(&self) -> Result<Vec<E>, CoreError> {
        let mut stmt = self.conn.prepare(&Self::select_sql(""))?;
        let rows = stmt
            .query_map([], |r| E::from_row(r))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn get_by_id(&self, id: i64) -> Result<E, CoreError> {
        self.conn
            .query_row(&Self::select_sql("WHERE id = ?"), [id], |r| E::from_row(r))
            .optional()?
            .ok_or_else(|| Self::not_found(id))
    }

    fn get_by_foreign_key(&self, field: &str, value: i64) -> Result<Vec<E>, CoreError> {
        check_foreign_key::<E>(field)?;
        let Some(column) = E::fk_column(field) else {
            return Ok(self
                .get_all()?
                .into_iter()
                .filter(|r| r.references(field, value))
                .collect());
        };
        let sql = Self::select_sql(&format!("WHERE {} = ?", column));
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map([value], |r| E::from_row(r))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn create(&mut self, record: E) -> Result<E, CoreError> {
        let placeholders = std::iter::repeat_n("?", E::COLUMNS.len())
            .collect::<Vec<_>>()
            .join(",");
        let sql = format!(
            "INSERT INTO {}({}) VALUES({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders
        );
        self.conn
            .execute(&sql, params_from_iter(record.to_values()?))?;
        let id = self.conn.last_insert_rowid();
        self.get_by_id(id)
    }

    fn update(&mut self, id: i64, record: E) -> Result<E, CoreError> {
        let assignments = E::COLUMNS
            .iter()
            .map(|c| format!("{} = ?", c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!("UPDATE {} SET {} WHERE id = ?", E::TABLE, assignments);
        let mut bind = record.to_values()?;
        bind.push(Value::Integer(id));
        let changed = self.conn.execute(&sql, params_from_iter(bind))?;
        if changed == 0 {
            return Err(Self::not_found(id));
        }
        self.get_by_id(id)
    }

    fn delete(&mut self, id: i64) -> Result<bool, CoreError> {
        let sql = format!("DELETE FROM {} WHERE id = ?", E::TABLE);
        let changed = self.conn.execute(&sql, [id])?;
        if changed == 0 {
            return Err(Self::not_found(id));
        }
        Ok(true)
    }
}

fn conversion_err(idx: usize, e: impl std::error::Error + Send + Sync + 'static) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<NaiveDate> {
    let raw: String = row.get(idx)?;
    NaiveDate::parse_from_str(&raw, DATE_FORMAT).map_err(|e| conversion_err(idx, e))
}

fn opt_date_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<NaiveDate>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).map_err(|e| conversion_err(idx, e)))
        .transpose()
}

fn token_at<T: FromStr<Err = CoreError>>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    raw.parse::<T>().map_err(|e| conversion_err(idx, e))
}

fn json_at<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
    let raw: String = row.get(idx)?;
    serde_json::from_str(&raw).map_err(|e| conversion_err(idx, e))
}

fn date_value(d: NaiveDate) -> Value {
    Value::Text(d.format(DATE_FORMAT).to_string())
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn json_value<T: serde::Serialize>(v: &T) -> Result<Value, CoreError> {
    serde_json::to_string(v)
        .map(Value::Text)
        .map_err(|e| CoreError::Repository(format!("failed to encode column: {}", e)))
}

impl SqlRecord for Student {
    const TABLE: &'static str = "students";
    const COLUMNS: &'static [&'static str] = &[
        "first_name",
        "last_name",
        "email",
        "grade_level",
        "date_of_birth",
        "enrollment_date",
        "status",
    ];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Student {
            id: r.get(0)?,
            first_name: r.get(1)?,
            last_name: r.get(2)?,
            email: r.get(3)?,
            grade_level: r.get(4)?,
            date_of_birth: date_at(r, 5)?,
            enrollment_date: date_at(r, 6)?,
            status: token_at(r, 7)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            text(&self.first_name),
            text(&self.last_name),
            text(&self.email),
            text(&self.grade_level),
            date_value(self.date_of_birth),
            date_value(self.enrollment_date),
            text(self.status.as_str()),
        ])
    }
}

impl SqlRecord for Employee {
    const TABLE: &'static str = "employees";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "email",
        "department",
        "position",
        "phone",
        "hire_date",
        "status",
        "employee_code",
        "subjects",
    ];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Employee {
            id: r.get(0)?,
            name: r.get(1)?,
            email: r.get(2)?,
            department: r.get(3)?,
            position: r.get(4)?,
            phone: r.get(5)?,
            hire_date: date_at(r, 6)?,
            status: token_at(r, 7)?,
            employee_code: r.get(8)?,
            subjects: json_at(r, 9)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            text(&self.name),
            text(&self.email),
            text(&self.department),
            text(&self.position),
            text(&self.phone),
            date_value(self.hire_date),
            text(self.status.as_str()),
            text(&self.employee_code),
            json_value(&self.subjects)?,
        ])
    }
}

impl SqlRecord for Class {
    const TABLE: &'static str = "classes";
    const COLUMNS: &'static [&'static str] = &["name", "subject", "period", "room", "student_ids"];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Class {
            id: r.get(0)?,
            name: r.get(1)?,
            subject: r.get(2)?,
            period: r.get(3)?,
            room: r.get(4)?,
            student_ids: json_at(r, 5)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            text(&self.name),
            text(&self.subject),
            text(&self.period),
            text(&self.room),
            json_value(&self.student_ids)?,
        ])
    }
}

impl SqlRecord for Assignment {
    const TABLE: &'static str = "assignments";
    const COLUMNS: &'static [&'static str] = &[
        "name",
        "category",
        "points",
        "due_date",
        "weight",
        "class_id",
    ];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Assignment {
            id: r.get(0)?,
            name: r.get(1)?,
            category: token_at(r, 2)?,
            points: r.get(3)?,
            due_date: date_at(r, 4)?,
            weight: r.get(5)?,
            class_id: r.get(6)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            text(&self.name),
            text(self.category.as_str()),
            Value::Real(self.points),
            date_value(self.due_date),
            Value::Real(self.weight),
            Value::Integer(self.class_id),
        ])
    }

    fn fk_column(field: &str) -> Option<&'static str> {
        match field {
            "classId" => Some("class_id"),
            _ => None,
        }
    }
}

impl SqlRecord for Grade {
    const TABLE: &'static str = "grades";
    const COLUMNS: &'static [&'static str] = &[
        "student_id",
        "assignment_id",
        "score",
        "submitted_date",
        "notes",
    ];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Grade {
            id: r.get(0)?,
            student_id: r.get(1)?,
            assignment_id: r.get(2)?,
            score: r.get(3)?,
            submitted_date: opt_date_at(r, 4)?,
            notes: r.get(5)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            Value::Integer(self.student_id),
            Value::Integer(self.assignment_id),
            Value::Real(self.score),
            self.submitted_date.map(date_value).unwrap_or(Value::Null),
            text(&self.notes),
        ])
    }

    fn fk_column(field: &str) -> Option<&'static str> {
        match field {
            "studentId" => Some("student_id"),
            "assignmentId" => Some("assignment_id"),
            _ => None,
        }
    }
}

impl SqlRecord for Attendance {
    const TABLE: &'static str = "attendance";
    const COLUMNS: &'static [&'static str] = &["student_id", "class_id", "date", "status", "notes"];

    fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Attendance {
            id: r.get(0)?,
            student_id: r.get(1)?,
            class_id: r.get(2)?,
            date: date_at(r, 3)?,
            status: token_at(r, 4)?,
            notes: r.get(5)?,
        })
    }

    fn to_values(&self) -> Result<Vec<Value>, CoreError> {
        Ok(vec![
            Value::Integer(self.student_id),
            Value::Integer(self.class_id),
            date_value(self.date),
            text(self.status.as_str()),
            text(&self.notes),
        ])
    }

    fn fk_column(field: &str) -> Option<&'static str> {
        match field {
            "studentId" => Some("student_id"),
            "classId" => Some("class_id"),
            _ => None,
        }
    }
}

/// Every collection read in one pass, for the dashboard.
pub fn load_snapshot(conn: &Connection) -> Result<Snapshot, CoreError> {
    Ok(Snapshot {
        students: SqliteRepository::<Student>::new(conn).get_all()?,
        employees: SqliteRepository::<Employee>::new(conn).get_all()?,
        classes: SqliteRepository::<Class>::new(conn).get_all()?,
        assignments: SqliteRepository::<Assignment>::new(conn).get_all()?,
        grades: SqliteRepository::<Grade>::new(conn).get_all()?,
        attendance: SqliteRepository::<Attendance>::new(conn).get_all()?,
    })
}

/// The class and those of its enrolled students that still exist, in id order.
pub fn load_class_roster(conn: &Connection, class_id: i64) -> Result<(Class, Vec<Student>), CoreError> {
    let class = SqliteRepository::<Class>::new(conn).get_by_id(class_id)?;
    let roster = SqliteRepository::<Student>::new(conn)
        .get_all()?
        .into_iter()
        .filter(|s| class.student_ids.contains(&s.id))
        .collect();
    Ok((class, roster))
}
