use crate::error::CoreError;
use chrono::NaiveDate;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern"));
static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[\d\s\-()]+$").expect("phone pattern"));

pub const GRADE_LEVELS: &[&str] = &[
    "K", "1", "2", "3", "4", "5", "6", "7", "8", "9", "10", "11", "12",
];

/// An entity held in a named collection with a store-assigned integer id.
pub trait Record: Clone + fmt::Debug + Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Singular label used in not-found messages.
    const ENTITY: &'static str;
    /// Fields accepted by `get_by_foreign_key`.
    const FOREIGN_KEYS: &'static [&'static str];

    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);

    /// Whether this record points at `value` through `field`. Unknown fields never match.
    fn references(&self, field: &str, value: i64) -> bool;

    fn validate(&self) -> Result<(), CoreError> {
        Ok(())
    }
}

macro_rules! token_enum {
    ($name:ident, $what:literal, { $($variant:ident => $token:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $token)] $variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $token),+
                }
            }
        }

        impl FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().as_str() {
                    $($token => Ok($name::$variant),)+
                    other => Err(CoreError::validation_with(
                        format!(
                            "{} must be one of: {}",
                            $what,
                            Self::ALL
                                .iter()
                                .map(|v| v.as_str())
                                .collect::<Vec<_>>()
                                .join(", ")
                        ),
                        serde_json::json!({ "value": other }),
                    )),
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

token_enum!(StudentStatus, "student status", {
    Active => "active",
    Inactive => "inactive",
});

token_enum!(EmployeeStatus, "employee status", {
    Active => "active",
    Inactive => "inactive",
    OnLeave => "on_leave",
});

token_enum!(AttendanceStatus, "status", {
    Present => "present",
    Absent => "absent",
    Tardy => "tardy",
});

token_enum!(AssignmentCategory, "category", {
    Homework => "homework",
    Quiz => "quiz",
    Test => "test",
    Exam => "exam",
    Project => "project",
    Lab => "lab",
    Essay => "essay",
    Presentation => "presentation",
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    #[serde(default)]
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub grade_level: String,
    pub date_of_birth: NaiveDate,
    pub enrollment_date: NaiveDate,
    pub status: StudentStatus,
}

impl Student {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub email: String,
    pub department: String,
    pub position: String,
    pub phone: String,
    pub hire_date: NaiveDate,
    pub status: EmployeeStatus,
    pub employee_code: String,
    #[serde(default)]
    pub subjects: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Class {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub subject: String,
    pub period: String,
    pub room: String,
    #[serde(default)]
    pub student_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    #[serde(default)]
    pub id: i64,
    pub name: String,
    pub category: AssignmentCategory,
    pub points: f64,
    pub due_date: NaiveDate,
    pub weight: f64,
    pub class_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Grade {
    #[serde(default)]
    pub id: i64,
    pub student_id: i64,
    pub assignment_id: i64,
    pub score: f64,
    #[serde(default)]
    pub submitted_date: Option<NaiveDate>,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    #[serde(default)]
    pub id: i64,
    pub student_id: i64,
    pub class_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    #[serde(default)]
    pub notes: String,
}

fn require_text(field: &str, value: &str) -> Result<(), CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::validation_with(
            format!("{} is required", field),
            serde_json::json!({ "field": field }),
        ));
    }
    Ok(())
}

fn require_email(value: &str) -> Result<(), CoreError> {
    require_text("email", value)?;
    if !EMAIL_RE.is_match(value.trim()) {
        return Err(CoreError::validation_with(
            "please enter a valid email address",
            serde_json::json!({ "field": "email", "value": value }),
        ));
    }
    Ok(())
}

impl Record for Student {
    const COLLECTION: &'static str = "students";
    const ENTITY: &'static str = "student";
    const FOREIGN_KEYS: &'static [&'static str] = &[];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, _field: &str, _value: i64) -> bool {
        false
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text("firstName", &self.first_name)?;
        require_text("lastName", &self.last_name)?;
        require_email(&self.email)?;
        if !GRADE_LEVELS.contains(&self.grade_level.trim()) {
            return Err(CoreError::validation_with(
                "grade level must be K or 1 through 12",
                serde_json::json!({ "field": "gradeLevel", "value": self.grade_level }),
            ));
        }
        Ok(())
    }
}

impl Record for Employee {
    const COLLECTION: &'static str = "employees";
    const ENTITY: &'static str = "employee";
    const FOREIGN_KEYS: &'static [&'static str] = &[];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, _field: &str, _value: i64) -> bool {
        false
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text("name", &self.name)?;
        require_email(&self.email)?;
        require_text("phone", &self.phone)?;
        if !PHONE_RE.is_match(self.phone.trim()) {
            return Err(CoreError::validation_with(
                "please enter a valid phone number",
                serde_json::json!({ "field": "phone", "value": self.phone }),
            ));
        }
        require_text("department", &self.department)?;
        require_text("position", &self.position)?;
        require_text("employeeCode", &self.employee_code)?;
        Ok(())
    }
}

impl Record for Class {
    const COLLECTION: &'static str = "classes";
    const ENTITY: &'static str = "class";
    const FOREIGN_KEYS: &'static [&'static str] = &["studentIds"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, field: &str, value: i64) -> bool {
        match field {
            "studentIds" => self.student_ids.contains(&value),
            _ => false,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text("name", &self.name)?;
        require_text("subject", &self.subject)?;
        require_text("period", &self.period)?;
        require_text("room", &self.room)?;
        Ok(())
    }
}

impl Record for Assignment {
    const COLLECTION: &'static str = "assignments";
    const ENTITY: &'static str = "assignment";
    const FOREIGN_KEYS: &'static [&'static str] = &["classId"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, field: &str, value: i64) -> bool {
        match field {
            "classId" => self.class_id == value,
            _ => false,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        require_text("name", &self.name)?;
        if !self.points.is_finite() || self.points <= 0.0 {
            return Err(CoreError::validation_with(
                "points must be greater than 0",
                serde_json::json!({ "field": "points", "value": self.points }),
            ));
        }
        if !self.weight.is_finite() || self.weight <= 0.0 || self.weight > 1.0 {
            return Err(CoreError::validation_with(
                "weight must be between 0 and 1",
                serde_json::json!({ "field": "weight", "value": self.weight }),
            ));
        }
        Ok(())
    }
}

impl Record for Grade {
    const COLLECTION: &'static str = "grades";
    const ENTITY: &'static str = "grade";
    const FOREIGN_KEYS: &'static [&'static str] = &["studentId", "assignmentId"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, field: &str, value: i64) -> bool {
        match field {
            "studentId" => self.student_id == value,
            "assignmentId" => self.assignment_id == value,
            _ => false,
        }
    }

    fn validate(&self) -> Result<(), CoreError> {
        if !self.score.is_finite() || self.score < 0.0 {
            return Err(CoreError::validation_with(
                "score must be a non-negative number",
                serde_json::json!({ "field": "score", "value": self.score }),
            ));
        }
        Ok(())
    }
}

impl Record for Attendance {
    const COLLECTION: &'static str = "attendance";
    const ENTITY: &'static str = "attendance record";
    const FOREIGN_KEYS: &'static [&'static str] = &["studentId", "classId"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn references(&self, field: &str, value: i64) -> bool {
        match field {
            "studentId" => self.student_id == value,
            "classId" => self.class_id == value,
            _ => false,
        }
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, CoreError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| {
        CoreError::validation_with(
            "date must be YYYY-MM-DD",
            serde_json::json!({ "value": raw }),
        )
    })
}
