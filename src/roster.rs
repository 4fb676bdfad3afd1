use crate::error::CoreError;
use crate::model::{Class, Employee, Student, GRADE_LEVELS};
use chrono::NaiveDate;
use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SortKey {
    Text(String),
    Date(NaiveDate),
    /// Position in a fixed ordering such as K..12.
    Rank(usize),
}

impl SortKey {
    fn text(s: &str) -> Self {
        SortKey::Text(s.to_lowercase())
    }

    /// Unknown levels rank after 12.
    fn grade_level(level: &str) -> Self {
        let level = level.trim();
        SortKey::Rank(
            GRADE_LEVELS
                .iter()
                .position(|g| g.eq_ignore_ascii_case(level))
                .unwrap_or(GRADE_LEVELS.len()),
        )
    }

    fn compare(&self, other: &SortKey) -> Ordering {
        match (self, other) {
            (SortKey::Text(a), SortKey::Text(b)) => a.cmp(b),
            (SortKey::Date(a), SortKey::Date(b)) => a.cmp(b),
            (SortKey::Rank(a), SortKey::Rank(b)) => a.cmp(b),
            _ => Ordering::Equal,
        }
    }
}

/// A flat entity that can be searched, narrowed by categorical fields and sorted.
pub trait Filterable {
    /// Categorical fields accepted as exact-equality constraints.
    const FILTER_FIELDS: &'static [&'static str];
    const SORT_FIELDS: &'static [&'static str];
    const DEFAULT_SORT: &'static str;

    /// Texts the free-text search term is matched against.
    fn search_texts(&self) -> Vec<String>;

    fn field_value(&self, field: &str) -> Option<String>;

    fn sort_key(&self, field: &str) -> Option<SortKey>;
}

impl Filterable for Student {
    const FILTER_FIELDS: &'static [&'static str] = &["gradeLevel", "status"];
    const SORT_FIELDS: &'static [&'static str] = &[
        "firstName",
        "lastName",
        "email",
        "gradeLevel",
        "dateOfBirth",
        "enrollmentDate",
        "status",
    ];
    const DEFAULT_SORT: &'static str = "lastName";

    fn search_texts(&self) -> Vec<String> {
        vec![self.display_name(), self.email.clone()]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "gradeLevel" => Some(self.grade_level.clone()),
            "status" => Some(self.status.as_str().to_string()),
            _ => None,
        }
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        Some(match field {
            "firstName" => SortKey::text(&self.first_name),
            "lastName" => SortKey::text(&self.last_name),
            "email" => SortKey::text(&self.email),
            "gradeLevel" => SortKey::grade_level(&self.grade_level),
            "dateOfBirth" => SortKey::Date(self.date_of_birth),
            "enrollmentDate" => SortKey::Date(self.enrollment_date),
            "status" => SortKey::text(self.status.as_str()),
            _ => return None,
        })
    }
}

impl Filterable for Employee {
    const FILTER_FIELDS: &'static [&'static str] = &["department", "status"];
    const SORT_FIELDS: &'static [&'static str] = &[
        "name",
        "email",
        "department",
        "position",
        "hireDate",
        "status",
        "employeeCode",
    ];
    const DEFAULT_SORT: &'static str = "name";

    fn search_texts(&self) -> Vec<String> {
        vec![
            self.name.clone(),
            self.email.clone(),
            self.department.clone(),
        ]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "department" => Some(self.department.clone()),
            "status" => Some(self.status.as_str().to_string()),
            _ => None,
        }
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        Some(match field {
            "name" => SortKey::text(&self.name),
            "email" => SortKey::text(&self.email),
            "department" => SortKey::text(&self.department),
            "position" => SortKey::text(&self.position),
            "hireDate" => SortKey::Date(self.hire_date),
            "status" => SortKey::text(self.status.as_str()),
            "employeeCode" => SortKey::text(&self.employee_code),
            _ => return None,
        })
    }
}

impl Filterable for Class {
    const FILTER_FIELDS: &'static [&'static str] = &["subject", "period"];
    const SORT_FIELDS: &'static [&'static str] = &["name", "subject", "period", "room"];
    const DEFAULT_SORT: &'static str = "name";

    fn search_texts(&self) -> Vec<String> {
        vec![self.name.clone(), self.subject.clone()]
    }

    fn field_value(&self, field: &str) -> Option<String> {
        match field {
            "subject" => Some(self.subject.clone()),
            "period" => Some(self.period.clone()),
            _ => None,
        }
    }

    fn sort_key(&self, field: &str) -> Option<SortKey> {
        Some(match field {
            "name" => SortKey::text(&self.name),
            "subject" => SortKey::text(&self.subject),
            "period" => SortKey::text(&self.period),
            "room" => SortKey::text(&self.room),
            _ => return None,
        })
    }
}

/// Conjunction of a free-text term and exact-equality constraints.
/// Blank values match everything.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RosterQuery {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(flatten)]
    pub equals: BTreeMap<String, String>,
}

impl RosterQuery {
    pub fn is_empty(&self) -> bool {
        self.search.as_deref().map_or(true, |s| s.trim().is_empty())
            && self.equals.values().all(|v| v.trim().is_empty())
    }

    fn check_fields<E: Filterable>(&self) -> Result<(), CoreError> {
        for field in self.equals.keys() {
            if !E::FILTER_FIELDS.contains(&field.as_str()) {
                return Err(CoreError::validation_with(
                    format!("cannot filter by {}", field),
                    serde_json::json!({ "field": field, "supported": E::FILTER_FIELDS }),
                ));
            }
        }
        Ok(())
    }

    fn matches<E: Filterable>(&self, item: &E) -> bool {
        if let Some(term) = self.search.as_deref().map(str::trim) {
            if !term.is_empty() {
                let needle = term.to_lowercase();
                if !item
                    .search_texts()
                    .iter()
                    .any(|t| t.to_lowercase().contains(&needle))
                {
                    return false;
                }
            }
        }
        self.equals.iter().all(|(field, want)| {
            let want = want.trim();
            want.is_empty() || item.field_value(field).as_deref() == Some(want)
        })
    }
}

/// Items matching `query`, in input order. The input is not touched.
pub fn filter<E: Filterable + Clone>(items: &[E], query: &RosterQuery) -> Result<Vec<E>, CoreError> {
    query.check_fields::<E>()?;
    if query.is_empty() {
        return Ok(items.to_vec());
    }
    Ok(items.iter().filter(|i| query.matches(*i)).cloned().collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SortBy {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

/// Stable in-place sort; equal keys keep their relative order in both directions.
pub fn sort<E: Filterable>(
    items: &mut [E],
    field: &str,
    direction: SortDirection,
) -> Result<(), CoreError> {
    if !E::SORT_FIELDS.contains(&field) {
        return Err(CoreError::validation_with(
            format!("cannot sort by {}", field),
            serde_json::json!({ "field": field, "supported": E::SORT_FIELDS }),
        ));
    }
    items.sort_by(|a, b| {
        let ord = match (a.sort_key(field), b.sort_key(field)) {
            (Some(x), Some(y)) => x.compare(&y),
            _ => Ordering::Equal,
        };
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
    Ok(())
}

/// Filters, then sorts by `sort` or the entity's default field.
pub fn view<E: Filterable + Clone>(
    items: &[E],
    query: &RosterQuery,
    order: Option<&SortBy>,
) -> Result<Vec<E>, CoreError> {
    let mut out = filter(items, query)?;
    match order {
        Some(s) => sort(&mut out, &s.field, s.direction)?,
        None => sort(&mut out, E::DEFAULT_SORT, SortDirection::Asc)?,
    }
    Ok(out)
}

/// Sorted distinct values of a categorical field, for building filter options.
pub fn distinct_values<E: Filterable>(items: &[E], field: &str) -> Result<Vec<String>, CoreError> {
    if !E::FILTER_FIELDS.contains(&field) {
        return Err(CoreError::validation_with(
            format!("cannot list values of {}", field),
            serde_json::json!({ "field": field, "supported": E::FILTER_FIELDS }),
        ));
    }
    let set: BTreeSet<String> = items
        .iter()
        .filter_map(|i| i.field_value(field))
        .filter(|v| !v.trim().is_empty())
        .collect();
    Ok(set.into_iter().collect())
}
