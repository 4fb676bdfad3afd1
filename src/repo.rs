use crate::error::CoreError;
use crate::model::Record;
#[cfg(test)]
use std::collections::BTreeMap;

/// CRUD over one named collection. One instance per entity type.
pub trait RecordRepository<E: Record> {
    fn get_all(&self) -> Result<Vec<E>, CoreError>;

    fn get_by_id(&self, id: i64) -> Result<E, CoreError>;

    /// Records whose `field` points at `value`. `field` must be one of `E::FOREIGN_KEYS`.
    fn get_by_foreign_key(&self, field: &str, value: i64) -> Result<Vec<E>, CoreError> {
        check_foreign_key::<E>(field)?;
        Ok(self
            .get_all()?
            .into_iter()
            .filter(|r| r.references(field, value))
            .collect())
    }

    /// Persists `record` under a fresh id; the incoming id is ignored.
    fn create(&mut self, record: E) -> Result<E, CoreError>;

    /// Replaces every field of record `id`.
    fn update(&mut self, id: i64, record: E) -> Result<E, CoreError>;

    fn delete(&mut self, id: i64) -> Result<bool, CoreError>;
}

pub fn check_foreign_key<E: Record>(field: &str) -> Result<(), CoreError> {
    if E::FOREIGN_KEYS.contains(&field) {
        return Ok(());
    }
    Err(CoreError::validation_with(
        format!("{} cannot be queried by {}", E::COLLECTION, field),
        serde_json::json!({ "field": field, "supported": E::FOREIGN_KEYS }),
    ))
}

/// Overlays the keys of `patch` onto `existing`. The id is never patched.
pub fn merge_patch<E: Record>(existing: &E, patch: &serde_json::Value) -> Result<E, CoreError> {
    let Some(fields) = patch.as_object() else {
        return Err(CoreError::validation("patch must be an object"));
    };
    let mut merged = serde_json::to_value(existing)?;
    let Some(target) = merged.as_object_mut() else {
        return Err(CoreError::Repository(format!(
            "{} did not serialize to an object",
            E::ENTITY
        )));
    };
    for (k, v) in fields {
        if k == "id" {
            continue;
        }
        target.insert(k.clone(), v.clone());
    }
    let mut out: E = serde_json::from_value(merged)?;
    out.set_id(existing.id());
    Ok(out)
}

/// Arena-backed repository. Ids are assigned from a monotonically increasing counter.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct MemoryRepository<E: Record> {
    rows: BTreeMap<i64, E>,
    next_id: i64,
}

#[cfg(test)]
impl<E: Record> Default for MemoryRepository<E> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            next_id: 1,
        }
    }
}

#[cfg(test)]
impl<E: Record> MemoryRepository<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the arena with records that already carry ids.
    pub fn with_records(records: impl IntoIterator<Item = E>) -> Self {
        let mut repo = Self::default();
        for r in records {
            repo.next_id = repo.next_id.max(r.id() + 1);
            repo.rows.insert(r.id(), r);
        }
        repo
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
impl<E: Record> RecordRepository<E> for MemoryRepository<E> {
    fn get_all(&self) -> Result<Vec<E>, CoreError> {
        Ok(self.rows.values().cloned().collect())
    }

    fn get_by_id(&self, id: i64) -> Result<E, CoreError> {
        self.rows.get(&id).cloned().ok_or(CoreError::NotFound {
            entity: E::ENTITY,
            id,
        })
    }

    fn create(&mut self, mut record: E) -> Result<E, CoreError> {
        let id = self.next_id;
        self.next_id += 1;
        record.set_id(id);
        self.rows.insert(id, record.clone());
        Ok(record)
    }

    fn update(&mut self, id: i64, mut record: E) -> Result<E, CoreError> {
        let Some(slot) = self.rows.get_mut(&id) else {
            return Err(CoreError::NotFound {
                entity: E::ENTITY,
                id,
            });
        };
        record.set_id(id);
        *slot = record.clone();
        Ok(record)
    }

    fn delete(&mut self, id: i64) -> Result<bool, CoreError> {
        match self.rows.remove(&id) {
            Some(_) => Ok(true),
            None => Err(CoreError::NotFound {
                entity: E::ENTITY,
                id,
            }),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Class, Grade};

    fn grade(student_id: i64, assignment_id: i64, score: f64) -> Grade {
        Grade {
            id: 0,
            student_id,
            assignment_id,
            score,
            submitted_date: None,
            notes: String::new(),
        }
    }

    #[test]
    fn create_assigns_increasing_ids_and_delete_reports_missing() {
        let mut repo = MemoryRepository::<Grade>::new();
        let a = repo.create(grade(1, 1, 5.0)).expect("create");
        let b = repo.create(grade(1, 2, 6.0)).expect("create");
        assert_eq!((a.id, b.id), (1, 2));

        assert!(repo.delete(1).expect("delete"));
        let e = repo.delete(1).unwrap_err();
        assert!(matches!(e, CoreError::NotFound { id: 1, .. }));
        // Ids are not reused after deletion.
        assert_eq!(repo.create(grade(2, 1, 1.0)).expect("create").id, 3);
    }

    #[test]
    fn update_missing_id_is_not_found() {
        let mut repo = MemoryRepository::<Grade>::new();
        let e = repo.update(42, grade(1, 1, 1.0)).unwrap_err();
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn foreign_key_lookup_filters_and_rejects_unknown_fields() {
        let mut repo = MemoryRepository::<Grade>::new();
        repo.create(grade(1, 10, 5.0)).expect("create");
        repo.create(grade(2, 10, 6.0)).expect("create");
        repo.create(grade(1, 11, 7.0)).expect("create");

        let by_student = repo.get_by_foreign_key("studentId", 1).expect("query");
        assert_eq!(by_student.len(), 2);
        let by_assignment = repo.get_by_foreign_key("assignmentId", 10).expect("query");
        assert_eq!(by_assignment.len(), 2);

        let e = repo.get_by_foreign_key("classId", 1).unwrap_err();
        assert_eq!(e.code(), "bad_params");
    }

    #[test]
    fn class_membership_is_queryable_by_student() {
        let mut repo = MemoryRepository::<Class>::new();
        repo.create(Class {
            id: 0,
            name: "Algebra".into(),
            subject: "Math".into(),
            period: "1".into(),
            room: "101".into(),
            student_ids: vec![1, 2],
        })
        .expect("create");
        assert_eq!(repo.get_by_foreign_key("studentIds", 2).expect("q").len(), 1);
        assert!(repo.get_by_foreign_key("studentIds", 3).expect("q").is_empty());
    }

    #[test]
    fn merge_patch_keeps_unpatched_fields_and_id() {
        let existing = Grade {
            id: 7,
            ..grade(1, 2, 3.0)
        };
        let merged = merge_patch(
            &existing,
            &serde_json::json!({ "score": 9.5, "id": 99, "notes": "late" }),
        )
        .expect("merge");
        assert_eq!(merged.id, 7);
        assert_eq!(merged.score, 9.5);
        assert_eq!(merged.notes, "late");
        assert_eq!(merged.assignment_id, 2);
    }
}
