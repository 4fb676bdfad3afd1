use crate::error::CoreError;
use crate::model::{Assignment, Grade, Student};
use crate::repo::RecordRepository;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;

/// One-decimal rounding used for displayed percentages:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GradeBand {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl GradeBand {
    pub fn for_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            GradeBand::Excellent
        } else if percent >= 80.0 {
            GradeBand::Good
        } else if percent >= 70.0 {
            GradeBand::Fair
        } else {
            GradeBand::Poor
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeCell {
    pub assignment_id: i64,
    pub grade_id: Option<i64>,
    /// `None` is ungraded, which is distinct from a recorded 0.
    pub score: Option<f64>,
    pub points: f64,
    pub band: Option<GradeBand>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeRow {
    pub student_id: i64,
    pub display_name: String,
    pub cells: Vec<GradeCell>,
    pub average: f64,
    pub weighted_average: f64,
    pub band: GradeBand,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentColumn {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub points: f64,
    pub weight: f64,
    pub due_date: NaiveDate,
}

/// Student × assignment score grid for one class.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeMatrix {
    pub assignments: Vec<AssignmentColumn>,
    pub rows: Vec<GradeRow>,
    pub total_points: f64,
}

/// Percentage of `total_points` earned. Ungraded entries count as 0 earned while
/// their points still sit in `total_points`.
pub fn percent_of_total<I>(scores: I, total_points: f64) -> f64
where
    I: IntoIterator<Item = Option<f64>>,
{
    if total_points <= 0.0 {
        return 0.0;
    }
    let earned: f64 = scores.into_iter().map(|s| s.unwrap_or(0.0)).sum();
    round_off_1_decimal(earned / total_points * 100.0)
}

/// Weight-scaled percentage over `(score, points, weight)` triples.
/// Entries with non-positive points or weight are skipped.
pub fn weighted_percent<I>(entries: I) -> f64
where
    I: IntoIterator<Item = (Option<f64>, f64, f64)>,
{
    let mut weight_sum = 0.0;
    let mut acc = 0.0;
    for (score, points, weight) in entries {
        if points <= 0.0 || weight <= 0.0 {
            continue;
        }
        weight_sum += weight;
        acc += weight * (score.unwrap_or(0.0) / points);
    }
    if weight_sum <= 0.0 {
        return 0.0;
    }
    round_off_1_decimal(acc / weight_sum * 100.0)
}

impl GradeMatrix {
    pub fn build(students: &[Student], assignments: &[Assignment], grades: &[Grade]) -> Self {
        // First record wins if the store ever holds a duplicate cell.
        let mut by_cell: HashMap<(i64, i64), &Grade> = HashMap::new();
        for g in grades {
            by_cell.entry((g.student_id, g.assignment_id)).or_insert(g);
        }

        let total_points: f64 = assignments.iter().map(|a| a.points).sum();

        let rows = students
            .iter()
            .map(|s| {
                let cells: Vec<GradeCell> = assignments
                    .iter()
                    .map(|a| {
                        let hit = by_cell.get(&(s.id, a.id));
                        let score = hit.map(|g| g.score);
                        GradeCell {
                            assignment_id: a.id,
                            grade_id: hit.map(|g| g.id),
                            score,
                            points: a.points,
                            band: score
                                .filter(|_| a.points > 0.0)
                                .map(|v| GradeBand::for_percent(v / a.points * 100.0)),
                        }
                    })
                    .collect();
                let average = percent_of_total(cells.iter().map(|c| c.score), total_points);
                let weighted_average = weighted_percent(
                    cells
                        .iter()
                        .zip(assignments)
                        .map(|(c, a)| (c.score, a.points, a.weight)),
                );
                GradeRow {
                    student_id: s.id,
                    display_name: s.display_name(),
                    cells,
                    average,
                    weighted_average,
                    band: GradeBand::for_percent(average),
                }
            })
            .collect();

        GradeMatrix {
            assignments: assignments
                .iter()
                .map(|a| AssignmentColumn {
                    id: a.id,
                    name: a.name.clone(),
                    category: a.category.as_str().to_string(),
                    points: a.points,
                    weight: a.weight,
                    due_date: a.due_date,
                })
                .collect(),
            rows,
            total_points,
        }
    }

    pub fn row(&self, student_id: i64) -> Option<&GradeRow> {
        self.rows.iter().find(|r| r.student_id == student_id)
    }

    pub fn score(&self, student_id: i64, assignment_id: i64) -> Option<f64> {
        self.row(student_id)?
            .cells
            .iter()
            .find(|c| c.assignment_id == assignment_id)?
            .score
    }

    /// Unweighted class average for one student, 0.0 for students outside the roster.
    pub fn compute_average(&self, student_id: i64) -> f64 {
        self.row(student_id).map(|r| r.average).unwrap_or(0.0)
    }

    pub fn weighted_average(&self, student_id: i64) -> f64 {
        self.row(student_id).map(|r| r.weighted_average).unwrap_or(0.0)
    }

    fn column(&self, assignment_id: i64) -> Option<&AssignmentColumn> {
        self.assignments.iter().find(|a| a.id == assignment_id)
    }

    /// Validates `raw` against the assignment's points and upserts the grade cell.
    pub fn set_score<R>(
        &self,
        repo: &mut R,
        student_id: i64,
        assignment_id: i64,
        raw: &str,
        today: NaiveDate,
    ) -> Result<Grade, CoreError>
    where
        R: RecordRepository<Grade> + ?Sized,
    {
        let Some(column) = self.column(assignment_id) else {
            return Err(CoreError::NotFound {
                entity: "assignment",
                id: assignment_id,
            });
        };
        let score = parse_score(raw, column.points)?;
        upsert_grade(repo, student_id, assignment_id, score, today)
    }
}

pub fn parse_score(raw: &str, points: f64) -> Result<f64, CoreError> {
    let out_of_range = || {
        CoreError::validation_with(
            format!("score must be between 0 and {}", points),
            json!({ "value": raw, "points": points }),
        )
    };
    let score = raw.trim().parse::<f64>().map_err(|_| out_of_range())?;
    check_score(score, points).map_err(|_| out_of_range())
}

/// Accepts a score in `0..=points`.
pub fn check_score(score: f64, points: f64) -> Result<f64, CoreError> {
    if !score.is_finite() || score < 0.0 || score > points {
        return Err(CoreError::validation_with(
            format!("score must be between 0 and {}", points),
            json!({ "field": "score", "value": score, "points": points }),
        ));
    }
    Ok(score)
}

/// Updates the grade for (student, assignment) if one exists, else creates it.
/// Exactly one repository write.
pub fn upsert_grade<R>(
    repo: &mut R,
    student_id: i64,
    assignment_id: i64,
    score: f64,
    today: NaiveDate,
) -> Result<Grade, CoreError>
where
    R: RecordRepository<Grade> + ?Sized,
{
    let existing = repo
        .get_by_foreign_key("studentId", student_id)?
        .into_iter()
        .find(|g| g.assignment_id == assignment_id);

    match existing {
        Some(mut grade) => {
            grade.score = score;
            grade.submitted_date = Some(today);
            let id = grade.id;
            let saved = repo.update(id, grade)?;
            tracing::info!(grade_id = id, student_id, assignment_id, score, "grade updated");
            Ok(saved)
        }
        None => {
            let saved = repo.create(Grade {
                id: 0,
                student_id,
                assignment_id,
                score,
                submitted_date: Some(today),
                notes: String::new(),
            })?;
            tracing::info!(grade_id = saved.id, student_id, assignment_id, score, "grade created");
            Ok(saved)
        }
    }
}
