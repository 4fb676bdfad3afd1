use crate::attendance::compute_class_stats;
use crate::model::{
    Assignment, Attendance, AttendanceStatus, Class, Employee, Grade, Student,
};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{HashMap, HashSet};

pub const DEFAULT_LIST_LIMIT: usize = 5;
pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_CLASS: &str = "Unknown Class";
/// Max score shown when a grade's assignment no longer resolves.
pub const FALLBACK_MAX_SCORE: f64 = 100.0;

/// Caller-held copy of every collection, fetched once per dashboard render.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub students: Vec<Student>,
    pub employees: Vec<Employee>,
    pub classes: Vec<Class>,
    pub assignments: Vec<Assignment>,
    pub grades: Vec<Grade>,
    pub attendance: Vec<Attendance>,
}

impl Snapshot {
    fn assignments_by_id(&self) -> HashMap<i64, &Assignment> {
        self.assignments.iter().map(|a| (a.id, a)).collect()
    }
}

/// Percentage earned on one grade, or None when its assignment is missing or has no points.
fn grade_percent(grade: &Grade, assignments: &HashMap<i64, &Assignment>) -> Option<f64> {
    let a = assignments.get(&grade.assignment_id)?;
    if a.points <= 0.0 {
        return None;
    }
    Some(grade.score / a.points * 100.0)
}

fn mean(values: impl IntoIterator<Item = f64>) -> f64 {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        0.0
    } else {
        sum / n as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub total_students: usize,
    pub total_classes: usize,
    pub total_employees: usize,
    pub todays_attendance_rate: f64,
    pub average_grade: f64,
}

pub fn compute_stats(snap: &Snapshot, today: NaiveDate) -> DashboardStats {
    let todays: Vec<&Attendance> = snap.attendance.iter().filter(|a| a.date == today).collect();
    let present = todays
        .iter()
        .filter(|a| a.status == AttendanceStatus::Present)
        .count();
    let todays_attendance_rate = if todays.is_empty() {
        0.0
    } else {
        present as f64 / todays.len() as f64 * 100.0
    };

    let by_id = snap.assignments_by_id();
    let average_grade = mean(snap.grades.iter().filter_map(|g| grade_percent(g, &by_id)));

    DashboardStats {
        total_students: snap.students.len(),
        total_classes: snap.classes.len(),
        total_employees: snap.employees.len(),
        todays_attendance_rate,
        average_grade,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityItem {
    pub grade_id: i64,
    pub student_name: String,
    pub assignment_name: String,
    pub score: f64,
    pub max_score: f64,
    pub date: NaiveDate,
}

/// Most recently submitted grades, newest first.
pub fn recent_activity(snap: &Snapshot, limit: usize) -> Vec<ActivityItem> {
    let students: HashMap<i64, &Student> = snap.students.iter().map(|s| (s.id, s)).collect();
    let by_id = snap.assignments_by_id();

    let mut submitted: Vec<(&Grade, NaiveDate)> = snap
        .grades
        .iter()
        .filter_map(|g| g.submitted_date.map(|d| (g, d)))
        .collect();
    submitted.sort_by(|a, b| b.1.cmp(&a.1));

    submitted
        .into_iter()
        .take(limit)
        .map(|(g, date)| {
            let assignment = by_id.get(&g.assignment_id);
            ActivityItem {
                grade_id: g.id,
                student_name: students
                    .get(&g.student_id)
                    .map(|s| s.display_name())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                assignment_name: assignment
                    .map(|a| a.name.clone())
                    .unwrap_or_else(|| UNKNOWN.to_string()),
                score: g.score,
                max_score: assignment.map_or(FALLBACK_MAX_SCORE, |a| a.points),
                date,
            }
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpcomingAssignment {
    #[serde(flatten)]
    pub assignment: Assignment,
    pub class_name: String,
}

/// Assignments due today or later, soonest first.
pub fn upcoming_assignments(snap: &Snapshot, today: NaiveDate, limit: usize) -> Vec<UpcomingAssignment> {
    let classes: HashMap<i64, &Class> = snap.classes.iter().map(|c| (c.id, c)).collect();
    let mut due: Vec<&Assignment> = snap
        .assignments
        .iter()
        .filter(|a| a.due_date >= today)
        .collect();
    due.sort_by_key(|a| a.due_date);

    due.into_iter()
        .take(limit)
        .map(|a| UpcomingAssignment {
            assignment: a.clone(),
            class_name: classes
                .get(&a.class_id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| UNKNOWN_CLASS.to_string()),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPerformance {
    pub class_id: i64,
    pub class_name: String,
    pub student_count: usize,
    pub average_grade: f64,
    pub attendance_rate: f64,
}

/// Enrollment, grade and attendance summary for one class.
/// Enrolled ids with no matching student are not counted. The average is points
/// earned over points possible across the class's graded assignments.
pub fn class_performance(class: &Class, snap: &Snapshot) -> ClassPerformance {
    let enrolled: HashSet<i64> = class.student_ids.iter().copied().collect();
    let student_count = snap
        .students
        .iter()
        .filter(|s| enrolled.contains(&s.id))
        .count();

    let own: HashMap<i64, &Assignment> = snap
        .assignments
        .iter()
        .filter(|a| a.class_id == class.id)
        .map(|a| (a.id, a))
        .collect();
    let (earned, possible) = snap
        .grades
        .iter()
        .filter_map(|g| own.get(&g.assignment_id).map(|a| (g.score, a.points)))
        .fold((0.0, 0.0), |(e, p), (score, points)| (e + score, p + points));
    let average_grade = if possible > 0.0 {
        earned / possible * 100.0
    } else {
        0.0
    };

    ClassPerformance {
        class_id: class.id,
        class_name: class.name.clone(),
        student_count,
        average_grade,
        attendance_rate: compute_class_stats(class.id, &snap.attendance).attendance_rate,
    }
}

pub fn all_class_performance(snap: &Snapshot) -> Vec<ClassPerformance> {
    snap.classes
        .iter()
        .map(|c| class_performance(c, snap))
        .collect()
}
