use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_schoold");
    let mut child = Command::new(exe)
        .env_remove("SCHOOLD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn schoold");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn create(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    collection: &str,
    record: serde_json::Value,
) -> i64 {
    request_ok(
        stdin,
        reader,
        id,
        &format!("{}.create", collection),
        json!({ "record": record }),
    )["record"]["id"]
        .as_i64()
        .expect("created id")
}

#[test]
fn dashboard_tolerates_dangling_references() {
    let workspace = temp_dir("schoold-dashboard");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let empty = request_ok(
        &mut stdin,
        &mut reader,
        "empty",
        "dashboard.stats",
        json!({ "asOf": "2024-03-04" }),
    );
    assert_eq!(empty["stats"]["totalStudents"], 0);
    assert_eq!(empty["stats"]["averageGrade"].as_f64(), Some(0.0));
    assert_eq!(empty["stats"]["todaysAttendanceRate"].as_f64(), Some(0.0));

    let s = create(
        &mut stdin,
        &mut reader,
        "s",
        "students",
        json!({
            "firstName": "Nia",
            "lastName": "Cole",
            "email": "nia@school.test",
            "gradeLevel": "11",
            "dateOfBirth": "2007-02-02",
            "enrollmentDate": "2021-09-01",
            "status": "active",
        }),
    );
    create(
        &mut stdin,
        &mut reader,
        "e",
        "employees",
        json!({
            "name": "Tom Reyes",
            "email": "tom@school.test",
            "department": "Mathematics",
            "position": "Teacher",
            "phone": "+1 (555) 010-2000",
            "hireDate": "2015-08-17",
            "status": "active",
            "employeeCode": "EMP007",
            "subjects": ["Algebra"],
        }),
    );
    let class_id = create(
        &mut stdin,
        &mut reader,
        "c",
        "classes",
        json!({ "name": "Algebra II", "subject": "Math", "period": "2", "room": "M3", "studentIds": [s, 404] }),
    );
    let essay = create(
        &mut stdin,
        &mut reader,
        "a1",
        "assignments",
        json!({ "name": "Essay", "category": "essay", "points": 20, "dueDate": "2024-03-01", "weight": 1, "classId": class_id }),
    );
    let project = create(
        &mut stdin,
        &mut reader,
        "a2",
        "assignments",
        json!({ "name": "Project", "category": "project", "points": 50, "dueDate": "2024-03-10", "weight": 1, "classId": class_id }),
    );
    create(
        &mut stdin,
        &mut reader,
        "a3",
        "assignments",
        json!({ "name": "Orphan Lab", "category": "lab", "points": 10, "dueDate": "2024-03-04", "weight": 1, "classId": 999 }),
    );

    create(
        &mut stdin,
        &mut reader,
        "g1",
        "grades",
        json!({ "studentId": s, "assignmentId": essay, "score": 15, "submittedDate": "2024-02-28" }),
    );
    create(
        &mut stdin,
        &mut reader,
        "g2",
        "grades",
        json!({ "studentId": s, "assignmentId": project, "score": 45, "submittedDate": "2024-03-02" }),
    );
    // Points at an assignment that was never created.
    create(
        &mut stdin,
        &mut reader,
        "g3",
        "grades",
        json!({ "studentId": 404, "assignmentId": 8080, "score": 3, "submittedDate": "2024-03-03" }),
    );

    create(
        &mut stdin,
        &mut reader,
        "t1",
        "attendance",
        json!({ "studentId": s, "classId": class_id, "date": "2024-03-04", "status": "present" }),
    );
    create(
        &mut stdin,
        &mut reader,
        "t2",
        "attendance",
        json!({ "studentId": 404, "classId": class_id, "date": "2024-03-04", "status": "absent" }),
    );

    let stats = request_ok(
        &mut stdin,
        &mut reader,
        "stats",
        "dashboard.stats",
        json!({ "asOf": "2024-03-04" }),
    );
    let st = &stats["stats"];
    assert_eq!(st["totalStudents"], 1);
    assert_eq!(st["totalClasses"], 1);
    assert_eq!(st["totalEmployees"], 1);
    assert_eq!(st["todaysAttendanceRate"].as_f64(), Some(50.0));
    // Mean of 75% and 90%; the dangling grade is left out.
    let avg = st["averageGrade"].as_f64().expect("average");
    assert!((avg - 82.5).abs() < 1e-9, "average {}", avg);

    let recent = request_ok(
        &mut stdin,
        &mut reader,
        "recent",
        "dashboard.recentActivity",
        json!({ "limit": 2 }),
    );
    let items = recent["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["studentName"], "Unknown");
    assert_eq!(items[0]["assignmentName"], "Unknown");
    assert_eq!(items[0]["maxScore"].as_f64(), Some(100.0));
    assert_eq!(items[1]["studentName"], "Nia Cole");
    assert_eq!(items[1]["assignmentName"], "Project");

    let upcoming = request_ok(
        &mut stdin,
        &mut reader,
        "up",
        "dashboard.upcomingAssignments",
        json!({ "asOf": "2024-03-04" }),
    );
    let items = upcoming["items"].as_array().expect("items");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0]["name"], "Orphan Lab");
    assert_eq!(items[0]["className"], "Unknown Class");
    assert_eq!(items[1]["name"], "Project");
    assert_eq!(items[1]["className"], "Algebra II");

    let perf = request_ok(
        &mut stdin,
        &mut reader,
        "perf",
        "dashboard.classPerformance",
        json!({}),
    );
    let algebra = &perf["classes"][0];
    assert_eq!(algebra["classId"], class_id);
    assert_eq!(algebra["studentCount"], 1);
    assert_eq!(algebra["attendanceRate"].as_f64(), Some(50.0));
    // 60 of 70 points across the class's graded assignments.
    let avg = algebra["averageGrade"].as_f64().expect("class average");
    assert!((avg - 60.0 / 70.0 * 100.0).abs() < 1e-9, "class average {}", avg);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
