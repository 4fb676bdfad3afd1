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

fn request(
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
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_default()
}

fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

struct Fixture {
    class_id: i64,
    student_a: i64,
    student_b: i64,
    test_id: i64,
    quiz_id: i64,
}

fn create_id(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    record: serde_json::Value,
) -> i64 {
    request_ok(stdin, reader, id, method, json!({ "record": record }))["record"]["id"]
        .as_i64()
        .expect("created id")
}

/// Two students, one class, assignments worth 100 and 50 points.
fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Fixture {
    let mut students = Vec::new();
    for (i, first) in ["Ada", "Ben"].iter().enumerate() {
        students.push(create_id(
            stdin,
            reader,
            &format!("s{}", i),
            "students.create",
            json!({
                "firstName": first,
                "lastName": "Student",
                "email": format!("{}@school.test", first.to_lowercase()),
                "gradeLevel": "10",
                "dateOfBirth": "2008-05-01",
                "enrollmentDate": "2022-09-01",
                "status": "active",
            }),
        ));
    }
    let class_id = create_id(
        stdin,
        reader,
        "c",
        "classes.create",
        json!({
            "name": "Chemistry",
            "subject": "Science",
            "period": "3",
            "room": "Lab 1",
            "studentIds": [students[0], students[1]],
        }),
    );
    let test_id = create_id(
        stdin,
        reader,
        "a1",
        "assignments.create",
        json!({ "name": "Unit Test", "category": "test", "points": 100, "dueDate": "2024-02-01", "weight": 0.75, "classId": class_id }),
    );
    let quiz_id = create_id(
        stdin,
        reader,
        "a2",
        "assignments.create",
        json!({ "name": "Quiz", "category": "quiz", "points": 50, "dueDate": "2024-02-08", "weight": 0.25, "classId": class_id }),
    );
    Fixture {
        class_id,
        student_a: students[0],
        student_b: students[1],
        test_id,
        quiz_id,
    }
}

fn grade_count(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, id: &str) -> usize {
    request_ok(stdin, reader, id, "grades.list", json!({}))["items"]
        .as_array()
        .map(|a| a.len())
        .unwrap_or(0)
}

#[test]
fn matrix_averages_treat_missing_work_as_zero() {
    let workspace = temp_dir("schoold-grades");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let fx = seed(&mut stdin, &mut reader);

    let r = request_ok(
        &mut stdin,
        &mut reader,
        "set1",
        "grades.setScore",
        json!({ "studentId": fx.student_a, "assignmentId": fx.test_id, "value": 90 }),
    );
    assert_eq!(r["grade"]["score"].as_f64(), Some(90.0));
    assert!(r["grade"]["submittedDate"].is_string());
    assert_eq!(r["score"].as_f64(), Some(90.0));
    request_ok(
        &mut stdin,
        &mut reader,
        "set2",
        "grades.setScore",
        json!({ "studentId": fx.student_a, "assignmentId": fx.quiz_id, "value": "40" }),
    );

    let m = request_ok(
        &mut stdin,
        &mut reader,
        "m",
        "grades.matrix",
        json!({ "classId": fx.class_id }),
    );
    let matrix = &m["matrix"];
    assert_eq!(matrix["totalPoints"].as_f64(), Some(150.0));
    assert_eq!(matrix["assignments"].as_array().map(|a| a.len()), Some(2));

    let rows = matrix["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["studentId"], fx.student_a);
    assert_eq!(rows[0]["displayName"], "Ada Student");
    assert_eq!(rows[0]["average"].as_f64(), Some(86.7));
    assert_eq!(rows[0]["band"], "good");
    assert_eq!(rows[1]["studentId"], fx.student_b);
    assert_eq!(rows[1]["average"].as_f64(), Some(0.0));
    // Ungraded cells carry no score, which is not the same as a zero.
    assert!(rows[1]["cells"][0]["score"].is_null());

    let code = request(
        &mut stdin,
        &mut reader,
        "m404",
        "grades.matrix",
        json!({ "classId": 4040 }),
    );
    assert_eq!(error_code(&code), Some("not_found"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}

#[test]
fn set_score_validates_before_writing_and_upserts() {
    let workspace = temp_dir("schoold-setscore");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let fx = seed(&mut stdin, &mut reader);

    for (i, bad) in [json!(-1), json!(50.5), json!("abc"), json!("")].iter().enumerate() {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad{}", i),
            "grades.setScore",
            json!({ "studentId": fx.student_b, "assignmentId": fx.quiz_id, "value": bad }),
        );
        assert_eq!(error_code(&resp), Some("bad_params"), "value {}", bad);
    }
    assert_eq!(grade_count(&mut stdin, &mut reader, "count0"), 0);

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "up1",
        "grades.setScore",
        json!({ "studentId": fx.student_b, "assignmentId": fx.quiz_id, "value": 50 }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "up2",
        "grades.setScore",
        json!({ "studentId": fx.student_b, "assignmentId": fx.quiz_id, "value": 50 }),
    );
    assert_eq!(first["grade"]["id"], second["grade"]["id"]);
    assert_eq!(grade_count(&mut stdin, &mut reader, "count1"), 1);
    // 50 of 150 total points.
    assert_eq!(second["average"].as_f64(), Some(33.3));
    // Weighted: 0.25 * 1.0 over a weight sum of 1.0.
    assert_eq!(second["weightedAverage"].as_f64(), Some(25.0));

    let resp = request(
        &mut stdin,
        &mut reader,
        "nf1",
        "grades.setScore",
        json!({ "studentId": fx.student_b, "assignmentId": 9999, "value": 1 }),
    );
    assert_eq!(error_code(&resp), Some("not_found"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "nf2",
        "grades.setScore",
        json!({ "studentId": 9999, "assignmentId": fx.quiz_id, "value": 1 }),
    );
    assert_eq!(error_code(&resp), Some("not_found"));
    let resp = request(
        &mut stdin,
        &mut reader,
        "bp",
        "grades.setScore",
        json!({ "studentId": fx.student_b, "assignmentId": fx.quiz_id }),
    );
    assert_eq!(error_code(&resp), Some("bad_params"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
