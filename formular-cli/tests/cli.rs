use assert_cmd::cargo::{self};
use predicates::str::contains;

const FORM: &str = r#"{
    "id": "signup",
    "fields": [
        {"id": 1, "name": "agree", "type": "checkbox", "value": false,
         "validationOptions": {"requiredData": {"required": true}}},
        {"id": "email", "name": "email", "type": "email"}
    ]
}"#;

#[test]
fn prints_help() {
    let mut cmd = cargo::cargo_bin_cmd!("formular");
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(contains("formular"))
        .stdout(contains("--events"));
}

#[test]
fn prints_descriptor_schema() {
    let mut cmd = cargo::cargo_bin_cmd!("formular");
    cmd.arg("--print-schema")
        .assert()
        .success()
        .stdout(contains("FormDescriptor"))
        .stdout(contains("validationOptions"));
}

#[test]
fn replays_script_from_stdin() {
    let mut cmd = cargo::cargo_bin_cmd!("formular");
    cmd.args(["--form", FORM, "--events", "-", "--no-pretty"])
        .write_stdin(
            r#"[
                {"action": "click", "field": "agree"},
                {"action": "set", "field": "email", "value": "ada@example.com"},
                {"action": "wait", "ms": 500},
                {"action": "submit"}
            ]"#,
        )
        .assert()
        .success()
        .stdout(contains(r#""valid":true"#))
        .stdout(contains(r#""agree":true"#))
        .stdout(contains(r#""elapsedMs":500"#));
}

#[test]
fn rejects_unknown_fields() {
    let mut cmd = cargo::cargo_bin_cmd!("formular");
    cmd.args([
        "--form",
        FORM,
        "--events",
        r#"[{"action": "focus", "field": "nope"}]"#,
    ])
    .assert()
    .failure()
    .stderr(contains("unknown field `nope`"));
}

#[test]
fn reports_invalid_submissions() {
    let mut cmd = cargo::cargo_bin_cmd!("formular");
    cmd.args([
        "--form",
        FORM,
        "--events",
        r#"[{"action": "submit"}]"#,
        "--no-pretty",
    ])
    .assert()
    .success()
    .stdout(contains(r#""valid":false"#))
    .stdout(contains(r#""fields":["agree"]"#));
}
