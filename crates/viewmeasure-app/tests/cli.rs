use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

const SCRIPT: &str = r#"{
    "config": { "conversion_factor": 2.0, "units": "um" },
    "image": "slide",
    "steps": [
        { "action": "double_click", "x": 10, "y": 10 },
        { "action": "double_click", "x": 50, "y": 10 },
        { "action": "key", "key": "s", "modifiers": { "ctrl": true } }
    ]
}"#;

fn write_script(dir: &Path, contents: &str) -> std::path::PathBuf {
    let path = dir.join("script.json");
    fs::write(&path, contents).expect("script should be written");
    path
}

#[test]
fn replay_writes_csv_and_prints_labels() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), SCRIPT);
    let out = temp.path().join("out.csv");

    cargo_bin_cmd!("viewmeasure")
        .arg(&script)
        .arg("--store")
        .arg(temp.path().join("store"))
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("M1\t80.000 um"));

    let csv = fs::read_to_string(&out).expect("export should exist");
    assert_eq!(csv, "Name,Point1X,Point1Y,Point2X,Point2Y,Distance\nM1,10,10,50,10,80\n");
}

#[test]
fn measurements_persist_between_runs() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let store = temp.path().join("store");
    let first = write_script(temp.path(), SCRIPT);

    cargo_bin_cmd!("viewmeasure")
        .arg(&first)
        .arg("--store")
        .arg(&store)
        .arg("--out")
        .arg(temp.path().join("first.csv"))
        .assert()
        .success();

    let second = write_script(temp.path(), r#"{ "image": "slide", "config": { "conversion_factor": 2.0, "units": "um" } }"#);
    cargo_bin_cmd!("viewmeasure")
        .arg(&second)
        .arg("--store")
        .arg(&store)
        .assert()
        .success()
        .stdout(predicate::str::contains("M1\t80.000 um"));
}

#[test]
fn help_lists_shortcuts() {
    cargo_bin_cmd!("viewmeasure")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ctrl/Cmd+R").and(predicate::str::contains("Reset all measurements")));
}

#[test]
fn invalid_script_fails() {
    let temp = tempfile::tempdir().expect("temp dir should be created");
    let script = write_script(temp.path(), r#"{ "image": "slide", "config": { "conversion_factor": -1 } }"#);

    cargo_bin_cmd!("viewmeasure")
        .arg(&script)
        .arg("--memory")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Conversion factor"));
}
