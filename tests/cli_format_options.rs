use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::tempdir;

fn run(cmd: &mut Command) -> (i32, String, String) {
    let out = cmd.output().expect("failed to run relaxng");
    let code = out.status.code().unwrap_or(-1);
    let stdout = String::from_utf8_lossy(&out.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&out.stderr).into_owned();
    (code, stdout, stderr)
}

fn relaxng() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_relaxng"));
    cmd.env_remove("RELAXNG_CONFIG_FILE")
        .env_remove("RELAXNG_LOG")
        .env("XDG_CONFIG_HOME", "/nonexistent-relaxng-config-home");
    cmd
}

fn write_bytes(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("write file");
    path
}

#[test]
fn standard_format_groups_by_file() {
    let dir = tempdir().unwrap();
    let bad = write_bytes(dir.path(), "bad.xml", b"<Whats up=\"E\">\n  <x/>\n</Whats>\n");

    let (code, out, _) = run(relaxng().arg(&bad));
    assert_eq!(code, 1);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines[0], bad.display().to_string());
    assert_eq!(
        lines[1],
        r#"  2:3       error    element "x" not allowed here  (relaxng)"#
    );
    assert_eq!(lines.get(2), Some(&""));
}

#[test]
fn parsable_format_is_one_line_per_problem() {
    let dir = tempdir().unwrap();
    let bad = write_bytes(dir.path(), "bad.xml", b"<Whats/>");

    let (code, out, _) = run(relaxng().arg("-f").arg("parsable").arg(&bad));
    assert_eq!(code, 1);
    assert_eq!(
        out.trim_end(),
        format!(
            r#"{}:1:1: [error] element "Whats" is missing required attributes (relaxng)"#,
            bad.display()
        )
    );
}

#[test]
fn json_format_is_a_single_array() {
    let dir = tempdir().unwrap();
    let bad = write_bytes(dir.path(), "bad.xml", b"<Whats/>");
    let good = write_bytes(dir.path(), "good.xml", b"<Whats up=\"E\"/>");

    let (code, out, _) = run(relaxng().args(["--format", "json"]).arg(&bad).arg(&good));
    assert_eq!(code, 1);
    let value: serde_json::Value = serde_json::from_str(&out).expect("json output");
    let items = value.as_array().expect("array");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["path"], bad.display().to_string());
    assert_eq!(items[0]["line"], 1);
    assert_eq!(items[0]["column"], 1);
    assert_eq!(items[0]["level"], "error");
    assert_eq!(items[0]["rule"], "relaxng");
}

#[test]
fn json_format_without_problems_is_empty_array() {
    let dir = tempdir().unwrap();
    let good = write_bytes(dir.path(), "good.xml", b"<Whats up=\"E\"/>");
    let (code, out, _) = run(relaxng().args(["-f", "json"]).arg(&good));
    assert_eq!(code, 0);
    assert_eq!(out.trim(), "[]");
}

#[test]
fn warnings_do_not_fail_unless_strict() {
    let dir = tempdir().unwrap();
    let latin = write_bytes(dir.path(), "latin.xml", b"<Whats up=\"caf\xe9\"/>");

    let (code, out, _) = run(relaxng().arg("-f").arg("parsable").arg(&latin));
    assert_eq!(code, 0, "stdout: {out}");
    assert!(out.contains("[warning]"), "stdout: {out}");
    assert!(out.contains("(malformed-encoding)"), "stdout: {out}");

    let (code, _, _) = run(relaxng().arg("--strict").arg(&latin));
    assert_eq!(code, 2);

    let (code, out, _) = run(relaxng().arg("--no-warnings").arg("--strict").arg(&latin));
    assert_eq!(code, 0);
    assert!(out.is_empty(), "stdout: {out}");
}

#[test]
fn strict_preset_turns_warnings_into_errors() {
    let dir = tempdir().unwrap();
    let latin = write_bytes(dir.path(), "latin.xml", b"<Whats up=\"caf\xe9\"/>");

    let (code, out, _) = run(relaxng().args(["-d", "strict", "-f", "parsable"]).arg(&latin));
    assert_eq!(code, 1);
    assert!(out.contains("[error]"), "stdout: {out}");
}

#[test]
fn config_file_can_disable_encoding_check() {
    let dir = tempdir().unwrap();
    let cfg = write_bytes(
        dir.path(),
        "cfg.yaml",
        b"rules:\n  malformed-encoding: disable\n",
    );
    let latin = write_bytes(dir.path(), "latin.xml", b"<Whats up=\"caf\xe9\"/>");

    let (code, out, _) = run(relaxng().arg("-c").arg(&cfg).arg("--strict").arg(&latin));
    assert_eq!(code, 0);
    assert!(out.is_empty(), "stdout: {out}");
}

#[test]
fn env_var_config_applies_globally() {
    let dir = tempdir().unwrap();
    let cfg = write_bytes(dir.path(), "env.yaml", b"extends: strict\n");
    let latin = write_bytes(dir.path(), "latin.xml", b"<Whats up=\"caf\xe9\"/>");

    let (code, _, _) = run(relaxng().env("RELAXNG_CONFIG_FILE", &cfg).arg(&latin));
    assert_eq!(code, 1);
}

#[test]
fn unknown_format_is_rejected_by_clap() {
    let (code, _, err) = run(relaxng().args(["-f", "xml", "x.xml"]));
    assert_eq!(code, 2);
    assert!(err.contains("invalid value"), "stderr: {err}");
}

#[test]
fn verbose_logging_goes_to_stderr() {
    let dir = tempdir().unwrap();
    let good = write_bytes(dir.path(), "good.xml", b"<Whats up=\"E\"/>");
    let (code, out, err) = run(relaxng().arg("-vv").arg(&good));
    assert_eq!(code, 0);
    assert!(out.is_empty(), "stdout: {out}");
    assert!(err.contains("selected files"), "stderr: {err}");
}
