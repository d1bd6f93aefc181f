use std::fs;
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

#[test]
fn print_default_entries() {
    let (code, out, _) = run(relaxng().args(["--print-default", "xml"]));
    assert_eq!(code, 0);
    assert_eq!(out, "<Whats up=\"E\"/>\n");

    let (code, out, _) = run(relaxng().args(["--print-default", "relaxng"]));
    assert_eq!(code, 0);
    assert!(out.starts_with("<grammar>"), "{out}");
    assert!(out.trim_end().ends_with("</grammar>"), "{out}");
}

#[test]
fn print_default_rejects_unknown_format() {
    let (code, _, err) = run(relaxng().args(["--print-default", "json"]));
    assert_eq!(code, 2);
    assert!(err.contains("invalid value"), "{err}");
}

#[test]
fn translate_builtin_grammar() {
    let dir = tempdir().unwrap();
    let (code, out, err) = run(relaxng().current_dir(dir.path()).arg("--translate"));
    assert_eq!(code, 0, "{err}");
    assert_eq!(
        out,
        "start = element1\nelement1 = element Whats { attribute up { text } }\n"
    );
}

#[test]
fn translate_grammar_file() {
    let dir = tempdir().unwrap();
    let grammar = dir.path().join("n.rng");
    fs::write(
        &grammar,
        r#"<grammar ns="urn:n">
  <start><ref name="n"/></start>
  <define name="n"><element><name>n</name><empty/></element></define>
</grammar>"#,
    )
    .unwrap();

    let (code, out, err) = run(relaxng().current_dir(dir.path()).arg("--translate").arg("-g").arg(&grammar));
    assert_eq!(code, 0, "{err}");
    assert_eq!(
        out,
        "namespace ns1 = \"urn:n\"\n\nstart = n\nn = element ns1:n { empty }\n"
    );
}

#[test]
fn translate_uses_project_config_grammar() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("g.rng"),
        r#"<grammar><start><ref name="x"/></start><define name="x"><element><name>x</name><text/></element></define></grammar>"#,
    )
    .unwrap();
    fs::write(dir.path().join(".relaxng"), "grammar: g.rng\n").unwrap();

    let (code, out, err) = run(relaxng().arg("--translate").arg(dir.path()));
    assert_eq!(code, 0, "{err}");
    assert_eq!(out, "start = x\nx = element x { text }\n");
}

#[test]
fn translate_reports_grammar_errors() {
    let dir = tempdir().unwrap();
    let grammar = dir.path().join("bad.rng");
    fs::write(&grammar, r#"<grammar><start><ref name="gone"/></start></grammar>"#).unwrap();

    let (code, out, err) = run(relaxng().current_dir(dir.path()).arg("--translate").arg("-g").arg(&grammar));
    assert_eq!(code, 2);
    assert!(out.is_empty());
    assert!(
        err.contains("reference to undefined define gone"),
        "stderr: {err}"
    );
}
