// Built-in presets usable from `extends` and `-d <name>`.

pub const PRESETS: [&str; 2] = ["default", "strict"];

static BUILTINS: [(&str, &str); 2] = [
    (
        "default",
        r"
remove-todos: true
rules:
  malformed-encoding:
    level: warning
",
    ),
    (
        "strict",
        r"
extends: default
rules:
  malformed-encoding:
    level: error
",
    ),
];

#[must_use]
pub fn builtin(name: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find_map(|(preset, yaml)| (*preset == name).then_some(*yaml))
}
