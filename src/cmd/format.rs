/*!
format.rs

Output formatting for replies and notifications.

Rendering contract:
  - Dictionaries are printed one entry at a time as
        <indent><key><separator><value><terminator>
    where the caller picks indent / separator / terminator
    (`state` uses "  ", " = ", "\n"; notifications use "", " = ", " = ").
  - Nested values are rendered inline: `[ a b ]`, `{ k=v }`, `True`/`False`.
  - Object lists (`a(oa{sv})`, as returned by GetServices / GetTechnologies)
    print the object path, then its dictionary indented below it.

Colour follows the usual conventions: disabled with NO_COLOR or when the
stream written to is not a terminal. This module only builds strings; callers print them.
*/

use std::io::IsTerminal;

use crate::bus::Value;

/* -------------------------------------------------------------------------- */
/* Style Options                                                              */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, Copy)]
pub struct StyleOptions {
    pub use_color: bool,
    /// Same decision for stderr, which may be redirected on its own.
    pub stderr_color: bool,
}

impl StyleOptions {
    pub fn detect() -> Self {
        let no_color = std::env::var_os("NO_COLOR").is_some();
        StyleOptions {
            use_color: !no_color && std::io::stdout().is_terminal(),
            stderr_color: !no_color && std::io::stderr().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        StyleOptions {
            use_color: false,
            stderr_color: false,
        }
    }

    /// Style for text written to stderr.
    pub fn stderr(&self) -> Self {
        StyleOptions {
            use_color: self.stderr_color,
            stderr_color: self.stderr_color,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum Role {
    Primary,
    Error,
}

pub fn color(role: Role, text: impl AsRef<str>, style: &StyleOptions) -> String {
    if !style.use_color {
        return text.as_ref().to_string();
    }
    let code = match role {
        Role::Primary => "38;5;45", // cyan-ish
        Role::Error => "38;5;196",  // red
    };
    format!("\x1b[{code}m{}\x1b[0m", text.as_ref())
}

/* -------------------------------------------------------------------------- */
/* Dictionaries                                                               */
/* -------------------------------------------------------------------------- */

/// Render dictionary entries with the caller's indent/separator/terminator.
pub fn render_dict(entries: &[(String, Value)], indent: &str, sep: &str, term: &str) -> String {
    let mut out = String::new();
    for (key, value) in entries {
        out.push_str(indent);
        out.push_str(key);
        out.push_str(sep);
        out.push_str(&value.to_string());
        out.push_str(term);
    }
    out
}

/// Render a reply/signal argument list. Dictionaries use the entry contract;
/// scalars and containers are rendered inline, all joined by `sep`.
pub fn render_args(args: &[Value], indent: &str, sep: &str, term: &str) -> String {
    let mut parts: Vec<String> = Vec::with_capacity(args.len());
    for arg in args {
        match arg {
            Value::Dict(entries) => parts.push(render_dict(entries, indent, sep, term)),
            other => parts.push(format!("{indent}{other}")),
        }
    }
    parts.join(sep)
}

/* -------------------------------------------------------------------------- */
/* Object Lists                                                               */
/* -------------------------------------------------------------------------- */

/// `(path, properties)` pairs of an `a(oa{sv})` value; malformed entries skipped.
pub fn object_entries(list: &Value) -> Vec<(&str, &[(String, Value)])> {
    list.as_array()
        .unwrap_or_default()
        .iter()
        .filter_map(|entry| match entry.as_struct()? {
            [path, props] => Some((path.as_str()?, props.as_dict()?)),
            _ => None,
        })
        .collect()
}

/// Path line, indented dictionary, blank line, per object.
pub fn render_object_list(list: &Value, indent: &str) -> String {
    let mut out = String::new();
    for (path, props) in object_entries(list) {
        out.push_str(path);
        out.push('\n');
        out.push_str(&render_dict(props, indent, " = ", "\n"));
        out.push('\n');
    }
    out
}

/// Body of a `ServicesChanged` notification: changed services as nested
/// blocks, then one line per removed path.
pub fn render_services_changed(args: &[Value]) -> String {
    let mut blocks: Vec<String> = Vec::new();
    if let Some(changed) = args.first() {
        for (path, props) in object_entries(changed) {
            let mut block = format!("  {path}");
            if !props.is_empty() {
                block.push('\n');
                block.push_str(render_dict(props, "    ", " = ", "\n").trim_end_matches('\n'));
            }
            blocks.push(block);
        }
    }
    if let Some(removed) = args.get(1).and_then(Value::as_array) {
        for path in removed.iter().filter_map(Value::as_str) {
            blocks.push(format!("  removed {path}"));
        }
    }
    blocks.join("\n")
}

/* -------------------------------------------------------------------------- */
/* JSON                                                                       */
/* -------------------------------------------------------------------------- */

/// Pretty JSON for a reply body (single value unwrapped).
pub fn render_json(body: &[Value]) -> String {
    let value = match body {
        [single] => single.to_json(),
        many => serde_json::Value::Array(many.iter().map(Value::to_json).collect()),
    };
    serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
}

/* -------------------------------------------------------------------------- */
/* Tests                                                                      */
/* -------------------------------------------------------------------------- */
