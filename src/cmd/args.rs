/*!
Argument parsing helpers shared by command handlers.

  - OptionSpec / Arity      : per-command option tables
  - resolve(token, table)   : token -> Resolved { NoOption | Option(code) | Unrecognized }
  - parse_boolean(token)    : yes/no style booleans
  - TokenCursor             : bounded cursor over a command's tokens (peek, peek_n, group)
*/

/// Whether an option expects values after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    None,
    Required,
}

/// One entry of a command's option table. `code` is unique within its table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionSpec {
    pub name: &'static str,
    pub arity: Arity,
    pub code: char,
    pub desc: &'static str,
}

impl OptionSpec {
    pub const fn new(name: &'static str, arity: Arity, code: char, desc: &'static str) -> Self {
        Self {
            name,
            arity,
            code,
            desc,
        }
    }
}

/// Classification of a token against an option table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    NoOption,
    Option(char),
    Unrecognized,
}

/// Match `token` against `table`, bare or with a leading `--`. First match wins.
pub fn resolve(token: Option<&str>, table: &[OptionSpec]) -> Resolved {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Resolved::NoOption;
    };
    let long = token.strip_prefix("--");
    table
        .iter()
        .find(|opt| opt.name == token || long == Some(opt.name))
        .map_or(Resolved::Unrecognized, |opt| Resolved::Option(opt.code))
}

/// True/false words accepted by `autoconnect` and `monitor`.
pub fn parse_boolean(token: &str) -> Option<bool> {
    const TRUE: [&str; 4] = ["yes", "true", "on", "enable"];
    const FALSE: [&str; 4] = ["no", "false", "off", "disable"];
    if TRUE.iter().any(|w| w.eq_ignore_ascii_case(token)) {
        Some(true)
    } else if FALSE.iter().any(|w| w.eq_ignore_ascii_case(token)) {
        Some(false)
    } else {
        None
    }
}

/// Read-only cursor over an ordered token list.
#[derive(Debug, Clone, Copy)]
pub struct TokenCursor<'a> {
    tokens: &'a [String],
    pos: usize,
}

impl<'a> TokenCursor<'a> {
    pub fn new(tokens: &'a [String], pos: usize) -> Self {
        Self {
            tokens,
            pos: pos.min(tokens.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(String::as_str)
    }

    /// Up to `n` tokens from the cursor (fewer near the end).
    pub fn peek_n(&self, n: usize) -> &'a [String] {
        let end = self.pos.saturating_add(n).min(self.tokens.len());
        &self.tokens[self.pos..end]
    }

    /// Cursor moved forward by `n`, clamped to the end.
    pub fn advanced(&self, n: usize) -> Self {
        Self::new(self.tokens, self.pos.saturating_add(n))
    }

    /// Tokens up to (not including) the next one that resolves in `table`,
    /// capped at `limit`.
    pub fn group(&self, table: &[OptionSpec], limit: usize) -> &'a [String] {
        let window = self.peek_n(limit);
        let len = window
            .iter()
            .position(|t| matches!(resolve(Some(t), table), Resolved::Option(_)))
            .unwrap_or(window.len());
        &window[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &[OptionSpec] = &[
        OptionSpec::new("ipv4", Arity::Required, 'i', ""),
        OptionSpec::new("remove", Arity::None, 'r', ""),
    ];

    fn toks(s: &[&str]) -> Vec<String> {
        s.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn resolve_empty_is_no_option() {
        assert_eq!(resolve(None, TABLE), Resolved::NoOption);
        assert_eq!(resolve(Some(""), TABLE), Resolved::NoOption);
    }

    #[test]
    fn resolve_bare_and_long_forms() {
        assert_eq!(resolve(Some("ipv4"), TABLE), Resolved::Option('i'));
        assert_eq!(resolve(Some("--ipv4"), TABLE), Resolved::Option('i'));
        assert_eq!(resolve(Some("--remove"), TABLE), Resolved::Option('r'));
    }

    #[test]
    fn resolve_is_exact_and_case_sensitive() {
        assert_eq!(resolve(Some("IPv4"), TABLE), Resolved::Unrecognized);
        assert_eq!(resolve(Some("-ipv4"), TABLE), Resolved::Unrecognized);
        assert_eq!(resolve(Some("--ipv"), TABLE), Resolved::Unrecognized);
        assert_eq!(resolve(Some("x"), &[]), Resolved::Unrecognized);
    }

    #[test]
    fn booleans() {
        assert_eq!(parse_boolean("YES"), Some(true));
        assert_eq!(parse_boolean("off"), Some(false));
        assert_eq!(parse_boolean("maybe"), None);
    }

    #[test]
    fn cursor_bounds() {
        let t = toks(&["a", "b", "c"]);
        let c = TokenCursor::new(&t, 1);
        assert_eq!(c.peek(), Some("b"));
        assert_eq!(c.peek_n(5), &t[1..]);
        assert_eq!(c.advanced(10).peek(), None);
        assert!(c.advanced(10).peek_n(2).is_empty());
    }

    #[test]
    fn group_stops_at_next_option() {
        let t = toks(&["manual", "10.0.0.2", "--remove", "x"]);
        let c = TokenCursor::new(&t, 0);
        assert_eq!(c.group(TABLE, 4), &t[..2]);
        assert_eq!(c.group(TABLE, 1), &t[..1]);
        assert_eq!(c.advanced(3).group(TABLE, usize::MAX), &t[3..]);
    }
}
