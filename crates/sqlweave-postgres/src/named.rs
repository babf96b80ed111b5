//! Named parameter rewriting.
//!
//! Postgres only understands positional `$N` placeholders. `:name` markers
//! are numbered in order of first appearance; a repeated name reuses its
//! number. Casts (`::`), string literals, quoted identifiers, comments and
//! dollar-quoted bodies pass through untouched.

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted { backslash_escapes: bool },
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// SQL with `:name` markers rewritten to `$N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedSql {
    sql: String,
    names: Vec<String>,
}

impl NamedSql {
    pub fn parse(sql: &str) -> Self {
        let bytes = sql.as_bytes();
        let mut out = String::with_capacity(sql.len());
        let mut names: Vec<String> = Vec::new();
        let mut state = State::Normal;
        let mut copied = 0;
        let mut idx = 0;

        while idx < bytes.len() {
            let b = bytes[idx];
            match state {
                State::Normal => match b {
                    b'\'' => {
                        state = State::SingleQuoted {
                            backslash_escapes: is_escape_string_prefix(bytes, idx),
                        }
                    }
                    b'"' => state = State::DoubleQuoted,
                    b'-' if bytes.get(idx + 1) == Some(&b'-') => state = State::LineComment,
                    b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                        state = State::BlockComment(1);
                        idx += 1;
                    }
                    b'$' => {
                        if let Some((tag, end)) = try_start_dollar_quote(bytes, idx) {
                            state = State::DollarQuoted(tag);
                            idx = end;
                        }
                    }
                    b':' if bytes.get(idx + 1) == Some(&b':') => idx += 1,
                    b':' if bytes.get(idx + 1).is_some_and(|c| is_name_start(*c)) => {
                        let end = scan_name(bytes, idx + 1);
                        let name = &sql[idx + 1..end];
                        let position = match names.iter().position(|n| n == name) {
                            Some(p) => p + 1,
                            None => {
                                names.push(name.to_string());
                                names.len()
                            }
                        };
                        out.push_str(&sql[copied..idx]);
                        out.push('$');
                        out.push_str(&position.to_string());
                        copied = end;
                        idx = end;
                        continue;
                    }
                    _ => {}
                },
                State::SingleQuoted { backslash_escapes } => {
                    if backslash_escapes && b == b'\\' {
                        idx += 1;
                    } else if b == b'\'' {
                        if bytes.get(idx + 1) == Some(&b'\'') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::DoubleQuoted => {
                    if b == b'"' {
                        if bytes.get(idx + 1) == Some(&b'"') {
                            idx += 1;
                        } else {
                            state = State::Normal;
                        }
                    }
                }
                State::LineComment => {
                    if b == b'\n' {
                        state = State::Normal;
                    }
                }
                State::BlockComment(depth) => {
                    if b == b'/' && bytes.get(idx + 1) == Some(&b'*') {
                        state = State::BlockComment(depth + 1);
                        idx += 1;
                    } else if b == b'*' && bytes.get(idx + 1) == Some(&b'/') {
                        state = if depth == 1 {
                            State::Normal
                        } else {
                            State::BlockComment(depth - 1)
                        };
                        idx += 1;
                    }
                }
                State::DollarQuoted(ref tag) => {
                    if b == b'$' && matches_tag(bytes, idx, tag) {
                        idx += tag.len() + 1;
                        state = State::Normal;
                    }
                }
            }
            idx += 1;
        }

        out.push_str(&sql[copied..]);
        Self { sql: out, names }
    }

    /// The rewritten SQL.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Parameter names; `names()[i]` binds to `$i+1`.
    pub fn names(&self) -> &[String] {
        &self.names
    }
}

fn is_name_start(b: u8) -> bool {
    b.is_ascii_alphabetic() || b == b'_'
}

fn scan_name(bytes: &[u8], start: usize) -> usize {
    let mut idx = start;
    while idx < bytes.len() && (bytes[idx].is_ascii_alphanumeric() || bytes[idx] == b'_') {
        idx += 1;
    }
    idx
}

/// `E'...'` literals honour backslash escapes.
fn is_escape_string_prefix(bytes: &[u8], quote: usize) -> bool {
    let Some(prev) = quote.checked_sub(1).map(|i| bytes[i]) else {
        return false;
    };
    if prev != b'e' && prev != b'E' {
        return false;
    }
    match quote.checked_sub(2).map(|i| bytes[i]) {
        Some(c) => !(c.is_ascii_alphanumeric() || c == b'_'),
        None => true,
    }
}

fn try_start_dollar_quote(bytes: &[u8], start: usize) -> Option<(String, usize)> {
    if bytes.get(start + 1).is_some_and(u8::is_ascii_digit) {
        return None;
    }
    let mut idx = start + 1;
    while idx < bytes.len() && bytes[idx] != b'$' {
        let b = bytes[idx];
        if !(b.is_ascii_alphanumeric() || b == b'_') {
            return None;
        }
        idx += 1;
    }
    if idx < bytes.len() {
        let tag = String::from_utf8(bytes[start + 1..idx].to_vec()).ok()?;
        Some((tag, idx))
    } else {
        None
    }
}

fn matches_tag(bytes: &[u8], idx: usize, tag: &str) -> bool {
    let end = idx + 1 + tag.len();
    end < bytes.len() && &bytes[idx + 1..end] == tag.as_bytes() && bytes[end] == b'$'
}
