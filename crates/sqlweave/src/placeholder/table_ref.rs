use std::fmt;

/// Operator joining two steps of an arrow-style JSON path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arrow {
    /// `->`, yields JSON
    Json,
    /// `->>`, yields text
    Text,
}

impl Arrow {
    pub fn as_str(self) -> &'static str {
        match self {
            Arrow::Json => "->",
            Arrow::Text => "->>",
        }
    }
}

/// One `->key` / `->>key` step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrowStep {
    pub op: Arrow,
    pub key: String,
}

/// The path zone of a table reference (everything after the first space).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JsonPath {
    /// `->a->>b`
    Arrow(Vec<ArrowStep>),
    /// `$.a.b`, rendered as a quoted literal on its own
    Dot(String),
    /// Anything else; appended to the identifier as-is.
    Verbatim(String),
}

/// A parsed `@table.column[ path][-]` reference.
///
/// The payload is split into three zones: the identifier (up to the first
/// space), an optional path, and an optional trailing `-` alias marker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    ident: String,
    path: Option<JsonPath>,
    alias: bool,
}

impl TableRef {
    /// Parse a payload without its leading `@`.
    pub fn parse(payload: &str) -> Self {
        let (body, alias) = match payload.strip_suffix('-') {
            Some(body) => (body, true),
            None => (payload, false),
        };

        let (ident, path) = match body.split_once(' ') {
            Some((ident, rest)) => (ident, Some(parse_path(rest))),
            None => (body, None),
        };

        Self {
            ident: ident.to_string(),
            path,
            alias,
        }
    }

    /// Build a plain `table.column` reference.
    pub fn column(table: &str, column: &str) -> Self {
        Self {
            ident: format!("{table}.{column}"),
            path: None,
            alias: false,
        }
    }

    /// Build a bare table reference.
    pub fn table(table: &str) -> Self {
        Self {
            ident: table.to_string(),
            path: None,
            alias: false,
        }
    }

    pub fn with_path(mut self, path: JsonPath) -> Self {
        self.path = Some(path);
        self
    }

    pub fn aliased(mut self) -> Self {
        self.alias = true;
        self
    }

    /// The identifier zone, e.g. `users.id`.
    pub fn ident(&self) -> &str {
        &self.ident
    }

    pub fn table_name(&self) -> &str {
        self.ident
            .split_once('.')
            .map_or(self.ident.as_str(), |(table, _)| table)
    }

    pub fn column_name(&self) -> Option<&str> {
        self.ident.split_once('.').map(|(_, column)| column)
    }

    pub fn path(&self) -> Option<&JsonPath> {
        self.path.as_ref()
    }

    pub fn is_alias(&self) -> bool {
        self.alias
    }

    /// Render the SQL text for this reference.
    ///
    /// An alias renders the text between the first `.` and the trailing `-`
    /// (empty when the reference has no `.`). Otherwise the path decides:
    /// dot paths render as a quoted literal only, arrow paths are appended
    /// to the identifier with each key quoted.
    pub fn render(&self) -> String {
        if self.alias {
            return self.alias_text();
        }

        let ident = self.ident.clone();

        match &self.path {
            None => ident,
            Some(JsonPath::Dot(path)) => quote_literal(path),
            Some(JsonPath::Arrow(steps)) => {
                let mut out = ident;
                for step in steps {
                    out.push_str(step.op.as_str());
                    out.push_str(&quote_literal(&step.key));
                }
                out
            }
            Some(JsonPath::Verbatim(rest)) => format!("{ident} {rest}"),
        }
    }

    fn alias_text(&self) -> String {
        // Everything after the first '.', including any path zone.
        let mut body = self.ident.clone();
        if let Some(path) = &self.path {
            body.push(' ');
            body.push_str(&path.to_string());
        }
        body.split_once('.')
            .map(|(_, rest)| rest.to_string())
            .unwrap_or_default()
    }
}

impl fmt::Display for JsonPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JsonPath::Arrow(steps) => {
                for step in steps {
                    write!(f, "{}{}", step.op.as_str(), step.key)?;
                }
                Ok(())
            }
            JsonPath::Dot(path) | JsonPath::Verbatim(path) => f.write_str(path),
        }
    }
}

/// Source form of the reference, without the leading `@`.
impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.ident)?;
        if let Some(path) = &self.path {
            write!(f, " {path}")?;
        }
        if self.alias {
            f.write_str("-")?;
        }
        Ok(())
    }
}

fn parse_path(rest: &str) -> JsonPath {
    if rest.starts_with("$.") {
        JsonPath::Dot(rest.to_string())
    } else if rest.starts_with("->") {
        JsonPath::Arrow(parse_arrow_steps(rest))
    } else {
        JsonPath::Verbatim(rest.to_string())
    }
}

fn parse_arrow_steps(path: &str) -> Vec<ArrowStep> {
    let starts: Vec<usize> = path.match_indices("->").map(|(i, _)| i).collect();
    let mut steps = Vec::with_capacity(starts.len());

    for (n, &start) in starts.iter().enumerate() {
        let end = starts.get(n + 1).copied().unwrap_or(path.len());
        let segment = &path[start + 2..end];
        let step = match segment.strip_prefix('>') {
            Some(key) => ArrowStep {
                op: Arrow::Text,
                key: key.to_string(),
            },
            None => ArrowStep {
                op: Arrow::Json,
                key: segment.to_string(),
            },
        };
        steps.push(step);
    }

    steps
}

/// Wrap `value` in single quotes, doubling embedded quotes.
pub(crate) fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

pub(crate) fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}
