//! Template lowering.
//!
//! A template is a list of literal segments with one fewer value than
//! segments. Lowering interleaves the segments with resolved values.
//!
//! ```ignore
//! use sqlweave::sql;
//!
//! let text = sql!("SELECT {} FROM {} WHERE {} = {}", "@users.*", "@users", "@users.id", ":id");
//! assert_eq!(text, "SELECT users.* FROM users WHERE users.id = :id");
//! ```

use crate::placeholder::{IntoPlaceholder, LowerOptions, Placeholder, RAW_SENTINEL};

/// Interleave `segments` with resolved `values`.
///
/// Values beyond `segments.len() - 1` are ignored; a `None` value contributes
/// nothing.
pub fn lower<S: AsRef<str>>(segments: &[S], values: &[Option<Placeholder>]) -> String {
    lower_with(segments, values, &LowerOptions::default())
}

pub fn lower_with<S: AsRef<str>>(
    segments: &[S],
    values: &[Option<Placeholder>],
    options: &LowerOptions,
) -> String {
    let mut out = String::new();
    for (i, segment) in segments.iter().enumerate() {
        out.push_str(segment.as_ref());
        if i + 1 == segments.len() {
            break;
        }
        if let Some(Some(value)) = values.get(i) {
            out.push_str(&value.resolve(options));
        }
    }
    out
}

/// Lower a `{}`-delimited template string.
///
/// Used by [`sql!`](crate::sql); each `{}` marks one value slot.
pub fn lower_template(
    template: &str,
    values: Vec<Option<Placeholder>>,
    options: &LowerOptions,
) -> String {
    let segments: Vec<&str> = template.split("{}").collect();
    lower_with(&segments, &values, options)
}

/// Build a template string with `{}` slots.
///
/// Two forms:
///
/// - `sql!("... {} ...", a, b)` lowers with default options
/// - `sql!(helper => "... {} ...", a, b)` lowers with the helper's options
#[macro_export]
macro_rules! sql {
    ($helper:expr => $template:literal $(, $value:expr)* $(,)?) => {
        $helper.sql(
            $template,
            ::std::vec![$($crate::IntoPlaceholder::into_placeholder($value)),*],
        )
    };
    ($template:literal $(, $value:expr)* $(,)?) => {
        $crate::template::lower_template(
            $template,
            ::std::vec![$($crate::IntoPlaceholder::into_placeholder($value)),*],
            &$crate::LowerOptions::default(),
        )
    };
}

/// Mark a string as a raw fragment.
pub fn raw(value: impl AsRef<str>) -> String {
    format!("{RAW_SENTINEL}{}", value.as_ref())
}

/// Raw fragment that is `if_true` when `condition` holds, empty otherwise.
pub fn cond(condition: bool, if_true: impl AsRef<str>) -> String {
    cond_else(condition, if_true, "")
}

/// Raw fragment choosing between `if_true` and `if_false`.
pub fn cond_else(condition: bool, if_true: impl AsRef<str>, if_false: impl AsRef<str>) -> String {
    if condition {
        raw(if_true)
    } else {
        raw(if_false)
    }
}

/// Incremental template builder.
///
/// Keeps the segment/value alternation: text pushed after text is merged
/// into the same segment.
#[derive(Debug, Clone)]
pub struct Template {
    segments: Vec<String>,
    values: Vec<Option<Placeholder>>,
}

impl Default for Template {
    fn default() -> Self {
        Self::new()
    }
}

impl Template {
    pub fn new() -> Self {
        Self {
            segments: vec![String::new()],
            values: Vec::new(),
        }
    }

    /// Append literal SQL text.
    pub fn push(&mut self, text: &str) -> &mut Self {
        if let Some(last) = self.segments.last_mut() {
            last.push_str(text);
        }
        self
    }

    /// Append an interpolated value.
    pub fn value(&mut self, value: impl IntoPlaceholder) -> &mut Self {
        self.values.push(value.into_placeholder());
        self.segments.push(String::new());
        self
    }

    /// Append a value only when `condition` holds.
    pub fn value_if(&mut self, condition: bool, value: impl IntoPlaceholder) -> &mut Self {
        if condition {
            self.value(value);
        }
        self
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn values(&self) -> &[Option<Placeholder>] {
        &self.values
    }

    pub fn finish(&self, options: &LowerOptions) -> String {
        lower_with(&self.segments, &self.values, options)
    }
}

/// Template helper handed to SQL builder closures.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlHelper {
    options: LowerOptions,
}

impl SqlHelper {
    pub fn new(options: LowerOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &LowerOptions {
        &self.options
    }

    /// Lower a `{}`-delimited template.
    pub fn sql(&self, template: &str, values: Vec<Option<Placeholder>>) -> String {
        lower_template(template, values, &self.options)
    }

    pub fn cond(&self, condition: bool, if_true: impl AsRef<str>) -> String {
        cond(condition, if_true)
    }

    pub fn cond_else(
        &self,
        condition: bool,
        if_true: impl AsRef<str>,
        if_false: impl AsRef<str>,
    ) -> String {
        cond_else(condition, if_true, if_false)
    }

    pub fn raw(&self, value: impl AsRef<str>) -> String {
        raw(value)
    }

    pub fn template(&self) -> Template {
        Template::new()
    }

    pub fn finish(&self, template: &Template) -> String {
        template.finish(&self.options)
    }
}

type BuildFn = Box<dyn FnOnce(&SqlHelper) -> String + Send>;

/// SQL given to an entry point: literal text or a closure producing it.
pub enum SqlSource {
    Literal(String),
    Builder(BuildFn),
}

impl SqlSource {
    pub fn render(self, helper: &SqlHelper) -> String {
        match self {
            SqlSource::Literal(sql) => sql,
            SqlSource::Builder(build) => build(helper),
        }
    }
}

/// Wrap a closure that builds SQL with a [`SqlHelper`].
pub fn build<F>(f: F) -> SqlSource
where
    F: FnOnce(&SqlHelper) -> String + Send + 'static,
{
    SqlSource::Builder(Box::new(f))
}

impl std::fmt::Debug for SqlSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SqlSource::Literal(sql) => f.debug_tuple("Literal").field(sql).finish(),
            SqlSource::Builder(_) => f.write_str("Builder(..)"),
        }
    }
}

impl From<&str> for SqlSource {
    fn from(sql: &str) -> Self {
        SqlSource::Literal(sql.to_string())
    }
}

impl From<String> for SqlSource {
    fn from(sql: String) -> Self {
        SqlSource::Literal(sql)
    }
}

impl From<&String> for SqlSource {
    fn from(sql: &String) -> Self {
        SqlSource::Literal(sql.clone())
    }
}
