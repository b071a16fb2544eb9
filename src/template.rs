//! Rendering of `.sql` query templates.
//!
//! Templates use `{{ name }}` placeholders. Integers render bare, text renders
//! as a quoted SQL literal, and identifiers (the warehouse project) render
//! bare so they can qualify table names.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::TemplateError;
use crate::models::Platform;
use crate::week::WeekId;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\{\s*([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("placeholder pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Int(i64),
    Text(String),
    Ident(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Int(value) => write!(f, "{value}"),
            ParamValue::Text(value) => write!(f, "'{}'", value.replace('\'', "''")),
            ParamValue::Ident(value) => f.write_str(value),
        }
    }
}

impl From<WeekId> for ParamValue {
    fn from(week: WeekId) -> Self {
        ParamValue::Int(week.raw())
    }
}

impl From<Platform> for ParamValue {
    fn from(platform: Platform) -> Self {
        ParamValue::Text(platform.as_str().to_string())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Text(value.to_string())
    }
}

/// Keyword parameters for one template render.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams(BTreeMap<String, ParamValue>);

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, name: &str, value: impl Into<ParamValue>) -> Self {
        self.0.insert(name.to_string(), value.into());
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<ParamValue>) {
        self.0.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        self.0.get(name)
    }
}

pub fn render(template: &str, source: &str, params: &QueryParams) -> Result<String, TemplateError> {
    let mut rendered = String::with_capacity(source.len());
    let mut last = 0;

    for caps in PLACEHOLDER.captures_iter(source) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let name = name.as_str();
        let value = params.get(name).ok_or_else(|| TemplateError::MissingParam {
            template: template.to_string(),
            param: name.to_string(),
        })?;

        rendered.push_str(&source[last..whole.start()]);
        rendered.push_str(&value.to_string());
        last = whole.end();
    }
    rendered.push_str(&source[last..]);

    Ok(rendered)
}

/// Loads templates by bare file name from a single directory.
#[derive(Debug, Clone)]
pub struct TemplateStore {
    dir: PathBuf,
}

impl TemplateStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn render(&self, name: &str, params: &QueryParams) -> Result<String, TemplateError> {
        if name.is_empty() || name.contains(['/', '\\']) || name.starts_with('.') {
            return Err(TemplateError::InvalidName(name.to_string()));
        }

        let path = self.dir.join(name);
        let source = std::fs::read_to_string(&path).map_err(|source| TemplateError::Read {
            name: name.to_string(),
            source,
        })?;

        render(name, &source, params)
    }
}
