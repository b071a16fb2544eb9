use thiserror::Error;

use crate::week::WeekId;

/// Errors raised while rendering a query template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template name '{0}' must be a bare file name")]
    InvalidName(String),

    #[error("failed to read template {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },

    #[error("template {template} references missing parameter '{param}'")]
    MissingParam { template: String, param: String },
}

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("end week {end} must be after start week {start}")]
    InvalidRange { start: WeekId, end: WeekId },

    #[error("invalid week identifier '{0}': expected <4-digit year><week 0-53>")]
    Format(String),

    #[error("malformed tag data for post {post_id}: {source}")]
    MalformedTagData {
        post_id: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("could not decode {context} row: {source}")]
    RowDecode {
        context: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Template(#[from] TemplateError),

    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
}

/// Errors from the Twitter/X statistics client.
#[derive(Debug, Error)]
pub enum TwitterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL '{url}': {reason}")]
    BaseUrl { url: String, reason: String },

    #[error("request signing failed: {0}")]
    Signing(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
