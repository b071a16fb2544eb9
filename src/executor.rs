use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use sqlx::PgPool;

use crate::error::RetrievalError;
use crate::template::{ParamValue, QueryParams, TemplateStore};

pub type Row = Map<String, Value>;

/// Rows returned by a template query, one JSON object per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    rows: Vec<Row>,
}

impl Table {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn decode<T: DeserializeOwned>(&self, context: &'static str) -> Result<Vec<T>, RetrievalError> {
        self.rows
            .iter()
            .map(|row| {
                serde_json::from_value(Value::Object(row.clone()))
                    .map_err(|source| RetrievalError::RowDecode { context, source })
            })
            .collect()
    }
}

#[async_trait]
pub trait QueryExecutor {
    async fn execute(&self, template: &str, params: QueryParams) -> Result<Table, RetrievalError>;
}

/// Everything the executor needs about the warehouse, built once at startup.
#[derive(Debug, Clone)]
pub struct WarehouseContext {
    pub project: String,
    pub template_dir: PathBuf,
    pub error_dir: PathBuf,
}

/// Writes the text of queries that came back empty to `<dir>/<sha256>.sql`.
#[derive(Debug, Clone)]
pub struct EmptyResultLog {
    dir: PathBuf,
}

impl EmptyResultLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn artifact_path(&self, sql: &str) -> PathBuf {
        let digest = format!("{:x}", Sha256::digest(sql.as_bytes()));
        self.dir.join(format!("{digest}.sql"))
    }

    /// Persists `sql`. Failures are logged and swallowed so an empty result
    /// still reaches the caller.
    pub fn record(&self, sql: &str) -> Option<PathBuf> {
        let path = self.artifact_path(sql);
        match write_artifact(&self.dir, &path, sql) {
            Ok(()) => {
                tracing::warn!(path = %path.display(), "query returned no rows");
                Some(path)
            }
            Err(e) => {
                tracing::warn!(error = %e, "query returned no rows; could not save query text");
                None
            }
        }
    }
}

fn write_artifact(dir: &Path, path: &Path, sql: &str) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)?;
    std::fs::write(path, sql)
}

pub struct WarehouseExecutor {
    pool: PgPool,
    project: String,
    templates: TemplateStore,
    empty_results: EmptyResultLog,
}

impl WarehouseExecutor {
    pub fn new(pool: PgPool, context: WarehouseContext) -> Self {
        Self {
            pool,
            project: context.project,
            templates: TemplateStore::new(context.template_dir),
            empty_results: EmptyResultLog::new(context.error_dir),
        }
    }

    /// Renders `template` with the project injected alongside `params`.
    pub fn render(&self, template: &str, mut params: QueryParams) -> Result<String, RetrievalError> {
        params.insert("project", ParamValue::Ident(self.project.clone()));
        Ok(self.templates.render(template, &params)?)
    }
}

#[async_trait]
impl QueryExecutor for WarehouseExecutor {
    async fn execute(&self, template: &str, params: QueryParams) -> Result<Table, RetrievalError> {
        let sql = self.render(template, params)?;
        tracing::debug!(template, sql = %sql, "running template query");

        let records: Vec<Value> = sqlx::query_scalar(&wrap_as_json(&sql))
            .fetch_all(&self.pool)
            .await?;

        Ok(collect_rows(template, &sql, records, &self.empty_results))
    }
}

/// Keeps the JSON object rows; an empty result saves `sql` to `empty_results`.
fn collect_rows(
    template: &str,
    sql: &str,
    records: Vec<Value>,
    empty_results: &EmptyResultLog,
) -> Table {
    let rows: Vec<Row> = records
        .into_iter()
        .filter_map(|record| match record {
            Value::Object(row) => Some(row),
            _ => None,
        })
        .collect();

    if rows.is_empty() {
        empty_results.record(sql);
    } else {
        tracing::info!(template, rows = rows.len(), "template query complete");
    }

    Table::new(rows)
}

fn wrap_as_json(sql: &str) -> String {
    let inner = sql.trim().trim_end_matches(';');
    format!("SELECT row_to_json(q) FROM ({inner}) AS q")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn artifact_name_is_sha256_of_query_text() {
        let log = EmptyResultLog::new("errors");
        let path = log.artifact_path("abc");
        assert_eq!(
            path,
            PathBuf::from("errors")
                .join("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad.sql")
        );
    }

    #[test]
    fn record_creates_directory_and_dedupes_identical_text() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmptyResultLog::new(dir.path().join("errors"));

        let first = log.record("SELECT 1").expect("artifact written");
        let second = log.record("SELECT 1").expect("artifact written");
        log.record("SELECT 2").expect("artifact written");

        assert_eq!(first, second);
        assert_eq!(std::fs::read_to_string(&first).expect("read"), "SELECT 1");
        let files = std::fs::read_dir(dir.path().join("errors")).expect("dir").count();
        assert_eq!(files, 2);
    }

    #[test]
    fn record_failure_does_not_panic() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blocker = dir.path().join("errors");
        std::fs::write(&blocker, "not a directory").expect("write");

        assert!(EmptyResultLog::new(&blocker).record("SELECT 1").is_none());
    }

    #[test]
    fn empty_result_saves_query_text_and_still_returns() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmptyResultLog::new(dir.path().join("errors"));
        let sql = "SELECT * FROM kol_warehouse.posts WHERE week_num = 202230";

        let table = collect_rows("t.sql", sql, Vec::new(), &log);

        assert!(table.is_empty());
        let saved = std::fs::read_to_string(log.artifact_path(sql)).expect("artifact");
        assert_eq!(saved, sql);
    }

    #[test]
    fn non_empty_result_saves_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = EmptyResultLog::new(dir.path().join("errors"));
        let records = vec![json!({ "kol_id": 5 }), json!(null)];

        let table = collect_rows("t.sql", "SELECT 1", records, &log);

        assert_eq!(table.len(), 1);
        assert!(!dir.path().join("errors").exists());
    }

    #[test]
    fn wraps_query_for_json_rows() {
        assert_eq!(
            wrap_as_json("SELECT 1 AS a;\n"),
            "SELECT row_to_json(q) FROM (SELECT 1 AS a) AS q"
        );
    }

    #[test]
    fn decode_reports_context_on_shape_mismatch() {
        #[derive(Debug, serde::Deserialize)]
        struct Sample {
            #[allow(dead_code)]
            n: i64,
        }

        let row = json!({ "n": "x" }).as_object().cloned().expect("object");
        let err = Table::new(vec![row]).decode::<Sample>("sample").expect_err("bad row");
        assert!(matches!(err, RetrievalError::RowDecode { context: "sample", .. }));
    }

    #[tokio::test]
    async fn render_injects_project() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join("t.sql"), "SELECT * FROM {{ project }}.posts").expect("write");
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .expect("lazy pool");
        let executor = WarehouseExecutor::new(
            pool,
            WarehouseContext {
                project: "kol_warehouse".to_string(),
                template_dir: dir.path().to_path_buf(),
                error_dir: dir.path().join("errors"),
            },
        );

        let sql = executor.render("t.sql", QueryParams::new()).expect("render");
        assert_eq!(sql, "SELECT * FROM kol_warehouse.posts");
    }

    #[test]
    fn shipped_templates_render_with_facade_params() {
        let store = TemplateStore::new(Path::new(env!("CARGO_MANIFEST_DIR")).join("queries"));
        let params = QueryParams::new()
            .with("project", ParamValue::Ident("kol_warehouse".to_string()))
            .with("platform", "fb")
            .with("start_week", ParamValue::Int(202222))
            .with("end_week", ParamValue::Int(202230))
            .with("historical_start_week", ParamValue::Int(202222))
            .with("predict_future_week", ParamValue::Int(202238))
            .with("zh_country_name", "台灣");

        let templates = [
            "post_time_fb.sql",
            "post_time_ig.sql",
            "post_time_yt.sql",
            "retrieve_post_fb.sql",
            "retrieve_post_ig.sql",
            "retrieve_post_yt.sql",
            "post_renata_autotag.sql",
            "follower_count.sql",
            "inference_follower_count.sql",
            "post_property.sql",
            "post_content.sql",
        ];
        for name in templates {
            let sql = store.render(name, &params).expect(name);
            assert!(!sql.contains("{{"), "{name} left a placeholder");
            assert!(sql.contains("kol_warehouse."), "{name} is not project-qualified");
        }
    }
}
