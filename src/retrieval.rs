use std::collections::HashMap;

use crate::error::RetrievalError;
use crate::executor::{QueryExecutor, Table};
use crate::models::{KolTagCount, Mode, Platform, PostTagRow};
use crate::planner::{self, LOOK_BACK_WEEKS};
use crate::tags;
use crate::template::QueryParams;
use crate::week::{WeekId, WeekRange};

const TAG_TEMPLATE: &str = "post_renata_autotag.sql";
const FOLLOWER_TEMPLATE: &str = "follower_count.sql";
const INFERENCE_FOLLOWER_TEMPLATE: &str = "inference_follower_count.sql";
const PROPERTY_TEMPLATE: &str = "post_property.sql";
const CONTENT_TEMPLATE: &str = "post_content.sql";

/// Entry points over the warehouse templates.
///
/// Every method checks that `end_week` is after `start_week` before any query
/// runs.
pub struct Retriever<E> {
    executor: E,
}

impl<E: QueryExecutor + Sync> Retriever<E> {
    pub fn new(executor: E) -> Self {
        Self { executor }
    }

    /// Post timing, with six extra weeks of history for the baseline.
    pub async fn post_time(
        &self,
        platform: Platform,
        start_week: WeekId,
        end_week: WeekId,
        country_name: &str,
    ) -> Result<Table, RetrievalError> {
        let range = WeekRange::new(start_week, end_week)?;
        let params = history_params(platform, range, country_name);
        self.executor
            .execute(&format!("post_time_{platform}.sql"), params)
            .await
    }

    /// Post metrics. Each platform has its own template because the weighted
    /// score is computed differently.
    pub async fn post_metrics(
        &self,
        platform: Platform,
        start_week: WeekId,
        end_week: WeekId,
        country_name: &str,
    ) -> Result<Table, RetrievalError> {
        let range = WeekRange::new(start_week, end_week)?;
        let params = history_params(platform, range, country_name);
        self.executor
            .execute(&format!("retrieve_post_{platform}.sql"), params)
            .await
    }

    pub async fn tag_counts(
        &self,
        platform: Platform,
        post_to_kol: &HashMap<String, i64>,
        start_week: WeekId,
        end_week: WeekId,
    ) -> Result<Vec<KolTagCount>, RetrievalError> {
        let range = WeekRange::new(start_week, end_week)?;
        let table = self
            .executor
            .execute(TAG_TEMPLATE, range_params(platform, range))
            .await?;
        let rows: Vec<PostTagRow> = table.decode("post tag")?;
        let counts = tags::aggregate_tags(&rows, post_to_kol)?;
        tracing::info!(posts = rows.len(), counts = counts.len(), "aggregated post tags");
        Ok(counts)
    }

    pub async fn follower_count(
        &self,
        platform: Platform,
        start_week: WeekId,
        end_week: WeekId,
        mode: Mode,
    ) -> Result<Table, RetrievalError> {
        let window = planner::plan_follower_window(start_week, end_week, mode)?;
        let template = match mode {
            Mode::Historical => FOLLOWER_TEMPLATE,
            Mode::Inference => INFERENCE_FOLLOWER_TEMPLATE,
        };

        let params = QueryParams::new()
            .with("platform", platform)
            .with("historical_start_week", window.data_start_week)
            .with("predict_future_week", window.data_end_week)
            .with("start_week", window.request_start_week)
            .with("end_week", window.request_end_week);

        self.executor.execute(template, params).await
    }

    pub async fn post_properties(
        &self,
        platform: Platform,
        start_week: WeekId,
        end_week: WeekId,
    ) -> Result<Table, RetrievalError> {
        let range = WeekRange::new(start_week, end_week)?;
        self.executor
            .execute(PROPERTY_TEMPLATE, range_params(platform, range))
            .await
    }

    pub async fn post_content(
        &self,
        platform: Platform,
        start_week: WeekId,
        end_week: WeekId,
    ) -> Result<Table, RetrievalError> {
        let range = WeekRange::new(start_week, end_week)?;
        self.executor
            .execute(CONTENT_TEMPLATE, range_params(platform, range))
            .await
    }
}

fn range_params(platform: Platform, range: WeekRange) -> QueryParams {
    QueryParams::new()
        .with("platform", platform)
        .with("start_week", range.start())
        .with("end_week", range.end())
}

fn history_params(platform: Platform, range: WeekRange, country_name: &str) -> QueryParams {
    QueryParams::new()
        .with("platform", platform)
        .with("start_week", range.start().shift_weeks(-LOOK_BACK_WEEKS))
        .with("end_week", range.end())
        .with("zh_country_name", country_name)
}
