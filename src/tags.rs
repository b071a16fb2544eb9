use std::collections::{BTreeMap, HashMap};

use crate::error::RetrievalError;
use crate::models::{KolTagCount, PostTagRow, TagEntry};
use crate::week::WeekId;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct TagKey {
    kol_id: i64,
    week_num: WeekId,
    platform: String,
    tag_name: String,
}

/// Folds per-post tag rows into per-KOL, per-week tag counts.
///
/// Rows whose post is missing from `post_to_kol` are skipped. A present
/// `model_output` that is not a JSON list of tags fails the whole batch.
pub fn aggregate_tags(
    rows: &[PostTagRow],
    post_to_kol: &HashMap<String, i64>,
) -> Result<Vec<KolTagCount>, RetrievalError> {
    let mut counts: BTreeMap<TagKey, u32> = BTreeMap::new();

    for row in rows {
        let Some(&kol_id) = post_to_kol.get(&row.post_id) else {
            continue;
        };

        for tag in parse_tags(row)? {
            let key = TagKey {
                kol_id,
                week_num: row.week_num,
                platform: row.platform.clone(),
                tag_name: tag.tag_name,
            };
            *counts.entry(key).or_insert(0) += 1;
        }
    }

    Ok(counts
        .into_iter()
        .map(|(key, times)| KolTagCount {
            kol_id: key.kol_id,
            week_num: key.week_num,
            platform: key.platform,
            post_property: key.tag_name,
            times,
        })
        .collect())
}

fn parse_tags(row: &PostTagRow) -> Result<Vec<TagEntry>, RetrievalError> {
    let Some(raw) = row.model_output.as_deref() else {
        return Ok(Vec::new());
    };

    let tags: Option<Vec<TagEntry>> =
        serde_json::from_str(raw).map_err(|source| RetrievalError::MalformedTagData {
            post_id: row.post_id.clone(),
            source,
        })?;

    Ok(tags.unwrap_or_default())
}
