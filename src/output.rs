use std::collections::HashMap;
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use serde::Serialize;
use serde_json::Value;

use crate::executor::Table;

/// Reads a `post_id,kol_id` CSV into the post-to-KOL lookup.
pub fn load_kol_map(csv_path: &Path) -> anyhow::Result<HashMap<String, i64>> {
    #[derive(serde::Deserialize)]
    struct MapRow {
        post_id: String,
        kol_id: i64,
    }

    let mut reader = csv::Reader::from_path(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let mut mapping = HashMap::new();

    for result in reader.deserialize::<MapRow>() {
        let row = result?;
        mapping.insert(row.post_id, row.kol_id);
    }

    Ok(mapping)
}

/// Writes a generic table as CSV. Columns are the union of row keys in the
/// order they are first seen, which is the template's SELECT order. An empty
/// table writes nothing, not even a header.
pub fn write_table<W: Write>(table: &Table, out: W) -> anyhow::Result<()> {
    tracing::debug!(rows = table.len(), "writing table");
    let mut columns: Vec<&str> = Vec::new();
    for row in table.rows() {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    if table.is_empty() || columns.is_empty() {
        tracing::info!("table has no rows; nothing written");
        return Ok(());
    }

    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(&columns)?;
    for row in table.rows() {
        writer.write_record(columns.iter().map(|column| cell(row.get(*column))))?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_records<T: Serialize, W: Write>(records: &[T], out: W) -> anyhow::Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(text)) => text.clone(),
        Some(other) => other.to_string(),
    }
}
