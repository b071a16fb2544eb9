use std::fmt;

use serde::{Deserialize, Serialize};

use crate::week::WeekId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Platform {
    Fb,
    Ig,
    Yt,
}

impl Platform {
    pub fn as_str(self) -> &'static str {
        match self {
            Platform::Fb => "fb",
            Platform::Ig => "ig",
            Platform::Yt => "yt",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a follower window feeds model training or live inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Historical,
    Inference,
}

impl Mode {
    pub fn from_inference_flag(inference: bool) -> Self {
        if inference {
            Mode::Inference
        } else {
            Mode::Historical
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowerWindow {
    pub data_start_week: WeekId,
    pub data_end_week: WeekId,
    pub request_start_week: WeekId,
    pub request_end_week: WeekId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostTagRow {
    pub post_id: String,
    pub week_num: WeekId,
    pub platform: String,
    #[serde(default)]
    pub model_output: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TagEntry {
    pub tag_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KolTagCount {
    pub kol_id: i64,
    pub week_num: WeekId,
    pub platform: String,
    pub post_property: String,
    pub times: u32,
}
