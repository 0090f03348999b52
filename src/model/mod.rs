use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One row of the book catalog. Cells that were empty in the source are `None`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Book {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub genres: Option<String>,
    #[serde(rename = "ratingsCount")]
    pub ratings_count: Option<f64>,
    pub description: Option<String>,
    #[serde(rename = "publishedDate")]
    pub published_date: Option<String>,
}

impl Book {
    pub fn summary(&self) -> BookSummary {
        BookSummary {
            title: self.title.clone(),
            authors: self.authors.clone(),
            publisher: self.publisher.clone(),
            genres: self.genres.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BookSummary {
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub genres: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendedBookOut {
    pub rank: usize,
    /// 1-based row of the book in the catalog.
    pub index: usize,
    pub title: Option<String>,
    pub authors: Option<String>,
    pub publisher: Option<String>,
    pub genres: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RecommendationsResp {
    pub query: String,
    pub found: bool,
    pub seed: Option<BookSummary>,
    pub count: usize,
    pub items: Vec<RecommendedBookOut>,
}

#[derive(Debug, Deserialize)]
pub struct RecommendationQuery {
    pub title: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ColumnInfo {
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DatasetOverview {
    pub name: &'static str,
    pub about: &'static str,
    pub source: String,
    pub loaded_at: String,
    pub rows: usize,
    pub columns: Vec<ColumnInfo>,
}

#[derive(Debug, Serialize)]
pub struct DatasetFeatures {
    pub shape: (usize, usize),
    pub columns: Vec<String>,
    pub null_counts: BTreeMap<String, usize>,
    pub head: Vec<Book>,
    pub summary: BTreeMap<String, ColumnSummary>,
}

/// Descriptive statistics for one column. Text columns fill the frequency
/// fields, the numeric column fills the distribution fields.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unique: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub freq: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub std: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(rename = "25%", skip_serializing_if = "Option::is_none")]
    pub p25: Option<f64>,
    #[serde(rename = "50%", skip_serializing_if = "Option::is_none")]
    pub p50: Option<f64>,
    #[serde(rename = "75%", skip_serializing_if = "Option::is_none")]
    pub p75: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}
