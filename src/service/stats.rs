use std::collections::{BTreeMap, HashMap};

use crate::{
    model::{Book, ColumnInfo, ColumnSummary, DatasetFeatures, DatasetOverview},
    repo::dataset::{
        Dataset, AUTHORS, DESCRIPTION, GENRES, PUBLISHED_DATE, PUBLISHER, RATINGS_COUNT, TITLE,
    },
};

const HEAD_ROWS: usize = 5;

const COLUMN_INFO: [ColumnInfo; 7] = [
    ColumnInfo {
        name: TITLE,
        description: "The title of the book.",
    },
    ColumnInfo {
        name: DESCRIPTION,
        description: "A brief description of the book.",
    },
    ColumnInfo {
        name: AUTHORS,
        description: "The names of the authors.",
    },
    ColumnInfo {
        name: PUBLISHER,
        description: "The name of the publisher.",
    },
    ColumnInfo {
        name: PUBLISHED_DATE,
        description: "The date when the book was published.",
    },
    ColumnInfo {
        name: GENRES,
        description: "The genres of the book.",
    },
    ColumnInfo {
        name: RATINGS_COUNT,
        description: "The number of ratings the book has received.",
    },
];

pub fn overview(dataset: &Dataset) -> DatasetOverview {
    DatasetOverview {
        name: "Book Recommender",
        about: "Explore a catalog of books and get recommendations based on author, genre and publisher.",
        source: dataset.source().to_string(),
        loaded_at: dataset.loaded_at().to_rfc3339(),
        rows: dataset.len(),
        columns: COLUMN_INFO
            .into_iter()
            .filter(|info| dataset.columns().iter().any(|c| c == info.name))
            .collect(),
    }
}

pub fn describe_dataset(dataset: &Dataset) -> DatasetFeatures {
    let columns = dataset.columns().to_vec();

    let mut null_counts = BTreeMap::new();
    let mut summary = BTreeMap::new();
    for column in &columns {
        let column_summary = if column == RATINGS_COUNT {
            let values: Vec<f64> = dataset.books().iter().filter_map(|b| b.ratings_count).collect();
            numeric_summary(values)
        } else {
            let Some(field) = text_field(column) else {
                continue;
            };
            text_summary(dataset.books().iter().filter_map(field))
        };

        null_counts.insert(column.clone(), dataset.len() - column_summary.count);
        summary.insert(column.clone(), column_summary);
    }

    DatasetFeatures {
        shape: (dataset.len(), columns.len()),
        columns,
        null_counts,
        head: dataset.books().iter().take(HEAD_ROWS).cloned().collect(),
        summary,
    }
}

fn text_field(column: &str) -> Option<fn(&Book) -> Option<&str>> {
    let field: fn(&Book) -> Option<&str> = match column {
        TITLE => |b| b.title.as_deref(),
        AUTHORS => |b| b.authors.as_deref(),
        PUBLISHER => |b| b.publisher.as_deref(),
        GENRES => |b| b.genres.as_deref(),
        DESCRIPTION => |b| b.description.as_deref(),
        PUBLISHED_DATE => |b| b.published_date.as_deref(),
        _ => return None,
    };
    Some(field)
}

fn text_summary<'a>(values: impl Iterator<Item = &'a str>) -> ColumnSummary {
    let mut count = 0;
    let mut freq: HashMap<&str, (usize, usize)> = HashMap::new();
    for (position, value) in values.enumerate() {
        count += 1;
        freq.entry(value).or_insert((0, position)).0 += 1;
    }

    // Most frequent value; the earliest seen wins ties.
    let top = freq
        .iter()
        .max_by(|a, b| a.1 .0.cmp(&b.1 .0).then(b.1 .1.cmp(&a.1 .1)))
        .map(|(value, (n, _))| (value.to_string(), *n));

    ColumnSummary {
        count,
        unique: Some(freq.len()),
        freq: top.as_ref().map(|(_, n)| *n),
        top: top.map(|(value, _)| value),
        ..ColumnSummary::default()
    }
}

fn numeric_summary(mut values: Vec<f64>) -> ColumnSummary {
    let count = values.len();
    if count == 0 {
        return ColumnSummary::default();
    }

    values.sort_by(f64::total_cmp);
    let mean = values.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let variance =
            values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (count - 1) as f64;
        variance.sqrt()
    });

    ColumnSummary {
        count,
        mean: Some(mean),
        std,
        min: values.first().copied(),
        p25: Some(quantile(&values, 0.25)),
        p50: Some(quantile(&values, 0.5)),
        p75: Some(quantile(&values, 0.75)),
        max: values.last().copied(),
        ..ColumnSummary::default()
    }
}

// Linear interpolation between closest ranks over sorted, non-empty input.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let rank = q * (sorted.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * weight
}
