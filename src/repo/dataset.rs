use std::{
    borrow::Cow,
    path::{Path, PathBuf},
    time::Instant,
};

use chardetng::EncodingDetector;
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord};
use encoding_rs::{Encoding, UTF_8};
use reqwest::{Client, StatusCode};
use thiserror::Error;
use tracing::{debug, info, warn};
use url::Url;

use crate::{config::DatasetSource, model::Book};

pub const TITLE: &str = "title";
pub const AUTHORS: &str = "authors";
pub const PUBLISHER: &str = "publisher";
pub const GENRES: &str = "genres";
pub const RATINGS_COUNT: &str = "ratingsCount";
pub const DESCRIPTION: &str = "description";
pub const PUBLISHED_DATE: &str = "publishedDate";

pub const REQUIRED_COLUMNS: [&str; 5] = [TITLE, AUTHORS, PUBLISHER, GENRES, RATINGS_COUNT];

/// Every column the catalog understands, in canonical order.
pub const SCHEMA_COLUMNS: [&str; 7] = [
    TITLE,
    DESCRIPTION,
    AUTHORS,
    PUBLISHER,
    PUBLISHED_DATE,
    GENRES,
    RATINGS_COUNT,
];

#[derive(Error, Debug)]
pub enum DataLoadError {
    #[error("failed to read dataset file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to fetch dataset: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("dataset request to {url} returned {status}")]
    HttpStatus { url: String, status: StatusCode },
    #[error("malformed dataset csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("dataset is missing required columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),
    #[error("invalid {column} value {value:?} on line {line}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

/// The book catalog. Built once at startup and never mutated afterwards.
#[derive(Debug, Clone)]
pub struct Dataset {
    books: Vec<Book>,
    columns: Vec<String>,
    source: String,
    loaded_at: DateTime<Utc>,
}

impl Dataset {
    pub fn new(books: Vec<Book>, columns: Vec<String>, source: impl Into<String>) -> Self {
        Self {
            books,
            columns,
            source: source.into(),
            loaded_at: Utc::now(),
        }
    }

    /// Catalog carrying the full schema, for records built in memory.
    pub fn from_books(books: Vec<Book>) -> Self {
        let columns = SCHEMA_COLUMNS.iter().map(|c| c.to_string()).collect();
        Self::new(books, columns, "memory")
    }

    pub fn books(&self) -> &[Book] {
        &self.books
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.books.len()
    }

    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }
}

pub async fn load(source: &DatasetSource, client: &Client) -> Result<Dataset, DataLoadError> {
    let started = Instant::now();
    let bytes = match source {
        DatasetSource::File(path) => read_file(path).await?,
        DatasetSource::Remote(url) => fetch_remote(client, url).await?,
    };
    debug!(%source, bytes = bytes.len(), "dataset bytes read");

    let dataset = parse_csv(&bytes, source.to_string())?;
    info!(
        %source,
        rows = dataset.len(),
        columns = dataset.columns().len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "dataset loaded"
    );

    Ok(dataset)
}

async fn read_file(path: &Path) -> Result<Vec<u8>, DataLoadError> {
    tokio::fs::read(path)
        .await
        .map_err(|source| DataLoadError::Io {
            path: path.to_path_buf(),
            source,
        })
}

async fn fetch_remote(client: &Client, url: &Url) -> Result<Vec<u8>, DataLoadError> {
    let resp = client.get(url.clone()).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(DataLoadError::HttpStatus {
            url: url.to_string(),
            status,
        });
    }

    Ok(resp.bytes().await?.to_vec())
}

/// Parse CSV bytes into a catalog, keeping row order.
pub fn parse_csv(bytes: &[u8], source: String) -> Result<Dataset, DataLoadError> {
    let text = decode_text(bytes);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let layout = ColumnLayout::from_headers(&headers)?;

    let mut books = Vec::new();
    for result in reader.records() {
        let record = result?;
        books.push(layout.book(&record)?);
    }

    Ok(Dataset::new(books, layout.present, source))
}

struct ColumnLayout {
    title: usize,
    authors: usize,
    publisher: usize,
    genres: usize,
    ratings_count: usize,
    description: Option<usize>,
    published_date: Option<usize>,
    present: Vec<String>,
}

impl ColumnLayout {
    fn from_headers(headers: &StringRecord) -> Result<Self, DataLoadError> {
        let position = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<String> = REQUIRED_COLUMNS
            .iter()
            .filter(|&&name| position(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(DataLoadError::MissingColumns(missing));
        }

        let mut present: Vec<String> = Vec::new();
        for header in headers.iter().map(str::trim) {
            if SCHEMA_COLUMNS.contains(&header) && !present.iter().any(|p| p == header) {
                present.push(header.to_string());
            } else if !SCHEMA_COLUMNS.contains(&header) {
                debug!(column = header, "ignoring unknown dataset column");
            }
        }

        let required = |name: &str| {
            position(name).ok_or_else(|| DataLoadError::MissingColumns(vec![name.to_string()]))
        };

        Ok(Self {
            title: required(TITLE)?,
            authors: required(AUTHORS)?,
            publisher: required(PUBLISHER)?,
            genres: required(GENRES)?,
            ratings_count: required(RATINGS_COUNT)?,
            description: position(DESCRIPTION),
            published_date: position(PUBLISHED_DATE),
            present,
        })
    }

    fn book(&self, record: &StringRecord) -> Result<Book, DataLoadError> {
        let text = |idx: usize| {
            record
                .get(idx)
                .filter(|v| !v.trim().is_empty())
                .map(str::to_string)
        };

        let ratings_count = match text(self.ratings_count) {
            Some(raw) => {
                let value = raw.trim().parse::<f64>().map_err(|_| DataLoadError::InvalidValue {
                    line: record.position().map(|p| p.line()).unwrap_or_default(),
                    column: RATINGS_COUNT,
                    value: raw.clone(),
                })?;
                Some(value).filter(|v| !v.is_nan())
            }
            None => None,
        };

        Ok(Book {
            title: text(self.title),
            authors: text(self.authors),
            publisher: text(self.publisher),
            genres: text(self.genres),
            ratings_count,
            description: self.description.and_then(text),
            published_date: self.published_date.and_then(text),
        })
    }
}

fn decode_text(bytes: &[u8]) -> Cow<'_, str> {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return transcode(encoding, &bytes[bom_len..]);
    }

    if let Some(text) = UTF_8.decode_without_bom_handling_and_without_replacement(bytes) {
        return text;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    transcode(detector.guess(None, true), bytes)
}

fn transcode<'a>(encoding: &'static Encoding, bytes: &'a [u8]) -> Cow<'a, str> {
    let (text, had_errors) = encoding.decode_without_bom_handling(bytes);
    if had_errors {
        warn!(
            encoding = encoding.name(),
            "dataset contains bytes invalid for detected encoding"
        );
    } else if encoding != UTF_8 {
        debug!(encoding = encoding.name(), "dataset transcoded to utf-8");
    }
    text
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use axum::{routing::get, Router};
    use tokio::net::TcpListener;

    use super::*;

    const SAMPLE: &str = "\
title,description,authors,publisher,publishedDate,genres,ratingsCount
Dune,Desert planet,Frank Herbert,Ace,1965,Sci-Fi,500
Dune Messiah,,Frank Herbert,Ace,1969,Sci-Fi,200
\"Foundation, Book One\",Empire falls,Isaac Asimov,Gnome,1951,Sci-Fi,
";

    #[test]
    fn parses_rows_in_source_order() {
        let dataset = parse_csv(SAMPLE.as_bytes(), "inline".to_string()).unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.source(), "inline");
        assert_eq!(dataset.columns(), &SCHEMA_COLUMNS.map(String::from));

        let titles: Vec<_> = dataset
            .books()
            .iter()
            .map(|b| b.title.as_deref().unwrap())
            .collect();
        assert_eq!(titles, ["Dune", "Dune Messiah", "Foundation, Book One"]);
        assert_eq!(dataset.books()[0].ratings_count, Some(500.0));
    }

    #[test]
    fn empty_cells_are_missing() {
        let dataset = parse_csv(SAMPLE.as_bytes(), "inline".to_string()).unwrap();

        assert_eq!(dataset.books()[1].description, None);
        assert_eq!(dataset.books()[2].ratings_count, None);
    }

    #[test]
    fn whitespace_only_cells_are_missing() {
        let csv = "title,authors,publisher,genres,ratingsCount\nDune,Frank Herbert,   ,Sci-Fi, \n";
        let dataset = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap();

        let book = &dataset.books()[0];
        assert_eq!(book.publisher, None);
        assert_eq!(book.ratings_count, None);
    }

    #[test]
    fn optional_columns_may_be_absent() {
        let csv = "genres,title,ratingsCount,authors,publisher\nSci-Fi,Dune,3.5,Frank Herbert,Ace\n";
        let dataset = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap();

        assert_eq!(
            dataset.columns(),
            ["genres", "title", "ratingsCount", "authors", "publisher"]
        );
        let book = &dataset.books()[0];
        assert_eq!(book.title.as_deref(), Some("Dune"));
        assert_eq!(book.genres.as_deref(), Some("Sci-Fi"));
        assert_eq!(book.ratings_count, Some(3.5));
        assert_eq!(book.description, None);
        assert_eq!(book.published_date, None);
    }

    #[test]
    fn unknown_columns_are_ignored() {
        let csv = "title,authors,publisher,genres,ratingsCount,image\nDune,Frank Herbert,Ace,Sci-Fi,1,cover.png\n";
        let dataset = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap();

        assert!(!dataset.columns().iter().any(|c| c == "image"));
        assert_eq!(dataset.len(), 1);
    }

    #[test]
    fn reports_every_missing_required_column() {
        let csv = "title,authors,description\nDune,Frank Herbert,Desert\n";
        let err = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap_err();

        match err {
            DataLoadError::MissingColumns(missing) => {
                assert_eq!(missing, ["publisher", "genres", "ratingsCount"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_non_numeric_ratings_count() {
        let csv = "title,authors,publisher,genres,ratingsCount\nDune,Frank Herbert,Ace,Sci-Fi,many\n";
        let err = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap_err();

        match err {
            DataLoadError::InvalidValue {
                line,
                column,
                value,
            } => {
                assert_eq!(line, 2);
                assert_eq!(column, RATINGS_COUNT);
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn rejects_ragged_rows() {
        let csv = "title,authors,publisher,genres,ratingsCount\nDune,Frank Herbert\n";
        let err = parse_csv(csv.as_bytes(), "inline".to_string()).unwrap_err();

        assert!(matches!(err, DataLoadError::Csv(_)));
    }

    #[test]
    fn strips_utf8_bom_from_header() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(b"title,authors,publisher,genres,ratingsCount\nDune,Frank Herbert,Ace,Sci-Fi,1\n");
        let dataset = parse_csv(&bytes, "inline".to_string()).unwrap();

        assert_eq!(dataset.columns()[0], "title");
    }

    #[test]
    fn transcodes_legacy_encodings() {
        let mut bytes = b"title,authors,publisher,genres,ratingsCount\n".to_vec();
        // "Les Misérables" in windows-1252
        bytes.extend_from_slice(b"Les Mis\xE9rables,Victor Hugo,Gallimard,Classics,12\n");
        let dataset = parse_csv(&bytes, "inline".to_string()).unwrap();

        assert_eq!(
            dataset.books()[0].title.as_deref(),
            Some("Les Misérables")
        );
    }

    #[test]
    fn honours_utf16_byte_order_mark() {
        let bytes: Vec<u8> = "\u{feff}title,authors,publisher,genres,ratingsCount\nDune,Frank Herbert,Ace,Sci-Fi,7\n"
            .encode_utf16()
            .flat_map(u16::to_le_bytes)
            .collect();
        let dataset = parse_csv(&bytes, "inline".to_string()).unwrap();

        assert_eq!(dataset.columns()[0], "title");
        assert_eq!(dataset.books()[0].authors.as_deref(), Some("Frank Herbert"));
        assert_eq!(dataset.books()[0].ratings_count, Some(7.0));
    }

    async fn serve_catalog() -> Url {
        let app = Router::new().route(
            "/books/data.csv",
            get(|| async { include_str!("../../tests/fixtures/books.csv") }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    #[tokio::test]
    async fn loads_from_remote_url() {
        let base = serve_catalog().await;
        let source = DatasetSource::Remote(base.join("books/data.csv").unwrap());

        let dataset = load(&source, &Client::new()).await.unwrap();

        assert_eq!(dataset.len(), 11);
        assert_eq!(dataset.source(), source.to_string());
        assert_eq!(dataset.books()[0].title.as_deref(), Some("Dune"));
    }

    #[tokio::test]
    async fn remote_error_status_is_a_load_error() {
        let base = serve_catalog().await;
        let source = DatasetSource::Remote(base.join("books/missing.csv").unwrap());

        let err = load(&source, &Client::new()).await.unwrap_err();

        match err {
            DataLoadError::HttpStatus { url, status } => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert!(url.ends_with("/books/missing.csv"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let source = DatasetSource::File(file.path().to_path_buf());
        let dataset = load(&source, &Client::new()).await.unwrap();

        assert_eq!(dataset.len(), 3);
        assert_eq!(dataset.source(), file.path().display().to_string());
    }

    #[tokio::test]
    async fn missing_file_is_a_load_error() {
        let source = DatasetSource::File(PathBuf::from("does/not/exist.csv"));
        let err = load(&source, &Client::new()).await.unwrap_err();

        assert!(matches!(err, DataLoadError::Io { .. }));
    }
}
