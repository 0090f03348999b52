//! Content-based recommendations over the catalog.
//!
//! A query picks a seed book by title, candidates are gathered from books
//! sharing the seed's authors, genres or publisher, then ranked by how many
//! of those fields match exactly and by popularity.

use std::{cmp::Ordering, collections::HashSet};

use tracing::debug;

use crate::{
    error::{AppError, AppResult},
    model::{Book, BookSummary, RecommendationQuery, RecommendationsResp, RecommendedBookOut},
    repo::dataset::Dataset,
};

pub const RECOMMENDATION_LIMIT: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate<'a> {
    /// Position of the record in the catalog.
    pub row: usize,
    pub book: &'a Book,
    pub match_score: u8,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ranking<'a> {
    pub seed_row: usize,
    pub seed: &'a Book,
    /// Every candidate, best first. Not truncated.
    pub candidates: Vec<ScoredCandidate<'a>>,
}

impl<'a> Ranking<'a> {
    pub fn top(&self) -> impl Iterator<Item = &ScoredCandidate<'a>> + '_ {
        self.candidates.iter().take(RECOMMENDATION_LIMIT)
    }
}

/// Top recommendations for the first book whose title contains `query_title`.
/// An empty result means no title matched.
pub fn recommend(dataset: &Dataset, query_title: &str) -> Vec<BookSummary> {
    match rank(dataset, query_title) {
        Some(ranking) => ranking.top().map(|c| c.book.summary()).collect(),
        None => Vec::new(),
    }
}

/// Recommendations for an HTTP query. A missing or empty title is rejected
/// here. Anything else, whitespace included, is searched as a substring.
pub fn recommend_for_title(
    dataset: &Dataset,
    query: RecommendationQuery,
) -> AppResult<RecommendationsResp> {
    let title = query
        .title
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::BadRequest("please enter a valid book title".to_string()))?;

    let Some(ranking) = rank(dataset, &title) else {
        tracing::info!(query = %title, "no book title matched");
        return Ok(RecommendationsResp {
            query: title,
            found: false,
            seed: None,
            count: 0,
            items: Vec::new(),
        });
    };

    let items: Vec<RecommendedBookOut> = ranking
        .top()
        .enumerate()
        .map(|(i, candidate)| {
            let BookSummary {
                title,
                authors,
                publisher,
                genres,
            } = candidate.book.summary();
            RecommendedBookOut {
                rank: i + 1,
                index: candidate.row + 1,
                title,
                authors,
                publisher,
                genres,
            }
        })
        .collect();

    tracing::info!(
        query = %title,
        seed_row = ranking.seed_row,
        count = items.len(),
        "recommendations served"
    );

    Ok(RecommendationsResp {
        query: title,
        found: true,
        seed: Some(ranking.seed.summary()),
        count: items.len(),
        items,
    })
}

pub fn rank<'a>(dataset: &'a Dataset, query_title: &str) -> Option<Ranking<'a>> {
    let books = dataset.books();
    let query = query_title.to_lowercase();

    let (seed_row, seed) = books
        .iter()
        .enumerate()
        .find(|(_, book)| contains_lowered(book.title.as_deref(), &query))?;

    let seed_authors = seed.authors.as_deref().map(str::to_lowercase);
    let seed_genres = seed.genres.as_deref().map(str::to_lowercase);
    let seed_publisher = seed.publisher.as_deref().map(str::to_lowercase);

    // Union of author, genre and publisher matches, in that order.
    let passes: [(fn(&Book) -> Option<&str>, Option<&str>); 3] = [
        (|b| b.authors.as_deref(), seed_authors.as_deref()),
        (|b| b.genres.as_deref(), seed_genres.as_deref()),
        (|b| b.publisher.as_deref(), seed_publisher.as_deref()),
    ];

    let mut seen = HashSet::new();
    let mut candidates = Vec::new();
    for (field, needle) in passes {
        let Some(needle) = needle else {
            continue;
        };
        for (row, book) in books.iter().enumerate() {
            if contains_lowered(field(book), needle) && seen.insert(RowKey::of(book)) {
                candidates.push((row, book));
            }
        }
    }

    let mut candidates: Vec<ScoredCandidate<'a>> = candidates
        .into_iter()
        .filter(|(_, book)| book.title != seed.title)
        .map(|(row, book)| ScoredCandidate {
            row,
            book,
            match_score: match_score(seed, book),
        })
        .collect();

    candidates.sort_by(|a, b| {
        b.match_score
            .cmp(&a.match_score)
            .then_with(|| compare_ratings(b.book.ratings_count, a.book.ratings_count))
    });

    debug!(
        query = query_title,
        seed_row,
        seed_title = seed.title.as_deref().unwrap_or_default(),
        candidates = candidates.len(),
        "recommendation ranked"
    );

    Some(Ranking {
        seed_row,
        seed,
        candidates,
    })
}

/// Number of fields (authors, genres, publisher) equal to the seed's. Missing
/// values never count.
pub fn match_score(seed: &Book, candidate: &Book) -> u8 {
    [
        (&seed.authors, &candidate.authors),
        (&seed.genres, &candidate.genres),
        (&seed.publisher, &candidate.publisher),
    ]
    .into_iter()
    .filter(|(a, b)| matches!((a, b), (Some(a), Some(b)) if a == b))
    .count() as u8
}

fn contains_lowered(haystack: Option<&str>, lowered_needle: &str) -> bool {
    haystack.is_some_and(|h| h.to_lowercase().contains(lowered_needle))
}

// Missing ratings sort below any present value.
fn compare_ratings(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.total_cmp(&b),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

#[derive(PartialEq, Eq, Hash)]
struct RowKey<'a> {
    title: Option<&'a str>,
    authors: Option<&'a str>,
    publisher: Option<&'a str>,
    genres: Option<&'a str>,
    ratings_count: Option<u64>,
    description: Option<&'a str>,
    published_date: Option<&'a str>,
}

impl<'a> RowKey<'a> {
    fn of(book: &'a Book) -> Self {
        Self {
            title: book.title.as_deref(),
            authors: book.authors.as_deref(),
            publisher: book.publisher.as_deref(),
            genres: book.genres.as_deref(),
            ratings_count: book.ratings_count.map(f64::to_bits),
            description: book.description.as_deref(),
            published_date: book.published_date.as_deref(),
        }
    }
}
