use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Utc};
use validator::Validate;

use crate::data::{Filters, Movie};

/// Field name -> first failure message for that field.
pub type FieldErrors = BTreeMap<String, String>;

#[derive(Debug, Validate)]
struct MovieRules {
    #[validate(length(max = 500, message = "must not be more than 500 characters long"))]
    title: String,
    #[validate(range(min = 1888, message = "must be greater than 1888"))]
    year: i32,
    #[validate(range(min = 1, message = "must be a positive integer"))]
    runtime: i32,
    #[validate(length(max = 5, message = "must not contain more than 5 genres"))]
    genres: Vec<String>,
}

#[derive(Debug, Validate)]
struct FilterRules {
    #[validate(range(min = 1, message = "must be greater than zero"))]
    page: i64,
    #[validate(range(min = 1, message = "must be greater than zero"))]
    page_size: i64,
}

fn check(errors: &mut FieldErrors, ok: bool, field: &str, message: &str) {
    if !ok {
        errors.entry(field.to_string()).or_insert_with(|| message.to_string());
    }
}

/// Checks a movie before it is written, collecting one message per field.
pub fn validate_movie(movie: &Movie) -> Result<(), FieldErrors> {
    let mut errors = FieldErrors::new();

    check(&mut errors, !movie.title.is_empty(), "title", "must be provided");
    check(&mut errors, movie.year != 0, "year", "must be provided");
    check(&mut errors, !movie.runtime.is_zero(), "runtime", "must be provided");
    check(&mut errors, !movie.genres.is_empty(), "genres", "must contain at least 1 genre");

    let rules = MovieRules {
        title: movie.title.clone(),
        year: movie.year,
        runtime: movie.runtime.0,
        genres: movie.genres.clone(),
    };
    if let Err(failures) = rules.validate() {
        merge_first(&mut errors, &failures);
    }

    check(&mut errors, movie.year <= Utc::now().year(), "year", "must not be in the future");
    check(&mut errors, is_unique(&movie.genres), "genres", "must not contain duplicate values");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Checks paging bounds and that `sort` is in the safelist. Messages already
/// in `errors` (for instance from parsing the query string) take precedence.
pub fn validate_filters(filters: &Filters, mut errors: FieldErrors) -> Result<(), FieldErrors> {
    let rules = FilterRules {
        page: filters.page,
        page_size: filters.page_size,
    };
    if let Err(failures) = rules.validate() {
        merge_first(&mut errors, &failures);
    }

    check(&mut errors, filters.page <= 10_000_000, "page", "must be a maximum of 10 million");
    check(&mut errors, filters.page_size <= 100, "page_size", "must be a maximum of 100");
    check(&mut errors, filters.sort_is_safe(), "sort", "invalid sort value");

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn merge_first(errors: &mut FieldErrors, failures: &validator::ValidationErrors) {
    for (field, failed) in failures.field_errors() {
        if let Some(first) = failed.first() {
            let message = first
                .message
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| first.code.to_string());
            errors.entry(field.to_string()).or_insert(message);
        }
    }
}

fn is_unique(values: &[String]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|value| seen.insert(value))
}
