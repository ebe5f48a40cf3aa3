use serde::Serialize;

use crate::data::Movie;

/// `{"movie": {...}}`
#[derive(Debug, Serialize)]
pub struct MovieEnvelope {
    pub movie: Movie,
}

impl MovieEnvelope {
    pub fn new(movie: Movie) -> Self {
        Self { movie }
    }
}

/// `{"movies": [...]}`
#[derive(Debug, Serialize)]
pub struct MoviesEnvelope {
    pub movies: Vec<Movie>,
}

impl MoviesEnvelope {
    pub fn new(movies: Vec<Movie>) -> Self {
        Self { movies }
    }
}

/// `{"message": "..."}`
#[derive(Debug, Serialize)]
pub struct MessageEnvelope {
    pub message: String,
}

impl MessageEnvelope {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
