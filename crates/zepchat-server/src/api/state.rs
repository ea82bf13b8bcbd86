use std::sync::Arc;

use crate::answer::AnswerSource;

/// Application state shared across all API handlers
#[derive(Clone)]
pub struct AppState {
    pub answers: Arc<dyn AnswerSource>,
}

impl AppState {
    pub fn new(answers: Arc<dyn AnswerSource>) -> Self {
        Self { answers }
    }
}
