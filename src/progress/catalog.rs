//! Lesson catalog collaborator. Content authoring lives elsewhere; the engine
//! only asks which lessons belong to a category.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonMeta {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub title: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryProgress {
    pub total: usize,
    pub completed: usize,
}

impl CategoryProgress {
    /// An empty category is never complete.
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.completed == self.total
    }

    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.completed as f64 / self.total as f64
    }
}

pub trait LessonCatalog: Send + Sync {
    fn lessons_in_category(&self, category: &str) -> Vec<String>;

    fn category_progress(&self, category: &str, completed: &BTreeSet<String>) -> CategoryProgress {
        let members = self.lessons_in_category(category);
        let done = members.iter().filter(|id| completed.contains(*id)).count();
        CategoryProgress {
            total: members.len(),
            completed: done,
        }
    }
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read lesson catalog: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse lesson catalog: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory catalog, optionally loaded from a JSON array of lessons.
#[derive(Debug, Clone, Default)]
pub struct StaticLessonCatalog {
    lessons: Vec<LessonMeta>,
}

impl StaticLessonCatalog {
    pub fn new(lessons: Vec<LessonMeta>) -> Self {
        Self { lessons }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let raw = std::fs::read(path)?;
        let lessons: Vec<LessonMeta> = serde_json::from_slice(&raw)?;
        Ok(Self::new(lessons))
    }

    pub fn len(&self) -> usize {
        self.lessons.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lessons.is_empty()
    }
}

impl LessonCatalog for StaticLessonCatalog {
    fn lessons_in_category(&self, category: &str) -> Vec<String> {
        self.lessons
            .iter()
            .filter(|l| l.category == category)
            .map(|l| l.id.clone())
            .collect()
    }
}
