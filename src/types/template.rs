//! Template repository types.

use serde::{Deserialize, Serialize};

use super::caller::{ContentMode, Level};

/// Free-text category assigned by keyword classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseCategory {
    Greeting,
    Compliment,
    Tease,
    Comfort,
    Farewell,
    /// Default bucket when no keyword matches.
    Smalltalk,
}

impl ResponseCategory {
    /// Stable name used in logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ResponseCategory::Greeting => "greeting",
            ResponseCategory::Compliment => "compliment",
            ResponseCategory::Tease => "tease",
            ResponseCategory::Comfort => "comfort",
            ResponseCategory::Farewell => "farewell",
            ResponseCategory::Smalltalk => "smalltalk",
        }
    }
}

/// A pre-authored response with its editorial quality rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Template {
    pub text: String,
    /// Editorial rating in 0.1..=2.0. Drives weighted selection and
    /// cache eviction priority.
    pub quality_score: f32,
    pub category: ResponseCategory,
    pub level: Level,
    pub mode: ContentMode,
}

impl Template {
    pub fn new(text: impl Into<String>, quality_score: f32) -> Self {
        Self {
            text: text.into(),
            quality_score: quality_score.clamp(0.1, 2.0),
            category: ResponseCategory::Smalltalk,
            level: Level::default(),
            mode: ContentMode::default(),
        }
    }

    pub fn category(mut self, category: ResponseCategory) -> Self {
        self.category = category;
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn mode(mut self, mode: ContentMode) -> Self {
        self.mode = mode;
        self
    }
}

/// Filter for [`TemplateRepository::query`](crate::traits::TemplateRepository::query).
///
/// `None` fields match everything, so the level-only fallback query is
/// just `TemplateFilter::default().level(level)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TemplateFilter {
    pub category: Option<ResponseCategory>,
    pub level: Option<Level>,
    pub mode: Option<ContentMode>,
}

impl TemplateFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn category(mut self, category: ResponseCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = Some(level);
        self
    }

    pub fn mode(mut self, mode: ContentMode) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Whether a template satisfies every set field.
    pub fn matches(&self, template: &Template) -> bool {
        self.category.is_none_or(|c| template.category == c)
            && self.level.is_none_or(|l| template.level == l)
            && self.mode.is_none_or(|m| template.mode == m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_score_clamped() {
        assert_eq!(Template::new("hi", 5.0).quality_score, 2.0);
        assert_eq!(Template::new("hi", 0.0).quality_score, 0.1);
        assert_eq!(Template::new("hi", 1.3).quality_score, 1.3);
    }

    #[test]
    fn empty_filter_matches_everything() {
        let t = Template::new("hello", 1.0).category(ResponseCategory::Greeting);
        assert!(TemplateFilter::new().matches(&t));
    }

    #[test]
    fn filter_fields_are_conjunctive() {
        let t = Template::new("hello", 1.0)
            .category(ResponseCategory::Greeting)
            .level(Level::new(2).unwrap());

        let filter = TemplateFilter::new()
            .category(ResponseCategory::Greeting)
            .level(Level::new(2).unwrap());
        assert!(filter.matches(&t));

        let wrong_level = filter.level(Level::new(3).unwrap());
        assert!(!wrong_level.matches(&t));
    }
}
