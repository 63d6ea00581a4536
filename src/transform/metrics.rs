use crate::domain::model::PostCategory;

/// Bodies shorter than this are `short`.
pub const SHORT_BODY_LIMIT: usize = 100;
/// Bodies up to and including this length are `medium`.
pub const MEDIUM_BODY_LIMIT: usize = 200;

pub fn character_count(s: &str) -> usize {
    s.chars().count()
}

pub fn word_count(s: &str) -> usize {
    s.split_whitespace().count()
}

pub fn post_category(body_length: usize) -> PostCategory {
    if body_length < SHORT_BODY_LIMIT {
        PostCategory::Short
    } else if body_length <= MEDIUM_BODY_LIMIT {
        PostCategory::Medium
    } else {
        PostCategory::Long
    }
}
