//! Fixed aggregate reports over the warehouse tables.
//!
//! Three analyses are produced: user statistics, post statistics and per-user
//! post activity. Each becomes a [`ReportSection`] of the summary JSON report
//! and, when non-empty, a CSV file of its own.

use crate::domain::model::{ProcessedPost, ProcessedUser};
use crate::utils::error::{EtlError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};

pub const USER_STATISTICS: &str = "user_statistics";
pub const POST_STATISTICS: &str = "post_statistics";
pub const USER_POST_ACTIVITY: &str = "user_post_activity";

trait ReportRow: Serialize {
    const COLUMNS: &'static [&'static str];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserStatistics {
    pub total_users: usize,
    pub unique_domains: usize,
    pub users_with_coordinates: usize,
    pub users_with_company: usize,
}

impl ReportRow for UserStatistics {
    const COLUMNS: &'static [&'static str] = &[
        "total_users",
        "unique_domains",
        "users_with_coordinates",
        "users_with_company",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostStatistics {
    pub total_posts: usize,
    pub unique_authors: usize,
    pub avg_title_length: Option<f64>,
    pub avg_body_length: Option<f64>,
    pub avg_word_count: Option<f64>,
    pub max_body_length: Option<usize>,
    pub min_body_length: Option<usize>,
}

impl ReportRow for PostStatistics {
    const COLUMNS: &'static [&'static str] = &[
        "total_posts",
        "unique_authors",
        "avg_title_length",
        "avg_body_length",
        "avg_word_count",
        "max_body_length",
        "min_body_length",
    ];
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserPostActivity {
    pub user_id: i64,
    pub username: String,
    pub name: String,
    pub email_domain: String,
    pub post_count: usize,
    pub avg_post_length: Option<f64>,
    pub max_post_length: Option<usize>,
}

impl ReportRow for UserPostActivity {
    const COLUMNS: &'static [&'static str] = &[
        "user_id",
        "username",
        "name",
        "email_domain",
        "post_count",
        "avg_post_length",
        "max_post_length",
    ];
}

fn mean(values: impl Iterator<Item = usize>) -> Option<f64> {
    let (sum, count) = values.fold((0usize, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum as f64 / count as f64)
}

pub fn user_statistics(users: &[ProcessedUser]) -> UserStatistics {
    let domains: BTreeSet<&str> = users
        .iter()
        .map(|u| u.email_domain.as_str())
        .filter(|d| !d.is_empty())
        .collect();

    UserStatistics {
        total_users: users.len(),
        unique_domains: domains.len(),
        users_with_coordinates: users.iter().filter(|u| u.has_coordinates).count(),
        users_with_company: users.iter().filter(|u| !u.company_name.is_empty()).count(),
    }
}

pub fn post_statistics(posts: &[ProcessedPost]) -> PostStatistics {
    let authors: BTreeSet<i64> = posts.iter().map(|p| p.user_id).collect();

    PostStatistics {
        total_posts: posts.len(),
        unique_authors: authors.len(),
        avg_title_length: mean(posts.iter().map(|p| p.title_length)),
        avg_body_length: mean(posts.iter().map(|p| p.body_length)),
        avg_word_count: mean(posts.iter().map(|p| p.word_count)),
        max_body_length: posts.iter().map(|p| p.body_length).max(),
        min_body_length: posts.iter().map(|p| p.body_length).min(),
    }
}

/// Every user with their posts (users without posts included), busiest first.
pub fn user_post_activity(
    users: &[ProcessedUser],
    posts: &[ProcessedPost],
) -> Vec<UserPostActivity> {
    let mut by_author: HashMap<i64, Vec<&ProcessedPost>> = HashMap::new();
    for post in posts {
        by_author.entry(post.user_id).or_default().push(post);
    }

    let mut rows: Vec<UserPostActivity> = users
        .iter()
        .map(|user| {
            let authored = by_author.get(&user.user_id).map(Vec::as_slice).unwrap_or(&[]);
            UserPostActivity {
                user_id: user.user_id,
                username: user.username.clone(),
                name: user.name.clone(),
                email_domain: user.email_domain.clone(),
                post_count: authored.len(),
                avg_post_length: mean(authored.iter().map(|p| p.word_count)),
                max_post_length: authored.iter().map(|p| p.body_length).max(),
            }
        })
        .collect();

    rows.sort_by(|a, b| b.post_count.cmp(&a.post_count).then(a.user_id.cmp(&b.user_id)));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSection {
    pub data: Vec<Value>,
    pub record_count: usize,
    pub columns: Vec<String>,
}

impl ReportSection {
    fn from_rows<T: ReportRow>(rows: &[T]) -> Result<Self> {
        let data = rows
            .iter()
            .map(serde_json::to_value)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(Self {
            record_count: data.len(),
            data,
            columns: T::COLUMNS.iter().map(|c| c.to_string()).collect(),
        })
    }

    pub fn to_csv(&self) -> Result<Vec<u8>> {
        let mut writer = csv::Writer::from_writer(Vec::new());
        writer.write_record(&self.columns)?;
        for row in &self.data {
            let cells = self.columns.iter().map(|column| match row.get(column) {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
            });
            writer.write_record(cells)?;
        }
        writer.into_inner().map_err(|e| EtlError::IoError(e.into_error()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalyticsReport {
    pub generated_at: DateTime<Utc>,
    pub source: String,
    pub analytics: BTreeMap<String, ReportSection>,
}

pub fn generate_report(
    users: &[ProcessedUser],
    posts: &[ProcessedPost],
    generated_at: DateTime<Utc>,
    source: &str,
) -> Result<AnalyticsReport> {
    tracing::info!("📈 Generating report over {} users and {} posts", users.len(), posts.len());

    let mut analytics = BTreeMap::new();
    analytics.insert(
        USER_STATISTICS.to_string(),
        ReportSection::from_rows(&[user_statistics(users)])?,
    );
    analytics.insert(
        POST_STATISTICS.to_string(),
        ReportSection::from_rows(&[post_statistics(posts)])?,
    );
    analytics.insert(
        USER_POST_ACTIVITY.to_string(),
        ReportSection::from_rows(&user_post_activity(users, posts))?,
    );

    for (name, section) in &analytics {
        tracing::debug!("📈 {}: {} rows", name, section.record_count);
    }

    Ok(AnalyticsReport {
        generated_at,
        source: source.to_string(),
        analytics,
    })
}

/// File-name stamp shared by the JSON report and its CSV siblings.
pub fn report_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::model::PostCategory;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 9, 15, 30).unwrap()
    }

    fn user(id: i64, domain: &str, coords: bool, company: &str) -> ProcessedUser {
        ProcessedUser {
            user_id: id,
            username: format!("user{}", id),
            name: format!("User {}", id),
            email: format!("user{}@{}", id, domain),
            phone: String::new(),
            website: String::new(),
            city: String::new(),
            zipcode: String::new(),
            lat: coords.then_some(1.0),
            lng: coords.then_some(2.0),
            company_name: company.to_string(),
            company_catchphrase: String::new(),
            email_domain: domain.to_string(),
            has_coordinates: coords,
            created_at: now(),
        }
    }

    fn post(id: i64, user_id: i64, body_length: usize, word_count: usize) -> ProcessedPost {
        ProcessedPost {
            post_id: id,
            user_id,
            title: "t".repeat(10),
            body: "b".repeat(body_length),
            title_length: 10,
            body_length,
            word_count,
            post_category: PostCategory::Short,
            created_at: now(),
        }
    }

    #[test]
    fn test_user_statistics() {
        let users = vec![
            user(1, "april.biz", true, "Romaguera-Crona"),
            user(2, "april.biz", false, ""),
            user(3, "", true, "Deckow-Crist"),
        ];
        let stats = user_statistics(&users);
        assert_eq!(
            stats,
            UserStatistics {
                total_users: 3,
                unique_domains: 1,
                users_with_coordinates: 2,
                users_with_company: 2,
            }
        );
    }

    #[test]
    fn test_post_statistics() {
        let posts = vec![post(1, 1, 100, 10), post(2, 1, 200, 30), post(3, 2, 60, 5)];
        let stats = post_statistics(&posts);
        assert_eq!(stats.total_posts, 3);
        assert_eq!(stats.unique_authors, 2);
        assert_eq!(stats.avg_title_length, Some(10.0));
        assert_eq!(stats.avg_body_length, Some(120.0));
        assert_eq!(stats.avg_word_count, Some(15.0));
        assert_eq!(stats.max_body_length, Some(200));
        assert_eq!(stats.min_body_length, Some(60));
    }

    #[test]
    fn test_post_statistics_empty() {
        let stats = post_statistics(&[]);
        assert_eq!(stats.total_posts, 0);
        assert_eq!(stats.avg_body_length, None);
        assert_eq!(stats.max_body_length, None);
    }

    #[test]
    fn test_user_post_activity_left_join_and_order() {
        let users = vec![
            user(1, "a.io", true, ""),
            user(2, "b.io", true, ""),
            user(3, "c.io", true, ""),
        ];
        let posts = vec![
            post(1, 2, 50, 4),
            post(2, 2, 80, 8),
            post(3, 3, 10, 1),
            post(4, 99, 10, 1),
        ];

        let rows = user_post_activity(&users, &posts);
        let order: Vec<(i64, usize)> = rows.iter().map(|r| (r.user_id, r.post_count)).collect();
        assert_eq!(order, vec![(2, 2), (3, 1), (1, 0)]);
        assert_eq!(rows[0].avg_post_length, Some(6.0));
        assert_eq!(rows[0].max_post_length, Some(80));
        assert_eq!(rows[2].avg_post_length, None);
    }

    #[test]
    fn test_report_sections_and_csv() {
        let users = vec![user(1, "april.biz", true, "Romaguera-Crona")];
        let posts = vec![post(1, 1, 120, 20)];
        let report = generate_report(&users, &posts, now(), "warehouse").unwrap();

        assert_eq!(report.analytics.len(), 3);
        let activity = &report.analytics[USER_POST_ACTIVITY];
        assert_eq!(activity.record_count, 1);
        assert_eq!(activity.columns[0], "user_id");

        let csv = String::from_utf8(activity.to_csv().unwrap()).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "user_id,username,name,email_domain,post_count,avg_post_length,max_post_length"
        );
        assert_eq!(lines.next().unwrap(), "1,user1,User 1,april.biz,1,20.0,120");

        assert_eq!(report_stamp(now()), "20240501_091530");
    }
}
