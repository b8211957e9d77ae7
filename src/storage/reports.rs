//! Aggregation Engine - filter-driven reporting queries
//!
//! Report SQL is assembled from a fixed SELECT, a WHERE clause composed from
//! the optional filters, and a fixed GROUP BY. Filter values are always
//! bound; only the number of `?` placeholders depends on the input.
//!
//! Time is modelled, not measured: every try costs [`SECONDS_PER_TRY`].

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::debug;

use super::repository::{RepoResult, ReportRepo};
use super::sqlite::*;

/// Fixed cost of one try in the time report
pub const SECONDS_PER_TRY: i64 = 60;

/// The only groups that take part in the group comparison
pub const COMPARISON_GROUPS: [&str; 4] = ["A", "B", "C", "D"];

const POINTS_SELECT: &str = r#"
    SELECT
        u.initials AS usuario_nombre,
        u."group" AS grupo_nombre,
        u.list AS list,
        u.role AS role,
        CAST(SUM(o.score) AS REAL) AS total_puntuacion
    FROM users u
    JOIN objects o ON u.initials = o.user_initials"#;

const TIME_SELECT: &str = r#"
    SELECT
        u.initials AS usuario_nombre,
        u."group" AS grupo_nombre,
        u.list AS list,
        u.role AS role,
        CAST(SUM(o.tries) * ? AS INTEGER) AS total_tiempo
    FROM users u
    JOIN objects o ON u.initials = o.user_initials"#;

const PER_USER_GROUPING: &str = r#" GROUP BY u.initials, u."group", u.list ORDER BY u.initials"#;

/// Optional cohort filters shared by the points and time reports
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    /// Exact `group` match; `None` or an empty string means no filter
    pub group: Option<String>,
    /// `list IN (...)`; empty means no filter
    pub lists: Vec<String>,
}

impl ReportFilter {
    pub fn new(group: Option<String>, lists: Vec<String>) -> Self {
        Self {
            group: group.filter(|g| !g.is_empty()),
            lists,
        }
    }

    /// WHERE clause (with leading space, or empty) plus its bind values in order
    pub fn where_clause(&self) -> (String, Vec<String>) {
        let mut conditions = Vec::new();
        let mut params = Vec::new();

        if let Some(group) = self.group.as_deref().filter(|g| !g.is_empty()) {
            conditions.push(r#"u."group" = ?"#.to_string());
            params.push(group.to_string());
        }

        if !self.lists.is_empty() {
            conditions.push(format!("u.list IN ({})", placeholders(self.lists.len())));
            params.extend(self.lists.iter().cloned());
        }

        if conditions.is_empty() {
            (String::new(), params)
        } else {
            (format!(" WHERE {}", conditions.join(" AND ")), params)
        }
    }
}

/// `?, ?, ?` for `count` values
pub fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

/// Full per-user report statement for the given SELECT
fn compose_report(select: &str, filter: &ReportFilter) -> (String, Vec<String>) {
    let (where_clause, params) = filter.where_clause();
    (format!("{}{}{}", select, where_clause, PER_USER_GROUPING), params)
}

/// Bucket flat (group, score) rows by group
///
/// Groups come out in order of first appearance; scores keep row order.
pub fn bucket_scores(rows: Vec<(String, f64)>) -> Vec<GroupScores> {
    let mut buckets: Vec<GroupScores> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for (group, score) in rows {
        match index.get(&group) {
            Some(&i) => buckets[i].scores.push(score),
            None => {
                index.insert(group.clone(), buckets.len());
                buckets.push(GroupScores {
                    group,
                    scores: vec![score],
                });
            }
        }
    }

    buckets
}

#[async_trait]
impl ReportRepo for ScoreStore {
    async fn points_report(&self, filter: &ReportFilter) -> RepoResult<Vec<PointsRow>> {
        let (sql, params) = compose_report(POINTS_SELECT, filter);
        debug!(sql = %sql, binds = params.len(), "points report");

        let mut query = sqlx::query_as::<_, PointsRow>(&sql);
        for param in &params {
            query = query.bind(param.as_str());
        }

        Ok(query.fetch_all(self.pool()).await?)
    }

    async fn time_report(&self, filter: &ReportFilter) -> RepoResult<Vec<TimeRow>> {
        let (sql, params) = compose_report(TIME_SELECT, filter);
        debug!(sql = %sql, binds = params.len(), "time report");

        let mut query = sqlx::query_as::<_, TimeRow>(&sql).bind(SECONDS_PER_TRY);
        for param in &params {
            query = query.bind(param.as_str());
        }

        Ok(query.fetch_all(self.pool()).await?)
    }

    async fn groups(&self) -> RepoResult<Vec<GroupRow>> {
        let rows = sqlx::query_as::<_, GroupRow>(
            r#"SELECT DISTINCT "group" AS group_name FROM users
               WHERE "group" IS NOT NULL
               ORDER BY group_name"#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    async fn lists(&self, group: Option<&str>) -> RepoResult<Vec<ListRow>> {
        let rows = match group.filter(|g| !g.is_empty()) {
            Some(group) => {
                sqlx::query_as::<_, ListRow>(
                    r#"SELECT DISTINCT list FROM users WHERE "group" = ? ORDER BY list"#,
                )
                .bind(group)
                .fetch_all(self.pool())
                .await?
            }
            None => {
                sqlx::query_as::<_, ListRow>("SELECT DISTINCT list FROM users ORDER BY list")
                    .fetch_all(self.pool())
                    .await?
            }
        };

        Ok(rows)
    }

    async fn leaderboard(&self) -> RepoResult<Vec<LeaderboardRow>> {
        let rows = sqlx::query_as::<_, LeaderboardRow>(
            "SELECT
                u.initials AS usuario_nombre,
                l.highest_score AS highest_score,
                u.role AS role
             FROM users u
             JOIN leaderboard l ON u.initials = l.student_id
             ORDER BY l.highest_score DESC, u.initials ASC",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(rows)
    }

    async fn group_comparison(&self) -> RepoResult<Vec<GroupScores>> {
        let sql = format!(
            r#"SELECT u."group", o.score
               FROM users u
               JOIN objects o ON u.initials = o.user_initials
               WHERE u."group" IN ({})
               ORDER BY o.id"#,
            placeholders(COMPARISON_GROUPS.len())
        );

        let mut query = sqlx::query_as::<_, (String, f64)>(&sql);
        for group in COMPARISON_GROUPS {
            query = query.bind(group);
        }
        let rows = query.fetch_all(self.pool()).await?;

        Ok(bucket_scores(rows))
    }
}
