//! LeetCode GraphQL client.
//!
//! A single query returns both the profile counters and the recent
//! submission list, so there is only one request per fetch.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::warn;

use super::{PlatformFetcher, combine, loose_i64, send_json};
use crate::error::FetchError;
use crate::model::{Activity, FetchResult, Platform, PlatformStats};

/// LeetCode GraphQL endpoint.
const LEETCODE_GRAPHQL_URL: &str = "https://leetcode.com/graphql";

/// LeetCode rejects requests without a matching referer.
const LEETCODE_REFERER: &str = "https://leetcode.com/";

/// Recent submissions requested per fetch.
const RECENT_SUBMISSIONS: u32 = 50;

const PROFILE_QUERY: &str = r#"
query getUserProfile($username: String!, $limit: Int!) {
    matchedUser(username: $username) {
        username
        submitStatsGlobal {
            acSubmissionNum {
                difficulty
                count
                submissions
            }
        }
        userCalendar {
            streak
            totalActiveDays
        }
        profile {
            ranking
            reputation
            starRating
        }
    }
    recentSubmissionList(username: $username, limit: $limit) {
        title
        titleSlug
        timestamp
        statusDisplay
        lang
    }
}
"#;

/// Client for the LeetCode GraphQL API.
#[derive(Clone)]
pub struct LeetcodeFetcher {
    client: reqwest::Client,
    url: String,
}

impl LeetcodeFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self::with_url(client, LEETCODE_GRAPHQL_URL)
    }

    /// Create a fetcher with a custom GraphQL endpoint (for testing).
    pub fn with_url(client: reqwest::Client, url: &str) -> Self {
        Self {
            client,
            url: url.to_string(),
        }
    }

    async fn query_profile(&self, username: &str) -> Result<LeetcodeData, FetchError> {
        let body = json!({
            "query": PROFILE_QUERY,
            "variables": {"username": username, "limit": RECENT_SUBMISSIONS},
        });

        let request = self
            .client
            .post(&self.url)
            .header("Referer", LEETCODE_REFERER)
            .json(&body);

        let response: GraphqlResponse = send_json(request).await?;
        response.into_data(username)
    }
}

#[async_trait]
impl PlatformFetcher for LeetcodeFetcher {
    fn platform(&self) -> Platform {
        Platform::Leetcode
    }

    async fn fetch(&self, handle: &str) -> FetchResult {
        match self.query_profile(handle).await {
            Ok(data) => {
                let activities = parse_submissions(data.recent_submission_list.unwrap_or_default());
                let stats = data
                    .matched_user
                    .map(LeetcodeUser::into_stats)
                    .unwrap_or_default();
                if stats.count("total_solved") == 0 {
                    warn!(
                        handle = %handle,
                        "LeetCode reports zero solved problems"
                    );
                }
                combine(Platform::Leetcode, handle, Ok(activities), Ok(stats))
            }
            Err(e) => {
                warn!(platform = "leetcode", handle = %handle, error = %e, "LeetCode query failed");
                FetchResult::empty()
            }
        }
    }
}

/// Convert recent submissions into activities.
pub fn parse_submissions(submissions: Vec<LeetcodeSubmission>) -> Vec<Activity> {
    submissions
        .into_iter()
        .take(RECENT_SUBMISSIONS as usize)
        .map(|s| {
            let title = s.title.unwrap_or_else(|| "Unknown".to_string());
            let verdict = s.status_display.unwrap_or_else(|| "UNKNOWN".to_string());
            Activity::new(
                Platform::Leetcode,
                &s.title_slug,
                &title,
                &verdict,
                loose_i64(&s.timestamp),
            )
            .with_language(&s.lang)
        })
        .collect()
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlResponse {
    #[serde(default)]
    pub data: Option<LeetcodeData>,
    #[serde(default)]
    pub errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GraphqlError {
    #[serde(default)]
    pub message: String,
}

impl GraphqlResponse {
    /// Reject GraphQL errors and unknown users.
    pub fn into_data(self, username: &str) -> Result<LeetcodeData, FetchError> {
        if let Some(errors) = self.errors.filter(|e| !e.is_empty()) {
            let messages: Vec<String> = errors.into_iter().map(|e| e.message).collect();
            return Err(FetchError::Api(messages.join("; ")));
        }

        let data = self
            .data
            .ok_or_else(|| FetchError::Api("response missing data field".to_string()))?;

        if data.matched_user.is_none() {
            return Err(FetchError::UserNotFound(username.to_string()));
        }

        Ok(data)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeetcodeData {
    #[serde(default, rename = "matchedUser")]
    pub matched_user: Option<LeetcodeUser>,

    #[serde(default, rename = "recentSubmissionList")]
    pub recent_submission_list: Option<Vec<LeetcodeSubmission>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeetcodeUser {
    #[serde(default, rename = "submitStatsGlobal")]
    pub submit_stats_global: Option<SubmitStats>,

    #[serde(default, rename = "userCalendar")]
    pub user_calendar: Option<UserCalendar>,

    #[serde(default)]
    pub profile: Option<LeetcodeProfile>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitStats {
    #[serde(default, rename = "acSubmissionNum")]
    pub ac_submission_num: Vec<DifficultyCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DifficultyCount {
    #[serde(default)]
    pub difficulty: String,
    #[serde(default)]
    pub count: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UserCalendar {
    #[serde(default)]
    pub streak: Option<u64>,
    #[serde(default, rename = "totalActiveDays")]
    pub total_active_days: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeetcodeProfile {
    #[serde(default)]
    pub ranking: Option<u64>,
    #[serde(default)]
    pub reputation: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LeetcodeSubmission {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default, rename = "titleSlug")]
    pub title_slug: String,

    /// Unix seconds, sent as a string.
    #[serde(default)]
    pub timestamp: Value,

    #[serde(default, rename = "statusDisplay")]
    pub status_display: Option<String>,

    #[serde(default)]
    pub lang: String,
}

impl LeetcodeUser {
    pub fn into_stats(self) -> PlatformStats {
        let (mut total, mut easy, mut medium, mut hard) = (0, 0, 0, 0);
        for entry in self
            .submit_stats_global
            .map(|s| s.ac_submission_num)
            .unwrap_or_default()
        {
            let count = entry.count.unwrap_or(0);
            match entry.difficulty.trim() {
                "All" => total = count,
                "Easy" => easy = count,
                "Medium" => medium = count,
                "Hard" => hard = count,
                _ => {}
            }
        }

        let calendar = self.user_calendar;
        let profile = self.profile;

        PlatformStats::from_value(json!({
            "total_solved": total,
            "easy_solved": easy,
            "medium_solved": medium,
            "hard_solved": hard,
            "streak": calendar.as_ref().and_then(|c| c.streak).unwrap_or(0),
            "total_active_days": calendar.as_ref().and_then(|c| c.total_active_days).unwrap_or(0),
            "ranking": profile.as_ref().and_then(|p| p.ranking).unwrap_or(0),
            "reputation": profile.as_ref().and_then(|p| p.reputation).unwrap_or(0),
        }))
    }
}
