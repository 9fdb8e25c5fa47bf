//! Data models for Coding Coach.
//!
//! These types describe one user's practice history as it flows through the
//! pipeline: platform fetchers produce [`FetchResult`]s, the orchestrator
//! merges them into a [`FetchAllResult`], and the aggregation engine turns
//! that into [`GrowthMetrics`].
//!
//! Everything here is a plain value recreated on every request. Nothing is
//! cached between requests.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map, Value};

/// Verdicts (upper-cased) that count as a solved submission.
const SOLVED_VERDICTS: [&str; 4] = ["OK", "ACCEPTED", "AC", "COMPLETED"];

/// A competitive programming judge the pipeline knows how to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Codeforces,
    Leetcode,
    Atcoder,
    Hackerrank,
    Codechef,
}

impl Platform {
    /// Every supported platform, in sort order.
    pub const ALL: [Platform; 5] = [
        Platform::Codeforces,
        Platform::Leetcode,
        Platform::Atcoder,
        Platform::Hackerrank,
        Platform::Codechef,
    ];

    /// The lowercase key used in handle maps, stats maps and JSON.
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Codeforces => "codeforces",
            Platform::Leetcode => "leetcode",
            Platform::Atcoder => "atcoder",
            Platform::Hackerrank => "hackerrank",
            Platform::Codechef => "codechef",
        }
    }

    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Platform::Codeforces => "Codeforces",
            Platform::Leetcode => "LeetCode",
            Platform::Atcoder => "AtCoder",
            Platform::Hackerrank => "HackerRank",
            Platform::Codechef => "CodeChef",
        }
    }

    /// Public profile page for a handle on this platform.
    pub fn profile_url(&self, handle: &str) -> String {
        let handle = urlencoding::encode(handle);
        match self {
            Platform::Codeforces => format!("https://codeforces.com/profile/{}", handle),
            Platform::Leetcode => format!("https://leetcode.com/{}/", handle),
            Platform::Atcoder => format!("https://atcoder.jp/users/{}", handle),
            Platform::Hackerrank => format!("https://www.hackerrank.com/profile/{}", handle),
            Platform::Codechef => format!("https://www.codechef.com/users/{}", handle),
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a platform key does not name a supported judge.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown platform: {0}")]
pub struct UnknownPlatform(pub String);

impl FromStr for Platform {
    type Err = UnknownPlatform;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "codeforces" => Ok(Platform::Codeforces),
            "leetcode" => Ok(Platform::Leetcode),
            "atcoder" => Ok(Platform::Atcoder),
            "hackerrank" => Ok(Platform::Hackerrank),
            "codechef" => Ok(Platform::Codechef),
            other => Err(UnknownPlatform(other.to_string())),
        }
    }
}

/// A single submission or attempt on a judge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    /// Judge the event happened on.
    pub platform: Platform,

    /// Platform-scoped problem identifier. May be empty.
    #[serde(default)]
    pub id: String,

    /// Human-readable problem name.
    #[serde(default)]
    pub title: String,

    /// Topic labels. Not every platform exposes them.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Raw platform-reported outcome ("OK", "WRONG_ANSWER", "Accepted", ...).
    #[serde(default)]
    pub verdict: String,

    /// Unix seconds of the event, or 0 when unknown.
    #[serde(default)]
    pub timestamp: i64,

    /// Submission language, when reported.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,

    /// Contest the problem belongs to (AtCoder).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contest: Option<String>,

    /// Track score (HackerRank).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    /// Derived by the aggregation engine from `verdict`.
    #[serde(default)]
    pub is_solved: bool,

    /// `YYYY-MM-DD` (UTC) for activities with a known timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
}

impl Activity {
    /// Create an activity with the fields every platform reports.
    pub fn new(platform: Platform, id: &str, title: &str, verdict: &str, timestamp: i64) -> Self {
        Self {
            platform,
            id: id.to_string(),
            title: title.to_string(),
            tags: Vec::new(),
            verdict: verdict.to_string(),
            timestamp,
            language: None,
            contest: None,
            score: None,
            is_solved: false,
            date: None,
        }
    }

    /// Set the topic tags.
    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set the submission language. Empty strings are treated as unknown.
    pub fn with_language(mut self, language: &str) -> Self {
        if !language.is_empty() {
            self.language = Some(language.to_string());
        }
        self
    }

    /// Set the contest identifier.
    pub fn with_contest(mut self, contest: &str) -> Self {
        if !contest.is_empty() {
            self.contest = Some(contest.to_string());
        }
        self
    }

    /// Set the track score.
    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    /// Whether the raw verdict marks this submission as solved.
    pub fn verdict_is_solved(&self) -> bool {
        let verdict = self.verdict.trim().to_uppercase();
        SOLVED_VERDICTS.contains(&verdict.as_str())
    }
}

/// Loosely-typed per-platform statistics.
///
/// Field sets differ per judge and almost everything is optional, so this is
/// an open map rather than a fixed schema. Fetchers and the profile extractor
/// only populate the keys they understand.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlatformStats(Map<String, Value>);

impl PlatformStats {
    /// Empty stats, the "nothing known" sentinel.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Build stats from a JSON value. Anything but an object yields empty stats.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn insert(&mut self, key: &str, value: Value) {
        self.0.insert(key.to_string(), value);
    }

    /// Merge every field of `other` into `self`, overwriting on conflict.
    pub fn merge(&mut self, other: PlatformStats) {
        self.0.extend(other.0);
    }

    /// Read a count-like field, tolerating floats and numeric strings.
    ///
    /// Missing, null, negative or non-numeric values read as 0.
    pub fn count(&self, key: &str) -> u64 {
        match self.0.get(key) {
            Some(Value::Number(n)) => n
                .as_u64()
                .or_else(|| n.as_f64().filter(|f| *f > 0.0).map(|f| f as u64))
                .unwrap_or(0),
            Some(Value::String(s)) => s.trim().parse().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// What a single platform fetcher produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchResult {
    #[serde(default)]
    pub activities: Vec<Activity>,
    #[serde(default)]
    pub stats: PlatformStats,
}

impl FetchResult {
    /// The empty-but-valid sentinel returned on any failure.
    pub fn empty() -> Self {
        Self::default()
    }

    /// True when neither activities nor stats were collected.
    pub fn is_empty(&self) -> bool {
        self.activities.is_empty() && self.stats.is_empty()
    }
}

/// Merged output of a fan-out across all requested platforms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FetchAllResult {
    /// Activities from every platform, in no particular order.
    #[serde(default)]
    pub activities: Vec<Activity>,

    /// Non-empty stats keyed by platform.
    #[serde(default)]
    pub stats: BTreeMap<Platform, PlatformStats>,
}

impl FetchAllResult {
    /// True when no platform contributed anything.
    ///
    /// Callers treat this as "every platform failed", usually a sign of
    /// misspelled or nonexistent handles.
    pub fn is_total_failure(&self) -> bool {
        self.activities.is_empty() && self.stats.is_empty()
    }
}

/// Current and longest runs of consecutive active days.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
}

/// Per-platform entry of [`GrowthMetrics::platform_stats`].
///
/// `total`, `solved` and `languages` are resolved by the aggregation engine;
/// every other fetched field is flattened in next to them. A fetched field
/// kept in `fetched` under one of the resolved names is written in its place.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PlatformSummary {
    /// Raw submission count, resubmissions included, unless a count was fetched.
    pub total: u64,

    /// Fetched `total_solved` when positive, otherwise unique solved problems.
    pub solved: u64,

    /// Distinct languages from submissions and fetched stats, sorted.
    pub languages: Vec<String>,

    /// Remaining fetched fields, verbatim.
    #[serde(flatten)]
    pub fetched: PlatformStats,
}

impl Serialize for PlatformSummary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = Map::new();
        map.insert("total".to_string(), Value::from(self.total));
        map.insert("solved".to_string(), Value::from(self.solved));
        map.insert("languages".to_string(), Value::from(self.languages.clone()));
        map.extend(self.fetched.0.clone());
        map.serialize(serializer)
    }
}

/// Aggregate progress metrics over all activities and fetched stats.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GrowthMetrics {
    pub platform_stats: BTreeMap<Platform, PlatformSummary>,

    /// Event count per `YYYY-MM-DD`.
    pub daily_activity: BTreeMap<String, u32>,

    /// Event count per `YYYY-MM`.
    pub monthly_activity: BTreeMap<String, u32>,

    pub streak: Streak,

    /// Distinct days with at least one activity.
    pub days_active: u32,

    /// Activities per active day, rounded to two decimals.
    pub avg_problems_per_day: f64,

    /// Distinct platforms present in `platform_stats`.
    pub total_platforms: usize,
}

/// Output of the aggregation engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NormalizedActivities {
    /// Activities sorted newest first, with `is_solved` and `date` filled in.
    pub activities: Vec<Activity>,

    /// `None` serializes as `{}`: nothing to measure.
    #[serde(serialize_with = "empty_object_if_none")]
    pub growth_metrics: Option<GrowthMetrics>,

    pub total_count: usize,

    /// Distinct platforms that appear in `activities`, sorted.
    pub platforms: Vec<Platform>,
}

fn empty_object_if_none<S: Serializer>(
    metrics: &Option<GrowthMetrics>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match metrics {
        Some(metrics) => metrics.serialize(serializer),
        None => Map::new().serialize(serializer),
    }
}

/// Request body for POST /analyze.
#[derive(Debug, Clone, Deserialize)]
pub struct AnalyzeRequest {
    pub user_id: String,

    /// Platform name to handle. Keys and values are normalized server-side.
    #[serde(default)]
    pub handles: BTreeMap<String, String>,

    /// Continue an existing session instead of starting a new one.
    #[serde(default)]
    pub session_id: Option<i64>,
}

/// Response body for POST /analyze.
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzeResponse {
    pub session_id: Option<i64>,

    /// Unix seconds when the snapshot was taken.
    pub fetched_at: i64,

    #[serde(flatten)]
    pub normalized: NormalizedActivities,
}
