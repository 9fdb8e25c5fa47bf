//! Aggregation engine: normalized activity feed and growth metrics.
//!
//! Everything in here is a pure function of its input plus "today". No
//! network, no storage. Running [`normalize`] twice over its own output gives
//! the same metrics.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde_json::Value;
use tracing::{debug, warn};

use crate::metrics::round_to;
use crate::model::{
    Activity, FetchAllResult, GrowthMetrics, NormalizedActivities, Platform, PlatformStats,
    PlatformSummary, Streak,
};

/// Fetched fields that never reach a summary: `total_solved` is folded into
/// `solved`, and a fetched `solved` would bypass that precedence.
const WITHHELD_KEYS: [&str; 2] = ["total_solved", "solved"];

/// What the aggregation engine accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum NormalizeInput {
    /// Orchestrator output: activities plus fetched stats.
    Fetched(FetchAllResult),
    /// A bare activity list with no stats.
    Legacy(Vec<Activity>),
}

impl NormalizeInput {
    /// Read loosely-shaped JSON.
    ///
    /// Accepts an `{activities, stats}` object, a flat activity array, or an
    /// array of activity arrays (one level deep). Items that do not parse as
    /// activities and stats under unknown platform keys are skipped.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => {
                let activities = map
                    .get("activities")
                    .map(collect_activities)
                    .unwrap_or_default();

                let mut stats = BTreeMap::new();
                if let Some(Value::Object(raw)) = map.get("stats") {
                    for (key, value) in raw {
                        match key.parse::<Platform>() {
                            Ok(platform) => {
                                let platform_stats = PlatformStats::from_value(value.clone());
                                if !platform_stats.is_empty() {
                                    stats.insert(platform, platform_stats);
                                }
                            }
                            Err(e) => warn!(error = %e, "Skipping stats for unsupported platform"),
                        }
                    }
                }

                NormalizeInput::Fetched(FetchAllResult { activities, stats })
            }
            Value::Array(_) => NormalizeInput::Legacy(collect_activities(value)),
            _ => {
                warn!("Normalize input is neither an object nor a list");
                NormalizeInput::Legacy(Vec::new())
            }
        }
    }

    fn into_parts(self) -> (Vec<Activity>, BTreeMap<Platform, PlatformStats>) {
        match self {
            NormalizeInput::Fetched(result) => (result.activities, result.stats),
            NormalizeInput::Legacy(activities) => (activities, BTreeMap::new()),
        }
    }
}

impl From<FetchAllResult> for NormalizeInput {
    fn from(result: FetchAllResult) -> Self {
        NormalizeInput::Fetched(result)
    }
}

impl From<Vec<Activity>> for NormalizeInput {
    fn from(activities: Vec<Activity>) -> Self {
        NormalizeInput::Legacy(activities)
    }
}

fn collect_activities(value: &Value) -> Vec<Activity> {
    let Value::Array(items) = value else {
        return Vec::new();
    };

    let mut activities = Vec::new();
    let mut skipped = 0usize;

    for item in items {
        match item {
            Value::Array(nested) => {
                for inner in nested {
                    match serde_json::from_value::<Activity>(inner.clone()) {
                        Ok(activity) => activities.push(activity),
                        Err(_) => skipped += 1,
                    }
                }
            }
            other => match serde_json::from_value::<Activity>(other.clone()) {
                Ok(activity) => activities.push(activity),
                Err(_) => skipped += 1,
            },
        }
    }

    if skipped > 0 {
        warn!(skipped, "Skipped malformed activities");
    }

    activities
}

/// Normalize and compute growth metrics relative to the current UTC date.
pub fn normalize(input: impl Into<NormalizeInput>) -> NormalizedActivities {
    normalize_at(input, Utc::now().date_naive())
}

/// Normalize with an explicit "today", used as the start of the current streak.
pub fn normalize_at(input: impl Into<NormalizeInput>, today: NaiveDate) -> NormalizedActivities {
    let (mut activities, stats) = input.into().into_parts();

    // Stable, so equal timestamps keep their input order. Zero sorts last.
    activities.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));

    for activity in &mut activities {
        activity.is_solved = activity.verdict_is_solved();
        activity.date = day_key(activity.timestamp);
    }

    let platforms: Vec<Platform> = activities
        .iter()
        .map(|a| a.platform)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let growth_metrics = calculate_growth_metrics(&activities, &stats, today);

    debug!(
        activities = activities.len(),
        platforms = platforms.len(),
        "Normalized activity feed"
    );

    NormalizedActivities {
        total_count: activities.len(),
        activities,
        growth_metrics,
        platforms,
    }
}

/// Compute per-platform summaries, day/month histograms and streaks.
///
/// Returns `None` when there are neither activities nor stats.
pub fn calculate_growth_metrics(
    activities: &[Activity],
    stats: &BTreeMap<Platform, PlatformStats>,
    today: NaiveDate,
) -> Option<GrowthMetrics> {
    if activities.is_empty() && stats.is_empty() {
        return None;
    }

    #[derive(Default)]
    struct Tally {
        total: u64,
        solved: HashSet<String>,
        languages: BTreeSet<String>,
    }

    let mut tallies: BTreeMap<Platform, Tally> = BTreeMap::new();
    let mut daily_activity: BTreeMap<String, u32> = BTreeMap::new();
    let mut monthly_activity: BTreeMap<String, u32> = BTreeMap::new();

    for activity in activities {
        let tally = tallies.entry(activity.platform).or_default();
        tally.total += 1;

        if activity.verdict_is_solved() && !activity.id.is_empty() {
            tally
                .solved
                .insert(format!("{}:{}", activity.platform, activity.id));
        }
        if let Some(language) = activity.language.as_deref().filter(|l| !l.is_empty()) {
            tally.languages.insert(language.to_string());
        }

        if let Some(day) = day_key(activity.timestamp) {
            *monthly_activity.entry(day[..7].to_string()).or_insert(0) += 1;
            *daily_activity.entry(day).or_insert(0) += 1;
        }
    }

    for platform in stats.keys() {
        tallies.entry(*platform).or_default();
    }

    let platform_stats: BTreeMap<Platform, PlatformSummary> = tallies
        .into_iter()
        .map(|(platform, tally)| {
            let fetched = stats.get(&platform);
            let fetched_solved = fetched.map(|s| s.count("total_solved")).unwrap_or(0);

            let mut total = tally.total;
            let mut languages = tally.languages;
            let mut extra = PlatformStats::new();

            for (key, value) in fetched.into_iter().flat_map(PlatformStats::iter) {
                match key.as_str() {
                    k if WITHHELD_KEYS.contains(&k) => {}
                    "total" => match value.as_u64() {
                        Some(count) => total = count,
                        None => extra.insert(key, value.clone()),
                    },
                    "languages" => {
                        if !merge_languages(&mut languages, value) {
                            extra.insert(key, value.clone());
                        }
                    }
                    _ => extra.insert(key, value.clone()),
                }
            }

            let summary = PlatformSummary {
                total,
                solved: if fetched_solved > 0 {
                    fetched_solved
                } else {
                    tally.solved.len() as u64
                },
                languages: languages.into_iter().collect(),
                fetched: extra,
            };
            (platform, summary)
        })
        .collect();

    let streak = calculate_streak(&daily_activity, today);
    let days_active = daily_activity.len() as u32;
    let avg_problems_per_day = if days_active > 0 {
        round_to(activities.len() as f64 / f64::from(days_active), 2)
    } else {
        0.0
    };

    Some(GrowthMetrics {
        total_platforms: platform_stats.len(),
        platform_stats,
        daily_activity,
        monthly_activity,
        streak,
        days_active,
        avg_problems_per_day,
    })
}

/// Current and longest runs of consecutive active days.
///
/// The current streak is counted back from `today`, so it is 0 unless there
/// was activity today. Keys that are not valid dates are ignored.
pub fn calculate_streak(daily_activity: &BTreeMap<String, u32>, today: NaiveDate) -> Streak {
    let days: BTreeSet<NaiveDate> = daily_activity
        .iter()
        .filter(|(_, count)| **count > 0)
        .filter_map(|(key, _)| NaiveDate::parse_from_str(key, "%Y-%m-%d").ok())
        .collect();

    let mut current = 0;
    let mut cursor = today;
    while days.contains(&cursor) {
        current += 1;
        match cursor.pred_opt() {
            Some(previous) => cursor = previous,
            None => break,
        }
    }

    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;
    for day in &days {
        run = match previous {
            Some(prev) if *day - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(*day);
    }

    Streak { current, longest }
}

/// Union a fetched `languages` value into the calculated set.
///
/// Accepts a single name or a list of names. Returns false for any other
/// shape, which is then kept verbatim alongside the calculated fields.
fn merge_languages(languages: &mut BTreeSet<String>, value: &Value) -> bool {
    match value {
        Value::String(name) => {
            if !name.trim().is_empty() {
                languages.insert(name.trim().to_string());
            }
            true
        }
        Value::Array(items) if items.iter().all(Value::is_string) => {
            languages.extend(
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string),
            );
            true
        }
        _ => false,
    }
}

/// `YYYY-MM-DD` in UTC, or `None` for the unknown timestamp 0.
fn day_key(timestamp: i64) -> Option<String> {
    if timestamp == 0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp(timestamp, 0).map(|dt| dt.format("%Y-%m-%d").to_string())
}
