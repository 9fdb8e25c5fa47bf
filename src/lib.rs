//! Coding Coach - practice history aggregated across competitive programming judges.
//!
//! # Overview
//!
//! Given a user's handles on Codeforces, LeetCode, AtCoder, HackerRank and
//! CodeChef, the service fetches recent submissions and profile statistics from
//! each judge concurrently, then computes progress metrics: per-platform solved
//! counts, daily and monthly activity, streaks and average daily volume.
//!
//! Judges without a usable API, or whose API fails, fall back to reading the
//! public profile page with a text-generation model.
//!
//! # Modules
//!
//! - [`model`]: Activities, per-platform stats and growth metrics
//! - [`fetchers`]: One client per judge
//! - [`extractor`]: Profile-page extraction fallback
//! - [`gemini`]: Text-generation client used by the extractor
//! - [`orchestrator`]: Concurrent fan-out with per-platform fallback
//! - [`aggregation`]: Normalized feed and growth metrics
//! - [`storage`]: SQLite session log
//! - [`metrics`]: Request counters
//! - [`config`]: Environment configuration
//! - [`error`]: Error types
//! - [`api`]: HTTP API handlers

pub mod aggregation;
pub mod api;
pub mod config;
pub mod error;
pub mod extractor;
pub mod fetchers;
pub mod gemini;
pub mod metrics;
pub mod model;
pub mod orchestrator;
pub mod storage;
