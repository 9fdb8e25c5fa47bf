//! Profile-page statistics extraction through a text-generation model.
//!
//! Several judges have no usable public API, and the ones that do sometimes
//! come back empty. In both cases the public profile page still renders the
//! numbers. This module fetches that page and asks a [`TextGenerator`] to read
//! the statistics out of it as a JSON object.
//!
//! The model is told to answer with JSON only. It does not always comply, so
//! the reply is unfenced before parsing and anything unparsable becomes empty
//! stats. Profile pages carry no activity history: this path never yields
//! activities.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::gemini::TextGenerator;
use crate::model::{Platform, PlatformStats};

/// Maximum number of HTML characters sent to the model.
pub const MAX_HTML_CHARS: usize = 50_000;

/// Best-effort statistics for a platform handle.
#[async_trait]
pub trait ProfileExtractor: Send + Sync {
    /// Never fails: every problem is logged and yields empty stats.
    async fn extract(&self, platform: Platform, handle: &str) -> PlatformStats;
}

/// Extractor that scrapes the public profile page and reads it with a model.
#[derive(Clone)]
pub struct FallbackExtractor {
    client: reqwest::Client,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl FallbackExtractor {
    /// Create an extractor. Without a generator every extraction is empty.
    pub fn new(client: reqwest::Client, generator: Option<Arc<dyn TextGenerator>>) -> Self {
        Self { client, generator }
    }

    async fn fetch_page_html(&self, url: &str) -> Result<String, FetchError> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        Ok(response.text().await?)
    }

    /// Ask the model to read statistics out of already-fetched profile HTML.
    pub async fn extract_from_html(
        &self,
        platform: Platform,
        handle: &str,
        html: &str,
    ) -> PlatformStats {
        let Some(generator) = &self.generator else {
            warn!(
                platform = %platform,
                error = %FetchError::MissingCredential("GEMINI_API_KEY"),
                "Profile extraction disabled"
            );
            return PlatformStats::new();
        };

        let prompt = build_prompt(platform, handle, html);

        let reply = match generator.generate(&prompt).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(platform = %platform, handle = %handle, error = %e, "Text generation failed");
                return PlatformStats::new();
            }
        };

        match parse_stats_reply(&reply) {
            Ok(stats) => {
                info!(
                    platform = %platform,
                    handle = %handle,
                    fields = stats.len(),
                    "Extracted profile stats"
                );
                stats
            }
            Err(e) => {
                warn!(platform = %platform, handle = %handle, error = %e, "Model reply is not valid JSON");
                debug!(reply = %reply, "Unparsable model reply");
                PlatformStats::new()
            }
        }
    }
}

#[async_trait]
impl ProfileExtractor for FallbackExtractor {
    async fn extract(&self, platform: Platform, handle: &str) -> PlatformStats {
        let url = platform.profile_url(handle);
        info!(platform = %platform, handle = %handle, url = %url, "Scraping profile page");

        let html = match self.fetch_page_html(&url).await {
            Ok(html) => html,
            Err(e) => {
                warn!(platform = %platform, handle = %handle, error = %e, "Failed to fetch profile page");
                return PlatformStats::new();
            }
        };

        debug!(platform = %platform, chars = html.len(), "Fetched profile page");
        self.extract_from_html(platform, handle, &html).await
    }
}

/// Fields the model should look for on each platform's profile page.
fn platform_instructions(platform: Platform) -> &'static str {
    match platform {
        Platform::Leetcode => {
            "Extract the following from this LeetCode profile:\n\
             - total_solved: total problems solved\n\
             - easy_solved: easy problems solved\n\
             - medium_solved: medium problems solved\n\
             - hard_solved: hard problems solved\n\
             - ranking: global ranking number\n\
             - reputation: reputation points\n\
             - acceptance_rate: acceptance rate percentage"
        }
        Platform::Codeforces => {
            "Extract the following from this Codeforces profile:\n\
             - rating: current rating\n\
             - max_rating: maximum rating achieved\n\
             - rank: current rank (e.g., \"Expert\", \"Candidate Master\")\n\
             - max_rank: maximum rank achieved\n\
             - contribution: contribution points\n\
             - total_solved: total problems solved (if visible)"
        }
        Platform::Codechef => {
            "Extract the following from this CodeChef profile:\n\
             - rating: current rating\n\
             - stars: star rating (e.g., \"4★\", \"5★\")\n\
             - global_rank: global rank\n\
             - country_rank: country rank\n\
             - total_solved: total problems solved (if visible)"
        }
        Platform::Atcoder => {
            "Extract the following from this AtCoder profile:\n\
             - rating: current rating\n\
             - highest_rating: highest rating achieved\n\
             - rank: rank/color (e.g., \"cyan\", \"blue\")\n\
             - total_solved: total problems solved (if visible)"
        }
        Platform::Hackerrank => {
            "Extract the following from this HackerRank profile:\n\
             - total_score: total score/points\n\
             - badges: number of badges\n\
             - certificates: number of certificates\n\
             - tracks: object mapping track names to scores"
        }
    }
}

/// Build the extraction prompt, truncating the page to [`MAX_HTML_CHARS`].
pub fn build_prompt(platform: Platform, handle: &str, html: &str) -> String {
    format!(
        "You are a data extraction assistant. Analyze this {label} profile page HTML and extract user statistics.\n\n\
         Username: {handle}\n\n\
         {instructions}\n\n\
         HTML Content (first {max} chars):\n\
         {html}\n\n\
         Return ONLY a valid JSON object with the extracted data. Use 0 or null for fields that are not visible.\n\
         Example format: {{\"total_solved\": 150, \"rating\": 1500, \"rank\": \"Expert\"}}\n\n\
         JSON:",
        label = platform.label(),
        handle = handle,
        instructions = platform_instructions(platform),
        max = MAX_HTML_CHARS,
        html = truncate_chars(html, MAX_HTML_CHARS),
    )
}

/// First `max` characters of `text`, respecting UTF-8 boundaries.
fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Remove a surrounding Markdown code fence (```` ```json ```` or ```` ``` ````).
pub fn strip_code_fence(text: &str) -> &str {
    let mut body = text.trim();
    if let Some(rest) = body.strip_prefix("```json") {
        body = rest;
    } else if let Some(rest) = body.strip_prefix("```") {
        body = rest;
    }
    if let Some(rest) = body.strip_suffix("```") {
        body = rest;
    }
    body.trim()
}

/// Parse a model reply into stats. Valid JSON that is not an object is empty.
pub fn parse_stats_reply(reply: &str) -> Result<PlatformStats, FetchError> {
    let value: serde_json::Value = serde_json::from_str(strip_code_fence(reply))?;
    Ok(PlatformStats::from_value(value))
}
