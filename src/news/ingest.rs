//! News ingest loop (spec §4.4): poll the news service, normalize each
//! article, enrich with sentiment and catalyst classification, and persist
//! via the Store Gateway. Duplicate articles are a no-op — `resolve_security`
//! and `insert_news_event`'s dedup-key upsert make the whole path idempotent.

use crate::client::ServiceClient;
use crate::config::Config;
use crate::models::{CatalystType, NewsEvent, Sentiment};
use crate::news::catalyst;
use crate::store::StoreGateway;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

#[derive(Debug, Deserialize)]
struct RawArticle {
    symbol: String,
    headline: String,
    source: String,
    #[serde(default)]
    url: Option<String>,
    published_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct ArticlesResponse {
    events: Vec<RawArticle>,
}

pub struct NewsIngest {
    client: Arc<ServiceClient>,
    store: Arc<StoreGateway>,
    interval: std::time::Duration,
    source_reliability: Vec<(String, String)>,
}

impl NewsIngest {
    pub fn new(client: Arc<ServiceClient>, store: Arc<StoreGateway>, config: &Config) -> Self {
        Self {
            client,
            store,
            interval: config.news_ingest_interval,
            source_reliability: config.news_source_keys.clone(),
        }
    }

    pub async fn run(self: Arc<Self>) {
        info!("starting news ingest loop");
        let mut tick = interval(self.interval);
        loop {
            tick.tick().await;
            if let Err(e) = self.ingest_once().await {
                warn!(error = %e, "news ingest cycle failed");
            }
        }
    }

    pub async fn ingest_once(&self) -> anyhow::Result<usize> {
        let response: ArticlesResponse = match self.client.get_json("news", "/api/v1/news/recent?hours=1").await {
            Ok(r) => r,
            Err(e) => {
                // News is non-gating (SPEC_FULL §11): a failed poll is
                // logged and skipped, never escalated.
                debug!(error = %e, "news service unavailable this tick");
                return Ok(0);
            }
        };

        let mut ingested = 0;
        for article in response.events {
            match self.ingest_article(article).await {
                Ok(true) => ingested += 1,
                Ok(false) => {}
                Err(e) => error!(error = %e, "failed to ingest article"),
            }
        }
        Ok(ingested)
    }

    async fn ingest_article(&self, raw: RawArticle) -> anyhow::Result<bool> {
        let security_id = self.store.resolve_security(&raw.symbol).await?;
        let time_id = self.store.resolve_time(raw.published_at).await?;
        let catalyst_type = catalyst::classify(&raw.headline);
        let (sentiment, sentiment_score) = classify_sentiment(&raw.headline);
        let reliability = self.reliability_for(&raw.source);
        let dedup_key = dedup_key(&raw.headline, raw.url.as_deref());

        let event = NewsEvent {
            id: 0,
            security_id,
            symbol: raw.symbol,
            time_id,
            published_at: raw.published_at,
            headline: raw.headline,
            source: raw.source,
            url: raw.url,
            sentiment,
            sentiment_score,
            relevance: if catalyst_type == CatalystType::General { 0.2 } else { 0.8 },
            catalyst_type,
            observed_impact_pct: None,
            source_reliability: reliability,
            impact_attempts: 0,
        };

        let row_id = self.store.insert_news_event(&event, &dedup_key).await?;
        Ok(row_id > 0)
    }

    fn reliability_for(&self, source: &str) -> f64 {
        self.source_reliability
            .iter()
            .find(|(name, _)| name == source)
            .and_then(|(_, weight)| weight.parse::<f64>().ok())
            .unwrap_or(0.5)
    }
}

fn dedup_key(headline: &str, url: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(headline.as_bytes());
    if let Some(u) = url {
        hasher.update(u.as_bytes());
    }
    hex::encode(hasher.finalize())
}

const POSITIVE_WORDS: &[&str] = &["beat", "surge", "soar", "upgrade", "approval", "record", "growth", "raise"];
const NEGATIVE_WORDS: &[&str] = &["miss", "plunge", "downgrade", "lawsuit", "investigation", "recall", "cut", "fraud"];

/// Lexicon polarity scan — deliberately simple, mirrors the keyword-matching
/// idiom `catalyst::classify` already uses rather than pulling in an NLP
/// dependency for a secondary signal.
fn classify_sentiment(headline: &str) -> (Sentiment, f64) {
    let lower = headline.to_lowercase();
    let pos = POSITIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let neg = NEGATIVE_WORDS.iter().filter(|w| lower.contains(*w)).count() as f64;
    let total = pos + neg;
    if total == 0.0 {
        return (Sentiment::Neutral, 0.0);
    }
    let score = (pos - neg) / total;
    let sentiment = if score > 0.1 {
        Sentiment::Positive
    } else if score < -0.1 {
        Sentiment::Negative
    } else {
        Sentiment::Neutral
    };
    (sentiment, score)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dedup_key_is_stable_for_same_inputs() {
        let a = dedup_key("Company beats earnings", Some("https://x/1"));
        let b = dedup_key("Company beats earnings", Some("https://x/1"));
        assert_eq!(a, b);
    }

    #[test]
    fn dedup_key_differs_for_different_urls() {
        let a = dedup_key("Company beats earnings", Some("https://x/1"));
        let b = dedup_key("Company beats earnings", Some("https://x/2"));
        assert_ne!(a, b);
    }

    #[test]
    fn sentiment_detects_positive_and_negative() {
        assert_eq!(classify_sentiment("Stock surges after record earnings beat").0, Sentiment::Positive);
        assert_eq!(classify_sentiment("Company faces lawsuit and investigation").0, Sentiment::Negative);
        assert_eq!(classify_sentiment("Quarterly filing released").0, Sentiment::Neutral);
    }
}
