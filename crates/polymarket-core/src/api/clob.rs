//! Polymarket CLOB API client.
//!
//! Read-only access to order books. Order submission lives behind
//! [`OrderGateway`](super::OrderGateway) implementations that own signing.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration as StdDuration;
use tracing::{debug, warn};

use super::MarketData;
use crate::types::{OrderBook, PriceLevel};
use crate::{Error, Result};

/// Polymarket CLOB API client for order book data.
pub struct ClobClient {
    base_url: String,
    http_client: reqwest::Client,
}

impl ClobClient {
    /// Default CLOB API base URL.
    pub const DEFAULT_BASE_URL: &'static str = "https://clob.polymarket.com";

    /// Maximum retry attempts for API calls.
    const MAX_RETRIES: u32 = 3;

    pub fn new(base_url: Option<String>) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .connect_timeout(StdDuration::from_secs(5))
            .build()?;
        Ok(Self {
            base_url: base_url
                .unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute an HTTP GET with retry and exponential backoff.
    ///
    /// Retries on 5xx server errors and 429 rate-limit responses (with a longer
    /// backoff for 429). All other 4xx errors fail immediately.
    async fn get_with_retry(&self, url: &str) -> Result<reqwest::Response> {
        let mut last_error = None;

        for attempt in 0..Self::MAX_RETRIES {
            match self.http_client.get(url).send().await {
                Ok(response) if response.status().is_success() => return Ok(response),
                Ok(response)
                    if response.status().as_u16() == 429 || response.status().is_server_error() =>
                {
                    let status = response.status();
                    let is_rate_limited = status.as_u16() == 429;
                    warn!(
                        attempt = attempt + 1,
                        status = %status,
                        url = url,
                        rate_limited = is_rate_limited,
                        "Retryable API error, backing off"
                    );
                    last_error = Some(Error::Api {
                        message: format!(
                            "{}: {}",
                            if is_rate_limited { "Rate limited" } else { "Server error" },
                            status
                        ),
                        status: Some(status.as_u16()),
                    });

                    if attempt + 1 < Self::MAX_RETRIES {
                        let backoff = if is_rate_limited {
                            StdDuration::from_millis(1000 * 2u64.pow(attempt))
                        } else {
                            StdDuration::from_millis(250 * 2u64.pow(attempt))
                        };
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
                Ok(response) => {
                    return Err(Error::Api {
                        message: format!("API error: {}", response.status()),
                        status: Some(response.status().as_u16()),
                    });
                }
                Err(e) => {
                    warn!(
                        attempt = attempt + 1,
                        error = %e,
                        url = url,
                        "HTTP request failed, backing off"
                    );
                    last_error = Some(Error::Http(e));
                }
            }

            if attempt + 1 < Self::MAX_RETRIES {
                let backoff = StdDuration::from_millis(250 * 2u64.pow(attempt));
                tokio::time::sleep(backoff).await;
            }
        }

        Err(last_error.unwrap_or(Error::Api {
            message: "Max retries exceeded".to_string(),
            status: None,
        }))
    }

    /// Fetch order book for a specific token.
    pub async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        if token_id.trim().is_empty() {
            return Err(Error::InvalidMarket("empty token id".to_string()));
        }

        let url = format!("{}/book?token_id={}", self.base_url, token_id);
        let response = self.get_with_retry(&url).await?;

        let book: ClobOrderBook = response.json().await?;
        debug!(
            token_id = token_id,
            bids = book.bids.len(),
            asks = book.asks.len(),
            "Fetched order book"
        );
        Ok(book.into())
    }
}

#[async_trait]
impl MarketData for ClobClient {
    async fn get_order_book(&self, token_id: &str) -> Result<OrderBook> {
        ClobClient::get_order_book(self, token_id).await
    }
}

#[derive(Debug, Deserialize)]
struct ClobOrderBook {
    #[serde(default)]
    market: String,
    #[serde(default)]
    asset_id: String,
    #[serde(default)]
    bids: Vec<ClobPriceLevel>,
    #[serde(default)]
    asks: Vec<ClobPriceLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ClobPriceLevel {
    price: String,
    size: String,
}

impl ClobPriceLevel {
    /// Unparseable levels are dropped rather than zeroed.
    fn parse(&self) -> Option<PriceLevel> {
        Some(PriceLevel {
            price: self.price.parse().ok()?,
            size: self.size.parse::<Decimal>().ok()?,
        })
    }
}

/// Book timestamps arrive as epoch milliseconds or RFC 3339.
fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|ts| {
        ts.parse::<i64>()
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
            .or_else(|| ts.parse().ok())
    })
    .unwrap_or_else(Utc::now)
}

impl From<ClobOrderBook> for OrderBook {
    fn from(b: ClobOrderBook) -> Self {
        OrderBook {
            market_id: b.market,
            outcome_id: b.asset_id,
            timestamp: parse_timestamp(b.timestamp.as_deref()),
            bids: b.bids.iter().filter_map(ClobPriceLevel::parse).collect(),
            asks: b.asks.iter().filter_map(ClobPriceLevel::parse).collect(),
        }
    }
}
