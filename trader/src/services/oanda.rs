//! OANDA v20 REST client: candles, pricing stream and market orders

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use futures::StreamExt;
use multitrader_rs::data::{MarketData, PricePoint, Tick};
use multitrader_rs::execution::{Broker, OrderFill};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Candles per request accepted by the candles endpoint
const MAX_CANDLES: i64 = 5000;
const REQUEST_TIMEOUT_SECS: u64 = 10;
const TICK_CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Deserialize)]
struct CandlesResponse {
    candles: Vec<Candle>,
}

#[derive(Debug, Deserialize)]
struct Candle {
    time: DateTime<Utc>,
    mid: Option<Ohlc>,
}

#[derive(Debug, Deserialize)]
struct Ohlc {
    c: String,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum StreamMessage {
    #[serde(rename = "PRICE")]
    Price {
        time: DateTime<Utc>,
        bids: Vec<PriceBucket>,
        asks: Vec<PriceBucket>,
    },
    #[serde(rename = "HEARTBEAT")]
    Heartbeat { time: DateTime<Utc> },
}

#[derive(Debug, Deserialize)]
struct PriceBucket {
    price: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_fill_transaction: Option<FillTransaction>,
    order_cancel_transaction: Option<CancelTransaction>,
}

#[derive(Debug, Deserialize)]
struct FillTransaction {
    time: DateTime<Utc>,
    units: String,
    price: String,
    pl: String,
}

#[derive(Debug, Deserialize)]
struct CancelTransaction {
    reason: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorResponse {
    error_message: Option<String>,
}

pub struct OandaClient {
    rest: reqwest::Client,
    stream: reqwest::Client,
    api_url: String,
    stream_url: String,
    account_id: String,
    api_key: String,
}

impl OandaClient {
    pub fn new(api_url: &str, stream_url: &str, account_id: &str, api_key: &str) -> Result<Self> {
        let rest = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        let stream = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self {
            rest,
            stream,
            api_url: api_url.trim_end_matches('/').to_string(),
            stream_url: stream_url.trim_end_matches('/').to_string(),
            account_id: account_id.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn fetch_candles(
        &self,
        instrument: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        granularity: &str,
    ) -> Result<Vec<PricePoint>> {
        let from = from.to_rfc3339_opts(SecondsFormat::Secs, true);
        let to = to.to_rfc3339_opts(SecondsFormat::Secs, true);
        let response = self
            .rest
            .get(format!("{}/v3/instruments/{}/candles", self.api_url, instrument))
            .bearer_auth(&self.api_key)
            .query(&[
                ("price", "M"),
                ("granularity", granularity),
                ("from", from.as_str()),
                ("to", to.as_str()),
            ])
            .send()
            .await?;
        let body = checked_body(response).await?;
        parse_candles(&body)
    }
}

#[async_trait]
impl MarketData for OandaClient {
    async fn get_history(
        &self,
        instrument: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        granularity: &str,
    ) -> Result<Vec<PricePoint>> {
        let span = Duration::seconds(granularity_secs(granularity)? * MAX_CANDLES);
        let mut points: Vec<PricePoint> = Vec::new();
        let mut from = start;
        while from < end {
            let to = (from + span).min(end);
            let chunk = self
                .fetch_candles(instrument, from, to, granularity)
                .await
                .with_context(|| format!("failed to fetch {} candles from {}", instrument, from))?;
            for point in chunk {
                if points.last().map_or(true, |last| point.timestamp > last.timestamp) {
                    points.push(point);
                }
            }
            from = to;
        }
        debug!("Fetched {} {} candles of {}", points.len(), granularity, instrument);
        Ok(points)
    }

    async fn stream_ticks(&self, instrument: &str) -> Result<mpsc::Receiver<Tick>> {
        let response = self
            .stream
            .get(format!("{}/v3/accounts/{}/pricing/stream", self.stream_url, self.account_id))
            .bearer_auth(&self.api_key)
            .query(&[("instruments", instrument)])
            .send()
            .await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("pricing stream refused ({}): {}", status, error_message(&body));
        }
        info!("Streaming prices of {}", instrument);

        let (tx, rx) = mpsc::channel(TICK_CHANNEL_CAPACITY);
        let mut bytes = Box::pin(response.bytes_stream());
        tokio::spawn(async move {
            let mut pending: Vec<u8> = Vec::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        warn!("Pricing stream interrupted: {}", e);
                        break;
                    }
                };
                pending.extend_from_slice(&chunk);
                while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                    let line: Vec<u8> = pending.drain(..=pos).collect();
                    match parse_stream_line(&String::from_utf8_lossy(&line)) {
                        Ok(Some(tick)) => {
                            if tx.send(tick).await.is_err() {
                                return;
                            }
                        }
                        Ok(None) => {}
                        Err(e) => warn!("Skipping pricing message: {:#}", e),
                    }
                }
            }
            info!("Pricing stream closed");
        });
        Ok(rx)
    }
}

#[async_trait]
impl Broker for OandaClient {
    async fn create_order(&self, instrument: &str, units: i64, suppress_confirmation: bool) -> Result<OrderFill> {
        let order = serde_json::json!({
            "order": {
                "type": "MARKET",
                "instrument": instrument,
                "units": units.to_string(),
                "timeInForce": "FOK",
                "positionFill": "DEFAULT",
            }
        });
        let response = self
            .rest
            .post(format!("{}/v3/accounts/{}/orders", self.api_url, self.account_id))
            .bearer_auth(&self.api_key)
            .json(&order)
            .send()
            .await?;
        let body = checked_body(response).await?;
        let fill = parse_fill(&body)?;
        if !suppress_confirmation {
            info!("Order filled: {:+} {} at {}", fill.units, instrument, fill.price);
        }
        Ok(fill)
    }
}

async fn checked_body(response: reqwest::Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        bail!("OANDA request failed ({}): {}", status, error_message(&body));
    }
    Ok(body)
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorResponse>(body)
        .ok()
        .and_then(|e| e.error_message)
        .unwrap_or_else(|| body.to_string())
}

fn number(value: &str) -> Result<f64> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| anyhow!("invalid number `{}`", value))
}

/// Length of an OANDA candle granularity such as `S5`, `M1`, `H4` or `D`
fn granularity_secs(granularity: &str) -> Result<i64> {
    let invalid = || anyhow!("unsupported granularity `{}`", granularity);
    let mut chars = granularity.chars();
    let unit = chars.next();
    let count = chars.as_str();
    let scale = match unit {
        Some('S') => 1,
        Some('M') => 60,
        Some('H') => 3600,
        Some('D') if count.is_empty() => return Ok(86_400),
        _ => return Err(invalid()),
    };
    let count: i64 = count.parse().map_err(|_| invalid())?;
    if count <= 0 {
        return Err(invalid());
    }
    Ok(scale * count)
}

fn parse_candles(body: &str) -> Result<Vec<PricePoint>> {
    let response: CandlesResponse = serde_json::from_str(body).context("invalid candles response")?;
    response
        .candles
        .into_iter()
        .filter_map(|candle| candle.mid.map(|mid| (candle.time, mid)))
        .map(|(time, mid)| Ok(PricePoint::new(time, number(&mid.c)?)))
        .collect()
}

/// One line of the pricing stream; heartbeats and blank lines give `None`
fn parse_stream_line(line: &str) -> Result<Option<Tick>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    match serde_json::from_str::<StreamMessage>(line)? {
        StreamMessage::Heartbeat { time } => {
            debug!("Heartbeat at {}", time);
            Ok(None)
        }
        StreamMessage::Price { time, bids, asks } => {
            let (Some(bid), Some(ask)) = (bids.first(), asks.first()) else {
                return Ok(None);
            };
            Ok(Some(Tick::new(time, number(&bid.price)?, number(&ask.price)?)))
        }
    }
}

fn parse_fill(body: &str) -> Result<OrderFill> {
    let response: OrderResponse = serde_json::from_str(body).context("invalid order response")?;
    if let Some(cancel) = response.order_cancel_transaction {
        bail!("order cancelled: {}", cancel.reason);
    }
    let fill = response
        .order_fill_transaction
        .ok_or_else(|| anyhow!("order response carries no fill"))?;
    Ok(OrderFill {
        time: fill.time,
        units: fill
            .units
            .trim()
            .parse()
            .map_err(|_| anyhow!("invalid fill units `{}`", fill.units))?,
        price: number(&fill.price)?,
        realized_pnl: number(&fill.pl)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_granularity() {
        assert_eq!(granularity_secs("S5").unwrap(), 5);
        assert_eq!(granularity_secs("M15").unwrap(), 900);
        assert_eq!(granularity_secs("H4").unwrap(), 14_400);
        assert_eq!(granularity_secs("D").unwrap(), 86_400);
        assert!(granularity_secs("X1").is_err());
        assert!(granularity_secs("").is_err());
    }

    #[test]
    fn test_parse_candles() {
        let body = r#"{"instrument":"EUR_USD","granularity":"S5","candles":[
            {"complete":true,"volume":3,"time":"2024-01-02T00:00:00.000000000Z","mid":{"o":"1.10","h":"1.11","l":"1.09","c":"1.10050"}},
            {"complete":false,"volume":1,"time":"2024-01-02T00:00:05.000000000Z","mid":{"o":"1.10","h":"1.11","l":"1.09","c":"1.10070"}}
        ]}"#;
        let points = parse_candles(body).unwrap();
        assert_eq!(points.len(), 2);
        assert!((points[1].price - 1.1007).abs() < 1e-12);
        assert_eq!(points[1].timestamp - points[0].timestamp, Duration::seconds(5));
    }

    #[test]
    fn test_parse_stream_lines() {
        let price = r#"{"type":"PRICE","time":"2024-01-02T00:00:01.5Z","instrument":"EUR_USD","tradeable":true,
            "bids":[{"price":"1.10000","liquidity":1000000}],"asks":[{"price":"1.10020","liquidity":1000000}]}"#;
        let tick = parse_stream_line(price).unwrap().unwrap();
        assert!((tick.mid() - 1.1001).abs() < 1e-12);

        let heartbeat = r#"{"type":"HEARTBEAT","time":"2024-01-02T00:00:05.000000000Z"}"#;
        assert!(parse_stream_line(heartbeat).unwrap().is_none());
        assert!(parse_stream_line("  ").unwrap().is_none());
        assert!(parse_stream_line("{not json").is_err());
    }

    #[test]
    fn test_parse_fill() {
        let body = r#"{"orderCreateTransaction":{"id":"41"},"orderFillTransaction":{"id":"42",
            "time":"2024-01-02T00:01:00.000000000Z","units":"-100000","price":"1.10010","pl":"12.5000"}}"#;
        let fill = parse_fill(body).unwrap();
        assert_eq!(fill.units, -100_000);
        assert!((fill.realized_pnl - 12.5).abs() < 1e-12);

        let cancelled = r#"{"orderCancelTransaction":{"id":"43","reason":"MARKET_HALTED"}}"#;
        let err = parse_fill(cancelled).unwrap_err();
        assert!(err.to_string().contains("MARKET_HALTED"));
        assert!(parse_fill("{}").is_err());
    }
}
