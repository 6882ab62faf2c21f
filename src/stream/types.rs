use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{DefaultOnNull, serde_as};

use crate::types::Decimal;

/// One update from the public stream of a single currency pair.
///
/// Every frame carries the current top of the order book, the most recent trades and the last
/// traded price. Anything absent from a frame decodes as its zero value, and `null`
/// collections decode as empty.
#[serde_as]
#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Builder)]
#[serde(default)]
pub struct StreamMessage {
    /// Ask side of the book, best price first
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[builder(default)]
    pub asks: Vec<PriceLevel>,
    /// Bid side of the book, best price first
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[builder(default)]
    pub bids: Vec<PriceLevel>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[builder(default)]
    pub target_users: Vec<String>,
    /// Recent executions, newest first
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[builder(default)]
    pub trades: Vec<Trade>,
    #[builder(default)]
    pub last_price: LastPrice,
    /// Pair this update belongs to (e.g., `btc_jpy`)
    #[builder(into)]
    pub currency_pair: String,
    /// Server time of the update, e.g. `2024-05-01 12:00:00.123456`
    #[builder(into)]
    pub timestamp: String,
}

impl StreamMessage {
    #[must_use]
    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    #[must_use]
    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }
}

/// A `[price, volume]` order book level.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "(Decimal, Decimal)", into = "(Decimal, Decimal)")]
pub struct PriceLevel {
    pub price: Decimal,
    pub volume: Decimal,
}

impl PriceLevel {
    #[must_use]
    pub const fn new(price: Decimal, volume: Decimal) -> Self {
        Self { price, volume }
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, volume): (Decimal, Decimal)) -> Self {
        Self { price, volume }
    }
}

impl From<PriceLevel> for (Decimal, Decimal) {
    fn from(level: PriceLevel) -> Self {
        (level.price, level.volume)
    }
}

/// Side of an execution or of the last price move.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeType {
    Bid,
    Ask,
    #[default]
    #[serde(other)]
    Unknown,
}

#[non_exhaustive]
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize, Builder)]
#[serde(default)]
pub struct Trade {
    /// Duplicate of `currency_pair` sent by the feed under a misspelled key
    #[serde(skip_serializing_if = "Option::is_none")]
    #[builder(into)]
    pub currenty_pair: Option<String>,
    pub trade_type: TradeType,
    pub price: Decimal,
    #[builder(into, default)]
    pub currency_pair: String,
    /// Trade id
    pub tid: i64,
    pub amount: Decimal,
    /// Execution time in seconds since the Unix epoch
    pub date: i64,
}

impl Trade {
    /// Pair of this trade, whichever of the two keys the feed filled in.
    #[must_use]
    pub fn pair(&self) -> Option<&str> {
        if self.currency_pair.is_empty() {
            self.currenty_pair.as_deref().filter(|pair| !pair.is_empty())
        } else {
            Some(&self.currency_pair)
        }
    }

    /// Execution time, or `None` if `date` is out of range.
    #[must_use]
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

#[non_exhaustive]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LastPrice {
    pub action: TradeType,
    pub price: Decimal,
}

impl LastPrice {
    #[must_use]
    pub const fn new(action: TradeType, price: Decimal) -> Self {
        Self { action, price }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;
    use serde_json::json;

    use super::*;

    fn frame() -> serde_json::Value {
        json!({
            "asks": [[1_000_005, 0.0125], [1_000_010, 1.5]],
            "bids": [[1_000_000, 0.25]],
            "target_users": [],
            "trades": [
                {
                    "currenty_pair": "btc_jpy",
                    "trade_type": "ask",
                    "price": 1_000_000,
                    "currency_pair": "btc_jpy",
                    "tid": 123_456_789,
                    "amount": 0.01,
                    "date": 1_714_564_800
                }
            ],
            "last_price": { "action": "ask", "price": 1_000_000 },
            "currency_pair": "btc_jpy",
            "timestamp": "2024-05-01 12:00:00.123456"
        })
    }

    #[test]
    fn decodes_full_frame() {
        let message: StreamMessage = serde_json::from_value(frame()).unwrap();

        assert_eq!(message.currency_pair, "btc_jpy");
        assert_eq!(message.asks.len(), 2);
        assert_eq!(message.best_ask(), Some(&PriceLevel::new(dec!(1000005), dec!(0.0125))));
        assert_eq!(message.best_bid().map(|level| level.volume), Some(dec!(0.25)));
        assert_eq!(message.last_price, LastPrice::new(TradeType::Ask, dec!(1000000)));

        let trade = &message.trades[0];
        assert_eq!(trade.trade_type, TradeType::Ask);
        assert_eq!(trade.tid, 123_456_789);
        assert_eq!(trade.amount, dec!(0.01));
        assert_eq!(trade.currenty_pair.as_deref(), Some("btc_jpy"));
        assert_eq!(trade.pair(), Some("btc_jpy"));
        assert_eq!(
            trade.datetime().map(|dt| dt.to_rfc3339()),
            Some("2024-05-01T12:00:00+00:00".to_owned())
        );
    }

    #[test]
    fn missing_collections_default_to_empty() {
        let message: StreamMessage = serde_json::from_value(json!({
            "last_price": { "action": "bid", "price": "250.5" },
            "currency_pair": "mona_jpy",
            "timestamp": "2024-05-01 12:00:00.000001"
        }))
        .unwrap();

        assert!(message.asks.is_empty());
        assert!(message.trades.is_empty());
        assert!(message.target_users.is_empty());
        assert_eq!(message.last_price.price, dec!(250.5));
        assert!(message.best_bid().is_none());
    }

    #[test]
    fn null_collections_decode_as_empty() {
        let message: StreamMessage = serde_json::from_value(json!({
            "asks": null,
            "bids": null,
            "target_users": null,
            "trades": null,
            "last_price": { "action": "ask", "price": 1 },
            "currency_pair": "btc_jpy",
            "timestamp": "2024-05-01 12:00:00.000001"
        }))
        .unwrap();

        assert!(message.asks.is_empty());
        assert!(message.bids.is_empty());
        assert!(message.target_users.is_empty());
        assert!(message.trades.is_empty());
        assert_eq!(message.currency_pair, "btc_jpy");
    }

    #[test]
    fn missing_fields_decode_as_zero_values() {
        let message: StreamMessage =
            serde_json::from_value(json!({ "bids": [[999_995, 2]] })).unwrap();

        assert_eq!(message.last_price, LastPrice::default());
        assert_eq!(message.last_price.action, TradeType::Unknown);
        assert_eq!(message.last_price.price, Decimal::ZERO);
        assert!(message.currency_pair.is_empty());
        assert!(message.timestamp.is_empty());
        assert_eq!(message.best_bid(), Some(&PriceLevel::new(dec!(999995), dec!(2))));

        let empty: StreamMessage = serde_json::from_value(json!({})).unwrap();
        assert_eq!(empty, StreamMessage::default());
    }

    #[test]
    fn trade_with_only_misspelled_pair_key() {
        let trade: Trade = serde_json::from_value(json!({
            "currenty_pair": "xem_jpy",
            "trade_type": "bid",
            "price": 12.5,
            "tid": 42,
            "amount": 100,
            "date": 1_714_564_800
        }))
        .unwrap();

        assert!(trade.currency_pair.is_empty());
        assert_eq!(trade.pair(), Some("xem_jpy"));
        assert_eq!(trade.price, dec!(12.5));

        let bare: Trade = serde_json::from_value(json!({ "tid": 7 })).unwrap();
        assert_eq!(bare.pair(), None);
        assert_eq!(bare.trade_type, TradeType::Unknown);
    }

    #[test]
    fn unknown_trade_type_is_preserved_as_unknown() {
        let last: LastPrice =
            serde_json::from_value(json!({ "action": "sideways", "price": 1 })).unwrap();
        assert_eq!(last.action, TradeType::Unknown);
    }

    #[test]
    fn price_level_requires_two_elements() {
        serde_json::from_value::<PriceLevel>(json!([1])).unwrap_err();
    }

    #[test]
    fn builder_fills_defaults() {
        let message = StreamMessage::builder()
            .last_price(LastPrice::new(TradeType::Bid, dec!(10)))
            .currency_pair("eth_jpy")
            .timestamp("2024-05-01 12:00:00.000000")
            .build();

        assert!(message.bids.is_empty());
        assert_eq!(message.currency_pair, "eth_jpy");
    }
}
