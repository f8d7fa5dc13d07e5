use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Candle interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    M1,
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

/// Parses either the exchange spelling (`15m`) or the wire key (`m15`).
impl FromStr for Timeframe {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1m" | "m1" => Ok(Timeframe::M1),
            "5m" | "m5" => Ok(Timeframe::M5),
            "15m" | "m15" => Ok(Timeframe::M15),
            "30m" | "m30" => Ok(Timeframe::M30),
            "1h" | "h1" | "60m" => Ok(Timeframe::H1),
            "4h" | "h4" => Ok(Timeframe::H4),
            "1d" | "d1" | "24h" => Ok(Timeframe::D1),
            "1w" | "w1" => Ok(Timeframe::W1),
            _ => Err(ValidationError::UnknownTimeframe(s.to_string())),
        }
    }
}

impl Timeframe {
    /// Exchange-style label, used in rationale text.
    pub fn label(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::M30 => "30m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
            Timeframe::W1 => "1w",
        }
    }

    /// Bar length in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Timeframe::M1 => 60_000,
            Timeframe::M5 => 300_000,
            Timeframe::M15 => 900_000,
            Timeframe::M30 => 1_800_000,
            Timeframe::H1 => 3_600_000,
            Timeframe::H4 => 14_400_000,
            Timeframe::D1 => 86_400_000,
            Timeframe::W1 => 604_800_000,
        }
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A closed OHLCV bar. `t` is the bar open time in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    #[serde(rename = "t")]
    pub time: i64,
    #[serde(rename = "o")]
    pub open: f64,
    #[serde(rename = "h")]
    pub high: f64,
    #[serde(rename = "l")]
    pub low: f64,
    #[serde(rename = "c")]
    pub close: f64,
    #[serde(rename = "v", default)]
    pub volume: f64,
}

impl Candle {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn is_bearish(&self) -> bool {
        self.close < self.open
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    /// True when the candle's range overlaps `[low, high]`.
    pub fn touches(&self, low: f64, high: f64) -> bool {
        self.low <= high && self.high >= low
    }

    /// Check the OHLC invariants that do not depend on neighbouring candles.
    pub fn validate(&self) -> Result<(), ValidationError> {
        let prices = [self.open, self.high, self.low, self.close];
        if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
            return Err(ValidationError::InvalidPrice { time: self.time });
        }
        if !self.volume.is_finite() || self.volume < 0.0 {
            return Err(ValidationError::InvalidVolume { time: self.time });
        }
        if self.high < self.open.max(self.close) {
            return Err(ValidationError::HighBelowBody { time: self.time });
        }
        if self.low > self.open.min(self.close) {
            return Err(ValidationError::LowAboveBody { time: self.time });
        }
        Ok(())
    }
}

fn default_closed() -> bool {
    true
}

/// Closed-candle event delivered by the data feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandleEvent {
    pub symbol: String,
    pub interval: String,
    pub candle: Candle,
    /// Feeds that also stream in-progress bars must set this to false for them.
    #[serde(default = "default_closed")]
    pub closed: bool,
}

/// Reasons a candle is refused by the store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("candle {time}: prices must be finite and positive")]
    InvalidPrice { time: i64 },

    #[error("candle {time}: volume must be finite and non-negative")]
    InvalidVolume { time: i64 },

    #[error("candle {time}: high is below open/close")]
    HighBelowBody { time: i64 },

    #[error("candle {time}: low is above open/close")]
    LowAboveBody { time: i64 },

    #[error("duplicate candle timestamp {time}")]
    DuplicateTimestamp { time: i64 },

    #[error("candle timestamp {time} is older than the last stored candle {last}")]
    NonMonotonicTimestamp { time: i64, last: i64 },

    #[error("candle {time} has not closed yet")]
    FormingCandle { time: i64 },

    #[error("unknown or unconfigured interval: {0}")]
    UnknownTimeframe(String),

    #[error("symbol must not be empty")]
    EmptySymbol,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeframe_parsing() {
        assert_eq!("15m".parse(), Ok(Timeframe::M15));
        assert_eq!("m15".parse(), Ok(Timeframe::M15));
        assert_eq!(" 1H".parse(), Ok(Timeframe::H1));
        assert_eq!("d1".parse(), Ok(Timeframe::D1));
        assert_eq!(
            "2h".parse::<Timeframe>(),
            Err(ValidationError::UnknownTimeframe("2h".to_string()))
        );
    }

    #[test]
    fn test_timeframe_serializes_as_wire_key() {
        assert_eq!(serde_json::to_string(&Timeframe::M15).unwrap(), "\"m15\"");
        assert_eq!(serde_json::to_string(&Timeframe::D1).unwrap(), "\"d1\"");
    }

    #[test]
    fn test_candle_wire_format() {
        let candle = Candle::new(1_700_000_000_000, 10.0, 11.0, 9.5, 10.5, 42.0);
        let json = serde_json::to_string(&candle).unwrap();
        assert_eq!(
            json,
            r#"{"t":1700000000000,"o":10.0,"h":11.0,"l":9.5,"c":10.5,"v":42.0}"#
        );
    }

    #[test]
    fn test_candle_validation() {
        assert!(Candle::new(1, 10.0, 11.0, 9.0, 10.5, 1.0).validate().is_ok());
        assert_eq!(
            Candle::new(1, 10.0, 10.2, 9.0, 10.5, 1.0).validate(),
            Err(ValidationError::HighBelowBody { time: 1 })
        );
        assert_eq!(
            Candle::new(1, 10.0, 11.0, 10.1, 10.5, 1.0).validate(),
            Err(ValidationError::LowAboveBody { time: 1 })
        );
        assert_eq!(
            Candle::new(1, f64::NAN, 11.0, 9.0, 10.5, 1.0).validate(),
            Err(ValidationError::InvalidPrice { time: 1 })
        );
        assert_eq!(
            Candle::new(1, 10.0, 11.0, 9.0, 10.5, -1.0).validate(),
            Err(ValidationError::InvalidVolume { time: 1 })
        );
    }

    #[test]
    fn test_candle_event_defaults_to_closed() {
        let event: CandleEvent = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","interval":"1h","candle":{"t":0,"o":1,"h":2,"l":0.5,"c":1.5}}"#,
        )
        .unwrap();
        assert!(event.closed);
        assert_eq!(event.candle.volume, 0.0);
    }
}
