use crate::types::Timeframe;
use std::collections::HashSet;
use std::env;
use std::str::FromStr;
use thiserror::Error;

/// Tolerance used when checking that timeframe weights sum to one.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Configuration errors. Any of these aborts startup.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("at least one timeframe must be configured")]
    NoTimeframes,

    #[error("timeframe {0} is configured more than once")]
    DuplicateTimeframe(Timeframe),

    #[error("weight for {timeframe} must be positive, got {weight}")]
    InvalidWeight { timeframe: Timeframe, weight: f64 },

    #[error("timeframe weights must sum to 1.0, got {0}")]
    WeightSum(f64),

    #[error("could not parse timeframe weights: {0}")]
    WeightFormat(String),

    #[error("window capacity {capacity} is smaller than the required history {required}")]
    CapacityTooSmall { capacity: usize, required: usize },

    #[error("ICT timeframe {0} is not one of the configured timeframes")]
    IctTimeframe(Timeframe),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("could not parse {key}={value}")]
    EnvValue { key: String, value: String },
}

/// Weight of one timeframe in the confluence vote.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeframeWeight {
    pub timeframe: Timeframe,
    pub weight: f64,
}

impl TimeframeWeight {
    pub fn new(timeframe: Timeframe, weight: f64) -> Self {
        Self { timeframe, weight }
    }
}

/// Parse `"15m:0.35,1h:0.35,1d:0.30"`.
pub fn parse_weights(s: &str) -> Result<Vec<TimeframeWeight>, ConfigError> {
    s.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            let (tf, weight) = part
                .split_once(':')
                .ok_or_else(|| ConfigError::WeightFormat(part.to_string()))?;
            let timeframe = tf
                .parse::<Timeframe>()
                .map_err(|_| ConfigError::WeightFormat(format!("unknown timeframe {}", tf)))?;
            let weight = weight
                .trim()
                .parse::<f64>()
                .map_err(|_| ConfigError::WeightFormat(format!("bad weight in {}", part)))?;
            Ok(TimeframeWeight::new(timeframe, weight))
        })
        .collect()
}

/// Indicator periods and RSI bands.
#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorConfig {
    pub sma_fast: usize,
    pub sma_slow: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            sma_fast: 50,
            sma_slow: 200,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
        }
    }
}

impl IndicatorConfig {
    /// Candles needed before every indicator has a current and a previous value.
    pub fn required_history(&self) -> usize {
        self.sma_fast
            .max(self.sma_slow)
            .max(self.rsi_period + 2)
            .max(self.macd_slow + self.macd_signal)
    }
}

/// Point values used by the timeframe evaluator.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub trend_points: i32,
    pub momentum_points: i32,
    pub macd_points: i32,
    /// Awarded when two or more independent ICT patterns agree.
    pub ict_confluence_points: i32,
    /// Awarded when a single ICT pattern points one way.
    pub ict_single_points: i32,
    /// Subtracted per ICT pattern that points the other way.
    pub ict_conflict_penalty: i32,
    /// |score| needed for a Bullish/Bearish verdict.
    pub direction_threshold: i32,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            trend_points: 30,
            momentum_points: 20,
            macd_points: 20,
            ict_confluence_points: 20,
            ict_single_points: 5,
            ict_conflict_penalty: 5,
            direction_threshold: 30,
        }
    }
}

impl ScoringConfig {
    /// Largest attainable |score|, used to normalize local confidence.
    pub fn max_score(&self) -> i32 {
        self.trend_points + self.momentum_points + self.macd_points + self.ict_confluence_points
    }
}

/// Multi-timeframe vote parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationConfig {
    /// The winning weighted mass must exceed this, otherwise Neutral.
    pub min_agreement: f64,
    pub agreement_weight: f64,
    pub confidence_weight: f64,
    pub ict_boost_cap: f64,
    /// Added when the winning side trades from its own half of the dealing range.
    pub zone_points: f64,
    /// Replaces `zone_points` when price also sits inside the OTE band.
    pub ote_points: f64,
}

impl Default for AggregationConfig {
    fn default() -> Self {
        Self {
            min_agreement: 0.5,
            agreement_weight: 0.4,
            confidence_weight: 0.6,
            ict_boost_cap: 25.0,
            zone_points: 10.0,
            ote_points: 15.0,
        }
    }
}

/// ICT detector parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct IctConfig {
    pub atr_period: usize,
    /// A candle is impulsive when its range exceeds this multiple of ATR.
    pub impulse_atr_multiple: f64,
    /// Candles whose extreme an impulsive close must clear to count as a breakout.
    pub breakout_lookback: usize,
    /// How far back from the impulse to search for the opposite candle.
    pub order_block_lookback: usize,
    /// Candles on each side of a confirmed pivot.
    pub pivot_lookback: usize,
    /// Minimum gap size as a fraction of price.
    pub min_gap_pct: f64,
    pub consolidation_len: usize,
    /// A segment is a consolidation when its range is within this multiple of ATR.
    pub consolidation_atr_multiple: f64,
    pub phase_min_candles: usize,
    /// Candles that define the dealing range for premium/discount.
    pub range_lookback: usize,
    /// Optimal trade entry band, as retracement fractions of the range.
    pub ote_start: f64,
    pub ote_end: f64,
    /// Recent candles checked for liquidity sweeps.
    pub sweep_lookback: usize,
    /// How far past a pool a wick must reach, as a fraction of the level.
    pub sweep_threshold: f64,
}

impl Default for IctConfig {
    fn default() -> Self {
        Self {
            atr_period: 14,
            impulse_atr_multiple: 1.5,
            breakout_lookback: 10,
            order_block_lookback: 5,
            pivot_lookback: 2,
            min_gap_pct: 0.0,
            consolidation_len: 10,
            consolidation_atr_multiple: 3.0,
            phase_min_candles: 30,
            range_lookback: 50,
            ote_start: 0.62,
            ote_end: 0.79,
            sweep_lookback: 10,
            sweep_threshold: 0.001,
        }
    }
}

/// Everything the signal engine needs.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub timeframes: Vec<TimeframeWeight>,
    pub window_capacity: usize,
    pub ict_timeframe: Timeframe,
    pub indicators: IndicatorConfig,
    pub scoring: ScoringConfig,
    pub aggregation: AggregationConfig,
    pub ict: IctConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timeframes: vec![
                TimeframeWeight::new(Timeframe::M15, 0.35),
                TimeframeWeight::new(Timeframe::H1, 0.35),
                TimeframeWeight::new(Timeframe::D1, 0.30),
            ],
            window_capacity: 500,
            ict_timeframe: Timeframe::H1,
            indicators: IndicatorConfig::default(),
            scoring: ScoringConfig::default(),
            aggregation: AggregationConfig::default(),
            ict: IctConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn weight(&self, timeframe: Timeframe) -> Option<f64> {
        self.timeframes
            .iter()
            .find(|w| w.timeframe == timeframe)
            .map(|w| w.weight)
    }

    pub fn has_timeframe(&self, timeframe: Timeframe) -> bool {
        self.weight(timeframe).is_some()
    }

    pub fn required_history(&self) -> usize {
        self.indicators.required_history()
    }

    /// Reject configurations the engine cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeframes.is_empty() {
            return Err(ConfigError::NoTimeframes);
        }

        let mut seen = HashSet::new();
        for w in &self.timeframes {
            if !seen.insert(w.timeframe) {
                return Err(ConfigError::DuplicateTimeframe(w.timeframe));
            }
            if !w.weight.is_finite() || w.weight <= 0.0 {
                return Err(ConfigError::InvalidWeight {
                    timeframe: w.timeframe,
                    weight: w.weight,
                });
            }
        }

        let sum: f64 = self.timeframes.iter().map(|w| w.weight).sum();
        if (sum - 1.0).abs() > WEIGHT_EPSILON {
            return Err(ConfigError::WeightSum(sum));
        }

        if !self.has_timeframe(self.ict_timeframe) {
            return Err(ConfigError::IctTimeframe(self.ict_timeframe));
        }

        let ind = &self.indicators;
        if [ind.sma_fast, ind.sma_slow, ind.rsi_period, ind.macd_fast, ind.macd_slow, ind.macd_signal]
            .contains(&0)
        {
            return Err(ConfigError::InvalidParameter(
                "indicator periods must be positive".to_string(),
            ));
        }
        if ind.macd_fast >= ind.macd_slow {
            return Err(ConfigError::InvalidParameter(
                "MACD fast period must be shorter than the slow period".to_string(),
            ));
        }
        if !(0.0 < ind.rsi_oversold && ind.rsi_oversold < ind.rsi_overbought && ind.rsi_overbought < 100.0) {
            return Err(ConfigError::InvalidParameter(
                "RSI bands must satisfy 0 < oversold < overbought < 100".to_string(),
            ));
        }

        let required = self.required_history();
        if self.window_capacity < required {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.window_capacity,
                required,
            });
        }

        if self.scoring.direction_threshold <= 0 || self.scoring.max_score() <= 0 {
            return Err(ConfigError::InvalidParameter(
                "score threshold and point values must be positive".to_string(),
            ));
        }

        let agg = &self.aggregation;
        if !(0.0..1.0).contains(&agg.min_agreement) {
            return Err(ConfigError::InvalidParameter(
                "min_agreement must be in [0, 1)".to_string(),
            ));
        }
        if [
            agg.agreement_weight,
            agg.confidence_weight,
            agg.ict_boost_cap,
            agg.zone_points,
            agg.ote_points,
        ]
        .iter()
        .any(|v| *v < 0.0)
        {
            return Err(ConfigError::InvalidParameter(
                "aggregation weights and ICT boosts must be non-negative".to_string(),
            ));
        }

        let ict = &self.ict;
        if ict.atr_period == 0
            || ict.pivot_lookback == 0
            || ict.consolidation_len < 2
            || ict.range_lookback < 2
            || ict.sweep_lookback == 0
        {
            return Err(ConfigError::InvalidParameter(
                "ICT lookbacks must be positive".to_string(),
            ));
        }
        if !(0.0 < ict.ote_start && ict.ote_start < ict.ote_end && ict.ote_end < 1.0) {
            return Err(ConfigError::InvalidParameter(
                "OTE band must satisfy 0 < start < end < 1".to_string(),
            ));
        }
        if ict.sweep_threshold < 0.0 {
            return Err(ConfigError::InvalidParameter(
                "sweep threshold must be non-negative".to_string(),
            ));
        }

        // Structure events are logged once their pivot is confirmed inside the window.
        let pivot_span = 2 * ict.pivot_lookback + 1;
        if self.window_capacity < pivot_span {
            return Err(ConfigError::CapacityTooSmall {
                capacity: self.window_capacity,
                required: pivot_span,
            });
        }

        Ok(())
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Signal engine settings.
    pub engine: EngineConfig,
}

/// Parse `key` from `vars`, falling back to `default` only when it is unset.
fn env_parse<T: FromStr>(
    vars: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T, ConfigError> {
    match vars(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::EnvValue {
            key: key.to_string(),
            value: raw,
        }),
        None => Ok(default),
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Fails when a variable is set but cannot be parsed; call
    /// [`EngineConfig::validate`] before using the result.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    pub fn from_vars(vars: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = EngineConfig::default();
        let vars = &vars;

        let timeframes = match vars("SIGNAL_TIMEFRAME_WEIGHTS") {
            Some(s) => parse_weights(&s)?,
            None => defaults.timeframes.clone(),
        };

        let ind = defaults.indicators;
        let scoring = defaults.scoring;
        let agg = defaults.aggregation;
        let ict = defaults.ict;

        let engine = EngineConfig {
            timeframes,
            window_capacity: env_parse(vars, "SIGNAL_WINDOW_CAPACITY", defaults.window_capacity)?,
            ict_timeframe: env_parse(vars, "SIGNAL_ICT_TIMEFRAME", defaults.ict_timeframe)?,
            indicators: IndicatorConfig {
                sma_fast: env_parse(vars, "SMA_FAST", ind.sma_fast)?,
                sma_slow: env_parse(vars, "SMA_SLOW", ind.sma_slow)?,
                rsi_period: env_parse(vars, "RSI_PERIOD", ind.rsi_period)?,
                rsi_overbought: env_parse(vars, "RSI_OVERBOUGHT", ind.rsi_overbought)?,
                rsi_oversold: env_parse(vars, "RSI_OVERSOLD", ind.rsi_oversold)?,
                macd_fast: env_parse(vars, "MACD_FAST", ind.macd_fast)?,
                macd_slow: env_parse(vars, "MACD_SLOW", ind.macd_slow)?,
                macd_signal: env_parse(vars, "MACD_SIGNAL", ind.macd_signal)?,
            },
            scoring: ScoringConfig {
                trend_points: env_parse(vars, "SCORE_TREND_POINTS", scoring.trend_points)?,
                momentum_points: env_parse(vars, "SCORE_MOMENTUM_POINTS", scoring.momentum_points)?,
                macd_points: env_parse(vars, "SCORE_MACD_POINTS", scoring.macd_points)?,
                ict_confluence_points: env_parse(
                    vars,
                    "SCORE_ICT_CONFLUENCE_POINTS",
                    scoring.ict_confluence_points,
                )?,
                ict_single_points: env_parse(
                    vars,
                    "SCORE_ICT_SINGLE_POINTS",
                    scoring.ict_single_points,
                )?,
                ict_conflict_penalty: env_parse(
                    vars,
                    "SCORE_ICT_CONFLICT_PENALTY",
                    scoring.ict_conflict_penalty,
                )?,
                direction_threshold: env_parse(
                    vars,
                    "SCORE_DIRECTION_THRESHOLD",
                    scoring.direction_threshold,
                )?,
            },
            aggregation: AggregationConfig {
                min_agreement: env_parse(vars, "CONFLUENCE_MIN_AGREEMENT", agg.min_agreement)?,
                agreement_weight: env_parse(
                    vars,
                    "CONFLUENCE_AGREEMENT_WEIGHT",
                    agg.agreement_weight,
                )?,
                confidence_weight: env_parse(
                    vars,
                    "CONFLUENCE_CONFIDENCE_WEIGHT",
                    agg.confidence_weight,
                )?,
                ict_boost_cap: env_parse(vars, "ICT_BOOST_CAP", agg.ict_boost_cap)?,
                zone_points: env_parse(vars, "ICT_ZONE_POINTS", agg.zone_points)?,
                ote_points: env_parse(vars, "ICT_OTE_POINTS", agg.ote_points)?,
            },
            ict: IctConfig {
                atr_period: env_parse(vars, "ICT_ATR_PERIOD", ict.atr_period)?,
                impulse_atr_multiple: env_parse(
                    vars,
                    "ICT_IMPULSE_ATR_MULTIPLE",
                    ict.impulse_atr_multiple,
                )?,
                breakout_lookback: env_parse(vars, "ICT_BREAKOUT_LOOKBACK", ict.breakout_lookback)?,
                order_block_lookback: env_parse(
                    vars,
                    "ICT_ORDER_BLOCK_LOOKBACK",
                    ict.order_block_lookback,
                )?,
                pivot_lookback: env_parse(vars, "ICT_PIVOT_LOOKBACK", ict.pivot_lookback)?,
                min_gap_pct: env_parse(vars, "ICT_MIN_GAP_PCT", ict.min_gap_pct)?,
                consolidation_len: env_parse(vars, "ICT_CONSOLIDATION_LEN", ict.consolidation_len)?,
                consolidation_atr_multiple: env_parse(
                    vars,
                    "ICT_CONSOLIDATION_ATR_MULTIPLE",
                    ict.consolidation_atr_multiple,
                )?,
                phase_min_candles: env_parse(vars, "ICT_PHASE_MIN_CANDLES", ict.phase_min_candles)?,
                range_lookback: env_parse(vars, "ICT_RANGE_LOOKBACK", ict.range_lookback)?,
                ote_start: env_parse(vars, "ICT_OTE_START", ict.ote_start)?,
                ote_end: env_parse(vars, "ICT_OTE_END", ict.ote_end)?,
                sweep_lookback: env_parse(vars, "ICT_SWEEP_LOOKBACK", ict.sweep_lookback)?,
                sweep_threshold: env_parse(vars, "ICT_SWEEP_THRESHOLD", ict.sweep_threshold)?,
            },
        };

        Ok(Self {
            host: vars("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env_parse(vars, "PORT", 8000)?,
            engine,
        })
    }
}
