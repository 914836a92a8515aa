use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
#[error("Invalid bar type '{input}': {reason}")]
pub struct BarTypeError {
    pub input: String,
    pub reason: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarAggregation {
    Second,
    Minute,
    Hour,
    Day,
}

impl BarAggregation {
    pub fn as_str(&self) -> &'static str {
        match self {
            BarAggregation::Second => "SECOND",
            BarAggregation::Minute => "MINUTE",
            BarAggregation::Hour => "HOUR",
            BarAggregation::Day => "DAY",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "SECOND" => Some(BarAggregation::Second),
            "MINUTE" => Some(BarAggregation::Minute),
            "HOUR" => Some(BarAggregation::Hour),
            "DAY" => Some(BarAggregation::Day),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PriceType {
    Bid,
    Ask,
    Mid,
    Last,
}

impl PriceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceType::Bid => "BID",
            PriceType::Ask => "ASK",
            PriceType::Mid => "MID",
            PriceType::Last => "LAST",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "BID" => Some(PriceType::Bid),
            "ASK" => Some(PriceType::Ask),
            "MID" => Some(PriceType::Mid),
            "LAST" => Some(PriceType::Last),
            _ => None,
        }
    }
}

//whether bars come from the data source or are built by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AggregationSource {
    External,
    Internal,
}

impl AggregationSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationSource::External => "EXTERNAL",
            AggregationSource::Internal => "INTERNAL",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "EXTERNAL" => Some(AggregationSource::External),
            "INTERNAL" => Some(AggregationSource::Internal),
            _ => None,
        }
    }
}

//identifies a bar stream, written as
//{instrument_id}-{step}-{aggregation}-{price_type}-{source}
//eg esh4.glbx-1-minute-last-external
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BarType {
    pub instrument_id: String,
    pub step: u32,
    pub aggregation: BarAggregation,
    pub price_type: PriceType,
    pub source: AggregationSource,
}

impl BarType {
    //one-minute last-price bars from the data source
    pub fn minute_last_external(instrument_id: &str) -> Self {
        BarType {
            instrument_id: instrument_id.to_string(),
            step: 1,
            aggregation: BarAggregation::Minute,
            price_type: PriceType::Last,
            source: AggregationSource::External,
        }
    }

    //time covered by one bar
    pub fn interval(&self) -> Duration {
        let step = i64::from(self.step);
        match self.aggregation {
            BarAggregation::Second => Duration::seconds(step),
            BarAggregation::Minute => Duration::minutes(step),
            BarAggregation::Hour => Duration::hours(step),
            BarAggregation::Day => Duration::days(step),
        }
    }
}

impl fmt::Display for BarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}-{}-{}-{}",
            self.instrument_id,
            self.step,
            self.aggregation.as_str(),
            self.price_type.as_str(),
            self.source.as_str()
        )
    }
}

impl FromStr for BarType {
    type Err = BarTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = |reason| BarTypeError {
            input: s.to_string(),
            reason,
        };

        //instrument ids may themselves contain dashes (spreads), so split from the right
        let mut parts = s.rsplitn(5, '-');
        let source = parts.next().ok_or_else(|| err("missing source"))?;
        let price_type = parts.next().ok_or_else(|| err("missing price type"))?;
        let aggregation = parts.next().ok_or_else(|| err("missing aggregation"))?;
        let step = parts.next().ok_or_else(|| err("missing step"))?;
        let instrument_id = parts.next().ok_or_else(|| err("missing instrument id"))?;

        if instrument_id.is_empty() {
            return Err(err("missing instrument id"));
        }

        let step: u32 = step.parse().map_err(|_| err("step is not a number"))?;
        if step == 0 {
            return Err(err("step must be positive"));
        }

        Ok(BarType {
            instrument_id: instrument_id.to_string(),
            step,
            aggregation: BarAggregation::parse(aggregation)
                .ok_or_else(|| err("unknown aggregation"))?,
            price_type: PriceType::parse(price_type).ok_or_else(|| err("unknown price type"))?,
            source: AggregationSource::parse(source).ok_or_else(|| err("unknown source"))?,
        })
    }
}
