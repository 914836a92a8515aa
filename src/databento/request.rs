use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

//bar aggregation granularity of an OHLCV request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Schema {
    #[serde(rename = "ohlcv-1s")]
    Ohlcv1S,
    #[serde(rename = "ohlcv-1m")]
    Ohlcv1M,
    #[serde(rename = "ohlcv-1h")]
    Ohlcv1H,
    #[serde(rename = "ohlcv-1d")]
    Ohlcv1D,
}

impl Schema {
    pub fn as_str(&self) -> &'static str {
        match self {
            Schema::Ohlcv1S => "ohlcv-1s",
            Schema::Ohlcv1M => "ohlcv-1m",
            Schema::Ohlcv1H => "ohlcv-1h",
            Schema::Ohlcv1D => "ohlcv-1d",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "ohlcv-1s" => Some(Schema::Ohlcv1S),
            "ohlcv-1m" => Some(Schema::Ohlcv1M),
            "ohlcv-1h" => Some(Schema::Ohlcv1H),
            "ohlcv-1d" => Some(Schema::Ohlcv1D),
            _ => None,
        }
    }

    //maps the schema code found in a DBN metadata header
    pub fn from_dbn(code: u16) -> Option<Self> {
        match code {
            5 => Some(Schema::Ohlcv1S),
            6 => Some(Schema::Ohlcv1M),
            7 => Some(Schema::Ohlcv1H),
            8 => Some(Schema::Ohlcv1D),
            _ => None,
        }
    }

    //length of one bar, the distance from a bar's open time to its close time
    pub fn bar_interval(&self) -> Duration {
        match self {
            Schema::Ohlcv1S => Duration::seconds(1),
            Schema::Ohlcv1M => Duration::minutes(1),
            Schema::Ohlcv1H => Duration::hours(1),
            Schema::Ohlcv1D => Duration::days(1),
        }
    }
}

impl fmt::Display for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//symbology type of the requested symbols
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SType {
    InstrumentId,
    RawSymbol,
    Continuous,
    Parent,
}

impl SType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SType::InstrumentId => "instrument_id",
            SType::RawSymbol => "raw_symbol",
            SType::Continuous => "continuous",
            SType::Parent => "parent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "instrument_id" => Some(SType::InstrumentId),
            "raw_symbol" => Some(SType::RawSymbol),
            "continuous" => Some(SType::Continuous),
            "parent" => Some(SType::Parent),
            _ => None,
        }
    }
}

impl fmt::Display for SType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

//parameters of a single timeseries.get_range call
//filter_symbol selects which resolved contract survives normalization. It
//is independent of symbols, so a parent request such as ES.FUT can be
//narrowed to one contract
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RangeRequest {
    pub start: String,
    pub end: String,
    pub dataset: String,
    pub symbols: Vec<String>,
    pub stype_in: SType,
    pub schema: Schema,
    pub filter_symbol: String,
}

impl Default for RangeRequest {
    fn default() -> Self {
        RangeRequest {
            start: "2024-01-01T00:00:00".to_string(),
            end: "2024-12-31T23:59:59".to_string(),
            dataset: "GLBX.MDP3".to_string(),
            symbols: vec!["ES.FUT".to_string()],
            stype_in: SType::Parent,
            schema: Schema::Ohlcv1M,
            filter_symbol: "ESH4".to_string(),
        }
    }
}

impl RangeRequest {
    //first requested symbol, used for output naming
    pub fn primary_symbol(&self) -> &str {
        self.symbols.first().map(String::as_str).unwrap_or_default()
    }

    fn file_stem(&self) -> String {
        format!(
            "{}_{}_{}-{}.{}",
            self.dataset,
            self.primary_symbol(),
            self.start,
            self.end,
            self.schema
        )
    }

    //where the raw compressed response is cached
    pub fn raw_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.dbn.zst", self.file_stem()))
    }

    //where the cleaned bars are written
    pub fn csv_path(&self, data_dir: &Path) -> PathBuf {
        data_dir.join(format!("{}.csv", self.file_stem()))
    }

    pub(crate) fn range_params(&self) -> Vec<(&'static str, String)> {
        vec![
            ("dataset", self.dataset.clone()),
            ("start", self.start.clone()),
            ("end", self.end.clone()),
            ("symbols", self.symbols.join(",")),
            ("schema", self.schema.to_string()),
            ("stype_in", self.stype_in.to_string()),
            ("stype_out", SType::InstrumentId.to_string()),
        ]
    }
}
