use crate::data::bar::Bar;
use crate::data::dbn::DbnDecoder;
use crate::data::normalize::normalize;
use crate::databento::Schema;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use csv::ReaderBuilder;
use serde::Deserialize;
use std::path::Path;
use tracing::info;

#[derive(Debug, Deserialize)]
struct CsvRecord {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
    symbol: String,
}

//loads bars from a csv file
pub fn load_csv<P: AsRef<Path>>(path: P) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .context(format!("Failed to open CSV file: {:?}", path))?;

    let mut bars = Vec::new();

    for (index, result) in reader.deserialize().enumerate() {
        let record: CsvRecord =
            result.context(format!("Failed to parse CSV record at line {}", index + 2))?;

        //parse timestamp
        let timestamp = DateTime::parse_from_rfc3339(&record.timestamp)
            .context(format!(
                "Failed to parse timestamp '{}' at line {}",
                record.timestamp,
                index + 2
            ))?
            .with_timezone(&Utc);

        let bar = Bar::new(
            timestamp,
            record.symbol,
            record.open,
            record.high,
            record.low,
            record.close,
            record.volume,
        )
        .context(format!("Invalid bar at line {}", index + 2))?;

        bars.push(bar);
    }

    //sort by timestamp to ensure chronological order
    bars.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));

    Ok(bars)
}

//loads bars for one symbol from a raw zstd-compressed dbn file
//timestamps come out as bar close times, same cleaning as the fetch step
pub fn load_dbn<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let decoder = DbnDecoder::from_zstd_file(path)
        .context(format!("Failed to open DBN file: {:?}", path))?;

    let schema_code = decoder.metadata().schema;
    let schema = Schema::from_dbn(schema_code).context(format!(
        "DBN file {:?} has schema code {}, expected an OHLCV schema",
        path, schema_code
    ))?;

    let records = decoder
        .decode_ohlcv()
        .context(format!("Failed to decode DBN records from {:?}", path))?;
    let decoded = records.len();

    let bars = normalize(records, symbol, schema.bar_interval())
        .iter()
        .map(|r| r.to_bar())
        .collect::<Result<Vec<Bar>, _>>()
        .context(format!("Invalid bar in {:?}", path))?;

    info!(
        path = %path.display(),
        schema = %schema,
        decoded,
        loaded = bars.len(),
        symbol,
        "loaded bars from DBN file"
    );

    Ok(bars)
}

//loads bars for one symbol, choosing the decoder from the file extension
pub fn load_bars<P: AsRef<Path>>(path: P, symbol: &str) -> Result<Vec<Bar>> {
    let path = path.as_ref();
    let is_dbn = path
        .to_str()
        .map(|p| p.ends_with(".dbn.zst"))
        .unwrap_or(false);

    if is_dbn {
        load_dbn(path, symbol)
    } else {
        Ok(filter_by_symbol(&load_csv(path)?, symbol))
    }
}

//filters bars by symbol
pub fn filter_by_symbol(bars: &[Bar], symbol: &str) -> Vec<Bar> {
    bars.iter()
        .filter(|bar| bar.symbol == symbol)
        .cloned()
        .collect()
}
