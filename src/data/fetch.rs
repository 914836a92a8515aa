use crate::data::dbn::decode_zstd_ohlcv;
use crate::data::normalize::normalize;
use crate::data::record::OhlcvRecord;
use crate::databento::{describe, FetchError, HistoricalClient, RangeRequest, VendorMetadata};
use csv::WriterBuilder;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

//fetches one bar range, caches the raw response and a cleaned csv under data_dir,
//and returns the cleaned rows
//
//existing files at the computed paths are overwritten
pub fn fetch_and_store<C>(
    client: &C,
    request: &RangeRequest,
    data_dir: &Path,
) -> Result<Vec<OhlcvRecord>, FetchError>
where
    C: HistoricalClient + ?Sized,
{
    if request.symbols.is_empty() {
        return Err(FetchError::InvalidRequest(
            "at least one symbol is required".to_string(),
        ));
    }

    info!(
        dataset = %request.dataset,
        symbols = ?request.symbols,
        start = %request.start,
        end = %request.end,
        schema = %request.schema,
        "requesting bar range"
    );
    let raw = client.get_range(request)?;

    fs::create_dir_all(data_dir)?;
    let raw_path = request.raw_path(data_dir);
    fs::write(&raw_path, &raw)?;
    info!(path = %raw_path.display(), bytes = raw.len(), "saved raw response");

    let records = decode_zstd_ohlcv(&raw)?;
    info!(records = records.len(), "decoded response");

    let cleaned = normalize(
        records,
        &request.filter_symbol,
        request.schema.bar_interval(),
    );
    if cleaned.is_empty() {
        warn!(
            filter_symbol = %request.filter_symbol,
            symbols = ?request.symbols,
            "no bars matched the filter symbol, cleaned output is empty"
        );
    }

    let csv_path = request.csv_path(data_dir);
    write_csv(&cleaned, &csv_path)?;
    info!(path = %csv_path.display(), rows = cleaned.len(), "saved cleaned bars");

    Ok(cleaned)
}

//lists vendor metadata for the request, then fetches and caches it
pub fn describe_and_fetch<C>(
    client: &C,
    request: &RangeRequest,
    data_dir: &Path,
) -> Result<(VendorMetadata, Vec<OhlcvRecord>), FetchError>
where
    C: HistoricalClient + ?Sized,
{
    let metadata = describe(client, request)?;
    let records = fetch_and_store(client, request, data_dir)?;
    Ok((metadata, records))
}

//writes records with a header row, even when there are none
pub fn write_csv(records: &[OhlcvRecord], path: &Path) -> Result<(), FetchError> {
    let mut writer = WriterBuilder::new().has_headers(false).from_path(path)?;
    writer.write_record(OhlcvRecord::COLUMNS)?;

    for record in records {
        writer.serialize(record)?;
    }

    writer.flush()?;
    Ok(())
}
