//decoder for the subset of databento binary encoding (dbn) this crate consumes:
//the metadata header with its symbology mappings, and ohlcv records

use crate::data::record::OhlcvRecord;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, ErrorKind, Read};
use std::path::Path;
use thiserror::Error;

const MAGIC: &[u8; 3] = b"DBN";
const MAX_VERSION: u8 = 3;
const PREFIX_LEN: usize = 8;
//far above any real header, bounds what a corrupt length can make us buffer
const MAX_METADATA_LEN: usize = 64 * 1024 * 1024;
const DATASET_CSTR_LEN: usize = 16;
const V1_SYMBOL_CSTR_LEN: usize = 22;
const V1_RESERVED_LEN: usize = 47;
const RESERVED_LEN: usize = 53;
const RECORD_HEADER_LEN: usize = 16;
const OHLCV_RECORD_LEN: usize = RECORD_HEADER_LEN + 40;

//prices are fixed-point integers in units of 1e-9
pub const FIXED_PRICE_SCALE: f64 = 1_000_000_000.0;

pub const STYPE_INSTRUMENT_ID: u8 = 0;

//rtypes of ohlcv records: deprecated, 1s, 1m, 1h, 1d, eod
const OHLCV_RTYPES: [u8; 6] = [0x11, 0x20, 0x21, 0x22, 0x23, 0x24];

#[derive(Error, Debug)]
pub enum DbnError {
    #[error("I/O error reading DBN stream: {0}")]
    Io(#[from] io::Error),
    #[error("not a DBN stream (bad magic bytes)")]
    InvalidMagic,
    #[error("unsupported DBN version {0}")]
    UnsupportedVersion(u8),
    #[error("truncated DBN input while reading {0}")]
    Truncated(&'static str),
    #[error("DBN metadata of {0} bytes exceeds the {max} byte limit", max = MAX_METADATA_LEN)]
    MetadataTooLarge(usize),
    #[error("invalid DBN symbol field length {0}")]
    InvalidSymbolLength(usize),
    #[error("invalid UTF-8 in {0}")]
    InvalidUtf8(&'static str),
    #[error("invalid symbol mapping date {0}")]
    InvalidDate(u32),
    #[error("DBN streams with schema definitions are not supported")]
    SchemaDefinition,
    #[error("record of {len} bytes is too short for rtype {rtype:#04x}")]
    ShortRecord { rtype: u8, len: usize },
}

//a date range during which an input symbol resolved to an output symbol
//end_date is exclusive
#[derive(Debug, Clone, PartialEq)]
pub struct MappingInterval {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub symbol: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SymbolMapping {
    pub raw_symbol: String,
    pub intervals: Vec<MappingInterval>,
}

//dbn metadata header
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub version: u8,
    pub dataset: String,
    pub schema: u16,
    pub start: u64,
    pub end: u64,
    pub limit: u64,
    pub stype_in: u8,
    pub stype_out: u8,
    pub ts_out: bool,
    pub symbols: Vec<String>,
    pub partial: Vec<String>,
    pub not_found: Vec<String>,
    pub mappings: Vec<SymbolMapping>,
}

impl Metadata {
    fn decode(version: u8, buffer: &[u8]) -> Result<Self, DbnError> {
        let mut cursor = Cursor::new(buffer);

        let dataset = cursor.cstr(DATASET_CSTR_LEN, "dataset")?;
        let schema = cursor.u16("schema")?;
        let start = cursor.u64("start")?;
        let end = cursor.u64("end")?;
        let limit = cursor.u64("limit")?;
        if version == 1 {
            //deprecated record count
            cursor.skip(8, "record count")?;
        }
        let stype_in = cursor.u8("stype_in")?;
        let stype_out = cursor.u8("stype_out")?;
        let ts_out = cursor.u8("ts_out")? != 0;

        let symbol_cstr_len = if version == 1 {
            V1_SYMBOL_CSTR_LEN
        } else {
            cursor.u16("symbol length")? as usize
        };
        let reserved = if version == 1 {
            V1_RESERVED_LEN
        } else {
            RESERVED_LEN
        };
        cursor.skip(reserved, "reserved")?;
        if symbol_cstr_len == 0 {
            return Err(DbnError::InvalidSymbolLength(symbol_cstr_len));
        }

        if cursor.u32("schema definition length")? != 0 {
            return Err(DbnError::SchemaDefinition);
        }

        let symbols = cursor.symbol_list(symbol_cstr_len, "symbols")?;
        let partial = cursor.symbol_list(symbol_cstr_len, "partial")?;
        let not_found = cursor.symbol_list(symbol_cstr_len, "not_found")?;

        //counts come straight from the input, so nothing is sized from them up front
        let mapping_count = cursor.u32("mapping count")?;
        let mut mappings = Vec::new();
        for _ in 0..mapping_count {
            let raw_symbol = cursor.cstr(symbol_cstr_len, "mapping symbol")?;
            let interval_count = cursor.u32("interval count")?;
            let mut intervals = Vec::new();
            for _ in 0..interval_count {
                let start_date = parse_date(cursor.u32("interval start")?)?;
                let end_date = parse_date(cursor.u32("interval end")?)?;
                let symbol = cursor.cstr(symbol_cstr_len, "interval symbol")?;
                intervals.push(MappingInterval {
                    start_date,
                    end_date,
                    symbol,
                });
            }
            mappings.push(SymbolMapping {
                raw_symbol,
                intervals,
            });
        }

        Ok(Metadata {
            version,
            dataset,
            schema,
            start,
            end,
            limit,
            stype_in,
            stype_out,
            ts_out,
            symbols,
            partial,
            not_found,
            mappings,
        })
    }
}

//resolves instrument ids to symbols by date
#[derive(Debug, Default, Clone)]
pub struct SymbolMap {
    intervals: HashMap<u32, Vec<MappingInterval>>,
}

impl SymbolMap {
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let mut intervals: HashMap<u32, Vec<MappingInterval>> = HashMap::new();

        for mapping in &metadata.mappings {
            for interval in &mapping.intervals {
                //mappings always pair a text symbol with an instrument id,
                //which side is which depends on the input symbology
                let (id, symbol) = if metadata.stype_in == STYPE_INSTRUMENT_ID {
                    (&mapping.raw_symbol, &interval.symbol)
                } else {
                    (&interval.symbol, &mapping.raw_symbol)
                };

                if let Ok(instrument_id) = id.parse::<u32>() {
                    intervals
                        .entry(instrument_id)
                        .or_default()
                        .push(MappingInterval {
                            start_date: interval.start_date,
                            end_date: interval.end_date,
                            symbol: symbol.clone(),
                        });
                }
            }
        }

        SymbolMap { intervals }
    }

    pub fn get(&self, instrument_id: u32, date: NaiveDate) -> Option<&str> {
        self.intervals
            .get(&instrument_id)?
            .iter()
            .find(|i| i.start_date <= date && date < i.end_date)
            .map(|i| i.symbol.as_str())
    }
}

//streaming dbn decoder over any reader of uncompressed dbn bytes
pub struct DbnDecoder<R> {
    reader: R,
    metadata: Metadata,
    symbol_map: SymbolMap,
    buffer: Vec<u8>,
}

impl DbnDecoder<zstd::stream::read::Decoder<'static, BufReader<BufReader<File>>>> {
    //opens a zstd-compressed dbn file
    pub fn from_zstd_file<P: AsRef<Path>>(path: P) -> Result<Self, DbnError> {
        let file = BufReader::new(File::open(path)?);
        DbnDecoder::new(zstd::stream::read::Decoder::new(file)?)
    }
}

impl<R: Read> DbnDecoder<R> {
    //reads and decodes the metadata header
    pub fn new(mut reader: R) -> Result<Self, DbnError> {
        let mut prefix = [0u8; PREFIX_LEN];
        read_exact_or(&mut reader, &mut prefix, "metadata prefix")?;

        if &prefix[..3] != MAGIC {
            return Err(DbnError::InvalidMagic);
        }

        let version = prefix[3];
        if version == 0 || version > MAX_VERSION {
            return Err(DbnError::UnsupportedVersion(version));
        }

        let length = u32::from_le_bytes([prefix[4], prefix[5], prefix[6], prefix[7]]) as usize;
        if length > MAX_METADATA_LEN {
            return Err(DbnError::MetadataTooLarge(length));
        }
        let mut buffer = Vec::new();
        (&mut reader)
            .take(length as u64)
            .read_to_end(&mut buffer)?;
        if buffer.len() < length {
            return Err(DbnError::Truncated("metadata"));
        }

        let metadata = Metadata::decode(version, &buffer)?;
        let symbol_map = SymbolMap::from_metadata(&metadata);

        Ok(DbnDecoder {
            reader,
            metadata,
            symbol_map,
            buffer: Vec::with_capacity(OHLCV_RECORD_LEN),
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    //reads the next record into the buffer, false at end of stream
    fn read_record(&mut self) -> Result<bool, DbnError> {
        let mut length = [0u8; 1];
        loop {
            match self.reader.read(&mut length) {
                Ok(0) => return Ok(false),
                Ok(_) => break,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        //record length is counted in 4-byte words
        let size = length[0] as usize * 4;
        if size < RECORD_HEADER_LEN {
            return Err(DbnError::ShortRecord { rtype: 0, len: size });
        }

        self.buffer.clear();
        self.buffer.resize(size, 0);
        self.buffer[0] = length[0];
        read_exact_or(&mut self.reader, &mut self.buffer[1..], "record")?;

        Ok(true)
    }

    //decodes every ohlcv record in the stream, skipping other record types
    pub fn decode_ohlcv(mut self) -> Result<Vec<OhlcvRecord>, DbnError> {
        let mut records = Vec::new();

        while self.read_record()? {
            let record = &self.buffer;
            let rtype = record[1];
            if !OHLCV_RTYPES.contains(&rtype) {
                continue;
            }
            if record.len() < OHLCV_RECORD_LEN {
                return Err(DbnError::ShortRecord {
                    rtype,
                    len: record.len(),
                });
            }

            let mut cursor = Cursor::new(record);
            cursor.skip(2, "record header")?;
            let publisher_id = cursor.u16("publisher_id")?;
            let instrument_id = cursor.u32("instrument_id")?;
            let ts_event = cursor.u64("ts_event")?;
            let open = cursor.i64("open")?;
            let high = cursor.i64("high")?;
            let low = cursor.i64("low")?;
            let close = cursor.i64("close")?;
            let volume = cursor.u64("volume")?;

            let timestamp = nanos_to_datetime(ts_event);
            let symbol = self
                .symbol_map
                .get(instrument_id, timestamp.date_naive())
                .map(str::to_owned);

            records.push(OhlcvRecord {
                timestamp,
                rtype,
                publisher_id,
                instrument_id,
                open: open as f64 / FIXED_PRICE_SCALE,
                high: high as f64 / FIXED_PRICE_SCALE,
                low: low as f64 / FIXED_PRICE_SCALE,
                close: close as f64 / FIXED_PRICE_SCALE,
                volume,
                symbol,
            });
        }

        Ok(records)
    }
}

//decodes ohlcv records from a zstd-compressed dbn body held in memory
pub fn decode_zstd_ohlcv(bytes: &[u8]) -> Result<Vec<OhlcvRecord>, DbnError> {
    let decoder = DbnDecoder::new(zstd::stream::read::Decoder::new(bytes)?)?;
    decoder.decode_ohlcv()
}

fn nanos_to_datetime(nanos: u64) -> DateTime<Utc> {
    Utc.timestamp_nanos(nanos.min(i64::MAX as u64) as i64)
}

//dates are packed as yyyymmdd
fn parse_date(packed: u32) -> Result<NaiveDate, DbnError> {
    NaiveDate::from_ymd_opt((packed / 10_000) as i32, (packed / 100) % 100, packed % 100)
        .ok_or(DbnError::InvalidDate(packed))
}

fn read_exact_or<R: Read>(
    reader: &mut R,
    buffer: &mut [u8],
    what: &'static str,
) -> Result<(), DbnError> {
    reader.read_exact(buffer).map_err(|e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            DbnError::Truncated(what)
        } else {
            DbnError::Io(e)
        }
    })
}

struct Cursor<'a> {
    buffer: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Cursor { buffer, pos: 0 }
    }

    fn take(&mut self, n: usize, what: &'static str) -> Result<&'a [u8], DbnError> {
        let end = self.pos + n;
        let slice = self
            .buffer
            .get(self.pos..end)
            .ok_or(DbnError::Truncated(what))?;
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, n: usize, what: &'static str) -> Result<(), DbnError> {
        self.take(n, what).map(|_| ())
    }

    fn array<const N: usize>(&mut self, what: &'static str) -> Result<[u8; N], DbnError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    fn u8(&mut self, what: &'static str) -> Result<u8, DbnError> {
        Ok(self.take(1, what)?[0])
    }

    fn u16(&mut self, what: &'static str) -> Result<u16, DbnError> {
        self.array(what).map(u16::from_le_bytes)
    }

    fn u32(&mut self, what: &'static str) -> Result<u32, DbnError> {
        self.array(what).map(u32::from_le_bytes)
    }

    fn u64(&mut self, what: &'static str) -> Result<u64, DbnError> {
        self.array(what).map(u64::from_le_bytes)
    }

    fn i64(&mut self, what: &'static str) -> Result<i64, DbnError> {
        self.array(what).map(i64::from_le_bytes)
    }

    //fixed-width, nul-padded string
    fn cstr(&mut self, len: usize, what: &'static str) -> Result<String, DbnError> {
        let bytes = self.take(len, what)?;
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(len);
        std::str::from_utf8(&bytes[..end])
            .map(str::to_owned)
            .map_err(|_| DbnError::InvalidUtf8(what))
    }

    fn symbol_list(&mut self, len: usize, what: &'static str) -> Result<Vec<String>, DbnError> {
        let count = self.u32(what)?;
        let mut symbols = Vec::new();
        for _ in 0..count {
            symbols.push(self.cstr(len, what)?);
        }
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ts, DbnBuilder};

    #[test]
    fn decodes_metadata_header() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .mapping("ESH4", 20240101, 20240320, "4916")
            .build();

        let decoder = DbnDecoder::new(bytes.as_slice()).unwrap();
        let metadata = decoder.metadata();

        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.dataset, "GLBX.MDP3");
        assert_eq!(metadata.schema, 6);
        assert_eq!(metadata.stype_in, 4);
        assert_eq!(metadata.symbols, vec!["ES.FUT".to_string()]);
        assert_eq!(metadata.mappings.len(), 1);
        assert_eq!(metadata.mappings[0].raw_symbol, "ESH4");
        assert_eq!(
            metadata.mappings[0].intervals[0].start_date,
            NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
        );
    }

    #[test]
    fn decodes_ohlcv_records_with_symbols() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .mapping("ESH4", 20240101, 20240320, "4916")
            .mapping("ESM4", 20240101, 20240620, "5002")
            .bar(ts("2024-01-02T14:30:00Z"), 4916, 4750.25, 4752.0, 4749.5, 4751.75, 1200)
            .bar(ts("2024-01-02T14:30:00Z"), 5002, 4800.0, 4801.0, 4799.0, 4800.5, 300)
            .build();

        let records = DbnDecoder::new(bytes.as_slice())
            .unwrap()
            .decode_ohlcv()
            .unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].symbol.as_deref(), Some("ESH4"));
        assert_eq!(records[0].instrument_id, 4916);
        assert_eq!(records[0].rtype, 0x21);
        assert_eq!(records[0].close, 4751.75);
        assert_eq!(records[0].volume, 1200);
        assert_eq!(records[0].timestamp, ts("2024-01-02T14:30:00Z"));
        assert_eq!(records[1].symbol.as_deref(), Some("ESM4"));
    }

    #[test]
    fn unmapped_instrument_has_no_symbol() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .mapping("ESH4", 20240101, 20240102, "4916")
            .bar(ts("2024-01-05T00:00:00Z"), 4916, 1.0, 1.0, 1.0, 1.0, 1)
            .bar(ts("2024-01-01T00:00:00Z"), 7777, 1.0, 1.0, 1.0, 1.0, 1)
            .build();

        let records = DbnDecoder::new(bytes.as_slice())
            .unwrap()
            .decode_ohlcv()
            .unwrap();

        //outside the mapping interval, and an unknown id
        assert_eq!(records[0].symbol, None);
        assert_eq!(records[1].symbol, None);
    }

    #[test]
    fn decodes_zstd_body() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .mapping("ESH4", 20240101, 20240320, "4916")
            .bar(ts("2024-01-02T14:30:00Z"), 4916, 1.0, 2.0, 0.5, 1.5, 10)
            .build_zstd();

        let records = decode_zstd_ohlcv(&bytes).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].high, 2.0);
    }

    #[test]
    fn rejects_bad_magic() {
        let result = DbnDecoder::new(&b"CSV\x02\x00\x00\x00\x00"[..]);
        assert!(matches!(result, Err(DbnError::InvalidMagic)));
    }

    #[test]
    fn rejects_truncated_metadata() {
        let mut bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"]).build();
        bytes.truncate(40);
        let result = DbnDecoder::new(bytes.as_slice());
        assert!(matches!(result, Err(DbnError::Truncated(_))));
    }

    #[test]
    fn decodes_version_1_layout() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .version(1)
            .mapping("ESH4", 20240101, 20240320, "4916")
            .bar(ts("2024-01-02T14:30:00Z"), 4916, 4750.25, 4752.0, 4749.5, 4751.75, 1200)
            .build();

        let decoder = DbnDecoder::new(bytes.as_slice()).unwrap();
        let metadata = decoder.metadata().clone();

        assert_eq!(metadata.version, 1);
        assert_eq!(metadata.dataset, "GLBX.MDP3");
        assert_eq!(metadata.schema, 6);
        assert_eq!(metadata.stype_in, 4);
        assert_eq!(metadata.symbols, vec!["ES.FUT".to_string()]);
        assert_eq!(metadata.mappings[0].raw_symbol, "ESH4");
        assert_eq!(metadata.mappings[0].intervals[0].symbol, "4916");
        assert_eq!(
            metadata.mappings[0].intervals[0].end_date,
            NaiveDate::from_ymd_opt(2024, 3, 20).unwrap()
        );

        let records = decoder.decode_ohlcv().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].symbol.as_deref(), Some("ESH4"));
        assert_eq!(records[0].open, 4750.25);
        assert_eq!(records[0].volume, 1200);
    }

    #[test]
    fn huge_mapping_count_is_truncated_input() {
        let bytes = DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
            .claimed_mappings(u32::MAX)
            .build();

        let result = DbnDecoder::new(bytes.as_slice());
        assert!(matches!(result, Err(DbnError::Truncated(_))));
    }

    #[test]
    fn metadata_length_is_bounded() {
        let result = DbnDecoder::new(&b"DBN\x02\xff\xff\xff\xff"[..]);
        assert!(matches!(result, Err(DbnError::MetadataTooLarge(_))));

        //a plausible length with nothing behind it
        let result = DbnDecoder::new(&b"DBN\x02\x00\x01\x00\x00"[..]);
        assert!(matches!(result, Err(DbnError::Truncated("metadata"))));
    }

    #[test]
    fn rejects_unknown_version() {
        let result = DbnDecoder::new(&b"DBN\x09\x00\x00\x00\x00"[..]);
        assert!(matches!(result, Err(DbnError::UnsupportedVersion(9))));
    }

    #[test]
    fn instrument_id_input_maps_the_other_way() {
        let metadata = Metadata {
            version: 2,
            dataset: "GLBX.MDP3".to_string(),
            schema: 6,
            start: 0,
            end: 0,
            limit: 0,
            stype_in: STYPE_INSTRUMENT_ID,
            stype_out: 1,
            ts_out: false,
            symbols: vec!["4916".to_string()],
            partial: vec![],
            not_found: vec![],
            mappings: vec![SymbolMapping {
                raw_symbol: "4916".to_string(),
                intervals: vec![MappingInterval {
                    start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
                    end_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
                    symbol: "ESH4".to_string(),
                }],
            }],
        };

        let map = SymbolMap::from_metadata(&metadata);
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(map.get(4916, date), Some("ESH4"));
    }
}
