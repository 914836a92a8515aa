//writes dbn streams with ohlcv-1m records, version 2 unless asked otherwise
//shared by the unit tests (through a path attribute) and the integration tests

use chrono::{DateTime, Utc};

pub struct DbnBuilder {
    version: u8,
    dataset: String,
    symbols: Vec<String>,
    mappings: Vec<(String, u32, u32, String)>,
    claimed_mappings: Option<u32>,
    records: Vec<u8>,
}

impl DbnBuilder {
    pub fn new(dataset: &str, symbols: &[&str]) -> Self {
        DbnBuilder {
            version: 2,
            dataset: dataset.to_string(),
            symbols: symbols.iter().map(|s| s.to_string()).collect(),
            mappings: Vec::new(),
            claimed_mappings: None,
            records: Vec::new(),
        }
    }

    pub fn version(mut self, version: u8) -> Self {
        self.version = version;
        self
    }

    pub fn mapping(mut self, raw_symbol: &str, start: u32, end: u32, instrument_id: &str) -> Self {
        self.mappings.push((
            raw_symbol.to_string(),
            start,
            end,
            instrument_id.to_string(),
        ));
        self
    }

    //writes this mapping count in the header whatever mappings follow
    pub fn claimed_mappings(mut self, count: u32) -> Self {
        self.claimed_mappings = Some(count);
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn bar(
        mut self,
        timestamp: DateTime<Utc>,
        instrument_id: u32,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Self {
        let px = |p: f64| ((p * 1e9).round() as i64).to_le_bytes();
        self.records.push(14);
        self.records.push(0x21);
        self.records.extend_from_slice(&1u16.to_le_bytes());
        self.records.extend_from_slice(&instrument_id.to_le_bytes());
        self.records
            .extend_from_slice(&(timestamp.timestamp_nanos_opt().unwrap() as u64).to_le_bytes());
        self.records.extend_from_slice(&px(open));
        self.records.extend_from_slice(&px(high));
        self.records.extend_from_slice(&px(low));
        self.records.extend_from_slice(&px(close));
        self.records.extend_from_slice(&volume.to_le_bytes());
        self
    }

    fn cstr(out: &mut Vec<u8>, s: &str, len: usize) {
        let mut field = vec![0u8; len];
        field[..s.len()].copy_from_slice(s.as_bytes());
        out.extend_from_slice(&field);
    }

    pub fn build(&self) -> Vec<u8> {
        let v1 = self.version == 1;
        let len = if v1 { 22 } else { 71 };

        let mut meta = Vec::new();
        Self::cstr(&mut meta, &self.dataset, 16);
        meta.extend_from_slice(&6u16.to_le_bytes());
        meta.extend_from_slice(&1_704_067_200_000_000_000u64.to_le_bytes());
        meta.extend_from_slice(&1_735_689_599_000_000_000u64.to_le_bytes());
        meta.extend_from_slice(&0u64.to_le_bytes());
        if v1 {
            //record count, unused
            meta.extend_from_slice(&u64::MAX.to_le_bytes());
        }
        meta.push(4);
        meta.push(0);
        meta.push(0);
        if v1 {
            meta.extend_from_slice(&[0u8; 47]);
        } else {
            meta.extend_from_slice(&(len as u16).to_le_bytes());
            meta.extend_from_slice(&[0u8; 53]);
        }
        meta.extend_from_slice(&0u32.to_le_bytes());

        meta.extend_from_slice(&(self.symbols.len() as u32).to_le_bytes());
        for symbol in &self.symbols {
            Self::cstr(&mut meta, symbol, len);
        }
        meta.extend_from_slice(&0u32.to_le_bytes());
        meta.extend_from_slice(&0u32.to_le_bytes());

        let mapping_count = self
            .claimed_mappings
            .unwrap_or(self.mappings.len() as u32);
        meta.extend_from_slice(&mapping_count.to_le_bytes());
        for (raw, start, end, id) in &self.mappings {
            Self::cstr(&mut meta, raw, len);
            meta.extend_from_slice(&1u32.to_le_bytes());
            meta.extend_from_slice(&start.to_le_bytes());
            meta.extend_from_slice(&end.to_le_bytes());
            Self::cstr(&mut meta, id, len);
        }

        //metadata is padded to 8-byte alignment
        while (meta.len() + 8) % 8 != 0 {
            meta.push(0);
        }

        let mut out = b"DBN".to_vec();
        out.push(self.version);
        out.extend_from_slice(&(meta.len() as u32).to_le_bytes());
        out.extend_from_slice(&meta);
        out.extend_from_slice(&self.records);
        out
    }

    pub fn build_zstd(&self) -> Vec<u8> {
        zstd::stream::encode_all(self.build().as_slice(), 0).unwrap()
    }
}
