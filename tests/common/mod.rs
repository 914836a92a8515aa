#![allow(dead_code)]

use chrono::{DateTime, Utc};
use esbars::databento::{FetchError, FieldDetail, HistoricalClient, PublisherDetail, RangeRequest, Schema};
use std::cell::RefCell;

mod dbn_builder;

pub use dbn_builder::DbnBuilder;

pub fn ts(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
}

//historical client serving a canned range body and metadata, recording every call
pub struct FakeClient {
    body: Vec<u8>,
    pub requests: RefCell<Vec<RangeRequest>>,
    pub calls: RefCell<Vec<String>>,
}

impl FakeClient {
    pub fn new(body: Vec<u8>) -> Self {
        FakeClient {
            body,
            requests: RefCell::new(Vec::new()),
            calls: RefCell::new(Vec::new()),
        }
    }

    fn called(&self, call: String) {
        self.calls.borrow_mut().push(call);
    }
}

impl HistoricalClient for FakeClient {
    fn get_range(&self, request: &RangeRequest) -> Result<Vec<u8>, FetchError> {
        self.called("get_range".to_string());
        self.requests.borrow_mut().push(request.clone());
        Ok(self.body.clone())
    }

    fn list_datasets(&self) -> Result<Vec<String>, FetchError> {
        self.called("list_datasets".to_string());
        Ok(vec!["GLBX.MDP3".to_string(), "XNAS.ITCH".to_string()])
    }

    fn list_publishers(&self) -> Result<Vec<PublisherDetail>, FetchError> {
        self.called("list_publishers".to_string());
        Ok(vec![PublisherDetail {
            publisher_id: 1,
            dataset: "GLBX.MDP3".to_string(),
            venue: "GLBX".to_string(),
            description: "CME Globex MDP 3.0".to_string(),
        }])
    }

    fn list_schemas(&self, dataset: &str) -> Result<Vec<String>, FetchError> {
        self.called(format!("list_schemas {}", dataset));
        Ok(vec![Schema::Ohlcv1M.to_string(), Schema::Ohlcv1D.to_string()])
    }

    fn list_fields(&self, schema: Schema, encoding: &str) -> Result<Vec<FieldDetail>, FetchError> {
        self.called(format!("list_fields {} {}", schema, encoding));
        Ok(vec![FieldDetail {
            name: "ts_event".to_string(),
            kind: "uint64_t".to_string(),
        }])
    }

    fn get_record_count(&self, request: &RangeRequest) -> Result<u64, FetchError> {
        self.called("get_record_count".to_string());
        self.requests.borrow_mut().push(request.clone());
        Ok(7)
    }
}

//client whose range call always fails the way a rejected request does
pub struct RejectingClient;

impl HistoricalClient for RejectingClient {
    fn get_range(&self, _request: &RangeRequest) -> Result<Vec<u8>, FetchError> {
        Err(FetchError::Api {
            status: 401,
            message: "invalid API key".to_string(),
        })
    }

    fn list_datasets(&self) -> Result<Vec<String>, FetchError> {
        Ok(Vec::new())
    }

    fn list_publishers(&self) -> Result<Vec<PublisherDetail>, FetchError> {
        Ok(Vec::new())
    }

    fn list_schemas(&self, _dataset: &str) -> Result<Vec<String>, FetchError> {
        Ok(Vec::new())
    }

    fn list_fields(&self, _schema: Schema, _encoding: &str) -> Result<Vec<FieldDetail>, FetchError> {
        Ok(Vec::new())
    }

    fn get_record_count(&self, _request: &RangeRequest) -> Result<u64, FetchError> {
        Ok(0)
    }
}
