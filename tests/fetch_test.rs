mod common;

use common::{ts, DbnBuilder, FakeClient, RejectingClient};
use esbars::data::{describe_and_fetch, fetch_and_store, load_csv, OhlcvRecord};
use esbars::databento::{DatabentoClient, FetchError, RangeRequest, API_KEY_ENV};

//two contracts of the parent with three rows each, ESM4 at three distinct times,
//ESH4 with one row out of order and one timestamp sent twice
fn es_parent_body() -> Vec<u8> {
    DbnBuilder::new("GLBX.MDP3", &["ES.FUT"])
        .mapping("ESH4", 20240101, 20240320, "4916")
        .mapping("ESM4", 20240101, 20240620, "5002")
        .bar(ts("2024-01-02T14:29:00Z"), 5002, 4849.5, 4850.5, 4849.0, 4850.0, 35)
        .bar(ts("2024-01-02T14:30:00Z"), 4916, 4800.0, 4800.5, 4799.5, 4800.0, 120)
        .bar(ts("2024-01-02T14:30:00Z"), 5002, 4850.0, 4851.0, 4849.0, 4850.25, 40)
        .bar(ts("2024-01-02T14:29:00Z"), 4916, 4799.5, 4800.0, 4799.25, 4799.75, 90)
        .bar(ts("2024-01-02T14:31:00Z"), 5002, 4850.25, 4852.0, 4850.0, 4851.5, 55)
        .bar(ts("2024-01-02T14:30:00Z"), 4916, 4800.0, 4801.0, 4799.5, 4800.5, 150)
        .build_zstd()
}

#[test]
fn fetch_keeps_one_sorted_shifted_row_per_bar() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");
    let body = es_parent_body();
    let client = FakeClient::new(body.clone());
    let request = RangeRequest::default();

    let records = fetch_and_store(&client, &request, &data_dir).unwrap();

    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.symbol.as_deref() == Some("ESH4")));

    //bar open times moved to close times
    assert_eq!(records[0].timestamp, ts("2024-01-02T14:30:00Z"));
    assert_eq!(records[1].timestamp, ts("2024-01-02T14:31:00Z"));
    assert_eq!(records[0].close, 4799.75);

    //the later of the two 14:30 rows wins
    assert_eq!(records[1].close, 4800.5);
    assert_eq!(records[1].volume, 150);

    //raw body cached verbatim
    let raw = std::fs::read(request.raw_path(&data_dir)).unwrap();
    assert_eq!(raw, body);

    assert_eq!(client.requests.borrow().len(), 1);
    assert_eq!(client.requests.borrow()[0], request);
}

#[test]
fn cleaned_csv_loads_back_as_bars() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::new(es_parent_body());
    let request = RangeRequest::default();

    fetch_and_store(&client, &request, dir.path()).unwrap();
    let bars = load_csv(request.csv_path(dir.path())).unwrap();

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[1].timestamp, ts("2024-01-02T14:31:00Z"));
    assert_eq!(bars[1].close, 4800.5);
    assert_eq!(bars[1].symbol, "ESH4");
}

#[test]
fn unmatched_filter_writes_header_only() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::new(es_parent_body());
    let request = RangeRequest {
        filter_symbol: "ESZ4".to_string(),
        ..RangeRequest::default()
    };

    let records = fetch_and_store(&client, &request, dir.path()).unwrap();
    assert!(records.is_empty());

    let csv = std::fs::read_to_string(request.csv_path(dir.path())).unwrap();
    assert_eq!(csv.trim_end(), OhlcvRecord::COLUMNS.join(","));
}

#[test]
fn api_errors_propagate_without_writing_files() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");

    let result = fetch_and_store(&RejectingClient, &RangeRequest::default(), &data_dir);

    assert!(matches!(result, Err(FetchError::Api { status: 401, .. })));
    assert!(!data_dir.exists());
}

#[test]
fn metadata_is_listed_before_the_range_is_fetched() {
    let dir = tempfile::tempdir().unwrap();
    let client = FakeClient::new(es_parent_body());
    let request = RangeRequest::default();

    let (metadata, records) = describe_and_fetch(&client, &request, dir.path()).unwrap();

    assert_eq!(metadata.datasets, vec!["GLBX.MDP3", "XNAS.ITCH"]);
    assert_eq!(metadata.publishers[0].venue, "GLBX");
    assert_eq!(metadata.schemas[0], "ohlcv-1m");
    assert_eq!(metadata.fields[0].name, "ts_event");
    assert_eq!(metadata.record_count, 7);
    assert_eq!(records.len(), 2);

    assert_eq!(
        *client.calls.borrow(),
        vec![
            "list_datasets",
            "list_publishers",
            "list_schemas GLBX.MDP3",
            "list_fields ohlcv-1m dbn",
            "get_record_count",
            "get_range",
        ]
    );
    assert!(client.requests.borrow().iter().all(|r| *r == request));
    assert!(request.csv_path(dir.path()).exists());
}

#[test]
fn range_failure_after_metadata_propagates() {
    let dir = tempfile::tempdir().unwrap();
    let data_dir = dir.path().join("data");

    //the rejecting client answers metadata calls but refuses the range
    let result = describe_and_fetch(&RejectingClient, &RangeRequest::default(), &data_dir);

    assert!(matches!(result, Err(FetchError::Api { status: 401, .. })));
    assert!(!data_dir.exists());
}

#[test]
fn missing_api_key_fails_before_any_request() {
    std::env::remove_var(API_KEY_ENV);

    let result = DatabentoClient::new(None);

    assert!(matches!(result, Err(FetchError::MissingApiKey)));
}
