//databento historical api access
//the fetch pipeline only talks to the vendor through HistoricalClient,
//so callers inject one client handle and tests substitute a fake

pub mod client;
pub mod error;
pub mod request;

pub use client::{DatabentoClient, API_KEY_ENV};
pub use error::FetchError;
pub use request::{RangeRequest, SType, Schema};

use serde::{Deserialize, Serialize};
use tracing::info;

//one entry of metadata.list_publishers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublisherDetail {
    pub publisher_id: u16,
    pub dataset: String,
    pub venue: String,
    pub description: String,
}

//one entry of metadata.list_fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDetail {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
}

//operations of the vendor's historical service used by this crate
pub trait HistoricalClient {
    //requests a bar range, returns the zstd-compressed dbn body untouched
    fn get_range(&self, request: &RangeRequest) -> Result<Vec<u8>, FetchError>;

    fn list_datasets(&self) -> Result<Vec<String>, FetchError>;

    fn list_publishers(&self) -> Result<Vec<PublisherDetail>, FetchError>;

    fn list_schemas(&self, dataset: &str) -> Result<Vec<String>, FetchError>;

    fn list_fields(&self, schema: Schema, encoding: &str) -> Result<Vec<FieldDetail>, FetchError>;

    fn get_record_count(&self, request: &RangeRequest) -> Result<u64, FetchError>;
}

//what the metadata endpoints report around one range request
#[derive(Debug, Clone, PartialEq)]
pub struct VendorMetadata {
    pub datasets: Vec<String>,
    pub publishers: Vec<PublisherDetail>,
    pub schemas: Vec<String>,
    pub fields: Vec<FieldDetail>,
    pub record_count: u64,
}

//queries every metadata endpoint for the request's dataset and schema, in that order
pub fn describe<C>(client: &C, request: &RangeRequest) -> Result<VendorMetadata, FetchError>
where
    C: HistoricalClient + ?Sized,
{
    let datasets = client.list_datasets()?;
    let publishers = client.list_publishers()?;
    let schemas = client.list_schemas(&request.dataset)?;
    let fields = client.list_fields(request.schema, "dbn")?;
    let record_count = client.get_record_count(request)?;

    info!(
        dataset = %request.dataset,
        schema = %request.schema,
        record_count,
        "listed vendor metadata"
    );

    Ok(VendorMetadata {
        datasets,
        publishers,
        schemas,
        fields,
        record_count,
    })
}
