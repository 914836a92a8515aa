use crate::data::dbn::DbnError;
use thiserror::Error;

//errors raised while fetching and caching a bar range
#[derive(Debug, Error)]
pub enum FetchError {
    //no API key was passed and the environment variable is unset
    #[error(
        "Databento API key is required. Set the DATABENTO_API_KEY environment variable or pass it directly"
    )]
    MissingApiKey,

    //the request cannot be sent as given
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    //transport failure (connection, TLS, body read)
    #[error("API request failed: {0}")]
    Request(#[from] reqwest::Error),

    //the API answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to decode response: {0}")]
    Decode(#[from] DbnError),

    #[error("Failed to write csv: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
