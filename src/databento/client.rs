use crate::databento::error::FetchError;
use crate::databento::request::{RangeRequest, Schema};
use crate::databento::{FieldDetail, HistoricalClient, PublisherDetail};
use reqwest::blocking::{Client, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

const BASE_URL: &str = "https://hist.databento.com/v0";

pub const API_KEY_ENV: &str = "DATABENTO_API_KEY";

//blocking client for the Databento historical API
pub struct DatabentoClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
}

impl DatabentoClient {
    //creates a client from an explicit key, falling back to DATABENTO_API_KEY
    //fails with FetchError::MissingApiKey when neither is set; nothing is
    //sent over the network in that case
    pub fn new(api_key: Option<String>) -> Result<Self, FetchError> {
        let api_key = resolve_api_key(api_key, std::env::var(API_KEY_ENV).ok())?;
        Ok(Self::with_key(api_key))
    }

    pub fn with_key(api_key: SecretString) -> Self {
        DatabentoClient {
            client: Client::new(),
            api_key,
            base_url: BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), endpoint)
    }

    //the key is the basic auth user name with an empty password
    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.basic_auth(self.api_key.expose_secret(), Some(""))
    }

    fn send(&self, builder: RequestBuilder) -> Result<Response, FetchError> {
        let response = self.authorized(builder).send()?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| "Unknown API error".to_string());
            return Err(FetchError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!(endpoint, "GET");
        let response = self.send(self.client.get(self.url(endpoint)).query(query))?;
        Ok(response.json()?)
    }
}

impl HistoricalClient for DatabentoClient {
    fn get_range(&self, request: &RangeRequest) -> Result<Vec<u8>, FetchError> {
        let mut form = request.range_params();
        form.push(("encoding", "dbn".to_string()));
        form.push(("compression", "zstd".to_string()));

        debug!(endpoint = "timeseries.get_range", "POST");
        let response = self.send(
            self.client
                .post(self.url("timeseries.get_range"))
                .form(&form),
        )?;

        Ok(response.bytes()?.to_vec())
    }

    fn list_datasets(&self) -> Result<Vec<String>, FetchError> {
        self.get_json("metadata.list_datasets", &[])
    }

    fn list_publishers(&self) -> Result<Vec<PublisherDetail>, FetchError> {
        self.get_json("metadata.list_publishers", &[])
    }

    fn list_schemas(&self, dataset: &str) -> Result<Vec<String>, FetchError> {
        self.get_json("metadata.list_schemas", &[("dataset", dataset)])
    }

    fn list_fields(&self, schema: Schema, encoding: &str) -> Result<Vec<FieldDetail>, FetchError> {
        self.get_json(
            "metadata.list_fields",
            &[("schema", schema.as_str()), ("encoding", encoding)],
        )
    }

    fn get_record_count(&self, request: &RangeRequest) -> Result<u64, FetchError> {
        debug!(endpoint = "metadata.get_record_count", "POST");
        let response = self.send(
            self.client
                .post(self.url("metadata.get_record_count"))
                .form(&request.range_params()),
        )?;
        Ok(response.json()?)
    }
}

//explicit key wins, blank values count as absent
fn resolve_api_key(
    explicit: Option<String>,
    from_env: Option<String>,
) -> Result<SecretString, FetchError> {
    explicit
        .filter(|key| !key.trim().is_empty())
        .or_else(|| from_env.filter(|key| !key.trim().is_empty()))
        .map(|key| SecretString::new(key.into()))
        .ok_or(FetchError::MissingApiKey)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_key_takes_precedence() {
        let key = resolve_api_key(Some("db-explicit".into()), Some("db-env".into())).unwrap();
        assert_eq!(key.expose_secret(), "db-explicit");
    }

    #[test]
    fn falls_back_to_environment() {
        let key = resolve_api_key(None, Some("db-env".into())).unwrap();
        assert_eq!(key.expose_secret(), "db-env");
    }

    #[test]
    fn missing_key_is_a_configuration_error() {
        let result = resolve_api_key(None, None);
        assert!(matches!(result, Err(FetchError::MissingApiKey)));

        let result = resolve_api_key(Some("  ".into()), Some(String::new()));
        assert!(matches!(result, Err(FetchError::MissingApiKey)));
    }

    #[test]
    fn urls_join_base_and_endpoint() {
        let client = DatabentoClient::with_key(SecretString::new("k".into()))
            .with_base_url("http://localhost:8080/v0/");
        assert_eq!(
            client.url("timeseries.get_range"),
            "http://localhost:8080/v0/timeseries.get_range"
        );
    }
}
