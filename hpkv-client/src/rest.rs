//! # Synchronous REST Client
//!
//! Purpose: Expose a compact, blocking API over the HPKV HTTP endpoints.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `RestClient` hides URL building, headers and body
//!    encoding behind record operations.
//! 2. **One Request Per Call**: No retries, no caching, no client-side state.
//! 3. **Two Error Paths**: `try_*` methods keep the error category; the plain
//!    methods log and collapse failures into `false`/`None`.

use reqwest::blocking::{Client, Response};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, warn};

use hpkv_common::{
    AtomicIncrementRequest, AtomicIncrementResponse, ClientConfig, HpkvError, HpkvResult,
    RangeQuery, RangeResponse, Record, RecordRequest, RecordResponse, RecordValue, TokenRequest,
    TokenResponse, API_KEY_HEADER, ATOMIC_PATH, RECORDS_PATH, RECORD_PATH,
};

/// Page of records returned by a range query.
#[derive(Debug, Clone, PartialEq)]
pub struct RangePage {
    pub records: Vec<Record>,
    /// Record count reported by the service (or the page length).
    pub count: u64,
    /// True when the service stopped early because of the limit.
    pub truncated: bool,
}

/// Blocking HPKV client.
///
/// Each call issues exactly one HTTP request (two for
/// [`RestClient::increment_or_init`] after a miss) and blocks until the
/// response arrives.
pub struct RestClient {
    http: Client,
    base: Url,
}

impl RestClient {
    /// Creates a client from a validated configuration.
    ///
    /// # Errors
    /// Returns `HpkvError::Config` if the base URL does not parse or the API
    /// key is not a valid header value.
    pub fn new(config: &ClientConfig) -> HpkvResult<Self> {
        let base = Url::parse(config.base_url()).map_err(|err| {
            HpkvError::Config(format!("invalid base URL {}: {}", config.base_url(), err))
        })?;
        if base.cannot_be_a_base() {
            return Err(HpkvError::Config(format!(
                "base URL {} cannot carry a path",
                config.base_url()
            )));
        }

        let mut api_key = HeaderValue::from_str(config.api_key())
            .map_err(|_| HpkvError::Config("API key is not a valid header value".to_string()))?;
        api_key.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(API_KEY_HEADER, api_key);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http = Client::builder()
            .default_headers(headers)
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| HpkvError::Transport(err.to_string()))?;

        Ok(RestClient { http, base })
    }

    /// Creates a record. The value is sent as text verbatim or as JSON text.
    pub fn try_create(&self, key: &str, value: impl Into<RecordValue>) -> HpkvResult<()> {
        let body = RecordRequest {
            key: key.to_string(),
            value: value.into().to_wire()?,
            partial_update: None,
        };
        self.post_record(&body)
    }

    /// Fetches a record and decodes its stored string.
    ///
    /// A 404 is `NotFound`; a body without `value` is a protocol error.
    pub fn try_read(&self, key: &str) -> HpkvResult<RecordValue> {
        let url = self.endpoint(&[RECORD_PATH, key]);
        debug!(%url, "reading record");
        let response = self.http.get(url).send().map_err(transport_error)?;
        let body: RecordResponse = parse_body(check_status(response)?)?;
        match body.value {
            Some(raw) => Ok(RecordValue::from_wire(raw)),
            None => Err(HpkvError::Protocol("response has no value field".to_string())),
        }
    }

    /// Updates a record; `partial` asks the service to merge.
    pub fn try_update(
        &self,
        key: &str,
        value: impl Into<RecordValue>,
        partial: bool,
    ) -> HpkvResult<()> {
        let body = RecordRequest {
            key: key.to_string(),
            value: value.into().to_wire()?,
            partial_update: Some(partial),
        };
        self.post_record(&body)
    }

    pub fn try_delete(&self, key: &str) -> HpkvResult<()> {
        let url = self.endpoint(&[RECORD_PATH, key]);
        debug!(%url, "deleting record");
        let response = self.http.delete(url).send().map_err(transport_error)?;
        check_status(response)?;
        Ok(())
    }

    /// Returns true only on a 2xx response.
    pub fn create(&self, key: &str, value: impl Into<RecordValue>) -> bool {
        report("create", key, self.try_create(key, value)).is_some()
    }

    /// Returns the decoded value, or `None` on any failure.
    pub fn read(&self, key: &str) -> Option<RecordValue> {
        report("read", key, self.try_read(key))
    }

    /// Reads a record and deserializes it into `T`.
    ///
    /// A value that does not fit `T` yields `None` (logged). Use
    /// [`RestClient::read`] to get the raw `Text` fallback instead.
    pub fn read_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.read(key)?;
        report("decode", key, value.decode())
    }

    pub fn update(&self, key: &str, value: impl Into<RecordValue>, partial: bool) -> bool {
        report("update", key, self.try_update(key, value, partial)).is_some()
    }

    pub fn delete(&self, key: &str) -> bool {
        report("delete", key, self.try_delete(key)).is_some()
    }

    /// Adds `delta` to a numeric record on the service side.
    ///
    /// A response with `success: false` becomes `HpkvError::Service`.
    pub fn atomic_increment(&self, key: &str, delta: i64) -> HpkvResult<AtomicIncrementResponse> {
        let url = self.endpoint(&[RECORD_PATH, ATOMIC_PATH]);
        let body = AtomicIncrementRequest {
            key: key.to_string(),
            increment: delta,
        };
        debug!(%url, key, delta, "atomic increment");
        let result: AtomicIncrementResponse = self.post_json(url, &body)?;
        if !result.success {
            let message = result
                .message
                .unwrap_or_else(|| "Unknown error".to_string());
            return Err(HpkvError::Service(message));
        }
        Ok(result)
    }

    /// Like [`RestClient::atomic_increment`], but creates the key with `0`
    /// and retries once when it does not exist yet.
    pub fn increment_or_init(&self, key: &str, delta: i64) -> HpkvResult<AtomicIncrementResponse> {
        match self.atomic_increment(key, delta) {
            Err(HpkvError::NotFound) => {
                debug!(key, "counter missing, creating with initial value 0");
                self.try_create(key, "0")?;
                self.atomic_increment(key, delta)
            }
            other => other,
        }
    }

    /// Fetches the records between two keys.
    pub fn range(&self, query: &RangeQuery) -> HpkvResult<RangePage> {
        let mut url = self.endpoint(&[RECORDS_PATH]);
        url.query_pairs_mut().extend_pairs(query.to_query_pairs());
        debug!(%url, "range query");

        let response = self.http.get(url).send().map_err(transport_error)?;
        let body: RangeResponse = parse_body(check_status(response)?)?;
        let records: Vec<Record> = body.records.into_iter().map(Record::from).collect();
        Ok(RangePage {
            count: body.count.unwrap_or(records.len() as u64),
            truncated: body.truncated.unwrap_or(false),
            records,
        })
    }

    /// Requests a WebSocket token restricted to `subscribe_keys`.
    pub fn websocket_token(&self, subscribe_keys: &[String]) -> HpkvResult<String> {
        let url = self.endpoint(&["token", "websocket"]);
        let body = TokenRequest {
            subscribe_keys: subscribe_keys.to_vec(),
        };
        let response: TokenResponse = self.post_json(url, &body)?;
        Ok(response.token)
    }

    fn post_record(&self, body: &RecordRequest) -> HpkvResult<()> {
        let url = self.endpoint(&[RECORD_PATH]);
        debug!(%url, key = %body.key, partial = ?body.partial_update, "writing record");
        let response = self.http.post(url).json(body).send().map_err(transport_error)?;
        let status = response.status();
        check_status(response)?;
        debug!(key = %body.key, status = status.as_u16(), "write succeeded");
        Ok(())
    }

    fn post_json<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> HpkvResult<T> {
        let response = self.http.post(url).json(body).send().map_err(transport_error)?;
        parse_body(check_status(response)?)
    }

    /// Appends path segments to the base URL, percent-encoding each one.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        // cannot_be_a_base was rejected in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

fn transport_error(err: reqwest::Error) -> HpkvError {
    HpkvError::Transport(err.to_string())
}

/// Maps non-2xx responses to `NotFound` or `Status`.
fn check_status(response: Response) -> HpkvResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    if status == StatusCode::NOT_FOUND {
        return Err(HpkvError::NotFound);
    }
    let body = response.text().unwrap_or_default();
    Err(HpkvError::Status {
        status: status.as_u16(),
        body,
    })
}

fn parse_body<T: DeserializeOwned>(response: Response) -> HpkvResult<T> {
    response
        .json()
        .map_err(|err| HpkvError::Protocol(format!("invalid response body: {}", err)))
}

/// Logs a failed operation and converts the result into an `Option`.
fn report<T>(operation: &str, key: &str, result: HpkvResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) if err.is_not_found() => {
            debug!(operation, key, "record not found");
            None
        }
        Err(err) => {
            warn!(operation, key, error = %err, "rest operation failed");
            None
        }
    }
}
