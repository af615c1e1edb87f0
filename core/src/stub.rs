//! Captured request/response pairs and their fixture representation.
//!
//! ```text
//! {
//!   "type": "url" | "signature",
//!   "identifier": "<display form>",
//!   "signature": { "operationName", "query", "endpoint", "variables" },
//!   "mock": { "json" | "text" | "base64", "statusCode", "headerFields", "error" }
//! }
//! ```

use std::collections::BTreeMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use url::Url;

use crate::identifier::Identifier;
use crate::identifier::Signature;
use crate::transport::HttpResponse;
use crate::transport::TransportError;
use crate::value::JsonValue;

pub const DEFAULT_STATUS_CODE: u16 = 200;

/// Stored response half of a [`Stub`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StubResponse {
    pub data: Option<Bytes>,
    pub status_code: u16,
    pub headers: Option<BTreeMap<String, String>>,
    pub error: Option<TransportError>,
}

impl Default for StubResponse {
    fn default() -> Self {
        Self {
            data: None,
            status_code: DEFAULT_STATUS_CODE,
            headers: None,
            error: None,
        }
    }
}

impl StubResponse {
    pub fn json(body: &Value) -> Self {
        Self {
            data: Some(Bytes::from(body.to_string())),
            ..Self::default()
        }
    }

    pub fn failure(error: TransportError) -> Self {
        Self {
            error: Some(error),
            ..Self::default()
        }
    }

    /// Capture the outcome of a call, successful or not.
    pub fn from_outcome(outcome: &Result<HttpResponse, TransportError>) -> Self {
        match outcome {
            Ok(response) => Self {
                data: (!response.body.is_empty()).then(|| response.body.clone()),
                status_code: response.status,
                headers: (!response.headers.is_empty()).then(|| response.headers.clone()),
                error: None,
            },
            Err(error) => Self::failure(error.clone()),
        }
    }

    /// What the caller sees when this response is replayed.
    pub fn to_outcome(&self) -> Result<HttpResponse, TransportError> {
        if let Some(error) = &self.error {
            return Err(error.clone());
        }
        Ok(HttpResponse {
            status: self.status_code,
            headers: self.headers.clone().unwrap_or_default(),
            body: self.data.clone().unwrap_or_default(),
        })
    }
}

/// Immutable captured call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stub {
    pub identifier: Identifier,
    pub response: StubResponse,
}

impl Stub {
    pub fn new(identifier: Identifier, response: StubResponse) -> Self {
        Self {
            identifier,
            response,
        }
    }

    /// Fixture representation.
    pub fn to_json(&self) -> Value {
        let mut record = Map::new();
        record.insert("type".into(), Value::from(self.identifier.kind()));
        record.insert(
            "identifier".into(),
            Value::from(self.identifier.to_string()),
        );
        if let Identifier::BySignature(signature) = &self.identifier {
            let variables: Map<String, Value> = signature
                .variables()
                .iter()
                .map(|(k, v)| (k.clone(), Value::from(v.clone())))
                .collect();
            record.insert(
                "signature".into(),
                json!({
                    "operationName": signature.operation_name(),
                    "query": signature.query(),
                    "endpoint": signature.endpoint().as_str(),
                    "variables": variables,
                }),
            );
        }
        record.insert("mock".into(), mock_to_json(&self.response));
        Value::Object(record)
    }

    /// Decode one fixture entry. The error string explains why the entry was
    /// rejected; callers skip such entries rather than failing the whole file.
    pub fn from_json(value: &Value) -> Result<Self, String> {
        let object = value.as_object().ok_or("entry is not an object")?;
        let kind = object
            .get("type")
            .and_then(Value::as_str)
            .ok_or("missing `type`")?;
        let identifier = match kind {
            "url" => {
                let raw = object
                    .get("identifier")
                    .and_then(Value::as_str)
                    .ok_or("missing `identifier`")?;
                let url = Url::parse(raw).map_err(|e| format!("invalid URL `{raw}`: {e}"))?;
                Identifier::ByUrl(url)
            }
            "signature" => {
                let fields = object
                    .get("signature")
                    .and_then(Value::as_object)
                    .unwrap_or(object);
                Identifier::BySignature(signature_from_json(fields)?)
            }
            other => return Err(format!("unknown `type` `{other}`")),
        };

        let response = match object.get("mock") {
            None | Some(Value::Null) => StubResponse::default(),
            Some(Value::Object(mock)) => mock_from_json(mock)?,
            Some(_) => return Err("`mock` is not an object".to_string()),
        };

        Ok(Self::new(identifier, response))
    }
}

fn signature_from_json(fields: &Map<String, Value>) -> Result<Signature, String> {
    let required = |key: &str| {
        fields
            .get(key)
            .and_then(Value::as_str)
            .ok_or_else(|| format!("missing `{key}`"))
    };
    let operation_name = required("operationName")?;
    let query = required("query")?;
    let endpoint_raw = required("endpoint")?;
    let endpoint =
        Url::parse(endpoint_raw).map_err(|e| format!("invalid endpoint `{endpoint_raw}`: {e}"))?;

    let variables = match fields.get("variables") {
        Some(Value::Object(map)) => map
            .iter()
            .map(|(key, value)| (key.clone(), JsonValue::from(value.clone())))
            .collect(),
        _ => BTreeMap::new(),
    };

    Ok(Signature::new(operation_name, query, endpoint, variables))
}

fn mock_to_json(response: &StubResponse) -> Value {
    let mut mock = Map::new();
    if let Some(data) = &response.data {
        if let Ok(body) = serde_json::from_slice::<Value>(data) {
            mock.insert("json".into(), body);
        } else if let Ok(text) = std::str::from_utf8(data) {
            mock.insert("text".into(), Value::from(text));
        } else {
            mock.insert("base64".into(), Value::from(BASE64.encode(data)));
        }
    }
    mock.insert("statusCode".into(), Value::from(response.status_code));
    if let Some(headers) = &response.headers {
        let headers: Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect();
        mock.insert("headerFields".into(), Value::Object(headers));
    }
    if let Some(error) = &response.error {
        mock.insert(
            "error".into(),
            json!({
                "domain": error.domain,
                "code": error.code,
                "message": error.message,
            }),
        );
    }
    Value::Object(mock)
}

fn mock_from_json(mock: &Map<String, Value>) -> Result<StubResponse, String> {
    let data = if let Some(body) = mock.get("json") {
        Some(Bytes::from(body.to_string()))
    } else if let Some(text) = mock.get("text") {
        let text = text.as_str().ok_or("`text` is not a string")?;
        Some(Bytes::from(text.to_string()))
    } else if let Some(encoded) = mock.get("base64") {
        let encoded = encoded.as_str().ok_or("`base64` is not a string")?;
        let decoded = BASE64
            .decode(encoded)
            .map_err(|e| format!("invalid `base64` body: {e}"))?;
        Some(Bytes::from(decoded))
    } else {
        None
    };

    let status_code = match mock.get("statusCode") {
        None | Some(Value::Null) => DEFAULT_STATUS_CODE,
        Some(value) => value
            .as_u64()
            .and_then(|code| u16::try_from(code).ok())
            .ok_or_else(|| format!("invalid `statusCode` {value}"))?,
    };

    let headers = match mock.get("headerFields") {
        Some(Value::Object(map)) => Some(headers_from_json(map)),
        _ => None,
    };

    let error = match mock.get("error") {
        None | Some(Value::Null) => None,
        Some(value) => {
            let error = serde_json::from_value::<TransportError>(value.clone())
                .map_err(|e| format!("invalid `error`: {e}"))?;
            Some(error)
        }
    };

    Ok(StubResponse {
        data,
        status_code,
        headers,
        error,
    })
}

/// Header values that are not strings keep their JSON text.
fn headers_from_json(map: &Map<String, Value>) -> BTreeMap<String, String> {
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => (key.clone(), s.clone()),
            other => (key.clone(), other.to_string()),
        })
        .collect()
}
