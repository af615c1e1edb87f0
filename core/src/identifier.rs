//! Request identity: the key replay matching is done on.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;
use reqwest::Method;
use serde::Deserialize;
use url::Url;

use crate::error::ReplayError;
use crate::error::Result;
use crate::transport::HttpRequest;
use crate::value::JsonValue;

/// Identity of an intercepted call. Two requests are the same call iff their
/// identifiers are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Plain HTTP: the exact absolute URL.
    ByUrl(Url),
    /// GraphQL-style call sharing one endpoint with other operations.
    BySignature(Signature),
}

/// Canonical `(operation, query, endpoint, variables)` tuple.
///
/// Fields are private so the query is always stored normalized.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Signature {
    operation_name: String,
    query: String,
    endpoint: Url,
    variables: BTreeMap<String, JsonValue>,
}

impl Signature {
    pub fn new(
        operation_name: impl Into<String>,
        query: &str,
        endpoint: Url,
        variables: BTreeMap<String, JsonValue>,
    ) -> Self {
        Self {
            operation_name: operation_name.into(),
            query: normalize_query(query),
            endpoint,
            variables,
        }
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// The normalized query document.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn variables(&self) -> &BTreeMap<String, JsonValue> {
        &self.variables
    }
}

impl Identifier {
    /// Wire name used in the fixture `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ByUrl(_) => "url",
            Self::BySignature(_) => "signature",
        }
    }

    /// Reduce a request to its identity.
    ///
    /// Requests addressed to one of `signature_endpoints` (query and fragment
    /// ignored) are identified by their GraphQL signature; everything else by
    /// URL.
    pub fn from_request(request: &HttpRequest, signature_endpoints: &[Url]) -> Result<Self> {
        let endpoint = strip_query(&request.url);
        let is_signature = signature_endpoints
            .iter()
            .any(|candidate| strip_query(candidate) == endpoint);
        if !is_signature {
            return Ok(Self::ByUrl(request.url.clone()));
        }

        let payload = if request.method == Method::GET {
            GraphQlPayload::from_query_pairs(&request.url)?
        } else {
            GraphQlPayload::from_body(request.body.as_deref())?
        };
        payload.into_signature(endpoint).map(Self::BySignature)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ByUrl(url) => f.write_str(url.as_str()),
            Self::BySignature(signature) => write!(f, "{signature}"),
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let variables = JsonValue::Object(self.variables.clone());
        write!(f, "{} {} {variables}", self.operation_name, self.endpoint)
    }
}

fn strip_query(url: &Url) -> Url {
    let mut stripped = url.clone();
    stripped.set_query(None);
    stripped.set_fragment(None);
    stripped
}

/// GraphQL request envelope as sent on the wire.
#[derive(Debug, Deserialize)]
struct GraphQlPayload {
    query: String,
    #[serde(default, rename = "operationName")]
    operation_name: Option<String>,
    #[serde(default)]
    variables: Option<serde_json::Value>,
}

impl GraphQlPayload {
    fn from_body(body: Option<&[u8]>) -> Result<Self> {
        let body = body
            .filter(|b| !b.is_empty())
            .ok_or_else(|| ReplayError::bad_request("GraphQL request has no body"))?;
        serde_json::from_slice(body)
            .map_err(|e| ReplayError::bad_request(format!("malformed GraphQL body: {e}")))
    }

    fn from_query_pairs(url: &Url) -> Result<Self> {
        let mut query = None;
        let mut operation_name = None;
        let mut variables = None;
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "query" => query = Some(value.into_owned()),
                "operationName" => operation_name = Some(value.into_owned()),
                "variables" => {
                    let parsed = serde_json::from_str(&value).map_err(|e| {
                        ReplayError::bad_request(format!("malformed GraphQL variables: {e}"))
                    })?;
                    variables = Some(parsed);
                }
                _ => {}
            }
        }
        let query =
            query.ok_or_else(|| ReplayError::bad_request("GraphQL GET request has no query"))?;
        Ok(Self {
            query,
            operation_name,
            variables,
        })
    }

    fn into_signature(self, endpoint: Url) -> Result<Signature> {
        let operation_name = match self.operation_name.filter(|name| !name.is_empty()) {
            Some(name) => name,
            None => operation_name_from_query(&self.query)
                .ok_or_else(|| ReplayError::bad_request("GraphQL request has no operation name"))?,
        };
        let variables = match self.variables {
            None | Some(serde_json::Value::Null) => BTreeMap::new(),
            Some(serde_json::Value::Object(map)) => map
                .into_iter()
                .map(|(key, value)| (key, JsonValue::from(value)))
                .collect(),
            Some(other) => {
                return Err(ReplayError::bad_request(format!(
                    "GraphQL variables must be an object, got {other}"
                )));
            }
        };
        Ok(Signature::new(
            operation_name,
            &self.query,
            endpoint,
            variables,
        ))
    }
}

/// Name of the first named operation definition in a query document.
#[allow(clippy::expect_used)]
fn operation_name_from_query(query: &str) -> Option<String> {
    static OPERATION_RE: OnceLock<Regex> = OnceLock::new();
    let re = OPERATION_RE.get_or_init(|| {
        Regex::new(
            r"\b(?:query|mutation|subscription)\s+([_A-Za-z][_0-9A-Za-z]*)",
        )
        .expect("valid operation regex")
    });
    re.captures(query)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

fn is_punctuator(c: char) -> bool {
    matches!(
        c,
        '{' | '}' | '(' | ')' | '[' | ']' | ':' | ',' | '=' | '!' | '|' | '&' | '@' | '.'
    )
}

/// Canonical form of a GraphQL document for matching.
///
/// Whitespace runs collapse to a single space, whitespace next to punctuation
/// is dropped, and both ends are trimmed, so `query {foo}` and
/// `query  {  foo }` compare equal. String literals are kept verbatim.
pub fn normalize_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len());
    let mut pending_space = false;
    let mut in_string = false;
    let mut escaped = false;

    for ch in query.chars() {
        if in_string {
            out.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }
        if ch.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            let prev_is_word = out.chars().last().is_some_and(|p| !is_punctuator(p));
            if prev_is_word && !is_punctuator(ch) {
                out.push(' ');
            }
            pending_space = false;
        }
        if ch == '"' {
            in_string = true;
        }
        out.push(ch);
    }
    out
}
