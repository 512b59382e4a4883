//! Firestore REST v1 implementation of [`RemoteStore`].

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use super::{Document, DocumentPath, FieldValue, Fields, RemoteStore};
use crate::error::{Error, Result};
use crate::models::Timestamp;
use crate::util::{describe_http_failure, non_blank, parse_endpoint};

/// Public Firestore REST endpoint
pub const DEFAULT_FIRESTORE_URL: &str = "https://firestore.googleapis.com/v1";

const REQUEST_TIMEOUT_SECS: u64 = 15;
const LIST_PAGE_SIZE: u32 = 300;

/// Firestore client authenticated with the signed-in user's ID token
#[derive(Clone)]
pub struct FirestoreStore {
    documents_url: String,
    api_key: Option<String>,
    client: Client,
    id_token: Arc<RwLock<Option<String>>>,
}

impl FirestoreStore {
    /// Build a client for `project_id`, optionally against a non-default
    /// base URL such as the local emulator.
    pub fn new(
        base_url: Option<String>,
        project_id: &str,
        api_key: Option<String>,
    ) -> Result<Self> {
        let base_url = non_blank(base_url).unwrap_or_else(|| DEFAULT_FIRESTORE_URL.to_string());
        let base_url = parse_endpoint(&base_url)
            .map_err(|reason| Error::InvalidInput(format!("Firestore URL {reason}")))?;
        let project_id = project_id.trim();
        if project_id.is_empty() {
            return Err(Error::InvalidInput(
                "Firestore project id must not be empty".to_string(),
            ));
        }

        Ok(Self {
            documents_url: format!(
                "{base_url}/projects/{project_id}/databases/(default)/documents"
            ),
            api_key: non_blank(api_key),
            client: Client::builder()
                .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()?,
            id_token: Arc::new(RwLock::new(None)),
        })
    }

    /// Replace the bearer token used for subsequent calls
    pub fn set_id_token(&self, token: Option<String>) {
        let mut guard = self.id_token.write().unwrap_or_else(PoisonError::into_inner);
        *guard = non_blank(token);
    }

    fn url(&self, path: &DocumentPath) -> String {
        let encoded = path
            .segments()
            .iter()
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/{encoded}", self.documents_url)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let mut request = self
            .client
            .request(method, url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.query(&[("key", key)]);
        }
        let token = self
            .id_token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request
    }

    async fn send(request: RequestBuilder, path: &DocumentPath) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(path.to_string()));
        }
        let body = response.text().await.unwrap_or_default();
        Err(Error::Network(parse_api_error(status, &body)))
    }
}

impl RemoteStore for FirestoreStore {
    async fn set_document(&self, path: &DocumentPath, fields: Fields) -> Result<Document> {
        // PATCH without an update mask replaces the whole document
        let method = if path.is_document() {
            Method::PATCH
        } else {
            Method::POST
        };
        let request = self
            .request(method, &self.url(path))
            .json(&json!({ "fields": encode_fields(&fields) }));
        let response = Self::send(request, path).await?;
        decode_document(response.json::<WireDocument>().await?)
    }

    async fn get_document(&self, path: &DocumentPath) -> Result<Document> {
        let request = self.request(Method::GET, &self.url(path));
        let response = Self::send(request, path).await?;
        decode_document(response.json::<WireDocument>().await?)
    }

    async fn list_documents(&self, path: &DocumentPath) -> Result<Vec<Document>> {
        let url = self.url(path);
        let mut documents = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .request(Method::GET, &url)
                .query(&[("pageSize", LIST_PAGE_SIZE.to_string())]);
            if let Some(token) = &page_token {
                request = request.query(&[("pageToken", token)]);
            }

            let page = match Self::send(request, path).await {
                Ok(response) => response.json::<WireListResponse>().await?,
                // An empty collection has no parent document
                Err(Error::NotFound(_)) => WireListResponse::default(),
                Err(error) => return Err(error),
            };
            documents.extend(decode_listed(page.documents, path));

            page_token = non_blank(page.next_page_token);
            if page_token.is_none() {
                break;
            }
        }

        tracing::debug!("Listed {} documents under {}", documents.len(), path);
        Ok(documents)
    }

    async fn delete_document(&self, path: &DocumentPath) -> Result<()> {
        let request = self.request(Method::DELETE, &self.url(path));
        Self::send(request, path).await?;
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct WireDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireListResponse {
    #[serde(default)]
    documents: Vec<WireDocument>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct WireErrorBody {
    error: Option<WireError>,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: Option<String>,
    status: Option<String>,
}

fn encode_fields(fields: &Fields) -> Value {
    let encoded = fields
        .iter()
        .map(|(name, value)| (name.clone(), encode_value(value)))
        .collect::<Map<String, Value>>();
    Value::Object(encoded)
}

fn encode_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => json!({ "nullValue": null }),
        FieldValue::Boolean(flag) => json!({ "booleanValue": flag }),
        FieldValue::Integer(number) => json!({ "integerValue": number.to_string() }),
        FieldValue::Double(number) => json!({ "doubleValue": number }),
        FieldValue::String(text) => json!({ "stringValue": text }),
        FieldValue::Timestamp(native) => {
            // Out-of-range values cannot be produced by `Timestamp::to_native`
            let rendered = Timestamp::from_native(*native)
                .map(|timestamp| timestamp.to_rfc3339())
                .unwrap_or_default();
            json!({ "timestampValue": rendered })
        }
    }
}

/// Decode one typed value; `None` for value kinds notes never use
fn decode_value(name: &str, value: &Value) -> Result<Option<FieldValue>> {
    let Some((kind, inner)) = value.as_object().and_then(|object| object.iter().next()) else {
        return Err(Error::Serialization(format!(
            "field '{name}' is not a typed value"
        )));
    };
    let invalid = || Error::Serialization(format!("field '{name}' has an invalid {kind}"));

    let decoded = match kind.as_str() {
        "nullValue" => FieldValue::Null,
        "booleanValue" => FieldValue::Boolean(inner.as_bool().ok_or_else(invalid)?),
        "integerValue" => FieldValue::Integer(
            inner
                .as_str()
                .and_then(|raw| raw.parse().ok())
                .or_else(|| inner.as_i64())
                .ok_or_else(invalid)?,
        ),
        "doubleValue" => FieldValue::Double(inner.as_f64().ok_or_else(invalid)?),
        "stringValue" => FieldValue::String(inner.as_str().ok_or_else(invalid)?.to_string()),
        "timestampValue" => FieldValue::Timestamp(
            Timestamp::parse_rfc3339(inner.as_str().ok_or_else(invalid)?)?.to_native(),
        ),
        other => {
            tracing::debug!("Ignoring field '{}' of unsupported kind {}", name, other);
            return Ok(None);
        }
    };
    Ok(Some(decoded))
}

fn decode_document(document: WireDocument) -> Result<Document> {
    let id = document
        .name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| Error::Serialization(format!("invalid document name: {}", document.name)))?
        .to_string();

    let mut fields = Fields::new();
    for (name, value) in &document.fields {
        if let Some(decoded) = decode_value(name, value)? {
            fields.insert(name.clone(), decoded);
        }
    }
    Ok(Document { id, fields })
}

/// Decode one listing page, skipping documents that cannot be decoded so a
/// single bad record does not hide the rest of the collection
fn decode_listed(page: Vec<WireDocument>, path: &DocumentPath) -> Vec<Document> {
    page
        .into_iter()
        .filter_map(|document| {
            let name = document.name.clone();
            match decode_document(document) {
                Ok(decoded) => Some(decoded),
                Err(error) => {
                    tracing::warn!(
                        "Skipping undecodable document {} under {}: {}",
                        name,
                        path,
                        error
                    );
                    None
                }
            }
        })
        .collect()
}

fn parse_api_error(status: StatusCode, body: &str) -> String {
    if let Ok(payload) = serde_json::from_str::<WireErrorBody>(body) {
        if let Some(error) = payload.error {
            return describe_http_failure(status, error.message.or(error.status), body);
        }
    }
    describe_http_failure(status, None, body)
}
