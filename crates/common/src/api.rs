//! Blocking client for the Freemius developer REST API.
//!
//! All requests are scoped to the developer identified by the loaded
//! [`Credentials`] and signed with [`SignedRequest`]. Responses that carry
//! an `{"error": {"message": ...}}` payload are surfaced verbatim as
//! [`ApiError::Remote`].

use std::{io, path::Path};

use derive_more::{Display, Error, From};
use hmac::digest::InvalidLength;
use reqwest::{
    blocking::{
        multipart::{Form, Part},
        Client, RequestBuilder, Response,
    },
    header::{AUTHORIZATION, CONTENT_TYPE, DATE},
    Method, StatusCode,
};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

use crate::{
    config::Credentials,
    signature::{request_date, SignedRequest, MULTIPART_CONTENT_TYPE},
};

/// API version prefix of every resource path.
const API_VERSION_PREFIX: &str = "/v1";

/// Freemius API errors.
#[derive(Debug, Display, From, Error)]
pub enum ApiError {
    /// HTTP client error.
    Http(reqwest::Error),

    /// IO-related error.
    Io(io::Error),

    /// Response body is not valid JSON.
    #[display(fmt = "unable to parse API response: {}", _0)]
    Json(serde_json::Error),

    /// The API responded with an error payload.
    #[from(ignore)]
    Remote(#[error(not(source))] String),

    /// Successful response lacks an expected field.
    #[display(fmt = "invalid response: missing \"{}\" field", _0)]
    #[from(ignore)]
    InvalidResponse(#[error(not(source))] &'static str),

    /// Unsuccessful response without an error payload.
    #[display(fmt = "unexpected response status: {}", _0)]
    #[from(ignore)]
    Status(#[error(not(source))] StatusCode),

    /// Unable to sign the request.
    #[display(fmt = "unable to sign request: {}", _0)]
    Signature(#[error(not(source))] InvalidLength),
}

/// A single deployed plugin version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionTag {
    /// Tag identifier.
    #[serde(deserialize_with = "deserialize_string_or_number")]
    pub id: String,

    /// Plugin version, as declared in the plugin header.
    pub version: String,

    /// Bundled Freemius SDK version.
    #[serde(default)]
    pub sdk_version: Option<String>,

    /// Minimal supported WordPress version.
    #[serde(default)]
    pub requires_platform_version: Option<String>,

    /// Latest WordPress version the plugin was tested with.
    #[serde(default)]
    pub tested_up_to_version: Option<String>,

    /// Download counter.
    #[serde(default, deserialize_with = "deserialize_counter")]
    pub downloaded: u64,

    /// Current release mode, as reported by the API (`pending`, `beta`, `released`).
    #[serde(default)]
    pub release_mode: Option<String>,

    /// Creation timestamp.
    #[serde(default)]
    pub created: Option<String>,

    /// Last update timestamp.
    #[serde(default)]
    pub updated: Option<String>,
}

/// Both string and numeric representations of a value, as the API uses them interchangeably.
#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrNumber {
    Number(u64),
    Text(String),
}

fn deserialize_string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match StringOrNumber::deserialize(deserializer)? {
        StringOrNumber::Number(value) => value.to_string(),
        StringOrNumber::Text(value) => value,
    })
}

fn deserialize_counter<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<StringOrNumber>::deserialize(deserializer)? {
        Some(StringOrNumber::Number(value)) => Ok(value),
        Some(StringOrNumber::Text(value)) => value.parse().map_err(serde::de::Error::custom),
        None => Ok(0),
    }
}

/// JSON response body of the tag listing request.
#[derive(Deserialize)]
struct TagList {
    /// Returned tags, most recent first.
    tags: Option<Vec<VersionTag>>,
}

/// Freemius developer API client.
pub struct FreemiusApi {
    /// Underlying HTTP client.
    client: Client,

    /// Base URL without the trailing slash.
    base_url: String,

    /// Credentials used to scope and sign requests.
    credentials: Credentials,
}

impl FreemiusApi {
    /// Create new API client.
    pub fn new(base_url: &str, credentials: Credentials) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("freemius-toolkit/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            credentials,
        })
    }

    /// Check API connectivity, returning the API greeting.
    pub fn ping(&self) -> Result<String, ApiError> {
        let path = format!("{API_VERSION_PREFIX}/ping.json");
        let payload = parse_payload(self.request(Method::GET, &path, "")?.send()?)?;

        payload
            .get("api")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .ok_or(ApiError::InvalidResponse("api"))
    }

    /// List at most `count` most recent tags of the plugin.
    pub fn list_tags(&self, plugin_id: &str, count: usize) -> Result<Vec<VersionTag>, ApiError> {
        let path = self.developer_path(&format!("plugins/{plugin_id}/tags"));

        tracing::debug!(%path, count, "listing tags");

        let payload = parse_payload(
            self.request(Method::GET, &path, "")?
                .query(&[("count", count)])
                .send()?,
        )?;

        serde_json::from_value::<TagList>(payload)?
            .tags
            .ok_or(ApiError::InvalidResponse("tags"))
    }

    /// Upload a new plugin archive, creating a new tag.
    pub fn create_tag(
        &self,
        plugin_id: &str,
        package: &Path,
        add_contributor: bool,
    ) -> Result<VersionTag, ApiError> {
        let path = self.developer_path(&format!("plugins/{plugin_id}/tags"));

        tracing::debug!(%path, package = %package.display(), add_contributor, "uploading package");

        let form = Form::new()
            .text(
                "data",
                json!({ "add_contributor": add_contributor }).to_string(),
            )
            .part("file", Part::file(package)?.mime_str("application/zip")?);

        let payload = parse_payload(
            self.request(Method::POST, &path, MULTIPART_CONTENT_TYPE)?
                .multipart(form)
                .send()?,
        )?;

        parse_created_tag(payload)
    }

    /// Delete a tag.
    pub fn delete_tag(&self, plugin_id: &str, tag_id: &str) -> Result<(), ApiError> {
        let path = self.developer_path(&format!("plugins/{plugin_id}/tags/{tag_id}"));

        tracing::debug!(%path, "deleting tag");

        parse_payload(self.request(Method::DELETE, &path, "")?.send()?)?;

        Ok(())
    }

    /// Download the archive of a tag.
    pub fn download_tag(
        &self,
        plugin_id: &str,
        tag_id: &str,
        premium: bool,
    ) -> Result<Vec<u8>, ApiError> {
        let path = self.developer_path(&format!("plugins/{plugin_id}/tags/{tag_id}.zip"));

        tracing::debug!(%path, premium, "downloading tag");

        let response = self
            .request(Method::GET, &path, "")?
            .query(&[("is_premium", premium)])
            .send()?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .is_some_and(|value| value.contains("json"));

        if is_json || !response.status().is_success() {
            parse_payload(response)?;
            return Err(ApiError::InvalidResponse("file"));
        }

        Ok(response.bytes()?.to_vec())
    }

    /// Resource path scoped to the current developer.
    fn developer_path(&self, path: &str) -> String {
        canonical_path(&format!(
            "{API_VERSION_PREFIX}/developers/{}/{}",
            self.credentials.dev_id,
            path.trim_matches('/')
        ))
    }

    /// Start a signed request to the provided resource path.
    fn request(
        &self,
        method: Method,
        resource_path: &str,
        content_type: &str,
    ) -> Result<RequestBuilder, ApiError> {
        let date = request_date();
        let authorization = SignedRequest {
            method: method.as_str(),
            content_md5: "",
            content_type,
            date: &date,
            resource_path,
        }
        .authorization(&self.credentials)?;

        Ok(self
            .client
            .request(method, format!("{}{resource_path}", self.base_url))
            .header(DATE, date)
            .header(AUTHORIZATION, authorization))
    }
}

/// Append the default `.json` extension to paths without one.
fn canonical_path(path: &str) -> String {
    let last_segment = path.rsplit('/').next().unwrap_or_default();

    if last_segment.contains('.') {
        path.to_owned()
    } else {
        format!("{path}.json")
    }
}

/// Read the response body as JSON, surfacing error payloads.
///
/// An empty body is returned as [`Value::Null`].
fn parse_payload(response: Response) -> Result<Value, ApiError> {
    let status = response.status();
    let body = response.bytes()?;
    payload_from_body(status, &body)
}

fn payload_from_body(status: StatusCode, body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return if status.is_success() {
            Ok(Value::Null)
        } else {
            Err(ApiError::Status(status))
        };
    }

    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(_) if !status.is_success() => return Err(ApiError::Status(status)),
        Err(error) => return Err(error.into()),
    };

    if let Some(message) = payload.pointer("/error/message").and_then(Value::as_str) {
        return Err(ApiError::Remote(message.to_owned()));
    }

    if !status.is_success() {
        return Err(ApiError::Status(status));
    }

    Ok(payload)
}

/// Tag creation must return a record with an identifier.
fn parse_created_tag(payload: Value) -> Result<VersionTag, ApiError> {
    match payload.get("id") {
        Some(Value::Null) | None => Err(ApiError::InvalidResponse("id")),
        Some(_) => Ok(serde_json::from_value(payload)?),
    }
}

#[cfg(test)]
mod tests {
    use reqwest::StatusCode;
    use serde_json::json;

    use super::{
        canonical_path, parse_created_tag, payload_from_body, ApiError, TagList,
    };

    #[test]
    fn error_payload_is_surfaced_verbatim() {
        let result = payload_from_body(
            StatusCode::OK,
            br#"{"error": {"type": "Quota", "message": "quota exceeded", "code": "quota"}}"#,
        );

        match result {
            Err(ApiError::Remote(message)) => assert_eq!(message, "quota exceeded"),
            _ => panic!("expected remote error"),
        }
    }

    #[test]
    fn error_payload_takes_precedence_over_status() {
        let result = payload_from_body(
            StatusCode::UNAUTHORIZED,
            br#"{"error": {"message": "Invalid signature."}}"#,
        );

        assert!(matches!(result, Err(ApiError::Remote(message)) if message == "Invalid signature."));
    }

    #[test]
    fn empty_body() {
        assert!(payload_from_body(StatusCode::OK, b"").unwrap().is_null());
        assert!(matches!(
            payload_from_body(StatusCode::BAD_GATEWAY, b" \n"),
            Err(ApiError::Status(StatusCode::BAD_GATEWAY))
        ));
    }

    #[test]
    fn non_json_failure() {
        assert!(matches!(
            payload_from_body(StatusCode::INTERNAL_SERVER_ERROR, b"<html>oops</html>"),
            Err(ApiError::Status(StatusCode::INTERNAL_SERVER_ERROR))
        ));
    }

    #[test]
    fn created_tag_requires_id() {
        assert!(matches!(
            parse_created_tag(json!({ "version": "1.2.0" })),
            Err(ApiError::InvalidResponse("id"))
        ));

        let tag = parse_created_tag(json!({
            "id": 991,
            "version": "1.2.0",
            "downloaded": "3",
            "release_mode": "pending",
        }))
        .unwrap();

        assert_eq!(tag.id, "991");
        assert_eq!(tag.downloaded, 3);
        assert_eq!(tag.release_mode.as_deref(), Some("pending"));
    }

    #[test]
    fn tag_list_deserialization() {
        let list: TagList = serde_json::from_value(json!({
            "tags": [
                {
                    "id": "12",
                    "version": "1.1.0",
                    "sdk_version": "2.5.10",
                    "requires_platform_version": "5.0",
                    "tested_up_to_version": "6.4",
                    "downloaded": 17,
                    "release_mode": "released",
                    "created": "2024-01-01 10:00:00",
                    "updated": null
                },
                {
                    "id": "13",
                    "version": "1.2.0",
                    "release_mode": "staging"
                }
            ]
        }))
        .unwrap();

        let tags = list.tags.unwrap();

        assert_eq!(tags.len(), 2);
        assert_eq!(tags[1].release_mode.as_deref(), Some("staging"));
        assert_eq!(
            serde_json::to_value(&tags[1]).unwrap()["release_mode"],
            json!("staging")
        );

        assert_eq!(
            serde_json::to_value(&tags[0]).unwrap(),
            json!({
                "id": "12",
                "version": "1.1.0",
                "sdk_version": "2.5.10",
                "requires_platform_version": "5.0",
                "tested_up_to_version": "6.4",
                "downloaded": 17,
                "release_mode": "released",
                "created": "2024-01-01 10:00:00",
                "updated": null
            })
        );
    }

    #[test]
    fn resource_paths() {
        assert_eq!(
            canonical_path("/v1/developers/1/plugins/42/tags"),
            "/v1/developers/1/plugins/42/tags.json"
        );
        assert_eq!(
            canonical_path("/v1/developers/1/plugins/42/tags/7.zip"),
            "/v1/developers/1/plugins/42/tags/7.zip"
        );
    }
}
