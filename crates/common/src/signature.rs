//! Freemius request signing.
//!
//! Every request is authenticated with an HMAC-SHA256 signature over the
//! request method, body digest, content type, date and resource path.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use hmac::{digest::InvalidLength, Hmac, Mac};
use sha2::Sha256;

use crate::config::Credentials;

/// Content type used to sign multipart uploads.
pub const MULTIPART_CONTENT_TYPE: &str = "multipart/form-data";

/// Request parts covered by the signature.
pub struct SignedRequest<'a> {
    /// Uppercase HTTP method.
    pub method: &'a str,

    /// Hex MD5 digest of a JSON body, empty otherwise.
    pub content_md5: &'a str,

    /// Request content type, empty for bodiless requests.
    pub content_type: &'a str,

    /// RFC 2822 date, also sent in the `Date` header.
    pub date: &'a str,

    /// Canonical resource path, without the query string.
    pub resource_path: &'a str,
}

impl SignedRequest<'_> {
    /// Build the `Authorization` header value for this request.
    ///
    /// HMAC accepts keys of any length, so [`InvalidLength`] is only returned
    /// if the underlying MAC implementation changes that contract.
    pub fn authorization(&self, credentials: &Credentials) -> Result<String, InvalidLength> {
        let string_to_sign = [
            self.method,
            self.content_md5,
            self.content_type,
            self.date,
            self.resource_path,
        ]
        .join("\n");

        let mut mac = Hmac::<Sha256>::new_from_slice(credentials.secret_key.as_bytes())?;
        mac.update(string_to_sign.as_bytes());
        let digest = hex::encode(mac.finalize().into_bytes());

        // Identical keys mean the signature uses public key hash encoding.
        let auth_type = if credentials.secret_key == credentials.public_key {
            "FSP"
        } else {
            "FS"
        };

        Ok(format!(
            "{auth_type} {}:{}:{}",
            credentials.dev_id,
            credentials.public_key,
            URL_SAFE_NO_PAD.encode(digest)
        ))
    }
}

/// Current time formatted for the `Date` header.
pub fn request_date() -> String {
    Utc::now().to_rfc2822()
}
