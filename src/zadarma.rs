//! Zadarma REST API client.
//!
//! Every signed request carries `Authorization: <key>:<token>` where the token
//! is `base64(hex(HMAC-SHA1(secret, method + params + hex(MD5(params)))))`,
//! computed over the key-sorted, form-encoded parameter string. The same
//! string is what goes on the wire, so the provider recomputes the identical
//! digest. A mismatch only ever shows up as a rejected response.

use std::collections::BTreeMap;
use std::future::Future;

use base64::Engine;
use hmac::{Hmac, Mac};
use md5::{Digest, Md5};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use sha1::Sha1;
use tracing::{debug, info};

pub const PRODUCTION_URL: &str = "https://api.zadarma.com";
pub const SANDBOX_URL: &str = "https://api-sandbox.zadarma.com";
pub const CALLBACK_METHOD: &str = "/v1/request/callback/";
pub const DEFAULT_FORMAT: &str = "json";

type HmacSha1 = Hmac<Sha1>;

/// Request parameters. Keys are kept sorted, which is the order the
/// signature is computed in.
pub type Params = BTreeMap<String, String>;

#[derive(Debug, thiserror::Error)]
pub enum ZadarmaError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("HTTP error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("Parse error: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    /// Case-insensitive. Anything that isn't one of the four verbs is GET.
    pub fn parse(verb: &str) -> Self {
        match verb.to_ascii_uppercase().as_str() {
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            _ => Method::Get,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn params_in_query(&self) -> bool {
        matches!(self, Method::Get | Method::Delete)
    }
}

/// Raw outcome of a call. Non-2xx statuses land here too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, ZadarmaError> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

/// Form-encode one key or value: alphanumerics and `-_.~` stay, space is `+`.
fn encode_component(s: &str) -> String {
    urlencoding::encode(s).replace("%20", "+")
}

/// Key-sorted `k=v&k=v` string used both for signing and on the wire.
pub fn canonical_params(params: &Params) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", encode_component(k), encode_component(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Build the `Authorization` header value for `method` and its canonical
/// parameter string.
pub fn sign(key: &str, secret: &str, method: &str, canonical: &str) -> String {
    let params_md5 = hex::encode(Md5::digest(canonical.as_bytes()));

    let mut mac = HmacSha1::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(method.as_bytes());
    mac.update(canonical.as_bytes());
    mac.update(params_md5.as_bytes());
    let digest_hex = hex::encode(mac.finalize().into_bytes());

    let token = base64::engine::general_purpose::STANDARD.encode(digest_hex.as_bytes());
    format!("{key}:{token}")
}

/// The one operation the command router needs from the telephony provider.
pub trait CallbackApi: Send + Sync {
    /// Ask the provider to ring `from` and bridge it to `to`.
    fn request_callback(
        &self,
        from: &str,
        to: &str,
    ) -> impl Future<Output = Result<ApiResponse, ZadarmaError>> + Send;
}

pub struct ZadarmaClient {
    key: String,
    secret: String,
    base_url: String,
    http: reqwest::Client,
}

impl ZadarmaClient {
    pub fn new(key: String, secret: String, sandbox: bool) -> Self {
        let base_url = if sandbox { SANDBOX_URL } else { PRODUCTION_URL };
        Self::with_base_url(key, secret, base_url)
    }

    pub fn with_base_url(key: String, secret: String, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            key,
            secret,
            base_url,
            http: reqwest::Client::new(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Issue one request against `method` (an API path such as
    /// `/v1/info/balance/`). `format` is added to `params` before signing.
    pub async fn call(
        &self,
        method: &str,
        mut params: Params,
        verb: Method,
        format: &str,
        signed: bool,
    ) -> Result<ApiResponse, ZadarmaError> {
        params.insert("format".to_string(), format.to_string());
        let canonical = canonical_params(&params);
        let url = format!("{}{}", self.base_url, method);

        debug!("Zadarma {} {} ({})", verb.as_str(), url, canonical);

        let mut request = if verb.params_in_query() {
            let url = format!("{url}?{canonical}");
            match verb {
                Method::Delete => self.http.delete(url),
                _ => self.http.get(url),
            }
        } else {
            let request = match verb {
                Method::Put => self.http.put(&url),
                _ => self.http.post(&url),
            };
            request
                .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(canonical.clone())
        };

        if signed {
            let auth = sign(&self.key, &self.secret, method, &canonical);
            request = request.header(AUTHORIZATION, auth);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;

        info!("Zadarma {} {} -> {}", verb.as_str(), method, status);
        Ok(ApiResponse { status, body })
    }
}

impl CallbackApi for ZadarmaClient {
    async fn request_callback(&self, from: &str, to: &str) -> Result<ApiResponse, ZadarmaError> {
        let params = Params::from([
            ("from".to_string(), from.to_string()),
            ("to".to_string(), to.to_string()),
        ]);
        self.call(CALLBACK_METHOD, params, Method::Get, DEFAULT_FORMAT, true)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_canonical_params_ignore_insertion_order() {
        let a = params(&[("to", "102"), ("from", "+380635154798"), ("format", "json")]);
        let b = params(&[("format", "json"), ("from", "+380635154798"), ("to", "102")]);

        assert_eq!(canonical_params(&a), canonical_params(&b));
        assert_eq!(canonical_params(&a), "format=json&from=%2B380635154798&to=102");
    }

    #[test]
    fn test_canonical_params_form_encoding() {
        let p = params(&[("caller id", "a b~*/&=")]);
        assert_eq!(canonical_params(&p), "caller+id=a+b~%2A%2F%26%3D");
    }

    #[test]
    fn test_canonical_params_empty() {
        assert_eq!(canonical_params(&Params::new()), "");
    }

    #[test]
    fn test_sign_known_vector() {
        let canonical = "format=json&from=%2B380635154798&to=101";
        let token = sign("testkey", "testsecret", CALLBACK_METHOD, canonical);
        assert_eq!(
            token,
            "testkey:OTU5MWUxODNmYTI0ZWY5MDk0ZjVhOTZmNjM5MTFlNTFkYWMxNzJkZg=="
        );
    }

    #[test]
    fn test_sign_is_deterministic() {
        let canonical = "format=json&from=%2B380635154798&to=102";
        let first = sign("k", "s", CALLBACK_METHOD, canonical);
        let second = sign("k", "s", CALLBACK_METHOD, canonical);
        assert_eq!(first, second);
    }

    #[test]
    fn test_sign_changes_with_any_value() {
        let base = params(&[("format", "json"), ("from", "+380635154798"), ("to", "101")]);
        let reference = sign("k", "s", CALLBACK_METHOD, &canonical_params(&base));

        for key in ["format", "from", "to"] {
            let mut changed = base.clone();
            changed.get_mut(key).unwrap().push('0');
            let token = sign("k", "s", CALLBACK_METHOD, &canonical_params(&changed));
            assert_ne!(token, reference, "changing {key} must change the token");
        }
    }

    #[test]
    fn test_sign_depends_on_method_and_secret() {
        let canonical = "format=json";
        let reference = sign("k", "s", "/v1/info/balance/", canonical);
        assert_ne!(reference, sign("k", "s", "/v1/info/price/", canonical));
        assert_ne!(reference, sign("k", "other", "/v1/info/balance/", canonical));
    }

    #[test]
    fn test_sign_token_is_key_prefixed_base64_of_hex() {
        let token = sign("mykey", "s", CALLBACK_METHOD, "format=json");
        let encoded = token.strip_prefix("mykey:").expect("key prefix");
        let decoded = base64::engine::general_purpose::STANDARD.decode(encoded).unwrap();
        let hex_text = String::from_utf8(decoded).unwrap();
        assert_eq!(hex_text.len(), 40);
        assert!(hex_text.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(Method::parse("get"), Method::Get);
        assert_eq!(Method::parse("Post"), Method::Post);
        assert_eq!(Method::parse("PUT"), Method::Put);
        assert_eq!(Method::parse("delete"), Method::Delete);
        assert_eq!(Method::parse("PATCH"), Method::Get);
        assert_eq!(Method::parse(""), Method::Get);
    }

    #[test]
    fn test_base_url_selection() {
        let prod = ZadarmaClient::new("k".into(), "s".into(), false);
        let sandbox = ZadarmaClient::new("k".into(), "s".into(), true);
        let custom = ZadarmaClient::with_base_url("k".into(), "s".into(), "http://127.0.0.1:9/");

        assert_eq!(prod.base_url(), PRODUCTION_URL);
        assert_eq!(sandbox.base_url(), SANDBOX_URL);
        assert_eq!(custom.base_url(), "http://127.0.0.1:9");
    }

    #[test]
    fn test_api_response_helpers() {
        let ok = ApiResponse {
            status: 200,
            body: r#"{"status":"success"}"#.to_string(),
        };
        let denied = ApiResponse {
            status: 403,
            body: "Not authorized".to_string(),
        };

        assert!(ok.is_ok());
        assert!(!denied.is_ok());

        let value: serde_json::Value = ok.json().unwrap();
        assert_eq!(value["status"], "success");
        assert!(matches!(denied.json::<serde_json::Value>(), Err(ZadarmaError::Decode(_))));
    }
}
