//! Live account statistics from the Twitter/X v1.1 API.
//!
//! Requests are signed with OAuth 1.0a (HMAC-SHA1) using the four credential
//! values from the environment. Credentials are verified first; a rejected
//! check is reported as [`StatsOutcome::AuthFailed`] and the statistics
//! endpoint is not called.

use std::time::Duration;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use sha1::Sha1;

use crate::error::TwitterError;

pub const DEFAULT_BASE_URL: &str = "https://api.twitter.com/1.1/";

/// RFC 3986 unreserved characters stay literal; everything else is encoded.
const OAUTH_ENCODE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~');

#[derive(Debug, Clone)]
pub struct TwitterCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct AccountStats {
    pub followers_count: u64,
    pub listed_count: u64,
    pub statuses_count: u64,
}

impl AccountStats {
    /// `[followers, listed, posts]`, the order the scoring model expects.
    pub fn features(&self) -> [u64; 3] {
        [self.followers_count, self.listed_count, self.statuses_count]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatsOutcome {
    Fetched(AccountStats),
    AuthFailed { reason: String },
}

pub struct TwitterClient {
    client: Client,
    credentials: TwitterCredentials,
    base_url: Url,
}

impl TwitterClient {
    pub fn with_base_url(
        credentials: TwitterCredentials,
        timeout_secs: u64,
        base_url: &str,
    ) -> Result<Self, TwitterError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("kol-retrieval/0.1")
            .build()?;

        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| TwitterError::BaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            credentials,
            base_url,
        })
    }

    /// Fetches follower, listed and post counts for `handle`.
    ///
    /// # Errors
    ///
    /// Returns [`TwitterError`] for transport failures or a non-2xx answer from
    /// the statistics endpoint. Credential rejection is not an error; it comes
    /// back as [`StatsOutcome::AuthFailed`].
    pub async fn account_stats(&self, handle: &str) -> Result<StatsOutcome, TwitterError> {
        let verify = self.endpoint("account/verify_credentials.json", &[])?;
        let response = self.signed_get(&verify, &[]).await?;
        if !response.status().is_success() {
            let reason = auth_failure_reason(response.status());
            tracing::warn!(handle, %reason, "twitter authentication failed");
            return Ok(StatsOutcome::AuthFailed { reason });
        }
        tracing::debug!("twitter authentication succeeded");

        let params = [("screen_name", handle)];
        let show = self.endpoint("users/show.json", &params)?;
        let stats: AccountStats = self
            .signed_get(&show, &params)
            .await?
            .error_for_status()?
            .json()
            .await?;

        tracing::info!(handle, followers = stats.followers_count, "fetched account stats");
        Ok(StatsOutcome::Fetched(stats))
    }

    fn endpoint(&self, path: &str, params: &[(&str, &str)]) -> Result<Url, TwitterError> {
        let mut url = self.base_url.join(path).map_err(|e| TwitterError::BaseUrl {
            url: self.base_url.to_string(),
            reason: e.to_string(),
        })?;
        if !params.is_empty() {
            url.query_pairs_mut().extend_pairs(params);
        }
        Ok(url)
    }

    async fn signed_get(
        &self,
        url: &Url,
        params: &[(&str, &str)],
    ) -> Result<reqwest::Response, TwitterError> {
        let nonce: String = rand::rng()
            .sample_iter(&Alphanumeric)
            .take(32)
            .map(char::from)
            .collect();
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let header = authorization_header(&self.credentials, "GET", url, params, &nonce, &timestamp)?;

        Ok(self
            .client
            .get(url.clone())
            .header(AUTHORIZATION, header)
            .send()
            .await?)
    }
}

fn auth_failure_reason(status: StatusCode) -> String {
    match status {
        StatusCode::UNAUTHORIZED => "credentials rejected (401)".to_string(),
        StatusCode::FORBIDDEN => "credentials lack access (403)".to_string(),
        other => format!("credential check returned {other}"),
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, OAUTH_ENCODE).to_string()
}

fn signature_base(method: &str, url: &Url, params: &[(String, String)]) -> String {
    let mut encoded: Vec<(String, String)> = params
        .iter()
        .map(|(k, v)| (encode(k), encode(v)))
        .collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");

    let mut base_url = url.clone();
    base_url.set_query(None);
    base_url.set_fragment(None);

    format!(
        "{}&{}&{}",
        method.to_uppercase(),
        encode(base_url.as_str()),
        encode(&param_string)
    )
}

fn sign(base: &str, consumer_secret: &str, token_secret: &str) -> Result<String, TwitterError> {
    let key = format!("{}&{}", encode(consumer_secret), encode(token_secret));
    let mut mac = Hmac::<Sha1>::new_from_slice(key.as_bytes())
        .map_err(|e| TwitterError::Signing(e.to_string()))?;
    mac.update(base.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

fn authorization_header(
    credentials: &TwitterCredentials,
    method: &str,
    url: &Url,
    query: &[(&str, &str)],
    nonce: &str,
    timestamp: &str,
) -> Result<String, TwitterError> {
    let mut oauth = vec![
        ("oauth_consumer_key".to_string(), credentials.api_key.clone()),
        ("oauth_nonce".to_string(), nonce.to_string()),
        ("oauth_signature_method".to_string(), "HMAC-SHA1".to_string()),
        ("oauth_timestamp".to_string(), timestamp.to_string()),
        ("oauth_token".to_string(), credentials.access_token.clone()),
        ("oauth_version".to_string(), "1.0".to_string()),
    ];

    let mut signed = oauth.clone();
    signed.extend(query.iter().map(|(k, v)| ((*k).to_string(), (*v).to_string())));
    let base = signature_base(method, url, &signed);
    let signature = sign(&base, &credentials.api_secret, &credentials.access_token_secret)?;
    oauth.push(("oauth_signature".to_string(), signature));

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("OAuth {fields}"))
}
