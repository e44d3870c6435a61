//! SOAP client for the content-metadata web service
//!
//! Requests are signed with a WS-Security UsernameToken using a password
//! digest of `base64(sha1(nonce + created + shared_secret))`.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::escape::escape;
use quick_xml::events::Event;
use rand::RngCore;
use reqwest::StatusCode;
use sha1::{Digest, Sha1};
use tracing::debug;

use super::traits::MetadataService;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::types::{AssetId, MetadataFormat, PollStatus, RequestHandle};

const SERVICE_PATH: &str = "/olsa/services/Olsa";
const SERVICE_NAMESPACE: &str = "http://www.skillsoft.com/services/olsa_v1_0/";
const SUBMIT_ACTION: &str = "AI_GetMultipleAssetMetaData";
const POLL_ACTION: &str = "AI_PollForAssetMetaData";
/// Fault name the service uses while a request is still being processed
const NOT_READY_FAULT: &str = "DataNotReadyYet";
/// Lifetime of the signed timestamp
const TIMESTAMP_TTL_MINUTES: i64 = 5;

/// SOAP implementation of [`MetadataService`]
#[derive(Clone, Debug)]
pub struct SoapMetadataClient {
    http: reqwest::Client,
    service_url: String,
    customer_id: String,
    shared_secret: String,
}

/// A SOAP fault returned in a response body
#[derive(Debug, Clone, PartialEq, Eq)]
struct SoapFault {
    message: String,
    not_ready: bool,
}

impl SoapMetadataClient {
    /// Create a client for `endpoint`
    ///
    /// A bare host name is served over HTTPS; a value with an explicit
    /// `http://` or `https://` scheme is used as the base URL as-is.
    pub fn new(
        http: reqwest::Client,
        endpoint: &str,
        customer_id: impl Into<String>,
        shared_secret: impl Into<String>,
    ) -> Self {
        let endpoint = endpoint.trim().trim_end_matches('/');
        let base = if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
            endpoint.to_string()
        } else {
            format!("https://{endpoint}")
        };
        Self {
            http,
            service_url: format!("{base}{SERVICE_PATH}"),
            customer_id: customer_id.into(),
            shared_secret: shared_secret.into(),
        }
    }

    /// Create a client from the site section of a validated configuration
    pub fn from_config(config: &Config, http: reqwest::Client) -> Result<Self> {
        let customer_id = config
            .site
            .customer_id
            .clone()
            .ok_or_else(|| Error::config("site.customer_id", "site.customer_id is required"))?;
        let shared_secret = config.site.shared_secret.clone().ok_or_else(|| {
            Error::config("site.shared_secret", "site.shared_secret is required")
        })?;
        Ok(Self::new(http, config.endpoint(), customer_id, shared_secret))
    }

    /// Full URL requests are posted to
    pub fn service_url(&self) -> &str {
        &self.service_url
    }

    fn security_header(&self) -> String {
        let mut nonce = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut nonce);
        let now = Utc::now();
        let created = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let expires = (now + ChronoDuration::minutes(TIMESTAMP_TTL_MINUTES))
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let digest = password_digest(&nonce, &created, &self.shared_secret);

        format!(
            concat!(
                r#"<wsse:Security soapenv:mustUnderstand="0" "#,
                r#"xmlns:wsse="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-secext-1.0.xsd" "#,
                r#"xmlns:wsu="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-wssecurity-utility-1.0.xsd">"#,
                r#"<wsu:Timestamp><wsu:Created>{created}</wsu:Created><wsu:Expires>{expires}</wsu:Expires></wsu:Timestamp>"#,
                r#"<wsse:UsernameToken><wsse:Username>{user}</wsse:Username>"#,
                r#"<wsse:Password Type="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-username-token-profile-1.0#PasswordDigest">{digest}</wsse:Password>"#,
                r#"<wsse:Nonce EncodingType="http://docs.oasis-open.org/wss/2004/01/oasis-200401-wss-soap-message-security-1.0#Base64Binary">{nonce}</wsse:Nonce>"#,
                r#"<wsu:Created>{created}</wsu:Created></wsse:UsernameToken></wsse:Security>"#
            ),
            created = created,
            expires = expires,
            user = escape(&self.customer_id),
            digest = digest,
            nonce = BASE64.encode(nonce),
        )
    }

    fn envelope(&self, body: &str) -> String {
        format!(
            concat!(
                r#"<?xml version="1.0" encoding="utf-8"?>"#,
                r#"<soapenv:Envelope xmlns:soapenv="http://schemas.xmlsoap.org/soap/envelope/" xmlns:olsa="{ns}">"#,
                r#"<soapenv:Header>{security}</soapenv:Header>"#,
                r#"<soapenv:Body>{body}</soapenv:Body></soapenv:Envelope>"#
            ),
            ns = SERVICE_NAMESPACE,
            security = self.security_header(),
            body = body,
        )
    }

    /// Post one operation; a fault in the body is returned as `Ok(Err(fault))`
    async fn call(
        &self,
        action: &str,
        body: String,
    ) -> Result<std::result::Result<SoapResponse, SoapFault>> {
        debug!(action, url = %self.service_url, "sending SOAP request");

        let response = self
            .http
            .post(&self.service_url)
            .header(reqwest::header::CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", format!("{SERVICE_NAMESPACE}{action}"))
            .body(self.envelope(&body))
            .send()
            .await
            .map_err(|e| Error::service(action, e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| Error::service(action, format!("failed to read response: {e}")))?;

        let parsed = SoapResponse::parse(action, &text);
        if let Ok(document) = &parsed
            && let Some(fault) = document.fault()
        {
            debug!(action, %status, fault = %fault.message, "SOAP fault received");
            return Ok(Err(fault));
        }
        if !status.is_success() {
            return Err(status_error(action, status));
        }
        parsed.map(Ok)
    }
}

#[async_trait]
impl MetadataService for SoapMetadataClient {
    async fn submit_metadata_request(
        &self,
        asset_ids: &[AssetId],
        format: MetadataFormat,
    ) -> Result<RequestHandle> {
        let joined = asset_ids
            .iter()
            .map(AssetId::as_str)
            .collect::<Vec<_>>()
            .join(",");
        let body = format!(
            concat!(
                "<olsa:GetMultipleAssetMetaDataRequest>",
                "<olsa:customerId>{}</olsa:customerId>",
                "<olsa:assetId>{}</olsa:assetId>",
                "<olsa:metadataFormat>{}</olsa:metadataFormat>",
                "</olsa:GetMultipleAssetMetaDataRequest>"
            ),
            escape(&self.customer_id),
            escape(&joined),
            format.as_str(),
        );

        match self.call(SUBMIT_ACTION, body).await? {
            Ok(response) => response
                .text("handle")
                .map(|handle| RequestHandle(handle.to_string()))
                .ok_or_else(|| Error::service(SUBMIT_ACTION, "response has no handle element")),
            Err(fault) => Err(Error::ServiceFault(fault.message)),
        }
    }

    async fn poll_for_result(&self, handle: &RequestHandle) -> Result<PollStatus> {
        let body = format!(
            concat!(
                "<olsa:PollForAssetMetaDataRequest>",
                "<olsa:customerId>{}</olsa:customerId>",
                "<olsa:handle>{}</olsa:handle>",
                "</olsa:PollForAssetMetaDataRequest>"
            ),
            escape(&self.customer_id),
            escape(&handle.0),
        );

        match self.call(POLL_ACTION, body).await? {
            Ok(response) => response
                .text("olsaURL")
                .map(|url| PollStatus::Ready {
                    download_url: url.to_string(),
                })
                .ok_or_else(|| Error::service(POLL_ACTION, "response has no olsaURL element")),
            Err(fault) if fault.not_ready => Ok(PollStatus::Pending),
            Err(fault) => Err(Error::ServiceFault(fault.message)),
        }
    }

    fn name(&self) -> &str {
        "soap"
    }
}

/// Error for a non-success status that carried no SOAP fault
///
/// Client errors other than 429 are permanent; everything else may clear up.
fn status_error(action: &str, status: StatusCode) -> Error {
    if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
        Error::ServiceFault(format!("{action} rejected with HTTP {status}"))
    } else {
        Error::service(action, format!("HTTP {status}"))
    }
}

/// `base64(sha1(nonce + created + secret))`
fn password_digest(nonce: &[u8], created: &str, secret: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(nonce);
    hasher.update(created.as_bytes());
    hasher.update(secret.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// The parts of a response envelope the client reads, keyed by local name
#[derive(Debug, Default)]
struct SoapResponse {
    /// Text of the first non-empty element with each local name
    text: HashMap<String, String>,
    has_fault: bool,
    /// Local names of elements inside a fault's `detail`
    fault_details: Vec<String>,
}

impl SoapResponse {
    fn parse(action: &str, body: &str) -> Result<Self> {
        let mut reader = Reader::from_str(body);
        reader.trim_text(true);

        let mut parsed = Self::default();
        // Open elements with the text gathered so far
        let mut open: Vec<(String, String)> = Vec::new();
        loop {
            let event = reader.read_event().map_err(|e| {
                Error::service(
                    action,
                    format!("malformed XML at byte {}: {e}", reader.buffer_position()),
                )
            })?;
            match event {
                Event::Start(e) => open.push((local_name(e.local_name().as_ref()), String::new())),
                Event::Empty(e) => {
                    parsed.close(&open, local_name(e.local_name().as_ref()), String::new())
                }
                Event::Text(e) => {
                    let text = e
                        .unescape()
                        .map_err(|e| Error::service(action, format!("bad XML text: {e}")))?;
                    if let Some((_, buffer)) = open.last_mut() {
                        buffer.push_str(&text);
                    }
                }
                Event::CData(e) => {
                    if let Some((_, buffer)) = open.last_mut() {
                        buffer.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(_) => {
                    if let Some((name, text)) = open.pop() {
                        parsed.close(&open, name, text);
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }
        Ok(parsed)
    }

    /// Record a finished element whose ancestors are `open`
    fn close(&mut self, open: &[(String, String)], name: String, text: String) {
        if name == "Fault" {
            self.has_fault = true;
        }
        let in_fault_detail = open.iter().any(|(n, _)| n == "Fault")
            && open.iter().any(|(n, _)| n.eq_ignore_ascii_case("detail"));
        if in_fault_detail {
            self.fault_details.push(name.clone());
        }
        let text = text.trim();
        if !text.is_empty() {
            self.text.entry(name).or_insert_with(|| text.to_string());
        }
    }

    fn text(&self, name: &str) -> Option<&str> {
        self.text.get(name).map(String::as_str)
    }

    fn fault(&self) -> Option<SoapFault> {
        if !self.has_fault {
            return None;
        }
        let message = self
            .text("faultstring")
            .unwrap_or("unknown SOAP fault")
            .to_string();
        Some(SoapFault {
            not_ready: self
                .fault_details
                .iter()
                .any(|name| name.starts_with(NOT_READY_FAULT)),
            message,
        })
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}
