//! SOAP client for UPnP service control
//!
//! This crate provides a minimal SOAP client for invoking actions on a UPnP
//! service's control URL. It builds the SOAP 1.1 envelope, maps the UPnP
//! fault statuses to typed errors and extracts output arguments from the
//! response body.

mod error;

pub use error::{SoapError, UpnpFault};

use std::borrow::Cow;
use std::time::Duration;

use quick_xml::escape::{escape, unescape};
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;
use xmltree::Element;

const ENVELOPE_START: &str = "<?xml version=\"1.0\"?>\n\
    <s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
    s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\"><s:Body>";
const ENVELOPE_END: &str = "</s:Body></s:Envelope>";

/// Body of a successful (HTTP 200) action response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    body: String,
}

impl SoapResponse {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    /// Value of the first non-empty `<name>value</name>` element in the body.
    ///
    /// # Errors
    ///
    /// [`SoapError::MissingArgument`] when the element is absent or empty.
    pub fn argument(&self, name: &str) -> Result<String, SoapError> {
        self.optional_argument(name)
            .ok_or_else(|| SoapError::MissingArgument(name.to_string()))
    }

    /// Like [`argument`](Self::argument) but absent arguments are `None`
    pub fn optional_argument(&self, name: &str) -> Option<String> {
        let open = format!("<{}>", name);
        let close = format!("</{}>", name);

        let start = self.body.find(&open)? + open.len();
        let length = self.body[start..].find(&close)?;
        let raw = &self.body[start..start + length];
        if raw.is_empty() {
            return None;
        }
        let value = unescape(raw).unwrap_or(Cow::Borrowed(raw));
        Some(value.into_owned())
    }
}

/// A minimal SOAP client for UPnP device communication
#[derive(Debug, Clone)]
pub struct SoapClient {
    http: reqwest::Client,
}

impl SoapClient {
    /// Create a new SOAP client with a 5 second connect and 10 second request timeout
    pub fn new() -> Self {
        Self::with_timeouts(Duration::from_secs(5), Duration::from_secs(10))
    }

    pub fn with_timeouts(connect: Duration, request: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(connect)
            .timeout(request)
            .build()
            .unwrap_or_else(|e| {
                warn!("Falling back to default HTTP client: {}", e);
                reqwest::Client::new()
            });
        Self { http }
    }

    /// Invoke `action` of `service_uri` at `control_url`.
    ///
    /// `arguments` become child elements of the action element, in order,
    /// with their values XML-escaped.
    ///
    /// # Errors
    ///
    /// - [`SoapError::InvalidArguments`] for HTTP 402
    /// - [`SoapError::ActionFailed`] for HTTP 501
    /// - [`SoapError::UnexpectedHttpStatus`] for any other status but 200
    pub async fn call(
        &self,
        control_url: &str,
        service_uri: &str,
        action: &str,
        arguments: &[(&str, &str)],
    ) -> Result<SoapResponse, SoapError> {
        let url = Url::parse(control_url)
            .map_err(|e| SoapError::InvalidEndpoint(format!("{}: {}", control_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SoapError::InvalidEndpoint(control_url.to_string()));
        }

        let body = envelope(service_uri, action, arguments);
        let soap_action = format!("\"{}#{}\"", service_uri, action);
        debug!("SOAP {} {}", soap_action, url);

        let response = self
            .http
            .post(url)
            .header(CONTENT_TYPE, "text/xml; charset=\"utf-8\"")
            .header("SOAPACTION", soap_action)
            .body(body)
            .send()
            .await
            .map_err(|e| SoapError::Network(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SoapError::Network(e.to_string()))?;

        match status {
            StatusCode::OK => Ok(SoapResponse::new(text)),
            StatusCode::PAYMENT_REQUIRED => Err(SoapError::InvalidArguments),
            StatusCode::NOT_IMPLEMENTED => Err(SoapError::ActionFailed),
            other => Err(SoapError::UnexpectedHttpStatus {
                status: other.as_u16(),
                fault: parse_fault(&text),
            }),
        }
    }
}

impl Default for SoapClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build the request envelope for `action`
pub fn envelope(service_uri: &str, action: &str, arguments: &[(&str, &str)]) -> String {
    let mut body = String::from(ENVELOPE_START);
    body.push_str(&format!("<u:{} xmlns:u=\"{}\">", action, escape(service_uri)));
    for (name, value) in arguments {
        body.push_str(&format!("<{0}>{1}</{0}>", name, escape(*value)));
    }
    body.push_str(&format!("</u:{}>", action));
    body.push_str(ENVELOPE_END);
    body
}

/// Extract the `<UPnPError>` detail from a fault body, if there is one
fn parse_fault(body: &str) -> Option<UpnpFault> {
    let xml = Element::parse(body.as_bytes()).ok()?;
    let error = xml
        .get_child("Body")?
        .get_child("Fault")?
        .get_child("detail")?
        .get_child("UPnPError")?;

    let code = error
        .get_child("errorCode")?
        .get_text()?
        .trim()
        .parse::<u16>()
        .ok()?;
    let description = error
        .get_child("errorDescription")
        .and_then(|e| e.get_text())
        .map(|text| text.trim().to_string())
        .unwrap_or_default();
    Some(UpnpFault { code, description })
}
