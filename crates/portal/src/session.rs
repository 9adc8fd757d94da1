use reqwest::blocking::Client;
use std::borrow::Cow;
use std::time::Duration;

use crate::error::TransportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// A fully rendered request: the URL already carries its query string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Urlencoded body fields, POST only.
    pub form: Vec<(String, String)>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        HttpRequest {
            method: Method::Get,
            url: url.into(),
            headers: Vec::new(),
            form: Vec::new(),
        }
    }

    pub fn post(url: impl Into<String>) -> Self {
        HttpRequest {
            method: Method::Post,
            ..HttpRequest::get(url)
        }
    }
}

/// A loaded response. `url` is the final URL after redirects, used to
/// resolve relative form actions.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    pub body: Vec<u8>,
}

impl Page {
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Cookie-carrying HTTP conversation with one portal. One instance per
/// retrieval; never shared between concurrent retrievals.
pub trait Session {
    fn send(&mut self, request: HttpRequest) -> Result<Page, TransportError>;
}

// ── reqwest backend ───────────────────────────────────────────────────────────

pub struct HttpSession {
    client: Client,
}

impl HttpSession {
    pub fn new(user_agent: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .cookie_store(true)
            .user_agent(user_agent)
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self { client })
    }
}

impl Session for HttpSession {
    fn send(&mut self, request: HttpRequest) -> Result<Page, TransportError> {
        let mut builder = match request.method {
            Method::Get => self.client.get(&request.url),
            Method::Post => self.client.post(&request.url).form(&request.form),
        };
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder.send()?;
        let url = response.url().to_string();
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                url,
                status: status.as_u16(),
            });
        }
        let body = response.bytes()?.to_vec();
        Ok(Page { url, body })
    }
}
