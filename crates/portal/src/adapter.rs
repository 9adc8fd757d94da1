use std::collections::BTreeMap;
use std::time::Duration;
use url::Url;

use crate::error::TransportError;
use crate::forms::FormSelector;
use crate::predicate::ResponsePredicate;
use crate::session::{HttpRequest, Method};

/// Placeholders available to every template.
pub mod vars {
    pub const USERNAME: &str = "username";
    pub const PASSWORD: &str = "password";
    pub const START: &str = "start";
    pub const END: &str = "end";
    /// Milliseconds since the Unix epoch, refreshed for every request.
    pub const NOW_MS: &str = "now_ms";
    /// Correlation token of the pending challenge, when the portal issues one.
    pub const TOKEN: &str = "token";
}

/// A request template. URL, query values and body values may contain
/// `{placeholder}`s.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub method: Method,
    pub url: &'static str,
    pub query: Vec<(&'static str, &'static str)>,
    pub body: Vec<(&'static str, &'static str)>,
    /// Send the adapter's XHR header set.
    pub xhr: bool,
}

impl RequestSpec {
    pub fn get(url: &'static str) -> Self {
        RequestSpec {
            method: Method::Get,
            url,
            query: Vec::new(),
            body: Vec::new(),
            xhr: false,
        }
    }

    pub fn post(url: &'static str) -> Self {
        RequestSpec {
            method: Method::Post,
            ..RequestSpec::get(url)
        }
    }

    pub fn query(mut self, name: &'static str, value: &'static str) -> Self {
        self.query.push((name, value));
        self
    }

    pub fn body(mut self, name: &'static str, value: &'static str) -> Self {
        self.body.push((name, value));
        self
    }

    pub fn xhr(mut self) -> Self {
        self.xhr = true;
        self
    }
}

#[derive(Debug, Clone)]
pub enum Step {
    Send(RequestSpec),
    /// Send, then store the trimmed response body in a variable.
    Capture { request: RequestSpec, var: &'static str },
    /// Fill in a form of the current page and submit it.
    Submit {
        form: FormSelector,
        fields: Vec<(&'static str, &'static str)>,
    },
    /// Copy a control value of a form on the current page into a variable.
    ReadField {
        form: FormSelector,
        field: &'static str,
        var: &'static str,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChallengeKind {
    /// Out-of-band confirmation in the bank's mobile app.
    AppPush,
    /// One code typed by the operator.
    ManualOtp,
    /// A PIN, then a separately generated mobile code.
    ManualPinOtp,
}

#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    pub label: &'static str,
    /// Variable the answer is stored in.
    pub var: &'static str,
    pub masked: bool,
}

#[derive(Debug)]
pub struct LoginSpec {
    pub steps: Vec<Step>,
    /// Checked against the page the last step loaded.
    pub accepted: Box<dyn ResponsePredicate>,
}

#[derive(Debug)]
pub struct ChallengeSpec {
    /// Initiation requests. A `ReadField` into [`vars::TOKEN`] sets the
    /// correlation token.
    pub steps: Vec<Step>,
}

#[derive(Debug)]
pub struct PollingSpec {
    pub status: RequestSpec,
    pub confirmed: Box<dyn ResponsePredicate>,
    pub interval: Duration,
    pub max_attempts: u32,
    /// Run right after a status check matched.
    pub on_confirmed: Vec<Step>,
}

#[derive(Debug)]
pub struct FallbackStage {
    /// Reported when the stage's answer is refused.
    pub name: &'static str,
    pub prompt: Prompt,
    pub steps: Vec<Step>,
    /// Checked against the page the last step loaded.
    pub success: Box<dyn ResponsePredicate>,
}

#[derive(Debug)]
pub struct FallbackSpec {
    pub kind: ChallengeKind,
    /// Shown to the operator when polling gives up.
    pub notice: &'static str,
    pub stages: Vec<FallbackStage>,
}

#[derive(Debug)]
pub struct ExportSpec {
    /// Navigation needed before the export link is valid.
    pub prepare: Vec<Step>,
    pub download: RequestSpec,
}

#[derive(Debug)]
pub struct PortalAdapter {
    pub name: &'static str,
    pub user_agent: &'static str,
    pub xhr_headers: Vec<(&'static str, &'static str)>,
    /// `chrono` format the portal expects for the requested date range.
    pub date_format: &'static str,
    pub login: LoginSpec,
    pub challenge: ChallengeSpec,
    pub polling: PollingSpec,
    pub fallback: Option<FallbackSpec>,
    /// Final confirmation once the challenge is satisfied.
    pub confirm: Vec<Step>,
    pub export: ExportSpec,
    pub logout: RequestSpec,
}

impl PortalAdapter {
    pub fn render(&self, spec: &RequestSpec, vars: &Vars) -> Result<HttpRequest, TransportError> {
        let rendered = vars.render(spec.url);
        let url = if spec.query.is_empty() {
            rendered
        } else {
            let mut url = Url::parse(&rendered).map_err(|source| TransportError::InvalidUrl {
                url: rendered.clone(),
                source,
            })?;
            url.query_pairs_mut()
                .extend_pairs(spec.query.iter().map(|(k, v)| (*k, vars.render(v))));
            url.to_string()
        };

        let headers = if spec.xhr {
            self.xhr_headers
                .iter()
                .map(|(k, v)| (k.to_string(), vars.render(v)))
                .collect()
        } else {
            Vec::new()
        };

        Ok(HttpRequest {
            method: spec.method,
            url,
            headers,
            form: spec
                .body
                .iter()
                .map(|(k, v)| (k.to_string(), vars.render(v)))
                .collect(),
        })
    }
}

/// Values substituted into `{placeholder}`s. Unknown placeholders are left
/// verbatim.
#[derive(Default, Clone)]
pub struct Vars(BTreeMap<&'static str, String>);

impl Vars {
    pub fn set(&mut self, name: &'static str, value: impl Into<String>) {
        self.0.insert(name, value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn render(&self, template: &str) -> String {
        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            match after.find('}') {
                Some(close) => {
                    let key = &after[..close];
                    match self.get(key) {
                        Some(value) => out.push_str(value),
                        None => {
                            out.push('{');
                            out.push_str(key);
                            out.push('}');
                        }
                    }
                    rest = &after[close + 1..];
                }
                None => {
                    out.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        out
    }
}

// Values include the password; keep them out of logs.
impl std::fmt::Debug for Vars {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}
