use scraper::{ElementRef, Html, Selector};
use std::fmt;
use std::sync::OnceLock;
use url::Url;

use crate::error::TransportError;
use crate::session::{HttpRequest, Method, Page};

/// How an adapter designates a form on the current page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormSelector {
    /// Zero-based position among the page's forms.
    Index(usize),
    Name(&'static str),
    Id(&'static str),
}

impl fmt::Display for FormSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormSelector::Index(i) => write!(f, "form #{i}"),
            FormSelector::Name(n) => write!(f, "form name={n}"),
            FormSelector::Id(id) => write!(f, "form id={id}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    /// Absolute action URL.
    pub action: String,
    pub method: Method,
    /// Successful controls in document order. Read-only fields are included
    /// and writable like any other.
    pub fields: Vec<(String, String)>,
}

impl Form {
    pub fn find(page: &Page, selector: FormSelector) -> Option<Form> {
        let html = page.text();
        let doc = Html::parse_document(&html);
        let mut forms = doc.select(form_selector());
        let element = match selector {
            FormSelector::Index(i) => forms.nth(i),
            FormSelector::Name(name) => forms.find(|f| f.value().attr("name") == Some(name)),
            FormSelector::Id(id) => forms.find(|f| f.value().attr("id") == Some(id)),
        }?;

        let action = element.value().attr("action").unwrap_or("").trim();
        let action = if action.is_empty() {
            page.url.clone()
        } else {
            Url::parse(&page.url).ok()?.join(action).ok()?.to_string()
        };
        let method = match element.value().attr("method") {
            Some(m) if m.eq_ignore_ascii_case("post") => Method::Post,
            _ => Method::Get,
        };

        Some(Form {
            action,
            method,
            fields: successful_controls(element),
        })
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Overwrite a control's value, adding the control if the form lacks it.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some(field) => field.1 = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    pub fn into_request(self) -> Result<HttpRequest, TransportError> {
        match self.method {
            Method::Post => Ok(HttpRequest {
                form: self.fields,
                ..HttpRequest::post(self.action)
            }),
            Method::Get => {
                let mut url = Url::parse(&self.action).map_err(|source| TransportError::InvalidUrl {
                    url: self.action.clone(),
                    source,
                })?;
                url.set_query(None);
                if !self.fields.is_empty() {
                    url.query_pairs_mut().extend_pairs(&self.fields);
                }
                Ok(HttpRequest::get(url.to_string()))
            }
        }
    }
}

fn form_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("form").expect("invalid form selector"))
}

fn control_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| {
        Selector::parse("input, select, textarea, button").expect("invalid control selector")
    })
}

fn option_selector() -> &'static Selector {
    static SEL: OnceLock<Selector> = OnceLock::new();
    SEL.get_or_init(|| Selector::parse("option").expect("invalid option selector"))
}

/// Controls a browser would send when the form is submitted through its
/// first submit button.
fn successful_controls(form: ElementRef<'_>) -> Vec<(String, String)> {
    let mut fields = Vec::new();
    let mut clicked = false;

    for control in form.select(control_selector()) {
        let el = control.value();
        let Some(name) = el.attr("name").filter(|n| !n.is_empty()) else {
            continue;
        };
        if el.attr("disabled").is_some() {
            continue;
        }
        let value = el.attr("value").unwrap_or("");

        match el.name() {
            "input" => {
                let kind = el.attr("type").unwrap_or("text").to_ascii_lowercase();
                match kind.as_str() {
                    "checkbox" | "radio" => {
                        if el.attr("checked").is_some() {
                            let value = if value.is_empty() { "on" } else { value };
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "submit" | "image" => {
                        if !clicked {
                            clicked = true;
                            fields.push((name.to_string(), value.to_string()));
                        }
                    }
                    "reset" | "button" | "file" => {}
                    _ => fields.push((name.to_string(), value.to_string())),
                }
            }
            "button" => {
                let kind = el.attr("type").unwrap_or("submit");
                if kind.eq_ignore_ascii_case("submit") && !clicked {
                    clicked = true;
                    fields.push((name.to_string(), value.to_string()));
                }
            }
            "select" => {
                let options: Vec<_> = control.select(option_selector()).collect();
                let chosen = options
                    .iter()
                    .find(|o| o.value().attr("selected").is_some())
                    .or_else(|| options.first());
                if let Some(option) = chosen {
                    let value = option
                        .value()
                        .attr("value")
                        .map(str::to_string)
                        .unwrap_or_else(|| option.text().collect::<String>().trim().to_string());
                    fields.push((name.to_string(), value));
                }
            }
            "textarea" => fields.push((name.to_string(), control.text().collect())),
            _ => {}
        }
    }
    fields
}
