use regex::Regex;
use std::fmt;

/// Decides from a raw response body whether a portal step succeeded. Portals
/// expose no structured status, so the body text is all there is.
pub trait ResponsePredicate: fmt::Debug + Send + Sync {
    fn matches(&self, body: &str) -> bool;
}

/// Body contains a marker fragment.
#[derive(Debug, Clone, Copy)]
pub struct Contains(pub &'static str);

impl ResponsePredicate for Contains {
    fn matches(&self, body: &str) -> bool {
        body.contains(self.0)
    }
}

/// Body does not contain a failure marker.
#[derive(Debug, Clone, Copy)]
pub struct Lacks(pub &'static str);

impl ResponsePredicate for Lacks {
    fn matches(&self, body: &str) -> bool {
        !body.contains(self.0)
    }
}

#[derive(Debug, Clone)]
pub struct Matches(pub Regex);

impl ResponsePredicate for Matches {
    fn matches(&self, body: &str) -> bool {
        self.0.is_match(body)
    }
}
