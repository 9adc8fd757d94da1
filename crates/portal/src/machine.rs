use chrono::Utc;
use std::io::Write;
use std::path::Path;
use std::time::{Duration, Instant};

use conto_core::DateRange;

use crate::adapter::{vars, ChallengeKind, PortalAdapter, RequestSpec, Step, Vars};
use crate::credentials::Credential;
use crate::error::AuthError;
use crate::forms::Form;
use crate::operator::Operator;
use crate::session::{HttpRequest, Page, Session};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Unauthenticated,
    LoginSubmitted,
    ChallengeIssued,
    Polling { attempt: u32 },
    FallbackRequired,
    Confirmed,
    Downloaded,
    Denied,
    Terminal,
}

/// The pending step-up request. Exactly one exists per retrieval.
#[derive(Debug, Clone)]
pub struct AuthChallenge {
    pub kind: ChallengeKind,
    /// Empty when the portal tracks the challenge through the session alone.
    pub correlation_token: String,
    /// When polling gives up.
    pub deadline: Instant,
}

/// Drives one portal through the strong-authentication handshake.
///
/// ```text
/// Unauthenticated -> LoginSubmitted -> ChallengeIssued -> Polling{1..n}
///   -> Confirmed | FallbackRequired -> Confirmed | Denied
/// Confirmed -> Downloaded
/// Downloaded | Denied -> (logout) -> Terminal
/// ```
///
/// Any error, transport failures included, ends in `Denied`. Logout is sent
/// whenever the portal answered at least once.
pub struct Retriever<'a, S: Session, O: Operator> {
    adapter: &'a PortalAdapter,
    session: S,
    operator: O,
    poll_interval: Duration,
    vars: Vars,
    page: Option<Page>,
    history: Vec<AuthState>,
    opened: bool,
}

impl<'a, S: Session, O: Operator> Retriever<'a, S, O> {
    pub fn new(adapter: &'a PortalAdapter, session: S, operator: O) -> Self {
        Retriever {
            adapter,
            session,
            operator,
            poll_interval: adapter.polling.interval,
            vars: Vars::default(),
            page: None,
            history: vec![AuthState::Unauthenticated],
            opened: false,
        }
    }

    /// Override the adapter's wait between status checks.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn state(&self) -> AuthState {
        self.history
            .last()
            .copied()
            .unwrap_or(AuthState::Unauthenticated)
    }

    /// Log in, satisfy the challenge, and save the export for `range` at
    /// `destination`. The file is replaced atomically and only on success.
    pub fn retrieve(
        &mut self,
        credential: &Credential,
        range: DateRange,
        destination: &Path,
    ) -> Result<(), AuthError> {
        let format = self.adapter.date_format;
        self.vars.set(vars::USERNAME, credential.username.as_str());
        self.vars.set(vars::PASSWORD, credential.secret());
        self.vars.set(vars::START, range.start.format(format).to_string());
        self.vars.set(vars::END, range.end.format(format).to_string());

        let outcome = self.run(destination);
        match &outcome {
            Ok(()) => self.transition(AuthState::Downloaded),
            Err(e) => {
                tracing::warn!("{} retrieval failed: {e}", self.adapter.name);
                self.transition(AuthState::Denied);
            }
        }

        if self.opened {
            let adapter = self.adapter;
            if let Err(e) = self.send(&adapter.logout) {
                tracing::warn!("{} logout failed: {e}", adapter.name);
            }
        }
        self.transition(AuthState::Terminal);
        outcome
    }

    fn run(&mut self, destination: &Path) -> Result<(), AuthError> {
        self.login()?;
        let challenge = self.issue_challenge()?;
        if !self.poll(&challenge)? {
            self.transition(AuthState::FallbackRequired);
            self.fallback(&challenge)?;
        }
        self.transition(AuthState::Confirmed);
        self.download(destination)
    }

    fn login(&mut self) -> Result<(), AuthError> {
        let adapter = self.adapter;
        self.run_steps(&adapter.login.steps)?;
        if !adapter.login.accepted.matches(&self.current_page()?.text()) {
            return Err(AuthError::CredentialRejected);
        }
        self.transition(AuthState::LoginSubmitted);
        Ok(())
    }

    fn issue_challenge(&mut self) -> Result<AuthChallenge, AuthError> {
        let adapter = self.adapter;
        self.run_steps(&adapter.challenge.steps)?;
        let challenge = AuthChallenge {
            kind: ChallengeKind::AppPush,
            correlation_token: self.vars.get(vars::TOKEN).unwrap_or_default().to_string(),
            deadline: Instant::now() + self.poll_interval * adapter.polling.max_attempts,
        };
        self.transition(AuthState::ChallengeIssued);
        Ok(challenge)
    }

    /// Sleep, then check, up to the attempt budget. `true` once confirmed.
    fn poll(&mut self, challenge: &AuthChallenge) -> Result<bool, AuthError> {
        let adapter = self.adapter;
        let polling = &adapter.polling;
        for attempt in 1..=polling.max_attempts {
            self.transition(AuthState::Polling { attempt });
            if !self.poll_interval.is_zero() {
                std::thread::sleep(self.poll_interval);
            }
            let page = self.send(&polling.status)?;
            if polling.confirmed.matches(&page.text()) {
                tracing::info!("{} confirmed in app after {attempt} checks", adapter.name);
                self.run_steps(&polling.on_confirmed)?;
                return Ok(true);
            }
        }
        tracing::warn!(
            "{} not confirmed before {:?}",
            adapter.name,
            challenge.deadline
        );
        Ok(false)
    }

    fn fallback(&mut self, challenge: &AuthChallenge) -> Result<(), AuthError> {
        let adapter = self.adapter;
        let attempts = adapter.polling.max_attempts;
        let Some(fallback) = &adapter.fallback else {
            return Err(AuthError::Timeout { attempts });
        };
        let challenge = AuthChallenge {
            kind: fallback.kind,
            ..challenge.clone()
        };
        tracing::info!("{} manual challenge: {:?}", adapter.name, challenge.kind);
        self.operator.notify(fallback.notice);

        for stage in &fallback.stages {
            let answer = self
                .operator
                .ask(&stage.prompt)
                .map_err(AuthError::Prompt)?
                .filter(|a| !a.is_empty())
                .ok_or(AuthError::Timeout { attempts })?;
            self.vars.set(stage.prompt.var, answer);
            self.run_steps(&stage.steps)?;
            if !stage.success.matches(&self.current_page()?.text()) {
                return Err(AuthError::ChallengeDenied {
                    stage: stage.name.to_string(),
                });
            }
        }
        Ok(())
    }

    fn download(&mut self, destination: &Path) -> Result<(), AuthError> {
        let adapter = self.adapter;
        self.run_steps(&adapter.confirm)?;
        self.run_steps(&adapter.export.prepare)?;
        let export = self.send(&adapter.export.download)?;
        write_atomically(destination, &export.body).map_err(AuthError::Export)?;
        tracing::info!(
            "{} export saved: {} ({} bytes)",
            adapter.name,
            destination.display(),
            export.body.len()
        );
        Ok(())
    }

    fn run_steps(&mut self, steps: &[Step]) -> Result<(), AuthError> {
        for step in steps {
            match step {
                Step::Send(spec) => {
                    let page = self.send(spec)?;
                    self.page = Some(page);
                }
                Step::Capture { request, var } => {
                    let page = self.send(request)?;
                    self.vars.set(*var, page.text().trim());
                    self.page = Some(page);
                }
                Step::Submit { form, fields } => {
                    let page = self.current_page()?;
                    let mut found = Form::find(page, *form).ok_or_else(|| {
                        AuthError::UnexpectedPage(format!("no {form} on {}", page.url))
                    })?;
                    for (name, value) in fields {
                        found.set(name, self.vars.render(value));
                    }
                    let page = self.exchange(found.into_request()?)?;
                    self.page = Some(page);
                }
                Step::ReadField { form, field, var } => {
                    let page = self.current_page()?;
                    let value = Form::find(page, *form)
                        .and_then(|f| f.get(field).map(str::to_string))
                        .ok_or_else(|| {
                            AuthError::UnexpectedPage(format!(
                                "no field {field} in {form} on {}",
                                page.url
                            ))
                        })?;
                    self.vars.set(*var, value);
                }
            }
        }
        Ok(())
    }

    fn send(&mut self, spec: &RequestSpec) -> Result<Page, AuthError> {
        self.vars.set(vars::NOW_MS, Utc::now().timestamp_millis().to_string());
        let request = self.adapter.render(spec, &self.vars)?;
        self.exchange(request)
    }

    fn exchange(&mut self, request: HttpRequest) -> Result<Page, AuthError> {
        tracing::debug!("{:?} {}", request.method, request.url);
        let page = self.session.send(request)?;
        self.opened = true;
        Ok(page)
    }

    fn current_page(&self) -> Result<&Page, AuthError> {
        self.page
            .as_ref()
            .ok_or_else(|| AuthError::UnexpectedPage("no page loaded".to_string()))
    }

    fn transition(&mut self, to: AuthState) {
        tracing::info!("{}: {:?} -> {:?}", self.adapter.name, self.state(), to);
        self.history.push(to);
    }
}

/// Write through a temporary file in the destination directory, then rename
/// over `destination`.
fn write_atomically(destination: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let dir = match destination.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(bytes)?;
    file.as_file().sync_all()?;
    file.persist(destination).map_err(|e| e.error)?;
    Ok(())
}
