use std::fmt;
use std::io::{self, Write};
use std::process::Command;
use thiserror::Error;

use crate::operator::read_answer;

pub struct Credential {
    pub username: String,
    secret: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Credential {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Failed to read credential: {0}")]
    Io(#[from] io::Error),
    #[error("No username given")]
    MissingUsername,
    #[error("Secret store entry '{entry}' not readable: {reason}")]
    Store { entry: String, reason: String },
    #[error("Secret store entry '{0}' has no 'login: ' line")]
    NoLogin(String),
}

pub trait CredentialProvider {
    fn credential(&self) -> Result<Credential, CredentialError>;
}

/// Asks on the terminal: username echoed, password masked.
#[derive(Debug, Default)]
pub struct PromptCredentials;

impl CredentialProvider for PromptCredentials {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let mut stderr = io::stderr();
        write!(stderr, "User: ")?;
        stderr.flush()?;
        let username = read_answer(&mut io::stdin().lock())?
            .filter(|u| !u.is_empty())
            .ok_or(CredentialError::MissingUsername)?;
        let secret = rpassword::prompt_password("Password: ")?;
        Ok(Credential::new(username, secret))
    }
}

/// An entry of the `pass` password store. The first line is the password;
/// the username is taken from a `login: <value>` line.
#[derive(Debug, Clone)]
pub struct PassStore {
    pub entry: String,
    pub program: String,
}

impl PassStore {
    pub fn new(entry: impl Into<String>) -> Self {
        PassStore {
            entry: entry.into(),
            program: "pass".to_string(),
        }
    }
}

impl CredentialProvider for PassStore {
    fn credential(&self) -> Result<Credential, CredentialError> {
        let output = Command::new(&self.program)
            .arg("show")
            .arg(&self.entry)
            .output()
            .map_err(|e| CredentialError::Store {
                entry: self.entry.clone(),
                reason: e.to_string(),
            })?;
        if !output.status.success() {
            return Err(CredentialError::Store {
                entry: self.entry.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        let blob = String::from_utf8_lossy(&output.stdout);
        parse_pass_entry(&self.entry, &blob)
    }
}

pub fn parse_pass_entry(entry: &str, blob: &str) -> Result<Credential, CredentialError> {
    let secret = blob.lines().next().unwrap_or_default();
    let username = blob
        .lines()
        .find_map(|line| line.split_once("login: ").map(|(_, user)| user.trim()))
        .ok_or_else(|| CredentialError::NoLogin(entry.to_string()))?;
    Ok(Credential::new(username, secret))
}

/// Secret store lookup when a profile is configured, terminal prompt
/// otherwise.
pub fn provider_for(secret_profile: Option<&str>) -> Box<dyn CredentialProvider> {
    match secret_profile {
        Some(entry) => Box::new(PassStore::new(entry)),
        None => Box::new(PromptCredentials),
    }
}
