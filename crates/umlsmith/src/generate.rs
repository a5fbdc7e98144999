//! Text-generation service boundary.
//!
//! The pipeline talks to the language model only through [`TextGenerator`].
//! [`OpenAiClient`] is the production implementation; tests substitute
//! scripted fakes.
//!
//! Credentials are never ambient. Every call receives an explicit
//! `Option<&Credential>`, and a missing credential is reported as
//! [`GenerationError::MissingCredential`] rather than read from process state.

use std::fmt;

use thiserror::Error;

mod openai;
pub(crate) mod prompt;

pub use openai::OpenAiClient;

/// Secret used to authenticate against the text-generation service.
///
/// `Debug` output is redacted so the value cannot leak into logs.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    /// Wraps a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret for use in a request header.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

/// A system/user message pair sent as one generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    system: String,
    user: String,
}

impl Prompt {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Returns the instructions framing the task.
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Returns the task payload.
    pub fn user(&self) -> &str {
        &self.user
    }
}

/// Failure of a text-generation call.
///
/// Every variant is an environment failure from the pipeline's point of
/// view: retrying with the same inputs cannot fix it.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("no credential was supplied for the text-generation service")]
    MissingCredential,

    #[error("text-generation service unavailable: {0}")]
    Unavailable(String),

    #[error("text-generation service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("text-generation service returned an empty response")]
    EmptyResponse,
}

/// A blocking text-generation service.
pub trait TextGenerator {
    /// Sends one prompt and returns the raw response text.
    ///
    /// # Errors
    ///
    /// Returns a [`GenerationError`] when the credential is missing or the
    /// service cannot produce a response.
    fn complete(
        &self,
        credential: Option<&Credential>,
        prompt: &Prompt,
    ) -> Result<String, GenerationError>;
}

impl<T: TextGenerator + ?Sized> TextGenerator for &T {
    fn complete(
        &self,
        credential: Option<&Credential>,
        prompt: &Prompt,
    ) -> Result<String, GenerationError> {
        (**self).complete(credential, prompt)
    }
}

impl<T: TextGenerator + ?Sized> TextGenerator for Box<T> {
    fn complete(
        &self,
        credential: Option<&Credential>,
        prompt: &Prompt,
    ) -> Result<String, GenerationError> {
        (**self).complete(credential, prompt)
    }
}
