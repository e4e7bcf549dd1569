//! Inbound SMS assembly from the modem daemon's hook environment.
//!
//! gammu-smsd runs its `RunOnReceive` program with the message in
//! environment variables: `SMS_MESSAGES` (number of parts), `SMS_1_NUMBER`
//! and `SMS_<i>_TEXT` for each part.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Longest text forwarded, in characters. Telegram's message limit.
pub const MAX_TEXT_CHARS: usize = 4096;

/// Substituted when a message has no text at all.
pub const EMPTY_PLACEHOLDER: &str = "(empty)";

static NEWLINE_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\n+").ok());
static SPACE_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r" {2,}").ok());

/// An assembled inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundSms {
    /// Sender address.
    pub number: String,
    /// Normalized body.
    pub text: String,
}

/// Malformed hook environment.
#[derive(Debug, Error)]
pub enum SmsError {
    /// `SMS_MESSAGES` is not an integer.
    #[error("invalid SMS_MESSAGES value {value:?}: {source}")]
    InvalidParts {
        /// Raw value.
        value: String,
        /// Parse failure.
        #[source]
        source: std::num::ParseIntError,
    },
}

/// Number of parts announced by `SMS_MESSAGES`, defaulting to 1.
/// Negative counts mean no parts.
///
/// # Errors
///
/// [`SmsError::InvalidParts`] when the value is not an integer.
pub fn parts_from_env(env: impl Fn(&str) -> Option<String>) -> Result<u32, SmsError> {
    match env("SMS_MESSAGES") {
        None => Ok(1),
        Some(value) => {
            let parsed = value.trim().parse::<i64>();
            match parsed {
                Ok(n) if n < 0 => Ok(0),
                Ok(n) => Ok(u32::try_from(n).unwrap_or(u32::MAX)),
                Err(source) => Err(SmsError::InvalidParts { value, source }),
            }
        }
    }
}

/// Assemble a multipart message.
///
/// Parts are right-trimmed and joined with newlines; missing parts are
/// skipped. Single line breaks become spaces (paragraph breaks survive as
/// a newline followed by a space), space runs collapse, and the result is
/// capped at [`MAX_TEXT_CHARS`].
pub fn parse_sms(parts: u32, env: impl Fn(&str) -> Option<String>) -> InboundSms {
    let number = env("SMS_1_NUMBER")
        .map(|n| n.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let collected: Vec<String> = (1..=parts)
        .filter_map(|i| env(&format!("SMS_{i}_TEXT")))
        .map(|part| part.trim_end().to_string())
        .collect();

    let joined = if collected.is_empty() {
        EMPTY_PLACEHOLDER.to_string()
    } else {
        collected.join("\n")
    };

    let mut text = normalize(joined.trim_start());
    if text.is_empty() {
        text = EMPTY_PLACEHOLDER.to_string();
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        text = text.chars().take(MAX_TEXT_CHARS).collect();
    }

    InboundSms { number, text }
}

/// [`parse_sms`] with the part count taken from the same environment.
///
/// # Errors
///
/// Propagates [`parts_from_env`] failures.
pub fn read_inbound(env: impl Fn(&str) -> Option<String>) -> Result<InboundSms, SmsError> {
    let parts = parts_from_env(&env)?;
    Ok(parse_sms(parts, env))
}

fn normalize(text: &str) -> String {
    let mut out = text.to_string();
    if let Some(re) = NEWLINE_RUN.as_ref() {
        // A run of n newlines keeps n-1 of them; the last becomes a space.
        out = re
            .replace_all(&out, |caps: &regex::Captures<'_>| {
                let run = &caps[0];
                format!("{} ", &run[1..])
            })
            .into_owned();
    }
    if let Some(re) = SPACE_RUN.as_ref() {
        out = re.replace_all(&out, " ").into_owned();
    }
    out
}
