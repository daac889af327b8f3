// common/src/protocol/challenge.rs
//! Canonical SIWE challenge text.
//!
//! The wallet signs the exact bytes produced by [`Challenge::render`] and the
//! server rebuilds them from its own records before accepting a signature, so
//! the template below is part of the wire contract. Changing a single byte
//! invalidates every outstanding challenge.

use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::config::ChallengeSettings;
use crate::protocol::address::Address;
use crate::protocol::context::{FlowContext, MachineId, SessionState};

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
pub const SIWE_VERSION: &str = "1";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChallengeError {
    #[error("challenge text is empty")]
    Empty,
    #[error("invalid challenge header")]
    InvalidHeader,
    #[error("missing challenge field: {0}")]
    MissingField(&'static str),
    #[error("invalid challenge field {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },
    #[error("unsupported challenge version: {0}")]
    UnsupportedVersion(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub domain: String,
    pub address: Address,
    pub statement: String,
    pub uri: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub machine_id: Option<MachineId>,
    pub state: Option<SessionState>,
}

impl Challenge {
    /// Assemble the challenge for a flow using the deployment's settings.
    pub fn for_context(
        settings: &ChallengeSettings,
        address: Address,
        context: &FlowContext,
        nonce: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        let statement = match context {
            FlowContext::Web => settings.web_statement.clone(),
            FlowContext::Desktop { .. } => settings.desktop_statement.clone(),
        };
        Self {
            domain: settings.domain.clone(),
            address,
            statement,
            uri: settings.uri.clone(),
            chain_id: settings.chain_id,
            nonce: nonce.into(),
            issued_at,
            expires_at,
            machine_id: context.machine_id().cloned(),
            state: context.state().cloned(),
        }
    }

    pub fn render(&self) -> String {
        let mut out = String::with_capacity(512);
        out.push_str(&self.domain);
        out.push_str(HEADER_SUFFIX);
        out.push('\n');
        out.push_str(&self.address.to_checksum());
        out.push_str("\n\n");
        out.push_str(&self.statement);
        out.push_str("\n\n");

        if self.machine_id.is_some() || self.state.is_some() {
            if let Some(machine_id) = &self.machine_id {
                out.push_str(&format!("Machine: {}\n", machine_id));
            }
            if let Some(state) = &self.state {
                out.push_str(&format!("State: {}\n", state));
            }
            out.push('\n');
        }

        out.push_str(&format!("URI: {}\n", self.uri));
        out.push_str(&format!("Version: {}\n", SIWE_VERSION));
        out.push_str(&format!("Chain ID: {}\n", self.chain_id));
        out.push_str(&format!("Nonce: {}\n", self.nonce));
        out.push_str(&format!("Issued At: {}\n", format_timestamp(&self.issued_at)));
        out.push_str(&format!("Expiration Time: {}", format_timestamp(&self.expires_at)));
        out
    }

    /// Read the fields back out of a rendered challenge.
    ///
    /// Parsing is only used to locate server-side records; acceptance always
    /// requires the presented text to equal a fresh [`Challenge::render`].
    pub fn parse(text: &str) -> Result<Self, ChallengeError> {
        let mut lines = text.lines();
        let header = lines.next().filter(|l| !l.is_empty()).ok_or(ChallengeError::Empty)?;
        let domain = header
            .strip_suffix(HEADER_SUFFIX)
            .filter(|d| !d.is_empty())
            .ok_or(ChallengeError::InvalidHeader)?
            .to_string();

        let address = lines
            .next()
            .ok_or(ChallengeError::MissingField("address"))?
            .trim()
            .parse::<Address>()
            .map_err(|_| invalid("address", "not a 20-byte hex address"))?;

        let mut statement = None;
        let mut machine_id = None;
        let mut state = None;
        let mut uri = None;
        let mut version = None;
        let mut chain_id = None;
        let mut nonce = None;
        let mut issued_at = None;
        let mut expires_at = None;

        for line in lines {
            if line.is_empty() {
                continue;
            }
            if let Some(v) = line.strip_prefix("Machine: ") {
                machine_id = Some(MachineId::new(v).map_err(|_| invalid("Machine", "too short"))?);
            } else if let Some(v) = line.strip_prefix("State: ") {
                state = Some(SessionState::new(v).map_err(|_| invalid("State", "too short"))?);
            } else if let Some(v) = line.strip_prefix("URI: ") {
                uri = Some(v.to_string());
            } else if let Some(v) = line.strip_prefix("Version: ") {
                version = Some(v.to_string());
            } else if let Some(v) = line.strip_prefix("Chain ID: ") {
                chain_id = Some(v.parse::<u64>().map_err(|_| invalid("Chain ID", "not a u64"))?);
            } else if let Some(v) = line.strip_prefix("Nonce: ") {
                nonce = Some(v.to_string());
            } else if let Some(v) = line.strip_prefix("Issued At: ") {
                issued_at = Some(parse_timestamp("Issued At", v)?);
            } else if let Some(v) = line.strip_prefix("Expiration Time: ") {
                expires_at = Some(parse_timestamp("Expiration Time", v)?);
            } else if statement.is_none() {
                statement = Some(line.to_string());
            }
        }

        let version = version.ok_or(ChallengeError::MissingField("Version"))?;
        if version != SIWE_VERSION {
            return Err(ChallengeError::UnsupportedVersion(version));
        }

        Ok(Self {
            domain,
            address,
            statement: statement.unwrap_or_default(),
            uri: uri.ok_or(ChallengeError::MissingField("URI"))?,
            chain_id: chain_id.ok_or(ChallengeError::MissingField("Chain ID"))?,
            nonce: nonce.ok_or(ChallengeError::MissingField("Nonce"))?,
            issued_at: issued_at.ok_or(ChallengeError::MissingField("Issued At"))?,
            expires_at: expires_at.ok_or(ChallengeError::MissingField("Expiration Time"))?,
            machine_id,
            state,
        })
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix, the same shape
/// `Date.prototype.toISOString` produces.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(field: &'static str, raw: &str) -> Result<DateTime<Utc>, ChallengeError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| invalid(field, &e.to_string()))
}

fn invalid(field: &'static str, reason: &str) -> ChallengeError {
    ChallengeError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn settings() -> ChallengeSettings {
        ChallengeSettings::default()
    }

    fn issued() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()
    }

    fn address() -> Address {
        "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed".parse().unwrap()
    }

    #[test]
    fn test_desktop_template() {
        let ctx = FlowContext::from_wire(Some("desktop"), Some("s1s1s1s1s1s1s1s1"), Some("machine-01"))
            .unwrap();
        let challenge = Challenge::for_context(
            &settings(),
            address(),
            &ctx,
            "n1",
            issued(),
            issued() + chrono::Duration::minutes(10),
        );

        let expected = "snelabs.space wants you to sign in with your Ethereum account:\n\
0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed\n\
\n\
Authenticate SNE Radar Desktop\n\
\n\
Machine: machine-01\n\
State: s1s1s1s1s1s1s1s1\n\
\n\
URI: https://snelabs.space/auth\n\
Version: 1\n\
Chain ID: 534352\n\
Nonce: n1\n\
Issued At: 2026-01-02T03:04:05.000Z\n\
Expiration Time: 2026-01-02T03:14:05.000Z";
        assert_eq!(challenge.render(), expected);
    }

    #[test]
    fn test_web_template_has_no_context_block() {
        let challenge = Challenge::for_context(
            &settings(),
            address(),
            &FlowContext::Web,
            "n1",
            issued(),
            issued() + chrono::Duration::minutes(10),
        );
        let text = challenge.render();
        assert!(!text.contains("Machine:"));
        assert!(!text.contains("State:"));
        assert!(text.contains("\n\nSign in to SNE Radar\n\nURI: "));
    }

    #[test]
    fn test_same_inputs_same_bytes() {
        let ctx = FlowContext::Web;
        let a = Challenge::for_context(&settings(), address(), &ctx, "abc", issued(), issued());
        let b = Challenge::for_context(&settings(), address(), &ctx, "abc", issued(), issued());
        assert_eq!(a.render(), b.render());
    }

    #[test]
    fn test_parse_recovers_fields() {
        let ctx = FlowContext::from_wire(Some("desktop"), Some("s1s1s1s1s1s1s1s1"), Some("machine-01"))
            .unwrap();
        let original = Challenge::for_context(
            &settings(),
            address(),
            &ctx,
            "n1",
            issued(),
            issued() + chrono::Duration::minutes(10),
        );
        let parsed = Challenge::parse(&original.render()).unwrap();
        assert_eq!(parsed, original);
        assert_eq!(parsed.render(), original.render());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(Challenge::parse(""), Err(ChallengeError::Empty));
        assert_eq!(Challenge::parse("hello\nworld"), Err(ChallengeError::InvalidHeader));

        let text = Challenge::for_context(&settings(), address(), &FlowContext::Web, "n", issued(), issued())
            .render()
            .replace("Version: 1", "Version: 2");
        assert_eq!(
            Challenge::parse(&text),
            Err(ChallengeError::UnsupportedVersion("2".into()))
        );
    }
}
