// common/src/protocol/deeplink.rs
use std::fmt;
use url::{form_urlencoded, Url};

use crate::error::AuthError;

pub const DEFAULT_SCHEME: &str = "sneradar";

/// Callback into the desktop app through its registered URI scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepLink {
    /// `sneradar://auth?code=…&state=…`
    Auth {
        scheme: String,
        code: String,
        state: String,
    },
    /// `sneradar://auth-error?error=…&machine_id=…`
    AuthError {
        scheme: String,
        error: String,
        machine_id: String,
    },
}

impl DeepLink {
    pub fn auth(scheme: &str, code: &str, state: &str) -> Self {
        DeepLink::Auth {
            scheme: scheme.to_string(),
            code: code.to_string(),
            state: state.to_string(),
        }
    }

    pub fn auth_error(scheme: &str, error: AuthError, machine_id: &str) -> Self {
        DeepLink::AuthError {
            scheme: scheme.to_string(),
            error: error.code().to_string(),
            machine_id: machine_id.to_string(),
        }
    }

    /// Parse a callback URI as the desktop app receives it.
    pub fn parse(raw: &str) -> Option<Self> {
        let url = Url::parse(raw).ok()?;
        let scheme = url.scheme().to_string();
        let param = |name: &str| {
            url.query_pairs()
                .find(|(k, _)| k == name)
                .map(|(_, v)| v.into_owned())
        };
        match url.host_str()? {
            "auth" => Some(DeepLink::Auth {
                scheme,
                code: param("code")?,
                state: param("state")?,
            }),
            "auth-error" => Some(DeepLink::AuthError {
                scheme,
                error: param("error")?,
                machine_id: param("machine_id").unwrap_or_default(),
            }),
            _ => None,
        }
    }
}

impl fmt::Display for DeepLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (scheme, host, query) = match self {
            DeepLink::Auth { scheme, code, state } => (
                scheme,
                "auth",
                form_urlencoded::Serializer::new(String::new())
                    .append_pair("code", code)
                    .append_pair("state", state)
                    .finish(),
            ),
            DeepLink::AuthError {
                scheme,
                error,
                machine_id,
            } => (
                scheme,
                "auth-error",
                form_urlencoded::Serializer::new(String::new())
                    .append_pair("error", error)
                    .append_pair("machine_id", machine_id)
                    .finish(),
            ),
        };
        write!(f, "{}://{}?{}", scheme, host, query)
    }
}
