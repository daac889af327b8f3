// common/src/protocol/context.rs
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AuthError;

/// Minimum length of the caller-generated `state` token.
pub const MIN_STATE_LEN: usize = 16;
/// Minimum length of the desktop `machine_id`.
pub const MIN_MACHINE_ID_LEN: usize = 8;
/// The only accepted value of the `app` parameter.
pub const DESKTOP_APP: &str = "desktop";

/// Opaque anti-forgery token generated by the desktop app and echoed back in
/// the success deep link.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionState(String);

impl SessionState {
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let raw = raw.into();
        if raw.chars().count() < MIN_STATE_LEN || raw.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidState);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of the desktop installation requesting the handoff.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MachineId(String);

impl MachineId {
    pub fn new(raw: impl Into<String>) -> Result<Self, AuthError> {
        let raw = raw.into();
        if raw.chars().count() < MIN_MACHINE_ID_LEN || raw.chars().any(char::is_whitespace) {
            return Err(AuthError::InvalidState);
        }
        Ok(Self(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! string_newtype_impls {
    ($ty:ident) => {
        impl TryFrom<String> for $ty {
            type Error = AuthError;
            fn try_from(raw: String) -> Result<Self, Self::Error> {
                Self::new(raw)
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        // Only a prefix is printed; these values end up in logs.
        impl fmt::Debug for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                let prefix: String = self.0.chars().take(6).collect();
                write!(f, "{}({}…)", stringify!($ty), prefix)
            }
        }
    };
}

string_newtype_impls!(SessionState);
string_newtype_impls!(MachineId);

/// Which client the sign-in is for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "app", rename_all = "lowercase")]
pub enum FlowContext {
    /// Browser session; the result is a durable bearer token.
    Web,
    /// Handoff to the desktop app through a one-time exchange code.
    Desktop {
        state: SessionState,
        machine_id: MachineId,
    },
}

impl FlowContext {
    /// Build the context from the loosely typed wire fields shared by the
    /// query string and the JSON request bodies.
    ///
    /// A missing or empty `app` means a web flow; `state`/`machine_id` are then
    /// ignored. `app=desktop` requires both to meet their minimum lengths.
    pub fn from_wire(
        app: Option<&str>,
        state: Option<&str>,
        machine_id: Option<&str>,
    ) -> Result<Self, AuthError> {
        match app.map(str::trim) {
            None | Some("") => Ok(FlowContext::Web),
            Some(DESKTOP_APP) => {
                let state = SessionState::new(state.ok_or(AuthError::InvalidState)?)?;
                let machine_id = MachineId::new(machine_id.ok_or(AuthError::InvalidState)?)?;
                Ok(FlowContext::Desktop { state, machine_id })
            }
            Some(_) => Err(AuthError::InvalidState),
        }
    }

    pub fn is_desktop(&self) -> bool {
        matches!(self, FlowContext::Desktop { .. })
    }

    pub fn state(&self) -> Option<&SessionState> {
        match self {
            FlowContext::Web => None,
            FlowContext::Desktop { state, .. } => Some(state),
        }
    }

    pub fn machine_id(&self) -> Option<&MachineId> {
        match self {
            FlowContext::Web => None,
            FlowContext::Desktop { machine_id, .. } => Some(machine_id),
        }
    }

    /// Wire value of the `app` field.
    pub fn app(&self) -> Option<&'static str> {
        match self {
            FlowContext::Web => None,
            FlowContext::Desktop { .. } => Some(DESKTOP_APP),
        }
    }
}
