// common/src/flow/entry.rs
use url::form_urlencoded;

use crate::error::AuthError;
use crate::protocol::context::FlowContext;

/// Query parameters of the sign-in page, e.g.
/// `/auth?app=desktop&state=…&machine_id=…`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntryParams {
    pub state: Option<String>,
    pub machine_id: Option<String>,
    pub app: Option<String>,
}

impl EntryParams {
    /// Parse a raw query string, with or without the leading `?`.
    /// Repeated keys keep their first value.
    pub fn from_query(query: &str) -> Self {
        let mut params = EntryParams::default();
        for (key, value) in form_urlencoded::parse(query.trim_start_matches('?').as_bytes()) {
            let slot = match key.as_ref() {
                "state" => &mut params.state,
                "machine_id" => &mut params.machine_id,
                "app" => &mut params.app,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        params
    }

    pub fn context(&self) -> Result<FlowContext, AuthError> {
        FlowContext::from_wire(
            self.app.as_deref(),
            self.state.as_deref(),
            self.machine_id.as_deref(),
        )
    }

    /// Whether the caller asked for a desktop handoff, valid or not. Errors
    /// of such flows are reported back through the error deep link.
    pub fn wants_desktop(&self) -> bool {
        self.app.as_deref().map(str::trim).is_some_and(|app| !app.is_empty())
    }

    /// Raw `machine_id`, echoed in the error deep link even when invalid.
    pub fn machine_hint(&self) -> &str {
        self.machine_id.as_deref().unwrap_or("")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_desktop_query() {
        let params =
            EntryParams::from_query("?app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=machine%2D01&x=1");
        assert_eq!(params.app.as_deref(), Some("desktop"));
        assert_eq!(params.machine_id.as_deref(), Some("machine-01"));
        assert!(params.wants_desktop());
        assert!(params.context().unwrap().is_desktop());
    }

    #[test]
    fn test_absent_app_is_web() {
        let params = EntryParams::from_query("state=s1s1s1s1s1s1s1s1");
        assert!(!params.wants_desktop());
        assert_eq!(params.context(), Ok(FlowContext::Web));
    }

    #[test]
    fn test_short_machine_id() {
        let params = EntryParams::from_query("app=desktop&state=s1s1s1s1s1s1s1s1&machine_id=abcde");
        assert_eq!(params.context(), Err(AuthError::InvalidState));
        assert_eq!(params.machine_hint(), "abcde");
    }
}
