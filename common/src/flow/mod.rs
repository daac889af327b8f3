//! Client side of the sign-in page: entry parameters, the state machine the
//! UI renders, and the driver that walks it.
pub mod driver;
pub mod entry;
pub mod state;

pub use driver::{AuthBackend, FlowDriver, FlowOutcome, WalletConnector};
pub use entry::EntryParams;
pub use state::{AuthFlow, FlowResult, FlowState, InvalidTransition};
