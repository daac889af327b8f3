pub mod address;
pub mod challenge;
pub mod context;
pub mod deeplink;
pub mod messages;
pub mod signature;

pub use address::Address;
pub use challenge::{Challenge, ChallengeError};
pub use context::{FlowContext, MachineId, SessionState};
pub use deeplink::DeepLink;
pub use signature::{recover_personal_sign, verify_personal_sign};
