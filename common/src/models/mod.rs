pub mod code;
pub mod nonce;
pub mod session;

pub use code::ExchangeCode;
pub use nonce::{Nonce, NonceKey};
pub use session::{AuthSession, Tier};
