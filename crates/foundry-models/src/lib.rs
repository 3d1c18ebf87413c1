#![deny(missing_docs)]

//! # Foundry Models
//!
//! Wire types shared by the probe, the token fetcher and the mock provider.
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`chat`] | Chat-completion request (`ChatRequest`) and the leniently decoded response (`ChatCompletion`) |
//! | [`token`] | JSON report printed by the token-fetch command (`TokenReport`) |
//! | [`error`] | Validation errors for request construction |

pub mod chat;
pub mod error;
pub mod token;

// Re-export all public types at crate root for convenience.
pub use chat::*;
pub use error::*;
pub use token::*;
