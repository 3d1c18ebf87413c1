//! # Foundry Auth
//!
//! Delegated-user bearer tokens for an OAuth2 / OpenID-Connect public client.
//!
//! [`acquire_token`] tries the token cache first (silent) and only falls back
//! to a browser sign-in (interactive) when no cached credential can be used.
//! Every outcome that is not a token is one of the five [`AcquireError`]
//! variants.
//!
//! ## Module layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`acquire`] | The silent-then-interactive sequence and the [`IdentityClient`] seam |
//! | [`client`] | [`PublicClientApp`], the provider-backed client |
//! | [`cache`] | File-backed [`TokenCache`] |
//! | [`config`] | Client id and authority ([`AuthConfig`]) |
//! | [`oidc`] | Token-endpoint grants |
//! | [`loopback`] | Local redirect listener for the interactive flow |
//! | [`pkce`] | PKCE verifier/challenge and `state` generation |
//! | [`claims`] | [`Account`] derived from an id_token |
//! | [`token`] | [`AccessToken`] |
//! | [`error`] | [`AcquireError`] |

pub mod acquire;
pub mod cache;
pub mod claims;
pub mod client;
pub mod config;
pub mod error;
pub mod loopback;
pub mod oidc;
pub mod pkce;
pub mod token;

pub use acquire::{IdentityClient, Interaction, acquire_token};
pub use cache::TokenCache;
pub use claims::Account;
pub use client::{BrowserLauncher, PublicClientApp};
pub use config::{AuthConfig, authority_for_tenant};
pub use error::AcquireError;
pub use token::AccessToken;
