//! The silent-then-interactive acquisition sequence.
//!
//! [`acquire_token`] is written against the [`IdentityClient`] trait so the
//! sequence can be exercised without a browser;
//! [`PublicClientApp`](crate::PublicClientApp) is the production
//! implementation.

use std::future::Future;

use tracing::info;

use crate::claims::Account;
use crate::error::AcquireError;
use crate::token::AccessToken;

/// The three primitives the acquisition sequence is built from.
pub trait IdentityClient {
    /// Accounts remembered for this client, oldest sign-in first.
    fn accounts(&self) -> Vec<Account>;

    /// Obtain a token for `account` without user interaction.
    ///
    /// `Ok(None)` means the cached credential could not be used (absent,
    /// expired, revoked or not covering `scopes`); `Err` is reserved for
    /// failures that should end the whole acquisition, such as the provider
    /// being unreachable.
    fn acquire_token_silent(
        &self,
        scopes: &[String],
        account: &Account,
    ) -> impl Future<Output = Result<Option<AccessToken>, AcquireError>> + Send;

    /// Obtain a token through a user-facing sign-in. Blocks until the user
    /// completes or abandons it.
    fn acquire_token_interactive(
        &self,
        scopes: &[String],
    ) -> impl Future<Output = Result<AccessToken, AcquireError>> + Send;
}

/// Whether [`acquire_token`] may fall back to the interactive flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interaction {
    /// Prompt the user when silent acquisition yields nothing.
    #[default]
    Allowed,
    /// Fail with the silent failure instead of prompting.
    Never,
}

/// Acquire a bearer token for `scopes`.
///
/// 1. Look up cached accounts.
/// 2. With at least one, try silent acquisition against the first.
/// 3. If that produced nothing, run the interactive flow (unless
///    [`Interaction::Never`], in which case the silent failure is returned).
///
/// Nothing is retried.
pub async fn acquire_token<C: IdentityClient>(
    client: &C,
    scopes: &[String],
    interaction: Interaction,
) -> Result<AccessToken, AcquireError> {
    let accounts = client.accounts();

    let silent_failure = match accounts.first() {
        Some(account) => {
            info!(account = %account.username, "found cached account, trying silent authentication");
            match client.acquire_token_silent(scopes, account).await? {
                Some(token) => {
                    info!(account = %account.username, "silent authentication succeeded");
                    return Ok(token);
                }
                None => AcquireError::SilentAuthDenied(format!(
                    "the cached credential for {} does not cover the requested scopes or has expired",
                    account.username
                )),
            }
        }
        None => AcquireError::NoCachedAccount,
    };

    if interaction == Interaction::Never {
        return Err(silent_failure);
    }

    info!(reason = %silent_failure, "starting interactive authentication");
    client.acquire_token_interactive(scopes).await
}
