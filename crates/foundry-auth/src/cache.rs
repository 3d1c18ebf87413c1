//! File-backed token cache.
//!
//! One JSON document holds, per `(client_id, authority, account)`, the
//! account's refresh token and any access tokens issued for it. The cache is
//! read once when the client is built and rewritten after every successful
//! acquisition. A missing, unreadable or corrupt file behaves like an empty
//! cache; a failed write is logged and otherwise ignored.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::claims::Account;
use crate::config::{AuthConfig, RESERVED_SCOPES};
use crate::token::AccessToken;

const APP_DIR: &str = "foundry-probe";
const CACHE_FILE: &str = "token_cache.json";

#[derive(Serialize, Deserialize, Debug, Default)]
struct CacheContents {
    #[serde(default)]
    entries: Vec<CacheEntry>,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CacheEntry {
    client_id: String,
    authority: String,
    account: Account,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    access_tokens: Vec<CachedAccessToken>,
}

impl CacheEntry {
    fn matches(&self, config: &AuthConfig, account: &Account) -> bool {
        self.is_for(config) && self.account.home_account_id == account.home_account_id
    }

    fn is_for(&self, config: &AuthConfig) -> bool {
        self.client_id == config.client_id && self.authority.eq_ignore_ascii_case(&config.authority)
    }
}

#[derive(Serialize, Deserialize, Debug, Clone)]
struct CachedAccessToken {
    scopes: Vec<String>,
    secret: String,
    expires_on: DateTime<Utc>,
}

/// Accounts and tokens remembered between runs.
#[derive(Debug, Default)]
pub struct TokenCache {
    path: Option<PathBuf>,
    contents: CacheContents,
}

impl TokenCache {
    /// A cache that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the cache stored at `path`.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let contents = match fs::read_to_string(&path) {
            Ok(text) => match serde_json::from_str::<CacheContents>(&text) {
                Ok(contents) => {
                    debug!(
                        path = %path.display(),
                        entries = contents.entries.len(),
                        "token cache loaded"
                    );
                    contents
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "ignoring corrupt token cache");
                    CacheContents::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CacheContents::default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read token cache");
                CacheContents::default()
            }
        };
        Self {
            path: Some(path),
            contents,
        }
    }

    /// `{cache_dir}/foundry-probe/token_cache.json`, when the platform has a
    /// cache directory.
    pub fn default_path() -> Option<PathBuf> {
        Some(dirs::cache_dir()?.join(APP_DIR).join(CACHE_FILE))
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Accounts known for this client and authority, oldest sign-in first.
    pub fn accounts(&self, config: &AuthConfig) -> Vec<Account> {
        self.contents
            .entries
            .iter()
            .filter(|e| e.is_for(config))
            .map(|e| e.account.clone())
            .collect()
    }

    /// A cached access token covering `scopes` that is still fresh at `now`.
    pub fn access_token(
        &self,
        config: &AuthConfig,
        account: &Account,
        scopes: &[String],
        now: DateTime<Utc>,
    ) -> Option<AccessToken> {
        let wanted = normalize_scopes(scopes);
        self.entry(config, account)?
            .access_tokens
            .iter()
            .filter(|t| wanted.iter().all(|s| t.scopes.contains(s)))
            .map(|t| AccessToken {
                secret: t.secret.clone(),
                expires_on: t.expires_on,
            })
            .find(|t| t.is_fresh(now))
    }

    /// The refresh token remembered for `account`.
    pub fn refresh_token(&self, config: &AuthConfig, account: &Account) -> Option<String> {
        self.entry(config, account)?.refresh_token.clone()
    }

    /// Remember a newly issued token and persist the cache.
    ///
    /// A `None` refresh token keeps the previously stored one.
    pub fn store(
        &mut self,
        config: &AuthConfig,
        account: &Account,
        scopes: &[String],
        token: &AccessToken,
        refresh_token: Option<String>,
    ) {
        let scopes = normalize_scopes(scopes);
        let now = Utc::now();

        let index = match self
            .contents
            .entries
            .iter()
            .position(|e| e.matches(config, account))
        {
            Some(i) => i,
            None => {
                self.contents.entries.push(CacheEntry {
                    client_id: config.client_id.clone(),
                    authority: config.authority.clone(),
                    account: account.clone(),
                    refresh_token: None,
                    access_tokens: Vec::new(),
                });
                self.contents.entries.len() - 1
            }
        };

        let entry = &mut self.contents.entries[index];
        entry.account = account.clone();
        if refresh_token.is_some() {
            entry.refresh_token = refresh_token;
        }
        entry
            .access_tokens
            .retain(|t| t.scopes != scopes && t.expires_on > now);
        entry.access_tokens.push(CachedAccessToken {
            scopes,
            secret: token.secret.clone(),
            expires_on: token.expires_on,
        });

        self.persist();
    }

    fn entry(&self, config: &AuthConfig, account: &Account) -> Option<&CacheEntry> {
        self.contents
            .entries
            .iter()
            .find(|e| e.matches(config, account))
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };

        if let Some(dir) = path.parent() {
            if let Err(e) = fs::create_dir_all(dir) {
                warn!(path = %dir.display(), error = %e, "could not create token cache directory");
                return;
            }
        }

        let json = match serde_json::to_string_pretty(&self.contents) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "could not serialize token cache");
                return;
            }
        };

        if let Err(e) = write_private(path, json.as_bytes()) {
            warn!(path = %path.display(), error = %e, "could not write token cache");
            return;
        }
        debug!(path = %path.display(), "token cache saved");
    }
}

/// Replace `path` with `contents` through a sibling temp file, so readers
/// never see a partial cache. Refresh tokens are long-lived credentials: on
/// unix the file is created owner-only before anything is written to it.
fn write_private(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp = path.with_file_name(tmp_name);

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }

    let written = options.open(&tmp).and_then(|mut file| {
        // A leftover temp file keeps the mode it was created with.
        restrict_permissions(&file)?;
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&tmp, path)) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

#[cfg(unix)]
fn restrict_permissions(file: &File) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_file: &File) -> io::Result<()> {
    Ok(())
}

/// Lowercased, sorted, deduplicated scopes without the reserved OIDC ones.
fn normalize_scopes(scopes: &[String]) -> Vec<String> {
    let mut out: Vec<String> = scopes
        .iter()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty() && !RESERVED_SCOPES.contains(&s.as_str()))
        .collect();
    out.sort();
    out.dedup();
    out
}
