//! Settings file loading.
//!
//! The settings live in a flat `KEY=value` file (default
//! `confidential.env`) parsed with `dotenvy` without touching the process
//! environment:
//!
//! | Key                | Needed by        | Description                                   |
//! |--------------------|------------------|-----------------------------------------------|
//! | `CLIENT_ID`        | `probe`, `token` | Application (client) id                       |
//! | `TENANT_ID`        | `probe`, `token` | Tenant id or domain (unless `AUTHORITY` set)  |
//! | `AUTHORITY`        | optional         | Full authority URL, overrides `TENANT_ID`     |
//! | `API_BASE`         | `probe`          | Chat API base URL                             |
//! | `API_VERSION`      | `probe`          | `api-version` query parameter                 |
//! | `DEFAULT_MODEL`    | `probe`          | Deployment used when `--model` is not given   |
//! | `OAUTH_SCOPE`      | `probe`          | Scope(s) for the bearer, space separated      |
//! | `TOKEN_CACHE_PATH` | optional         | Token cache file location                     |

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use foundry_auth::{AuthConfig, TokenCache};
use foundry_sdk::ApiConfig;
use tracing::{debug, warn};

/// Settings file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "confidential.env";

/// Why the settings could not be used. Always fatal.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The settings file does not exist.
    #[error(
        "configuration file {} not found. Copy confidential.sample.env to {} and fill in your values.",
        path.display(),
        path.display()
    )]
    Missing {
        /// Path that was looked up.
        path: PathBuf,
    },

    /// The settings file exists but could not be read or parsed.
    #[error("could not read configuration file {}: {source}", path.display())]
    Read {
        /// Path of the settings file.
        path: PathBuf,
        /// Underlying failure.
        #[source]
        source: dotenvy::Error,
    },

    /// A required key is absent or empty.
    #[error(
        "required setting {key} is missing or empty in {}. See confidential.sample.env for the expected keys.",
        path.display()
    )]
    MissingKey {
        /// The missing key.
        key: &'static str,
        /// Path of the settings file.
        path: PathBuf,
    },

    /// A key is present but unusable.
    #[error("setting {key} is invalid: {reason}")]
    Invalid {
        /// The offending key.
        key: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

/// Raw key/value pairs from the settings file.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    path: PathBuf,
    values: HashMap<String, String>,
}

impl Settings {
    /// Parse the settings file at `path`.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let iter = dotenvy::from_path_iter(path).map_err(|source| {
            if source.not_found() {
                SettingsError::Missing {
                    path: path.to_path_buf(),
                }
            } else {
                SettingsError::Read {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let mut values = HashMap::new();
        for item in iter {
            let (key, value) = item.map_err(|source| SettingsError::Read {
                path: path.to_path_buf(),
                source,
            })?;
            values.insert(key, value);
        }

        debug!(path = %path.display(), keys = values.len(), "settings loaded");
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    /// Settings built from in-memory pairs.
    #[cfg(test)]
    pub fn from_pairs<I, K, V>(path: impl Into<PathBuf>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            path: path.into(),
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Identity-provider settings (`CLIENT_ID` and `AUTHORITY` or
    /// `TENANT_ID`).
    pub fn auth_config(&self) -> Result<AuthConfig, SettingsError> {
        let client_id = self.require("CLIENT_ID")?;

        if let Some(authority) = self.get("AUTHORITY") {
            if !(authority.starts_with("https://") || authority.starts_with("http://")) {
                return Err(SettingsError::Invalid {
                    key: "AUTHORITY",
                    reason: format!("{authority:?} is not an http(s) URL"),
                });
            }
            return Ok(AuthConfig::new(client_id, authority));
        }

        let tenant_id = self.require("TENANT_ID")?;
        Ok(AuthConfig::for_tenant(client_id, tenant_id))
    }

    /// Chat API settings. `OAUTH_SCOPE` may list several scopes separated by
    /// whitespace.
    pub fn api_config(&self) -> Result<ApiConfig, SettingsError> {
        let scopes: Vec<String> = self
            .require("OAUTH_SCOPE")?
            .split_whitespace()
            .map(str::to_string)
            .collect();

        let config = ApiConfig::new(
            self.require("API_BASE")?,
            self.require("API_VERSION")?,
            self.require("DEFAULT_MODEL")?,
            scopes,
        );
        config
            .chat_completions_url()
            .map_err(|e| SettingsError::Invalid {
                key: "API_BASE",
                reason: e.to_string(),
            })?;
        Ok(config)
    }

    /// The token cache at `TOKEN_CACHE_PATH`, or the per-user default.
    pub fn token_cache(&self) -> TokenCache {
        match self
            .get("TOKEN_CACHE_PATH")
            .map(PathBuf::from)
            .or_else(TokenCache::default_path)
        {
            Some(path) => TokenCache::load(path),
            None => {
                warn!("no cache directory available, tokens will not persist");
                TokenCache::in_memory()
            }
        }
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    fn require(&self, key: &'static str) -> Result<&str, SettingsError> {
        self.get(key).ok_or_else(|| SettingsError::MissingKey {
            key,
            path: self.path.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const COMPLETE: [(&str, &str); 6] = [
        ("CLIENT_ID", "client-1"),
        ("TENANT_ID", "contoso.onmicrosoft.com"),
        ("API_BASE", "https://apim.example.com/models"),
        ("API_VERSION", "2024-05-01-preview"),
        ("DEFAULT_MODEL", "gpt-4o"),
        ("OAUTH_SCOPE", "api://app/access_api"),
    ];

    fn without(key: &str) -> Settings {
        Settings::from_pairs(
            "confidential.env",
            COMPLETE.iter().copied().filter(|(k, _)| *k != key),
        )
    }

    #[test]
    fn loads_file_without_touching_environment() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("confidential.env");
        std::fs::write(
            &path,
            "# comment\nCLIENT_ID=client-1\nTENANT_ID=\"contoso.onmicrosoft.com\"\nFOUNDRY_PROBE_TEST_ONLY=1\n",
        )
        .unwrap();

        let settings = Settings::load(&path).unwrap();
        let auth = settings.auth_config().unwrap();
        assert_eq!(auth.client_id, "client-1");
        assert_eq!(
            auth.authority,
            "https://login.microsoftonline.com/contoso.onmicrosoft.com"
        );
        assert!(std::env::var("FOUNDRY_PROBE_TEST_ONLY").is_err());
    }

    #[test]
    fn missing_file_points_at_template() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(&dir.path().join("confidential.env")).unwrap_err();
        assert!(matches!(err, SettingsError::Missing { .. }));
        assert!(err.to_string().contains("confidential.sample.env"));
    }

    #[test]
    fn every_required_key_is_checked() {
        for (key, _) in COMPLETE {
            let settings = without(key);
            let err = settings
                .auth_config()
                .and_then(|_| settings.api_config())
                .unwrap_err();
            assert!(
                matches!(err, SettingsError::MissingKey { key: k, .. } if k == key),
                "{key}: {err}"
            );
        }
    }

    #[test]
    fn blank_values_count_as_missing() {
        let settings = Settings::from_pairs(
            "x.env",
            [("CLIENT_ID", "   "), ("TENANT_ID", "t")],
        );
        assert!(matches!(
            settings.auth_config(),
            Err(SettingsError::MissingKey { key: "CLIENT_ID", .. })
        ));
    }

    #[test]
    fn authority_overrides_tenant() {
        let settings = Settings::from_pairs(
            "x.env",
            [
                ("CLIENT_ID", "c"),
                ("AUTHORITY", "http://localhost:4000/mock-tenant/"),
            ],
        );
        let auth = settings.auth_config().unwrap();
        assert_eq!(auth.authority, "http://localhost:4000/mock-tenant");

        let bad = Settings::from_pairs("x.env", [("CLIENT_ID", "c"), ("AUTHORITY", "login")]);
        assert!(matches!(
            bad.auth_config(),
            Err(SettingsError::Invalid { key: "AUTHORITY", .. })
        ));
    }

    #[test]
    fn scopes_split_on_whitespace() {
        let mut pairs: Vec<(&str, &str)> = COMPLETE.to_vec();
        pairs.retain(|(k, _)| *k != "OAUTH_SCOPE");
        pairs.push(("OAUTH_SCOPE", "api://app/read  api://app/write"));
        let api = Settings::from_pairs("x.env", pairs).api_config().unwrap();
        assert_eq!(api.scopes, vec!["api://app/read", "api://app/write"]);
    }

    #[test]
    fn invalid_api_base_rejected() {
        let mut pairs: Vec<(&str, &str)> = COMPLETE.to_vec();
        pairs.retain(|(k, _)| *k != "API_BASE");
        pairs.push(("API_BASE", "apim.example.com"));
        assert!(matches!(
            Settings::from_pairs("x.env", pairs).api_config(),
            Err(SettingsError::Invalid { key: "API_BASE", .. })
        ));
    }

    #[test]
    fn token_cache_path_is_honoured() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokens.json");
        let settings = Settings::from_pairs(
            "x.env",
            [("TOKEN_CACHE_PATH", path.to_string_lossy().into_owned())],
        );
        assert_eq!(settings.token_cache().path(), Some(path.as_path()));
    }
}
