use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};

use vault_api::identity::IdentityMode;

/// Placeholder JWT secrets that MUST NOT be used.
const PLACEHOLDER_SECRETS: &[&str] = &["change-me-to-a-random-string", "dev-secret-change-me"];

/// Used only in asserted mode when no secret is configured.
pub const DEV_SECRET: &str = "dev-secret-change-me";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite { path: PathBuf },
    /// Process-local; everything is gone on restart.
    Memory,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub store: StoreBackend,
    pub identity_mode: IdentityMode,
    pub jwt_secret: String,
    pub token_ttl_days: i64,
    pub ping_message: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let host: IpAddr = var("VAULT_HOST")
            .as_deref()
            .map(str::trim)
            .unwrap_or("0.0.0.0")
            .parse()
            .context("VAULT_HOST must be an IPv4 or IPv6 address")?;
        let port: u16 = var("VAULT_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("VAULT_PORT must be a port number")?;

        let store = match var("VAULT_STORE").as_deref().map(str::trim) {
            None | Some("sqlite") => {
                let path = var("VAULT_DATABASE_PATH").ok_or_else(|| {
                    anyhow!(
                        "Database path is not configured. Set VAULT_DATABASE_PATH, \
                         or set VAULT_STORE=memory for a throwaway local store."
                    )
                })?;
                StoreBackend::Sqlite { path: path.into() }
            }
            Some("memory") => StoreBackend::Memory,
            Some(other) => bail!("unknown VAULT_STORE '{}', expected 'sqlite' or 'memory'", other),
        };

        let identity_mode: IdentityMode = match var("VAULT_IDENTITY_MODE") {
            Some(mode) => mode.parse().context("invalid VAULT_IDENTITY_MODE")?,
            None => IdentityMode::default(),
        };

        let jwt_secret = match (var("VAULT_JWT_SECRET"), identity_mode) {
            (Some(secret), IdentityMode::Token) if PLACEHOLDER_SECRETS.contains(&secret.as_str()) => {
                bail!("VAULT_JWT_SECRET is still a placeholder; set a random secret")
            }
            (Some(secret), _) => secret,
            (None, IdentityMode::Token) => {
                bail!("VAULT_JWT_SECRET is unset; it is required in token identity mode")
            }
            (None, IdentityMode::Asserted) => DEV_SECRET.to_string(),
        };

        let token_ttl_days: i64 = match var("VAULT_TOKEN_TTL_DAYS") {
            Some(days) => days.parse().context("VAULT_TOKEN_TTL_DAYS must be a number")?,
            None => 30,
        };
        if token_ttl_days <= 0 {
            bail!("VAULT_TOKEN_TTL_DAYS must be positive");
        }

        let ping_message = var("PING_MESSAGE").unwrap_or_else(|| "ping".into());

        Ok(Self {
            host,
            port,
            store,
            identity_mode,
            jwt_secret,
            token_ttl_days,
            ping_message,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let map: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn sqlite_without_path_fails_fast() {
        let err = config(&[("VAULT_JWT_SECRET", "s3cret")]).unwrap_err();
        assert!(err.to_string().contains("VAULT_DATABASE_PATH"));
    }

    #[test]
    fn defaults_with_sqlite_path() {
        let cfg = config(&[("VAULT_DATABASE_PATH", "vault.db"), ("VAULT_JWT_SECRET", "s3cret")])
            .unwrap();
        assert_eq!(cfg.host, IpAddr::from([0, 0, 0, 0]));
        assert_eq!(cfg.port, 3000);
        assert_eq!(cfg.store, StoreBackend::Sqlite { path: "vault.db".into() });
        assert_eq!(cfg.identity_mode, IdentityMode::Token);
        assert_eq!(cfg.token_ttl_days, 30);
        assert_eq!(cfg.ping_message, "ping");
    }

    #[test]
    fn memory_store_must_be_chosen_explicitly() {
        let cfg = config(&[("VAULT_STORE", "memory"), ("VAULT_JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(cfg.store, StoreBackend::Memory);

        assert!(config(&[("VAULT_STORE", "postgres"), ("VAULT_JWT_SECRET", "s3cret")]).is_err());
    }

    #[test]
    fn token_mode_requires_a_real_secret() {
        assert!(config(&[("VAULT_STORE", "memory")]).is_err());
        assert!(
            config(&[("VAULT_STORE", "memory"), ("VAULT_JWT_SECRET", "dev-secret-change-me")])
                .is_err()
        );
    }

    #[test]
    fn asserted_mode_falls_back_to_dev_secret() {
        let cfg = config(&[("VAULT_STORE", "memory"), ("VAULT_IDENTITY_MODE", "asserted")]).unwrap();
        assert_eq!(cfg.identity_mode, IdentityMode::Asserted);
        assert_eq!(cfg.jwt_secret, DEV_SECRET);
    }

    #[test]
    fn accepts_ipv6_hosts() {
        let base = [("VAULT_STORE", "memory"), ("VAULT_JWT_SECRET", "s3cret")];
        let cfg = config(&[base[0], base[1], ("VAULT_HOST", "::")]).unwrap();
        assert_eq!(cfg.host, "::".parse::<IpAddr>().unwrap());
        assert!(cfg.host.is_ipv6());

        let cfg = config(&[base[0], base[1], ("VAULT_HOST", "::1")]).unwrap();
        assert!(cfg.host.is_loopback());

        assert!(config(&[base[0], base[1], ("VAULT_HOST", "example.com")]).is_err());
    }

    #[test]
    fn rejects_bad_numbers() {
        let base = [("VAULT_STORE", "memory"), ("VAULT_JWT_SECRET", "s3cret")];
        assert!(config(&[base[0], base[1], ("VAULT_PORT", "http")]).is_err());
        assert!(config(&[base[0], base[1], ("VAULT_TOKEN_TTL_DAYS", "0")]).is_err());
    }
}
