use std::time::Duration;

use anyhow::{Context, anyhow};

/// Process settings, read from the environment after `.env` is loaded.
#[derive(Debug, Clone)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub upload_dir: String,
    pub admin_recipient: String,
    pub slack_webhook_url: Option<String>,
    pub log_filter: String,
    /// `None` turns the background SLA sweep off.
    pub sla_sweep_interval: Option<Duration>,
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

#[derive(Clone)]
pub struct BootstrapAdmin {
    pub email: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| var(key).ok_or_else(|| anyhow!("{key} must be set"));

        let port = match var("APP_PORT") {
            Some(raw) => raw.parse().with_context(|| format!("APP_PORT `{raw}` is not a port number"))?,
            None => 8080,
        };

        let sweep_secs: u64 = match var("SLA_SWEEP_SECS") {
            Some(raw) => raw.parse().with_context(|| format!("SLA_SWEEP_SECS `{raw}` is not a number of seconds"))?,
            None => 300,
        };

        let bootstrap_admin = match (var("BOOTSTRAP_ADMIN_EMAIL"), var("BOOTSTRAP_ADMIN_PASSWORD")) {
            (Some(email), Some(password)) => Some(BootstrapAdmin { email, password }),
            (None, None) => None,
            _ => return Err(anyhow!("BOOTSTRAP_ADMIN_EMAIL and BOOTSTRAP_ADMIN_PASSWORD go together")),
        };

        Ok(Self {
            host: var("APP_HOST").unwrap_or_else(|| "127.0.0.1".into()),
            port,
            database_url: required("DATABASE_URL")?,
            jwt_secret: required("JWT_SECRET")?,
            upload_dir: var("UPLOAD_DIR").unwrap_or_else(|| "uploads".into()),
            admin_recipient: var("ADMIN_RECIPIENT").unwrap_or_else(|| "admin-1".into()),
            slack_webhook_url: var("SLACK_WEBHOOK_URL"),
            log_filter: var("RUST_LOG").unwrap_or_else(|| "info,sqlx=warn".into()),
            sla_sweep_interval: (sweep_secs > 0).then(|| Duration::from_secs(sweep_secs)),
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn settings(pairs: &[(&str, &str)]) -> anyhow::Result<Settings> {
        let env: HashMap<String, String> = pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Settings::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_fill_in_optional_values() {
        let s = settings(&[("DATABASE_URL", "sqlite::memory:"), ("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(s.host, "127.0.0.1");
        assert_eq!(s.port, 8080);
        assert_eq!(s.upload_dir, "uploads");
        assert_eq!(s.admin_recipient, "admin-1");
        assert!(s.slack_webhook_url.is_none());
        assert!(s.bootstrap_admin.is_none());
        assert_eq!(s.sla_sweep_interval, Some(Duration::from_secs(300)));
    }

    #[test]
    fn zero_disables_the_sla_sweep() {
        let s = settings(&[("DATABASE_URL", "x"), ("JWT_SECRET", "y"), ("SLA_SWEEP_SECS", "0")]).unwrap();
        assert!(s.sla_sweep_interval.is_none());
    }

    #[test]
    fn missing_secret_is_an_error() {
        let err = settings(&[("DATABASE_URL", "sqlite::memory:")]).unwrap_err();
        assert!(err.to_string().contains("JWT_SECRET"));
    }

    #[test]
    fn bad_port_is_reported() {
        let err = settings(&[("DATABASE_URL", "x"), ("JWT_SECRET", "y"), ("APP_PORT", "eighty")]).unwrap_err();
        assert!(err.to_string().contains("APP_PORT"));
    }

    #[test]
    fn half_a_bootstrap_admin_is_rejected() {
        assert!(settings(&[("DATABASE_URL", "x"), ("JWT_SECRET", "y"), ("BOOTSTRAP_ADMIN_EMAIL", "a@b.c")]).is_err());
    }
}
