//! Configuration module for the Socios backend.
//!
//! All configuration is loaded from environment variables once at startup;
//! the storage backend and the optional MailChimp sync are both decided here.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Which storage backend to run against, decided once per process.
///
/// Priority: a managed Postgres connection string, then a Supabase
/// configuration, then the embedded SQLite fallback.
#[derive(Debug, Clone)]
pub enum StorageConfig {
    Postgres { url: String },
    Supabase { url: String, anon_key: String },
    Sqlite { path: PathBuf },
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            StorageConfig::Postgres { .. } => "postgres",
            StorageConfig::Supabase { .. } => "supabase",
            StorageConfig::Sqlite { .. } => "sqlite",
        }
    }
}

/// MailChimp credentials; present only when the audience sync is fully
/// configured.
#[derive(Debug, Clone)]
pub struct MailchimpConfig {
    pub api_key: String,
    pub audience_id: String,
    /// API root, normally derived from the server prefix.
    pub api_base: String,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Storage backend selection
    pub storage: StorageConfig,
    /// Audience sync; `None` disables sync entirely
    pub mailchimp: Option<MailchimpConfig>,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let bind_addr = env::var("SOCIOS_BIND_ADDR")
            .unwrap_or_else(|_| "127.0.0.1:8080".to_string())
            .parse()
            .expect("Invalid SOCIOS_BIND_ADDR format");

        let log_level = env::var("SOCIOS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Self {
            storage: storage_from_env(),
            mailchimp: mailchimp_from_env(),
            bind_addr,
            log_level,
        }
    }
}

fn storage_from_env() -> StorageConfig {
    let database_url = env::var("DATABASE_URL").ok().filter(|s| !s.trim().is_empty());

    if let Some(url) = &database_url {
        if url.starts_with("postgres://") || url.starts_with("postgresql://") {
            return StorageConfig::Postgres { url: url.clone() };
        }
    }

    let supabase_url = env::var("SUPABASE_URL").ok().filter(|s| !s.trim().is_empty());
    let supabase_key = env::var("SUPABASE_ANON_KEY")
        .ok()
        .filter(|s| !s.trim().is_empty());
    if let (Some(url), Some(anon_key)) = (supabase_url, supabase_key) {
        return StorageConfig::Supabase { url, anon_key };
    }

    // A non-postgres DATABASE_URL is a plain SQLite path, as in the
    // original local-development setup.
    let path = env::var("SOCIOS_DB_PATH")
        .ok()
        .or(database_url)
        .unwrap_or_else(|| "./data/socios.sqlite".to_string());

    StorageConfig::Sqlite { path: path.into() }
}

fn mailchimp_from_env() -> Option<MailchimpConfig> {
    let api_key = env::var("MAILCHIMP_API_KEY").ok().filter(|s| !s.is_empty())?;
    let server_prefix = env::var("MAILCHIMP_SERVER_PREFIX")
        .ok()
        .filter(|s| !s.is_empty())?;
    let audience_id = env::var("MAILCHIMP_AUDIENCE_ID")
        .ok()
        .filter(|s| !s.is_empty())?;

    let api_base = env::var("MAILCHIMP_API_BASE")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| format!("https://{}.api.mailchimp.com/3.0", server_prefix));

    Some(MailchimpConfig {
        api_key,
        audience_id,
        api_base,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clear_storage_env() {
        env::remove_var("DATABASE_URL");
        env::remove_var("SUPABASE_URL");
        env::remove_var("SUPABASE_ANON_KEY");
        env::remove_var("SOCIOS_DB_PATH");
    }

    fn clear_mailchimp_env() {
        env::remove_var("MAILCHIMP_API_KEY");
        env::remove_var("MAILCHIMP_SERVER_PREFIX");
        env::remove_var("MAILCHIMP_AUDIENCE_ID");
        env::remove_var("MAILCHIMP_API_BASE");
    }

    #[test]
    fn test_storage_selection_follows_priority() {
        clear_storage_env();

        // Nothing configured: SQLite fallback at the default path.
        match storage_from_env() {
            StorageConfig::Sqlite { path } => {
                assert_eq!(path, PathBuf::from("./data/socios.sqlite"))
            }
            other => panic!("expected sqlite fallback, got {:?}", other),
        }

        // A plain file path in DATABASE_URL stays SQLite.
        env::set_var("DATABASE_URL", "./club.sqlite");
        match storage_from_env() {
            StorageConfig::Sqlite { path } => assert_eq!(path, PathBuf::from("./club.sqlite")),
            other => panic!("expected sqlite, got {:?}", other),
        }

        // Supabase outranks the file fallback.
        env::set_var("SUPABASE_URL", "https://demo.supabase.co");
        env::set_var("SUPABASE_ANON_KEY", "anon");
        assert!(matches!(
            storage_from_env(),
            StorageConfig::Supabase { .. }
        ));

        // A Postgres connection string outranks everything.
        env::set_var("DATABASE_URL", "postgres://user:pw@db.example.com/club");
        assert!(matches!(
            storage_from_env(),
            StorageConfig::Postgres { .. }
        ));

        clear_storage_env();
    }

    #[test]
    fn test_mailchimp_requires_all_three_values() {
        clear_mailchimp_env();
        assert!(mailchimp_from_env().is_none());

        env::set_var("MAILCHIMP_API_KEY", "key");
        env::set_var("MAILCHIMP_SERVER_PREFIX", "us21");
        assert!(mailchimp_from_env().is_none());

        env::set_var("MAILCHIMP_AUDIENCE_ID", "abc123");
        let config = mailchimp_from_env().expect("fully configured");
        assert_eq!(config.api_base, "https://us21.api.mailchimp.com/3.0");

        env::set_var("MAILCHIMP_API_BASE", "http://127.0.0.1:9/3.0");
        let config = mailchimp_from_env().expect("fully configured");
        assert_eq!(config.api_base, "http://127.0.0.1:9/3.0");

        clear_mailchimp_env();
    }
}
