//! Connection flags shared by every subcommand
//!
//! Each flag falls back to an environment variable, so scheduled jobs can
//! keep credentials out of the command line.

use clap::Args;

use crate::crypto::SecureString;
use crate::error::{BackupError, BackupResult};
use crate::models::{ConnectionParams, ConnectionSpec, DEFAULT_PORT};

/// Database connection flags
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Database host
    #[arg(long, env = "MONGO_HOST", default_value = "localhost", global = true)]
    pub host: String,

    /// Database port
    #[arg(long, env = "MONGO_PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Database to back up, restore or query
    #[arg(long = "db", env = "MONGO_DB", default_value = "", hide_default_value = true, global = true)]
    pub database: String,

    /// User name (authenticates against the admin database)
    #[arg(long = "user", env = "MONGO_USER", default_value = "", hide_default_value = true, global = true)]
    pub username: String,

    /// Password; also the backup encryption passphrase
    #[arg(long = "pass", env = "MONGO_PASSWORD", hide_env_values = true, global = true)]
    pub password: Option<String>,
}

impl ConnectionArgs {
    /// Build the connection for this invocation
    ///
    /// Prompts for the password when a user is given without one.
    pub fn connect(&self, backup_name: Option<String>) -> BackupResult<ConnectionSpec> {
        let password = match &self.password {
            Some(password) => SecureString::new(password.as_str()),
            None if !self.username.is_empty() => prompt_password(&self.username)?,
            None => SecureString::new(""),
        };

        ConnectionSpec::new(ConnectionParams {
            host: self.host.clone(),
            port: self.port,
            database: self.database.clone(),
            username: self.username.clone(),
            password: password.as_str().to_string(),
            backup_name,
        })
    }
}

/// Prompt for a password (hidden input)
fn prompt_password(username: &str) -> BackupResult<SecureString> {
    rpassword::prompt_password(format!("Password for {}: ", username))
        .map(SecureString::new)
        .map_err(|e| BackupError::Config(format!("Failed to read password: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ConnectionArgs {
        ConnectionArgs {
            host: "db.internal".into(),
            port: 27018,
            database: "orders".into(),
            username: String::new(),
            password: None,
        }
    }

    #[test]
    fn test_anonymous_connection() {
        let conn = args().connect(None).unwrap();
        assert_eq!(conn.uri(), "mongodb://db.internal:27018/orders");
        assert!(conn.password().is_empty());
    }

    #[test]
    fn test_explicit_password_and_name() {
        let mut args = args();
        args.username = "admin".into();
        args.password = Some("hunter2".into());

        let conn = args.connect(Some("orders-1700000000".into())).unwrap();
        assert_eq!(conn.password().as_str(), "hunter2");
        assert_eq!(conn.backup_name(), Some("orders-1700000000"));
        assert!(!format!("{:?}", conn).contains("hunter2"));
    }
}
