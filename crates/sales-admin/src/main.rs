//! Sales Admin - administrative tasks for the sales service.
//!
//! This is the entry point for the `sales-admin` binary.
//!
//! Key pairs are created with `openssl`:
//!
//! ```text
//! openssl genrsa -out zarf/keys/<kid>.pem 2048
//! openssl rsa -in zarf/keys/<kid>.pem -pubout -out zarf/keys/<kid>.pub.pem
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand};

use sales_auth::{AuthConfig, Authenticator, FsKeyStore, TokenValidator};
use sales_core::Role;

const DEFAULT_KEYS_DIR: &str = "zarf/keys";

/// Sales Admin - token and key administration.
#[derive(Parser, Debug)]
#[command(name = "sales-admin")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Directory holding `<kid>.pub.pem` and `<kid>.pem` files.
    #[arg(long, env = "SALES_AUTH_KEYS_DIR", default_value = DEFAULT_KEYS_DIR, global = true)]
    keys_dir: PathBuf,

    /// Signing algorithm.
    #[arg(long, env = "SALES_AUTH_ALGORITHM", default_value = "RS256", global = true)]
    algorithm: String,

    /// Token issuer.
    #[arg(long, env = "SALES_AUTH_ISSUER", default_value = "service project", global = true)]
    issuer: String,

    /// Token audience.
    #[arg(long, env = "SALES_AUTH_AUDIENCE", default_value = "students", global = true)]
    audience: String,

    /// Enable debug logging.
    #[arg(long, default_value = "false", global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a signed token for a subject.
    Tokengen {
        /// Subject the token is issued for.
        subject: String,

        /// Role to grant; repeat for several.
        #[arg(long = "role", required = true)]
        roles: Vec<Role>,

        /// Key id to sign with.
        #[arg(long, env = "SALES_AUTH_ACTIVE_KID", default_value = sales_auth::DEFAULT_ACTIVE_KID)]
        kid: String,

        /// Token lifetime in hours.
        #[arg(long, default_value = "8760")]
        ttl_hours: u64,
    },

    /// List the keys found in the key directory.
    Keys,

    /// Validate a token and print its claims.
    Verify {
        /// The token to check.
        token: String,
    },
}

impl Args {
    fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            algorithm: self.algorithm.clone(),
            issuer: self.issuer.clone(),
            audience: self.audience.clone(),
            keys_dir: Some(self.keys_dir.clone()),
            ..AuthConfig::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    if args.debug {
        tracing_subscriber::fmt()
            .with_env_filter("sales=debug,warn")
            .with_writer(std::io::stderr)
            .init();
    }

    let config = args.auth_config();
    match args.command {
        Command::Tokengen {
            subject,
            roles,
            kid,
            ttl_hours,
        } => {
            let token = tokengen(&config, &args.keys_dir, &subject, roles, &kid, ttl_hours)?;
            println!("-----BEGIN TOKEN-----\n{token}\n-----END TOKEN-----");
        }
        Command::Keys => {
            for line in keys(&config, &args.keys_dir)? {
                println!("{line}");
            }
        }
        Command::Verify { token } => {
            let claims = authenticator(&config, &args.keys_dir)?
                .validate(token.trim())
                .context("validating token")?;
            println!("{}", serde_json::to_string_pretty(&claims)?);
        }
    }

    Ok(())
}

fn authenticator(config: &AuthConfig, keys_dir: &Path) -> anyhow::Result<Authenticator> {
    let algorithm = config.algorithm().context("reading algorithm")?;
    let keys = FsKeyStore::open(keys_dir, algorithm)
        .with_context(|| format!("loading keys from {}", keys_dir.display()))?;
    Authenticator::new(config, Arc::new(keys)).context("constructing authenticator")
}

/// Sign a token for `subject` with the key stored under `kid`.
fn tokengen(
    config: &AuthConfig,
    keys_dir: &Path,
    subject: &str,
    roles: Vec<Role>,
    kid: &str,
    ttl_hours: u64,
) -> anyhow::Result<String> {
    let auth = authenticator(config, keys_dir)?;
    let ttl = Duration::from_secs(ttl_hours.saturating_mul(60 * 60));

    let claims = auth
        .claims_for(subject, roles, ttl)
        .context("building claims")?;
    tracing::debug!(subject = %claims.subject, kid = %kid, expires_at = %claims.expires_at, "Signing token");

    auth.generate_token(kid, &claims).context("generating token")
}

/// Describe each key as `<kid> sign+verify` or `<kid> verify`.
fn keys(config: &AuthConfig, keys_dir: &Path) -> anyhow::Result<Vec<String>> {
    let auth = authenticator(config, keys_dir)?;
    let store = auth.keys();

    Ok(store
        .key_ids()
        .into_iter()
        .map(|kid| {
            let usage = match store.lookup(&kid) {
                Some(key) if key.can_sign() => "sign+verify",
                _ => "verify",
            };
            format!("{kid} {usage}")
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KID: &str = "54bb2165-71e1-41a6-af3e-7da4a0e1e2c1";
    const OTHER_KID: &str = "9f1c6a2e-3d4b-4e8a-b7c2-5a1d0e6f4b38";

    fn fixture(name: &str) -> Vec<u8> {
        let path = Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("../sales-auth/tests/fixtures")
            .join(name);
        std::fs::read(path).unwrap()
    }

    fn keys_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            format!("{KID}.pem"),
            format!("{KID}.pub.pem"),
            format!("{OTHER_KID}.pub.pem"),
        ] {
            std::fs::write(dir.path().join(&name), fixture(&name)).unwrap();
        }
        dir
    }

    fn config(dir: &Path) -> AuthConfig {
        AuthConfig {
            keys_dir: Some(dir.to_path_buf()),
            ..AuthConfig::default()
        }
    }

    #[test]
    fn args_parse() {
        let args = Args::try_parse_from([
            "sales-admin",
            "tokengen",
            "u1",
            "--role",
            "ADMIN",
            "--role",
            "USER",
        ])
        .unwrap();
        match args.command {
            Command::Tokengen { subject, roles, .. } => {
                assert_eq!(subject, "u1");
                assert_eq!(roles, vec![Role::Admin, Role::User]);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn args_reject_unknown_role() {
        let result =
            Args::try_parse_from(["sales-admin", "tokengen", "u1", "--role", "SUPERUSER"]);
        assert!(result.is_err());
    }

    #[test]
    fn tokengen_output_validates() {
        let dir = keys_dir();
        let config = config(dir.path());

        let token = tokengen(&config, dir.path(), "u1", vec![Role::Admin], KID, 1).unwrap();
        let claims = authenticator(&config, dir.path())
            .unwrap()
            .validate(&token)
            .unwrap();
        assert_eq!(claims.subject, "u1");
        assert_eq!(claims.roles, vec![Role::Admin]);
        assert_eq!(
            (claims.expires_at - claims.issued_at).num_seconds(),
            60 * 60
        );
    }

    #[test]
    fn tokengen_needs_private_key() {
        let dir = keys_dir();
        let config = config(dir.path());
        assert!(tokengen(&config, dir.path(), "u1", vec![Role::User], OTHER_KID, 1).is_err());
    }

    #[test]
    fn keys_lists_usage() {
        let dir = keys_dir();
        let lines = keys(&config(dir.path()), dir.path()).unwrap();
        assert_eq!(
            lines,
            vec![format!("{KID} sign+verify"), format!("{OTHER_KID} verify")]
        );
    }
}
