//! CLI entry point for aims-auth.
//!
//! Logs a user in through the identity service, optionally answering an MFA
//! demand and accepting the terms of service, and persists the resulting
//! session to a file.
//!
//! Exit codes:
//! - 0: authenticated
//! - 1: not authenticated (rejected, further step needed, or runtime error)
//! - 2: argument validation error (clap handles this automatically)

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use aims_auth::auth::{AuthOutcome, AuthenticationFlow};
use aims_auth::client::AimsClient;
use aims_auth::config::AuthConfig;
use aims_auth::error::Result;
use aims_auth::locator::{Environment, Residency};
use aims_auth::session::{ChannelBroadcast, FileSessionStore, MemorySessionStore, SessionStore};

#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Login email of the user.
    #[arg(long)]
    username: String,

    /// Password. Prefer the AIMS_PASSWORD environment variable to keep it
    /// out of process listings and shell history.
    #[arg(long, env = "AIMS_PASSWORD", hide_env_values = true)]
    password: String,

    /// One-time MFA code, used if the service asks for MFA verification.
    #[arg(long)]
    mfa_code: Option<String>,

    /// Accept the terms of service if the service asks for it.
    #[arg(long)]
    accept_tos: bool,

    /// TOML configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Deployment environment (overrides the configuration file).
    #[arg(long)]
    environment: Option<Environment>,

    /// Data residency, US or EMEA (overrides the configuration file).
    #[arg(long)]
    residency: Option<Residency>,

    /// Identity service base URL (overrides location resolution).
    #[arg(long)]
    base_url: Option<String>,

    /// Where to write the session on success (overrides the configuration
    /// file). Without one, the session is only kept in memory.
    #[arg(long)]
    session_file: Option<PathBuf>,
}

impl Cli {
    fn resolve_config(&self) -> Result<AuthConfig> {
        let mut config = match &self.config {
            Some(path) => AuthConfig::load(path)?,
            None => AuthConfig::default(),
        };
        if let Some(environment) = self.environment {
            config.environment = environment;
        }
        if let Some(residency) = self.residency {
            config.residency = residency;
        }
        if let Some(url) = &self.base_url {
            config.base_url = Some(url.clone());
        }
        if let Some(path) = &self.session_file {
            config.session_file = Some(path.clone());
        }
        Ok(config)
    }
}

async fn login(args: &Cli, config: &AuthConfig) -> Result<AuthOutcome> {
    let client = AimsClient::new(config)?;
    tracing::debug!(base_url = client.base_url(), "identity service");

    let store: Arc<dyn SessionStore> = match &config.session_file {
        Some(path) => Arc::new(FileSessionStore::new(path)),
        None => Arc::new(MemorySessionStore::new()),
    };
    let mut flow = AuthenticationFlow::new(client, store, Arc::new(ChannelBroadcast::new(1)));

    let mut outcome = flow.authenticate(&args.username, &args.password).await?;

    if outcome == AuthOutcome::MfaVerificationRequired {
        match &args.mfa_code {
            Some(code) => outcome = flow.validate_mfa_code(code).await?,
            None => eprintln!("MFA verification required: rerun with --mfa-code"),
        }
    }

    if outcome == AuthOutcome::TosAcceptanceRequired {
        if let Ok(url) = flow.terms_of_service_url() {
            println!("Terms of service: {url}");
        }
        if args.accept_tos && flow.session_token().is_err() {
            eprintln!(
                "Terms of service acceptance required, but the service issued no session \
                 token to accept them with: accept them in the console and log in again"
            );
        } else if args.accept_tos {
            outcome = flow.accept_terms_of_service().await?;
        } else {
            eprintln!("Terms of service acceptance required: rerun with --accept-tos");
        }
    }

    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Cli::parse();

    let config = match args.resolve_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    match login(&args, &config).await {
        Ok(outcome) => {
            println!("{outcome}");
            if outcome == AuthOutcome::Authenticated {
                if let Some(path) = &config.session_file {
                    println!("Session written to {}", path.display());
                }
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            }
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_args() -> Vec<&'static str> {
        vec![
            "aims-auth",
            "--username",
            "admin@company.com",
            "--password",
            "hunter2",
        ]
    }

    #[test]
    fn minimal_invocation_parses() {
        let cli = Cli::try_parse_from(base_args()).expect("should parse required args");
        assert_eq!(cli.username, "admin@company.com");
        assert_eq!(cli.password, "hunter2");
        assert!(cli.mfa_code.is_none());
        assert!(!cli.accept_tos);
    }

    #[test]
    fn missing_username_is_rejected() {
        let result = Cli::try_parse_from(["aims-auth", "--password", "x"]);
        assert!(result.is_err());
    }

    #[test]
    fn environment_and_residency_parse_through_fromstr() {
        let mut args = base_args();
        args.extend_from_slice(&["--environment", "beta-navigation", "--residency", "emea"]);
        let cli = Cli::try_parse_from(args).unwrap();
        assert_eq!(cli.environment, Some(Environment::Integration));
        assert_eq!(cli.residency, Some(Residency::Emea));
    }

    #[test]
    fn unknown_residency_is_rejected() {
        let mut args = base_args();
        args.extend_from_slice(&["--residency", "APAC"]);
        assert!(Cli::try_parse_from(args).is_err());
    }

    #[test]
    fn flags_override_defaults() {
        let mut args = base_args();
        args.extend_from_slice(&[
            "--base-url",
            "http://127.0.0.1:9000",
            "--session-file",
            "/tmp/s.json",
            "--mfa-code",
            "123456",
            "--accept-tos",
        ]);
        let cli = Cli::try_parse_from(args).unwrap();
        let config = cli.resolve_config().unwrap();
        assert_eq!(config.aims_base_url(), "http://127.0.0.1:9000");
        assert_eq!(config.session_file, Some(PathBuf::from("/tmp/s.json")));
        assert_eq!(cli.mfa_code.as_deref(), Some("123456"));
        assert!(cli.accept_tos);
    }

    #[tokio::test]
    async fn accept_tos_without_session_token_stops_after_password_step() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/aims/v1/authenticate"))
            .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
                "error": "accept_tos_required",
                "tos_url": "https://example.com/tos"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let uri = server.uri();
        let mut args: Vec<&str> = base_args();
        args.extend_from_slice(&["--base-url", &uri, "--accept-tos"]);
        let cli = Cli::try_parse_from(args).unwrap();
        let config = cli.resolve_config().unwrap();

        let outcome = login(&cli, &config).await.unwrap();

        assert_eq!(outcome, AuthOutcome::TosAcceptanceRequired);
    }
}
