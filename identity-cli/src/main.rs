use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use common_identity::{cancellable, ClientConfig, CognitoClient, Credentials, IdentityAdmin};
use serde_json::json;
use structopt::StructOpt;
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(StructOpt, Debug)]
#[structopt(name = "identity-cli", about = "Operate against a Cognito user pool")]
struct Cli {
    /// JSON configuration file; COGNITO_* environment variables are used when omitted
    #[structopt(long, parse(from_os_str))]
    config: Option<PathBuf>,
    #[structopt(subcommand)]
    command: Command,
}

#[derive(StructOpt, Debug)]
enum Command {
    /// Print the hosted UI login, logout and signup URLs
    Urls,
    /// Exchange an authorization code and verify the returned identity token
    Exchange {
        #[structopt(long)]
        code: String,
        #[structopt(long = "scope")]
        scopes: Vec<String>,
    },
    /// Verify a token and print its claims
    Verify { token: String },
    /// Authenticate with username and password and print the subject
    Login {
        #[structopt(long)]
        username: String,
        #[structopt(long, env = "COGNITO_PASSWORD", hide_env_values = true)]
        password: String,
    },
    CreateUser {
        #[structopt(long)]
        username: String,
        #[structopt(long)]
        temporary_password: Option<String>,
    },
    DeleteUser {
        #[structopt(long)]
        username: String,
    },
    ConfirmUser {
        #[structopt(long)]
        username: String,
    },
    SetPassword {
        #[structopt(long)]
        username: String,
        #[structopt(long, env = "COGNITO_PASSWORD", hide_env_values = true)]
        password: String,
        /// Mark the password permanent instead of forcing a change at next login
        #[structopt(long)]
        permanent: bool,
    },
    AddToGroup {
        #[structopt(long)]
        username: String,
        #[structopt(long)]
        group: String,
    },
    /// List the groups a user belongs to
    Groups {
        #[structopt(long)]
        username: String,
    },
}

fn load_config(path: Option<&PathBuf>) -> Result<ClientConfig> {
    let config = match path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            ClientConfig::from_json(&raw)?
        }
        None => ClientConfig::from_env()?,
    };
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::from_args();
    let config = load_config(cli.config.as_ref())?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            trigger.cancel();
        }
    });

    let client = cancellable(&shutdown, CognitoClient::new(config)).await?;
    let admin: &dyn IdentityAdmin = client.admin();
    info!(pool = %client.config().pool_id, "identity client ready");

    let output = match cli.command {
        Command::Urls => {
            let urls = client
                .hosted_urls()
                .context("no hosted UI domain configured")?;
            serde_json::to_value(urls)?
        }
        Command::Exchange { code, scopes } => {
            let scopes: Vec<&str> = scopes.iter().map(String::as_str).collect();
            let (tokens, claims) =
                cancellable(&shutdown, client.exchange_and_verify(&code, &scopes)).await?;
            json!({
                "claims": claims,
                "tokenType": tokens.token_type,
                "expiresIn": tokens.expires_in,
                "hasRefreshToken": tokens.refresh_token.is_some(),
            })
        }
        Command::Verify { token } => serde_json::to_value(client.verify(&token)?)?,
        Command::Login { username, password } => {
            let credentials = Credentials::new(username, password);
            let subject = cancellable(&shutdown, client.authenticate(&credentials)).await?;
            json!({ "subject": subject })
        }
        Command::CreateUser {
            username,
            temporary_password,
        } => {
            let subject = cancellable(
                &shutdown,
                admin.create_user(&username, temporary_password.as_deref()),
            )
            .await?;
            json!({ "username": username, "subject": subject })
        }
        Command::DeleteUser { username } => {
            cancellable(&shutdown, admin.delete_user(&username)).await?;
            json!({ "deleted": username })
        }
        Command::ConfirmUser { username } => {
            cancellable(&shutdown, admin.confirm_user(&username)).await?;
            json!({ "confirmed": username })
        }
        Command::SetPassword {
            username,
            password,
            permanent,
        } => {
            cancellable(
                &shutdown,
                admin.set_password(&username, &password, permanent),
            )
            .await?;
            json!({ "username": username, "permanent": permanent })
        }
        Command::AddToGroup { username, group } => {
            cancellable(&shutdown, admin.add_user_to_group(&username, &group)).await?;
            json!({ "username": username, "group": group })
        }
        Command::Groups { username } => {
            let groups = cancellable(&shutdown, admin.list_groups(&username)).await?;
            json!({ "username": username, "groups": groups })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
