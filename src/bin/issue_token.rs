use anyhow::{Context, Result};
use clap::Parser;
use lectern::auth::TokenAuthority;
use lectern::config::{Config, default_config_path};
use lectern::model::UserId;

#[derive(Parser)]
#[command(name = "issue_token")]
#[command(about = "Mint a bearer token for a user of the lectern service")]
struct Cli {
    user_id: String,
    #[arg(short = 'c', long = "config")]
    config_path: Option<String>,
}

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let config_path = cli
        .config_path
        .unwrap_or_else(|| default_config_path().to_string_lossy().into_owned());
    let cfg = Config::new(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path))?;

    let user = UserId::new(&cli.user_id).context("user id must not be blank")?;
    let auth = TokenAuthority::new(&cfg.auth.secret)?;

    println!("{}", auth.issue(&user));
    Ok(())
}
