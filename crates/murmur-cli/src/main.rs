mod view;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use murmur_client::{AuthClient, AuthError, ClientConfig, SessionEngine};

use crate::view::{Command, View};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging on stderr; stdout is the chat
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "murmur_cli=info,murmur_client=info".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    // Config
    let config = ClientConfig::from_env()?;
    let username = std::env::var("MURMUR_USERNAME").context("MURMUR_USERNAME is not set")?;
    let password = std::env::var("MURMUR_PASSWORD").context("MURMUR_PASSWORD is not set")?;

    // Credentials
    let auth = AuthClient::new(config.api_base.clone());
    if let Ok(email) = std::env::var("MURMUR_EMAIL") {
        match auth.register(&username, &email, &password).await {
            Ok(_) => {}
            // Already registered
            Err(AuthError::Rejected { status: 400, detail }) => {
                info!("Skipping registration: {}", detail);
            }
            Err(e) => return Err(e).context("registration failed"),
        }
    }
    let identity = auth
        .login(&username, &password)
        .await
        .context("login failed")?;

    let mut engine = SessionEngine::from_config(&config, identity);
    let mut view = View::new(std::io::stdout());
    engine.select_room(&config.default_room)?;
    view.render(&engine.snapshot())?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                match Command::parse(&line) {
                    Command::Quit => break,
                    Command::Join(room) => {
                        if let Err(e) = engine.select_room(&room) {
                            view.notice(&e.to_string())?;
                        }
                    }
                    Command::Say(text) => {
                        // Failures land in the snapshot's last_error
                        let _ = engine.send_message(&text);
                    }
                }
                view.render(&engine.snapshot())?;
            }
            Some(event) = engine.next_event() => {
                if engine.handle(event) {
                    view.render(&engine.snapshot())?;
                }
            }
        }
    }

    engine.teardown();
    info!("Bye");
    Ok(())
}
