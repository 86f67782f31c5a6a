use anyhow::{Context, Result};
use clap::Parser;
use dotenvy::dotenv;
use log::{info, warn};
use maxchat::{Bridge, Command, Config, Event, OpenAiClient, Orchestrator};
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    // stdout belongs to the host, logs go to stderr
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Config::parse();
    if config.api_key.is_none() {
        warn!("OPENAI_API_KEY is not set; prompts will be rejected by the service");
    }
    info!("using {} at {}", config.model, config.endpoint);

    let client = OpenAiClient::new(config.endpoint.clone(), config.api_key.clone());
    let orchestrator = Orchestrator::new(client)
        .with_model(config.model.clone())
        .with_strict_notes(config.strict_notes);
    let mut bridge = Bridge::new(orchestrator);

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    // One message at a time: a prompt finishes before the next line is read.
    while let Some(line) = lines
        .next_line()
        .await
        .context("Failed to read message from host")?
    {
        let events = match Command::parse(&line) {
            Ok(Some(command)) => bridge.handle(command).await,
            Ok(None) => continue,
            Err(err) => {
                warn!("{err}");
                vec![Event::Post(format!("Error: {err}"))]
            }
        };

        for event in events {
            let mut out = event.to_line();
            out.push('\n');
            stdout
                .write_all(out.as_bytes())
                .await
                .context("Failed to write event to host")?;
        }
        stdout.flush().await.context("Failed to flush host output")?;
    }

    info!("host closed the connection");
    Ok(())
}
