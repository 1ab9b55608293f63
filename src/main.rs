mod commands;
mod config;
mod error;
mod events;
mod extract;
mod models;
mod queue;
mod sequencer;
mod state;
#[cfg(test)]
mod testing;
mod voice;

use std::sync::Arc;

use dotenv::dotenv;
use serenity::framework::standard::{Configuration, StandardFramework};
use serenity::prelude::*;
use songbird::{SerenityInit, Songbird};
use tokio::sync::mpsc;
use tracing::{error, info, info_span};
use tracing_futures::Instrument;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::events::{pump_completions, Handler};
use crate::extract::YtDlp;
use crate::sequencer::PlaybackSequencer;
use crate::state::BotState;
use crate::voice::SongbirdTransport;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[tokio::main]
async fn main() {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(why) = run().await {
        error!("An error occurred while running the client: {}", why);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), BoxError> {
    let config = Config::from_env()?;

    let extractor = Arc::new(YtDlp::new(&config.ytdlp_path, config.extraction_timeout));
    let version = extractor.check_installed().await?;
    info!("using {} {}", config.ytdlp_path, version);

    let manager = Songbird::serenity();
    let (completions_tx, completions_rx) = mpsc::unbounded_channel();
    let transport = Arc::new(SongbirdTransport::new(manager.clone(), completions_tx));
    let sequencer = Arc::new(PlaybackSequencer::new(transport, config.max_queue_length));
    let state = Arc::new(BotState::new(sequencer, extractor));

    let framework = StandardFramework::new()
        .after(commands::after)
        .help(&commands::HELP)
        .group(&commands::MUSIC_GROUP);
    framework.configure(Configuration::new().prefix(config.prefix.as_str()));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::GUILD_VOICE_STATES
        | GatewayIntents::MESSAGE_CONTENT;

    let mut client = Client::builder(&config.token, intents)
        .event_handler(Handler::new(&config.prefix))
        .framework(framework)
        .register_songbird_with(manager)
        .type_map_insert::<BotState>(state.clone())
        .await?;

    tokio::spawn(
        pump_completions(completions_rx, state, client.http.clone())
            .instrument(info_span!("completions")),
    );

    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received Ctrl-C, shutting down.");
            shard_manager.shutdown_all().await;
        }
    });

    info!(prefix = %config.prefix, "starting client");
    client.start().await?;
    Ok(())
}
