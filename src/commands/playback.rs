use serenity::client::Context;
use serenity::framework::standard::{macros::command, Args, CommandResult};
use serenity::model::channel::Message;
use tracing::info;

use super::voice::connect;
use super::{check_msg, locate, report};
use crate::error::PlayerError;
use crate::models::{PlayOutcome, SkipOutcome};
use crate::state::BotState;

const QUEUE_DISPLAY_LIMIT: usize = 10;

#[command]
#[only_in(guilds)]
#[min_args(1)]
#[description = "Plays a song from YouTube, or queues it if something is already playing"]
#[usage = "<url or search terms>"]
pub async fn play(ctx: &Context, msg: &Message, args: Args) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let manager = songbird::get(ctx).await.ok_or("songbird not registered")?;
    let Some((guild_id, author_channel)) = locate(ctx, msg) else {
        return Ok(());
    };

    let query = args.rest().trim();
    if query.is_empty() {
        check_msg(msg.reply(ctx, "Tell me what to play").await);
        return Ok(());
    }

    if manager.get(guild_id).is_none() {
        let Some(channel_id) = author_channel else {
            report(ctx, msg, &PlayerError::NotConnected).await;
            return Ok(());
        };
        if let Err(why) = connect(ctx, guild_id, channel_id).await {
            report(ctx, msg, &why).await;
            return Ok(());
        }
    }
    state.announce.insert(guild_id, msg.channel_id);

    let outcome = {
        let _typing = msg.channel_id.start_typing(&ctx.http);
        state.request(guild_id, query).await
    };

    match outcome {
        Ok(PlayOutcome::Started(track)) => check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Now playing: {}", track.title()))
                .await,
        ),
        Ok(PlayOutcome::Queued { title, position }) => check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Queued {} at position {}", title, position))
                .await,
        ),
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Skips the current song"]
pub async fn skip(ctx: &Context, msg: &Message) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    match state.skip(guild_id).await {
        Ok(SkipOutcome::Skipped) => check_msg(msg.channel_id.say(&ctx.http, "Song skipped.").await),
        Ok(SkipOutcome::Resumed(track)) => check_msg(
            msg.channel_id
                .say(&ctx.http, format!("Nothing was playing, resumed: {}", track.title()))
                .await,
        ),
        Ok(SkipOutcome::NothingPlaying) => report(ctx, msg, &PlayerError::EmptyQueue).await,
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Displays the current queue"]
pub async fn queue(ctx: &Context, msg: &Message) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let snapshot = state.sequencer.snapshot(guild_id).await;
    if snapshot.is_empty() {
        report(ctx, msg, &PlayerError::EmptyQueue).await;
        return Ok(());
    }

    check_msg(
        msg.channel_id
            .say(&ctx.http, snapshot.render(QUEUE_DISPLAY_LIMIT))
            .await,
    );
    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Clears the queue, the current song keeps playing"]
pub async fn clear(ctx: &Context, msg: &Message) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    let removed = state.sequencer.clear(guild_id).await;
    info!(%guild_id, removed, "queue cleared");
    check_msg(msg.channel_id.say(&ctx.http, "Queue cleared.").await);
    Ok(())
}
