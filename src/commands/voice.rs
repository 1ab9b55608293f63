use serenity::client::Context;
use serenity::framework::standard::{macros::command, Args, CommandResult};
use serenity::model::{
    channel::Message,
    id::{ChannelId, GuildId},
    prelude::Mentionable,
};
use tracing::{info, warn};

use super::{check_msg, locate, report};
use crate::error::PlayerError;
use crate::state::BotState;

/// Joins `connect_to`, or moves there if already connected elsewhere in the
/// guild.
pub(crate) async fn connect(
    ctx: &Context,
    guild_id: GuildId,
    connect_to: ChannelId,
) -> Result<(), PlayerError> {
    let manager = songbird::get(ctx)
        .await
        .ok_or_else(|| PlayerError::Transport("voice client not initialised".to_string()))?;

    if let Err(why) = manager.join(guild_id, connect_to).await {
        warn!(%guild_id, %connect_to, "failed to join: {}", why);
        return Err(PlayerError::Transport(why.to_string()));
    }

    info!(%guild_id, %connect_to, "joined voice channel");
    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Joins your voice channel, or the voice channel with the given id"]
#[usage = "[channel id]"]
pub async fn join(ctx: &Context, msg: &Message, mut args: Args) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let Some((guild_id, author_channel)) = locate(ctx, msg) else {
        return Ok(());
    };

    let connect_to = if args.is_empty() {
        match author_channel {
            Some(channel_id) => channel_id,
            None => {
                report(ctx, msg, &PlayerError::NotConnected).await;
                return Ok(());
            }
        }
    } else {
        match args.single::<u64>() {
            Ok(id) if id != 0 => ChannelId::new(id),
            _ => {
                check_msg(msg.reply(ctx, "Requires a valid voice channel ID be given").await);
                return Ok(());
            }
        }
    };

    match connect(ctx, guild_id, connect_to).await {
        Ok(()) => {
            state.announce.insert(guild_id, msg.channel_id);
            check_msg(
                msg.channel_id
                    .say(&ctx.http, format!("Joined {}", connect_to.mention()))
                    .await,
            );
        }
        Err(why) => report(ctx, msg, &why).await,
    }

    Ok(())
}

#[command]
#[only_in(guilds)]
#[description = "Stops playback, clears the queue and leaves the voice channel"]
pub async fn stop(ctx: &Context, msg: &Message) -> CommandResult {
    let state = BotState::get(ctx).await.ok_or("bot state missing")?;
    let manager = songbird::get(ctx).await.ok_or("songbird not registered")?;
    let Some(guild_id) = msg.guild_id else {
        return Ok(());
    };

    if let Err(why) = state.sequencer.stop(guild_id).await {
        warn!(%guild_id, "stopping playback failed: {}", why);
    }
    state.announce.remove(&guild_id);

    if manager.get(guild_id).is_none() {
        report(ctx, msg, &PlayerError::NotConnected).await;
        return Ok(());
    }

    match manager.remove(guild_id).await {
        Ok(()) => check_msg(
            msg.channel_id
                .say(&ctx.http, "Bot disconnected and queue cleared.")
                .await,
        ),
        Err(why) => report(ctx, msg, &PlayerError::Transport(why.to_string())).await,
    }

    Ok(())
}
