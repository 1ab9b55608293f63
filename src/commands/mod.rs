pub mod playback;
pub mod voice;

use std::collections::HashSet;

use serenity::client::Context;
use serenity::framework::standard::{
    help_commands,
    macros::{group, help, hook},
    Args,
    CommandGroup,
    CommandResult,
    HelpOptions,
};
use serenity::model::{
    channel::Message,
    id::{ChannelId, GuildId, UserId},
};
use serenity::Result as SerenityResult;
use tracing::{debug, error, warn};

use crate::error::PlayerError;

use self::playback::*;
use self::voice::*;

#[group]
#[commands(join, play, skip, stop, queue, clear)]
pub struct Music;

#[help]
pub async fn help(
    ctx: &Context,
    msg: &Message,
    args: Args,
    help_options: &'static HelpOptions,
    groups: &[&'static CommandGroup],
    owners: HashSet<UserId>,
) -> CommandResult {
    let _ = help_commands::plain(ctx, msg, args, help_options, groups, owners).await;
    Ok(())
}

#[hook]
pub async fn after(_ctx: &Context, msg: &Message, command_name: &str, result: CommandResult) {
    match result {
        Ok(()) => debug!(command = command_name, "command finished"),
        Err(why) => error!(
            command = command_name,
            author = %msg.author.name,
            "command returned an error: {:?}",
            why
        ),
    }
}

/// Checks that a message successfully sent; if not, then logs why.
pub fn check_msg(result: SerenityResult<Message>) {
    if let Err(why) = result {
        warn!("Error sending message: {:?}", why);
    }
}

/// Sends a player error back to the channel the command came from.
pub(crate) async fn report(ctx: &Context, msg: &Message, why: &PlayerError) {
    debug!(author = %msg.author.name, "reporting: {}", why);
    check_msg(msg.channel_id.say(&ctx.http, why.to_string()).await);
}

/// The guild a message came from and the voice channel its author sits in.
pub(crate) fn locate(ctx: &Context, msg: &Message) -> Option<(GuildId, Option<ChannelId>)> {
    let guild_id = msg.guild_id?;
    let channel_id = msg.guild(&ctx.cache).and_then(|guild| {
        guild
            .voice_states
            .get(&msg.author.id)
            .and_then(|voice_state| voice_state.channel_id)
    });

    Some((guild_id, channel_id))
}
