//! Discord gateway client: the join command and voice-state lookup.

use std::sync::Arc;

use async_trait::async_trait;
use serenity::model::channel::Message as DiscordMessage;
use serenity::model::gateway::Ready;
use serenity::model::id::{ChannelId, GuildId};
use serenity::prelude::*;
use songbird::{SerenityInit, Songbird};
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use falabot_core::{FalaError, JoinRequest, PipelineMessage, Result};

/// Prefix match, as typed in chat: `!join`, `!join please`, `!joinnow`.
pub fn is_join_command(content: &str, command: &str) -> bool {
    !command.is_empty() && content.starts_with(command)
}

/// Whether a chat message should trigger a join. The bot's own messages never do.
pub fn should_handle(author_id: u64, bot_id: u64, content: &str, command: &str) -> bool {
    author_id != bot_id && is_join_command(content, command)
}

struct Handler {
    command: String,
    pipeline_tx: mpsc::Sender<PipelineMessage>,
}

impl Handler {
    /// The author's current voice channel in the guild the message came from.
    fn locate_author_voice(ctx: &Context, msg: &DiscordMessage) -> Result<(GuildId, ChannelId)> {
        let guild_id = msg
            .guild_id
            .ok_or_else(|| FalaError::NotFound("message was not sent in a guild".into()))?;
        let guild = ctx
            .cache
            .guild(guild_id)
            .ok_or_else(|| FalaError::NotFound(format!("guild {guild_id} not in cache")))?;
        let channel_id = guild
            .voice_states
            .get(&msg.author.id)
            .and_then(|state| state.channel_id)
            .ok_or_else(|| {
                FalaError::NotFound(format!(
                    "user {} is not in a voice channel of guild {guild_id}",
                    msg.author.id
                ))
            })?;
        Ok((guild_id, channel_id))
    }
}

#[async_trait]
impl EventHandler for Handler {
    async fn message(&self, ctx: Context, msg: DiscordMessage) {
        let bot_id = ctx.cache.current_user().id.get();
        if !should_handle(msg.author.id.get(), bot_id, &msg.content, &self.command) {
            return;
        }

        info!(
            channel_id = %msg.channel_id,
            author = %msg.author.name,
            "Received join command"
        );

        if let Err(e) = msg.channel_id.say(&ctx.http, "Pong!").await {
            warn!(error = ?e, "Error sending acknowledgement");
        }

        let (guild_id, channel_id) = match Self::locate_author_voice(&ctx, &msg) {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "Ignoring join command");
                return;
            }
        };

        let request = JoinRequest {
            guild_id: guild_id.get(),
            channel_id: channel_id.get(),
            requested_by: msg.author.id.get(),
        };
        if self
            .pipeline_tx
            .send(PipelineMessage::Join(request))
            .await
            .is_err()
        {
            error!("Pipeline queue closed; dropping join request");
        }
    }

    async fn ready(&self, _: Context, ready: Ready) {
        info!("{} is connected!", ready.user.name);
    }
}

/// Builds the serenity client with songbird registered.
pub struct DiscordBot {
    token: String,
    command: String,
}

impl DiscordBot {
    pub fn new(token: String, command: String) -> Self {
        Self { token, command }
    }

    /// Construct the gateway client. The returned songbird manager backs the
    /// voice connector.
    pub async fn build(
        &self,
        pipeline_tx: mpsc::Sender<PipelineMessage>,
    ) -> Result<(Client, Arc<Songbird>)> {
        info!(command = %self.command, "Building Discord client");

        let intents = GatewayIntents::GUILDS
            | GatewayIntents::GUILD_MESSAGES
            | GatewayIntents::GUILD_VOICE_STATES
            | GatewayIntents::MESSAGE_CONTENT;

        let songbird = Songbird::serenity();
        let client = Client::builder(&self.token, intents)
            .event_handler(Handler {
                command: self.command.clone(),
                pipeline_tx,
            })
            .register_songbird_with(songbird.clone())
            .await
            .map_err(|e| FalaError::Config(format!("Discord client construction failed: {e}")))?;

        Ok((client, songbird))
    }
}
