pub mod discord;
pub mod discord_voice;

pub use discord::{is_join_command, should_handle, DiscordBot};
pub use discord_voice::{SongbirdConnector, SongbirdSink};
