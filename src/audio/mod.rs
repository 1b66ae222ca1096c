//! # Audio Module
//!
//! Per-guild playback orchestration for Open Jukebox.
//!
//! ## Architecture
//!
//! ### [`player`] - Audio Player
//! - Registry of guild sessions, created on first use and never evicted
//! - Public API consumed by the command layer (enqueue, skip, stop, ...)
//!
//! ### [`session`] - Guild Session
//! - Playback state machine (`Idle`, `Playing`, `Paused`)
//! - Continuation loop driven by wake-ups and track-finished callbacks
//! - Loop modes and "now playing" notifications
//!
//! ### [`commands`] - Command Lane
//! - FIFO control commands per guild, drained by one worker at a time
//!
//! ### [`queue`] - Queue Management
//! - Playable items, loop policy and paginated reads
//!
//! ### [`sink`] / [`voice`] - Audio Output
//! - Traits the session drives, and their songbird implementation
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use open_jukebox::audio::{player::AudioPlayer, queue::LoopMode};
//! use serenity::all::{GuildId, UserId};
//!
//! # async fn example(player: &AudioPlayer) -> open_jukebox::error::Result<()> {
//! let guild_id = GuildId::new(123456789);
//!
//! player.enqueue(guild_id, "https://youtu.be/dQw4w9WgXcQ", UserId::new(1)).await?;
//! player.wake_up(guild_id).await;
//!
//! player.set_loop_mode(guild_id, LoopMode::Queue);
//! player.skip(guild_id, 1);
//! # Ok(())
//! # }
//! ```

pub mod commands;
pub mod player;
pub mod queue;
pub mod session;
pub mod sink;
pub mod voice;
