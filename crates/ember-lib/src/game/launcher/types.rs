//! Types for the launch boundary.

use std::path::PathBuf;

/// Caller-supplied options for building launch arguments.
#[derive(Debug, Clone)]
pub struct LaunchOptions {
    /// Display name of the player.
    pub player_name: String,

    /// Unique identity token (UUID).
    pub identity_token: String,

    /// Session token used for authentication placeholders.
    pub session_token: String,

    /// Optional window resolution override `(width, height)`.
    pub window_size: Option<(u32, u32)>,
}

/// Everything the process-spawn layer needs to start the game.
#[derive(Debug, Clone)]
pub struct LaunchCommand {
    /// Runtime executable to spawn.
    pub program: PathBuf,

    /// Fully substituted argument vector (JVM args, main class, game args).
    pub args: Vec<String>,

    /// Resolved classpath string, also present inside `args`.
    pub classpath: String,
}
