use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(name = "relayer", version, about = "Cross-chain event relayer")]
pub struct Cli {
    /// Path to the relayer's JSON configuration file.
    #[arg(long, env = "CONFIG_PATH", default_value = "./config/relayer.config.json")]
    pub config_path: PathBuf,

    /// Overrides the embedded database's file path; falls back to the config file's
    /// `database.path` when not set.
    #[arg(long, env = "DATABASE_PATH")]
    pub database_path: Option<String>,

    /// Overrides the config file's `logging.level`.
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Overrides the config file's `logging.enableFileLogging`.
    #[arg(long, env = "ENABLE_FILE_LOGGING")]
    pub enable_file_logging: bool,

    /// Overrides the config file's `logging.logPath`.
    #[arg(long, env = "LOG_PATH")]
    pub log_path: Option<String>,

    /// Deletes the database file on a clean shutdown. Intended for ephemeral test runs.
    #[arg(long, env = "CLEAR_DB_ON_EXIT", default_value_t = false)]
    pub clear_db_on_exit: bool,

    /// How long to await in-flight listener/queue work after a shutdown signal before forcing
    /// termination.
    #[arg(long, env = "DRAIN_DEADLINE_SECS", default_value_t = 30)]
    pub drain_deadline_secs: u64,
}
