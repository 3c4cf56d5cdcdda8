#![forbid(unsafe_code)]
#![deny(unreachable_pub)]

//! Reads the relayer's JSON configuration file, resolves `${VAR}`/`${VAR:default}` environment
//! placeholders (plus the special `${PRIVATE_KEY}` handling), and validates the result.

pub mod env_subst;
mod loader;
mod types;

pub use loader::{load_config, validate};
pub use types::{DatabaseConfig, LoggingConfig, ProofApiConfig, RelayerConfig};
