//! Configuration file schema and loading.

mod schema;

pub use schema::{
    BackendConfig, CannedConfig, Config, GeminiConfig, ProviderKind, SessionsConfig,
    TelegramConfig,
};
