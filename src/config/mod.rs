mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{BrokerSettings, LogSettings, ServerSettings, Settings, StoreSettings};

/// Prefix of environment overrides, e.g. `CHATBUS_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "CHATBUS";

/// Loads `config/default.*` (if present) and environment overrides, merged
/// over the built-in defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    load_config_from("config/default")
}

/// Like [`load_config`] but reads the optional config file from `path`
/// (extension resolved by the `config` crate).
pub fn load_config_from(path: &str) -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name(path).required(false))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

    let config = builder.build()?;
    let partial: PartialSettings = config.try_deserialize()?;

    Ok(Settings::merge(partial))
}

#[cfg(test)]
mod tests;
