//! Configuration module for the GNU Global navigation server.
//!
//! Settings are resolved per file resource from a layered store:
//! - Default values
//! - User configuration file (`<config dir>/globalnav/settings.toml`)
//! - Workspace configuration file (nearest `.globalnav/settings.toml` above the resource)
//! - Settings pushed by the editor over LSP
//! - Environment variable overrides
//!
//! Nothing is cached: every read rebuilds the layers, so edits to any of
//! them are seen by the next request.
//!
//! # Environment Variables
//!
//! Environment variables must be prefixed with `GLOBALNAV_` and use double
//! underscores to separate nested levels:
//! - `GLOBALNAV_GLOBAL__EXECUTABLE=/opt/gtags/bin/global` sets `global.executable`
//! - `GLOBALNAV_GLOBAL__COMPLETION=Disabled` sets `global.completion`
//! - `GLOBALNAV_LOG_LEVEL=debug` sets `log_level`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::ConfigError;

/// Directory holding workspace settings
pub const WORKSPACE_CONFIG_DIR: &str = ".globalnav";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Tracing filter directive (e.g. "info", "globalnav=debug")
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// GNU Global settings
    #[serde(default)]
    pub global: GlobalConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct GlobalConfig {
    /// Name or path of the `global` executable
    #[serde(default = "default_executable")]
    pub executable: String,

    /// Whether the tag files should follow saved edits
    #[serde(default)]
    pub auto_update: AutoUpdate,

    /// Completion mode, kept raw and validated on read
    #[serde(default = "default_completion")]
    pub completion: String,
}

/// Tri-state auto-update preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum AutoUpdate {
    Enabled,
    Disabled,
    #[default]
    Default,
}

/// Two-state completion preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum CompletionMode {
    #[default]
    Enabled,
    Disabled,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_executable() -> String {
    "global".to_string()
}
fn default_completion() -> String {
    "Enabled".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            log_level: default_log_level(),
            global: GlobalConfig::default(),
        }
    }
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            auto_update: AutoUpdate::Default,
            completion: default_completion(),
        }
    }
}

impl CompletionMode {
    /// Map a stored value onto the two recognized modes.
    ///
    /// Anything other than `"Enabled"` or `"Disabled"` falls back to `Enabled`.
    pub fn from_stored(value: &str) -> Self {
        match value {
            "Enabled" => CompletionMode::Enabled,
            "Disabled" => CompletionMode::Disabled,
            other => {
                tracing::debug!(value = other, "Unrecognized completion mode, using Enabled");
                CompletionMode::Enabled
            }
        }
    }
}

impl Settings {
    /// Create a workspace settings file with helpful comments
    pub fn init_config_file(dir: impl AsRef<Path>, force: bool) -> Result<PathBuf, ConfigError> {
        let config_path = dir
            .as_ref()
            .join(WORKSPACE_CONFIG_DIR)
            .join("settings.toml");
        let write_error = |reason: String| ConfigError::Write {
            path: config_path.clone(),
            reason,
        };

        if !force && config_path.exists() {
            return Err(write_error(
                "configuration file already exists, use --force to overwrite".to_string(),
            ));
        }
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }

        let template = r#"# globalnav configuration file

# Version of the configuration schema
version = 1

# Tracing filter for the server log (written to stderr)
log_level = "info"

[global]
# Name or full path of the GNU Global `global` executable
executable = "global"

# Follow saved edits in the tag files: "Enabled", "Disabled" or "Default"
auto_update = "Default"

# Offer `global -c` completions: "Enabled" or "Disabled"
completion = "Enabled"
"#;

        std::fs::write(&config_path, template).map_err(|e| write_error(e.to_string()))?;
        Ok(config_path)
    }
}

/// Layered, read-through configuration store.
///
/// Cloning is cheap; clones share the settings pushed by the editor.
#[derive(Debug, Clone, Default)]
pub struct ConfigStore {
    user_config: Option<PathBuf>,
    client_settings: Arc<RwLock<serde_json::Value>>,
}

impl ConfigStore {
    /// Store backed by the user's configuration directory
    pub fn new() -> Self {
        let user_config = dirs::config_dir()
            .map(|dir| dir.join("globalnav").join("settings.toml"));
        Self::with_user_config(user_config)
    }

    /// Store with an explicit user configuration file (or none)
    pub fn with_user_config(user_config: Option<PathBuf>) -> Self {
        Self {
            user_config,
            client_settings: Arc::new(RwLock::new(serde_json::Value::Null)),
        }
    }

    /// Replace the settings pushed by the editor.
    ///
    /// Accepts either the bare settings object or one nested under a
    /// `globalnav` key, as editors commonly send a section per server.
    pub fn set_client_settings(&self, settings: serde_json::Value) {
        let settings = match settings {
            serde_json::Value::Object(mut map) if map.contains_key("globalnav") => {
                map.remove("globalnav").unwrap_or_default()
            }
            other => other,
        };
        *self.client_settings.write() = settings;
    }

    /// Build the layered figment for a resource (`None` = window scope)
    pub fn figment(&self, resource: Option<&Path>) -> Figment {
        let mut figment = Figment::new().merge(Serialized::defaults(Settings::default()));

        if let Some(user_config) = &self.user_config {
            figment = figment.merge(Toml::file(user_config));
        }
        if let Some(workspace_config) = resource.and_then(find_workspace_config) {
            figment = figment.merge(Toml::file(workspace_config));
        }

        let client = self.client_settings.read().clone();
        if client.is_object() {
            figment = figment.merge(Serialized::defaults(client));
        }

        figment.merge(env_provider())
    }

    /// Read a dotted key, falling back to `default` when it is missing or
    /// does not deserialize
    pub fn get<T: DeserializeOwned>(&self, key: &str, resource: Option<&Path>, default: T) -> T {
        match self.figment(resource).extract_inner::<T>(key) {
            Ok(value) => value,
            Err(e) => {
                if !e.missing() {
                    tracing::debug!(key, error = %e, "Ignoring unreadable setting");
                }
                default
            }
        }
    }

    /// Extract the complete settings for a resource
    pub fn load(&self, resource: Option<&Path>) -> Result<Settings, ConfigError> {
        self.figment(resource)
            .extract()
            .map_err(|e| ConfigError::Extract(Box::new(e)))
    }
}

/// No-argument callback that re-applies a session-wide setting
pub type WindowScopeSetter = Box<dyn FnMut() -> anyhow::Result<()> + Send>;

/// Settings accessor: resource-scoped getters plus the window-scope setters.
pub struct GlobalConfiguration {
    store: ConfigStore,
    window_scope_setters: Vec<WindowScopeSetter>,
}

impl GlobalConfiguration {
    pub fn new(store: ConfigStore) -> Self {
        Self {
            store,
            window_scope_setters: Vec::new(),
        }
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    /// Register a setter run by every
    /// [`apply_window_scope_configs`](Self::apply_window_scope_configs) sweep
    pub fn register_window_scope_setter<F>(&mut self, setter: F)
    where
        F: FnMut() -> anyhow::Result<()> + Send + 'static,
    {
        self.window_scope_setters.push(Box::new(setter));
    }

    /// Run every registered setter in registration order.
    ///
    /// A setter that returns an error or panics is logged and the remaining
    /// ones still run.
    pub fn apply_window_scope_configs(&mut self) {
        for (index, set) in self.window_scope_setters.iter_mut().enumerate() {
            match panic::catch_unwind(AssertUnwindSafe(|| set())) {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    tracing::error!(setter = index, error = %e, "Window scope setter failed");
                }
                Err(payload) => {
                    tracing::error!(
                        setter = index,
                        panic = panic_message(payload.as_ref()),
                        "Window scope setter panicked"
                    );
                }
            }
        }
    }

    /* resource scope configurations */

    pub fn auto_update_mode(&self, path: &Path) -> AutoUpdate {
        self.store
            .get("global.auto_update", Some(path), AutoUpdate::Default)
    }

    pub fn completion_mode(&self, path: &Path) -> CompletionMode {
        let stored: String = self
            .store
            .get("global.completion", Some(path), default_completion());
        CompletionMode::from_stored(&stored)
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

/// `GLOBALNAV_` environment overrides, `__` separating nested levels
fn env_provider() -> Env {
    Env::prefixed("GLOBALNAV_").map(|key| {
        key.as_str()
            .to_lowercase()
            .replace("__", ".") // Double underscore becomes dot
            .into()
    })
}

/// Find the nearest workspace settings file above a resource
fn find_workspace_config(resource: &Path) -> Option<PathBuf> {
    let start = if resource.is_dir() {
        resource
    } else {
        resource.parent()?
    };

    start.ancestors().find_map(|ancestor| {
        let config = ancestor.join(WORKSPACE_CONFIG_DIR).join("settings.toml");
        config.is_file().then_some(config)
    })
}
