pub mod ini;
pub mod item;
pub mod schema;
pub mod watcher;

pub use item::{
    Button, EventKind, InteractionKind, Item, ItemCommand, ItemSlot, MetaAction, Modifiers,
    ScrollDirection, Spacer,
};
pub use schema::{
    choose_config, Bar, BarConfig, ConfigBuilder, Configuration, Corners, GlobalSettings,
    HiddenMode, IndicatorStyle, LayerKind, ResolutionCondition, Sides,
};
pub use watcher::ConfigWatcher;

use lava_core::{LavaError, Result};
use std::path::{Path, PathBuf};

/// Load and validate a configuration file.
pub fn load(path: impl AsRef<Path>) -> Result<Configuration> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path)
        .map_err(|e| LavaError::Config(format!("cannot read '{}': {e}", path.display())))?;

    let mut builder = ConfigBuilder::new();
    let result = ini::scan(&raw, &mut builder)
        .and_then(|()| builder.finalize(raw.lines().count().max(1)));

    result.map_err(|e| match e {
        // Prefix scanner/builder diagnostics with the file path.
        LavaError::Config(msg) => LavaError::Config(format!("{}: {msg}", path.display())),
        other => other,
    })
}

/// Search the documented locations and return the first config file that
/// exists.
#[must_use]
pub fn default_path() -> Option<PathBuf> {
    let mut candidates = vec![PathBuf::from("./lavalauncher.conf")];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        candidates.push(PathBuf::from(xdg).join("lavalauncher/lavalauncher.conf"));
    }
    if let Ok(home) = std::env::var("HOME") {
        candidates.push(PathBuf::from(home).join(".config/lavalauncher/lavalauncher.conf"));
    }
    candidates.push(PathBuf::from("/usr/local/etc/lavalauncher/lavalauncher.conf"));
    candidates.push(PathBuf::from("/etc/lavalauncher/lavalauncher.conf"));

    candidates.into_iter().find(|p| p.exists())
}
