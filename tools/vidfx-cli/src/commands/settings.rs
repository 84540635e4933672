//! Inspect or edit the saved settings.

use vidfx_common::config::AppConfig;
use vidfx_settings::{Settings, SettingsStore};

use crate::SettingsArgs;

fn store(config: &AppConfig) -> SettingsStore {
    SettingsStore::new(&config.storage.settings_path)
}

fn print(settings: &Settings) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(settings)?);
    Ok(())
}

pub fn show(config: &AppConfig) -> anyhow::Result<()> {
    let store = store(config);
    println!("# {}", store.path().display());
    print(&store.load())
}

pub fn reset(config: &AppConfig) -> anyhow::Result<()> {
    let store = store(config);
    store.clear()?;
    println!("Settings reset to defaults");
    print(&Settings::default())
}

pub fn set(config: &AppConfig, args: &SettingsArgs) -> anyhow::Result<()> {
    let store = store(config);
    let settings = args.apply(store.load());
    store.save(&settings)?;
    print(&settings)
}
