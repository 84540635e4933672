//! Ask the assistant for settings.

use vidfx_assistant::{suggest, ChatCompletionsProvider};
use vidfx_common::config::AppConfig;
use vidfx_settings::SettingsStore;

pub async fn run(config: &AppConfig, text: String, apply: bool) -> anyhow::Result<()> {
    let provider = ChatCompletionsProvider::from_config(&config.assistant)?;
    println!("Asking {} ({})...", provider.model(), provider.endpoint());

    let suggestion = suggest(&provider, &text).await?;
    if let Some(warning) = &suggestion.warning {
        println!("[WARN] {warning}");
    }
    if !suggestion.clamped.is_empty() {
        println!("[INFO] Clamped into range: {}", suggestion.clamped.join(", "));
    }
    println!("{}", serde_json::to_string_pretty(&suggestion.settings)?);

    if apply {
        let store = SettingsStore::new(&config.storage.settings_path);
        store.save(&suggestion.settings)?;
        println!("Applied to {}", store.path().display());
    }
    Ok(())
}
