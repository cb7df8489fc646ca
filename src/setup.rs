//! Interactive first-run setup
//!
//! Walks through the transport and LLM settings and writes
//! `config.toml` to the default config location.

use std::io::Write;

use dialoguer::{Confirm, Input, Select};

use crate::config::default_config_path;

/// Run the interactive setup wizard
///
/// # Errors
///
/// Returns error if a prompt fails or the config file cannot be written
pub fn run_setup() -> anyhow::Result<()> {
    println!("MeshBot setup\n");

    let kinds = ["tcp (companion bridge)", "mock (no radio, development)"];
    let kind_index = Select::new()
        .with_prompt("How is the radio connected?")
        .items(&kinds)
        .default(0)
        .interact()?;
    let kind = if kind_index == 0 { "tcp" } else { "mock" };

    let mut transport_lines = format!("[transport]\nkind = \"{kind}\"\n");

    if kind == "tcp" {
        let host: String = Input::new()
            .with_prompt("Bridge host")
            .default("127.0.0.1".to_string())
            .interact_text()?;
        let port: u16 = Input::new()
            .with_prompt("Bridge port")
            .default(12345)
            .interact_text()?;
        transport_lines.push_str(&format!("host = \"{host}\"\nport = {port}\n"));
    }

    let node_name: String = Input::new()
        .with_prompt("Node name to advertise")
        .default("MeshBot".to_string())
        .interact_text()?;
    transport_lines.push_str(&format!("node_name = \"{node_name}\"\n"));

    let model: String = Input::new()
        .with_prompt("LLM model")
        .default("gpt-4o-mini".to_string())
        .interact_text()?;

    let base_url: String = Input::new()
        .with_prompt("LLM base URL (empty for OpenAI)")
        .allow_empty(true)
        .default(String::new())
        .interact_text()?;

    let api_key: String = Input::new()
        .with_prompt("LLM API key (empty to use the LLM_API_KEY env var)")
        .allow_empty(true)
        .default(String::new())
        .interact_text()?;

    let mut llm_lines = format!("[llm]\nmodel = \"{model}\"\n");
    if !base_url.is_empty() {
        llm_lines.push_str(&format!("base_url = \"{base_url}\"\n"));
    }
    if !api_key.is_empty() {
        llm_lines.push_str(&format!("api_key = \"{api_key}\"\n"));
    }

    let listen_channel: u8 = Input::new()
        .with_prompt("Channel to listen on for mentions")
        .default(0)
        .interact_text()?;
    let max_message_length: usize = Input::new()
        .with_prompt("Max characters per mesh message")
        .default(120)
        .interact_text()?;
    let inter_chunk_delay: f64 = Input::new()
        .with_prompt("Seconds between transmissions (duty cycle)")
        .default(5.0)
        .interact_text()?;

    let relay_lines = format!(
        "[relay]\nlisten_channel = {listen_channel}\n\
         max_message_length = {max_message_length}\n\
         inter_chunk_delay_secs = {inter_chunk_delay}\n"
    );

    let mut weather_lines = String::new();
    if Confirm::new()
        .with_prompt("Configure weather tool coordinates?")
        .default(false)
        .interact()?
    {
        let latitude: f64 = Input::new().with_prompt("Latitude").interact_text()?;
        let longitude: f64 = Input::new().with_prompt("Longitude").interact_text()?;
        weather_lines = format!("[weather]\nlatitude = {latitude}\nlongitude = {longitude}\n");
    }

    let contents = [transport_lines, llm_lines, relay_lines, weather_lines]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    // Round-trip through the parser so a typo never lands on disk
    toml::from_str::<crate::config::file::ConfigFile>(&contents)
        .map_err(|e| anyhow::anyhow!("generated config failed to parse: {e}"))?;

    let path = default_config_path()
        .ok_or_else(|| anyhow::anyhow!("could not determine config directory"))?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut file = std::fs::File::create(&path)?;
    file.write_all(contents.as_bytes())?;

    println!("\nWrote {}", path.display());
    println!("Start the relay with: meshbot");
    Ok(())
}
