//! Model listing functionality
//!
//! Lists the models installed on a running server.

use std::error::Error;

use crate::api::models::{fetch_models, format_size};

pub async fn list_models(base_url: &str) -> Result<(), Box<dyn Error>> {
    let client = reqwest::Client::new();
    let models_response = fetch_models(&client, base_url).await.map_err(|err| {
        format!("Could not list models from {base_url}: {err}\nIs the server running? Start it with 'ollama serve'.")
    })?;

    println!("🤖 Models installed at {base_url}");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!();

    if models_response.models.is_empty() {
        println!("No models found. Pull one with: ollama pull llama3");
        return Ok(());
    }

    for model in &models_response.models {
        let size = model.size.map(format_size).unwrap_or_default();
        match &model.modified_at {
            Some(modified) => println!("• {:<40} {:>9}  {}", model.name, size, modified),
            None => println!("• {:<40} {:>9}", model.name, size),
        }
    }

    println!();
    println!("💡 Start a chat with: ollama-cli -m <model>");
    Ok(())
}
