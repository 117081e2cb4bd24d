use anyhow::Result;
use std::sync::Arc;

use tubealchemy::core::config::Config;
use tubealchemy::core::io::{FileStorage, Storage};
use tubealchemy::services::credentials::CredentialStore;
use tubealchemy::services::generator::Generator;
use tubealchemy::services::llm::create_llm;
use tubealchemy::services::workflow::WorkflowManager;
use tubealchemy::ui::App;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    // 1. Load Config (defaults when config.yml is absent)
    let config = match Config::load() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Error loading config: {}", e);
            eprintln!("Please fix or remove 'config.yml'.");
            return Err(e);
        }
    };

    config.ensure_directories()?;

    // 2. Credential store
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::new(config.credential_file.clone()));
    let credentials = Arc::new(CredentialStore::load(storage).await?);

    // 3. Initialize LLM
    let llm = create_llm(&config)?;
    let generator = Generator::new(llm, credentials).with_source_limit(config.source_limit);

    // 4. Run the interactive workflow
    let manager = WorkflowManager::new(generator);
    App::new(config, manager).run().await
}
