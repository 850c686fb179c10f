use design_irl::{
    logger, AppState, Completion, Config, DesignError, Pathway, Services, Workflow,
};
use std::env;

const OUTPUT_FILE: &str = "design-irl-creation.jpeg";
const DEFAULT_ROOM: &str = "cozy reading nook with a large window";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let dotenv_loaded = dotenv::dotenv().is_ok();

    logger::init()?;
    logger::log_startup_info(env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));

    if dotenv_loaded {
        log::info!("✅ .env file loaded successfully");
    } else {
        log::warn!("⚠️  No .env file found, using system environment variables");
    }

    let mut args = env::args().skip(1);
    let config = Config::from_env();
    let query = args.next().unwrap_or_else(|| config.default_query.clone());
    let room = args.next().unwrap_or_else(|| DEFAULT_ROOM.to_string());

    logger::log_config_info(&config);

    let (search_key, gemini_key) = match (&config.search.api_key, &config.gemini.api_key) {
        (Some(search), Some(gemini)) => (search.clone(), gemini.clone()),
        _ => {
            log::error!("❌ Set SCRAPE_CREATORS_API_KEY and GEMINI_API_KEY to run the journey");
            return Err(DesignError::CredentialMissing(
                "SCRAPE_CREATORS_API_KEY and GEMINI_API_KEY are required".into(),
            )
            .into());
        }
    };

    let services = Services::live(&config)?;
    let workflow = Workflow::new(services, &config)?;

    workflow.proceed().await?;
    workflow.submit_credentials(&search_key, &gemini_key).await?;
    workflow.choose_pathway(Pathway::Generate).await?;

    log::info!("🔎 Searching Pinterest for {:?}", query);
    workflow.set_search_query(query).await?;
    if let Err(e) = workflow.search().await {
        log::error!("❌ Search failed: {}", e);
        if workflow.state().await == AppState::CredentialEntry {
            log::warn!("💡 The Scrape Creators key was rejected");
        }
        return Err(e.into());
    }

    let view = workflow.view().await;
    if view.results.is_empty() {
        log::warn!("⚠️  {}", view.error.unwrap_or_default());
        return Ok(());
    }
    log::info!("📌 Found {} pins", view.results.len());

    for record in view.results.iter().take(view.selection_bound) {
        log::info!("   ➕ {} {}", record.id, record.title);
        workflow.toggle_selection(record).await?;
    }

    log::info!("🧠 Analyzing taste...");
    workflow.analyze_taste().await?;
    if let Some(profile) = workflow.view().await.profile {
        log::info!("🎨 Colors: {}", profile.colors.join(", "));
        log::info!("🪵 Textures: {}", profile.textures.join(", "));
        log::info!("🌙 Moods: {}", profile.moods.join(", "));
    }

    log::info!("🏗️  Generating a {}...", room);
    workflow.set_room_description(room).await?;
    match workflow.generate_room().await? {
        Completion::Applied => {}
        Completion::Superseded => {
            log::warn!("⚠️  Generation was superseded");
            return Ok(());
        }
    }

    match workflow.view().await.artifact {
        Some(image) => {
            image.save(OUTPUT_FILE)?;
            log::info!("✅ Saved {} ({} bytes)", OUTPUT_FILE, image.len());
        }
        None => log::warn!("⚠️  No image was produced"),
    }

    log::info!("🎉 Done!");
    Ok(())
}
