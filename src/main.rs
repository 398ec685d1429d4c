// Entry point of the comment moderation service.
//
// **Architecture Overview:**
// - `core/` = Business logic (transport-agnostic)
// - `infra/` = Implementations of core traits (SQLite, signature service, files)
// - `rpc/` = JSON method adapters and the request loop
//
// This file's job is to:
// 1. Load configuration
// 2. Open the database and run migrations
// 3. Initialize services (dependency injection)
// 4. Serve requests from stdin until it closes

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "infra/infra_layer.rs"]
mod infra;
#[path = "rpc/rpc_layer.rs"]
mod rpc;

mod config;

use crate::config::{AppConfig, VerifierConfig};
use crate::core::blocklist::BlocklistService;
use crate::core::channels::{ChannelAuthenticator, SignatureVerifier};
use crate::core::delegation::DelegationResolver;
use crate::core::muted_words::MutedWordService;
use crate::core::screening::ScreeningService;
use crate::infra::blocklist::SqliteBlocklistStore;
use crate::infra::channels::SqliteChannelDirectory;
use crate::infra::delegation::SqliteDelegationStore;
use crate::infra::muted_words::SqliteMutedWordStore;
use crate::infra::signature::{AllowAllVerifier, RemoteSignatureVerifier};
use crate::infra::spam::load_spam_registry;
use crate::rpc::Router;
use anyhow::Context;
use std::path::Path;
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().context("Invalid configuration")?;

    // Make sure the directory for a file-backed database exists
    if let Some(dir) = sqlite_parent_dir(&config.database_url) {
        std::fs::create_dir_all(dir).context("Failed to create data directory for SQLite")?;
    }

    let pool = infra::database::connect(&config.database_url)
        .await
        .context("Failed to connect to moderation DB")?;

    // The other stores join against channels, so it goes first
    let directory = SqliteChannelDirectory::new(pool.clone());
    directory.migrate().await?;
    let delegation_store = SqliteDelegationStore::new(pool.clone());
    delegation_store.migrate().await?;
    let blocklist_store = SqliteBlocklistStore::new(pool.clone());
    blocklist_store.migrate().await?;
    let muted_word_store = SqliteMutedWordStore::new(pool);
    muted_word_store.migrate().await?;
    tracing::info!("Database migrations complete");

    let verifier: Arc<dyn SignatureVerifier> = match &config.verifier {
        VerifierConfig::Remote(url) => {
            tracing::info!(url = %url, "Using remote signature verifier");
            Arc::new(RemoteSignatureVerifier::new(url.clone())?)
        }
        VerifierConfig::AllowAll => {
            tracing::warn!("ALLOW_UNSIGNED is set: signatures are NOT checked. Never use this in production!");
            Arc::new(AllowAllVerifier)
        }
    };
    let auth = Arc::new(ChannelAuthenticator::new(Arc::new(directory), verifier));

    let delegation = Arc::new(DelegationResolver::new(delegation_store, auth.clone()));
    delegation
        .seed_global_moderators(&config.global_moderators)
        .await?;

    let blocklists = Arc::new(BlocklistService::new(
        blocklist_store,
        auth.clone(),
        delegation.clone(),
        config.blocklist_defaults.clone(),
    ));
    let muted_words = Arc::new(MutedWordService::new(muted_word_store, auth));

    let spam = load_spam_registry(&config.spam_list_path)?;
    let (comment_spammers, reaction_spammers) = spam.sizes();
    tracing::info!(
        comment_spammers,
        reaction_spammers,
        "Spam registry loaded"
    );
    let screening = Arc::new(ScreeningService::new(
        Arc::new(spam),
        blocklists.clone(),
        muted_words.clone(),
    ));

    let router = Router::new(delegation, blocklists, muted_words, screening);

    tracing::info!(
        methods = rpc::router::METHODS.len(),
        "Moderation service ready, reading requests from stdin"
    );
    let handled = rpc::server::serve(
        &router,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    tracing::info!(handled, "Input closed, shutting down");

    Ok(())
}

/// Parent directory of a file-backed SQLite URL, if there is one to create.
fn sqlite_parent_dir(database_url: &str) -> Option<&Path> {
    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() || path == ":memory:" {
        return None;
    }
    Path::new(path)
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
}
