//! arclab - completion ledger maintenance entry point.
//!
//! Subcommands:
//!   summary            Print completion progress (default)
//!   export             Write a dated JSON export of all records
//!   import <file>      Validate a local task file and report its shape
//!   set-user <name>    Set the user new attempts are attributed to

use std::path::Path;

use arclab::completion::CompletionStore;
use arclab::config::Config;
use arclab::export::export_completions;
use arclab::loader::import_file;
use arclab::session::SessionManager;
use arclab::storage::create_kv_store;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "arclab=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let store = create_kv_store(config.store_type, &config.data_dir).await?;
    let completions = CompletionStore::new(store);

    if let Some(user) = &config.user {
        completions.set_current_user(user).await?;
    }
    let migrated = completions.import_legacy_aggregate().await?;
    if migrated > 0 {
        info!("Migrated {} records from the legacy aggregate", migrated);
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        None | Some("summary") => print_summary(&completions).await?,
        Some("export") => {
            let path = export_completions(&completions, &config.export_dir).await?;
            println!("Wrote {}", path.display());
        }
        Some("import") => {
            let path = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: arclab import <task.json>"))?;
            import_preview(Path::new(path)).await?;
        }
        Some("set-user") => {
            let name = args
                .get(1)
                .ok_or_else(|| anyhow::anyhow!("usage: arclab set-user <name>"))?;
            completions.set_current_user(name).await?;
            println!("Current user is now {}", name);
        }
        Some(other) => anyhow::bail!(
            "unknown command '{}'; expected summary, export, import, or set-user",
            other
        ),
    }

    Ok(())
}

async fn print_summary(completions: &CompletionStore) -> anyhow::Result<()> {
    let all = completions.list_all_completions().await?;
    let user = completions.current_user().await?;

    println!("Current user: {}", user);
    println!("Completed tasks: {}", all.len());
    for (task_id, record) in &all {
        let best = record
            .time
            .map(|t| format!("{:.1}s", t))
            .unwrap_or_else(|| "-".to_string());
        let owner = record.user.as_deref().unwrap_or("-");
        println!(
            "  {}  best {} by {} ({} attempts)",
            task_id,
            best,
            owner,
            record.entries.len()
        );
    }
    Ok(())
}

async fn import_preview(path: &Path) -> anyhow::Result<()> {
    let loaded = import_file(path).await?;
    let name = loaded.task.name.clone();
    let train = loaded.task.train.len();
    let test = loaded.task.test.len();
    let storage_id = loaded.reference.storage_id();

    let mut session = SessionManager::new();
    session.load_task(loaded.task, loaded.context);

    println!("Task '{}': {} training examples, {} test pairs", name, train, test);
    if let Some(output) = session.output() {
        println!(
            "Editable output starts at {}x{} (all zero)",
            output.height(),
            output.width()
        );
    }
    println!("Completion record key: arc-task-{}", storage_id);
    Ok(())
}
