use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};

use block_editor::assets::store::AssetStore;
use block_editor::db::repository::{BlockRepository, CommitMode, RemoteBlockRepository};
use block_editor::db::tags::TagVocabulary;
use block_editor::models::block::{BlockInput, Visibility};
use block_editor::query::{BlockQuery, SortOrder};
use block_editor::settings::StoreConfig;
use block_editor::storage::client::BlobStore;
use block_editor::storage::github::GitHubBlobStore;

/// Edit the guide blocks stored in a GitHub repository.
#[derive(Debug, Parser)]
#[command(name = "block-editor", version)]
struct Cli {
    /// TOML file with store settings; `GITHUB_*` environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Commit without checking the document revision (last writer wins).
    #[arg(long, global = true)]
    unchecked: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum SortArg {
    Newest,
    Oldest,
    Title,
}

impl From<SortArg> for SortOrder {
    fn from(arg: SortArg) -> Self {
        match arg {
            SortArg::Newest => SortOrder::Newest,
            SortArg::Oldest => SortOrder::Oldest,
            SortArg::Title => SortOrder::Title,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print blocks, optionally filtered.
    List {
        #[arg(long, default_value = "")]
        search: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        hidden_only: bool,
        #[arg(long, value_enum, default_value = "newest")]
        sort: SortArg,
    },
    /// Print the tag vocabulary.
    Tags,
    /// Create or update a block from a JSON editor submission.
    Upsert {
        #[arg(long)]
        file: PathBuf,
    },
    /// Delete a block.
    Delete { id: String },
    /// Hide a block.
    Hide { id: String },
    /// Show a block.
    Show { id: String },
    /// Flip a block between shown and hidden.
    Toggle { id: String },
    /// Upload a binary asset and print its path and public URL.
    Upload {
        file: PathBuf,
        /// Name to derive the store path from (defaults to the file name).
        #[arg(long)]
        name: Option<String>,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "block_editor=info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config = StoreConfig::load(cli.config.as_deref())?;
    let store: Arc<dyn BlobStore> = Arc::new(GitHubBlobStore::new(&config)?);

    let mode = if cli.unchecked || !config.revision_check {
        CommitMode::Unconditional
    } else {
        CommitMode::RevisionChecked
    };
    let repo = RemoteBlockRepository::new(store.clone(), config.document_path.clone())
        .with_mode(mode);

    tracing::debug!(
        owner = %config.owner,
        repo = %config.repo,
        branch = %config.branch,
        mode = ?mode,
        "store configured"
    );

    match cli.command {
        Command::List {
            search,
            tags,
            hidden_only,
            sort,
        } => {
            let blocks = repo.list().await?;
            let query = BlockQuery {
                search,
                tags,
                hidden_only,
            };
            print_json(&query.apply(&blocks, sort.into()))?;
        }
        Command::Tags => {
            let vocabulary = TagVocabulary::load(store.as_ref(), &config.tags_path).await?;
            print_json(&vocabulary.tags())?;
        }
        Command::Upsert { file } => {
            let raw = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let input: BlockInput = serde_json::from_str(&raw)
                .with_context(|| format!("Invalid block input in {}", file.display()))?;

            let vocabulary = TagVocabulary::load(store.as_ref(), &config.tags_path).await?;
            let unknown = vocabulary.unknown(&input.tags);
            if !vocabulary.tags().is_empty() && !unknown.is_empty() {
                tracing::warn!(?unknown, "tags not in vocabulary");
            }

            print_json(&repo.upsert(input).await?)?;
        }
        Command::Delete { id } => print_json(&repo.delete(&id).await?)?,
        Command::Hide { id } => print_json(&repo.set_visibility(&id, Visibility::Hide).await?)?,
        Command::Show { id } => print_json(&repo.set_visibility(&id, Visibility::Show).await?)?,
        Command::Toggle { id } => print_json(&repo.toggle_visibility(&id).await?)?,
        Command::Upload { file, name } => {
            let bytes = tokio::fs::read(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;
            let name = match name {
                Some(name) => name,
                None => file
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .context("Upload path has no file name")?,
            };

            let assets = AssetStore::new(store.clone(), config.clone());
            let path = assets.store(&bytes, &name).await?;
            print_json(&serde_json::json!({
                "path": path,
                "url": assets.public_url(&path),
            }))?;
        }
    }

    Ok(())
}
