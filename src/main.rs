//! # Open WebUI CLI (`owui`)
//!
//! Manage folders, chats, and knowledge bases on an Open WebUI server.
//!
//! ## Usage
//!
//! ```bash
//! owui [--url URL] [--api-key KEY] [--output text|json] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `owui folder list\|create\|delete\|list-chats` | Folder management |
//! | `owui chat create\|continue\|list\|list-all\|rename\|delete` | Chats, optionally grounded in knowledge bases |
//! | `owui kb create\|list-kbs\|delete\|list-files` | Knowledge base management |
//! | `owui kb upload-file\|upload-dir\|update-file` | File uploads |
//! | `owui kb delete-file\|delete-all-files` | File removal |
//! | `owui kb query` | Retrieve matching chunks |
//! | `owui completions <shell>` | Print a shell completion script |
//!
//! ## Examples
//!
//! ```bash
//! # Ask a question grounded in two knowledge bases
//! owui chat create "Summarize the release notes" --kb-id kb1 --kb-id kb2 --k 8
//!
//! # Upload a docs tree, honouring docs/.kbignore
//! owui kb upload-dir ./docs --kb-id kb1
//!
//! # Machine-readable output
//! owui --output json folder list
//! ```

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use openwebui::models::{Field, QueryOptions};
use openwebui::output::{Output, OutputFormat};
use openwebui::progress::ProgressMode;
use openwebui::{chat_cmd, folder_cmd, kb_cmd};
use openwebui::{ClientOverrides, NewChat, OpenWebUi, Retrieval};

/// Open WebUI CLI: manage chats, folders, and knowledge bases.
///
/// Server URL and API key come from `--url`/`--api-key`, then
/// `OPENWEBUI_URL`/`OPENWEBUI_API_KEY` (a `.env` file is read too), then
/// `./.owui/config.yaml`, then `~/.owui/config.yaml`.
#[derive(Parser)]
#[command(
    name = "owui",
    about = "Open WebUI CLI: manage chats, folders, and knowledge bases",
    version
)]
struct Cli {
    /// Server base URL. Overrides every other configuration source.
    #[arg(long, global = true)]
    url: Option<String>,

    /// API key. Overrides every other configuration source.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Enable info-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug-level logging.
    #[arg(long, global = true)]
    debug: bool,

    /// Output format for results.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Text)]
    output: OutputFormat,

    /// Progress reporting for batch commands (written to stderr).
    #[arg(long, global = true, value_enum, default_value_t = ProgressMode::Auto)]
    progress: ProgressMode,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage folders.
    Folder {
        #[command(subcommand)]
        action: FolderAction,
    },

    /// Create, continue, and manage chats.
    Chat {
        #[command(subcommand)]
        action: ChatAction,
    },

    /// Manage knowledge bases and their files.
    Kb {
        #[command(subcommand)]
        action: KbAction,
    },

    /// Print a shell completion script to stdout.
    Completions {
        /// Target shell.
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum FolderAction {
    /// List all folders.
    List,
    /// Create a folder.
    Create {
        /// Folder name.
        name: String,
    },
    /// Delete a folder.
    Delete {
        folder_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// List the chats inside a folder.
    ListChats { folder_id: String },
}

#[derive(Subcommand)]
enum ChatAction {
    /// Start a new chat with one prompt.
    ///
    /// With `--kb-id`, the prompt sent to the model is augmented with context
    /// retrieved from those knowledge bases. The stored history keeps only
    /// the prompt as typed.
    Create {
        prompt: String,
        /// Model to answer with.
        #[arg(short, long, default_value = "gemini-1.5-flash")]
        model: String,
        /// Place the new chat in this folder.
        #[arg(long)]
        folder_id: Option<String>,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Send a follow-up prompt in an existing chat.
    Continue {
        chat_id: String,
        prompt: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
    /// Show the message history of a chat.
    List { chat_id: String },
    /// List all chats.
    ListAll,
    /// Change a chat's title.
    Rename { chat_id: String, title: String },
    /// Delete a chat.
    Delete {
        chat_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum KbAction {
    /// Create a knowledge base.
    Create {
        name: String,
        #[arg(long)]
        description: Option<String>,
    },
    /// List knowledge bases.
    ListKbs,
    /// Delete a knowledge base.
    Delete {
        kb_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// List the files in a knowledge base.
    ListFiles { kb_id: String },
    /// Upload one file and add it to a knowledge base.
    UploadFile {
        path: PathBuf,
        #[arg(long)]
        kb_id: String,
    },
    /// Upload a directory tree, honouring `.kbignore`.
    UploadDir {
        dir: PathBuf,
        #[arg(long)]
        kb_id: String,
        /// Ignore file to use instead of `<dir>/.kbignore`.
        #[arg(long)]
        ignore_file: Option<PathBuf>,
    },
    /// Replace a file's content with a local file.
    UpdateFile { file_id: String, path: PathBuf },
    /// Delete one file.
    DeleteFile {
        file_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Delete every file in a knowledge base.
    DeleteAllFiles {
        kb_id: String,
        /// Skip the confirmation prompt.
        #[arg(long)]
        yes: bool,
    },
    /// Retrieve the chunks most relevant to a prompt.
    Query {
        prompt: String,
        #[command(flatten)]
        retrieval: RetrievalArgs,
    },
}

/// Knowledge-base grounding and retrieval tuning.
#[derive(clap::Args, Debug, Clone, Default)]
struct RetrievalArgs {
    /// Knowledge base to retrieve context from (repeatable).
    #[arg(long = "kb-id")]
    kb_ids: Vec<String>,
    /// Number of top hits to retrieve.
    #[arg(long)]
    k: Option<u32>,
    /// Number of hits to re-rank.
    #[arg(long)]
    k_reranker: Option<u32>,
    /// Relevance threshold (0.0 to 1.0).
    #[arg(long)]
    r: Option<f64>,
    /// Use hybrid (vector + BM25) search.
    #[arg(long, overrides_with = "no_hybrid")]
    hybrid: bool,
    /// Disable hybrid search.
    #[arg(long, overrides_with = "hybrid")]
    no_hybrid: bool,
    /// Weight of BM25 in hybrid search (0.0 to 1.0).
    #[arg(long)]
    hybrid_bm25_weight: Option<f64>,
}

impl RetrievalArgs {
    fn query_options(&self) -> QueryOptions {
        let hybrid = match (self.hybrid, self.no_hybrid) {
            (true, _) => Field::Provided(true),
            (_, true) => Field::Provided(false),
            _ => Field::Unset,
        };
        QueryOptions {
            k: self.k.into(),
            k_reranker: self.k_reranker.into(),
            r: self.r.into(),
            hybrid,
            hybrid_bm25_weight: self.hybrid_bm25_weight.into(),
        }
    }

    fn into_retrieval(self) -> Retrieval {
        let options = self.query_options();
        Retrieval::new(self.kb_ids).with_options(options)
    }
}

fn init_tracing(verbose: bool, debug: bool) {
    let default_level = if debug {
        "debug"
    } else if verbose {
        "info"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    // Read before the subscriber is built so RUST_LOG in .env applies.
    // Process variables win over .env entries.
    let dotenv = dotenvy::dotenv();
    init_tracing(cli.verbose, cli.debug);
    if let Err(e) = dotenv {
        if !e.not_found() {
            tracing::warn!(error = %e, "could not read .env file");
        }
    }

    // Commands that don't need a server
    if let Commands::Completions { shell } = &cli.command {
        clap_complete::generate(*shell, &mut Cli::command(), "owui", &mut std::io::stdout());
        return Ok(());
    }

    let overrides = ClientOverrides {
        url: cli.url.clone(),
        api_key: cli.api_key.clone(),
    };
    let client = OpenWebUi::connect(&overrides)?;
    let out = Output::new(cli.output);
    let progress = match cli.output {
        OutputFormat::Json if cli.progress == ProgressMode::Auto => ProgressMode::Off,
        _ => cli.progress,
    };

    match cli.command {
        Commands::Folder { action } => match action {
            FolderAction::List => folder_cmd::run_list(&client, out).await?,
            FolderAction::Create { name } => folder_cmd::run_create(&client, out, &name).await?,
            FolderAction::Delete { folder_id, yes } => {
                folder_cmd::run_delete(&client, out, &folder_id, yes).await?
            }
            FolderAction::ListChats { folder_id } => {
                folder_cmd::run_list_chats(&client, out, &folder_id).await?
            }
        },
        Commands::Chat { action } => match action {
            ChatAction::Create {
                prompt,
                model,
                folder_id,
                retrieval,
            } => {
                let mut request =
                    NewChat::new(model, prompt).with_retrieval(retrieval.into_retrieval());
                request.folder_id = folder_id;
                chat_cmd::run_create(&client, out, request).await?
            }
            ChatAction::Continue {
                chat_id,
                prompt,
                retrieval,
            } => {
                let retrieval = retrieval.into_retrieval();
                chat_cmd::run_continue(&client, out, &chat_id, &prompt, &retrieval).await?
            }
            ChatAction::List { chat_id } => chat_cmd::run_messages(&client, out, &chat_id).await?,
            ChatAction::ListAll => chat_cmd::run_list_all(&client, out).await?,
            ChatAction::Rename { chat_id, title } => {
                chat_cmd::run_rename(&client, out, &chat_id, &title).await?
            }
            ChatAction::Delete { chat_id, yes } => {
                chat_cmd::run_delete(&client, out, &chat_id, yes).await?
            }
        },
        Commands::Kb { action } => match action {
            KbAction::Create { name, description } => {
                kb_cmd::run_create(&client, out, &name, description.as_deref()).await?
            }
            KbAction::ListKbs => kb_cmd::run_list(&client, out).await?,
            KbAction::Delete { kb_id, yes } => kb_cmd::run_delete(&client, out, &kb_id, yes).await?,
            KbAction::ListFiles { kb_id } => kb_cmd::run_list_files(&client, out, &kb_id).await?,
            KbAction::UploadFile { path, kb_id } => {
                kb_cmd::run_upload_file(&client, out, &kb_id, &path).await?
            }
            KbAction::UploadDir {
                dir,
                kb_id,
                ignore_file,
            } => {
                kb_cmd::run_upload_dir(
                    &client,
                    out,
                    &kb_id,
                    &dir,
                    ignore_file.as_deref(),
                    progress,
                )
                .await?
            }
            KbAction::UpdateFile { file_id, path } => {
                kb_cmd::run_update_file(&client, out, &file_id, &path).await?
            }
            KbAction::DeleteFile { file_id, yes } => {
                kb_cmd::run_delete_file(&client, out, &file_id, yes).await?
            }
            KbAction::DeleteAllFiles { kb_id, yes } => {
                kb_cmd::run_delete_all_files(&client, out, &kb_id, yes, progress).await?
            }
            KbAction::Query { prompt, retrieval } => {
                let options = retrieval.query_options();
                kb_cmd::run_query(&client, out, &prompt, &retrieval.kb_ids, &options).await?
            }
        },
        Commands::Completions { .. } => {
            // Handled above (before connecting)
        }
    }

    Ok(())
}
