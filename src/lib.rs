//! # Open WebUI SDK
//!
//! An async client for the Open WebUI REST API covering folders, chats, and
//! knowledge bases, plus the `owui` command-line tool built on it.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────┐   ┌──────────────────────┐   ┌───────────┐   ┌───────────┐
//! │ CLI (owui)│──▶│ Folders/Chats/       │──▶│ Transport │──▶│ Normalize │
//! │ or caller │   │ Knowledge facade     │   │ (reqwest) │   │ outcome   │
//! └───────────┘   └──────────┬───────────┘   └───────────┘   └───────────┘
//!                            │
//!              ┌─────────────┴─────────────┐
//!              ▼                           ▼
//!        ┌──────────┐               ┌─────────────┐
//!        │   rag    │               │  kbignore   │
//!        │ assemble │               │ path filter │
//!        └──────────┘               └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! export OPENWEBUI_URL=https://chat.example.com
//! export OPENWEBUI_API_KEY=sk-...
//! owui folder list
//! owui kb upload-dir ./docs --kb-id <KB_ID>
//! owui chat create "What changed in v2?" --kb-id <KB_ID>
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Layered configuration resolution |
//! | [`error`] | Error taxonomy |
//! | [`transport`] | Transport trait and HTTP implementation |
//! | [`normalize`] | Response normalization |
//! | [`models`] | Wire types and the tri-state [`Field`] |
//! | [`kbignore`] | `.kbignore` path filtering |
//! | [`rag`] | Retrieval-augmented prompt assembly |
//! | [`folders`], [`chats`], [`knowledge`] | Operation groups |
//! | [`client`] | The [`OpenWebUi`] facade |
//! | [`progress`] | Batch progress reporting |
//! | [`output`] | CLI rendering |
//! | [`folder_cmd`], [`chat_cmd`], [`kb_cmd`] | CLI command handlers |

pub mod chat_cmd;
pub mod chats;
pub mod client;
pub mod config;
pub mod error;
pub mod folder_cmd;
pub mod folders;
pub mod kb_cmd;
pub mod kbignore;
pub mod knowledge;
pub mod models;
pub mod normalize;
pub mod output;
pub mod progress;
pub mod rag;
pub mod transport;

pub use chats::{NewChat, Retrieval};
pub use client::OpenWebUi;
pub use config::{ClientOptions, ClientOverrides, EffectiveConfig};
pub use error::{Error, Result};
pub use models::Field;
pub use normalize::{ApiOutcome, FailureKind, Payload};
