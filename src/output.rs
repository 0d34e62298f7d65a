//! CLI rendering: text tables for humans, pretty JSON for scripts.
//!
//! Results go to stdout; prompts and progress go to stderr.

use anyhow::Result;
use chrono::{TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::{BufRead, Write};

use crate::models::{
    Chat, ChatSummary, ChatTurn, DeletionSummary, FileRecord, Folder, KnowledgeBase,
    RetrievedChunk, UploadReport,
};
use crate::normalize::Payload;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Copy, Debug)]
pub struct Output {
    pub format: OutputFormat,
}

impl Output {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn is_json(&self) -> bool {
        self.format == OutputFormat::Json
    }

    pub fn print_json(&self, value: &impl Serialize) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(value)?);
        Ok(())
    }

    /// Prints `payload` as JSON, or through `text` when it is typed.
    ///
    /// Raw payloads print as pretty JSON in either format.
    pub fn payload<T: Serialize>(
        &self,
        payload: &Payload<T>,
        text: impl FnOnce(&T) -> String,
    ) -> Result<()> {
        if self.is_json() {
            return self.print_json(&payload.to_json());
        }
        match payload {
            Payload::Typed(value) => print!("{}", text(value)),
            Payload::Raw(value) => println!("{}", serde_json::to_string_pretty(value)?),
            Payload::Empty => println!("OK"),
        }
        Ok(())
    }

    /// Prints a success line in text mode, `{"success": true, ...}` in JSON.
    pub fn success(&self, message: &str, extra: Value) -> Result<()> {
        if self.is_json() {
            let mut obj = serde_json::json!({ "success": true });
            if let (Some(map), Value::Object(more)) = (obj.as_object_mut(), extra) {
                map.extend(more);
            }
            return self.print_json(&obj);
        }
        println!("{message}");
        Ok(())
    }
}

/// Asks on stderr and reads one line from stdin. Anything but y/yes is no.
pub fn confirm(question: &str) -> Result<bool> {
    let mut err = std::io::stderr().lock();
    write!(err, "{question} [y/N]: ")?;
    err.flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(is_yes(&answer))
}

/// Gate for destructive commands. JSON mode and `--yes` skip the prompt.
pub fn should_proceed(out: &Output, yes: bool, question: &str) -> Result<bool> {
    if yes || out.is_json() {
        return Ok(true);
    }
    let proceed = confirm(question)?;
    if !proceed {
        eprintln!("Aborted.");
    }
    Ok(proceed)
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

pub fn format_timestamp(secs: Option<i64>) -> String {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "-".to_string())
}

pub fn render_folders(folders: &[Folder]) -> String {
    if folders.is_empty() {
        return "No folders found.\n".to_string();
    }
    let mut out = String::from("Folders:\n");
    for f in folders {
        out.push_str(&format!(
            "  - {}  {}  (updated {})\n",
            f.id,
            f.name,
            format_timestamp(f.updated_at)
        ));
    }
    out
}

pub fn render_folder(folder: &Folder) -> String {
    format!("Folder '{}' (ID: {})\n", folder.name, folder.id)
}

pub fn render_chat_summaries(chats: &[ChatSummary], empty: &str) -> String {
    if chats.is_empty() {
        return format!("{empty}\n");
    }
    let mut out = String::new();
    for c in chats {
        out.push_str(&format!("  - ID: {}, Title: {}\n", c.id, c.title));
    }
    out
}

pub fn render_messages(messages: &[ChatTurn]) -> String {
    if messages.is_empty() {
        return "No messages.\n".to_string();
    }
    let mut out = String::new();
    for m in messages {
        out.push_str(&format!("[{}]\n{}\n\n", m.role, m.content.trim_end()));
    }
    out
}

/// Chat header followed by the last exchange.
pub fn render_chat(chat: &Chat) -> String {
    let title = chat
        .chat
        .title
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(&chat.title);
    let mut out = format!("Chat {} '{}'\n", chat.id, title);
    if let Some(folder) = &chat.folder_id {
        out.push_str(&format!("  folder: {folder}\n"));
    }
    let start = chat.chat.messages.len().saturating_sub(2);
    if start < chat.chat.messages.len() {
        out.push('\n');
        out.push_str(&render_messages(&chat.chat.messages[start..]));
    }
    out
}

pub fn render_knowledge_bases(kbs: &[KnowledgeBase]) -> String {
    if kbs.is_empty() {
        return "No knowledge bases found.\n".to_string();
    }
    let mut out = String::from("Knowledge bases:\n");
    for kb in kbs {
        out.push_str(&format!("  - {}  {}", kb.id, kb.name));
        if !kb.description.is_empty() {
            out.push_str(&format!("  ({})", kb.description));
        }
        out.push('\n');
    }
    out
}

pub fn render_knowledge_base(kb: &KnowledgeBase) -> String {
    format!("Knowledge base '{}' (ID: {})\n", kb.name, kb.id)
}

pub fn render_files(files: &[FileRecord]) -> String {
    if files.is_empty() {
        return "No files.\n".to_string();
    }
    let mut out = String::new();
    for f in files {
        let size = f
            .meta
            .as_ref()
            .and_then(|m| m.size)
            .map(|s| format!("{s} bytes"))
            .unwrap_or_else(|| "-".to_string());
        out.push_str(&format!(
            "  - {}  {}  {}  {}\n",
            f.id,
            f.display_name(),
            size,
            format_timestamp(f.created_at)
        ));
    }
    out
}

pub fn render_chunks(chunks: &[RetrievedChunk]) -> String {
    if chunks.is_empty() {
        return "No matching content.\n".to_string();
    }
    let mut out = String::new();
    for (i, c) in chunks.iter().enumerate() {
        let source = c.source_ref.as_deref().unwrap_or("unknown source");
        match c.distance {
            Some(d) => out.push_str(&format!("{}. [{}] (distance {:.4})\n", i + 1, source, d)),
            None => out.push_str(&format!("{}. [{}]\n", i + 1, source)),
        }
        out.push_str(&format!("{}\n\n", c.content.trim_end()));
    }
    out
}

pub fn render_upload_report(report: &UploadReport) -> String {
    let mut out = format!(
        "Uploaded {} file(s), {} failed.\n",
        report.uploaded.len(),
        report.failed.len()
    );
    for u in &report.uploaded {
        out.push_str(&format!("  ok    {}  ({})\n", u.path.display(), u.file.id));
    }
    for f in &report.failed {
        out.push_str(&format!("  FAIL  {}  {}\n", f.path.display(), f.error));
    }
    out
}

pub fn render_deletion_summary(summary: &DeletionSummary) -> String {
    format!(
        "Deleted {} file(s), {} failed.\n",
        summary.successful, summary.failed
    )
}
