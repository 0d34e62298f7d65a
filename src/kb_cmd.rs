//! `owui kb ...` command handlers.

use anyhow::{bail, Result};
use serde_json::json;
use std::path::Path;

use crate::client::OpenWebUi;
use crate::models::QueryOptions;
use crate::output::{self, Output};
use crate::progress::ProgressMode;

pub async fn run_create(
    client: &OpenWebUi,
    out: Output,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let kb = client.knowledge.create(name, description).await?;
    out.payload(&kb, |kb| {
        format!("Created knowledge base.\n{}", output::render_knowledge_base(kb))
    })
}

pub async fn run_list(client: &OpenWebUi, out: Output) -> Result<()> {
    let kbs = client.knowledge.list().await?;
    out.payload(&kbs, |kbs| output::render_knowledge_bases(kbs))
}

pub async fn run_delete(client: &OpenWebUi, out: Output, kb_id: &str, yes: bool) -> Result<()> {
    let question = format!("Delete knowledge base '{kb_id}'?");
    if !output::should_proceed(&out, yes, &question)? {
        return Ok(());
    }
    client.knowledge.delete(kb_id).await?;
    out.success(
        &format!("Deleted knowledge base '{kb_id}'."),
        json!({ "kb_id": kb_id }),
    )
}

pub async fn run_list_files(client: &OpenWebUi, out: Output, kb_id: &str) -> Result<()> {
    let files = client.knowledge.list_files(kb_id).await?;
    if out.is_json() {
        return out.print_json(&files);
    }
    println!("Files in knowledge base '{kb_id}':");
    print!("{}", output::render_files(&files));
    Ok(())
}

pub async fn run_upload_file(
    client: &OpenWebUi,
    out: Output,
    kb_id: &str,
    path: &Path,
) -> Result<()> {
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    let file = client.knowledge.upload_file(kb_id, path).await?;
    if out.is_json() {
        return out.print_json(&file);
    }
    println!(
        "Uploaded '{}' (ID: {}) to knowledge base '{}'.",
        file.display_name(),
        file.id,
        kb_id
    );
    Ok(())
}

/// Uploads a directory. Exits non-zero when any file failed, after the report.
pub async fn run_upload_dir(
    client: &OpenWebUi,
    out: Output,
    kb_id: &str,
    dir: &Path,
    ignore_file: Option<&Path>,
    progress: ProgressMode,
) -> Result<()> {
    if !dir.is_dir() {
        bail!("Directory not found: {}", dir.display());
    }
    let reporter = progress.reporter();
    let report = client
        .knowledge
        .upload_directory_with_progress(kb_id, dir, ignore_file, reporter.as_ref())
        .await?;

    if out.is_json() {
        out.print_json(&report)?;
    } else {
        print!("{}", output::render_upload_report(&report));
    }

    if report.has_failures() {
        bail!(
            "{} of {} file(s) failed to upload",
            report.failed.len(),
            report.failed.len() + report.uploaded.len()
        );
    }
    Ok(())
}

pub async fn run_update_file(
    client: &OpenWebUi,
    out: Output,
    file_id: &str,
    path: &Path,
) -> Result<()> {
    if !path.is_file() {
        bail!("File not found: {}", path.display());
    }
    let file = client.knowledge.update_file(file_id, path).await?;
    out.payload(&file, |_| {
        format!("Updated file '{file_id}' from {}.\n", path.display())
    })
}

pub async fn run_delete_file(client: &OpenWebUi, out: Output, file_id: &str, yes: bool) -> Result<()> {
    let question = format!("Delete file '{file_id}'?");
    if !output::should_proceed(&out, yes, &question)? {
        return Ok(());
    }
    client.knowledge.delete_file(file_id).await?;
    out.success(
        &format!("Deleted file '{file_id}'."),
        json!({ "file_id": file_id }),
    )
}

/// Deletes every file in a knowledge base. Exits non-zero if any deletion failed.
pub async fn run_delete_all_files(
    client: &OpenWebUi,
    out: Output,
    kb_id: &str,
    yes: bool,
    progress: ProgressMode,
) -> Result<()> {
    let question = format!("Delete ALL files from knowledge base '{kb_id}'?");
    if !output::should_proceed(&out, yes, &question)? {
        return Ok(());
    }
    let reporter = progress.reporter();
    let summary = client
        .knowledge
        .delete_all_files_with_progress(kb_id, reporter.as_ref())
        .await?;

    if out.is_json() {
        out.print_json(&summary)?;
    } else {
        print!("{}", output::render_deletion_summary(&summary));
    }

    if summary.failed > 0 {
        bail!("{} file deletion(s) failed", summary.failed);
    }
    Ok(())
}

pub async fn run_query(
    client: &OpenWebUi,
    out: Output,
    prompt: &str,
    kb_ids: &[String],
    options: &QueryOptions,
) -> Result<()> {
    let chunks = client.knowledge.query(kb_ids, prompt, options).await?;
    if out.is_json() {
        return out.print_json(&chunks);
    }
    print!("{}", output::render_chunks(&chunks));
    Ok(())
}
