//! Knowledge bases, files, and retrieval.
//!
//! Batch operations (`upload_directory`, `delete_all_files`) fan out with
//! at most `upload_concurrency` requests in flight. Results come back in
//! input order; a failed item is recorded in the report and never stops
//! its siblings.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::error::{require_non_empty, Error, Result};
use crate::kbignore::{collect_files, IgnoreRuleSet};
use crate::models::{
    DeletionSummary, FileContentForm, FileIdForm, FileRecord, KnowledgeBase, KnowledgeForm,
    QueryCollectionForm, QueryOptions, QueryResult, RetrievedChunk, UploadFailure, UploadReport,
    UploadedFile,
};
use crate::normalize::{fetch, Payload};
use crate::progress::{BatchProgressEvent, BatchProgressReporter, NoProgress};
use crate::rag::Retriever;
use crate::transport::{path_segment, ApiRequest, Transport};

#[derive(Clone)]
pub struct Knowledge {
    transport: Arc<dyn Transport>,
    upload_concurrency: usize,
}

impl Knowledge {
    pub(crate) fn new(transport: Arc<dyn Transport>, upload_concurrency: usize) -> Self {
        Self {
            transport,
            upload_concurrency: upload_concurrency.max(1),
        }
    }

    pub async fn create(
        &self,
        name: &str,
        description: Option<&str>,
    ) -> Result<Payload<KnowledgeBase>> {
        require_non_empty("knowledge base name", name)?;
        let form = KnowledgeForm {
            name,
            description: description.unwrap_or_default(),
        };
        let request = ApiRequest::post_json("/api/v1/knowledge/create", &form)?;
        let kb = fetch(self.transport.as_ref(), request, "knowledge base create").await?;
        tracing::info!(name, "created knowledge base");
        Ok(kb)
    }

    pub async fn list(&self) -> Result<Payload<Vec<KnowledgeBase>>> {
        fetch(
            self.transport.as_ref(),
            ApiRequest::get("/api/v1/knowledge/list"),
            "knowledge base list",
        )
        .await
    }

    pub async fn get(&self, kb_id: &str) -> Result<Payload<KnowledgeBase>> {
        let segment = path_segment("knowledge base id", kb_id)?;
        fetch(
            self.transport.as_ref(),
            ApiRequest::get(format!("/api/v1/knowledge/{segment}")),
            &format!("knowledge base get {kb_id}"),
        )
        .await
    }

    pub async fn delete(&self, kb_id: &str) -> Result<()> {
        let segment = path_segment("knowledge base id", kb_id)?;
        fetch::<Value>(
            self.transport.as_ref(),
            ApiRequest::delete(format!("/api/v1/knowledge/{segment}/delete")),
            &format!("knowledge base delete {kb_id}"),
        )
        .await?;
        tracing::info!(kb_id, "deleted knowledge base");
        Ok(())
    }

    /// Files attached to a knowledge base.
    pub async fn list_files(&self, kb_id: &str) -> Result<Vec<FileRecord>> {
        let files = match self.get(kb_id).await? {
            Payload::Typed(kb) => kb.files.unwrap_or_default(),
            Payload::Raw(value) => match value.get("files") {
                Some(files) => serde_json::from_value(files.clone()).map_err(|e| {
                    Error::UnexpectedResponse {
                        label: format!("files for knowledge base {kb_id}"),
                        message: e.to_string(),
                    }
                })?,
                None => {
                    tracing::warn!(kb_id, "knowledge base response has no file list");
                    Vec::new()
                }
            },
            Payload::Empty => Vec::new(),
        };
        Ok(files)
    }

    /// Retrieves chunks relevant to `prompt` from the given knowledge bases
    /// in one query, best match first within each knowledge base.
    pub async fn query(
        &self,
        knowledge_ids: &[String],
        prompt: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RetrievedChunk>> {
        require_non_empty("query", prompt)?;
        if knowledge_ids.is_empty() {
            return Err(Error::InvalidInput(
                "at least one knowledge base id is required".to_string(),
            ));
        }
        for id in knowledge_ids {
            require_non_empty("knowledge base id", id)?;
        }

        let form = QueryCollectionForm {
            collection_names: knowledge_ids,
            query: prompt,
            options,
        };
        let request = ApiRequest::post_json("/api/v1/retrieval/query/collection", &form)?;
        let label = format!("knowledge query on {}", knowledge_ids.join(","));
        let result: QueryResult = fetch(self.transport.as_ref(), request, &label)
            .await?
            .into_typed(&label)?;

        let chunks = result.into_chunks();
        tracing::info!(count = chunks.len(), "retrieved chunks");
        Ok(chunks)
    }

    /// Uploads one file and links it to `kb_id`.
    pub async fn upload_file(&self, kb_id: &str, path: &Path) -> Result<FileRecord> {
        require_non_empty("knowledge base id", kb_id)?;
        let file = self.upload_only(path).await?;
        self.link_files(kb_id, std::slice::from_ref(&file.id)).await?;
        tracing::info!(kb_id, file_id = %file.id, path = %path.display(), "uploaded file");
        Ok(file)
    }

    /// Uploads every file under `dir` that the ignore rules allow.
    pub async fn upload_directory(
        &self,
        kb_id: &str,
        dir: &Path,
        ignore_file: Option<&Path>,
    ) -> Result<UploadReport> {
        self.upload_directory_with_progress(kb_id, dir, ignore_file, &NoProgress)
            .await
    }

    /// [`upload_directory`](Self::upload_directory) with per-file progress.
    ///
    /// Successfully uploaded files are linked to the knowledge base in one
    /// batch call at the end; a failed link fails the operation.
    pub async fn upload_directory_with_progress(
        &self,
        kb_id: &str,
        dir: &Path,
        ignore_file: Option<&Path>,
        reporter: &dyn BatchProgressReporter,
    ) -> Result<UploadReport> {
        require_non_empty("knowledge base id", kb_id)?;
        let rules = IgnoreRuleSet::load(dir, ignore_file)?;
        let candidates = collect_files(dir, &rules)?;

        let mut report = UploadReport::default();
        if candidates.is_empty() {
            tracing::info!(dir = %dir.display(), "no files to upload");
            return Ok(report);
        }

        let total = candidates.len() as u64;
        reporter.report(BatchProgressEvent::Started {
            operation: "upload".to_string(),
            total,
        });

        let mut results = stream::iter(candidates.into_iter().map(|candidate| async move {
            let outcome = self.upload_only(&candidate.path).await;
            (candidate, outcome)
        }))
        .buffered(self.upload_concurrency);

        let mut n = 0u64;
        while let Some((candidate, outcome)) = results.next().await {
            n += 1;
            reporter.report(BatchProgressEvent::Item {
                operation: "upload".to_string(),
                name: candidate.relative.clone(),
                ok: outcome.is_ok(),
                n,
                total,
            });
            match outcome {
                Ok(file) => report.uploaded.push(UploadedFile {
                    path: candidate.path,
                    file,
                }),
                Err(e) => {
                    tracing::error!(path = %candidate.relative, error = %e, "upload failed");
                    report.failed.push(UploadFailure {
                        path: candidate.path,
                        error: e.to_string(),
                    });
                }
            }
        }

        reporter.report(BatchProgressEvent::Finished {
            operation: "upload".to_string(),
            succeeded: report.uploaded.len() as u64,
            failed: report.failed.len() as u64,
        });

        if report.uploaded.is_empty() {
            tracing::warn!(failed = report.failed.len(), "no files were uploaded");
            return Ok(report);
        }

        let ids: Vec<String> = report.uploaded.iter().map(|u| u.file.id.clone()).collect();
        self.link_files(kb_id, &ids).await?;
        tracing::info!(
            kb_id,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "directory upload finished"
        );
        Ok(report)
    }

    /// Replaces the text content of an uploaded file with `path`'s contents.
    pub async fn update_file(&self, file_id: &str, path: &Path) -> Result<Payload<FileRecord>> {
        let segment = path_segment("file id", file_id)?;
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::io(path, e))?;
        let request = ApiRequest::post_json(
            format!("/api/v1/files/{segment}/data/content/update"),
            &FileContentForm { content: &content },
        )?;
        let file = fetch(
            self.transport.as_ref(),
            request,
            &format!("file update {file_id}"),
        )
        .await?;
        tracing::info!(file_id, path = %path.display(), "updated file content");
        Ok(file)
    }

    pub async fn delete_file(&self, file_id: &str) -> Result<()> {
        let segment = path_segment("file id", file_id)?;
        fetch::<Value>(
            self.transport.as_ref(),
            ApiRequest::delete(format!("/api/v1/files/{segment}")),
            &format!("file delete {file_id}"),
        )
        .await?;
        tracing::info!(file_id, "deleted file");
        Ok(())
    }

    /// Deletes every file attached to `kb_id`.
    pub async fn delete_all_files(&self, kb_id: &str) -> Result<DeletionSummary> {
        self.delete_all_files_with_progress(kb_id, &NoProgress).await
    }

    pub async fn delete_all_files_with_progress(
        &self,
        kb_id: &str,
        reporter: &dyn BatchProgressReporter,
    ) -> Result<DeletionSummary> {
        let files = self.list_files(kb_id).await?;
        let mut summary = DeletionSummary::default();
        if files.is_empty() {
            tracing::info!(kb_id, "knowledge base has no files");
            return Ok(summary);
        }

        let total = files.len() as u64;
        reporter.report(BatchProgressEvent::Started {
            operation: "delete".to_string(),
            total,
        });

        let mut results = stream::iter(files.iter().map(|file| async move {
            (file, self.delete_file(&file.id).await)
        }))
        .buffered(self.upload_concurrency);

        let mut n = 0u64;
        while let Some((file, outcome)) = results.next().await {
            n += 1;
            reporter.report(BatchProgressEvent::Item {
                operation: "delete".to_string(),
                name: file.display_name().to_string(),
                ok: outcome.is_ok(),
                n,
                total,
            });
            match outcome {
                Ok(()) => summary.successful += 1,
                Err(e) => {
                    tracing::error!(file_id = %file.id, error = %e, "delete failed");
                    summary.failed += 1;
                }
            }
        }

        reporter.report(BatchProgressEvent::Finished {
            operation: "delete".to_string(),
            succeeded: summary.successful as u64,
            failed: summary.failed as u64,
        });
        tracing::info!(kb_id, successful = summary.successful, failed = summary.failed, "bulk delete finished");
        Ok(summary)
    }

    async fn upload_only(&self, path: &Path) -> Result<FileRecord> {
        let file_name = file_name_of(path)?;
        let bytes = tokio::fs::read(path).await.map_err(|e| Error::io(path, e))?;
        let request = ApiRequest::upload(
            "/api/v1/files/",
            file_name.clone(),
            detect_content_type(path),
            bytes,
        );
        let label = format!("file upload {file_name}");
        fetch(self.transport.as_ref(), request, &label)
            .await?
            .into_typed(&label)
    }

    async fn link_files(&self, kb_id: &str, file_ids: &[String]) -> Result<()> {
        let body: Vec<FileIdForm<'_>> = file_ids
            .iter()
            .map(|id| FileIdForm { file_id: id })
            .collect();
        let segment = path_segment("knowledge base id", kb_id)?;
        let request =
            ApiRequest::post_json(format!("/api/v1/knowledge/{segment}/files/batch/add"), &body)?;
        fetch::<Value>(
            self.transport.as_ref(),
            request,
            &format!("link {} files to knowledge base {kb_id}", file_ids.len()),
        )
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Retriever for Knowledge {
    async fn retrieve(
        &self,
        knowledge_id: &str,
        query: &str,
        options: &QueryOptions,
    ) -> Result<Vec<RetrievedChunk>> {
        self.query(&[knowledge_id.to_string()], query, options).await
    }
}

fn file_name_of(path: &Path) -> Result<String> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| Error::InvalidInput(format!("'{}' has no file name", path.display())))
}

/// MIME type guessed from the file extension.
pub fn detect_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match ext.as_deref() {
        Some("md" | "markdown") => "text/markdown",
        Some("txt" | "log") => "text/plain",
        Some("json") => "application/json",
        Some("yaml" | "yml") => "application/yaml",
        Some("rst") => "text/x-rst",
        Some("html" | "htm") => "text/html",
        Some("csv") => "text/csv",
        Some("xml") => "application/xml",
        Some("pdf") => "application/pdf",
        Some("docx") => {
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        }
        Some("pptx") => {
            "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        }
        Some("xlsx") => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        Some("py") => "text/x-python",
        Some("rs") => "text/x-rust",
        Some("js") => "text/javascript",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
