//! Directory ingestion: read, hash, chunk, embed, write

use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use walkdir::WalkDir;

use super::chunker::TextChunker;
use super::reader::{extract_text, SourceFormat};
use crate::engine::RagEngine;
use crate::error::{Error, Result};
use crate::types::{Document, IngestFailure, IngestRecord, IngestReport};

/// What happened to a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    /// Content hash matches the current revision
    Unchanged,
    /// Written under a new revision
    Updated { revision: u64, chunks_inserted: usize },
}

/// Feeds documents from a data directory into the engine
///
/// Scans are serialized so two runs never race on a document's revision.
pub struct IngestPipeline {
    engine: Arc<RagEngine>,
    chunker: TextChunker,
    data_dir: PathBuf,
    scan_lock: Mutex<()>,
}

impl IngestPipeline {
    pub fn new(engine: Arc<RagEngine>, chunker: TextChunker, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            chunker,
            data_dir: data_dir.into(),
            scan_lock: Mutex::new(()),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Ingest every supported file under the data directory
    ///
    /// Per-file failures are collected in the report rather than aborting
    /// the scan.
    pub async fn scan(&self) -> Result<IngestReport> {
        let _guard = self.scan_lock.lock().await;

        if !self.data_dir.is_dir() {
            return Err(Error::Config(format!(
                "data directory {} does not exist",
                self.data_dir.display()
            )));
        }

        tracing::info!("Scanning data directory: {}", self.data_dir.display());

        let mut files: Vec<(PathBuf, SourceFormat)> = WalkDir::new(&self.data_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                let format = SourceFormat::from_path(e.path())?;
                Some((e.into_path(), format))
            })
            .collect();
        files.sort_by(|a, b| a.0.cmp(&b.0));

        let mut report = IngestReport::default();
        for (path, format) in files {
            report.files_seen += 1;
            match self.ingest_file(&path, format).await {
                Ok(FileOutcome::Unchanged) => report.files_unchanged += 1,
                Ok(FileOutcome::Updated { chunks_inserted, .. }) => {
                    report.documents_updated += 1;
                    report.chunks_inserted += chunks_inserted;
                }
                Err(e) => {
                    tracing::warn!("Failed to ingest {}: {}", path.display(), e);
                    report.errors.push(IngestFailure {
                        path: path.display().to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }

        tracing::info!(
            "Scan complete: {} files, {} updated, {} unchanged, {} chunks, {} errors",
            report.files_seen,
            report.documents_updated,
            report.files_unchanged,
            report.chunks_inserted,
            report.errors.len()
        );

        Ok(report)
    }

    /// Ingest one file, bumping the document revision if its content changed
    pub async fn ingest_file(&self, path: &Path, format: SourceFormat) -> Result<FileOutcome> {
        let data = tokio::fs::read(path).await?;
        let content_hash = hash_bytes(&data);
        let document_id = Document::id_for_path(path);

        // A revision whose chunks were not all written is redone under a new one
        let current = self.engine.document(&document_id);
        if current
            .as_ref()
            .is_some_and(|doc| doc.complete && doc.content_hash == content_hash)
        {
            tracing::debug!("Unchanged: {}", path.display());
            return Ok(FileOutcome::Unchanged);
        }
        let revision = current.map_or(1, |doc| doc.revision + 1);

        let text = extract_text(format, data).await?;
        let chunks = self.chunker.split(&text);
        if chunks.is_empty() {
            return Err(Error::invalid_request(format!(
                "no extractable text in {}",
                path.display()
            )));
        }

        let embeddings = self.engine.embedder().embed_batch(&chunks).await?;
        if embeddings.len() != chunks.len() {
            return Err(Error::embedding(format!(
                "expected {} embeddings, provider returned {}",
                chunks.len(),
                embeddings.len()
            )));
        }

        let mut chunks_inserted = 0;
        for (chunk_index, (text, embedding)) in chunks.into_iter().zip(embeddings).enumerate() {
            let chunk_index = chunk_index as u32;
            let record = IngestRecord {
                document_id,
                path: path.to_path_buf(),
                revision,
                content_hash: content_hash.clone(),
                chunk_id: IngestRecord::chunk_id_for(&document_id, revision, chunk_index),
                chunk_index,
                text,
                embedding,
            };
            if self.engine.ingest(&record)?.is_inserted() {
                chunks_inserted += 1;
            }
        }
        self.engine.complete_revision(&document_id, revision)?;

        tracing::info!(
            "Ingested {} (revision {}, {} chunks)",
            path.display(),
            revision,
            chunks_inserted
        );

        Ok(FileOutcome::Updated {
            revision,
            chunks_inserted,
        })
    }
}

/// Hex SHA-256 of raw file bytes
fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RagConfig;
    use crate::providers::{EmbeddingProvider, LlmProvider};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct LengthEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, text.len() as f32 / 100.0, 0.5])
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "length"
        }
    }

    struct EchoLlm;

    #[async_trait]
    impl LlmProvider for EchoLlm {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok("ok".to_string())
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "echo"
        }

        fn model(&self) -> &str {
            "echo-1"
        }
    }

    /// Like `LengthEmbedder`, but returns a short vector for register text while broken
    struct FlakyEmbedder {
        broken: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for FlakyEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            if self.broken.load(Ordering::SeqCst) && text.contains("register") {
                return Ok(vec![1.0, 0.0]);
            }
            LengthEmbedder.embed(text).await
        }

        fn dimensions(&self) -> usize {
            3
        }

        async fn health_check(&self) -> Result<bool> {
            Ok(true)
        }

        fn name(&self) -> &str {
            "flaky"
        }
    }

    fn pipeline_with(
        dir: &Path,
        embedder: Arc<dyn EmbeddingProvider>,
        chunker: TextChunker,
    ) -> IngestPipeline {
        let mut config = RagConfig::default();
        config.embeddings.dimensions = 3;
        let engine = RagEngine::new(&config, embedder, Arc::new(EchoLlm)).unwrap();
        IngestPipeline::new(Arc::new(engine), chunker, dir)
    }

    fn pipeline(dir: &Path) -> IngestPipeline {
        pipeline_with(dir, Arc::new(LengthEmbedder), TextChunker::new(2400, 200))
    }

    #[tokio::test]
    async fn test_scan_detects_changes_by_hash() {
        let dir = tempfile::tempdir().unwrap();
        let notice = dir.path().join("notice.txt");
        std::fs::write(&notice, "Tramadol is included in Schedule H1.").unwrap();
        std::fs::write(dir.path().join("ignored.xlsx"), "binary").unwrap();

        let pipeline = pipeline(dir.path());

        let report = pipeline.scan().await.unwrap();
        assert_eq!(report.files_seen, 1);
        assert_eq!(report.documents_updated, 1);
        assert_eq!(report.chunks_inserted, 1);

        let report = pipeline.scan().await.unwrap();
        assert_eq!(report.files_unchanged, 1);
        assert_eq!(report.chunks_inserted, 0);

        std::fs::write(&notice, "Tramadol was moved to Schedule X.").unwrap();
        let report = pipeline.scan().await.unwrap();
        assert_eq!(report.documents_updated, 1);

        let doc = pipeline.engine.document(&Document::id_for_path(&notice)).unwrap();
        assert_eq!(doc.revision, 2);
        assert_eq!(doc.chunk_ids.len(), 1);
    }

    #[tokio::test]
    async fn test_empty_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blank.md"), "  \n").unwrap();

        let report = pipeline(dir.path()).scan().await.unwrap();
        assert_eq!(report.files_seen, 1);
        assert_eq!(report.errors.len(), 1);
        assert!(report.errors[0].message.contains("no extractable text"));
    }

    #[tokio::test]
    async fn test_missing_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent");
        assert!(matches!(pipeline(&missing).scan().await, Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn test_partial_ingest_is_redone_on_next_scan() {
        let dir = tempfile::tempdir().unwrap();
        let notice = dir.path().join("h1_register.txt");
        std::fs::write(
            &notice,
            "Tramadol is included in Schedule H1 of the Drugs and Cosmetics Rules. \
             Retailers must keep a separate register for every Schedule H1 sale made.",
        )
        .unwrap();

        let embedder = Arc::new(FlakyEmbedder {
            broken: AtomicBool::new(true),
        });
        let pipeline = pipeline_with(dir.path(), embedder.clone(), TextChunker::new(100, 0));
        let doc_id = Document::id_for_path(&notice);

        let report = pipeline.scan().await.unwrap();
        assert_eq!(report.errors.len(), 1);
        let doc = pipeline.engine.document(&doc_id).unwrap();
        assert_eq!(doc.chunk_ids.len(), 1);
        assert!(!doc.complete);

        // same bytes on disk, but the half-written revision is not trusted
        embedder.broken.store(false, Ordering::SeqCst);
        let report = pipeline.scan().await.unwrap();
        assert!(report.errors.is_empty());
        assert_eq!(report.documents_updated, 1);
        assert_eq!(report.chunks_inserted, 2);

        let doc = pipeline.engine.document(&doc_id).unwrap();
        assert_eq!(doc.revision, 2);
        assert_eq!(doc.chunk_ids.len(), 2);
        assert!(doc.complete);

        let report = pipeline.scan().await.unwrap();
        assert_eq!(report.files_unchanged, 1);
    }
}
