//! Reads the corpus directory and builds a complete snapshot from it.
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use ignore::WalkBuilder;
use tracing::{info, warn};

use super::{Corpus, CorpusError, CorpusSnapshot, Document, SectionMap, extract_sections};
use crate::config::Config;
use crate::embedder::Embedder;
use crate::fallback::{RuleMatcher, structurer};
use crate::indexer::{ChunkOptions, IndexSource, Indexer, chunk_corpus};
use crate::store::ChunkStore;

/// What a load produced, for logs and tool output.
#[derive(Debug)]
pub struct LoadReport {
    pub documents: usize,
    pub sections: usize,
    pub chunks: usize,
    pub rules: usize,
    pub index: IndexSource,
    /// Files that could not be read. Loading continues past them.
    pub skipped: Vec<CorpusError>,
}

#[derive(Clone)]
pub struct CorpusLoader {
    config: Arc<Config>,
    embedder: Option<Arc<dyn Embedder>>,
}

impl CorpusLoader {
    pub fn new(config: Arc<Config>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self { config, embedder }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn embedder(&self) -> Option<&Arc<dyn Embedder>> {
        self.embedder.as_ref()
    }

    /// Build a snapshot from the configured data directory.
    ///
    /// A missing directory yields an empty snapshot. Unreadable files are
    /// skipped and reported. Embedding runs here, so call this from a
    /// blocking context.
    pub fn load(&self) -> (CorpusSnapshot, LoadReport) {
        let data_dir = self.config.data_dir();
        let (documents, skipped) = match read_documents(&data_dir, &self.config.file_extensions) {
            Ok(read) => read,
            Err(e) => {
                warn!("{e}; starting with an empty corpus");
                (BTreeMap::new(), Vec::new())
            }
        };

        let mut sections = SectionMap::default();
        for doc in documents.values() {
            sections.extend(extract_sections(&doc.text, &doc.id));
        }

        let rules = self.load_rules(&documents);
        let (chunks, index) = self.build_chunks(&documents);

        let report = LoadReport {
            documents: documents.len(),
            sections: sections.len(),
            chunks: chunks.len(),
            rules: rules.len(),
            index,
            skipped,
        };
        info!(
            "Loaded {} documents ({} section keys, {} chunks, {} rules, index: {:?})",
            report.documents, report.sections, report.chunks, report.rules, report.index
        );

        let snapshot = CorpusSnapshot {
            version: 0,
            loaded_at: Utc::now(),
            documents,
            sections,
            chunks,
            rules,
        };
        (snapshot, report)
    }

    /// Load off the async runtime and publish the result in one swap.
    /// On failure the previous snapshot stays current.
    /// Concurrent reloads run one after another.
    pub async fn reload_into(&self, corpus: &Corpus) -> Result<(u64, LoadReport), CorpusError> {
        let _reload = corpus.lock_reload().await;
        let loader = self.clone();
        let (snapshot, report) = tokio::task::spawn_blocking(move || loader.load())
            .await
            .map_err(|e| CorpusError::Interrupted(e.to_string()))?;

        let version = corpus.publish(snapshot);
        info!("Published corpus snapshot v{version}");
        Ok((version, report))
    }

    fn load_rules(&self, documents: &BTreeMap<String, Document>) -> RuleMatcher {
        if let Some(path) = &self.config.rules_path {
            match RuleMatcher::from_json_file(Path::new(path)) {
                Ok(matcher) => return matcher,
                Err(e) => warn!("{e}; deriving rules from the corpus instead"),
            }
        }

        let mut matcher = RuleMatcher::default();
        for doc in documents.values() {
            matcher.extend(structurer::derive_rules(&doc.id, &doc.text));
        }
        matcher
    }

    fn build_chunks(&self, documents: &BTreeMap<String, Document>) -> (ChunkStore, IndexSource) {
        let options = ChunkOptions::from_config(&self.config);
        let chunks = chunk_corpus(documents, &options);

        let Some(embedder) = &self.embedder else {
            return (ChunkStore::unindexed(chunks), IndexSource::Unindexed);
        };
        if chunks.is_empty() {
            return (ChunkStore::unindexed(chunks), IndexSource::Unindexed);
        }

        let indexer = Indexer::new(embedder.as_ref(), options);
        match indexer.build_or_reuse(chunks.clone(), &self.config.index_dir()) {
            Ok(built) => built,
            Err(e) => {
                warn!("Vector index unavailable: {e}");
                (ChunkStore::unindexed(chunks), IndexSource::Unindexed)
            }
        }
    }
}

/// Read every matching file directly under `dir`. The file stem becomes the
/// document id. Empty files are skipped silently; unreadable ones are
/// returned alongside the documents.
pub fn read_documents(
    dir: &Path,
    extensions: &[String],
) -> Result<(BTreeMap<String, Document>, Vec<CorpusError>), CorpusError> {
    if !dir.is_dir() {
        return Err(CorpusError::DataUnavailable(dir.display().to_string()));
    }

    let mut documents = BTreeMap::new();
    let mut skipped = Vec::new();

    let walker = WalkBuilder::new(dir)
        .max_depth(Some(1))
        .hidden(true)
        .git_ignore(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build();

    for entry in walker.filter_map(Result::ok) {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }

        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if !extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            continue;
        }

        let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        match std::fs::read_to_string(path) {
            Ok(text) if text.trim().is_empty() => {
                warn!("Skipping empty document {}", path.display());
            }
            Ok(text) => {
                documents.insert(
                    id.to_string(),
                    Document {
                        id: id.to_string(),
                        text,
                    },
                );
            }
            Err(source) => {
                let err = CorpusError::Extraction {
                    path: path.display().to_string(),
                    source,
                };
                warn!("{err}");
                skipped.push(err);
            }
        }
    }

    Ok((documents, skipped))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmbedderKind;
    use crate::embedder::mock::MockEmbedder;
    use std::fs;
    use tempfile::tempdir;

    fn config_for(data_dir: &Path, index_dir: &Path) -> Config {
        let mut config = Config {
            data_dir: data_dir.display().to_string(),
            index_dir: index_dir.display().to_string(),
            ..Config::default()
        };
        config.embedder.kind = EmbedderKind::Hashing;
        config
    }

    #[test]
    fn test_read_documents_uses_file_stem_and_filters_extension() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Leave_Rules.txt"), "1. Leave. Text.").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();
        fs::write(dir.path().join("empty.txt"), "  \n").unwrap();

        let (docs, skipped) = read_documents(dir.path(), &["txt".to_string()]).unwrap();
        assert_eq!(docs.keys().collect::<Vec<_>>(), vec!["Leave_Rules"]);
        assert!(skipped.is_empty());
    }

    #[test]
    fn test_invalid_utf8_file_is_skipped_not_fatal() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("good.txt"), "1. Good. Text.").unwrap();
        fs::write(dir.path().join("bad.txt"), [0xff, 0xfe, 0x00, 0xc3]).unwrap();

        let (docs, skipped) = read_documents(dir.path(), &["txt".to_string()]).unwrap();
        assert!(docs.contains_key("good"));
        assert!(!docs.contains_key("bad"));
        assert_eq!(skipped.len(), 1);
        assert!(matches!(skipped[0], CorpusError::Extraction { .. }));
    }

    #[test]
    fn test_missing_directory_is_data_unavailable() {
        let result = read_documents(Path::new("/nonexistent/corpus"), &["txt".to_string()]);
        assert!(matches!(result, Err(CorpusError::DataUnavailable(_))));
    }

    #[test]
    fn test_load_missing_directory_gives_empty_snapshot() {
        let tmp = tempdir().unwrap();
        let config = config_for(&tmp.path().join("missing"), &tmp.path().join("idx"));
        let loader = CorpusLoader::new(Arc::new(config), None);
        let (snapshot, report) = loader.load();
        assert!(snapshot.is_empty());
        assert_eq!(report.documents, 0);
        assert_eq!(report.index, IndexSource::Unindexed);
    }

    #[test]
    fn test_load_builds_sections_rules_and_index() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(
            data.join("ministers.txt"),
            "3A. Consolidated Allowance to Ministers. Each Minister shall receive an allowance.",
        )
        .unwrap();

        let config = config_for(&data, &tmp.path().join("idx"));
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(32));
        let loader = CorpusLoader::new(Arc::new(config), Some(embedder));
        let (snapshot, report) = loader.load();

        assert_eq!(report.documents, 1);
        assert!(snapshot.sections.get("ministers", "3a.").is_some());
        assert!(snapshot.has_vector_index());
        assert_eq!(report.index, IndexSource::Built);
        assert!(!snapshot.rules.is_empty());
    }

    #[test]
    fn test_configured_rules_file_wins() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        fs::write(data.join("doc.txt"), "Employees must sign in daily.").unwrap();
        let rules = tmp.path().join("rules.json");
        fs::write(&rules, r#"{"r1": {"text": "Sign in daily.", "keywords": ["sign"]}}"#).unwrap();

        let mut config = config_for(&data, &tmp.path().join("idx"));
        config.rules_path = Some(rules.display().to_string());
        let (snapshot, _) = CorpusLoader::new(Arc::new(config), None).load();

        assert_eq!(snapshot.rules.len(), 1);
        assert!(snapshot.rules.get_rule("r1").is_some());
    }

    #[tokio::test]
    async fn test_reload_publishes_new_version() {
        let tmp = tempdir().unwrap();
        let data = tmp.path().join("data");
        fs::create_dir(&data).unwrap();
        let config = Arc::new(config_for(&data, &tmp.path().join("idx")));
        let loader = CorpusLoader::new(config, None);
        let corpus = Corpus::default();

        fs::write(data.join("a.txt"), "1. First. Text.").unwrap();
        let (version, report) = loader.reload_into(&corpus).await.unwrap();
        assert_eq!(version, 2);
        assert_eq!(report.documents, 1);
        assert!(corpus.snapshot().document("a").is_some());
    }
}
