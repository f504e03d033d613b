//! Query orchestration: classify, retrieve, optionally generate, and shape
//! the three-form answer.
//!
//! Every path ends in a well-formed [`QueryResponse`]. Retrieval failures
//! become plain-language messages and generation failures fall back to the
//! retrieved passage.
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::corpus::{Corpus, CorpusSnapshot, display_name};
use crate::embedder::Embedder;
use crate::generation::{GenerationError, Generator, prompts};
use crate::query::{ClassifiedQuery, DocumentRouter, QueryClassification, QueryClassifier};
use crate::retriever::{
    Candidate, LexicalRetriever, MatchMethod, Passage, QueryError, SearchOutcome,
    VectorRetriever,
};

pub const EMPTY_QUERY_MESSAGE: &str =
    "Please provide a specific query about the rules and regulations.";

const DISAMBIGUATION_NOTICE: &str = "I found relevant information in multiple documents. Please select which one you want to get information from.";
const DISAMBIGUATION_PROMPT: &str = "Please select a document to continue.";
const DISAMBIGUATION_ENHANCED: &str =
    "I found information in multiple documents. Please select which one you'd like me to use:";
const POLICY_PREFIX: &str = "Here's what I found in our policies:";

/// Longest prefix used for a retrieval-only answer when no sentence scores.
const CONCISE_PREFIX_CHARS: usize = 300;
const CONCISE_MAX_SENTENCES: usize = 3;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub selected_document_id: Option<String>,
}

impl QueryRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            selected_document_id: None,
        }
    }

    #[must_use]
    pub fn with_document(mut self, document_id: impl Into<String>) -> Self {
        self.selected_document_id = Some(document_id.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentOption {
    pub id: String,
    pub display_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResponse {
    pub exact_match: String,
    pub ai_response: String,
    pub enhanced_response: String,
    /// Non-empty only when the caller has to pick a document.
    pub document_options: Vec<DocumentOption>,
    /// Document the passage came from, when one was resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    pub method: MatchMethod,
    /// Snapshot version the answer was computed against.
    pub version: u64,
}

impl QueryResponse {
    /// The same message in all three answer fields.
    fn message(text: impl Into<String>, version: u64) -> Self {
        let text = text.into();
        Self {
            exact_match: text.clone(),
            ai_response: text.clone(),
            enhanced_response: text,
            document_options: Vec::new(),
            document_id: None,
            method: MatchMethod::None,
            version,
        }
    }

    fn disambiguation(candidates: &[Candidate], version: u64) -> Self {
        let method = candidates
            .first()
            .map_or(MatchMethod::None, |c| c.passage.method);
        Self {
            exact_match: DISAMBIGUATION_NOTICE.to_string(),
            ai_response: DISAMBIGUATION_PROMPT.to_string(),
            enhanced_response: DISAMBIGUATION_ENHANCED.to_string(),
            document_options: candidates
                .iter()
                .map(|c| DocumentOption {
                    id: c.document_id.clone(),
                    display_name: display_name(&c.document_id),
                })
                .collect(),
            document_id: None,
            method,
            version,
        }
    }

    #[must_use]
    pub fn needs_selection(&self) -> bool {
        !self.document_options.is_empty()
    }
}

pub struct Orchestrator {
    corpus: Arc<Corpus>,
    classifier: QueryClassifier,
    lexical: LexicalRetriever,
    vector: VectorRetriever,
    generator: Option<Arc<dyn Generator>>,
    top_k: usize,
    generation_timeout: Duration,
}

impl Orchestrator {
    pub fn new(
        corpus: Arc<Corpus>,
        config: &Config,
        embedder: Option<Arc<dyn Embedder>>,
        generator: Option<Arc<dyn Generator>>,
    ) -> Self {
        Self {
            corpus,
            classifier: QueryClassifier::new(DocumentRouter::new(config.document_routes.clone())),
            lexical: LexicalRetriever::new(config.retrieval.clone()),
            vector: VectorRetriever::new(embedder, config.retrieval.max_distance),
            generator,
            top_k: config.search_top_k,
            generation_timeout: Duration::from_secs(config.generation.timeout_secs),
        }
    }

    /// Override the per-call generation deadline.
    #[must_use]
    pub fn with_generation_timeout(mut self, timeout: Duration) -> Self {
        self.generation_timeout = timeout;
        self
    }

    #[must_use]
    pub fn corpus(&self) -> &Arc<Corpus> {
        &self.corpus
    }

    /// Answer one query against the current snapshot.
    pub async fn answer(&self, request: &QueryRequest) -> QueryResponse {
        let snapshot = self.corpus.snapshot();
        let query = request.query.trim();
        if query.is_empty() {
            return QueryResponse::message(EMPTY_QUERY_MESSAGE, snapshot.version);
        }

        let selected = request
            .selected_document_id
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty());
        let classified = self.classifier.classify(query);

        match self.retrieve(&snapshot, &classified, selected) {
            Ok(SearchOutcome::Ambiguous(candidates)) => {
                info!(
                    candidates = candidates.len(),
                    "query matched several documents, asking for a selection"
                );
                QueryResponse::disambiguation(&candidates, snapshot.version)
            }
            Ok(SearchOutcome::Resolved(passage)) => {
                self.compose(query, passage, snapshot.version).await
            }
            Err(e) => {
                debug!("query produced no passage: {e}");
                QueryResponse::message(e.to_string(), snapshot.version)
            }
        }
    }

    /// Section queries use exact lookup only. Text queries try the vector
    /// path first when an index and a generator are both available, then
    /// lexical search, then the fallback rules.
    pub fn retrieve(
        &self,
        snapshot: &CorpusSnapshot,
        classified: &ClassifiedQuery,
        selected: Option<&str>,
    ) -> Result<SearchOutcome, QueryError> {
        if matches!(
            classified.classification,
            QueryClassification::Section { .. }
        ) {
            return self.lexical.search(snapshot, classified, selected);
        }

        if let Some(passage) = self.vector_passage(snapshot, classified, selected) {
            return Ok(SearchOutcome::Resolved(passage));
        }

        let no_match = match self.lexical.search(snapshot, classified, selected) {
            Err(QueryError::NoMatch(no_match)) => no_match,
            other => return other,
        };
        if let Some(passage) = rule_passage(snapshot, &classified.text) {
            return Ok(SearchOutcome::Resolved(passage));
        }
        Err(QueryError::NoMatch(no_match))
    }

    /// Nearest chunks of a single document joined into one passage. The
    /// document is the caller's selection, else the keyword-routed one, else
    /// the owner of the best chunk.
    fn vector_passage(
        &self,
        snapshot: &CorpusSnapshot,
        classified: &ClassifiedQuery,
        selected: Option<&str>,
    ) -> Option<Passage> {
        // Vector results are only worth it when a model turns them into an answer.
        if self.generator.is_none() || !self.vector.is_available(&snapshot.chunks) {
            return None;
        }

        let restrict = selected.or_else(|| {
            classified
                .route
                .auto_selected
                .as_deref()
                .filter(|doc| snapshot.document(doc).is_some())
        });
        let chunks =
            self.vector
                .retrieve_in(&snapshot.chunks, &classified.text, self.top_k, restrict);
        let owner = chunks.first()?.document_id.clone();

        let owned: Vec<_> = chunks
            .iter()
            .filter(|c| c.document_id == owner)
            .collect();
        if owned.len() < chunks.len() {
            debug!(
                document = %owner,
                dropped = chunks.len() - owned.len(),
                "dropping vector chunks owned by other documents"
            );
        }
        debug!(document = %owner, chunks = owned.len(), "answering from vector retrieval");

        Some(Passage {
            document_id: owner,
            score: f64::from(owned[0].distance),
            method: MatchMethod::Vector,
            text: owned
                .iter()
                .map(|c| c.text.trim())
                .collect::<Vec<_>>()
                .join("\n\n"),
        })
    }

    async fn compose(&self, query: &str, passage: Passage, version: u64) -> QueryResponse {
        let document = source_document(&passage);

        let (ai_response, enhanced_response) = match &self.generator {
            None => {
                let answer = if passage.method == MatchMethod::FallbackRules {
                    format!("{POLICY_PREFIX} {}", passage.text)
                } else {
                    concise_answer(query, &passage.text)
                };
                (answer.clone(), answer)
            }
            Some(generator) => {
                self.generate_answers(generator.as_ref(), query, &passage.text, document)
                    .await
            }
        };

        QueryResponse {
            exact_match: passage.text.clone(),
            ai_response,
            enhanced_response,
            document_options: Vec::new(),
            document_id: document.map(str::to_string),
            method: passage.method,
            version,
        }
    }

    /// Answer pass then synthesis pass. A failed answer pass skips synthesis.
    async fn generate_answers(
        &self,
        generator: &dyn Generator,
        query: &str,
        passage: &str,
        document: Option<&str>,
    ) -> (String, String) {
        let answer = self
            .generate(
                generator,
                prompts::ANSWER_SYSTEM,
                &prompts::answer_prompt(query, passage, document),
                prompts::ANSWER_TEMPERATURE,
            )
            .await;
        let answer = match answer {
            Ok(text) => text,
            Err(e) => {
                warn!("Answer pass: {e}; returning the passage");
                let fallback = prompts::fallback_answer(passage, document);
                return (fallback.clone(), fallback);
            }
        };

        let synthesis = self
            .generate(
                generator,
                prompts::SYNTHESIS_SYSTEM,
                &prompts::synthesis_prompt(query, passage, &answer, document),
                prompts::SYNTHESIS_TEMPERATURE,
            )
            .await;
        match synthesis {
            Ok(enhanced) => (answer, enhanced),
            Err(e) => {
                warn!("Synthesis pass: {e}; reusing the generated answer");
                (answer.clone(), answer)
            }
        }
    }

    async fn generate(
        &self,
        generator: &dyn Generator,
        system: &str,
        prompt: &str,
        temperature: f32,
    ) -> Result<String, QueryError> {
        let generated = tokio::time::timeout(
            self.generation_timeout,
            generator.generate(system, prompt, temperature),
        )
        .await
        .unwrap_or(Err(GenerationError::Timeout(
            self.generation_timeout.as_secs(),
        )))?;
        Ok(generated)
    }
}

/// Best-scoring fallback rule as a passage. Derived rule ids carry their
/// document as a `doc:` prefix.
fn rule_passage(snapshot: &CorpusSnapshot, query: &str) -> Option<Passage> {
    let best = snapshot.rules.match_scored(query, 0).into_iter().next()?;
    debug!(rule = %best.rule.id, score = best.score, "answering from fallback rules");

    let document_id = best
        .rule
        .id
        .split_once(':')
        .map(|(doc, _)| doc)
        .filter(|doc| snapshot.document(doc).is_some())
        .unwrap_or_default()
        .to_string();

    Some(Passage {
        document_id,
        text: best.rule.text().to_string(),
        score: best.score as f64,
        method: MatchMethod::FallbackRules,
    })
}

fn source_document(passage: &Passage) -> Option<&str> {
    Some(passage.document_id.as_str()).filter(|d| !d.is_empty())
}

/// Retrieval-only answer: the passage sentences that mention the most query
/// words, or a sentence-bounded prefix when none do.
#[must_use]
pub fn concise_answer(query: &str, passage: &str) -> String {
    let keywords: Vec<String> = query
        .to_lowercase()
        .split_whitespace()
        .filter(|w| w.chars().count() > 3)
        .map(str::to_string)
        .collect();

    let mut scored: Vec<(usize, &str)> = passage
        .split('.')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .filter_map(|sentence| {
            let lower = sentence.to_lowercase();
            let hits = keywords.iter().filter(|k| lower.contains(k.as_str())).count();
            (hits > 0).then_some((hits, sentence))
        })
        .collect();

    if !scored.is_empty() {
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        let best: Vec<&str> = scored
            .into_iter()
            .take(CONCISE_MAX_SENTENCES)
            .map(|(_, s)| s)
            .collect();
        return format!("{}.", best.join(". "));
    }

    let prefix = crate::query::normalize::char_prefix(passage.trim(), CONCISE_PREFIX_CHARS);
    match prefix.rfind('.') {
        Some(end) if end > 0 => prefix[..=end].to_string(),
        _ => prefix.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::{Document, extract_sections};
    use async_trait::async_trait;

    fn corpus_of(docs: &[(&str, &str)]) -> Arc<Corpus> {
        let mut snapshot = CorpusSnapshot::empty();
        for (id, text) in docs {
            snapshot.documents.insert(
                id.to_string(),
                Document {
                    id: id.to_string(),
                    text: text.to_string(),
                },
            );
            snapshot.sections.extend(extract_sections(text, id));
        }
        Arc::new(Corpus::new(snapshot))
    }

    struct Echo;

    #[async_trait]
    impl Generator for Echo {
        async fn generate(
            &self,
            system: &str,
            _prompt: &str,
            temperature: f32,
        ) -> Result<String, GenerationError> {
            Ok(format!("{} at {temperature}", &system[..12]))
        }
    }

    #[test]
    fn test_concise_answer_prefers_keyword_sentences() {
        let passage = "Leave is granted yearly. Casual leave may not exceed eight days. Pay is monthly.";
        assert_eq!(
            concise_answer("casual leave limit", passage),
            "Casual leave may not exceed eight days. Leave is granted yearly."
        );
    }

    #[test]
    fn test_concise_answer_falls_back_to_prefix() {
        let passage = format!("{}. {}", "a".repeat(200), "b".repeat(200));
        let answer = concise_answer("zzzz", &passage);
        assert_eq!(answer, format!("{}.", "a".repeat(200)));
    }

    #[tokio::test]
    async fn test_empty_query_message_everywhere() {
        let orchestrator = Orchestrator::new(corpus_of(&[]), &Config::default(), None, None);
        let response = orchestrator.answer(&QueryRequest::new("   ")).await;
        assert_eq!(response.exact_match, EMPTY_QUERY_MESSAGE);
        assert_eq!(response.ai_response, EMPTY_QUERY_MESSAGE);
        assert_eq!(response.enhanced_response, EMPTY_QUERY_MESSAGE);
        assert!(response.document_options.is_empty());
    }

    #[tokio::test]
    async fn test_generation_uses_both_passes() {
        let corpus = corpus_of(&[("docA", "3A. Consolidated Allowance. Ministers receive X.")]);
        let orchestrator =
            Orchestrator::new(corpus, &Config::default(), None, Some(Arc::new(Echo)));
        let response = orchestrator.answer(&QueryRequest::new("what is 3A")).await;

        assert_eq!(response.method, MatchMethod::Section);
        assert_eq!(response.ai_response, "You are an e at 0.3");
        assert_eq!(response.enhanced_response, "You are an e at 0.2");
        assert_eq!(response.document_id.as_deref(), Some("docA"));
    }

    #[tokio::test]
    async fn test_fallback_rules_answer_without_generator() {
        let mut snapshot = CorpusSnapshot::empty();
        snapshot.documents.insert(
            "hr".into(),
            Document {
                id: "hr".into(),
                text: "Unrelated body text.".into(),
            },
        );
        snapshot.rules.add_rule(
            "hr:policy_1",
            crate::fallback::RuleContent::Structured {
                text: "Remote work needs approval.".into(),
                kind: "policy".into(),
                keywords: vec!["remote".into()],
            },
        );
        let orchestrator = Orchestrator::new(
            Arc::new(Corpus::new(snapshot)),
            &Config::default(),
            None,
            None,
        );

        let response = orchestrator.answer(&QueryRequest::new("can I do remote work")).await;
        assert_eq!(response.method, MatchMethod::FallbackRules);
        assert_eq!(response.exact_match, "Remote work needs approval.");
        assert_eq!(
            response.ai_response,
            "Here's what I found in our policies: Remote work needs approval."
        );
        assert_eq!(response.document_id.as_deref(), Some("hr"));
    }

    struct Stalled;

    #[async_trait]
    impl Generator for Stalled {
        async fn generate(&self, _: &str, _: &str, _: f32) -> Result<String, GenerationError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok("late".into())
        }
    }

    #[tokio::test]
    async fn test_generation_timeout_is_a_query_error() {
        let orchestrator = Orchestrator::new(corpus_of(&[]), &Config::default(), None, None)
            .with_generation_timeout(Duration::from_millis(20));
        let err = orchestrator
            .generate(&Stalled, "system", "prompt", 0.3)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            QueryError::Generation(GenerationError::Timeout(_))
        ));
    }

    #[test]
    fn test_response_serializes_method_and_options() {
        let response = QueryResponse::message("x", 3);
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["method"], "none");
        assert_eq!(json["version"], 3);
        assert!(json.get("document_id").is_none());
        assert_eq!(json["document_options"], serde_json::json!([]));
    }
}
