use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{Result, SabiaError};
use crate::genai::GenAiClient;
use crate::memory::MemoryStore;
use crate::mind_map::{MapStats, MindMap};
use crate::nlp::{Analysis, Analyzer, Sentiment};

pub const LEARNING_COUNTER_KEY: &str = "contador_aprendizado";
pub const LEARNING_KEY_PREFIX: &str = "aprendizado_";

/// Concept graph document persisted beside the store, so mapped concepts
/// accumulate across runs and one-shot commands.
#[derive(Serialize, Deserialize, Default)]
struct MapDocument {
    conceitos: Vec<String>,
    relacoes: Vec<(String, String, f64)>,
}

fn load_map(path: &Path) -> MindMap {
    let mut map = MindMap::new();
    if !path.exists() {
        return map;
    }
    let document: MapDocument = match fs::read_to_string(path)
        .map_err(SabiaError::from)
        .and_then(|raw| serde_json::from_str(&raw).map_err(SabiaError::from))
    {
        Ok(document) => document,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "unreadable concept map, starting empty");
            return map;
        }
    };
    for concept in &document.conceitos {
        let _ = map.add_concept(concept, &[]);
    }
    for (a, b, weight) in &document.relacoes {
        let _ = map.add_relation(a, b, *weight);
    }
    map
}

/// Facade over the analyzer, the key-value store, the concept graph and the
/// generation client. Owns one of each for its lifetime.
pub struct LanguageModel {
    analyzer: Analyzer,
    store: MemoryStore,
    map: MindMap,
    graph_path: PathBuf,
    genai: Option<GenAiClient>,
    model: String,
    max_tokens: u32,
}

impl LanguageModel {
    pub fn new(config: &Config) -> Self {
        let store = MemoryStore::open(config.memory_file(), config.memory_capacity);
        let graph_path = config.graph_file();
        let map = load_map(&graph_path);

        let genai = config
            .api_key
            .as_deref()
            .and_then(|key| match GenAiClient::new(key, config.model.clone()) {
                Ok(client) => Some(client),
                Err(e) => {
                    warn!(error = %e, "ignoring configured credential");
                    None
                }
            });

        LanguageModel {
            analyzer: Analyzer::new(),
            store,
            map,
            graph_path,
            genai,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
        }
    }

    fn save_map(&self) -> Result<()> {
        let document = MapDocument {
            conceitos: self.map.concepts(),
            relacoes: self.map.relations(),
        };
        let raw = serde_json::to_string_pretty(&document)?;
        fs::write(&self.graph_path, raw)?;
        Ok(())
    }

    // --- linguistic analysis ---

    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        self.analyzer.analyze(text)
    }

    pub fn sentiment(&self, text: &str) -> Sentiment {
        self.analyzer.sentiment(text)
    }

    pub fn keywords(&self, text: &str) -> Result<Vec<String>> {
        self.analyzer.keywords(text)
    }

    pub fn summarize(&self, text: &str, max_sentences: usize) -> Result<String> {
        self.analyzer.summarize(text, max_sentences)
    }

    // --- memory ---

    pub fn remember(&mut self, key: &str, value: Value) -> Result<()> {
        self.store.put(key, value)
    }

    pub fn recall(&self, key: &str) -> Option<Value> {
        self.store.get(key).cloned()
    }

    pub fn memory_keys(&self) -> Vec<String> {
        self.store.list_keys()
    }

    pub fn clear_memory(&mut self) -> Result<()> {
        self.store.clear()
    }

    pub fn backup_memory(&self, path: &Path) -> Result<()> {
        self.store.backup(path)
    }

    /// Records one piece of labeled feedback: analyzes `text`, bumps the
    /// persisted counter and stores the record under `aprendizado_{n}`.
    /// Returns the new counter value.
    pub fn teach(&mut self, text: &str, feedback: &str) -> Result<u64> {
        if text.trim().is_empty() {
            return Err(SabiaError::Validation("empty teaching text".to_string()));
        }
        let label: Sentiment = feedback.parse()?;
        let analysis = self.analyzer.analyze(text)?;

        let count = self.learning_count() + 1;
        let record = json!({
            "id": Uuid::new_v4().to_string(),
            "texto": text,
            "feedback": label.to_string(),
            "analise": analysis,
            "criado_em": Utc::now(),
        });

        self.store
            .put(&format!("{}{}", LEARNING_KEY_PREFIX, count), record)?;
        self.store.put(LEARNING_COUNTER_KEY, json!(count))?;

        info!(count, feedback = %label, "teaching recorded");
        Ok(count)
    }

    pub fn learning_count(&self) -> u64 {
        self.store
            .get(LEARNING_COUNTER_KEY)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    // --- concept map ---

    pub fn map_concept(&mut self, concept: &str, related: &[String]) -> Result<()> {
        self.map.add_concept(concept, related)?;
        self.save_map()
    }

    pub fn relate_concepts(&mut self, a: &str, b: &str, weight: f64) -> Result<()> {
        self.map.add_relation(a, b, weight)?;
        self.save_map()
    }

    pub fn reweight_relation(&mut self, a: &str, b: &str, weight: f64) -> Result<()> {
        self.map.update_weight(a, b, weight)?;
        self.save_map()
    }

    pub fn forget_concept(&mut self, label: &str) -> Result<()> {
        self.map.remove_concept(label)?;
        self.save_map()
    }

    pub fn related_concepts(&self, label: &str) -> Result<Vec<String>> {
        self.map.neighbors(label)
    }

    pub fn map_concepts(&self) -> Vec<String> {
        self.map.concepts()
    }

    pub fn map_relations(&self) -> Vec<(String, String, f64)> {
        self.map.relations()
    }

    pub fn map_stats(&self) -> MapStats {
        self.map.stats()
    }

    pub fn render_map(&self, path: &Path) -> Result<()> {
        self.map.render(path)
    }

    // --- generation ---

    pub fn has_credential(&self) -> bool {
        self.genai.is_some()
    }

    /// Swaps the generation credential, creating the client when none was
    /// configured at startup.
    pub fn rotate_key(&mut self, new_key: &str) -> Result<()> {
        match self.genai.as_mut() {
            Some(client) => client.rotate_key(new_key),
            None => {
                self.genai = Some(GenAiClient::new(new_key, self.model.clone())?);
                Ok(())
            }
        }
    }

    /// Asks the generation client for a reply. Generation failures are
    /// surfaced as analysis errors with the original message kept.
    pub async fn reply(&self, text: &str) -> Result<String> {
        let client = self.genai.as_ref().ok_or_else(|| {
            SabiaError::Analysis(
                "no generation credential configured (set OPENAI_API_KEY)".to_string(),
            )
        })?;

        client
            .generate(text, self.max_tokens)
            .await
            .map_err(|e| match e {
                SabiaError::Generation(message) => SabiaError::Analysis(message),
                other => other,
            })
    }

    #[cfg(test)]
    fn attach_client(&mut self, client: GenAiClient) {
        self.genai = Some(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::{tempdir, TempDir};

    fn test_model(dir: &TempDir) -> LanguageModel {
        let mut config = Config::new(Some(dir.path().to_path_buf())).unwrap();
        config.api_key = None;
        LanguageModel::new(&config)
    }

    #[test]
    fn remember_then_recall_roundtrip() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);

        model.remember("k", json!("v")).unwrap();
        assert_eq!(model.recall("k"), Some(json!("v")));
        assert_eq!(model.recall("unset"), None);
    }

    #[test]
    fn teach_stores_a_retrievable_record() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);
        assert_eq!(model.learning_count(), 0);

        let text = "O projeto ficou excelente depois da revisão.";
        let count = model.teach(text, "positivo").unwrap();
        assert_eq!(count, 1);
        assert_eq!(model.learning_count(), 1);

        let record = model.recall("aprendizado_1").unwrap();
        assert_eq!(record["texto"], text);
        assert_eq!(record["feedback"], "positivo");
        assert!(record["analise"]["substantivos"].is_array());
        assert!(record["id"].is_string());

        // the counter and the record survive a fresh facade over the same data
        let reopened = test_model(&dir);
        assert_eq!(reopened.learning_count(), 1);
        assert!(reopened.recall("aprendizado_1").is_some());

        let mut model = reopened;
        assert_eq!(model.teach("Que dia ruim.", "negativo").unwrap(), 2);
    }

    #[test]
    fn teach_validates_both_arguments() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);

        assert!(matches!(
            model.teach("", "positivo"),
            Err(SabiaError::Validation(_))
        ));
        assert!(matches!(
            model.teach("texto qualquer", "great"),
            Err(SabiaError::Validation(_))
        ));
        assert_eq!(model.learning_count(), 0);
        assert!(model.recall("aprendizado_1").is_none());
    }

    #[test]
    fn concept_map_survives_a_reopen() {
        let dir = tempdir().unwrap();
        {
            let mut model = test_model(&dir);
            model.map_concept("Rust", &["Sistemas".to_string()]).unwrap();
            model.relate_concepts("Rust", "Velocidade", 2.0).unwrap();
        }

        let reopened = test_model(&dir);
        let related: std::collections::HashSet<String> = reopened
            .related_concepts("Rust")
            .unwrap()
            .into_iter()
            .collect();
        assert!(related.contains("Sistemas"));
        assert!(related.contains("Velocidade"));
        assert!(reopened.map_relations().iter().any(|(a, b, w)| {
            let pair = (a.as_str(), b.as_str());
            (pair == ("Rust", "Velocidade") || pair == ("Velocidade", "Rust")) && *w == 2.0
        }));
    }

    #[test]
    fn corrupt_map_documents_load_as_empty() {
        let dir = tempdir().unwrap();
        let mut config = Config::new(Some(dir.path().to_path_buf())).unwrap();
        config.api_key = None;
        std::fs::write(config.graph_file(), "{ not json").unwrap();

        let model = LanguageModel::new(&config);
        assert_eq!(model.map_stats().concepts, 0);
    }

    #[test]
    fn concept_passthroughs_reach_the_map() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);

        model
            .map_concept(
                "Python",
                &["Programação".to_string(), "Linguagem".to_string()],
            )
            .unwrap();

        let related: std::collections::HashSet<String> =
            model.related_concepts("Python").unwrap().into_iter().collect();
        assert!(related.contains("Programação"));
        assert!(related.contains("Linguagem"));
        assert_eq!(model.map_stats().concepts, 3);

        let path = dir.path().join("mapa.svg");
        model.render_map(&path).unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reply_without_credential_is_an_analysis_error() {
        let dir = tempdir().unwrap();
        let model = test_model(&dir);

        match model.reply("Olá!").await {
            Err(SabiaError::Analysis(message)) => {
                assert!(message.contains("credential"))
            }
            other => panic!("expected an analysis error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn reply_wraps_generation_failures_with_their_message() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);
        let client = GenAiClient::new("sk-test", "gpt-3.5-turbo")
            .unwrap()
            .with_api_base("http://127.0.0.1:9");
        model.attach_client(client);

        match model.reply("Olá!").await {
            Err(SabiaError::Analysis(message)) => assert!(!message.is_empty()),
            other => panic!("expected an analysis error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn rotate_key_creates_the_client_when_missing() {
        let dir = tempdir().unwrap();
        let mut model = test_model(&dir);
        assert!(!model.has_credential());

        assert!(matches!(
            model.rotate_key(""),
            Err(SabiaError::Validation(_))
        ));
        assert!(!model.has_credential());

        model.rotate_key("sk-nova").unwrap();
        assert!(model.has_credential());
    }

    #[test]
    fn analysis_passthroughs_work() {
        let dir = tempdir().unwrap();
        let model = test_model(&dir);

        let analysis = model
            .analyze("O gato preto pulou sobre o muro alto.")
            .unwrap();
        assert!(analysis.nouns.iter().any(|n| n == "gato"));

        assert_eq!(model.sentiment("O dia está ótimo!"), Sentiment::Positive);

        let keywords = model.keywords("O gato subiu no telhado.").unwrap();
        assert!(keywords.iter().any(|k| k == "gato"));

        let summary = model
            .summarize("Uma frase. Outra frase. Mais uma.", 1)
            .unwrap();
        assert_eq!(summary, "Uma frase.");
    }
}
