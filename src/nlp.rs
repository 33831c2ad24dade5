use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SabiaError};

/// Articles, prepositions, pronouns, conjunctions and common adverbs.
/// Closed-class words never land in the noun or verb buckets.
const FUNCTION_WORDS: &[&str] = &[
    // articles and contractions
    "o", "a", "os", "as", "um", "uma", "uns", "umas", "ao", "aos", "à", "às", "do", "da", "dos",
    "das", "no", "na", "nos", "nas", "pelo", "pela", "pelos", "pelas", "num", "numa", "dum",
    "duma",
    // prepositions
    "de", "em", "para", "por", "com", "sem", "sobre", "sob", "entre", "até", "desde", "após",
    "contra", "perante", "durante",
    // pronouns and determiners
    "eu", "tu", "ele", "ela", "nós", "vós", "eles", "elas", "você", "vocês", "me", "te", "se",
    "lhe", "lhes", "meu", "minha", "meus", "minhas", "seu", "sua", "seus", "suas", "teu", "tua",
    "este", "esta", "isto", "esse", "essa", "isso", "aquele", "aquela", "aquilo", "que", "quem",
    "qual", "quais", "cujo", "cuja", "outro", "outra", "outros", "outras", "todo", "toda",
    "todos", "todas", "cada", "algum", "alguma", "nenhum", "nenhuma",
    // conjunctions
    "e", "ou", "mas", "porém", "pois", "porque", "como", "quando", "enquanto", "onde", "nem",
    "então", "portanto", "contudo", "todavia", "embora", "caso",
    // common adverbs and interjections
    "não", "sim", "já", "ainda", "também", "só", "apenas", "muito", "pouco", "mais", "menos",
    "bem", "mal", "sempre", "nunca", "hoje", "ontem", "amanhã", "aqui", "ali", "lá", "cá",
    "agora", "depois", "antes", "tão", "quão", "olá", "oi",
];

/// Copulas, auxiliaries and a handful of high-frequency irregular forms that
/// the suffix rules below would miss.
const AUX_VERBS: &[&str] = &[
    "é", "são", "era", "eram", "foi", "foram", "seja", "sejam", "ser", "sendo", "sido", "sou",
    "somos", "está", "estão", "estava", "estavam", "esteve", "estiveram", "estar", "estando",
    "estou", "estamos", "tem", "têm", "tinha", "tinham", "teve", "tiveram", "ter", "tendo",
    "tido", "tenho", "temos", "há", "havia", "houve", "haver", "vai", "vão", "ia", "iam", "ir",
    "indo", "vou", "vamos", "pode", "podem", "podia", "podiam", "poder", "posso", "deve",
    "devem", "devia", "deviam", "dever", "quer", "querem", "queria", "quero", "faz", "fazem",
    "fazia", "fez", "fizeram", "fazer", "diz", "dizem", "disse", "disseram", "dizer",
];

/// Conjugation endings checked against lowercased tokens. A match needs at
/// least two stem characters so short nouns like "rei" stay out.
const VERB_SUFFIXES: &[&str] = &[
    "ou", "eu", "iu", "aram", "eram", "iram", "ava", "avam", "ia", "ando", "endo", "indo", "ar",
    "er", "ir", "amos", "emos", "imos", "ei",
];

const POSITIVE_WORDS: &[&str] = &["bom", "ótimo", "excelente", "maravilhoso", "feliz", "alegre"];
const NEGATIVE_WORDS: &[&str] = &["ruim", "péssimo", "terrível", "horrível", "triste", "infeliz"];

/// One analysis pass over one input. Field names serialize with the
/// Portuguese keys the store documents have always used.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Analysis {
    #[serde(rename = "entidades")]
    pub entities: Vec<String>,
    pub tokens: Vec<String>,
    #[serde(rename = "substantivos")]
    pub nouns: Vec<String>,
    #[serde(rename = "verbos")]
    pub verbs: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sentiment {
    #[serde(rename = "positivo")]
    Positive,
    #[serde(rename = "negativo")]
    Negative,
    #[serde(rename = "neutro")]
    Neutral,
}

impl std::fmt::Display for Sentiment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "positivo"),
            Sentiment::Negative => write!(f, "negativo"),
            Sentiment::Neutral => write!(f, "neutro"),
        }
    }
}

impl std::str::FromStr for Sentiment {
    type Err = SabiaError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "positivo" => Ok(Sentiment::Positive),
            "negativo" => Ok(Sentiment::Negative),
            "neutro" => Ok(Sentiment::Neutral),
            other => Err(SabiaError::Validation(format!(
                "invalid feedback label '{}' (expected positivo, negativo or neutro)",
                other
            ))),
        }
    }
}

/// Lexicon-and-suffix heuristic tagger for Portuguese. Deliberately small:
/// closed-class words are filtered out, conjugation endings mark verbs,
/// capitalized mid-sentence tokens mark entities, everything else is a noun.
pub struct Analyzer {
    function_words: HashSet<&'static str>,
    aux_verbs: HashSet<&'static str>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl Analyzer {
    pub fn new() -> Self {
        Analyzer {
            function_words: FUNCTION_WORDS.iter().copied().collect(),
            aux_verbs: AUX_VERBS.iter().copied().collect(),
        }
    }

    /// Splits `text` into tokens and partitions them into entities, nouns
    /// and verbs. Empty or whitespace-only input is an analysis failure.
    pub fn analyze(&self, text: &str) -> Result<Analysis> {
        if text.trim().is_empty() {
            return Err(SabiaError::Analysis("empty input text".to_string()));
        }

        let mut analysis = Analysis {
            entities: Vec::new(),
            tokens: Vec::new(),
            nouns: Vec::new(),
            verbs: Vec::new(),
        };

        let mut sentence_start = true;
        for raw in text.split_whitespace() {
            let word = raw.trim_matches(|c: char| !c.is_alphanumeric());
            if word.is_empty() {
                sentence_start = ends_sentence(raw);
                continue;
            }

            let lower = word.to_lowercase();
            analysis.tokens.push(word.to_string());

            if self.function_words.contains(lower.as_str()) {
                // closed class, ignore
            } else if self.aux_verbs.contains(lower.as_str()) || has_verb_suffix(&lower) {
                analysis.verbs.push(word.to_string());
            } else if is_capitalized(word) && !sentence_start {
                analysis.entities.push(word.to_string());
            } else {
                analysis.nouns.push(word.to_string());
            }

            sentence_start = ends_sentence(raw);
        }

        Ok(analysis)
    }

    /// Counts fixed positive and negative keywords (case-insensitive
    /// substring match) and returns the strict majority; ties are neutral.
    pub fn sentiment(&self, text: &str) -> Sentiment {
        let lowered = text.to_lowercase();
        let positives: usize = POSITIVE_WORDS
            .iter()
            .map(|w| lowered.matches(w).count())
            .sum();
        let negatives: usize = NEGATIVE_WORDS
            .iter()
            .map(|w| lowered.matches(w).count())
            .sum();

        match positives.cmp(&negatives) {
            std::cmp::Ordering::Greater => Sentiment::Positive,
            std::cmp::Ordering::Less => Sentiment::Negative,
            std::cmp::Ordering::Equal => Sentiment::Neutral,
        }
    }

    /// Nouns and entities, deduplicated case-insensitively, first-seen order.
    pub fn keywords(&self, text: &str) -> Result<Vec<String>> {
        let analysis = self.analyze(text)?;
        let mut seen = HashSet::new();
        let mut keywords = Vec::new();
        for word in analysis.nouns.iter().chain(analysis.entities.iter()) {
            if seen.insert(word.to_lowercase()) {
                keywords.push(word.clone());
            }
        }
        Ok(keywords)
    }

    /// Leading-sentence summary: the first `max_sentences` sentences joined
    /// back together.
    pub fn summarize(&self, text: &str, max_sentences: usize) -> Result<String> {
        if text.trim().is_empty() {
            return Err(SabiaError::Analysis("empty input text".to_string()));
        }
        if max_sentences == 0 {
            return Err(SabiaError::Validation(
                "max_sentences must be positive".to_string(),
            ));
        }

        let mut sentences = Vec::new();
        let mut current = String::new();
        for ch in text.chars() {
            current.push(ch);
            if matches!(ch, '.' | '!' | '?') {
                let sentence = current.trim();
                if !sentence.is_empty() {
                    sentences.push(sentence.to_string());
                }
                current.clear();
            }
        }
        let trailing = current.trim();
        if !trailing.is_empty() {
            sentences.push(trailing.to_string());
        }

        sentences.truncate(max_sentences);
        Ok(sentences.join(" "))
    }
}

fn has_verb_suffix(lower: &str) -> bool {
    VERB_SUFFIXES.iter().any(|suffix| {
        lower
            .strip_suffix(suffix)
            .map_or(false, |stem| stem.chars().count() >= 2)
    })
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().map_or(false, |c| c.is_uppercase())
}

fn ends_sentence(raw: &str) -> bool {
    raw.ends_with(['.', '!', '?', ':', ';'])
}
