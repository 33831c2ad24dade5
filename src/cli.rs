use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::*;

use crate::config::Config;
use crate::genai::GenAiClient;
use crate::language::LanguageModel;
use crate::nlp::Sentiment;

#[derive(Parser)]
#[command(
    name = "sabia",
    about = "Chatbot de mesa com análise de linguagem em português",
    version
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send one message and print the analyzed reply
    Chat {
        message: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print entities, nouns, verbs and sentiment for a text
    Analyze {
        text: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Store one labeled training example
    Teach {
        text: String,
        /// Feedback label (positivo, negativo, neutro)
        #[arg(long, default_value = "neutro")]
        feedback: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Extract keywords (nouns and entities)
    Keywords {
        text: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Shorten a text to its leading sentences
    Summarize {
        text: String,
        /// Maximum number of sentences to keep
        #[arg(long, default_value = "3")]
        sentences: usize,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Concept map operations
    Map {
        #[command(subcommand)]
        command: MapCommands,
    },
    /// Key-value memory operations
    Memory {
        #[command(subcommand)]
        command: MemoryCommands,
    },
    /// Configuration inspection
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum MapCommands {
    /// Add a concept linked to zero or more related concepts
    Add {
        concept: String,
        related: Vec<String>,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Create or overwrite a weighted relation
    Relate {
        a: String,
        b: String,
        /// Relation weight
        #[arg(long, default_value = "1.0")]
        weight: f64,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Change the weight of an existing relation
    Weight {
        a: String,
        b: String,
        weight: f64,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Remove a concept and all its relations
    Remove {
        label: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// List the concepts related to a label
    Neighbors {
        label: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Render the map to an SVG file
    Render {
        /// Output path (defaults to mapa_mental.svg in the data dir)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Show concept and relation counts
    Stats {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum MemoryCommands {
    /// List stored keys in insertion order
    List {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Print the value stored under a key
    Get {
        key: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Store a value under a key (parsed as JSON, else kept as a string)
    Set {
        key: String,
        value: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Remove every stored entry
    Clear {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Copy the store document to another path
    Backup {
        path: PathBuf,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the effective configuration
    Show {
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
    /// Store a new generation API key in config.json
    SetKey {
        key: String,
        /// Data directory path
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },
}

fn parse_value(raw: &str) -> serde_json::Value {
    serde_json::from_str(raw).unwrap_or_else(|_| serde_json::Value::String(raw.to_string()))
}

fn join_or_dash(items: &[String]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items.join(", ")
    }
}

fn sentiment_colored(sentiment: Sentiment) -> ColoredString {
    match sentiment {
        Sentiment::Positive => "positivo".green(),
        Sentiment::Negative => "negativo".red(),
        Sentiment::Neutral => "neutro".yellow(),
    }
}

pub async fn handle_chat(message: String, data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let mut model = LanguageModel::new(&config);

    let analysis = model.analyze(&message)?;
    let sentiment = model.sentiment(&message);
    let reply = model.reply(&message).await?;

    if let Some((first, rest)) = analysis.nouns.split_first() {
        model.map_concept(first, rest)?;
    }

    println!("{}: {}", "Você".cyan(), message);
    println!("{}: {}", "Sabiá".green(), reply);
    println!(
        "{}",
        format!(
            "[análise: {} entidades, {} substantivos, {} verbos | sentimento: {}]",
            analysis.entities.len(),
            analysis.nouns.len(),
            analysis.verbs.len(),
            sentiment
        )
        .dimmed()
    );

    Ok(())
}

pub async fn handle_analyze(text: String, data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let model = LanguageModel::new(&config);

    let analysis = model.analyze(&text)?;
    let sentiment = model.sentiment(&text);

    println!("{}", "Análise".cyan().bold());
    println!("  Entidades:    {}", join_or_dash(&analysis.entities));
    println!("  Substantivos: {}", join_or_dash(&analysis.nouns));
    println!("  Verbos:       {}", join_or_dash(&analysis.verbs));
    println!("  Tokens:       {}", analysis.tokens.len());
    println!("  Sentimento:   {}", sentiment_colored(sentiment));

    Ok(())
}

pub async fn handle_teach(
    text: String,
    feedback: String,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(data_dir)?;
    let mut model = LanguageModel::new(&config);

    let count = model.teach(&text, &feedback)?;
    println!(
        "{} aprendizado nº {} registrado como \"{}\"",
        "✓".green(),
        count,
        feedback.trim().to_lowercase()
    );

    Ok(())
}

pub async fn handle_keywords(text: String, data_dir: Option<PathBuf>) -> Result<()> {
    let config = Config::new(data_dir)?;
    let model = LanguageModel::new(&config);

    let keywords = model.keywords(&text)?;
    if keywords.is_empty() {
        println!("{}", "nenhuma palavra-chave encontrada".yellow());
        return Ok(());
    }

    println!("{}", "Palavras-chave".cyan().bold());
    for keyword in keywords {
        println!("  {}", keyword);
    }

    Ok(())
}

pub async fn handle_summarize(
    text: String,
    sentences: usize,
    data_dir: Option<PathBuf>,
) -> Result<()> {
    let config = Config::new(data_dir)?;
    let model = LanguageModel::new(&config);

    let summary = model.summarize(&text, sentences)?;
    println!("{}", "Resumo".cyan().bold());
    println!("{}", summary);

    Ok(())
}

pub async fn handle_map(command: MapCommands) -> Result<()> {
    match command {
        MapCommands::Add {
            concept,
            related,
            data_dir,
        } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.map_concept(&concept, &related)?;
            println!(
                "{} conceito \"{}\" adicionado ({} relações)",
                "✓".green(),
                concept,
                related.len()
            );
        }
        MapCommands::Relate {
            a,
            b,
            weight,
            data_dir,
        } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.relate_concepts(&a, &b, weight)?;
            println!(
                "{} relação {} com peso {:.1}",
                "✓".green(),
                format!("{a} ↔ {b}").cyan(),
                weight
            );
        }
        MapCommands::Weight {
            a,
            b,
            weight,
            data_dir,
        } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.reweight_relation(&a, &b, weight)?;
            println!(
                "{} peso de {} atualizado para {:.1}",
                "✓".green(),
                format!("{a} ↔ {b}").cyan(),
                weight
            );
        }
        MapCommands::Remove { label, data_dir } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.forget_concept(&label)?;
            println!("{} conceito \"{}\" removido", "✓".green(), label);
        }
        MapCommands::Neighbors { label, data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            let neighbors = model.related_concepts(&label)?;
            println!("{}", format!("Relacionados a \"{}\"", label).cyan().bold());
            if neighbors.is_empty() {
                println!("  (nenhum)");
            }
            for neighbor in neighbors {
                println!("  {}", neighbor);
            }
        }
        MapCommands::Render { output, data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            let path = output.unwrap_or_else(|| config.map_file());
            model.render_map(&path)?;
            println!("{} mapa salvo em {}", "✓".green(), path.display());
        }
        MapCommands::Stats { data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            let stats = model.map_stats();
            println!("{}", "Mapa Mental".cyan().bold());
            println!("  Conceitos: {}", stats.concepts);
            println!("  Relações:  {}", stats.relations);
            for concept in model.map_concepts() {
                println!("  {}", concept.dimmed());
            }
        }
    }

    Ok(())
}

pub async fn handle_memory(command: MemoryCommands) -> Result<()> {
    match command {
        MemoryCommands::List { data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            let keys = model.memory_keys();
            println!("{}", format!("Memória ({})", keys.len()).cyan().bold());
            for key in keys {
                println!("  {}", key);
            }
        }
        MemoryCommands::Get { key, data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            match model.recall(&key) {
                Some(value) => println!("{}", serde_json::to_string_pretty(&value)?),
                None => println!("{}", "(não encontrado)".yellow()),
            }
        }
        MemoryCommands::Set {
            key,
            value,
            data_dir,
        } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.remember(&key, parse_value(&value))?;
            println!("{} \"{}\" gravado", "✓".green(), key);
        }
        MemoryCommands::Clear { data_dir } => {
            let config = Config::new(data_dir)?;
            let mut model = LanguageModel::new(&config);
            model.clear_memory()?;
            println!("{} memória esvaziada", "✓".green());
        }
        MemoryCommands::Backup { path, data_dir } => {
            let config = Config::new(data_dir)?;
            let model = LanguageModel::new(&config);
            model.backup_memory(&path)?;
            println!("{} cópia escrita em {}", "✓".green(), path.display());
        }
    }

    Ok(())
}

pub async fn handle_config(command: ConfigCommands) -> Result<()> {
    match command {
        ConfigCommands::Show { data_dir } => {
            let config = Config::new(data_dir)?;
            println!("{}", "Configuração".cyan().bold());
            println!("  Diretório:    {}", config.data_dir.display());
            println!("  Debug:        {}", config.debug);
            println!("  Nível de log: {}", config.log_level);
            println!("  Modelo:       {}", config.model);
            println!("  Max tokens:   {}", config.max_tokens);
            println!("  Capacidade:   {} entradas", config.memory_capacity);
            println!(
                "  Chave API:    {}",
                if config.api_key.is_some() {
                    "definida".green()
                } else {
                    "ausente".yellow()
                }
            );
            println!(
                "  {}",
                format!(
                    "banco (reservado): {}:{}/{}",
                    config.database.host, config.database.port, config.database.name
                )
                .dimmed()
            );
        }
        ConfigCommands::SetKey { key, data_dir } => {
            let mut config = Config::new(data_dir)?;
            // construction validates the credential shape
            GenAiClient::new(&key, config.model.clone())?;
            config.api_key = Some(key.trim().to_string());
            config.save()?;
            println!("{} chave da API gravada em config.json", "✓".green());
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn no_subcommand_means_gui() {
        let args = Args::try_parse_from(["sabia"]).unwrap();
        assert!(args.command.is_none());
    }

    #[test]
    fn chat_takes_a_positional_message() {
        let args = Args::try_parse_from(["sabia", "chat", "Olá, tudo bem?"]).unwrap();
        match args.command {
            Some(Commands::Chat { message, data_dir }) => {
                assert_eq!(message, "Olá, tudo bem?");
                assert!(data_dir.is_none());
            }
            _ => panic!("expected the chat command"),
        }
    }

    #[test]
    fn map_relate_parses_the_weight_flag() {
        let args =
            Args::try_parse_from(["sabia", "map", "relate", "A", "B", "--weight", "2.5"]).unwrap();
        match args.command {
            Some(Commands::Map {
                command: MapCommands::Relate { a, b, weight, .. },
            }) => {
                assert_eq!(a, "A");
                assert_eq!(b, "B");
                assert_eq!(weight, 2.5);
            }
            _ => panic!("expected map relate"),
        }
    }

    #[test]
    fn teach_defaults_to_neutral_feedback() {
        let args = Args::try_parse_from(["sabia", "teach", "algum texto"]).unwrap();
        match args.command {
            Some(Commands::Teach { feedback, .. }) => assert_eq!(feedback, "neutro"),
            _ => panic!("expected the teach command"),
        }
    }

    #[test]
    fn config_set_key_takes_a_positional_key() {
        let args = Args::try_parse_from(["sabia", "config", "set-key", "sk-nova"]).unwrap();
        match args.command {
            Some(Commands::Config {
                command: ConfigCommands::SetKey { key, .. },
            }) => assert_eq!(key, "sk-nova"),
            _ => panic!("expected config set-key"),
        }
    }

    #[test]
    fn memory_set_values_parse_as_json_with_string_fallback() {
        assert_eq!(parse_value("3"), json!(3));
        assert_eq!(parse_value("{\"a\": 1}"), json!({"a": 1}));
        assert_eq!(parse_value("olá"), json!("olá"));
        assert_eq!(parse_value("true"), json!(true));
    }

    #[test]
    fn join_or_dash_marks_empty_lists() {
        assert_eq!(join_or_dash(&[]), "-");
        assert_eq!(join_or_dash(&["a".to_string(), "b".to_string()]), "a, b");
    }
}
