use std::fs;

use anyhow::{Context as _, Result};
use chrono::Local;
use eframe::egui::{self, Color32, Key, RichText, ScrollArea, TextEdit};
use eframe::{App, Frame, NativeOptions};
use tokio::runtime::Runtime;
use tracing::{error, info};

use crate::config::Config;
use crate::error::SabiaError;
use crate::language::LanguageModel;
use crate::nlp::{Analysis, Sentiment};

const USER_COLOR: Color32 = Color32::from_rgb(96, 165, 250);
const BOT_COLOR: Color32 = Color32::from_rgb(134, 239, 172);
const SYSTEM_COLOR: Color32 = Color32::from_rgb(253, 224, 71);

/// Input handling mode. `Teaching` pairs each submitted line with a
/// feedback label instead of asking for a generated reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Normal,
    Teaching,
}

impl Mode {
    pub fn toggled(self) -> Mode {
        match self {
            Mode::Normal => Mode::Teaching,
            Mode::Teaching => Mode::Normal,
        }
    }

    fn toggle_label(self) -> &'static str {
        match self {
            Mode::Normal => "Modo Aprendizado",
            Mode::Teaching => "Sair do Aprendizado",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Speaker {
    User,
    Sabia,
    System,
}

impl Speaker {
    fn name(self) -> &'static str {
        match self {
            Speaker::User => "Você",
            Speaker::Sabia => "Sabiá",
            Speaker::System => "Sistema",
        }
    }

    fn color(self) -> Color32 {
        match self {
            Speaker::User => USER_COLOR,
            Speaker::Sabia => BOT_COLOR,
            Speaker::System => SYSTEM_COLOR,
        }
    }
}

#[derive(Debug, Clone)]
struct ChatLine {
    speaker: Speaker,
    text: String,
}

fn apology_for(err: &SabiaError) -> String {
    match err {
        SabiaError::Validation(m) => format!("Desculpe, não entendi o pedido: {m}"),
        SabiaError::NotFound(m) => format!("Desculpe, não encontrei isso: {m}"),
        SabiaError::Analysis(m) => {
            format!("Desculpe, não consegui analisar sua mensagem: {m}")
        }
        SabiaError::Generation(m) => {
            format!("Desculpe, não consegui gerar uma resposta: {m}")
        }
        SabiaError::Render(m) => format!("Desculpe, não consegui desenhar o mapa: {m}"),
        SabiaError::Io(e) => format!("Desculpe, houve um problema ao acessar os arquivos: {e}"),
        SabiaError::Serialization(e) => {
            format!("Desculpe, houve um problema ao salvar os dados: {e}")
        }
        SabiaError::Config(m) => format!("Desculpe, houve um problema de configuração: {m}"),
    }
}

fn compose_reply(reply: &str, analysis: &Analysis, sentiment: Sentiment) -> String {
    format!(
        "{}\n[análise: {} entidades, {} substantivos, {} verbos | sentimento: {}]",
        reply,
        analysis.entities.len(),
        analysis.nouns.len(),
        analysis.verbs.len(),
        sentiment
    )
}

pub struct SabiaApp {
    model: LanguageModel,
    config: Config,
    runtime: Runtime,
    mode: Mode,
    input: String,
    feedback: Sentiment,
    transcript: Vec<ChatLine>,
    key_dialog_open: bool,
    key_input: String,
}

impl SabiaApp {
    pub fn new(config: Config) -> Result<Self> {
        let runtime = Runtime::new().context("failed to start the async runtime")?;
        let model = LanguageModel::new(&config);

        Ok(SabiaApp {
            model,
            config,
            runtime,
            mode: Mode::Normal,
            input: String::new(),
            feedback: Sentiment::Neutral,
            transcript: vec![ChatLine {
                speaker: Speaker::Sabia,
                text: "Olá! Eu sou o Sabiá. Como posso ajudar?".to_string(),
            }],
            key_dialog_open: false,
            key_input: String::new(),
        })
    }

    fn push(&mut self, speaker: Speaker, text: String) {
        self.transcript.push(ChatLine { speaker, text });
    }

    fn report(&mut self, err: SabiaError) {
        error!(error = %err, "user action failed");
        let apology = apology_for(&err);
        self.push(Speaker::System, apology);
    }

    fn submit(&mut self) {
        let text = self.input.trim().to_string();
        if text.is_empty() {
            self.push(
                Speaker::System,
                "Por favor, digite algo antes de enviar.".to_string(),
            );
            return;
        }
        self.input.clear();
        self.push(Speaker::User, text.clone());

        match self.mode {
            Mode::Normal => self.handle_chat(&text),
            Mode::Teaching => self.handle_teach(&text),
        }
    }

    fn handle_chat(&mut self, text: &str) {
        match self.chat_outcome(text) {
            Ok(message) => self.push(Speaker::Sabia, message),
            Err(e) => self.report(e),
        }
    }

    fn chat_outcome(&mut self, text: &str) -> crate::error::Result<String> {
        let analysis = self.model.analyze(text)?;
        let sentiment = self.model.sentiment(text);
        let reply = self.runtime.block_on(self.model.reply(text))?;

        if let Some((first, rest)) = analysis.nouns.split_first() {
            self.model.map_concept(first, rest)?;
        }

        Ok(compose_reply(&reply, &analysis, sentiment))
    }

    fn handle_teach(&mut self, text: &str) {
        let label = self.feedback;
        match self.model.teach(text, &label.to_string()) {
            Ok(count) => self.push(
                Speaker::Sabia,
                format!("Obrigado! Aprendizado nº {count} registrado como \"{label}\"."),
            ),
            Err(e) => self.report(e),
        }
    }

    fn toggle_mode(&mut self) {
        self.mode = self.mode.toggled();
        info!(mode = ?self.mode, "input mode switched");
        let note = match self.mode {
            Mode::Teaching => "Modo aprendizado ativado. Escolha um rótulo e envie o texto.",
            Mode::Normal => "Modo aprendizado desativado.",
        };
        self.push(Speaker::System, note.to_string());
    }

    fn render_map(&mut self) {
        let path = self.config.map_file();
        match self.model.render_map(&path) {
            Ok(()) => {
                let stats = self.model.map_stats();
                self.push(
                    Speaker::System,
                    format!(
                        "Mapa mental salvo em {} ({} conceitos, {} relações).",
                        path.display(),
                        stats.concepts,
                        stats.relations
                    ),
                );
            }
            Err(e) => self.report(e),
        }
    }

    fn save_transcript(&mut self) {
        let stamp = Local::now().format("%Y%m%d_%H%M%S");
        let path = self.config.data_dir.join(format!("historico_{stamp}.txt"));
        match fs::write(&path, self.transcript_text()) {
            Ok(()) => {
                info!(path = %path.display(), "transcript saved");
                self.push(
                    Speaker::System,
                    format!("Histórico salvo em {}.", path.display()),
                );
            }
            Err(e) => self.report(SabiaError::Io(e)),
        }
    }

    fn transcript_text(&self) -> String {
        let mut out = String::new();
        for line in &self.transcript {
            out.push_str(line.speaker.name());
            out.push_str(": ");
            out.push_str(&line.text);
            out.push('\n');
        }
        out
    }

    fn apply_new_key(&mut self, key: &str) {
        match self.model.rotate_key(key) {
            Ok(()) => {
                self.config.api_key = Some(key.to_string());
                match self.config.save() {
                    Ok(()) => self.push(Speaker::System, "Chave da API atualizada.".to_string()),
                    Err(e) => self.report(e),
                }
            }
            Err(e) => self.report(e),
        }
    }

    fn header_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading(RichText::new("Sabiá").color(BOT_COLOR).strong());
            ui.separator();
            let (dot, color) = if self.model.has_credential() {
                ("●", Color32::from_rgb(80, 200, 120))
            } else {
                ("○", Color32::from_rgb(220, 80, 80))
            };
            ui.label(RichText::new(format!("{dot} API")).color(color));
            if self.mode == Mode::Teaching {
                ui.label(
                    RichText::new("modo aprendizado")
                        .color(SYSTEM_COLOR)
                        .italics(),
                );
            }
        });
    }

    fn input_panel(&mut self, ui: &mut egui::Ui) {
        if self.mode == Mode::Teaching {
            ui.horizontal(|ui| {
                ui.label("Rótulo:");
                ui.radio_value(&mut self.feedback, Sentiment::Positive, "positivo");
                ui.radio_value(&mut self.feedback, Sentiment::Negative, "negativo");
                ui.radio_value(&mut self.feedback, Sentiment::Neutral, "neutro");
            });
        }

        ui.horizontal(|ui| {
            let response = ui.add(
                TextEdit::singleline(&mut self.input)
                    .hint_text("Escreva sua mensagem...")
                    .desired_width(ui.available_width() - 72.0),
            );
            let submitted = response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
            if ui.button("Enviar").clicked() || submitted {
                self.submit();
                response.request_focus();
            }
        });

        ui.horizontal_wrapped(|ui| {
            if ui.button(self.mode.toggle_label()).clicked() {
                self.toggle_mode();
            }
            if ui.button("Gerar Mapa Mental").clicked() {
                self.render_map();
            }
            if ui.button("Salvar Histórico").clicked() {
                self.save_transcript();
            }
            if ui.button("Atualizar Chave API").clicked() {
                self.key_dialog_open = true;
            }
            if ui.button("Limpar Chat").clicked() {
                self.transcript.clear();
            }
        });
        ui.add_space(4.0);
    }

    fn transcript_panel(&self, ui: &mut egui::Ui) {
        ScrollArea::vertical()
            .auto_shrink([false, false])
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for line in &self.transcript {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(
                            RichText::new(format!("{}:", line.speaker.name()))
                                .color(line.speaker.color())
                                .strong(),
                        );
                        ui.label(&line.text);
                    });
                }
            });
    }

    fn key_dialog(&mut self, ctx: &egui::Context) {
        if !self.key_dialog_open {
            return;
        }
        let mut apply = false;
        let mut cancel = false;
        egui::Window::new("Atualizar Chave API")
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label("Nova chave:");
                ui.add(TextEdit::singleline(&mut self.key_input).password(true));
                ui.horizontal(|ui| {
                    apply = ui.button("Aplicar").clicked();
                    cancel = ui.button("Cancelar").clicked();
                });
            });

        if apply {
            let key = self.key_input.trim().to_string();
            self.key_input.clear();
            self.key_dialog_open = false;
            self.apply_new_key(&key);
        } else if cancel {
            self.key_input.clear();
            self.key_dialog_open = false;
        }
    }
}

impl App for SabiaApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut Frame) {
        egui::TopBottomPanel::top("cabecalho").show(ctx, |ui| self.header_bar(ui));
        egui::TopBottomPanel::bottom("entrada").show(ctx, |ui| self.input_panel(ui));
        egui::CentralPanel::default().show(ctx, |ui| self.transcript_panel(ui));
        self.key_dialog(ctx);
    }
}

pub fn run_gui(config: Config) -> Result<()> {
    let app = SabiaApp::new(config)?;
    let options = NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([560.0, 680.0]),
        ..Default::default()
    };
    eframe::run_native("Sabiá", options, Box::new(|_cc| Box::new(app)))
        .map_err(|e| anyhow::anyhow!("window loop failed: {e}"))
}
