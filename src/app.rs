use crate::completion::CompletionClient;
use crate::event::AppEvent;
use crate::sandbox::{DependencyManifest, PreviewHost};
use crate::state::{PlaygroundState, Sender, SubmitError};
use crate::theme::Theme;
use eframe::egui::{self, Color32, RichText, ScrollArea};
use egui_extras::syntax_highlighting::{self, CodeTheme};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};
use tracing::{info, warn};

const CHAT_PANEL_HEIGHT: f32 = 240.0;
const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(400);
const EDITOR_LANGUAGE: &str = "js";

enum EntryAction {
    Apply(usize),
    Toggle(usize),
}

pub struct ReactorApp {
    rx: Receiver<AppEvent>,
    completion: CompletionClient,
    preview: Box<dyn PreviewHost>,
    manifest: DependencyManifest,
    state: PlaygroundState,
    theme: Theme,
    editor_buffer: String,
    notice: Option<String>,
    diagnostics_log: Vec<String>,
    last_preview_error: Option<String>,
    edited_at: Option<Instant>,
    repaint_requested: bool,
    scroll_to_bottom: bool,
}

fn line_numbers(text: &str) -> String {
    let count = text.split('\n').count();
    let width = count.to_string().len();
    (1..=count)
        .map(|line| format!("{line:>width$}"))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ReactorApp {
    pub fn new(
        ctx: &egui::Context,
        rx: Receiver<AppEvent>,
        completion: CompletionClient,
        preview: Box<dyn PreviewHost>,
        state: PlaygroundState,
    ) -> Self {
        let theme = Theme::default();
        theme.apply_visuals(ctx);
        let editor_buffer = state.code().to_string();
        let mut app = Self {
            rx,
            completion,
            preview,
            manifest: DependencyManifest::default(),
            state,
            theme,
            editor_buffer,
            notice: None,
            diagnostics_log: Vec::new(),
            last_preview_error: None,
            edited_at: None,
            repaint_requested: false,
            scroll_to_bottom: false,
        };
        app.log_diagnostic(format!(
            "completion endpoint: {}",
            app.completion.endpoint()
        ));
        app.sync_preview();
        app
    }

    fn timestamp() -> String {
        match SystemTime::now().duration_since(UNIX_EPOCH) {
            Ok(duration) => duration.as_secs().to_string(),
            Err(_) => "0".to_string(),
        }
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics_log
            .push(format!("[{}] {}", Self::timestamp(), message.into()));
    }

    fn sync_preview(&mut self) {
        if let Err(err) = self.preview.load(self.state.code(), &self.manifest) {
            let message = err.to_string();
            if self.last_preview_error.as_deref() != Some(message.as_str()) {
                warn!(error = %message, "failed to update preview sandbox");
                self.log_diagnostic(format!("preview error: {message}"));
                self.last_preview_error = Some(message);
            }
        } else {
            self.last_preview_error = None;
        }
    }

    /// Apply and revert happen after the editor panel is drawn, so the new buffer
    /// needs another frame to show up.
    fn code_replaced(&mut self) {
        self.editor_buffer = self.state.code().to_string();
        self.edited_at = None;
        self.sync_preview();
        self.repaint_requested = true;
    }

    fn editor_edited(&mut self, now: Instant) {
        self.state.editor_changed(self.editor_buffer.clone());
        self.edited_at = Some(now);
    }

    /// Exports pending editor edits once typing has paused or the editor lost focus.
    fn flush_editor_edits(&mut self, now: Instant, force: bool) {
        let Some(edited_at) = self.edited_at else {
            return;
        };
        if force || now.duration_since(edited_at) >= PREVIEW_DEBOUNCE {
            self.edited_at = None;
            self.sync_preview();
        }
    }

    fn submit_prompt(&mut self, ctx: &egui::Context) {
        match self.state.submit_input() {
            Ok(submission) => {
                self.completion.submit(submission);
                self.scroll_to_bottom = true;
                ctx.request_repaint();
            }
            Err(SubmitError::EmptyPrompt) => {}
            Err(err @ SubmitError::RequestPending) => {
                self.log_diagnostic(format!("submit ignored: {err}"));
            }
        }
    }

    fn apply_entry(&mut self, index: usize) {
        match self.state.apply_entry(index) {
            Ok(()) => {
                info!(entry = index, "applied assistant code");
                self.log_diagnostic(format!("applied response #{index}"));
                self.code_replaced();
            }
            Err(err) => self.log_diagnostic(format!("apply failed: {err}")),
        }
    }

    fn revert(&mut self) {
        match self.state.revert() {
            Ok(()) => {
                info!("reverted to previous code");
                self.log_diagnostic("reverted to previous code");
                self.code_replaced();
            }
            Err(err) => self.notice = Some(err.to_string()),
        }
    }

    fn refresh_preview(&mut self) {
        if let Err(err) = self.preview.refresh() {
            warn!(error = %err, "failed to refresh preview sandbox");
            self.log_diagnostic(format!("preview refresh failed: {err}"));
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event, ctx),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn apply_event(&mut self, event: AppEvent, ctx: &egui::Context) {
        match event {
            AppEvent::CompletionResolved { id, outcome } => {
                if let Err(err) = &outcome {
                    self.log_diagnostic(format!("request {} failed: {err}", id.0));
                }
                self.state.request_resolved(id, outcome);
                self.scroll_to_bottom = true;
                ctx.request_repaint();
            }
        }
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let (status_label, status_color) = if self.state.is_pending() {
            ("Waiting for response...", self.theme.warning)
        } else {
            ("Idle", self.theme.success)
        };
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Reactor");
                ui.separator();
                ui.label(RichText::new(status_label).color(status_color));
                ui.separator();
                ui.label(
                    RichText::new(self.completion.endpoint()).color(self.theme.text_muted),
                );
            });
        });
    }

    fn render_editor_panel(&mut self, ctx: &egui::Context) {
        let width = ctx.screen_rect().width() * 0.5;
        egui::SidePanel::left("code_editor")
            .resizable(true)
            .default_width(width)
            .show(ctx, |ui| {
                ui.heading("App.js");
                ui.separator();

                let code_theme = CodeTheme::from_style(ui.style());
                let mut layouter = |ui: &egui::Ui, text: &str, _wrap_width: f32| {
                    let mut job = syntax_highlighting::highlight(
                        ui.ctx(),
                        ui.style(),
                        &code_theme,
                        text,
                        EDITOR_LANGUAGE,
                    );
                    // Wrapping would break the alignment with the line-number gutter.
                    job.wrap.max_width = f32::INFINITY;
                    ui.fonts(|fonts| fonts.layout_job(job))
                };

                let gutter = line_numbers(&self.editor_buffer);
                let gutter_color = self.theme.text_muted;
                let mut edited = false;
                let mut lost_focus = false;
                ScrollArea::both()
                    .id_salt("code_editor_scroll")
                    .auto_shrink([false, false])
                    .show(ui, |ui| {
                        ui.horizontal_top(|ui| {
                            egui::Frame::new()
                                .inner_margin(egui::Margin::symmetric(4, 2))
                                .show(ui, |ui| {
                                    ui.label(RichText::new(gutter).monospace().color(gutter_color));
                                });
                            let response = ui.add(
                                egui::TextEdit::multiline(&mut self.editor_buffer)
                                    .code_editor()
                                    .desired_width(f32::INFINITY)
                                    .desired_rows(30)
                                    .layouter(&mut layouter),
                            );
                            edited = response.changed();
                            lost_focus = response.lost_focus();
                        });
                    });

                let now = Instant::now();
                if edited {
                    self.editor_edited(now);
                }
                self.flush_editor_edits(now, lost_focus);
                if let Some(edited_at) = self.edited_at {
                    ctx.request_repaint_after(PREVIEW_DEBOUNCE.saturating_sub(edited_at.elapsed()));
                }
            });
    }

    fn render_preview_panel(&mut self, ctx: &egui::Context) {
        let status = self.preview.status();
        let mut refresh = false;
        let mut revert = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Preview");
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    revert = ui.button("Revert Code").clicked();
                    refresh = ui.button("Refresh").clicked();
                });
            });
            ui.separator();

            self.theme.card_frame().show(ui, |ui| {
                ui.label(RichText::new("Sandbox project").strong());
                ui.monospace(&status.location);
                ui.label(format!("Revision {}", status.revision));
                if self.state.previous_code().is_some() {
                    ui.label(
                        RichText::new("Previous code kept for revert").color(self.theme.text_muted),
                    );
                }
                match &status.last_error {
                    Some(error) => {
                        ui.label(RichText::new(error).color(self.theme.danger));
                    }
                    None => {
                        let hint = "Run a dev server in this directory to see the live preview.";
                        ui.label(RichText::new(hint).color(self.theme.text_muted));
                    }
                }
            });

            ui.add_space(self.theme.spacing_8);
            egui::CollapsingHeader::new("Dependencies")
                .default_open(false)
                .show(ui, |ui| {
                    for (name, version) in self.manifest.dependencies() {
                        ui.monospace(format!("{name}: {version}"));
                    }
                });
        });

        if refresh {
            self.refresh_preview();
        }
        if revert {
            self.revert();
        }
    }

    fn render_chat_panel(&mut self, ctx: &egui::Context) {
        let mut action = None;
        let mut send_now = false;

        egui::TopBottomPanel::bottom("chat_panel")
            .resizable(true)
            .default_height(CHAT_PANEL_HEIGHT)
            .show(ctx, |ui| {
                let transcript_height = (ui.available_height() - 90.0).max(80.0);
                ScrollArea::vertical()
                    .id_salt("chat_transcript")
                    .max_height(transcript_height)
                    .auto_shrink([false, true])
                    .stick_to_bottom(true)
                    .show(ui, |ui| {
                        for (index, entry) in self.state.transcript().iter().enumerate() {
                            ui.horizontal_wrapped(|ui| {
                                let color = match entry.sender {
                                    Sender::User => self.theme.accent_primary,
                                    Sender::Assistant => self.theme.success,
                                };
                                ui.label(
                                    RichText::new(format!("{}:", entry.sender.label()))
                                        .strong()
                                        .color(color),
                                );
                                match entry.sender {
                                    Sender::User => {
                                        ui.label(&entry.text);
                                    }
                                    Sender::Assistant if entry.is_error => {}
                                    Sender::Assistant => {
                                        if ui.small_button("Apply Code").clicked() {
                                            action = Some(EntryAction::Apply(index));
                                        }
                                        let toggle_label = if entry.expanded {
                                            "Hide Full Response"
                                        } else {
                                            "Show Full Response"
                                        };
                                        if ui.small_button(toggle_label).clicked() {
                                            action = Some(EntryAction::Toggle(index));
                                        }
                                    }
                                }
                            });

                            if entry.is_error {
                                let text = RichText::new(&entry.text).monospace();
                                ui.label(text.color(self.theme.danger));
                            } else if entry.expanded {
                                self.theme.card_frame().show(ui, |ui| {
                                    ui.monospace(&entry.text);
                                });
                            }
                        }

                        if self.state.is_pending() {
                            ui.horizontal(|ui| {
                                let sender = RichText::new("Assistant:").strong();
                                ui.label(sender.color(self.theme.success));
                                let thinking = RichText::new("thinking...").italics();
                                ui.label(thinking.color(self.theme.text_muted));
                            });
                        }

                        if self.scroll_to_bottom {
                            ui.scroll_to_cursor(Some(egui::Align::BOTTOM));
                        }
                    });
                self.scroll_to_bottom = false;

                egui::CollapsingHeader::new("Diagnostics")
                    .default_open(false)
                    .show(ui, |ui| {
                        ScrollArea::vertical()
                            .id_salt("diagnostics_log")
                            .max_height(90.0)
                            .stick_to_bottom(true)
                            .show(ui, |ui| {
                                for entry in &self.diagnostics_log {
                                    ui.label(entry);
                                }
                            });
                    });

                let can_submit = self.state.can_submit();
                self.theme.composer_frame().show(ui, |ui| {
                    ui.horizontal(|ui| {
                        let send_width = 80.0;
                        let response = ui.add(
                            egui::TextEdit::singleline(&mut self.state.input)
                                .desired_width(ui.available_width() - send_width)
                                .hint_text("Type your message"),
                        );
                        if response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                            send_now = true;
                        }

                        let clicked = ui
                            .add_enabled(can_submit, egui::Button::new("Send"))
                            .clicked();
                        send_now |= clicked;
                    });
                });
            });

        match action {
            Some(EntryAction::Apply(index)) => self.apply_entry(index),
            Some(EntryAction::Toggle(index)) => {
                self.state.toggle_expansion(index);
            }
            None => {}
        }
        if send_now {
            self.submit_prompt(ctx);
        }
    }

    fn render_notice(&mut self, ctx: &egui::Context) {
        let Some(message) = self.notice.clone() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("Notice")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message);
                ui.add_space(self.theme.spacing_8);
                let ok = egui::Button::new(RichText::new("OK").color(Color32::WHITE))
                    .fill(self.theme.accent_muted);
                dismissed = ui.add(ok).clicked();
            });
        if dismissed {
            self.notice = None;
        }
    }
}

impl eframe::App for ReactorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.render_top_bar(ctx);
        self.render_chat_panel(ctx);
        self.render_editor_panel(ctx);
        self.render_preview_panel(ctx);
        self.render_notice(ctx);

        if std::mem::take(&mut self.repaint_requested) {
            ctx.request_repaint();
        }
    }
}
