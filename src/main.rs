mod app;
mod completion;
mod config;
mod event;
mod sandbox;
mod state;
mod theme;

use app::ReactorApp;
use completion::CompletionClient;
use config::Config;
use eframe::egui;
use sandbox::ProjectExportHost;
use state::PlaygroundState;
use std::sync::mpsc;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("reactor=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_tracing();

    let config = Config::load()?;
    let (tx, rx) = mpsc::channel();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("reactor-runtime")
        .build()?;

    let completion = runtime.block_on(async { CompletionClient::new(&config, tx) })?;
    let preview = ProjectExportHost::new(config.sandbox_dir.clone());
    let state = PlaygroundState::new(state::INITIAL_CODE, config.submit_policy);
    info!(
        sandbox = %config.sandbox_dir.display(),
        policy = ?config.submit_policy,
        "starting reactor"
    );
    let _runtime = runtime;

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1440.0, 900.0])
            .with_min_inner_size([1024.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "Reactor",
        native_options,
        Box::new(move |creation_context| {
            let ctx = creation_context.egui_ctx.clone();
            let completion = completion.with_repaint(move || ctx.request_repaint());
            Ok(Box::new(ReactorApp::new(
                &creation_context.egui_ctx,
                rx,
                completion,
                Box::new(preview),
                state,
            )))
        }),
    )?;

    Ok(())
}
