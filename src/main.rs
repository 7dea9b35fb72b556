use anyhow::Context;
use overlay_input::controller::HotkeyAction;
use overlay_input::events::{RuntimeEvent, RuntimeEventSink};
use overlay_input::passthrough::DetachedWindow;
use overlay_input::{
    logging, ControlScene, InputEngine, PassthroughManager, RunController, RunOptions,
    RuntimeSettings, SessionConfig,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

const APP_DIR: &str = "overlay_input";

/// Logs the notifications a UI would normally render.
struct LogSink;

impl RuntimeEventSink for LogSink {
    fn dispatch(&self, event: RuntimeEvent) {
        match event {
            RuntimeEvent::CursorOnUi(_)
            | RuntimeEvent::HoverProgress { .. }
            | RuntimeEvent::AutoCenterProgress { .. } => {}
            other => tracing::debug!(?other, "runtime event"),
        }
    }
}

fn settings_path() -> PathBuf {
    if let Some(arg) = std::env::args_os().nth(1) {
        return PathBuf::from(arg);
    }
    dirs_next::config_dir()
        .map(|dir| dir.join(APP_DIR).join("settings.json"))
        .unwrap_or_else(|| PathBuf::from("settings.json"))
}

fn log_path(settings: &RuntimeSettings) -> Option<PathBuf> {
    settings.log_file.clone().or_else(|| {
        dirs_next::data_local_dir().map(|dir| dir.join(APP_DIR).join("overlay_input.log"))
    })
}

fn main() -> anyhow::Result<()> {
    let path = settings_path();
    let settings = RuntimeSettings::load(&path)
        .with_context(|| format!("failed to load settings from {}", path.display()))?;
    logging::init(settings.debug_logging, log_path(&settings));
    tracing::info!(settings = %path.display(), controls = settings.controls.len(), "overlay host starting");

    let (jitter_min, jitter_max) = settings.click_jitter_ms;
    let engine = Arc::new(InputEngine::platform().with_click_jitter(jitter_min, jitter_max));
    let sink: Arc<dyn RuntimeEventSink> = Arc::new(LogSink);
    let passthrough = PassthroughManager::new(
        Box::new(DetachedWindow::default()),
        Arc::clone(&engine),
        Arc::clone(&sink),
    )
    .with_restore_delay(Duration::from_millis(settings.forward_click_restore_ms));

    let mut controller = RunController::new(
        engine,
        passthrough,
        sink,
        RunOptions::from_settings(&settings),
    );
    let mut scene = ControlScene::from_descriptors(settings.controls.clone());

    let session = SessionConfig::from_settings(&settings);
    if !session
        .hotkeys
        .iter()
        .any(|(action, _)| *action == HotkeyAction::Stop)
    {
        tracing::warn!("no stop hotkey configured; the host runs until it is killed");
    }
    controller.start(session);

    let interval = settings.tick_interval();
    while controller.is_running() {
        let started = Instant::now();
        controller.tick(started, &mut scene);
        std::thread::sleep(interval.saturating_sub(started.elapsed()));
    }

    controller.stop(&mut scene);
    tracing::info!("overlay host exiting");
    Ok(())
}
