use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tauri::{AppHandle, Emitter, Manager, State};
use tauri_plugin_dialog::{DialogExt, MessageDialogKind};

use crate::core::{
    config::{ConfigManager, Settings},
    contacts::{ContactStore, JsonFileStore, KeyValueStore, MemoryStore},
    dispatch::{
        engine::{DispatchEngine, EngineEvent, EngineSnapshot, ManualView, TimerRequest},
        payload::{CommunicationIntent, CommunicationPort},
    },
    error::DispatchResult,
    intake::AnalysisResponse,
    model::{DeliveryMethod, Location, ResponderChannel, ThreatEvent, LIMITATION_NOTICE},
};

type SharedStore = Box<dyn KeyValueStore + Send>;
type Engine = DispatchEngine<WebviewLauncher, SharedStore>;
type SharedEngine = Arc<Mutex<Engine>>;

/// Hands communication intents to the webview, which opens the `tel:`/`sms:`
/// URI. Nothing comes back; delivery is never confirmed.
struct WebviewLauncher {
    handle: AppHandle,
}

#[derive(Clone, Serialize)]
struct IntentPayload<'a> {
    uri: String,
    #[serde(flatten)]
    intent: &'a CommunicationIntent,
}

impl CommunicationPort for WebviewLauncher {
    fn open(&mut self, intent: &CommunicationIntent) {
        let payload = IntentPayload {
            uri: intent.uri(),
            intent,
        };
        if let Err(e) = self.handle.emit("communication-intent", payload) {
            log::warn!("Could not hand {} intent to the webview: {}", intent.channel, e);
        }
    }
}

struct AppState {
    engine: SharedEngine,
    settings: Mutex<Settings>,
    config_manager: ConfigManager,
}

fn lock_engine(engine: &Mutex<Engine>) -> Result<MutexGuard<'_, Engine>, String> {
    engine.lock().map_err(|e| format!("engine state poisoned: {}", e))
}

/// Push queued engine events and a fresh snapshot to the UI.
fn publish(handle: &AppHandle, engine: &Mutex<Engine>) {
    let (events, snapshot) = match lock_engine(engine) {
        Ok(mut engine) => (engine.drain_events(), engine.snapshot()),
        Err(e) => {
            log::error!("{}", e);
            return;
        }
    };

    for event in &events {
        if let EngineEvent::ContactMissing { message, .. } = event {
            handle
                .dialog()
                .message(message.clone())
                .kind(MessageDialogKind::Warning)
                .title("Sentinel-X")
                .show(|_| {});
        }
        if let Err(e) = handle.emit("dispatch-event", event) {
            log::warn!("Could not emit dispatch event: {}", e);
        }
    }
    if let Err(e) = handle.emit("dispatch-snapshot", snapshot) {
        log::warn!("Could not emit dispatch snapshot: {}", e);
    }
}

/// Wait out each timer on the async runtime and feed it back to the engine.
/// Stale tokens are dropped by the engine itself.
fn schedule(handle: AppHandle, engine: SharedEngine, timers: Vec<TimerRequest>) {
    for timer in timers {
        let handle = handle.clone();
        let engine = engine.clone();
        tauri::async_runtime::spawn(async move {
            tokio::time::sleep(timer.after).await;
            let next = match lock_engine(&engine) {
                Ok(mut engine) => engine.on_timer(timer.token),
                Err(e) => {
                    log::error!("{}", e);
                    return;
                }
            };
            publish(&handle, &engine);
            schedule(handle, engine, next);
        });
    }
}

/// Run one engine operation, then publish and schedule whatever it produced.
fn drive<T>(
    app: &AppHandle,
    state: &AppState,
    op: impl FnOnce(&mut Engine) -> DispatchResult<(T, Vec<TimerRequest>)>,
) -> Result<T, String> {
    let result = {
        let mut engine = lock_engine(&state.engine)?;
        op(&mut engine)
    };
    publish(app, &state.engine);

    let (value, timers) = result.map_err(|e| e.to_string())?;
    schedule(app.clone(), state.engine.clone(), timers);
    Ok(value)
}

#[tauri::command]
fn ingest_analysis(
    response: serde_json::Value,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<ThreatEvent, String> {
    let analysis = AnalysisResponse::from_value(&response);
    let threat = analysis.classify();
    log::info!(
        "Analysis classified as '{}' ({}%, {}), service suggested {:?}",
        threat.label,
        threat.confidence,
        threat.severity,
        analysis.agencies()
    );

    let presented = threat.clone();
    drive(&app, &state, move |engine| Ok(((), engine.present_threat(presented))))?;
    Ok(threat)
}

#[tauri::command]
fn present_threat(threat: ThreatEvent, app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, move |engine| Ok(((), engine.present_threat(threat))))
}

#[tauri::command]
fn set_location(location: Option<Location>, app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, move |engine| {
        engine.set_location(location);
        Ok(((), Vec::new()))
    })
}

#[tauri::command]
fn cancel_dispatch(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, |engine| engine.cancel().map(|_| ((), Vec::new())))
}

#[tauri::command]
fn send_now(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, |engine| engine.send_now().map(|timers| ((), timers)))
}

#[tauri::command]
fn dismiss_dispatch(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, |engine| engine.dismiss().map(|_| ((), Vec::new())))
}

#[tauri::command]
fn open_manual_alert(
    channel: ResponderChannel,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<ManualView, String> {
    drive(&app, &state, move |engine| Ok((engine.open_manual(channel), Vec::new())))
}

#[tauri::command]
fn confirm_manual_alert(
    method: DeliveryMethod,
    app: AppHandle,
    state: State<'_, AppState>,
) -> Result<(), String> {
    drive(&app, &state, move |engine| {
        engine.confirm_manual(method).map(|timers| ((), timers))
    })
}

#[tauri::command]
fn close_manual_alert(app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, |engine| engine.close_manual().map(|_| ((), Vec::new())))
}

#[tauri::command]
fn get_sos_contact(state: State<'_, AppState>) -> Result<String, String> {
    Ok(lock_engine(&state.engine)?.sos_contact().to_string())
}

#[tauri::command]
fn save_sos_contact(contact: String, app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    drive(&app, &state, move |engine| {
        engine.save_sos_contact(&contact).map(|_| ((), Vec::new()))
    })
}

#[tauri::command]
fn get_settings(state: State<'_, AppState>) -> Result<Settings, String> {
    let settings = state.settings.lock().map_err(|e| e.to_string())?;
    Ok(settings.clone())
}

#[tauri::command]
fn save_settings(settings: Settings, app: AppHandle, state: State<'_, AppState>) -> Result<(), String> {
    {
        let mut current = state.settings.lock().map_err(|e| e.to_string())?;
        *current = settings.clone();
    }
    state.config_manager.save(&settings).map_err(|e| e.to_string())?;
    drive(&app, &state, move |engine| {
        engine.update_settings(&settings);
        Ok(((), Vec::new()))
    })
}

#[tauri::command]
fn get_snapshot(state: State<'_, AppState>) -> Result<EngineSnapshot, String> {
    Ok(lock_engine(&state.engine)?.snapshot())
}

#[tauri::command]
fn get_notice() -> &'static str {
    LIMITATION_NOTICE
}

pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_window_state::Builder::default().build())
        .setup(|app| {
            if cfg!(debug_assertions) {
                app.handle().plugin(
                    tauri_plugin_log::Builder::default()
                        .level(log::LevelFilter::Info)
                        .build(),
                )?;
            }
            app.handle().plugin(tauri_plugin_dialog::init())?;

            // Initialize Config
            let config_dir = app.path().app_config_dir().unwrap_or(PathBuf::from("."));
            let config_manager = ConfigManager::new(config_dir);
            let settings = config_manager.load();

            // SOS contact lives in the app data directory
            let data_dir = app.path().app_data_dir().unwrap_or(PathBuf::from("."));
            let store: SharedStore = match JsonFileStore::open(&data_dir) {
                Ok(store) => {
                    log::info!("Contact store at {:?}", store.path());
                    Box::new(store)
                }
                Err(e) => {
                    log::warn!("Contact store unavailable, using memory only: {}", e);
                    Box::new(MemoryStore::new())
                }
            };

            let launcher = WebviewLauncher {
                handle: app.handle().clone(),
            };
            let engine = DispatchEngine::new(&settings, ContactStore::new(store), launcher);

            app.manage(AppState {
                engine: Arc::new(Mutex::new(engine)),
                settings: Mutex::new(settings),
                config_manager,
            });

            log::info!("Sentinel-X dispatch engine ready");
            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            ingest_analysis,
            present_threat,
            set_location,
            cancel_dispatch,
            send_now,
            dismiss_dispatch,
            open_manual_alert,
            confirm_manual_alert,
            close_manual_alert,
            get_sos_contact,
            save_sos_contact,
            get_settings,
            save_settings,
            get_snapshot,
            get_notice
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
