pub mod ai;
pub mod commands;
pub mod crypto;
pub mod html;
pub mod notes;
pub mod store;
pub mod types;

use std::collections::HashMap;

use tokio::sync::Mutex;

use crate::store::Store;
use crate::types::{Note, SessionUnlock};

/// All runtime state shared across Tauri commands.
#[derive(Default)]
pub struct AppState {
    /// Persistence gateway. None until startup resolves the app data dir;
    /// every mutation before that point simply stays in memory.
    pub store: Option<Store>,
    /// The notes collection, newest-created first. Single source of truth;
    /// each mutation re-persists the whole collection.
    pub notes: Vec<Note>,
    /// Currently selected note, if any. Persisted via preferences.
    pub active_id: Option<String>,
    /// Per-note decrypted session cache. Process-local only — while an
    /// entry exists it is the sole plaintext source for editing and AI
    /// calls on that note.
    pub session_unlock: HashMap<String, SessionUnlock>,
    /// Per-note edit counters for live re-encryption. A ciphertext is
    /// committed only if the epoch it captured is still current, so a slow
    /// encryption never overwrites a newer edit.
    pub edit_epoch: HashMap<String, u64>,
}

/// Type alias used in Tauri command signatures and background tasks.
pub type AppMutex = Mutex<AppState>;

#[cfg_attr(mobile, tauri::mobile_entry_point)]
pub fn run() {
    // Only log WARN and above in production to avoid leaking note content
    #[cfg(debug_assertions)]
    tracing_subscriber::fmt::init();
    #[cfg(not(debug_assertions))]
    tracing_subscriber::fmt().with_max_level(tracing::Level::WARN).init();
    tauri::Builder::default()
        .manage(AppMutex::new(AppState::default()))
        .invoke_handler(tauri::generate_handler![
            commands::list_notes,
            commands::get_note,
            commands::create_note,
            commands::delete_note,
            commands::toggle_pin,
            commands::update_title,
            commands::update_tags,
            commands::set_active_note,
            commands::save_version,
            commands::delete_version,
            commands::restore_version,
            commands::edit_note,
            commands::encrypt_note,
            commands::decrypt_note,
            commands::run_insights,
            commands::run_grammar_check,
            commands::run_translate,
            commands::decorate_html,
        ])
        .setup(|app| {
            let handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                commands::startup_init(handle).await;
            });
            Ok(())
        })
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}
