use tauri::Manager;
use tokio::task;

use crate::ai::InsightClient;
use crate::store::Store;
use crate::types::{GlossaryEntry, Insights, Note, NoteSummary, Preferences, SessionUnlock};
use crate::{crypto, html, notes, AppMutex, AppState};

/// Fixed markup shown in place of the real content while a note is
/// encrypted and not session-unlocked.
pub const LOCKED_PLACEHOLDER: &str = "<div class=\"locked-note\">\
<h3>This note is encrypted</h3>\
<p>Enter the password and click Decrypt to view the contents.</p>\
</div>";

// ─── Tauri commands ────────────────────────────────────────────────────────────

/// Sidebar listing, filtered by the search box and sorted pinned-first.
#[tauri::command]
pub async fn list_notes(
    query: Option<String>,
    state: tauri::State<'_, AppMutex>,
) -> Result<Vec<NoteSummary>, String> {
    Ok(list_notes_inner(state.inner(), query.as_deref().unwrap_or("")).await)
}

/// Fetch a full note by id. Called when the user opens a note.
#[tauri::command]
pub async fn get_note(id: String, state: tauri::State<'_, AppMutex>) -> Result<Note, String> {
    get_note_inner(state.inner(), &id).await
}

#[tauri::command]
pub async fn create_note(state: tauri::State<'_, AppMutex>) -> Result<Note, String> {
    Ok(create_note_inner(state.inner()).await)
}

#[tauri::command]
pub async fn delete_note(id: String, state: tauri::State<'_, AppMutex>) -> Result<(), String> {
    delete_note_inner(state.inner(), &id).await;
    Ok(())
}

#[tauri::command]
pub async fn toggle_pin(id: String, state: tauri::State<'_, AppMutex>) -> Result<(), String> {
    toggle_pin_inner(state.inner(), &id).await;
    Ok(())
}

#[tauri::command]
pub async fn update_title(
    id: String,
    title: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<(), String> {
    update_title_inner(state.inner(), &id, title).await;
    Ok(())
}

#[tauri::command]
pub async fn update_tags(
    id: String,
    tags: Vec<String>,
    state: tauri::State<'_, AppMutex>,
) -> Result<(), String> {
    update_tags_inner(state.inner(), &id, tags).await;
    Ok(())
}

/// Change the selection. `None` clears it.
#[tauri::command]
pub async fn set_active_note(
    id: Option<String>,
    state: tauri::State<'_, AppMutex>,
) -> Result<(), String> {
    set_active_inner(state.inner(), id).await;
    Ok(())
}

#[tauri::command]
pub async fn save_version(id: String, state: tauri::State<'_, AppMutex>) -> Result<(), String> {
    save_version_inner(state.inner(), &id).await;
    Ok(())
}

#[tauri::command]
pub async fn delete_version(
    id: String,
    version_id: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<(), String> {
    delete_version_inner(state.inner(), &id, &version_id).await;
    Ok(())
}

/// Restore a snapshot. Returns the updated note, or None if the note or
/// version was not found (a silent no-op).
#[tauri::command]
pub async fn restore_version(
    id: String,
    version_id: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<Option<Note>, String> {
    Ok(restore_version_inner(state.inner(), &id, &version_id).await)
}

/// Live input from the editing surface for the active note.
#[tauri::command]
pub async fn edit_note(html: String, state: tauri::State<'_, AppMutex>) -> Result<(), String> {
    edit_note_inner(state.inner(), html).await
}

#[tauri::command]
pub async fn encrypt_note(
    password: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<Note, String> {
    encrypt_note_inner(state.inner(), &password).await
}

#[tauri::command]
pub async fn decrypt_note(
    password: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<Note, String> {
    decrypt_note_inner(state.inner(), &password).await
}

#[tauri::command]
pub async fn run_insights(state: tauri::State<'_, AppMutex>) -> Result<Insights, String> {
    run_insights_inner(state.inner(), &InsightClient::from_env()).await
}

#[tauri::command]
pub async fn run_grammar_check(state: tauri::State<'_, AppMutex>) -> Result<Vec<String>, String> {
    run_grammar_check_inner(state.inner(), &InsightClient::from_env()).await
}

#[tauri::command]
pub async fn run_translate(
    language: String,
    state: tauri::State<'_, AppMutex>,
) -> Result<String, String> {
    run_translate_inner(state.inner(), &InsightClient::from_env(), &language).await
}

/// Overlay glossary highlights and grammar underlines for display.
/// Pure — the frontend passes whatever it currently shows.
#[tauri::command]
pub fn decorate_html(html: String, glossary: Vec<GlossaryEntry>, issues: Vec<String>) -> String {
    html::decorate(&html, &glossary, &issues)
}

// ─── Lifecycle operations ──────────────────────────────────────────────────────
//
// The command wrappers above stay thin; the operations below take the
// state mutex directly so the integration suite can drive them without a
// Tauri runtime.

pub async fn list_notes_inner(state: &AppMutex, query: &str) -> Vec<NoteSummary> {
    let s = state.lock().await;
    notes::filter_and_sort(&s.notes, query)
}

pub async fn get_note_inner(state: &AppMutex, id: &str) -> Result<Note, String> {
    let s = state.lock().await;
    s.notes
        .iter()
        .find(|n| n.id == id)
        .cloned()
        .ok_or_else(|| "note_not_found".to_string())
}

pub async fn create_note_inner(state: &AppMutex) -> Note {
    let mut s = state.lock().await;
    let note = notes::new_note();
    s.notes.insert(0, note.clone());
    s.active_id = Some(note.id.clone());
    persist_notes(&s);
    persist_prefs(&s);
    note
}

/// Remove a note. Deleting the active note clears the selection without
/// falling back to another note.
pub async fn delete_note_inner(state: &AppMutex, id: &str) {
    let mut s = state.lock().await;
    s.notes.retain(|n| n.id != id);
    s.session_unlock.remove(id);
    s.edit_epoch.remove(id);
    persist_notes(&s);
    if s.active_id.as_deref() == Some(id) {
        s.active_id = None;
        persist_prefs(&s);
    }
}

pub async fn toggle_pin_inner(state: &AppMutex, id: &str) {
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.pinned = !note.pinned;
        note.updated_at = notes::now_ms();
        persist_notes(&s);
    }
}

pub async fn update_title_inner(state: &AppMutex, id: &str, title: String) {
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.title = title;
        note.updated_at = notes::now_ms();
        persist_notes(&s);
    }
}

pub async fn update_tags_inner(state: &AppMutex, id: &str, tags: Vec<String>) {
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.tags = tags;
        note.updated_at = notes::now_ms();
        persist_notes(&s);
    }
}

pub async fn set_active_inner(state: &AppMutex, id: Option<String>) {
    let mut s = state.lock().await;
    s.active_id = id;
    persist_prefs(&s);
}

/// Snapshot the current decrypted content. A locked note has no decrypted
/// content, so the call is a silent no-op — versions never hold ciphertext
/// or the placeholder.
pub async fn save_version_inner(state: &AppMutex, id: &str) {
    let mut s = state.lock().await;
    let unlocked_plain = s.session_unlock.get(id).map(|u| u.plain.clone());
    let Some(note) = s.notes.iter_mut().find(|n| n.id == id) else {
        return;
    };
    let html = match unlocked_plain {
        Some(plain) => plain,
        None if !note.encrypted => note.html.clone(),
        None => return,
    };
    let title = note.title.clone();
    notes::push_version(note, title, html);
    persist_notes(&s);
}

pub async fn delete_version_inner(state: &AppMutex, id: &str, version_id: &str) {
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.versions.retain(|v| v.version_id != version_id);
        persist_notes(&s);
    }
}

/// Restoring always yields a plaintext note: the encrypted flag and the
/// cipher fields are cleared even if the note was encrypted, and the
/// session-unlock entry is dropped.
pub async fn restore_version_inner(state: &AppMutex, id: &str, version_id: &str) -> Option<Note> {
    let mut s = state.lock().await;
    let restored = {
        let note = s.notes.iter_mut().find(|n| n.id == id)?;
        let version = notes::find_version(note, version_id)?;
        note.title = version.title;
        note.html = version.html;
        note.updated_at = notes::now_ms();
        note.encrypted = false;
        note.cipher_hex = None;
        note.iv = None;
        note.salt = None;
        note.clone()
    };
    s.session_unlock.remove(id);
    // Supersede any re-encryption still in flight for this note.
    bump_epoch(&mut s, id);
    persist_notes(&s);
    Some(restored)
}

/// Apply live input to the active note.
///
/// While the note is session-unlocked the session plaintext is updated
/// first, then the new content is re-encrypted with the session password
/// off the async loop. Each edit bumps the note's epoch and a ciphertext
/// is committed only if its epoch is still current, so a slow encryption
/// can never overwrite a newer edit (last-writer-wins).
pub async fn edit_note_inner(state: &AppMutex, html: String) -> Result<(), String> {
    let (id, password, epoch) = {
        let mut s = state.lock().await;
        let Some(id) = s.active_id.clone() else {
            return Ok(());
        };
        let password = match s.session_unlock.get_mut(&id) {
            Some(unlock) => {
                unlock.plain = html.clone();
                Some(unlock.password.clone())
            }
            None => None,
        };
        match password {
            Some(password) => {
                let epoch = bump_epoch(&mut s, &id);
                (id, password, epoch)
            }
            None => {
                if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
                    note.html = html;
                    note.updated_at = notes::now_ms();
                    persist_notes(&s);
                }
                return Ok(());
            }
        }
    };

    // Key derivation is CPU-bound; run it off the async loop with the
    // state lock released.
    let plain = html.clone();
    let blob = task::spawn_blocking(move || crypto::encrypt_text(&plain, &password))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    let mut s = state.lock().await;
    if current_epoch(&s, &id) != epoch {
        // A newer edit (or an explicit encrypt/decrypt/restore) superseded
        // this ciphertext.
        return Ok(());
    }
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.html = html;
        note.cipher_hex = Some(blob.cipher_hex);
        note.iv = Some(blob.iv_hex);
        note.salt = Some(blob.salt_hex);
        note.encrypted = true;
        note.updated_at = notes::now_ms();
        persist_notes(&s);
    }
    Ok(())
}

/// Encrypt the active note with `password`. Re-locking discards any prior
/// session-unlock entry.
pub async fn encrypt_note_inner(state: &AppMutex, password: &str) -> Result<Note, String> {
    if password.is_empty() {
        return Err("empty_password".to_string());
    }
    let (id, plain) = {
        let s = state.lock().await;
        let Some(id) = s.active_id.clone() else {
            return Err("no_active_note".to_string());
        };
        let note = s
            .notes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| "note_not_found".to_string())?;
        let plain = s
            .session_unlock
            .get(&id)
            .map(|u| u.plain.clone())
            .unwrap_or_else(|| note.html.clone());
        (id, plain)
    };

    let password_owned = password.to_string();
    let blob = task::spawn_blocking(move || crypto::encrypt_text(&plain, &password_owned))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| e.to_string())?;

    let mut s = state.lock().await;
    bump_epoch(&mut s, &id);
    s.session_unlock.remove(&id);
    let updated = {
        let note = s
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| "note_not_found".to_string())?;
        note.html = LOCKED_PLACEHOLDER.to_string();
        note.cipher_hex = Some(blob.cipher_hex);
        note.iv = Some(blob.iv_hex);
        note.salt = Some(blob.salt_hex);
        note.encrypted = true;
        note.updated_at = notes::now_ms();
        note.clone()
    };
    persist_notes(&s);
    Ok(updated)
}

/// Decrypt the active note with `password`. On success the note unwraps
/// into plaintext state guarded only by the session-unlock entry; on a
/// wrong password or corrupted data nothing is mutated.
pub async fn decrypt_note_inner(state: &AppMutex, password: &str) -> Result<Note, String> {
    if password.is_empty() {
        return Err("empty_password".to_string());
    }
    let (id, cipher_hex, iv, salt) = {
        let s = state.lock().await;
        let Some(id) = s.active_id.clone() else {
            return Err("no_active_note".to_string());
        };
        let note = s
            .notes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| "note_not_found".to_string())?;
        let (Some(cipher_hex), Some(iv), Some(salt)) =
            (note.cipher_hex.clone(), note.iv.clone(), note.salt.clone())
        else {
            return Err("not_encrypted".to_string());
        };
        (id, cipher_hex, iv, salt)
    };

    let password_owned = password.to_string();
    let plain = match task::spawn_blocking(move || {
        crypto::decrypt_text(&cipher_hex, &password_owned, &iv, &salt)
    })
    .await
    {
        Ok(Ok(plain)) => plain,
        Ok(Err(_)) => return Err("decrypt_failed".to_string()),
        Err(e) => return Err(e.to_string()),
    };

    let mut s = state.lock().await;
    bump_epoch(&mut s, &id);
    s.session_unlock.insert(
        id.clone(),
        SessionUnlock {
            plain: plain.clone(),
            password: password.to_string(),
        },
    );
    let updated = {
        let note = s
            .notes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| "note_not_found".to_string())?;
        note.html = plain;
        note.encrypted = false;
        note.cipher_hex = None;
        note.iv = None;
        note.salt = None;
        note.clone()
    };
    persist_notes(&s);
    Ok(updated)
}

pub async fn run_insights_inner(
    state: &AppMutex,
    client: &InsightClient,
) -> Result<Insights, String> {
    let Some((id, source)) = ai_source(state).await? else {
        return Ok(Insights::default());
    };
    let insights = client.insights(&source).await;
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.ai_summary = insights.summary.clone();
        note.ai_tags = insights.tags.clone();
        note.ai_glossary = insights.glossary.clone();
    }
    persist_notes(&s);
    Ok(insights)
}

/// Grammar issues are returned for highlighting but never cached on the
/// note.
pub async fn run_grammar_check_inner(
    state: &AppMutex,
    client: &InsightClient,
) -> Result<Vec<String>, String> {
    let Some((_, source)) = ai_source(state).await? else {
        return Ok(Vec::new());
    };
    Ok(client.grammar_check(&source).await)
}

pub async fn run_translate_inner(
    state: &AppMutex,
    client: &InsightClient,
    language: &str,
) -> Result<String, String> {
    let Some((id, source)) = ai_source(state).await? else {
        return Ok(String::new());
    };
    let text = client.translate(&source, language).await;
    let mut s = state.lock().await;
    if let Some(note) = s.notes.iter_mut().find(|n| n.id == id) {
        note.translations = [(language.to_string(), text.clone())].into_iter().collect();
    }
    persist_notes(&s);
    Ok(text)
}

/// Shared gate for the AI operations: the plaintext source is the session
/// entry if present, else the stored content. A locked note (encrypted,
/// no session unlock) yields None — nothing may be sent to the model.
async fn ai_source(state: &AppMutex) -> Result<Option<(String, String)>, String> {
    let s = state.lock().await;
    let Some(id) = s.active_id.clone() else {
        return Err("no_active_note".to_string());
    };
    let note = s
        .notes
        .iter()
        .find(|n| n.id == id)
        .ok_or_else(|| "note_not_found".to_string())?;
    match s.session_unlock.get(&id) {
        Some(unlock) => Ok(Some((id, unlock.plain.clone()))),
        None if note.encrypted => Ok(None),
        None => Ok(Some((id, note.html.clone()))),
    }
}

// ─── Internal helpers ──────────────────────────────────────────────────────────

/// Persistence is a fire-and-forget side effect of every mutation; a
/// failed write is logged, never surfaced.
fn persist_notes(s: &AppState) {
    if let Some(store) = &s.store {
        if let Err(e) = store.save_notes(&s.notes) {
            tracing::warn!("Failed to persist notes: {e}");
        }
    }
}

fn persist_prefs(s: &AppState) {
    if let Some(store) = &s.store {
        let prefs = Preferences {
            last_opened_id: s.active_id.clone(),
        };
        if let Err(e) = store.save_prefs(&prefs) {
            tracing::warn!("Failed to persist preferences: {e}");
        }
    }
}

fn bump_epoch(s: &mut AppState, id: &str) -> u64 {
    let epoch = s.edit_epoch.entry(id.to_string()).or_insert(0);
    *epoch += 1;
    *epoch
}

fn current_epoch(s: &AppState, id: &str) -> u64 {
    s.edit_epoch.get(id).copied().unwrap_or(0)
}

/// Called once on startup: open the store in the app data dir and load
/// the persisted collection and preferences into state.
pub async fn startup_init(app: tauri::AppHandle) {
    let data_dir = app
        .path()
        .app_data_dir()
        .unwrap_or_else(|_| std::path::PathBuf::from("."));
    let db_path = data_dir.join("notevault").join("notevault.sqlite");
    let store = match Store::open(&db_path) {
        Ok(store) => store,
        Err(e) => {
            tracing::warn!("Failed to open store at {}: {e}", db_path.display());
            return;
        }
    };

    let loaded = store.load_notes();
    let prefs = store.load_prefs();

    let state = app.state::<AppMutex>();
    let mut s = state.lock().await;
    s.active_id = prefs
        .last_opened_id
        .or_else(|| loaded.first().map(|n| n.id.clone()));
    s.notes = loaded;
    s.store = Some(store);
}
