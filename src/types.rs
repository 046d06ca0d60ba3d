use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One authored document. Serialized with camelCase field names — the same
/// shape the webview sees and the shape persisted under the notes key.
///
/// When `encrypted` is true the `cipher_hex`/`iv`/`salt` triple is
/// authoritative and `html` holds only the locked placeholder (or,
/// transiently, the live content currently being re-encrypted while the
/// note is session-unlocked).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    /// Unix timestamp in ms.
    pub created_at: i64,
    /// Unix timestamp in ms. Refreshed on every mutating operation.
    pub updated_at: i64,
    pub title: String,
    pub html: String,
    pub pinned: bool,
    #[serde(default)]
    pub tags: Vec<String>,
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cipher_hex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Version snapshots, newest first, capped at 25.
    #[serde(default)]
    pub versions: Vec<NoteVersion>,
    #[serde(default)]
    pub ai_summary: String,
    #[serde(default)]
    pub ai_tags: Vec<String>,
    #[serde(default)]
    pub ai_glossary: Vec<GlossaryEntry>,
    /// Cached translations, language name → translated text.
    /// At most one entry is retained at a time.
    #[serde(default)]
    pub translations: HashMap<String, String>,
}

/// A point-in-time snapshot of a note's title and content.
/// Always captured from decrypted content — never ciphertext.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteVersion {
    pub version_id: String,
    /// Unix timestamp in ms.
    pub created_at: i64,
    pub title: String,
    pub html: String,
}

/// Lightweight note metadata returned for the sidebar list.
/// Content is not included to keep list payloads small.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteSummary {
    pub id: String,
    pub title: String,
    pub updated_at: i64,
    pub pinned: bool,
    pub encrypted: bool,
}

/// One glossary item extracted by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryEntry {
    pub term: String,
    pub definition: String,
}

/// The bundled AI output of summary + tags + glossary for a note.
/// Every failure mode collapses to the all-empty default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Insights {
    pub summary: String,
    pub tags: Vec<String>,
    pub glossary: Vec<GlossaryEntry>,
}

/// Persisted user preferences, stored under their own key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    #[serde(default)]
    pub last_opened_id: Option<String>,
}

/// Decrypted plaintext cache for one session-unlocked note.
///
/// Process-local only. No `Serialize` and no `Debug`: the plaintext and
/// the password must never reach disk or logs.
#[derive(Clone)]
pub struct SessionUnlock {
    pub plain: String,
    pub password: String,
}
