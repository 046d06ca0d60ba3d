use uuid::Uuid;

use crate::types::{Note, NoteSummary, NoteVersion};

/// Maximum number of version snapshots retained per note.
pub const MAX_VERSIONS: usize = 25;

/// Current wall-clock time as Unix ms.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// A fresh note with default fields.
pub fn new_note() -> Note {
    let now = now_ms();
    Note {
        id: Uuid::new_v4().to_string(),
        created_at: now,
        updated_at: now,
        title: "Untitled".to_string(),
        html: "<p></p>".to_string(),
        pinned: false,
        tags: Vec::new(),
        encrypted: false,
        cipher_hex: None,
        iv: None,
        salt: None,
        versions: Vec::new(),
        ai_summary: String::new(),
        ai_tags: Vec::new(),
        ai_glossary: Vec::new(),
        translations: Default::default(),
    }
}

fn summary(note: &Note) -> NoteSummary {
    NoteSummary {
        id: note.id.clone(),
        title: note.title.clone(),
        updated_at: note.updated_at,
        pinned: note.pinned,
        encrypted: note.encrypted,
    }
}

/// Sidebar listing: case-insensitive substring filter over title and
/// content, pinned notes first, then most recently updated.
pub fn filter_and_sort(notes: &[Note], query: &str) -> Vec<NoteSummary> {
    let q = query.trim().to_lowercase();
    let mut list: Vec<&Note> = notes
        .iter()
        .filter(|n| {
            q.is_empty()
                || n.title.to_lowercase().contains(&q)
                || n.html.to_lowercase().contains(&q)
        })
        .collect();
    list.sort_by(|a, b| {
        b.pinned
            .cmp(&a.pinned)
            .then(b.updated_at.cmp(&a.updated_at))
    });
    list.into_iter().map(summary).collect()
}

/// Prepend a snapshot of `title`/`html` and evict the oldest entries past
/// the cap. The caller supplies decrypted content.
pub fn push_version(note: &mut Note, title: String, html: String) {
    note.versions.insert(
        0,
        NoteVersion {
            version_id: Uuid::new_v4().to_string(),
            created_at: now_ms(),
            title,
            html,
        },
    );
    note.versions.truncate(MAX_VERSIONS);
}

/// Look up a snapshot by id.
pub fn find_version(note: &Note, version_id: &str) -> Option<NoteVersion> {
    note.versions
        .iter()
        .find(|v| v.version_id == version_id)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_note_has_defaults() {
        let note = new_note();
        assert_eq!(note.title, "Untitled");
        assert_eq!(note.html, "<p></p>");
        assert!(!note.pinned);
        assert!(!note.encrypted);
        assert!(note.versions.is_empty());
        assert_eq!(note.created_at, note.updated_at);
    }

    #[test]
    fn new_notes_get_unique_ids() {
        assert_ne!(new_note().id, new_note().id);
    }

    #[test]
    fn pinned_notes_sort_first_then_by_recency() {
        let mut old = new_note();
        old.title = "old".to_string();
        old.updated_at = 1;
        let mut recent = new_note();
        recent.title = "recent".to_string();
        recent.updated_at = 3;
        let mut pinned = new_note();
        pinned.title = "pinned".to_string();
        pinned.updated_at = 2;
        pinned.pinned = true;

        let titles: Vec<String> = filter_and_sort(&[old, recent, pinned], "")
            .into_iter()
            .map(|s| s.title)
            .collect();
        assert_eq!(titles, ["pinned", "recent", "old"]);
    }

    #[test]
    fn filter_matches_title_and_content_case_insensitively() {
        let mut by_title = new_note();
        by_title.title = "Meeting Notes".to_string();
        let mut by_body = new_note();
        by_body.html = "<p>agenda for the MEETING</p>".to_string();
        let mut other = new_note();
        other.title = "Groceries".to_string();

        let hits = filter_and_sort(&[by_title, by_body, other], "meeting");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn version_snapshots_cap_at_25_newest_first() {
        let mut note = new_note();
        for i in 1..=26 {
            push_version(&mut note, format!("t{i}"), format!("v{i}"));
        }
        assert_eq!(note.versions.len(), MAX_VERSIONS);
        assert_eq!(note.versions[0].html, "v26");
        assert_eq!(note.versions[MAX_VERSIONS - 1].html, "v2");
    }

    #[test]
    fn find_version_misses_return_none() {
        let mut note = new_note();
        push_version(&mut note, "t".to_string(), "v".to_string());
        assert!(find_version(&note, "nope").is_none());
        let id = note.versions[0].version_id.clone();
        assert_eq!(find_version(&note, &id).expect("found").html, "v");
    }
}
