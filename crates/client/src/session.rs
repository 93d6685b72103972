use std::collections::HashMap;
use std::sync::Mutex;

use crate::AttachmentRef;

/// Injected session storage: session id → attachments registered for that
/// session. Kept as a trait so example apps use the in-memory store while
/// production hosts plug in whatever they persist sessions with. No
/// module-level globals.
pub trait SessionStore: Send + Sync {
    fn put(&self, session_id: &str, attachment: AttachmentRef);
    fn get(&self, session_id: &str) -> Vec<AttachmentRef>;
    fn clear(&self, session_id: &str);
}

#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<String, Vec<AttachmentRef>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, session_id: &str, attachment: AttachmentRef) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions
            .entry(session_id.to_string())
            .or_default()
            .push(attachment);
    }

    fn get(&self, session_id: &str) -> Vec<AttachmentRef> {
        let sessions = self.sessions.lock().expect("session store poisoned");
        sessions.get(session_id).cloned().unwrap_or_default()
    }

    fn clear(&self, session_id: &str) {
        let mut sessions = self.sessions.lock().expect("session store poisoned");
        sessions.remove(session_id);
    }
}
