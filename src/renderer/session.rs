use std::sync::atomic::{ AtomicBool, Ordering };
use std::sync::Mutex;

use crate::models::chat::ChatTurn;

/// Conversation state for one client session. The history is only ever
/// appended to and is replayed in full on every send.
#[derive(Debug, Default)]
pub struct ChatSession {
    turns: Mutex<Vec<ChatTurn>>,
    busy: AtomicBool,
}

/// Held for the duration of a send; clears the busy flag when dropped, also
/// when the send future is abandoned halfway.
#[derive(Debug)]
pub struct BusyGuard<'a> {
    busy: &'a AtomicBool,
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

impl ChatSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// `None` while another send is in flight.
    pub fn try_begin(&self) -> Option<BusyGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| BusyGuard { busy: &self.busy })
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    pub fn push(&self, turn: ChatTurn) {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).push(turn);
    }

    pub fn history(&self) -> Vec<ChatTurn> {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn len(&self) -> usize {
        self.turns.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_send_is_refused_while_busy() {
        let session = ChatSession::new();
        let guard = session.try_begin();
        assert!(guard.is_some());
        assert!(session.is_busy());
        assert!(session.try_begin().is_none());

        drop(guard);
        assert!(!session.is_busy());
        assert!(session.try_begin().is_some());
    }

    #[test]
    fn history_is_append_only() {
        let session = ChatSession::new();
        assert!(session.is_empty());
        session.push(ChatTurn::user("hoi"));
        session.push(ChatTurn::assistant("hallo"));
        assert_eq!(session.history(), vec![ChatTurn::user("hoi"), ChatTurn::assistant("hallo")]);
    }
}
