use super::core::ForwardMsg;

/// Pending outbound messages for one session.
///
/// Only the latest navigation message matters to the browser, so a new one
/// replaces a still-pending one in place. Auto-rerun requests coalesce per
/// fragment id. Everything else is appended.
#[derive(Debug, Default, Clone)]
pub struct ForwardMsgQueue {
    pending: Vec<ForwardMsg>,
}

impl ForwardMsgQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` when the message replaced a pending one.
    pub fn enqueue(&mut self, msg: ForwardMsg) -> bool {
        if let Some(slot) = self.pending.iter_mut().find(|queued| supersedes(&msg, queued)) {
            *slot = msg;
            return true;
        }
        self.pending.push(msg);
        false
    }

    pub fn pending(&self) -> &[ForwardMsg] {
        &self.pending
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn drain(&mut self) -> Vec<ForwardMsg> {
        std::mem::take(&mut self.pending)
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

fn supersedes(incoming: &ForwardMsg, queued: &ForwardMsg) -> bool {
    match (incoming, queued) {
        (ForwardMsg::Navigation(_), ForwardMsg::Navigation(_)) => true,
        (ForwardMsg::AutoRerun(new), ForwardMsg::AutoRerun(old)) => {
            new.fragment_id == old.fragment_id
        }
        _ => false,
    }
}
