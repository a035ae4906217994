// src/event.rs
use std::path::PathBuf;

use notify::event::{EventKind, ModifyKind, RenameMode};

/// Simplified classification of a filesystem operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsOp {
    /// A file or directory was created (including a rename target).
    Create,
    /// File contents or metadata were modified.
    Write,
    /// A file or directory was removed (including a rename source).
    Remove,
    /// Anything else (access notifications, unclassified kinds).
    Other,
}

impl FsOp {
    /// Collapses a `notify` event kind into one of our operations.
    pub fn classify(kind: &EventKind) -> Self {
        match kind {
            EventKind::Create(_) => FsOp::Create,
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => FsOp::Create,
            EventKind::Modify(ModifyKind::Name(RenameMode::From)) => FsOp::Remove,
            EventKind::Modify(_) => FsOp::Write,
            EventKind::Remove(_) => FsOp::Remove,
            _ => FsOp::Other,
        }
    }
}

/// A raw filesystem event, as forwarded from the watch thread to the
/// debouncer. One `notify` event may expand into several of these (one per
/// affected path).
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// The affected path.
    pub path: PathBuf,
    /// The operation performed on it.
    pub op: FsOp,
}

impl RawEvent {
    /// Whether this event should reset the debounce timer: a create, write,
    /// or remove touching a served document.
    pub fn qualifies(&self) -> bool {
        matches!(self.op, FsOp::Create | FsOp::Write | FsOp::Remove)
            && crate::tree::is_document(&self.path)
    }
}
