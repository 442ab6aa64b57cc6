//! File-backed storage for playbook-memory

mod playbook;
mod session;
mod transcript;

pub use playbook::PlaybookStore;
pub use session::SessionGate;
pub use transcript::TranscriptReader;
