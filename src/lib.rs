pub mod app;
pub mod history;
pub mod listener;
pub mod session;

pub use app::{build_assistant, build_parser, Assistant, Runtime};
pub use history::CommandHistory;
pub use listener::{Listener, ListenerMachine};
pub use session::{is_affirmative, ConfirmationTracker, Session, SessionError};
