// Session layer: observable processing state and the chat-driven workflow

pub mod chat;
pub mod state;

pub use chat::{ChatSession, Message, Responder, Role, SimulatedResponder};
pub use state::{reduce, ProcessingState, SessionState, StateAction};
