// Public modules
pub mod chat_chunk;
pub mod chat_message;
pub mod chat_request;
pub mod fragment;
pub mod message_role;
pub mod model_info;
pub mod render_event;
pub mod turn_phase;

// Re-exports
pub use chat_chunk::ChatChunk;
pub use chat_message::ChatMessage;
pub use chat_request::ChatRequest;
pub use fragment::Fragment;
pub use message_role::MessageRole;
pub use model_info::{ModelInfo, ModelList};
pub use render_event::RenderEvent;
pub use turn_phase::TurnPhase;
