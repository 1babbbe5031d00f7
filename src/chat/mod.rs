pub mod functions;
pub mod llm;
pub mod orchestrator;
#[cfg(test)]
pub mod testing;

pub use functions::FunctionRegistry;
pub use llm::{ChatModel, OpenAiClient};
pub use orchestrator::{ChatOrchestrator, ChatReply};
