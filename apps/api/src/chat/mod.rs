// Chat over uploaded resumes.
// Implements: multipart intake, index selection per turn, prompt shaping,
// answer synthesis, and the "new chat" reset.

pub mod handlers;
pub mod models;
pub mod orchestrator;
pub mod prompts;
