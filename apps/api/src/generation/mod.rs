// Email Generator: prompt assembly and the retrying model call.
// All model calls go through llm_client::ChatModel.

pub mod generator;
pub mod prompts;
