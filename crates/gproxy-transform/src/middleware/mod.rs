//! Prompt-based function-call middleware.
//!
//! When an upstream lacks native tool-calling, [`prompt`] injects a
//! trigger-signal + XML protocol into the system prompt in place of the
//! client's native `tools`/`tool_choice`, and [`xml`] parses the model's
//! output back into `tool_calls`. [`stream`] applies this over an SSE
//! chunk sequence (withholding XML from the forwarded stream while it is
//! being accumulated); [`unary`] applies the same parser to a complete
//! `message.content` string.
//!
//! Unlike the CC transcoders in [`crate::cc`], this middleware never
//! changes wire dialect: both sides speak OpenAI-Chat. It exists purely to
//! paper over an upstream model that wasn't trained with function-calling.

mod diagnostic;
mod prompt;
mod stream;
mod unary;
mod xml;

pub use diagnostic::looks_like_unparsed_tool_intent;
pub use prompt::{ToolSpec, apply_request, build_tool_prompt};
pub use stream::FunctionCallStreamFilter;
pub use unary::apply_unary_response;
pub use xml::{ParsedToolCall, parse_function_calls_xml};
