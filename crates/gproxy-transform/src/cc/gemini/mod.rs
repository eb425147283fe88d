pub mod request;
pub mod response;
pub mod schema;
pub mod stream;

pub use request::convert as request_to_gemini;
pub use response::convert as response_to_claude;
pub use stream::GeminiStreamTranscoder;
