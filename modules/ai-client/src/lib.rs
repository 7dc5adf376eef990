pub mod cli;
pub mod gemini;
pub mod schema;
pub mod traits;
pub mod util;

pub use cli::CliGenerator;
pub use gemini::Gemini;
pub use schema::StructuredOutput;
pub use traits::{generate_structured, GenerationRequest, TextGenerator};
