//! Code review analysis: one completion call per changed file, parsed into a
//! structured verdict.

pub mod engine;
pub mod parser;

pub use engine::{user_prompt, AnalysisEngine, SYSTEM_PROMPT};
pub use parser::{extension_for_language, parse_response, AnalysisResult};
