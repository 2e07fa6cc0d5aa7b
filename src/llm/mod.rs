pub mod client;
pub mod parser;
pub mod prompts;
pub mod retry;
pub mod validation;

pub use client::*;
pub use parser::*;
pub use prompts::*;
pub use retry::*;
pub use validation::*;
