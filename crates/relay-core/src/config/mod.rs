pub mod parser;
pub mod postfix;
pub mod relay;
pub mod settings;
