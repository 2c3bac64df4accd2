/// Chat command parsing.
pub mod commands;
/// Line-oriented console transport.
pub mod console;
/// Score persistence with retry.
pub mod persistence;
/// Player identity validation.
pub mod validation;
