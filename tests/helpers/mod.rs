pub mod factories;
pub mod oracle;
pub mod wait;
