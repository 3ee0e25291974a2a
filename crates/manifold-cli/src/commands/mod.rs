mod generate;
mod init;
mod select;

pub use generate::{GenerateArgs, generate};
pub use init::init_project;
