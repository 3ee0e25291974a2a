#[derive(Debug, thiserror::Error)]
pub enum DotnetError {
    #[error("dotnet CLI not found; install from https://dotnet.microsoft.com/download")]
    NotFound { source: std::io::Error },

    #[error("dotnet command failed: {args:?}\n{stderr}")]
    CommandFailed { args: Vec<String>, stderr: String },

    #[error("dotnet output was not valid UTF-8")]
    InvalidUtf8 { source: std::string::FromUtf8Error },
}
