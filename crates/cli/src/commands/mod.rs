pub mod ask;
pub mod broaden;
pub mod config;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

impl CommandResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self { exit_code: 0, output: output.into() }
    }

    pub fn failure(output: impl Into<String>) -> Self {
        Self { exit_code: 1, output: output.into() }
    }
}
