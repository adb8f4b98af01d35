/// Core error type for the mention bot.
///
/// Adapter crates map their transport errors into [`Error::Remote`] so the control
/// loop can count every remote failure against the same budget.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("remote service error: {0}")]
    Remote(String),
}

impl Error {
    /// Message suitable for the console and the failure report channel.
    pub fn report_message(&self) -> String {
        match self {
            Error::Remote(msg) | Error::Config(msg) => msg.clone(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
