use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Engine(#[from] pulsegrid::Error),
    #[error(transparent)]
    Bank(#[from] gridbank::BankError),
    #[error("midi: {0}")]
    Midi(String),
    #[error("audio: {0}")]
    Audio(String),
    #[error("failed to install the interrupt handler")]
    Signal(#[from] ctrlc::Error),
    #[error("grid of {0}x{1} is too small for the demo patch")]
    DemoTooSmall(u16, u16),
}

pub type Result<T> = std::result::Result<T, CliError>;
