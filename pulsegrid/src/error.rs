use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("no output device available")]
    NoOutputDevice,
    #[error("failed to open output device {name}: {reason}")]
    DeviceOpen { name: String, reason: String },
    #[error("device error: {0}")]
    Device(String),

    #[error("failed to spawn {0} thread")]
    Spawn(&'static str, #[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
