use std::error::Error;
use std::fmt;

#[derive(Debug)]
pub enum SimulatorError {
    // Setup errors
    InvalidConfig(String),
    ParseError(usize, String),

    // System errors
    IoError(std::io::Error),
}

impl fmt::Display for SimulatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulatorError::InvalidConfig(reason) => {
                write!(f, "Invalid configuration: {}", reason)
            },
            SimulatorError::ParseError(line, reason) => {
                write!(f, "Parse error at line {}: {}", line, reason)
            },
            SimulatorError::IoError(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl Error for SimulatorError {}

impl From<std::io::Error> for SimulatorError {
    fn from(error: std::io::Error) -> Self {
        SimulatorError::IoError(error)
    }
}
