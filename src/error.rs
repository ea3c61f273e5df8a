use std::fmt;

#[derive(Debug)]
pub enum DeckPressError {
    EmptyPresentation,
    Parse(String),
    Assembly(String),
    Compression(String),
    InvalidConfiguration(String),
    InputTooLarge { size: usize, limit: usize },
    Io(std::io::Error),
}

impl fmt::Display for DeckPressError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckPressError::EmptyPresentation => {
                write!(f, "presentation has no slides; page size is undefined")
            }
            DeckPressError::Parse(message) => write!(f, "cannot parse presentation: {}", message),
            DeckPressError::Assembly(message) => write!(f, "document assembly failed: {}", message),
            DeckPressError::Compression(message) => {
                write!(f, "recompression failed: {}", message)
            }
            DeckPressError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            DeckPressError::InputTooLarge { size, limit } => {
                write!(f, "input of {} bytes exceeds the {} byte limit", size, limit)
            }
            DeckPressError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for DeckPressError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DeckPressError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for DeckPressError {
    fn from(value: std::io::Error) -> Self {
        DeckPressError::Io(value)
    }
}
