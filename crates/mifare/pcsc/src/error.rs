//! Error types for the PC/SC backend

/// PC/SC-specific errors
#[derive(Debug, thiserror::Error)]
pub enum PcscError {
    /// PC/SC error
    #[error("PC/SC error: {0}")]
    Pcsc(#[from] pcsc::Error),

    /// No readers available
    #[error("No readers available")]
    NoReadersAvailable,

    /// Reader not found
    #[error("Reader not found: {0}")]
    ReaderNotFound(String),

    /// No card present in reader
    #[error("No card present in reader: {0}")]
    NoCard(String),
}

impl From<PcscError> for nexum_mifare_core::Error {
    fn from(error: PcscError) -> Self {
        match error {
            PcscError::NoReadersAvailable | PcscError::ReaderNotFound(_) => {
                Self::init(error.to_string())
            }
            PcscError::Pcsc(
                pcsc::Error::NoService
                | pcsc::Error::ServiceStopped
                | pcsc::Error::NoReadersAvailable
                | pcsc::Error::UnknownReader
                | pcsc::Error::ReaderUnavailable,
            ) => Self::init(error.to_string()),
            _ => Self::transport(error.to_string()),
        }
    }
}
