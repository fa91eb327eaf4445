use thiserror::Error;

/// Gemini API errors
#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("Response Error: {0}")]
    ResponseError(String),

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },
}

/// Result type for Gemini operations
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Google Sheets and service-account auth errors
#[derive(Error, Debug)]
pub enum SheetsError {
    #[error("Auth Error: {0}")]
    AuthError(String),

    #[error("Token signing failed: {0}")]
    SigningError(#[from] jsonwebtoken::errors::Error),

    #[error("Request Error: {0}")]
    RequestError(String),

    #[error("HTTP Error: {status_code} - {message}")]
    HttpError { status_code: u16, message: String },

    #[error("Parsing Error: {0}")]
    ParsingError(String),

    #[error("Spreadsheet not found: {0}")]
    SpreadsheetNotFound(String),

    #[error("Worksheet '{worksheet}' not found in spreadsheet {spreadsheet}")]
    WorksheetNotFound {
        spreadsheet: String,
        worksheet: String,
    },
}

/// Result type for Sheets operations
pub type SheetsResult<T> = Result<T, SheetsError>;

/// Startup configuration errors. All of these are fatal.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing credential: {0} must be set")]
    CredentialMissing(&'static str),

    #[error("Invalid credential {name}: {reason}")]
    CredentialInvalid { name: &'static str, reason: String },

    #[error("Invalid setting {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;
