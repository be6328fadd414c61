use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScribeError {
    #[error("Browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("Browser not launched")]
    BrowserNotLaunched,

    #[error("Tab creation failed: {0}")]
    TabCreationFailed(String),

    #[error("No active tab")]
    NoActiveTab,

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Script evaluation failed: {0}")]
    ScriptFailed(String),

    #[error("No traversal root: {0}")]
    RootNotFound(String),

    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Element no longer attached to the page")]
    ElementDetached,

    #[error("Field extraction failed: {0}")]
    FieldExtraction(String),

    #[error("Locator synthesis failed: {0}")]
    LocatorSynthesis(String),

    #[error("Login {field} field could not be located")]
    LoginFieldNotFound { field: &'static str },

    #[error("Login submission failed: {0}")]
    LoginSubmitFailed(String),

    #[error("Page load timed out after {0} seconds")]
    PageLoadTimeout(u64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Browser error: {0}")]
    Browser(String),
}

pub type Result<T> = std::result::Result<T, ScribeError>;

// Convert anyhow::Error to ScribeError
impl From<anyhow::Error> for ScribeError {
    fn from(err: anyhow::Error) -> Self {
        ScribeError::Browser(err.to_string())
    }
}
