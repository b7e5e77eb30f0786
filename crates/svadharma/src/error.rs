#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(String),

    #[error("catalog error: {0}")]
    Catalog(String),

    #[error("cannot open {view} without selecting an item first")]
    MissingSelection { view: &'static str },

    #[error(transparent)]
    Common(#[from] svadharma_common::error::CommonError),
}
