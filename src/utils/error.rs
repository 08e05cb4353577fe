use thiserror::Error;

#[derive(Error, Debug)]
pub enum FxnnError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error(
        "Capacity error: one output channel needs {required} weight elements, working memory holds {capacity}"
    )]
    Capacity { required: usize, capacity: usize },

    #[error("Weight store error: {0}")]
    Weights(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
}
