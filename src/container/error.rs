#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid container id: `{0}`")]
    InvalidContainerID(String),
    #[error("expecting URL like container ID `<runtime>://<id>`, got `{0}`")]
    MissingScheme(String),
    #[error("invalid runtime prefix in container ID `{0}`")]
    InvalidScheme(String),
}

pub type Result<T> = std::result::Result<T, Error>;
