use crate::{container, fsutil};

/// Errors that may occur while resolving a process cgroup to a container.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Read(#[from] fsutil::FileReadError),
    #[error("cgroup not found")]
    CgroupNotFound,
    #[error("cgroup path not found in `{cgroup_path}`")]
    CgroupPathNotFound { cgroup_path: String },
    #[error(transparent)]
    InvalidContainerID(#[from] container::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
