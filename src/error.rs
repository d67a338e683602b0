use std::fmt::Display;
use std::sync::PoisonError;

#[derive(Debug)]
pub enum Error {
    /// Name does not resolve, or inode index is not allocated
    NotFound,
    /// Bitmap exhausted or directory block full
    NoSpace,
    /// Descriptor table is full
    TooManyOpenFiles,
    /// Descriptor is unused or out of range
    InvalidHandle,
    NotADirectory,
    NotAFile,
    /// Bad magic or impossible geometry found on the volume
    CorruptVolume,
    /// Operation attempted without a successfully mounted volume
    NotMounted,
    AlreadyExists,
    DirectoryNotEmpty,
    InvalidName,
    InvalidSeek,
    /// Requested format geometry cannot be laid out on a volume
    InvalidGeometry,
    /// Lock around the filesystem was poisoned
    ThreadSync,
    /// Sector transfer failed
    Device(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound => write!(f, "not found"),
            Self::NoSpace => write!(f, "no space left on volume"),
            Self::TooManyOpenFiles => write!(f, "too many open files"),
            Self::InvalidHandle => write!(f, "invalid file handle"),
            Self::NotADirectory => write!(f, "not a directory"),
            Self::NotAFile => write!(f, "not a regular file"),
            Self::CorruptVolume => write!(f, "corrupt volume"),
            Self::NotMounted => write!(f, "filesystem is not mounted"),
            Self::AlreadyExists => write!(f, "already exists"),
            Self::DirectoryNotEmpty => write!(f, "directory not empty"),
            Self::InvalidName => write!(f, "invalid name"),
            Self::InvalidSeek => write!(f, "invalid seek offset"),
            Self::InvalidGeometry => write!(f, "invalid volume geometry"),
            Self::ThreadSync => write!(f, "filesystem lock poisoned"),
            Self::Device(e) => write!(f, "device error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Self::Device(value)
    }
}

impl<T> From<PoisonError<T>> for Error {
    fn from(_: PoisonError<T>) -> Self {
        Self::ThreadSync
    }
}

impl From<Error> for libc::c_int {
    fn from(value: Error) -> Self {
        match value {
            Error::NotFound => libc::ENOENT,
            Error::NoSpace => libc::ENOSPC,
            Error::TooManyOpenFiles => libc::EMFILE,
            Error::InvalidHandle => libc::EBADF,
            Error::NotADirectory => libc::ENOTDIR,
            Error::NotAFile => libc::EISDIR,
            Error::CorruptVolume => libc::EIO,
            Error::NotMounted => libc::ENODEV,
            Error::AlreadyExists => libc::EEXIST,
            Error::DirectoryNotEmpty => libc::ENOTEMPTY,
            Error::InvalidName => libc::EINVAL,
            Error::InvalidSeek => libc::EINVAL,
            Error::InvalidGeometry => libc::EINVAL,
            Error::ThreadSync => libc::EIO,
            Error::Device(e) => e.raw_os_error().unwrap_or(libc::EIO),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn errno_mapping() {
        assert_eq!(libc::c_int::from(Error::NotFound), libc::ENOENT);
        assert_eq!(libc::c_int::from(Error::DirectoryNotEmpty), libc::ENOTEMPTY);
        let io = std::io::Error::new(std::io::ErrorKind::Other, "sector");
        assert_eq!(libc::c_int::from(Error::Device(io)), libc::EIO);
    }
}
