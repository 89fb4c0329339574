use derive_more::{Display, Error};

pub type Error = exn::Exn<ErrorKind>;
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    #[display("could not load configuration")]
    Config,
    #[display("invalid arguments: {_0}")]
    Arguments(#[error(not(source))] String),
    #[display("failed to synchronize {_0}")]
    Sync(#[error(not(source))] String),
}
