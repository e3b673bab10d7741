use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid density field: {0}")]
    InvalidDensity(String),

    #[error("unknown point size mapping '{0}'")]
    UnknownMapping(String),

    /// More distinct natural neighbors contributed to a pixel than the weight table can hold.
    #[error("pixel ({x}, {y}) has {count} natural neighbors, table holds at most {capacity}")]
    NeighborOverflow {
        x: usize,
        y: usize,
        count: usize,
        capacity: usize,
    },

    #[error("stippling was cancelled")]
    Cancelled,
}
