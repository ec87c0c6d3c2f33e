#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    MissingFields(&'static str),
    #[error("{field} must be a valid date")]
    InvalidDate { field: &'static str },
}
