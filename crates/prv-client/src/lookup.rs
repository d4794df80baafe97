use crate::error::{ClientError, ClientResult};

/// Outcome of a read-only registry query.
///
/// Absence is an ordinary answer, not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
    Error(ClientError),
}

impl<T> Lookup<T> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Self::Found(v) => Lookup::Found(f(v)),
            Self::NotFound => Lookup::NotFound,
            Self::Error(e) => Lookup::Error(e),
        }
    }

    /// Collapse into a `Result`, with `NotFound` as `Ok(None)`.
    pub fn into_result(self) -> ClientResult<Option<T>> {
        match self {
            Self::Found(v) => Ok(Some(v)),
            Self::NotFound => Ok(None),
            Self::Error(e) => Err(e),
        }
    }
}

impl<T> From<ClientResult<Option<T>>> for Lookup<T> {
    fn from(result: ClientResult<Option<T>>) -> Self {
        match result {
            Ok(Some(v)) => Self::Found(v),
            Ok(None) => Self::NotFound,
            Err(e) => Self::Error(e),
        }
    }
}
