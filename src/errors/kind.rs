use serde::Serialize;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    InvalidInput,
    UpstreamUnavailable,
    UnitFailure,
    RunFailure,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub fn is_client_error(self) -> bool {
        matches!(self, ErrorKind::InvalidInput | ErrorKind::NotFound)
    }
}
