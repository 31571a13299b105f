use derive_more::Display;
use types::RefreshError;

#[derive(Debug, Display)]
pub enum CliError {
    #[display("{}", _0)]
    Refresh(RefreshError),
}

impl From<RefreshError> for CliError {
    fn from(error: RefreshError) -> Self {
        Self::Refresh(error)
    }
}
