use thiserror::Error;

use crate::model::{ListDescriptorError, SessionRecordError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    SessionRecord(#[from] SessionRecordError),
    #[error(transparent)]
    ListDescriptor(#[from] ListDescriptorError),
}
