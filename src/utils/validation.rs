use validator::Validate;

use crate::error::{Error, Result};

pub fn validate<T: Validate>(val: &T) -> Result<()> {
    val.validate().map_err(|errors| {
        tracing::debug!(%errors, "request failed validation");
        Error::from(errors)
    })
}
