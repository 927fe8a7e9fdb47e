use time::PrimitiveDateTime;
use time::macros::format_description;

use crate::error::AppError;

/// Parse a naive `YYYY-MM-DDTHH:MM[:SS]` timestamp as the backend stores it.
pub fn parse_timestamp_opt(value: Option<String>) -> Result<Option<PrimitiveDateTime>, AppError> {
    let Some(value) = value else {
        return Ok(None);
    };

    let with_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    let without_seconds = format_description!("[year]-[month]-[day]T[hour]:[minute]");

    PrimitiveDateTime::parse(&value, with_seconds)
        .or_else(|_| PrimitiveDateTime::parse(&value, without_seconds))
        .map(Some)
        .map_err(|err| AppError::invalid_input(format!("invalid timestamp `{value}`: {err}")))
}
