use crate::error::ApiError;

/// Months are zero-based on the wire, January = 0.
pub fn validate_month(value: u32) -> Result<u32, ApiError> {
    if value <= 11 {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(
            "month must be between 0 and 11".into(),
        ))
    }
}

pub fn validate_year(value: i32) -> Result<i32, ApiError> {
    if (1970..=2100).contains(&value) {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(
            "year must be between 1970 and 2100".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_month() {
        assert!(validate_month(0).is_ok());
        assert!(validate_month(11).is_ok());
        assert!(validate_month(12).is_err());
    }

    #[test]
    fn test_validate_year() {
        assert!(validate_year(1970).is_ok());
        assert!(validate_year(2100).is_ok());
        assert!(validate_year(1969).is_err());
        assert!(validate_year(2101).is_err());
    }
}
