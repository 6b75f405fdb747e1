use std::borrow::Cow;
use validator::ValidationError;

/// 必填文本字段：去除首尾空白后不能为空
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some(Cow::from("must not be empty"));
        return Err(error);
    }

    Ok(())
}

/// 规范化自由文本（去除首尾空白）
pub fn normalize_text(value: &str) -> String {
    value.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank() {
        assert!(validate_not_blank("Proposal Defense").is_ok());
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank("   \t").is_err());
    }

    #[test]
    fn test_normalize_text() {
        assert_eq!(normalize_text("  Thesis draft \n"), "Thesis draft");
    }
}
