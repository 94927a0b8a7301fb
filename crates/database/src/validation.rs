//! Input validation for user, record and settings fields.
//!
//! Every error carries the wire name of the offending field so callers can
//! report it back. Messages are user-facing.

use std::fmt;

/// Validation error types.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Not a mainland mobile number (`1[3-9]` followed by 9 digits).
    InvalidPhone,
    /// Verification code is not six digits.
    InvalidCode,
    /// Empty value where one is required.
    Empty(&'static str),
    /// Value too long.
    TooLong {
        field: &'static str,
        max: usize,
        actual: usize,
    },
    /// Value too short.
    TooShort {
        field: &'static str,
        min: usize,
        actual: usize,
    },
    /// Money value that is negative, zero where forbidden, or has more than two decimals.
    InvalidAmount {
        field: &'static str,
        reason: &'static str,
    },
    /// Number outside its allowed interval.
    OutOfRange {
        field: &'static str,
        min: f64,
        max: f64,
    },
    /// Not an http(s) URL.
    InvalidUrl(&'static str),
    /// Anything else, with a ready-made message.
    Invalid {
        field: &'static str,
        message: String,
    },
}

impl ValidationError {
    /// Wire name of the rejected field.
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::InvalidPhone => "phone",
            ValidationError::InvalidCode => "code",
            ValidationError::Empty(field)
            | ValidationError::InvalidUrl(field)
            | ValidationError::TooLong { field, .. }
            | ValidationError::TooShort { field, .. }
            | ValidationError::InvalidAmount { field, .. }
            | ValidationError::OutOfRange { field, .. }
            | ValidationError::Invalid { field, .. } => field,
        }
    }

    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        ValidationError::Invalid {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::InvalidPhone => write!(f, "手机号格式不正确"),
            ValidationError::InvalidCode => write!(f, "验证码必须是6位数字"),
            ValidationError::Empty(field) => write!(f, "{}不能为空", field),
            ValidationError::TooLong { field, max, actual } => {
                write!(f, "{}长度不能超过{}个字符（当前{}）", field, max, actual)
            }
            ValidationError::TooShort { field, min, .. } => {
                write!(f, "{}长度不能少于{}个字符", field, min)
            }
            ValidationError::InvalidAmount { field, reason } => write!(f, "{}{}", field, reason),
            ValidationError::OutOfRange { field, min, max } => {
                write!(f, "{}必须在{}到{}之间", field, min, max)
            }
            ValidationError::InvalidUrl(field) => write!(f, "{}必须是有效的URL", field),
            ValidationError::Invalid { message, .. } => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for ValidationError {}

/// Maximum nickname length in characters.
pub const MAX_NICKNAME_LENGTH: usize = 50;

/// Minimum password length in characters.
pub const MIN_PASSWORD_LENGTH: usize = 6;

/// Maximum password length in bytes (bcrypt ignores anything longer).
pub const MAX_PASSWORD_LENGTH: usize = 72;

/// Maximum avatar URL length.
pub const MAX_AVATAR_LENGTH: usize = 2048;

/// Maximum length for group ids, group names and sender names.
pub const MAX_LABEL_LENGTH: usize = 200;

/// Maximum length for a red packet message.
pub const MAX_MESSAGE_LENGTH: usize = 500;

/// Largest accepted amount, in yuan.
pub const MAX_AMOUNT_YUAN: f64 = 1_000_000_000.0;

/// Largest accepted response delay, in seconds.
pub const MAX_RESPONSE_DELAY: f64 = 10.0;

/// Validate a mainland mobile number: 11 digits, `1` then `3`-`9`.
pub fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let bytes = phone.as_bytes();
    let valid = bytes.len() == 11
        && bytes.iter().all(u8::is_ascii_digit)
        && bytes[0] == b'1'
        && (b'3'..=b'9').contains(&bytes[1]);

    if valid {
        Ok(())
    } else {
        Err(ValidationError::InvalidPhone)
    }
}

/// Validate a six-digit verification code.
pub fn validate_code(code: &str) -> Result<(), ValidationError> {
    if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::InvalidCode)
    }
}

/// Validate and trim a nickname.
pub fn validate_nickname(nickname: &str) -> Result<String, ValidationError> {
    validate_text("nickname", nickname, MAX_NICKNAME_LENGTH)
}

pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    let chars = password.chars().count();
    if chars < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort {
            field: "password",
            min: MIN_PASSWORD_LENGTH,
            actual: chars,
        });
    }

    if password.len() > MAX_PASSWORD_LENGTH {
        return Err(ValidationError::TooLong {
            field: "password",
            max: MAX_PASSWORD_LENGTH,
            actual: password.len(),
        });
    }

    Ok(())
}

/// Validate an avatar URL. An empty value clears the avatar.
pub fn validate_avatar(avatar: &str) -> Result<String, ValidationError> {
    let avatar = avatar.trim();
    if avatar.is_empty() {
        return Ok(String::new());
    }

    if avatar.len() > MAX_AVATAR_LENGTH {
        return Err(ValidationError::TooLong {
            field: "avatar",
            max: MAX_AVATAR_LENGTH,
            actual: avatar.len(),
        });
    }

    match url::Url::parse(avatar) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.has_host() => {
            Ok(avatar.to_string())
        }
        _ => Err(ValidationError::InvalidUrl("avatar")),
    }
}

/// Trim a required free-text value and check its length in characters.
pub fn validate_text(field: &'static str, value: &str, max: usize) -> Result<String, ValidationError> {
    let value = value.trim();

    if value.is_empty() {
        return Err(ValidationError::Empty(field));
    }

    let chars = value.chars().count();
    if chars > max {
        return Err(ValidationError::TooLong {
            field,
            max,
            actual: chars,
        });
    }

    Ok(value.to_string())
}

/// Convert a strictly positive yuan amount into cents.
pub fn positive_amount_cents(field: &'static str, yuan: f64) -> Result<i64, ValidationError> {
    let cents = amount_cents(field, yuan)?;
    if cents == 0 {
        return Err(ValidationError::InvalidAmount {
            field,
            reason: "必须大于0",
        });
    }
    Ok(cents)
}

/// Convert a yuan amount that may be zero into cents.
pub fn amount_cents(field: &'static str, yuan: f64) -> Result<i64, ValidationError> {
    if !yuan.is_finite() || yuan < 0.0 {
        return Err(ValidationError::InvalidAmount {
            field,
            reason: "不能为负数",
        });
    }

    if yuan > MAX_AMOUNT_YUAN {
        return Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: MAX_AMOUNT_YUAN,
        });
    }

    let scaled = yuan * 100.0;
    let cents = scaled.round();
    if (scaled - cents).abs() > 1e-6 {
        return Err(ValidationError::InvalidAmount {
            field,
            reason: "最多保留两位小数",
        });
    }

    Ok(cents as i64)
}

/// Validate a response delay in seconds (`0..=10`).
pub fn validate_response_delay(field: &'static str, seconds: f64) -> Result<(), ValidationError> {
    if seconds.is_finite() && (0.0..=MAX_RESPONSE_DELAY).contains(&seconds) {
        Ok(())
    } else {
        Err(ValidationError::OutOfRange {
            field,
            min: 0.0,
            max: MAX_RESPONSE_DELAY,
        })
    }
}

/// Validate a measured response time (any non-negative number of seconds).
pub fn validate_response_time(seconds: f64) -> Result<(), ValidationError> {
    if seconds.is_finite() && seconds >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::invalid("responseTime", "responseTime不能为负数"))
    }
}

pub fn validate_rank(rank: i64) -> Result<(), ValidationError> {
    if rank >= 1 {
        Ok(())
    } else {
        Err(ValidationError::invalid("rank", "rank必须是大于等于1的整数"))
    }
}

/// Validate a wall-clock time of the form `HH:MM` (00-23, 00-59).
pub fn validate_clock_time(field: &'static str, value: &str) -> Result<(), ValidationError> {
    let valid = value
        .split_once(':')
        .filter(|(hour, minute)| {
            (1..=2).contains(&hour.len())
                && minute.len() == 2
                && hour.bytes().chain(minute.bytes()).all(|b| b.is_ascii_digit())
        })
        .and_then(|(hour, minute)| Some((hour.parse::<u8>().ok()?, minute.parse::<u8>().ok()?)))
        .is_some_and(|(hour, minute)| hour < 24 && minute < 60);

    if valid {
        Ok(())
    } else {
        Err(ValidationError::invalid(
            field,
            format!("{}格式必须为HH:MM", field),
        ))
    }
}

/// Check that a minimum does not exceed its maximum.
pub fn validate_amount_bounds(min_cents: i64, max_cents: i64) -> Result<(), ValidationError> {
    if min_cents <= max_cents {
        Ok(())
    } else {
        Err(ValidationError::invalid("maxAmount", "最大金额不能小于最小金额"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_phone() {
        assert!(validate_phone("13800138000").is_ok());
        assert!(validate_phone("19912345678").is_ok());

        for bad in ["", "1380013800", "138001380000", "12800138000", "23800138000", "1380013800a", "+8613800138"] {
            assert_eq!(validate_phone(bad), Err(ValidationError::InvalidPhone), "{bad}");
        }
    }

    #[test]
    fn test_validate_code() {
        assert!(validate_code("123456").is_ok());
        assert!(validate_code("12345").is_err());
        assert!(validate_code("1234567").is_err());
        assert!(validate_code("12a456").is_err());
    }

    #[test]
    fn test_validate_nickname() {
        assert_eq!(validate_nickname("  小明 ").unwrap(), "小明");
        assert!(matches!(validate_nickname("   "), Err(ValidationError::Empty("nickname"))));

        // 50 multi-byte characters are fine, 51 are not.
        assert!(validate_nickname(&"红".repeat(50)).is_ok());
        assert!(matches!(
            validate_nickname(&"红".repeat(51)),
            Err(ValidationError::TooLong { max: 50, actual: 51, .. })
        ));
    }

    #[test]
    fn test_validate_password() {
        assert!(validate_password("abcdef").is_ok());
        assert!(matches!(validate_password("abc"), Err(ValidationError::TooShort { .. })));
        assert!(matches!(
            validate_password(&"a".repeat(73)),
            Err(ValidationError::TooLong { .. })
        ));
    }

    #[test]
    fn test_validate_avatar() {
        assert_eq!(validate_avatar("").unwrap(), "");
        assert_eq!(
            validate_avatar(" https://cdn.example.com/a.png ").unwrap(),
            "https://cdn.example.com/a.png"
        );
        assert!(validate_avatar("ftp://example.com/a.png").is_err());
        assert!(validate_avatar("not a url").is_err());
    }

    #[test]
    fn test_amount_cents() {
        assert_eq!(positive_amount_cents("amount", 8.88), Ok(888));
        assert_eq!(positive_amount_cents("amount", 0.01), Ok(1));
        assert_eq!(positive_amount_cents("amount", 100.0), Ok(10_000));
        assert_eq!(amount_cents("minAmount", 0.0), Ok(0));

        assert!(matches!(
            positive_amount_cents("amount", 0.0),
            Err(ValidationError::InvalidAmount { reason: "必须大于0", .. })
        ));
        assert!(matches!(
            amount_cents("amount", -1.0),
            Err(ValidationError::InvalidAmount { .. })
        ));
        assert!(matches!(
            amount_cents("amount", 1.234),
            Err(ValidationError::InvalidAmount { reason: "最多保留两位小数", .. })
        ));
        assert!(amount_cents("amount", f64::NAN).is_err());
        assert!(amount_cents("amount", f64::INFINITY).is_err());
    }

    #[test]
    fn test_validate_response_delay() {
        assert!(validate_response_delay("responseDelay", 0.0).is_ok());
        assert!(validate_response_delay("responseDelay", 10.0).is_ok());
        assert!(validate_response_delay("responseDelay", 10.5).is_err());
        assert!(validate_response_delay("responseDelay", -0.1).is_err());
    }

    #[test]
    fn test_validate_clock_time() {
        for good in ["00:00", "8:30", "08:00", "23:59"] {
            assert!(validate_clock_time("startTime", good).is_ok(), "{good}");
        }
        for bad in ["24:00", "12:60", "12:5", "1230", "ab:cd", "", "123:00"] {
            assert!(validate_clock_time("startTime", bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_validation_error_field_and_display() {
        assert_eq!(ValidationError::InvalidPhone.field(), "phone");
        assert_eq!(ValidationError::InvalidPhone.to_string(), "手机号格式不正确");

        let err = ValidationError::TooLong {
            field: "nickname",
            max: 50,
            actual: 60,
        };
        assert_eq!(err.field(), "nickname");
        assert_eq!(err.to_string(), "nickname长度不能超过50个字符（当前60）");

        assert_eq!(validate_amount_bounds(500, 100).unwrap_err().field(), "maxAmount");
    }
}
