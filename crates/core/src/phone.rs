//! Canonicalisation of user-entered phone numbers.
//!
//! Everything but ASCII digits is stripped. Ten-digit numbers are treated as
//! domestic numbers missing the country code `7`, eleven-digit numbers with a
//! leading trunk prefix `8` get it replaced by `7`. Longer inputs are assumed
//! to be international already. No per-country length tables are applied.

use thiserror::Error;

const DOMESTIC_LENGTH: usize = 10;
const NATIONAL_LENGTH: usize = 11;
const COUNTRY_CODE: char = '7';
const TRUNK_PREFIX: char = '8';

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhoneError {
    #[error("phone has no digits")]
    EmptyInput,
    #[error("phone length {digits} too short")]
    TooShort { digits: usize },
}

pub fn normalize(raw: &str) -> Result<String, PhoneError> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        return Err(PhoneError::EmptyInput);
    }

    let canonical = match digits.len() {
        len if len < DOMESTIC_LENGTH => return Err(PhoneError::TooShort { digits: len }),
        DOMESTIC_LENGTH => format!("{COUNTRY_CODE}{digits}"),
        NATIONAL_LENGTH if digits.starts_with(TRUNK_PREFIX) => {
            format!("{COUNTRY_CODE}{}", &digits[1..])
        }
        _ => digits,
    };

    Ok(format!("+{canonical}"))
}

#[cfg(test)]
mod tests {
    use super::{normalize, PhoneError};

    #[test]
    fn ten_digits_get_country_code() {
        assert_eq!(normalize("9991234567"), Ok("+79991234567".to_owned()));
    }

    #[test]
    fn trunk_prefix_is_replaced() {
        assert_eq!(normalize("89991234567"), Ok("+79991234567".to_owned()));
        assert_eq!(normalize("8 (999) 123-45-67"), Ok("+79991234567".to_owned()));
    }

    #[test]
    fn eleven_digits_with_country_code_pass_through() {
        assert_eq!(normalize("79991234567"), Ok("+79991234567".to_owned()));
        assert_eq!(normalize("+7 999 123 45 67"), Ok("+79991234567".to_owned()));
        assert_eq!(normalize("19991234567"), Ok("+19991234567".to_owned()));
    }

    #[test]
    fn long_numbers_are_treated_as_international() {
        assert_eq!(normalize("+44 20 7946 09581"), Ok("+4420794609581".to_owned()));
    }

    #[test]
    fn inputs_without_digits_are_rejected() {
        assert_eq!(normalize("abc"), Err(PhoneError::EmptyInput));
        assert_eq!(normalize(""), Err(PhoneError::EmptyInput));
    }

    #[test]
    fn short_inputs_are_rejected() {
        assert_eq!(normalize("12345"), Err(PhoneError::TooShort { digits: 5 }));
        assert_eq!(normalize("999123456"), Err(PhoneError::TooShort { digits: 9 }));
    }

    #[test]
    fn trailing_text_is_ignored() {
        assert_eq!(normalize("89991234567nobody"), Ok("+79991234567".to_owned()));
    }
}
