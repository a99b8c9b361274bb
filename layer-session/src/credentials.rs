//! Validation of the values the user types in.

use crate::remedy::Failure;

const APPS_HINT: &str = "Go back to https://my.telegram.org/apps";

/// `api_id`: non-empty, ASCII digits only, fits in an `i32`.
pub fn parse_api_id(input: &str) -> Result<i32, Failure> {
    let s = input.trim();
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Failure::new(
            format!("API ID should be all numbers. You entered: '{s}'"),
            format!("{APPS_HINT}\nThe api_id is the short number, e.g.  1234567"),
        ));
    }
    s.parse().map_err(|_| Failure::new(
        format!("API ID is too large to be real: '{s}'"),
        format!("{APPS_HINT}\nThe api_id is the short number, e.g.  1234567"),
    ))
}

/// `api_hash`: exactly 32 characters.
pub fn parse_api_hash(input: &str) -> Result<String, Failure> {
    let s = input.trim();
    let len = s.chars().count();
    if len != 32 {
        return Err(Failure::new(
            format!("API Hash should be exactly 32 characters. Yours is {len}."),
            format!(
                "{APPS_HINT}\n\
                 Copy the full api_hash. It looks like:  a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4"
            ),
        ));
    }
    Ok(s.to_string())
}

/// Phone number: must start with `+` and the country code.
pub fn parse_phone(input: &str) -> Result<String, Failure> {
    let s = input.trim();
    if !s.starts_with('+') {
        return Err(Failure::new(
            format!("Phone number must start with + and your country code. You entered: '{s}'"),
            "Examples:\n\
             \x20 +447712345678  (UK, starts with +44)\n\
             \x20 +12025550123   (US, starts with +1)\n\
             \x20 +353871234567  (Ireland, starts with +353)",
        ));
    }
    Ok(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_id_accepts_digits() {
        assert_eq!(parse_api_id("1234567"), Ok(1234567));
        assert_eq!(parse_api_id("  42 \n"), Ok(42));
    }

    #[test]
    fn api_id_rejects_non_digits() {
        for bad in ["", "12a4", "-5", "12 34", "１２"] {
            let f = parse_api_id(bad).unwrap_err();
            assert!(f.message.starts_with("API ID should be all numbers"), "{bad:?}");
            assert!(f.fix.unwrap().contains("my.telegram.org/apps"));
        }
    }

    #[test]
    fn api_id_rejects_overflow() {
        let f = parse_api_id("99999999999").unwrap_err();
        assert!(f.message.contains("too large"));
    }

    #[test]
    fn api_hash_length() {
        let good = "a1b2c3d4e5f6a1b2c3d4e5f6a1b2c3d4";
        assert_eq!(parse_api_hash(good).as_deref(), Ok(good));
        assert_eq!(
            parse_api_hash("abc").unwrap_err().message,
            "API Hash should be exactly 32 characters. Yours is 3.",
        );
        assert!(parse_api_hash(&format!("{good}0")).is_err());
    }

    #[test]
    fn phone_needs_plus() {
        assert_eq!(parse_phone(" +447712345678 ").as_deref(), Ok("+447712345678"));
        let f = parse_phone("447712345678").unwrap_err();
        assert_eq!(
            f.message,
            "Phone number must start with + and your country code. You entered: '447712345678'",
        );
        assert!(f.fix.unwrap().contains("+12025550123"));
    }
}
