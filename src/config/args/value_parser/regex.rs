use regex::Regex;

const INVALID_REGEX: &str = "invalid regular expression.";

pub fn parse_regex(regex: &str) -> Result<String, String> {
    if Regex::new(regex).is_err() {
        return Err(INVALID_REGEX.to_string());
    }

    Ok(regex.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_regex() {
        init_dummy_tracing_subscriber();

        parse_regex(r".+\.(csv|pdf)$").unwrap();
    }

    #[test]
    fn invalid_regex() {
        init_dummy_tracing_subscriber();

        assert_eq!(parse_regex(r"*invalid"), Err(INVALID_REGEX.to_string()));
    }

    fn init_dummy_tracing_subscriber() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("dummy=trace")
            .try_init();
    }
}
