pub mod probe;
pub mod run;

/// Exit code for fatal I/O and configuration errors.
pub const EXIT_FATAL: i32 = 3;

/// Split a comma-separated list, dropping blank entries.
pub fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a comma-separated list of numbers.
pub fn parse_numbers<T>(raw: &str) -> Result<Vec<T>, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    parse_list(raw)
        .iter()
        .map(|item| item.parse().map_err(|e| format!("'{item}': {e}")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_list_trims_and_drops_blanks() {
        assert_eq!(parse_list("a, b,,c "), vec!["a", "b", "c"]);
        assert!(parse_list(" , ").is_empty());
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(parse_numbers::<u32>("60, 80,99").unwrap(), vec![60, 80, 99]);
        assert_eq!(parse_numbers::<f64>("0,0.5").unwrap(), vec![0.0, 0.5]);
        assert!(parse_numbers::<u32>("60,high").unwrap_err().contains("high"));
    }
}
