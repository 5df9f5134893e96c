//! Device line → measurement value

/// Parse one input line into a value.
///
/// Accepts the device forms `22.5`, `TEMP=22.5`, `22,5` and tolerates
/// trailing units (`22.5C`) and stray NUL bytes. Returns `None` when no
/// finite number leads the line.
pub fn parse_measurement(line: &str) -> Option<f64> {
    let cleaned: String = line.chars().filter(|c| *c != '\0').collect();
    let mut text = cleaned.trim();
    if let Some(rest) = text.strip_prefix("TEMP=") {
        text = rest.trim_start();
    }

    let text = text.replace(',', ".");
    numeric_prefix(&text)
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Longest prefix shaped like `[+-]digits[.digits][e[+-]digits]`
fn numeric_prefix(s: &str) -> &str {
    let b = s.as_bytes();
    let digits_from = |mut i: usize| {
        while i < b.len() && b[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut i = 0;
    if i < b.len() && (b[i] == b'+' || b[i] == b'-') {
        i += 1;
    }
    let int_end = digits_from(i);
    let mut digits = int_end - i;
    i = int_end;

    if i < b.len() && b[i] == b'.' {
        let frac_end = digits_from(i + 1);
        digits += frac_end - (i + 1);
        i = frac_end;
    }
    if digits == 0 {
        return "";
    }

    if i < b.len() && (b[i] == b'e' || b[i] == b'E') {
        let mut j = i + 1;
        if j < b.len() && (b[j] == b'+' || b[j] == b'-') {
            j += 1;
        }
        let exp_end = digits_from(j);
        if exp_end > j {
            i = exp_end;
        }
    }

    &s[..i]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_values() {
        assert_eq!(parse_measurement("22.5"), Some(22.5));
        assert_eq!(parse_measurement("  -3.25\r"), Some(-3.25));
        assert_eq!(parse_measurement("+7"), Some(7.0));
        assert_eq!(parse_measurement("1e2"), Some(100.0));
    }

    #[test]
    fn test_device_variants() {
        assert_eq!(parse_measurement("TEMP=23.125"), Some(23.125));
        assert_eq!(parse_measurement("TEMP= 23.125"), Some(23.125));
        assert_eq!(parse_measurement("21,75"), Some(21.75));
        assert_eq!(parse_measurement("\0\022.0\0"), Some(22.0));
        assert_eq!(parse_measurement("23.5C"), Some(23.5));
        assert_eq!(parse_measurement("23.5 degC"), Some(23.5));
        assert_eq!(parse_measurement("4e"), Some(4.0));
    }

    #[test]
    fn test_rejects_non_numeric() {
        for line in ["", "   ", "TEMP=", "hello", "-", ".", "NaN", "inf", "e5", "temp=22"] {
            assert_eq!(parse_measurement(line), None, "line {:?}", line);
        }
    }
}
