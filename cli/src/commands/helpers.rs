use serde::Serialize;

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// Render an amount with at most `precision` decimals, trailing zeros trimmed.
pub(crate) fn fmt_amount(v: f64, precision: usize) -> String {
    let s = format!("{:.precision$}", no_neg_zero(v));
    if s.contains('.') {
        let trimmed = s.trim_end_matches('0').trim_end_matches('.');
        if trimmed == "-0" {
            "0".to_string()
        } else {
            trimmed.to_string()
        }
    } else {
        s
    }
}

pub(crate) fn fmt_optional(v: Option<f64>) -> String {
    v.map_or("-".into(), |d| fmt_amount(d, 3))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("hello", 10), "hello");
        assert_eq!(truncate("hello world this is long", 10), "hello w...");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Crème fraîche", 10), "Crème f...");
        assert_eq!(truncate("Müsli", 10), "Müsli");
    }

    #[test]
    fn test_no_neg_zero() {
        assert_eq!(no_neg_zero(-0.0).to_bits(), 0.0_f64.to_bits());
        assert_eq!(no_neg_zero(-3.0), -3.0);
    }

    #[test]
    fn test_fmt_amount() {
        assert_eq!(fmt_amount(250.0, 3), "250");
        assert_eq!(fmt_amount(236.588, 3), "236.588");
        assert_eq!(fmt_amount(29.573_5, 2), "29.57");
        assert_eq!(fmt_amount(1.5, 3), "1.5");
        assert_eq!(fmt_amount(-0.0001, 2), "0");
    }

    #[test]
    fn test_fmt_optional() {
        assert_eq!(fmt_optional(None), "-");
        assert_eq!(fmt_optional(Some(1.03)), "1.03");
    }

    #[test]
    fn test_json_error_escapes() {
        let s = json_error("bad \"quote\"");
        let v: serde_json::Value = serde_json::from_str(&s).unwrap();
        assert_eq!(v["error"], "bad \"quote\"");
    }
}
