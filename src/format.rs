// Number formatting shared by audit findings and chat embeds.

/// `1234567` -> `"1,234,567"`.
pub fn thousands(value: i64) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 1);
    if value < 0 {
        out.push('-');
    }
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Whole-dollar amount with separators, e.g. `$1,234,567`.
pub fn money(value: f64) -> String {
    format!("${}", thousands(value.round() as i64))
}

/// Compact amount for tight layouts: `$1.2M`, `$350.0K`, `$12`.
pub fn compact_money(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1_000_000_000.0 {
        format!("${:.1}B", value / 1_000_000_000.0)
    } else if abs >= 1_000_000.0 {
        format!("${:.1}M", value / 1_000_000.0)
    } else if abs >= 1_000.0 {
        format!("${:.1}K", value / 1_000.0)
    } else {
        format!("${:.0}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thousands() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1000), "1,000");
        assert_eq!(thousands(1234567), "1,234,567");
        assert_eq!(thousands(-45000), "-45,000");
    }

    #[test]
    fn test_money() {
        assert_eq!(money(1234.6), "$1,235");
        assert_eq!(compact_money(1_500_000.0), "$1.5M");
        assert_eq!(compact_money(350_000.0), "$350.0K");
        assert_eq!(compact_money(12.0), "$12");
        assert_eq!(compact_money(2_000_000_000.0), "$2.0B");
    }
}
