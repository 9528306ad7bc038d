use rust_decimal::{Decimal, RoundingStrategy};

pub fn write_csv<I, R, W>(records: I, writer: W) -> anyhow::Result<()>
where
    I: IntoIterator<Item = R>,
    R: serde::Serialize,
    W: std::io::Write,
{
    let mut wtr = csv::Writer::from_writer(writer);
    for record in records.into_iter() {
        wtr.serialize(record)?;
    }
    wtr.flush()?;
    Ok(())
}

/// Parse a buffer size such as `64k`, `8m` or `1g` into bytes.
///
/// Up to three digits followed by a binary unit suffix; the result must fit in an `i32`.
pub fn parse_buffer_size(s: &str) -> Result<usize, String> {
    let s = s.trim();
    let unit = s
        .chars()
        .last()
        .ok_or_else(|| "buffer size must not be empty".to_string())?;
    let exp = match unit.to_ascii_lowercase() {
        'k' => 1,
        'm' => 2,
        'g' => 3,
        _ => return Err(format!("invalid buffer size '{}': expected a k, m or g suffix", s)),
    };
    let digits = &s[..s.len() - unit.len_utf8()];
    if digits.is_empty() || digits.len() > 3 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid buffer size '{}': expected 1-3 digits", s));
    }
    let size: u64 = digits
        .parse()
        .map_err(|e| format!("invalid buffer size '{}': {}", s, e))?;
    let bytes = size * 1024u64.pow(exp);
    if bytes > i32::MAX as u64 {
        return Err(format!("invalid buffer size '{}': too many bytes", s));
    }
    if bytes == 0 {
        return Err(format!("invalid buffer size '{}': must be positive", s));
    }
    Ok(bytes as usize)
}

/// Round half away from zero to cents, always showing two places
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

/// Round to at most 8 decimal places, trimming trailing zeros
pub fn format_decimal(amount: Decimal) -> String {
    amount
        .round_dp_with_strategy(8, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn buffer_sizes() {
        assert_eq!(parse_buffer_size("8k"), Ok(8 * 1024));
        assert_eq!(parse_buffer_size("64K"), Ok(64 * 1024));
        assert_eq!(parse_buffer_size("16m"), Ok(16 * 1024 * 1024));
        assert_eq!(parse_buffer_size("1g"), Ok(1024 * 1024 * 1024));
    }

    #[test]
    fn buffer_size_rejects_bad_input() {
        assert!(parse_buffer_size("").is_err());
        assert!(parse_buffer_size("8").is_err());
        assert!(parse_buffer_size("k").is_err());
        assert!(parse_buffer_size("1024k").is_err());
        assert!(parse_buffer_size("2g").is_err());
        assert!(parse_buffer_size("0k").is_err());
        assert!(parse_buffer_size("8x").is_err());
    }

    #[test]
    fn formatting() {
        assert_eq!(format_money(dec!(10000)), "10000.00");
        assert_eq!(format_decimal(dec!(15.50000000)), "15.5");
        assert_eq!(format_decimal(dec!(100)), "100");
        assert_eq!(format_decimal(Decimal::ZERO), "0");
    }

    #[test]
    fn formatting_rounds_instead_of_truncating() {
        assert_eq!(format_money(dec!(0.129)), "0.13");
        assert_eq!(format_money(dec!(10.005)), "10.01");
        assert_eq!(format_money(dec!(-10.005)), "-10.01");
        assert_eq!(format_money(dec!(52142.857142857)), "52142.86");
        assert_eq!(format_decimal(dec!(1.123456789)), "1.12345679");
        assert_eq!(format_decimal(dec!(9.5714285714285714)), "9.57142857");
    }

    #[test]
    fn write_csv_records() {
        #[derive(serde::Serialize)]
        struct Row {
            name: &'static str,
            tax: String,
        }

        let mut out = Vec::new();
        write_csv(
            vec![Row {
                name: "sell",
                tax: "10.00".to_string(),
            }],
            &mut out,
        )
        .unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "name,tax\nsell,10.00\n");
    }
}
