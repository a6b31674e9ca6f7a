/// Formats bytes as uppercase hexadecimal pairs separated by spaces.
pub(crate) fn format_hex(bytes: &[u8]) -> String {
    if bytes.is_empty() {
        return "<empty>".to_string();
    }

    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Formats an optional string for terminal output.
pub(crate) fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Formats a measurement value with two decimals, dropping a trailing `.00`.
pub(crate) fn format_value(value: f64) -> String {
    let rendered = format!("{value:.2}");
    match rendered.strip_suffix(".00") {
        Some(whole) => whole.to_string(),
        None => rendered,
    }
}
