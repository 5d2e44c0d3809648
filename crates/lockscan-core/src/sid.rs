/// Render a security identifier in the standard `S-1-<authority>-<sub>...` form.
///
/// Authorities that fit in 32 bits print in decimal, larger ones as
/// 12-digit hex, matching what `ConvertSidToStringSid` produces.
pub fn format_sid(revision: u8, authority: [u8; 6], sub_authorities: &[u32]) -> String {
    let mut text = format!("S-{revision}-");

    if authority[0] == 0 && authority[1] == 0 {
        let value = u32::from_be_bytes([authority[2], authority[3], authority[4], authority[5]]);
        text.push_str(&value.to_string());
    } else {
        let value = authority
            .iter()
            .fold(0u64, |acc, byte| (acc << 8) | u64::from(*byte));
        text.push_str(&format!("0x{value:012X}"));
    }

    for sub in sub_authorities {
        text.push('-');
        text.push_str(&sub.to_string());
    }

    text
}
