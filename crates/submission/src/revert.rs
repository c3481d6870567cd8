//! Revert reason parsing
//!
//! The ledger reports a revert as one free-form string. Error codes appear in
//! it in two shapes:
//!
//! ```text
//! Failure reason: 0x4e4f545f594f55525f5455524e ('NOT_YOUR_TURN').
//! Failure reason: (0x4e4f545f..., 0x454e545259504f494e545f4641494c4544).
//! ```
//!
//! Quoted short strings are taken as-is. Without quotes, each `0x` word after
//! `Failure reason:` is decoded as an ASCII short string. Wrapper codes added
//! by the call stack are dropped. This is the only place that knows the
//! encoding.

/// Codes added by nested calls rather than by the game contract
const WRAPPER_CODES: &[&str] = &["ENTRYPOINT_FAILED"];

const FAILURE_MARKER: &str = "Failure reason:";

/// Extract the short error codes embedded in a revert reason
pub fn parse_revert_reason(reason: &str) -> Vec<String> {
    let mut codes = quoted_codes(reason);
    if codes.is_empty() {
        codes = hex_codes(reason);
    }

    let mut seen = Vec::new();
    for code in codes {
        if WRAPPER_CODES.contains(&code.as_str()) || seen.contains(&code) {
            continue;
        }
        seen.push(code);
    }
    seen
}

/// Every `('...')` substring
fn quoted_codes(reason: &str) -> Vec<String> {
    let mut codes = Vec::new();
    let mut rest = reason;
    while let Some(start) = rest.find("('") {
        let tail = &rest[start + 2..];
        match tail.find("')") {
            Some(end) => {
                let code = tail[..end].trim();
                if !code.is_empty() {
                    codes.push(code.to_string());
                }
                rest = &tail[end + 2..];
            }
            None => break,
        }
    }
    codes
}

/// `0x` words following each failure marker, decoded as short strings
fn hex_codes(reason: &str) -> Vec<String> {
    reason
        .match_indices(FAILURE_MARKER)
        .flat_map(|(i, _)| {
            let tail = &reason[i + FAILURE_MARKER.len()..];
            let end = tail.find('\n').unwrap_or(tail.len());
            tail[..end]
                .split(|c: char| c.is_whitespace() || matches!(c, '(' | ')' | ',' | '.'))
                .filter_map(decode_short_string)
                .collect::<Vec<_>>()
        })
        .collect()
}

fn decode_short_string(word: &str) -> Option<String> {
    let hex = word.strip_prefix("0x")?;
    if hex.is_empty() || hex.len() > 62 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let padded = if hex.len() % 2 == 1 {
        format!("0{}", hex)
    } else {
        hex.to_string()
    };

    let bytes = (0..padded.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&padded[i..i + 2], 16))
        .collect::<Result<Vec<u8>, _>>()
        .ok()?;
    let text: String = bytes.iter().skip_while(|&&b| b == 0).map(|&b| b as char).collect();

    if !text.is_empty() && text.chars().all(|c| c.is_ascii_graphic()) {
        Some(text)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quoted_codes() {
        let reason = "Transaction execution has failed:\n\
            0: Error in the called contract (contract address: 0x04b1):\n\
            Execution failed. Failure reason: 0x4e4f545f594f55525f5455524e ('NOT_YOUR_TURN').\n\
            1: Error in the called contract (0x0123):\n\
            Execution failed. Failure reason: 0x454e545259504f494e545f4641494c4544 ('ENTRYPOINT_FAILED').";
        assert_eq!(parse_revert_reason(reason), vec!["NOT_YOUR_TURN".to_string()]);
    }

    #[test]
    fn test_multiple_codes_deduplicated() {
        let reason = "Failure reason: ('SHOT_PENDING'), ('ENTRYPOINT_FAILED'), ('SHOT_PENDING'), ('BAD_COORD')";
        assert_eq!(
            parse_revert_reason(reason),
            vec!["SHOT_PENDING".to_string(), "BAD_COORD".to_string()]
        );
    }

    #[test]
    fn test_hex_fallback() {
        let reason = "Execution failed. Failure reason: (0x5354414b455f4d49534d41544348, 0x454e545259504f494e545f4641494c4544).";
        assert_eq!(parse_revert_reason(reason), vec!["STAKE_MISMATCH".to_string()]);
    }

    #[test]
    fn test_unparseable_reason_yields_no_codes() {
        assert!(parse_revert_reason("").is_empty());
        assert!(parse_revert_reason("out of gas").is_empty());
        assert!(parse_revert_reason("Failure reason: 0x00").is_empty());
    }
}
