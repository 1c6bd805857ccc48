use crate::error::DappError;
use alloy::primitives::{
    Address,
    U256,
};
use std::str::FromStr;

const ADDRESS_HEX_LEN: usize = 40;

/// Accepts `0x` followed by 40 hex digits. Mixed-case input is treated as
/// EIP-55 checksummed and must match the checksum exactly.
pub fn parse_address(input: &str) -> Result<Address, DappError> {
    let invalid = || DappError::InvalidAddress {
        input: input.to_string(),
    };
    let trimmed = input.trim();
    let hex = trimmed.strip_prefix("0x").ok_or_else(invalid)?;
    if hex.len() != ADDRESS_HEX_LEN || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let address = Address::from_str(trimmed).map_err(|_| invalid())?;

    let has_lower = hex.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = hex.chars().any(|c| c.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None) != trimmed {
        return Err(invalid());
    }
    Ok(address)
}

/// Parses a decimal amount into base units of a token with `decimals`.
pub fn parse_amount(input: &str, decimals: u8) -> Result<U256, DappError> {
    let invalid = |reason| DappError::InvalidAmount {
        input: input.to_string(),
        reason,
    };
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(invalid("amount is required"));
    }
    if trimmed.starts_with('-') {
        return Err(invalid("amount must be positive"));
    }
    let (whole, fraction) = match trimmed.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => (trimmed, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid("amount is not a number"));
    }
    let all_digits = |part: &str| part.chars().all(|c| c.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(invalid("amount is not a number"));
    }
    if fraction.len() > decimals as usize {
        return Err(invalid("too many decimal places"));
    }

    let mut digits = String::with_capacity(whole.len() + decimals as usize);
    digits.push_str(whole);
    digits.push_str(fraction);
    digits.extend(std::iter::repeat_n('0', decimals as usize - fraction.len()));
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Err(invalid("amount must be positive"));
    }
    U256::from_str_radix(digits, 10).map_err(|_| invalid("amount is too large"))
}

/// Renders base units as a decimal string without trailing fractional zeros.
pub fn format_amount(value: U256, decimals: u8) -> String {
    let digits = value.to_string();
    let decimals = decimals as usize;
    if decimals == 0 {
        return digits;
    }
    let padded = format!("{digits:0>width$}", width = decimals + 1);
    let (whole, fraction) = padded.split_at(padded.len() - decimals);
    let fraction = fraction.trim_end_matches('0');
    if fraction.is_empty() {
        whole.to_string()
    } else {
        format!("{whole}.{fraction}")
    }
}

/// Resolves the user's selection against the current option list.
pub fn option_index(selection: Option<usize>, option_count: usize) -> Result<usize, DappError> {
    match selection {
        Some(index) if index < option_count => Ok(index),
        _ => Err(DappError::NoSelection),
    }
}

pub fn short_address(address: &Address) -> String {
    let full = address.to_checksum(None);
    format!("{}...{}", &full[..6], &full[full.len() - 4..])
}
