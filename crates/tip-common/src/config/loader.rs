use serde::Deserialize;

use crate::error::{CommonError, CommonResult};

pub fn deserialize_non_zero<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = usize::deserialize(deserializer)?;
    if value == 0 {
        Ok(None)
    } else {
        Ok(Some(value))
    }
}

/// Parses a memory size such as `"512m"` or `"2g"` into bytes.
///
/// The accepted suffixes are `b`, `k`, `m`, `g` and `t` (case-insensitive,
/// optionally followed by `b`, as in `"2gb"`). A number without a suffix is
/// interpreted as MiB, which matches how executor memory overhead is usually given.
pub fn parse_byte_size(value: &str) -> CommonResult<usize> {
    let value = value.trim().to_ascii_lowercase();
    let digits = value
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(digits);
    let number: usize = number
        .parse()
        .map_err(|_| CommonError::invalid(format!("invalid memory size: {value:?}")))?;
    let shift = match unit {
        "b" => 0,
        "k" | "kb" => 10,
        "" | "m" | "mb" => 20,
        "g" | "gb" => 30,
        "t" | "tb" => 40,
        _ => {
            return Err(CommonError::invalid(format!(
                "invalid memory size unit: {value:?}"
            )))
        }
    };
    number
        .checked_mul(1usize << shift)
        .ok_or_else(|| CommonError::invalid(format!("memory size is too large: {value:?}")))
}
