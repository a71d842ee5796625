//! Duration arguments: `25m`, `30s`, `1m30s`, or a bare number of minutes.

use crate::error::DurationParseError;

/// Parses a duration and splits it into `(minutes, seconds)` with
/// `seconds < 60`.
///
/// # Errors
///
/// Returns a [`DurationParseError`] for malformed input or a zero total.
pub fn parse_duration(input: &str) -> Result<(u32, u32), DurationParseError> {
    let input = input.trim().to_lowercase();
    if input.is_empty() {
        return Err(DurationParseError::Empty);
    }

    // A bare number is minutes
    if let Ok(minutes) = input.parse::<u32>() {
        return split(u64::from(minutes) * 60);
    }

    let mut total_seconds = 0u64;
    let mut current_number = String::new();

    for ch in input.chars() {
        if ch.is_ascii_digit() {
            current_number.push(ch);
        } else if ch == 'm' || ch == 's' {
            if current_number.is_empty() {
                return Err(DurationParseError::InvalidCharacter(ch));
            }

            let number: u64 = current_number
                .parse()
                .map_err(|_| DurationParseError::Overflow)?;
            let scale = if ch == 'm' { 60 } else { 1 };
            total_seconds = number
                .checked_mul(scale)
                .and_then(|s| total_seconds.checked_add(s))
                .ok_or(DurationParseError::Overflow)?;

            current_number.clear();
        } else if !ch.is_whitespace() {
            return Err(DurationParseError::InvalidCharacter(ch));
        }
    }

    if !current_number.is_empty() {
        return Err(DurationParseError::MissingUnit);
    }

    split(total_seconds)
}

fn split(total_seconds: u64) -> Result<(u32, u32), DurationParseError> {
    if total_seconds == 0 {
        return Err(DurationParseError::Zero);
    }
    let minutes = u32::try_from(total_seconds / 60).map_err(|_| DurationParseError::Overflow)?;
    #[allow(clippy::cast_possible_truncation)]
    let seconds = (total_seconds % 60) as u32;
    Ok((minutes, seconds))
}

/// Human form such as `1 minute 30 seconds`.
#[must_use]
pub fn format_duration(minutes: u32, seconds: u32) -> String {
    let plural = |n: u32| if n == 1 { "" } else { "s" };

    if minutes > 0 && seconds > 0 {
        format!(
            "{minutes} minute{} {seconds} second{}",
            plural(minutes),
            plural(seconds)
        )
    } else if minutes > 0 {
        format!("{minutes} minute{}", plural(minutes))
    } else {
        format!("{seconds} second{}", plural(seconds))
    }
}
