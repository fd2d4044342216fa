//! Token expiry math.
//!
//! Tokens are JWT-shaped (`header.payload.signature`) with a base64url JSON
//! payload. Only the numeric `exp` claim is read; nothing here verifies
//! signatures. Every malformed input yields `None`.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use core_runtime::config::RefreshTiming;
use std::time::Duration;

/// Expiry instant (Unix seconds) encoded in `token`, if extractable.
///
/// # Examples
///
/// ```
/// use core_auth::token_clock::expiry_of;
///
/// // {"exp":1700000000}
/// let token = "eyJhbGciOiJIUzI1NiJ9.eyJleHAiOjE3MDAwMDAwMDB9.sig";
/// assert_eq!(expiry_of(token), Some(1_700_000_000));
///
/// assert_eq!(expiry_of("not-a-jwt"), None);
/// ```
pub fn expiry_of(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() || payload.is_empty() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;

    exp.as_i64()
        .or_else(|| exp.as_f64().filter(|v| v.is_finite()).map(|v| v.floor() as i64))
}

/// Time left before `token` expires, measured from `now` (Unix seconds).
///
/// Negative when already expired; `None` when the expiry is unknown.
pub fn remaining(token: &str, now: i64) -> Option<chrono::Duration> {
    expiry_of(token).map(|exp| chrono::Duration::seconds(exp.saturating_sub(now)))
}

/// When to fire the proactive refresh relative to a token's remaining life.
///
/// The delay is `max(remaining - guard_window, floor)`: refresh a little
/// before expiry, but never sooner than `floor` from now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSchedule {
    guard_window: Duration,
    floor: Duration,
}

impl RefreshSchedule {
    /// # Errors
    ///
    /// Rejects a zero floor or a guard window that is not larger than the
    /// floor.
    pub fn new(guard_window: Duration, floor: Duration) -> core_runtime::Result<Self> {
        Self::from_timing(&RefreshTiming {
            guard_window,
            floor,
        })
    }

    pub fn from_timing(timing: &RefreshTiming) -> core_runtime::Result<Self> {
        timing.validate()?;
        Ok(Self {
            guard_window: timing.guard_window,
            floor: timing.floor,
        })
    }

    pub fn guard_window(&self) -> Duration {
        self.guard_window
    }

    pub fn floor(&self) -> Duration {
        self.floor
    }

    /// Delay before the next refresh, or `None` when nothing should be
    /// scheduled (unknown expiry, or already expired).
    pub fn schedule_delay(&self, remaining: Option<chrono::Duration>) -> Option<Duration> {
        let remaining = remaining?.to_std().ok()?;
        if remaining.is_zero() {
            return None;
        }
        Some(remaining.saturating_sub(self.guard_window).max(self.floor))
    }

    /// Convenience for `schedule_delay(remaining(token, now))`.
    pub fn delay_for(&self, token: &str, now: i64) -> Option<Duration> {
        self.schedule_delay(remaining(token, now))
    }
}

impl Default for RefreshSchedule {
    fn default() -> Self {
        let timing = RefreshTiming::default();
        Self {
            guard_window: timing.guard_window,
            floor: timing.floor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_with_payload(payload: &str) -> String {
        format!(
            "eyJhbGciOiJIUzI1NiJ9.{}.signature",
            URL_SAFE_NO_PAD.encode(payload)
        )
    }

    #[test]
    fn test_expiry_of_valid_token() {
        let token = token_with_payload(r#"{"sub":"1","exp":1700000123}"#);
        assert_eq!(expiry_of(&token), Some(1_700_000_123));
    }

    #[test]
    fn test_expiry_of_fractional_exp() {
        let token = token_with_payload(r#"{"exp":1700000123.9}"#);
        assert_eq!(expiry_of(&token), Some(1_700_000_123));
    }

    #[test]
    fn test_expiry_of_padded_payload() {
        let padded = format!(
            "h.{}.s",
            base64::engine::general_purpose::URL_SAFE.encode(r#"{"exp":42}"#)
        );
        assert_eq!(expiry_of(&padded), Some(42));
    }

    #[test]
    fn test_expiry_of_malformed_inputs() {
        assert_eq!(expiry_of(""), None);
        assert_eq!(expiry_of("opaque-token"), None);
        assert_eq!(expiry_of("a.b"), None);
        assert_eq!(expiry_of("a..c"), None);
        assert_eq!(expiry_of("a.b.c.d"), None);
        assert_eq!(expiry_of("a.!!!.c"), None);
        assert_eq!(expiry_of(&token_with_payload("not json")), None);
        assert_eq!(expiry_of(&token_with_payload(r#"{"sub":"1"}"#)), None);
        assert_eq!(expiry_of(&token_with_payload(r#"{"exp":"soon"}"#)), None);
        assert_eq!(expiry_of(&token_with_payload(r#"[1,2]"#)), None);
    }

    #[test]
    fn test_remaining() {
        let token = token_with_payload(r#"{"exp":1000}"#);
        assert_eq!(remaining(&token, 400), Some(chrono::Duration::seconds(600)));
        assert_eq!(remaining(&token, 1600), Some(chrono::Duration::seconds(-600)));
        assert_eq!(remaining("opaque", 0), None);
    }

    #[test]
    fn test_schedule_delay_defaults() {
        let schedule = RefreshSchedule::default();

        assert_eq!(
            schedule.schedule_delay(Some(chrono::Duration::seconds(600))),
            Some(Duration::from_secs(570))
        );
        assert_eq!(
            schedule.schedule_delay(Some(chrono::Duration::seconds(20))),
            Some(Duration::from_secs(5))
        );
        assert_eq!(schedule.schedule_delay(Some(chrono::Duration::seconds(0))), None);
        assert_eq!(schedule.schedule_delay(Some(chrono::Duration::seconds(-10))), None);
        assert_eq!(schedule.schedule_delay(None), None);
    }

    #[test]
    fn test_schedule_delay_is_monotonic_and_floored() {
        let schedule = RefreshSchedule::default();
        let mut previous = Duration::ZERO;

        for secs in 1..=900 {
            let delay = schedule
                .schedule_delay(Some(chrono::Duration::seconds(secs)))
                .unwrap();
            assert!(delay >= schedule.floor(), "delay below floor at {}", secs);
            assert!(delay >= previous, "delay decreased at {}", secs);
            previous = delay;
        }
    }

    #[test]
    fn test_new_rejects_guard_not_above_floor() {
        assert!(RefreshSchedule::new(Duration::from_secs(5), Duration::from_secs(5)).is_err());
        assert!(RefreshSchedule::new(Duration::from_secs(10), Duration::ZERO).is_err());

        let schedule = RefreshSchedule::new(Duration::from_secs(60), Duration::from_secs(2)).unwrap();
        assert_eq!(schedule.guard_window(), Duration::from_secs(60));
        assert_eq!(
            schedule.delay_for(&token_with_payload(r#"{"exp":100}"#), 0),
            Some(Duration::from_secs(40))
        );
    }
}
