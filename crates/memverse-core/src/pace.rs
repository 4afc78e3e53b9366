use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Delivery cadence selected by the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Pace {
    Daily,
    Weekly,
}

impl Pace {
    /// Minimum time that must pass between two deliveries.
    pub fn threshold(self) -> Duration {
        match self {
            Pace::Daily => Duration::hours(24),
            Pace::Weekly => Duration::hours(168),
        }
    }

    /// A subscriber is due when nothing was ever delivered, or when at least
    /// [`Pace::threshold`] has elapsed since the last delivery.
    ///
    /// A marker in the future (clock skew) is treated as not due.
    pub fn is_due(self, last_delivered_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match last_delivered_at {
            None => true,
            Some(last) => now.signed_duration_since(last) >= self.threshold(),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Pace::Daily => "daily",
            Pace::Weekly => "weekly",
        }
    }
}

impl std::fmt::Display for Pace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Pace {
    type Err = String;

    /// Case-insensitive; anything other than `daily` / `weekly` is rejected.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Pace::Daily),
            "weekly" => Ok(Pace::Weekly),
            _ => Err(s.to_string()),
        }
    }
}

/// Due-ness check for a raw, stored pace value.
///
/// Returns `Err(raw)` for unrecognised paces so callers surface an
/// `invalid pace` error instead of falling back to a default cadence.
pub fn is_due(
    pace: &str,
    last_delivered_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> std::result::Result<bool, String> {
    let pace: Pace = pace.parse()?;
    Ok(pace.is_due(last_delivered_at, now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap()
    }

    #[test]
    fn never_delivered_is_always_due() {
        assert!(Pace::Daily.is_due(None, t0()));
        assert!(Pace::Weekly.is_due(None, t0()));
    }

    #[test]
    fn daily_boundary_is_inclusive() {
        let last = Some(t0());
        assert!(!Pace::Daily.is_due(last, t0() + Duration::hours(23)));
        assert!(!Pace::Daily.is_due(last, t0() + Duration::hours(24) - Duration::seconds(1)));
        assert!(Pace::Daily.is_due(last, t0() + Duration::hours(24)));
        assert!(Pace::Daily.is_due(last, t0() + Duration::days(3)));
    }

    #[test]
    fn weekly_boundary_is_inclusive() {
        let last = Some(t0());
        assert!(!Pace::Weekly.is_due(last, t0() + Duration::hours(167)));
        assert!(Pace::Weekly.is_due(last, t0() + Duration::hours(168)));
        assert!(Pace::Weekly.is_due(last, t0() + Duration::hours(169)));
    }

    #[test]
    fn due_iff_elapsed_reaches_threshold() {
        for pace in [Pace::Daily, Pace::Weekly] {
            for hours in [0i64, 1, 23, 24, 25, 100, 167, 168, 169, 1000] {
                let now = t0() + Duration::hours(hours);
                let expected = Duration::hours(hours) >= pace.threshold();
                assert_eq!(pace.is_due(Some(t0()), now), expected, "{pace} after {hours}h");
            }
        }
    }

    #[test]
    fn marker_in_the_future_is_not_due() {
        assert!(!Pace::Daily.is_due(Some(t0() + Duration::hours(2)), t0()));
    }

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("Daily".parse::<Pace>(), Ok(Pace::Daily));
        assert_eq!(" WEEKLY ".parse::<Pace>(), Ok(Pace::Weekly));
    }

    #[test]
    fn unknown_pace_is_rejected_not_defaulted() {
        assert_eq!(is_due("monthly", None, t0()), Err("monthly".to_string()));
        assert_eq!(is_due("", Some(t0()), t0()), Err(String::new()));
        assert_eq!(is_due("weekly", None, t0()), Ok(true));
    }
}
