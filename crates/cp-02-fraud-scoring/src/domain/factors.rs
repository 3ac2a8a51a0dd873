//! Risk factor functions.
//!
//! Each factor maps its inputs onto `0.0..=100.0`, higher meaning riskier.
//! History slices are treated as unordered; only records strictly before the
//! scored transaction's timestamp are considered, so re-scoring a transaction
//! that is already in history sees the same inputs as the first time.

use shared_types::{GeoPoint, Identity, Timestamp, Transaction, MILLIS_PER_HOUR};

/// Score used when a factor lacks the data to judge.
pub const CONSERVATIVE_DEFAULT: f64 = 50.0;

/// Amount deviation points per unit of ratio above the historical mean.
const AMOUNT_RATIO_SCALE: f64 = 25.0;

/// Burst points per transaction above the hourly baseline.
const BURST_SCALE: f64 = 20.0;

const AMOUNT_BLEND: f64 = 0.6;
const BURST_BLEND: f64 = 0.4;

fn clamp_risk(value: f64) -> f64 {
    if value.is_nan() {
        return CONSERVATIVE_DEFAULT;
    }
    value.clamp(0.0, 100.0)
}

/// `100 / (1 + age_days)`. A transaction dated before issuance counts as age
/// zero and scores the maximum.
pub fn credential_age_factor(identity: &Identity, at: Timestamp) -> f64 {
    clamp_risk(100.0 / (1.0 + identity.age_days(at)))
}

/// Implied travel speed between the most recent located history record and
/// `location`, as a fraction of `max_speed_kmh`.
///
/// - no located history: 0
/// - located history but no current location: [`CONSERVATIVE_DEFAULT`]
/// - speed above `max_speed_kmh`: 100
pub fn location_velocity_factor(
    location: Option<GeoPoint>,
    at: Timestamp,
    history: &[Transaction],
    max_speed_kmh: f64,
) -> f64 {
    let last = history
        .iter()
        .filter(|tx| tx.timestamp < at)
        .filter_map(|tx| tx.location.map(|loc| (tx.timestamp, loc)))
        .max_by_key(|(timestamp, _)| *timestamp);

    let Some((last_seen, last_location)) = last else {
        return 0.0;
    };
    let Some(current) = location else {
        return CONSERVATIVE_DEFAULT;
    };

    let distance_km = last_location.distance_km(&current);
    // last_seen < at, so elapsed time is positive.
    let elapsed_hours = (at - last_seen) as f64 / MILLIS_PER_HOUR as f64;
    let speed_kmh = distance_km / elapsed_hours;
    if speed_kmh > max_speed_kmh {
        100.0
    } else {
        clamp_risk(speed_kmh / max_speed_kmh * 100.0)
    }
}

/// Deviation of `amount` from the historical mean blended 60/40 with burst
/// frequency in the trailing hour.
///
/// The hourly baseline comes from history older than the trailing hour, so
/// a fresh identity firing several transactions at once still registers a
/// burst. Empty history yields [`CONSERVATIVE_DEFAULT`].
pub fn pattern_deviation_factor(amount: u64, at: Timestamp, history: &[Transaction]) -> f64 {
    let prior: Vec<&Transaction> = history.iter().filter(|tx| tx.timestamp < at).collect();
    if prior.is_empty() {
        return CONSERVATIVE_DEFAULT;
    }

    let total: f64 = prior.iter().map(|tx| tx.amount as f64).sum();
    let mean = total / prior.len() as f64;
    let amount_score = if mean <= 0.0 {
        if amount > 0 {
            100.0
        } else {
            0.0
        }
    } else {
        clamp_risk((amount as f64 / mean - 1.0) * AMOUNT_RATIO_SCALE)
    };

    let window_start = at.saturating_sub(MILLIS_PER_HOUR);
    let recent = prior.iter().filter(|tx| tx.timestamp > window_start).count();
    let older = prior.len() - recent;
    let baseline = if older == 0 {
        0.0
    } else {
        let oldest = prior.iter().map(|tx| tx.timestamp).min().unwrap_or(window_start);
        let span_hours = (window_start.saturating_sub(oldest) as f64 / MILLIS_PER_HOUR as f64).max(1.0);
        older as f64 / span_hours
    };
    let burst_score = clamp_risk((recent as f64 - baseline) * BURST_SCALE);

    AMOUNT_BLEND * amount_score + BURST_BLEND * burst_score
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{Credential, IdentityId, Region, Tier, MILLIS_PER_DAY};

    const T0: Timestamp = 1_700_000_000_000;

    fn identity(issued_at: Timestamp) -> Identity {
        Identity {
            id: IdentityId::new_v4(),
            primary_credential: Credential::parse("254712345678").unwrap(),
            region: Region::new("nairobi"),
            tier: Tier::Basic,
            issued_at,
            expires_at: issued_at + MILLIS_PER_DAY,
            verified: false,
        }
    }

    fn tx(amount: u64, region: &str, timestamp: Timestamp) -> Transaction {
        Transaction::in_region(IdentityId::new_v4(), amount, Region::new(region), timestamp)
    }

    #[test]
    fn test_age_factor_decays() {
        let id = identity(T0);
        assert_eq!(credential_age_factor(&id, T0), 100.0);
        assert_eq!(credential_age_factor(&id, T0 + MILLIS_PER_DAY), 50.0);
        assert_eq!(credential_age_factor(&id, T0 + 3 * MILLIS_PER_DAY), 25.0);
        // Before issuance clamps to maximum risk.
        assert_eq!(credential_age_factor(&id, T0 - 1_000), 100.0);
    }

    #[test]
    fn test_velocity_without_prior_location_is_zero() {
        let here = Region::new("nairobi").location();
        assert_eq!(location_velocity_factor(here, T0, &[], 900.0), 0.0);
    }

    #[test]
    fn test_velocity_missing_current_location_is_conservative() {
        let history = vec![tx(100, "nairobi", T0)];
        assert_eq!(
            location_velocity_factor(None, T0 + MILLIS_PER_HOUR, &history, 900.0),
            CONSERVATIVE_DEFAULT
        );
    }

    #[test]
    fn test_velocity_impossible_travel() {
        // Nairobi to London in one hour.
        let history = vec![tx(100, "nairobi", T0)];
        let london = Region::new("london").location();
        assert_eq!(
            location_velocity_factor(london, T0 + MILLIS_PER_HOUR, &history, 900.0),
            100.0
        );
    }

    #[test]
    fn test_velocity_plausible_travel_is_linear() {
        // Nairobi to Mombasa (~440 km) over 10 hours is ~44 km/h.
        let history = vec![tx(100, "nairobi", T0)];
        let mombasa = Region::new("mombasa").location();
        let factor =
            location_velocity_factor(mombasa, T0 + 10 * MILLIS_PER_HOUR, &history, 900.0);
        assert!(factor > 4.0 && factor < 6.0, "factor was {factor}");
    }

    #[test]
    fn test_velocity_one_millisecond_apart() {
        let history = vec![tx(100, "nairobi", T0)];
        let nairobi = Region::new("nairobi").location();
        let mombasa = Region::new("mombasa").location();
        assert_eq!(location_velocity_factor(nairobi, T0 + 1, &history, 900.0), 0.0);
        assert_eq!(location_velocity_factor(mombasa, T0 + 1, &history, 900.0), 100.0);
    }

    #[test]
    fn test_same_timestamp_history_is_ignored() {
        let history = vec![tx(100, "london", T0), tx(900_000, "london", T0)];
        let nairobi = Region::new("nairobi").location();
        assert_eq!(location_velocity_factor(nairobi, T0, &history, 900.0), 0.0);
        assert_eq!(pattern_deviation_factor(5_000, T0, &history), CONSERVATIVE_DEFAULT);
    }

    #[test]
    fn test_velocity_ignores_future_history() {
        let history = vec![tx(100, "london", T0 + MILLIS_PER_DAY)];
        let nairobi = Region::new("nairobi").location();
        assert_eq!(location_velocity_factor(nairobi, T0, &history, 900.0), 0.0);
    }

    #[test]
    fn test_pattern_empty_history_is_conservative() {
        assert_eq!(pattern_deviation_factor(5_000, T0, &[]), CONSERVATIVE_DEFAULT);
    }

    #[test]
    fn test_pattern_typical_amount_scores_low() {
        let history: Vec<_> = (1..=5)
            .map(|h| tx(1_000, "nairobi", T0 - h * 2 * MILLIS_PER_HOUR))
            .collect();
        assert_eq!(pattern_deviation_factor(1_000, T0, &history), 0.0);
    }

    #[test]
    fn test_pattern_large_amount_deviation() {
        let history: Vec<_> = (1..=5)
            .map(|h| tx(1_000, "nairobi", T0 - h * 2 * MILLIS_PER_HOUR))
            .collect();
        // Ratio 5 => (5 - 1) * 25 = 100 amount points, no burst.
        assert_eq!(pattern_deviation_factor(5_000, T0, &history), 60.0);
    }

    #[test]
    fn test_pattern_burst_on_fresh_identity() {
        let history: Vec<_> = (1..=5)
            .map(|m| tx(1_000, "nairobi", T0 - m * 60_000))
            .collect();
        // Five transactions in the trailing hour, no older baseline.
        assert_eq!(pattern_deviation_factor(1_000, T0, &history), 40.0);
    }
}
