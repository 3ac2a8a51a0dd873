//! # Core Domain Entities
//!
//! ## Clusters
//!
//! - **Identity**: `Credential`, `IdentityId`, `Identity`, `Tier`
//! - **Geography**: `Region`, `GeoPoint`
//! - **Commerce**: `Transaction`, `RiskClassification`
//! - **Operator messaging**: `Severity`, `LocalizedMessage`

use crate::time::{Timestamp, MILLIS_PER_DAY};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// =============================================================================
// CLUSTER A: IDENTITY
// =============================================================================

/// Minimum number of digits in a phone-style credential.
pub const MIN_CREDENTIAL_DIGITS: usize = 10;

/// Maximum number of digits in a phone-style credential (E.164).
pub const MAX_CREDENTIAL_DIGITS: usize = 15;

/// Reasons a raw credential is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("credential is empty")]
    Empty,

    #[error("credential contains non-digit character '{0}'")]
    NonDigit(char),

    #[error("credential has {found} digits, expected 10-15")]
    BadLength { found: usize },
}

/// A normalised phone-style primary credential (digits only).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Credential(String);

impl Credential {
    /// Normalise and validate a raw credential.
    ///
    /// A single leading `+` is accepted, spaces and dashes are stripped, and
    /// what remains must be 10-15 ASCII digits.
    pub fn parse(raw: &str) -> Result<Self, CredentialError> {
        let trimmed = raw.trim();
        let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
        if body.is_empty() {
            return Err(CredentialError::Empty);
        }

        let mut digits = String::with_capacity(body.len());
        for c in body.chars() {
            match c {
                '0'..='9' => digits.push(c),
                ' ' | '-' => {}
                other => return Err(CredentialError::NonDigit(other)),
            }
        }

        if !(MIN_CREDENTIAL_DIGITS..=MAX_CREDENTIAL_DIGITS).contains(&digits.len()) {
            return Err(CredentialError::BadLength {
                found: digits.len(),
            });
        }
        Ok(Self(digits))
    }

    /// The normalised digit string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Credential with all but the last four digits masked, for logs.
    pub fn masked(&self) -> String {
        let keep = self.0.len().min(4);
        let hidden = self.0.len() - keep;
        format!("{}{}", "*".repeat(hidden), &self.0[hidden..])
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Unique identifier of an issued identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityId(pub Uuid);

impl IdentityId {
    pub fn new_v4() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Access tier of an identity. Ordered from least to most trusted.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    #[default]
    Basic,
    Verified,
    Premium,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Basic => "basic",
            Tier::Verified => "verified",
            Tier::Premium => "premium",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "basic" => Ok(Tier::Basic),
            "verified" => Ok(Tier::Verified),
            "premium" => Ok(Tier::Premium),
            other => Err(format!("unknown tier '{other}'")),
        }
    }
}

/// A scoped, time-bounded identity bound to a primary credential.
///
/// INVARIANT: `expires_at > issued_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub primary_credential: Credential,
    pub region: Region,
    pub tier: Tier,
    pub issued_at: Timestamp,
    pub expires_at: Timestamp,
    pub verified: bool,
}

impl Identity {
    /// An identity is expired once `now` reaches `expires_at`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.expires_at
    }

    /// Age in fractional days at `at`; zero if `at` precedes issuance.
    pub fn age_days(&self, at: Timestamp) -> f64 {
        at.saturating_sub(self.issued_at) as f64 / MILLIS_PER_DAY as f64
    }
}

// =============================================================================
// CLUSTER B: GEOGRAPHY
// =============================================================================

/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_KM: f64 = 6_371.0;

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub const fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Great-circle distance in kilometres (haversine).
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let (lat1, lat2) = (self.lat.to_radians(), other.lat.to_radians());
        let dlat = (other.lat - self.lat).to_radians();
        let dlon = (other.lon - self.lon).to_radians();
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// Regions with a known operating centre.
const REGION_CATALOG: &[(&str, GeoPoint)] = &[
    ("nairobi", GeoPoint::new(-1.2921, 36.8219)),
    ("mombasa", GeoPoint::new(-4.0435, 39.6682)),
    ("kisumu", GeoPoint::new(-0.0917, 34.7680)),
    ("nakuru", GeoPoint::new(-0.3031, 36.0800)),
    ("eldoret", GeoPoint::new(0.5143, 35.2698)),
    ("kampala", GeoPoint::new(0.3476, 32.5825)),
    ("dar-es-salaam", GeoPoint::new(-6.7924, 39.2083)),
    ("kigali", GeoPoint::new(-1.9441, 30.0619)),
    ("lagos", GeoPoint::new(6.5244, 3.3792)),
    ("london", GeoPoint::new(51.5072, -0.1276)),
];

/// A lowercase region key, e.g. `nairobi`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Region(String);

impl Region {
    /// Build a region key; surrounding whitespace is trimmed and the name lowercased.
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(name.as_ref().trim().to_ascii_lowercase())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Every region in the static catalog.
    pub fn catalog() -> impl Iterator<Item = Region> {
        REGION_CATALOG.iter().map(|(name, _)| Region::new(name))
    }

    /// Operating centre of the region, if it is in the static catalog.
    pub fn location(&self) -> Option<GeoPoint> {
        REGION_CATALOG
            .iter()
            .find(|(name, _)| *name == self.0)
            .map(|(_, point)| *point)
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Region {
    fn from(value: &str) -> Self {
        Region::new(value)
    }
}

// =============================================================================
// CLUSTER C: COMMERCE
// =============================================================================

/// A transaction submitted for authorization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub identity_id: IdentityId,
    /// Amount in minor currency units.
    pub amount: u64,
    pub region: Region,
    pub timestamp: Timestamp,
    /// Where the transaction originated, when known.
    pub location: Option<GeoPoint>,
}

impl Transaction {
    /// Build a transaction located at the region's operating centre.
    pub fn in_region(identity_id: IdentityId, amount: u64, region: Region, timestamp: Timestamp) -> Self {
        let location = region.location();
        Self {
            identity_id,
            amount,
            region,
            timestamp,
            location,
        }
    }
}

/// Risk band derived from a 0..=100 fraud score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskClassification {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskClassification {
    /// `low < 40`, `medium 40-69`, `high 70-89`, `critical >= 90`.
    pub fn from_score(score: u8) -> Self {
        match score {
            0..=39 => RiskClassification::Low,
            40..=69 => RiskClassification::Medium,
            70..=89 => RiskClassification::High,
            _ => RiskClassification::Critical,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskClassification::Low => "low",
            RiskClassification::Medium => "medium",
            RiskClassification::High => "high",
            RiskClassification::Critical => "critical",
        }
    }
}

impl fmt::Display for RiskClassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskClassification {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(RiskClassification::Low),
            "medium" => Ok(RiskClassification::Medium),
            "high" => Ok(RiskClassification::High),
            "critical" => Ok(RiskClassification::Critical),
            other => Err(format!("unknown classification '{other}'")),
        }
    }
}

// =============================================================================
// CLUSTER D: OPERATOR MESSAGING
// =============================================================================

/// Alert severity, ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Operator-facing text in the primary language plus a localized rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedMessage {
    pub primary: String,
    pub localized: String,
}

impl LocalizedMessage {
    pub fn new(primary: impl Into<String>, localized: impl Into<String>) -> Self {
        Self {
            primary: primary.into(),
            localized: localized.into(),
        }
    }
}
