//! Ledger entities: reconciled payouts and the donations that compose them.
//!
//! Both entities are immutable once recorded and carry the invariant
//! `net == gross - fee`.

use crate::money::Cents;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Column header of the payouts table.
pub const PAYOUT_HEADER: [&str; 5] = ["id", "created", "gross", "fee", "net"];

/// Column header of the donations table.
pub const DONATION_HEADER: [&str; 8] = [
    "id",
    "created",
    "client_name",
    "client_email",
    "payout_id",
    "gross",
    "fee",
    "net",
];

/// One settlement batch from the processor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payout {
    /// Processor identifier, unique across the ledger.
    pub id: String,

    /// Settlement day (UTC).
    #[serde(with = "ymd")]
    pub created: NaiveDate,

    pub gross: Cents,
    pub fee: Cents,
    pub net: Cents,
}

impl Payout {
    pub fn new(id: impl Into<String>, created: NaiveDate, gross: Cents, fee: Cents) -> Self {
        Payout {
            id: id.into(),
            created,
            gross,
            fee,
            net: gross - fee,
        }
    }

    /// Verifies the invariant: `net == gross - fee`.
    pub fn check_invariant(&self) -> bool {
        self.gross.checked_sub(self.fee) == Some(self.net)
    }
}

/// One charge attributed to a payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Donation {
    /// Processor identifier, unique across the ledger.
    pub id: String,

    /// Day the charge was made (UTC).
    #[serde(with = "ymd")]
    pub created: NaiveDate,

    pub client_name: String,
    pub client_email: String,

    /// Owning payout.
    pub payout_id: String,

    pub gross: Cents,
    pub fee: Cents,
    pub net: Cents,
}

impl Donation {
    /// Verifies `net == gross - fee` with all three amounts strictly positive.
    pub fn check_invariant(&self) -> bool {
        self.gross.is_positive()
            && self.fee.is_positive()
            && self.net.is_positive()
            && self.gross.checked_sub(self.fee) == Some(self.net)
    }
}

/// Strict `YYYY-MM-DD` (de)serialization for ledger dates.
pub mod ymd {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    pub const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        parse(&s).map_err(serde::de::Error::custom)
    }

    /// Parses a strict `YYYY-MM-DD` date.
    pub fn parse(s: &str) -> Result<NaiveDate, String> {
        let trimmed = s.trim();
        // chrono accepts unpadded fields; the ledger format does not.
        if trimmed.len() != 10 {
            return Err(format!("invalid date {:?}, expected YYYY-MM-DD", s));
        }
        NaiveDate::parse_from_str(trimmed, FORMAT)
            .map_err(|e| format!("invalid date {:?}: {}", s, e))
    }
}
