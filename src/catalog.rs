//! Fixed reference data: bank services, the canonical slot list and branches.

use crate::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::Time;
use time::macros::time;

const SLOT_TABLE: [(&str, Time); 12] = [
    ("10:00 AM", time!(10:00)),
    ("10:30 AM", time!(10:30)),
    ("11:00 AM", time!(11:00)),
    ("11:30 AM", time!(11:30)),
    ("12:00 PM", time!(12:00)),
    ("12:30 PM", time!(12:30)),
    ("02:00 PM", time!(14:00)),
    ("02:30 PM", time!(14:30)),
    ("03:00 PM", time!(15:00)),
    ("03:30 PM", time!(15:30)),
    ("04:00 PM", time!(16:00)),
    ("04:30 PM", time!(16:30)),
];

pub const SLOT_COUNT: usize = SLOT_TABLE.len();

/// One entry of the canonical slot list. Ordering is chronological.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimeSlot(u8);

impl TimeSlot {
    pub fn all() -> impl Iterator<Item = TimeSlot> {
        (0..SLOT_COUNT as u8).map(TimeSlot)
    }

    pub fn label(self) -> &'static str {
        SLOT_TABLE[self.0 as usize].0
    }

    pub fn start_time(self) -> Time {
        SLOT_TABLE[self.0 as usize].1
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Accepts the display label ("02:30 PM") or a 24-hour "HH:MM" form.
    pub fn parse(raw: &str) -> Result<Self, AppError> {
        let trimmed = raw.trim();
        if let Some(index) = SLOT_TABLE
            .iter()
            .position(|(label, _)| label.eq_ignore_ascii_case(trimmed))
        {
            return Ok(TimeSlot(index as u8));
        }

        let unknown = || AppError::UnknownSlot(raw.to_string());
        let (hour, minute) = trimmed.split_once(':').ok_or_else(unknown)?;
        let hour: u8 = hour.parse().map_err(|_| unknown())?;
        let minute: u8 = minute.parse().map_err(|_| unknown())?;
        SLOT_TABLE
            .iter()
            .position(|(_, start)| start.hour() == hour && start.minute() == minute)
            .map(|index| TimeSlot(index as u8))
            .ok_or_else(unknown)
    }
}

impl fmt::Display for TimeSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TimeSlot {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TimeSlot::parse(s)
    }
}

impl TryFrom<String> for TimeSlot {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        TimeSlot::parse(&value)
    }
}

impl From<TimeSlot> for String {
    fn from(slot: TimeSlot) -> Self {
        slot.label().to_string()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceId {
    OpenAccount,
    KycUpdate,
    AccountMod,
    Loans,
    Security,
    Business,
    Locker,
    Grievance,
    Senior,
}

impl ServiceId {
    pub fn as_str(self) -> &'static str {
        match self {
            ServiceId::OpenAccount => "open_account",
            ServiceId::KycUpdate => "kyc_update",
            ServiceId::AccountMod => "account_mod",
            ServiceId::Loans => "loans",
            ServiceId::Security => "security",
            ServiceId::Business => "business",
            ServiceId::Locker => "locker",
            ServiceId::Grievance => "grievance",
            ServiceId::Senior => "senior",
        }
    }

    pub fn service(self) -> &'static Service {
        // SERVICES is declared in enum order.
        &SERVICES[self as usize]
    }

    pub fn average_minutes(self) -> u32 {
        self.service().average_minutes
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ServiceId {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SERVICES
            .iter()
            .find(|service| service.id.as_str() == s.trim())
            .map(|service| service.id)
            .ok_or_else(|| AppError::UnknownService(s.to_string()))
    }
}

#[derive(Debug, Serialize)]
pub struct Service {
    pub id: ServiceId,
    pub label: &'static str,
    pub average_minutes: u32,
    pub required_documents: &'static [&'static str],
}

pub static SERVICES: [Service; 9] = [
    Service {
        id: ServiceId::OpenAccount,
        label: "Open New Account",
        average_minutes: 45,
        required_documents: &[
            "Identity Proof (Aadhar/Passport)",
            "Address Proof",
            "2 Passport Photos",
            "Initial Deposit",
        ],
    },
    Service {
        id: ServiceId::KycUpdate,
        label: "KYC & Profile Corrections",
        average_minutes: 20,
        required_documents: &[
            "Identity Proof (Aadhar/Passport)",
            "PAN Card",
            "Latest Electricity Bill",
        ],
    },
    Service {
        id: ServiceId::AccountMod,
        label: "Account Modifications",
        average_minutes: 30,
        required_documents: &["Identity Proof", "Request Letter", "Existing Passbook"],
    },
    Service {
        id: ServiceId::Loans,
        label: "Complex Loan Applications",
        average_minutes: 60,
        required_documents: &[
            "Identity Proof",
            "Income Proof (3 months)",
            "Collateral Documents",
            "PAN Card",
        ],
    },
    Service {
        id: ServiceId::Security,
        label: "Large Transactions & Security",
        average_minutes: 40,
        required_documents: &[
            "Identity Proof",
            "Special Authorization Form",
            "Transaction Slip",
        ],
    },
    Service {
        id: ServiceId::Business,
        label: "Business / MSME Banking",
        average_minutes: 50,
        required_documents: &[
            "Trade License",
            "GST Certificate",
            "Business Address Proof",
            "Identity Proof of Proprietor",
        ],
    },
    Service {
        id: ServiceId::Locker,
        label: "Locker Services",
        average_minutes: 30,
        required_documents: &["Identity Proof", "2 Photos", "Locker Agreement"],
    },
    Service {
        id: ServiceId::Grievance,
        label: "Grievance & Issue Resolution",
        average_minutes: 25,
        required_documents: &["Grievance Form", "Support Evidence", "Identity Proof"],
    },
    Service {
        id: ServiceId::Senior,
        label: "Senior Citizen / Assisted Banking",
        average_minutes: 30,
        required_documents: &["Identity Proof (showing age)", "Address Proof"],
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Branch {
    pub id: String,
    pub name: String,
}

pub fn default_branches() -> Vec<Branch> {
    [
        ("br-central", "Central Plaza Branch"),
        ("br-riverside", "Riverside Branch"),
        ("br-northgate", "Northgate Branch"),
    ]
    .into_iter()
    .map(|(id, name)| Branch {
        id: id.to_string(),
        name: name.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_are_chronological() {
        let starts: Vec<Time> = TimeSlot::all().map(TimeSlot::start_time).collect();
        assert!(starts.windows(2).all(|pair| pair[0] < pair[1]));
        assert_eq!(starts.len(), SLOT_COUNT);
    }

    #[test]
    fn slot_parses_label_and_24_hour_form() -> Result<(), AppError> {
        assert_eq!(TimeSlot::parse("02:30 pm")?.label(), "02:30 PM");
        assert_eq!(TimeSlot::parse("14:30")?.label(), "02:30 PM");
        assert_eq!(TimeSlot::parse(" 10:00 ")?.index(), 0);
        Ok(())
    }

    #[test]
    fn slot_outside_canonical_list_is_rejected() {
        assert!(matches!(
            TimeSlot::parse("01:00 PM"),
            Err(AppError::UnknownSlot(_))
        ));
        assert!(matches!(TimeSlot::parse("noon"), Err(AppError::UnknownSlot(_))));
    }

    #[test]
    fn service_table_matches_enum_order() {
        for service in SERVICES.iter() {
            assert_eq!(service.id.service().id, service.id);
        }
        assert_eq!(ServiceId::OpenAccount.average_minutes(), 45);
        assert_eq!(ServiceId::KycUpdate.average_minutes(), 20);
    }

    #[test]
    fn unknown_service_is_not_found() {
        let result = "mortgage".parse::<ServiceId>();
        assert!(matches!(result, Err(AppError::UnknownService(_))));
    }

    #[test]
    fn slot_serializes_as_label() -> Result<(), Box<dyn std::error::Error>> {
        let slot = TimeSlot::parse("11:00")?;
        let value = serde_json::to_value(slot)?;
        assert_eq!(value, serde_json::json!("11:00 AM"));
        let back: TimeSlot = serde_json::from_value(value)?;
        assert_eq!(back, slot);
        Ok(())
    }
}
