//! Raw transaction inputs as collected by the form

use crate::error::InputError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Smallest amount the form accepts.
pub const MIN_AMOUNT: f64 = 0.01;
/// Issuer codes start at 1.
pub const MIN_ISSUER_CODE: u32 = 1;
/// Upper bound of the days-since-last-use slider.
pub const MAX_DAYS_SINCE_USE: u16 = 365;

/// A closed set of labelled options presented as a select box.
pub trait Choice: Copy + Eq + Sized + 'static {
    /// Every option, in display order.
    const ALL: &'static [Self];

    /// Form prompt for this field.
    const PROMPT: &'static str;

    /// Display label, also the key into the encoding tables.
    fn label(self) -> &'static str;

    /// Preselected option.
    fn default_choice() -> Self;

    /// Parse an operator answer: a label (case-insensitive) or a 1-based index.
    fn parse_choice(answer: &str) -> Option<Self> {
        let answer = answer.trim();
        if let Ok(index) = answer.parse::<usize>() {
            return index.checked_sub(1).and_then(|i| Self::ALL.get(i)).copied();
        }
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label().eq_ignore_ascii_case(answer))
    }

    /// Position in [`Choice::ALL`].
    fn ordinal(self) -> usize {
        Self::ALL.iter().position(|c| *c == self).unwrap_or(0)
    }
}

/// Card network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CardType {
    Visa,
    MasterCard,
    Discover,
    #[serde(rename = "American Express")]
    AmericanExpress,
    Other,
}

impl Choice for CardType {
    const ALL: &'static [Self] = &[
        CardType::Visa,
        CardType::MasterCard,
        CardType::Discover,
        CardType::AmericanExpress,
        CardType::Other,
    ];
    const PROMPT: &'static str = "Card Type";

    fn label(self) -> &'static str {
        match self {
            CardType::Visa => "Visa",
            CardType::MasterCard => "MasterCard",
            CardType::Discover => "Discover",
            CardType::AmericanExpress => "American Express",
            CardType::Other => "Other",
        }
    }

    fn default_choice() -> Self {
        CardType::Visa
    }
}

/// Device the transaction was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Desktop,
    Mobile,
}

impl Choice for DeviceType {
    const ALL: &'static [Self] = &[DeviceType::Desktop, DeviceType::Mobile];
    const PROMPT: &'static str = "Device Type";

    fn label(self) -> &'static str {
        match self {
            DeviceType::Desktop => "desktop",
            DeviceType::Mobile => "mobile",
        }
    }

    fn default_choice() -> Self {
        DeviceType::Desktop
    }
}

/// Browser used for the transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Browser {
    Chrome,
    Safari,
    Firefox,
    Edge,
    Other,
}

impl Choice for Browser {
    const ALL: &'static [Self] = &[
        Browser::Chrome,
        Browser::Safari,
        Browser::Firefox,
        Browser::Edge,
        Browser::Other,
    ];
    const PROMPT: &'static str = "Browser Used";

    fn label(self) -> &'static str {
        match self {
            Browser::Chrome => "chrome",
            Browser::Safari => "safari",
            Browser::Firefox => "firefox",
            Browser::Edge => "edge",
            Browser::Other => "other",
        }
    }

    fn default_choice() -> Self {
        Browser::Chrome
    }
}

/// Whether billing and recipient email addresses match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EmailMatch {
    Yes,
    No,
}

impl EmailMatch {
    /// 0/1 flag fed to the model.
    pub fn flag(self) -> f64 {
        match self {
            EmailMatch::Yes => 1.0,
            EmailMatch::No => 0.0,
        }
    }
}

impl Choice for EmailMatch {
    const ALL: &'static [Self] = &[EmailMatch::Yes, EmailMatch::No];
    const PROMPT: &'static str = "Billing & Recipient Email Match";

    fn label(self) -> &'static str {
        match self {
            EmailMatch::Yes => "Yes",
            EmailMatch::No => "No",
        }
    }

    fn default_choice() -> Self {
        EmailMatch::No
    }
}

macro_rules! display_by_label {
    ($($ty:ty),*) => {
        $(impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        })*
    };
}

display_by_label!(CardType, DeviceType, Browser, EmailMatch);

/// One form submission. Immutable once built; scored once and discarded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawInput {
    /// Transaction amount in dollars
    pub amount: f64,
    pub card_type: CardType,
    /// Card issuer code (first digits of the card, when known)
    pub issuer_code: u32,
    pub device_type: DeviceType,
    pub browser: Browser,
    /// Days since the card was last used (0..=365)
    pub days_since_use: u16,
    pub email_match: EmailMatch,
}

impl RawInput {
    /// Check every numeric field against the form's constraints.
    pub fn validate(&self) -> Result<(), InputError> {
        validate_amount(self.amount)?;
        validate_issuer_code(self.issuer_code)?;
        validate_days_since_use(self.days_since_use)?;
        Ok(())
    }
}

impl Default for RawInput {
    fn default() -> Self {
        Self {
            amount: 50.0,
            card_type: CardType::default_choice(),
            issuer_code: 1500,
            device_type: DeviceType::default_choice(),
            browser: Browser::default_choice(),
            days_since_use: 1,
            email_match: EmailMatch::default_choice(),
        }
    }
}

pub fn validate_amount(amount: f64) -> Result<(), InputError> {
    if !amount.is_finite() || amount < MIN_AMOUNT {
        return Err(InputError::new(
            "amount",
            format!("must be at least {MIN_AMOUNT:.2}"),
        ));
    }
    Ok(())
}

pub fn validate_issuer_code(code: u32) -> Result<(), InputError> {
    if code < MIN_ISSUER_CODE {
        return Err(InputError::new(
            "issuer code",
            format!("must be at least {MIN_ISSUER_CODE}"),
        ));
    }
    Ok(())
}

pub fn validate_days_since_use(days: u16) -> Result<(), InputError> {
    if days > MAX_DAYS_SINCE_USE {
        return Err(InputError::new(
            "days since use",
            format!("must be between 0 and {MAX_DAYS_SINCE_USE}"),
        ));
    }
    Ok(())
}
