//! Feature mapping from form inputs to the model's input vector.
//!
//! The model was trained on 20 anonymised columns (`feature_0` .. `feature_19`).
//! Seven of them correspond to what the form collects; the rest are not
//! collected here and stay at 0.0. That zero fill is a known approximation of
//! the training distribution, not something to paper over.
//!
//! The layout is positional: a slot assigned to the wrong column silently
//! corrupts predictions, so [`FeatureMapper::new`] validates the layout and the
//! encoding tables once at startup.

use crate::error::ConfigurationError;
use crate::types::transaction::{Browser, CardType, Choice, DeviceType, RawInput};

/// Number of input columns the model was trained on.
pub const FEATURE_WIDTH: usize = 20;

/// Static label → integer code table for one categorical input.
#[derive(Debug, Clone, Copy)]
pub struct EncodingTable {
    pub name: &'static str,
    pub entries: &'static [(&'static str, u8)],
}

impl EncodingTable {
    pub fn code(&self, label: &str) -> Option<u8> {
        self.entries
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, code)| *code)
    }

    /// Resolve every option of `C` to its code, indexed by [`Choice::ordinal`].
    fn resolve<C: Choice>(&self) -> Result<Vec<f64>, ConfigurationError> {
        C::ALL
            .iter()
            .map(|choice| {
                self.code(choice.label())
                    .map(f64::from)
                    .ok_or_else(|| ConfigurationError::MissingCode {
                        table: self.name,
                        label: choice.label(),
                    })
            })
            .collect()
    }
}

pub const CARD_TYPE_CODES: EncodingTable = EncodingTable {
    name: "card type",
    entries: &[
        ("Visa", 1),
        ("MasterCard", 2),
        ("Discover", 3),
        ("American Express", 4),
        ("Other", 0),
    ],
};

pub const DEVICE_TYPE_CODES: EncodingTable = EncodingTable {
    name: "device type",
    entries: &[("desktop", 0), ("mobile", 1)],
};

pub const BROWSER_CODES: EncodingTable = EncodingTable {
    name: "browser",
    entries: &[
        ("chrome", 1),
        ("safari", 2),
        ("firefox", 3),
        ("edge", 4),
        ("other", 0),
    ],
};

/// A form input that occupies one slot of the feature vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputField {
    Amount,
    IssuerCode,
    CardType,
    DeviceType,
    Browser,
    DaysSinceUse,
    EmailMatch,
}

impl InputField {
    pub const ALL: [InputField; 7] = [
        InputField::Amount,
        InputField::IssuerCode,
        InputField::CardType,
        InputField::DeviceType,
        InputField::Browser,
        InputField::DaysSinceUse,
        InputField::EmailMatch,
    ];

    pub fn name(self) -> &'static str {
        match self {
            InputField::Amount => "amount",
            InputField::IssuerCode => "issuer_code",
            InputField::CardType => "card_type",
            InputField::DeviceType => "device_type",
            InputField::Browser => "browser",
            InputField::DaysSinceUse => "days_since_use",
            InputField::EmailMatch => "email_match",
        }
    }
}

/// Training-time column of each collected input.
pub const SLOT_LAYOUT: [(InputField, usize); 7] = [
    (InputField::Amount, 0),
    (InputField::IssuerCode, 1),
    (InputField::CardType, 2),
    (InputField::DeviceType, 3),
    (InputField::Browser, 4),
    (InputField::DaysSinceUse, 5),
    (InputField::EmailMatch, 6),
];

/// Fixed-width model input, in training column order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector([f64; FEATURE_WIDTH]);

impl FeatureVector {
    pub fn zeroed() -> Self {
        Self([0.0; FEATURE_WIDTH])
    }

    pub fn len(&self) -> usize {
        FEATURE_WIDTH
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, slot: usize) -> Option<f64> {
        self.0.get(slot).copied()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    /// Single-precision copy, the precision boosted-tree models compare in.
    pub fn to_f32(&self) -> Vec<f32> {
        self.0.iter().map(|&v| v as f32).collect()
    }

    fn set(&mut self, slot: usize, value: f64) {
        self.0[slot] = value;
    }
}

/// Column names the model was trained with: `feature_0` .. `feature_19`.
pub fn feature_names() -> Vec<String> {
    (0..FEATURE_WIDTH).map(|i| format!("feature_{i}")).collect()
}

/// Maps form inputs into [`FeatureVector`]s.
///
/// Construct once at startup; mapping itself cannot fail.
#[derive(Debug, Clone)]
pub struct FeatureMapper {
    layout: Vec<(InputField, usize)>,
    card_codes: Vec<f64>,
    device_codes: Vec<f64>,
    browser_codes: Vec<f64>,
}

impl FeatureMapper {
    /// Mapper over the training layout and encoding tables.
    pub fn new() -> Result<Self, ConfigurationError> {
        Self::with_layout(&SLOT_LAYOUT)
    }

    /// Mapper over a custom slot layout.
    ///
    /// Every [`InputField`] must be assigned exactly once, to a distinct slot
    /// inside the vector.
    pub fn with_layout(layout: &[(InputField, usize)]) -> Result<Self, ConfigurationError> {
        for (i, &(field, slot)) in layout.iter().enumerate() {
            if slot >= FEATURE_WIDTH {
                return Err(ConfigurationError::SlotOutOfRange {
                    field: field.name(),
                    slot,
                    width: FEATURE_WIDTH,
                });
            }
            if let Some(&(first, _)) = layout[..i].iter().find(|(_, s)| *s == slot) {
                return Err(ConfigurationError::DuplicateSlot {
                    slot,
                    first: first.name(),
                    second: field.name(),
                });
            }
        }

        for field in InputField::ALL {
            if layout.iter().filter(|(f, _)| *f == field).count() != 1 {
                return Err(ConfigurationError::UnassignedField(field.name()));
            }
        }

        Ok(Self {
            layout: layout.to_vec(),
            card_codes: CARD_TYPE_CODES.resolve::<CardType>()?,
            device_codes: DEVICE_TYPE_CODES.resolve::<DeviceType>()?,
            browser_codes: BROWSER_CODES.resolve::<Browser>()?,
        })
    }

    /// Build the model input for one submission.
    pub fn map(&self, raw: &RawInput) -> FeatureVector {
        let mut vector = FeatureVector::zeroed();
        for &(field, slot) in &self.layout {
            vector.set(slot, self.value_of(field, raw));
        }
        vector
    }

    fn value_of(&self, field: InputField, raw: &RawInput) -> f64 {
        match field {
            InputField::Amount => raw.amount,
            InputField::IssuerCode => f64::from(raw.issuer_code),
            InputField::CardType => self.card_codes[raw.card_type.ordinal()],
            InputField::DeviceType => self.device_codes[raw.device_type.ordinal()],
            InputField::Browser => self.browser_codes[raw.browser.ordinal()],
            InputField::DaysSinceUse => f64::from(raw.days_since_use),
            InputField::EmailMatch => raw.email_match.flag(),
        }
    }

    /// Number of slots produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_WIDTH
    }

    /// Column names, matching training order.
    pub fn feature_names(&self) -> Vec<String> {
        feature_names()
    }

    /// Slots filled from form inputs; all others are zero.
    pub fn mapped_slots(&self) -> &[(InputField, usize)] {
        &self.layout
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::EmailMatch;

    fn zeros(n: usize) -> Vec<f64> {
        vec![0.0; n]
    }

    #[test]
    fn test_default_submission_vector() {
        let mapper = FeatureMapper::new().unwrap();
        let raw = RawInput {
            amount: 50.0,
            card_type: CardType::Visa,
            issuer_code: 1500,
            device_type: DeviceType::Desktop,
            browser: Browser::Chrome,
            days_since_use: 1,
            email_match: EmailMatch::No,
        };

        let mut expected = vec![50.0, 1500.0, 1.0, 0.0, 1.0, 1.0, 0.0];
        expected.extend(zeros(13));

        assert_eq!(mapper.map(&raw).as_slice(), expected.as_slice());
    }

    #[test]
    fn test_extreme_submission_vector() {
        let mapper = FeatureMapper::new().unwrap();
        let raw = RawInput {
            amount: 9999.99,
            card_type: CardType::Other,
            issuer_code: 1,
            device_type: DeviceType::Mobile,
            browser: Browser::Other,
            days_since_use: 365,
            email_match: EmailMatch::Yes,
        };

        let mut expected = vec![9999.99, 1.0, 0.0, 1.0, 0.0, 365.0, 1.0];
        expected.extend(zeros(13));

        assert_eq!(mapper.map(&raw).as_slice(), expected.as_slice());
    }

    #[test]
    fn test_every_combination_has_full_width() {
        let mapper = FeatureMapper::new().unwrap();
        for &card_type in CardType::ALL {
            for &device_type in DeviceType::ALL {
                for &browser in Browser::ALL {
                    for &email_match in EmailMatch::ALL {
                        for days_since_use in [0, 1, 365] {
                            let raw = RawInput {
                                card_type,
                                device_type,
                                browser,
                                email_match,
                                days_since_use,
                                issuer_code: 1,
                                ..RawInput::default()
                            };
                            let vector = mapper.map(&raw);
                            assert_eq!(vector.len(), FEATURE_WIDTH);
                            assert!(vector.as_slice()[7..].iter().all(|&v| v == 0.0));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn test_mapping_is_deterministic() {
        let mapper = FeatureMapper::new().unwrap();
        let raw = RawInput {
            card_type: CardType::AmericanExpress,
            browser: Browser::Firefox,
            ..RawInput::default()
        };
        assert_eq!(mapper.map(&raw), mapper.map(&raw));
        assert_eq!(mapper.map(&raw).get(2), Some(4.0));
        assert_eq!(mapper.map(&raw).get(4), Some(3.0));
    }

    #[test]
    fn test_encoding_tables_cover_every_choice() {
        for &card in CardType::ALL {
            assert!(CARD_TYPE_CODES.code(card.label()).is_some());
        }
        for &device in DeviceType::ALL {
            assert!(DEVICE_TYPE_CODES.code(device.label()).is_some());
        }
        for &browser in Browser::ALL {
            assert!(BROWSER_CODES.code(browser.label()).is_some());
        }
        assert_eq!(CARD_TYPE_CODES.code("Diners"), None);
    }

    #[test]
    fn test_layout_slot_out_of_range() {
        let mut layout = SLOT_LAYOUT;
        layout[6] = (InputField::EmailMatch, FEATURE_WIDTH);

        let err = FeatureMapper::with_layout(&layout).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::SlotOutOfRange {
                field: "email_match",
                slot: FEATURE_WIDTH,
                width: FEATURE_WIDTH,
            }
        );
    }

    #[test]
    fn test_layout_duplicate_slot() {
        let mut layout = SLOT_LAYOUT;
        layout[1] = (InputField::IssuerCode, 0);

        let err = FeatureMapper::with_layout(&layout).unwrap_err();
        assert_eq!(
            err,
            ConfigurationError::DuplicateSlot {
                slot: 0,
                first: "amount",
                second: "issuer_code",
            }
        );
    }

    #[test]
    fn test_layout_missing_field() {
        let err = FeatureMapper::with_layout(&SLOT_LAYOUT[..6]).unwrap_err();
        assert_eq!(err, ConfigurationError::UnassignedField("email_match"));
    }

    #[test]
    fn test_feature_names() {
        let names = feature_names();
        assert_eq!(names.len(), FEATURE_WIDTH);
        assert_eq!(names[0], "feature_0");
        assert_eq!(names[19], "feature_19");
    }
}
