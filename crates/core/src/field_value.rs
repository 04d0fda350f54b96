use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::expedient::{Expedient, Order, OrderState};
use crate::instant::UtcInstant;

/// A value held by one addressable field of an expedient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    State(OrderState),
    Instant(UtcInstant),
}

impl FieldValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_state(&self) -> Option<OrderState> {
        match self {
            FieldValue::State(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_instant(&self) -> Option<UtcInstant> {
        match self {
            FieldValue::Instant(i) => Some(*i),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<OrderState> for FieldValue {
    fn from(value: OrderState) -> Self {
        FieldValue::State(value)
    }
}

impl From<UtcInstant> for FieldValue {
    fn from(value: UtcInstant) -> Self {
        FieldValue::Instant(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpedientField {
    User,
    Model,
    LicensePlate,
    Vin,
    Description,
    Created,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderField {
    Title,
    Description,
    State,
    Instant,
}

/// Free-text fields backed by an autocomplete list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SuggestionField {
    User,
    Model,
    LicensePlate,
    Vin,
    OrderTitle,
}

impl SuggestionField {
    pub const ALL: [SuggestionField; 5] = [
        SuggestionField::User,
        SuggestionField::Model,
        SuggestionField::LicensePlate,
        SuggestionField::Vin,
        SuggestionField::OrderTitle,
    ];

    /// Every value this field takes in `expedient` (one per order for titles).
    pub fn values<'a>(&self, expedient: &'a Expedient) -> Vec<&'a str> {
        match self {
            Self::User => vec![expedient.user.as_str()],
            Self::Model => vec![expedient.model.as_str()],
            Self::LicensePlate => vec![expedient.license_plate.as_str()],
            Self::Vin => vec![expedient.vin.as_str()],
            Self::OrderTitle => expedient.orders.iter().map(|o| o.title.as_str()).collect(),
        }
    }
}

/// Typed address of one field inside an expedient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldPath {
    Expedient(ExpedientField),
    Order { index: usize, field: OrderField },
}

impl FieldPath {
    pub fn order(index: usize, field: OrderField) -> Self {
        FieldPath::Order { index, field }
    }

    pub fn read(&self, expedient: &Expedient) -> Result<FieldValue, CoreError> {
        Ok(match self {
            FieldPath::Expedient(field) => match field {
                ExpedientField::User => FieldValue::Text(expedient.user.clone()),
                ExpedientField::Model => FieldValue::Text(expedient.model.clone()),
                ExpedientField::LicensePlate => FieldValue::Text(expedient.license_plate.clone()),
                ExpedientField::Vin => FieldValue::Text(expedient.vin.clone()),
                ExpedientField::Description => FieldValue::Text(expedient.description.clone()),
                ExpedientField::Created => FieldValue::Instant(expedient.created),
            },
            FieldPath::Order { index, field } => {
                let order = order_at(&expedient.orders, *index)?;
                match field {
                    OrderField::Title => FieldValue::Text(order.title.clone()),
                    OrderField::Description => FieldValue::Text(order.description.clone()),
                    OrderField::State => FieldValue::State(order.state),
                    OrderField::Instant => FieldValue::Instant(order.instant),
                }
            }
        })
    }

    pub fn write(&self, expedient: &mut Expedient, value: FieldValue) -> Result<(), CoreError> {
        match self {
            FieldPath::Expedient(field) => match field {
                ExpedientField::User => expedient.user = self.expect_text(value)?,
                ExpedientField::Model => expedient.model = self.expect_text(value)?,
                ExpedientField::LicensePlate => expedient.license_plate = self.expect_text(value)?,
                ExpedientField::Vin => expedient.vin = self.expect_text(value)?,
                ExpedientField::Description => expedient.description = self.expect_text(value)?,
                ExpedientField::Created => expedient.created = self.expect_instant(value)?,
            },
            FieldPath::Order { index, field } => {
                let len = expedient.orders.len();
                let order = expedient
                    .orders
                    .get_mut(*index)
                    .ok_or(CoreError::OrderIndexOutOfRange { index: *index, len })?;
                match field {
                    OrderField::Title => order.title = self.expect_text(value)?,
                    OrderField::Description => order.description = self.expect_text(value)?,
                    OrderField::State => {
                        order.state = value.as_state().ok_or_else(|| self.mismatch("state"))?
                    }
                    OrderField::Instant => order.instant = self.expect_instant(value)?,
                }
            }
        }
        Ok(())
    }

    /// The autocomplete list this field feeds, if any.
    pub fn suggestion_field(&self) -> Option<SuggestionField> {
        match self {
            FieldPath::Expedient(ExpedientField::User) => Some(SuggestionField::User),
            FieldPath::Expedient(ExpedientField::Model) => Some(SuggestionField::Model),
            FieldPath::Expedient(ExpedientField::LicensePlate) => Some(SuggestionField::LicensePlate),
            FieldPath::Expedient(ExpedientField::Vin) => Some(SuggestionField::Vin),
            FieldPath::Order { field: OrderField::Title, .. } => Some(SuggestionField::OrderTitle),
            _ => None,
        }
    }

    fn expect_text(&self, value: FieldValue) -> Result<String, CoreError> {
        match value {
            FieldValue::Text(s) => Ok(s),
            _ => Err(self.mismatch("text")),
        }
    }

    fn expect_instant(&self, value: FieldValue) -> Result<UtcInstant, CoreError> {
        value.as_instant().ok_or_else(|| self.mismatch("instant"))
    }

    fn mismatch(&self, expected: &'static str) -> CoreError {
        CoreError::FieldTypeMismatch {
            path: self.to_string(),
            expected,
        }
    }
}

impl From<ExpedientField> for FieldPath {
    fn from(field: ExpedientField) -> Self {
        FieldPath::Expedient(field)
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldPath::Expedient(field) => write!(f, "{field:?}"),
            FieldPath::Order { index, field } => write!(f, "orders[{index}].{field:?}"),
        }
    }
}

fn order_at(orders: &[Order], index: usize) -> Result<&Order, CoreError> {
    orders.get(index).ok_or(CoreError::OrderIndexOutOfRange {
        index,
        len: orders.len(),
    })
}
