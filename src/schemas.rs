use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};
use std::{collections::BTreeMap, fmt};

pub type PersonName = String;

/// Eaters per dish, keyed by the dish's position rendered as a decimal string.
pub type Selections = BTreeMap<String, Vec<PersonName>>;

#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct BillState {
    #[serde(default)]
    pub dishes: Vec<Dish>,
    #[serde(default)]
    pub people: Vec<PersonName>,
    #[serde(default)]
    pub selections: Selections,
}

/// A priced line of the bill. Its identity is its index in the dish list.
///
/// `name` and `price` are `None` when the key is absent and `Some(None)` when
/// it was sent as `null`, so both shapes come back out unchanged.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct Dish {
    #[serde(
        rename = "dish",
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub name: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub price: Option<Option<Price>>,
    /// Keys the frontend sends that we don't interpret; kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Only called for keys that exist, so a `null` becomes `Some(None)`.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Prices arrive as numbers or as the raw text of a form field.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Price {
    Number(Number),
    Text(String),
}

impl Price {
    /// Returns `None` when a text price doesn't parse as a number.
    pub fn to_f64(&self) -> Option<f64> {
        match self {
            Price::Number(n) => n.as_f64(),
            Price::Text(text) => text.trim().parse().ok(),
        }
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Price::Number(n) => write!(f, "{n}"),
            Price::Text(text) => f.write_str(text),
        }
    }
}

impl Dish {
    /// The price to split; absent and `null` both mean there is none.
    pub fn price(&self) -> Option<&Price> {
        self.price.as_ref().and_then(Option::as_ref)
    }

    #[cfg(test)]
    pub fn new(name: &str, price: f64) -> Self {
        Dish {
            name: Some(Some(name.to_string())),
            price: Some(Number::from_f64(price).map(Price::Number)),
            extra: Map::new(),
        }
    }
}
