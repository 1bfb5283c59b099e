use serde::{ser::SerializeMap, Serialize, Serializer};
use std::collections::HashMap;

use crate::schemas::{Dish, PersonName, Selections};

#[derive(Debug, thiserror::Error)]
pub enum SplitError {
    #[error("dish {index} has a price that is not a number: {price:?}")]
    InvalidPrice { index: usize, price: String },
}

/// Owed amount per person, kept in the order names first appear in the people list.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Balance {
    entries: Vec<(PersonName, f64)>,
    positions: HashMap<PersonName, usize>,
}

impl Balance {
    /// Starts every known person at zero. Repeated names share one entry.
    pub fn for_people(people: &[PersonName]) -> Self {
        let mut balance = Balance::default();
        for person in people {
            if !balance.positions.contains_key(person) {
                balance.positions.insert(person.clone(), balance.entries.len());
                balance.entries.push((person.clone(), 0.0));
            }
        }
        balance
    }

    /// Adds `amount` to a known person. Returns false for unknown names.
    pub fn credit(&mut self, person: &str, amount: f64) -> bool {
        match self.positions.get(person) {
            Some(&position) => {
                self.entries[position].1 += amount;
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    pub fn get(&self, person: &str) -> Option<f64> {
        self.positions
            .get(person)
            .map(|&position| self.entries[position].1)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.entries
            .iter()
            .map(|(person, amount)| (person.as_str(), *amount))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (person, amount) in self.iter() {
            map.serialize_entry(person, &amount)?;
        }
        map.end()
    }
}

fn dish_price(index: usize, dish: &Dish) -> Result<f64, SplitError> {
    match dish.price() {
        None => Ok(0.0),
        Some(price) => price.to_f64().ok_or_else(|| SplitError::InvalidPrice {
            index,
            price: price.to_string(),
        }),
    }
}

pub fn compute_owed_amounts(
    dishes: &[Dish],
    people: &[PersonName],
    selections: &Selections,
) -> Result<Balance, SplitError> {
    let mut balance = Balance::for_people(people);
    for (index, dish) in dishes.iter().enumerate() {
        let eaters = match selections.get(&index.to_string()) {
            Some(eaters) if !eaters.is_empty() => eaters,
            _ => continue,
        };
        // Unknown names still count towards the divisor
        let share = dish_price(index, dish)? / eaters.len() as f64;
        for eater in eaters {
            if !balance.credit(eater, share) {
                log::debug!("Ignoring unknown eater {eater:?} of dish {index}");
            }
        }
    }
    Ok(balance)
}
