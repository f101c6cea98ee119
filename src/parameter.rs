use serde::{Deserialize, Serialize};

use crate::error::ParameterError;

/// Upper bound for the combined weight of included parameters.
pub const WEIGHT_BUDGET: u32 = 100;

/// A named criterion with its importance weight in percent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub weight: u8,
    /// Excluded parameters stay in the set but do not count toward the total
    /// and are left out of the prompt.
    pub included: bool,
}

/// Ordered parameters with unique names.
///
/// The total is never cached, so it always reflects the latest edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterSet {
    items: Vec<Parameter>,
}

impl ParameterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an included parameter.
    pub fn add(&mut self, name: &str, weight: i64) -> Result<(), ParameterError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ParameterError::EmptyName);
        }
        let weight = check_weight(name, weight)?;
        if self.position(name).is_some() {
            return Err(ParameterError::DuplicateParameter(name.to_string()));
        }
        self.items.push(Parameter {
            name: name.to_string(),
            weight,
            included: true,
        });
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<Parameter, ParameterError> {
        let idx = self.require(name)?;
        Ok(self.items.remove(idx))
    }

    pub fn set_weight(&mut self, name: &str, weight: i64) -> Result<(), ParameterError> {
        let idx = self.require(name)?;
        self.items[idx].weight = check_weight(name, weight)?;
        Ok(())
    }

    pub fn set_included(&mut self, name: &str, included: bool) -> Result<(), ParameterError> {
        let idx = self.require(name)?;
        self.items[idx].included = included;
        Ok(())
    }

    /// Sum of weights of the included parameters.
    pub fn total_weight(&self) -> u32 {
        self.included().map(|p| u32::from(p.weight)).sum()
    }

    /// Enforces the weight budget at the boundary (saving, generating).
    pub fn check_budget(&self) -> Result<(), ParameterError> {
        let total = self.total_weight();
        if total > WEIGHT_BUDGET {
            return Err(ParameterError::OverBudget { total });
        }
        Ok(())
    }

    pub fn included(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter().filter(|p| p.included)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.items.iter()
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.position(name).map(|idx| &self.items[idx])
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.items.iter().position(|p| p.name == name)
    }

    fn require(&self, name: &str) -> Result<usize, ParameterError> {
        self.position(name)
            .ok_or_else(|| ParameterError::UnknownParameter(name.trim().to_string()))
    }
}

fn check_weight(name: &str, weight: i64) -> Result<u8, ParameterError> {
    u8::try_from(weight)
        .ok()
        .filter(|w| u32::from(*w) <= WEIGHT_BUDGET)
        .ok_or_else(|| ParameterError::InvalidWeight {
            name: name.to_string(),
            weight,
        })
}
