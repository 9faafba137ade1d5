//! Experimental conditions and their trigger codes.
//!
//! The stimulus computer writes integer codes on the trigger channel. Their
//! meaning is a convention of the experiment, so it is kept in a
//! [`ConditionTable`] that callers pass around rather than in constants.
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    SelfPositive,
    SelfNegative,
    OtherPositive,
    OtherNegative,
    /// Image asking for a button press.
    #[serde(rename = "button_img")]
    ButtonImage,
    ButtonPress,
    Misclick,
}

impl Condition {
    pub const ALL: [Condition; 7] = [
        Condition::SelfPositive,
        Condition::SelfNegative,
        Condition::OtherPositive,
        Condition::OtherNegative,
        Condition::ButtonImage,
        Condition::ButtonPress,
        Condition::Misclick,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Condition::SelfPositive => "self_positive",
            Condition::SelfNegative => "self_negative",
            Condition::OtherPositive => "other_positive",
            Condition::OtherNegative => "other_negative",
            Condition::ButtonImage => "button_img",
            Condition::ButtonPress => "button_press",
            Condition::Misclick => "misclick",
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Condition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s.trim().to_lowercase().replace('-', "_");
        Condition::ALL
            .into_iter()
            .find(|c| c.name() == norm)
            .ok_or_else(|| format!("unknown condition {s:?}"))
    }
}

/// Two-way mapping between conditions and trigger codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConditionTable(BTreeMap<Condition, i64>);

impl Default for ConditionTable {
    /// Codes used by the self/other paradigm.
    fn default() -> Self {
        Self(BTreeMap::from([
            (Condition::SelfPositive, 11),
            (Condition::SelfNegative, 12),
            (Condition::OtherPositive, 21),
            (Condition::OtherNegative, 22),
            (Condition::ButtonImage, 23),
            (Condition::ButtonPress, 202),
            (Condition::Misclick, 103),
        ]))
    }
}

impl ConditionTable {
    /// Build a table, refusing two conditions with the same code.
    pub fn new(entries: impl IntoIterator<Item = (Condition, i64)>) -> Result<Self, String> {
        let mut map = BTreeMap::new();
        for (cond, code) in entries {
            if let Some((other, _)) = map.iter().find(|&(_, &c)| c == code) {
                return Err(format!("code {code} is assigned to both {other} and {cond}"));
            }
            map.insert(cond, code);
        }
        Ok(Self(map))
    }

    pub fn code(&self, condition: Condition) -> Option<i64> {
        self.0.get(&condition).copied()
    }

    pub fn condition(&self, code: i64) -> Option<Condition> {
        self.0.iter().find(|&(_, &c)| c == code).map(|(&cond, _)| cond)
    }

    /// Codes of `conditions`, in the given order.
    pub fn codes(&self, conditions: &[Condition]) -> Result<Vec<i64>, String> {
        conditions
            .iter()
            .map(|&c| self.code(c).ok_or_else(|| format!("no code for condition {c}")))
            .collect()
    }

    /// Resolve a trigger given either as a number or a condition name.
    pub fn resolve(&self, token: &str) -> Result<i64, String> {
        if let Ok(code) = token.trim().parse::<i64>() {
            return Ok(code);
        }
        let cond: Condition = token.parse()?;
        self.code(cond).ok_or_else(|| format!("no code for condition {cond}"))
    }

    pub fn iter(&self) -> impl Iterator<Item = (Condition, i64)> + '_ {
        self.0.iter().map(|(&c, &v)| (c, v))
    }
}
