use crate::query::{Filter, Sort};
use serde::{Deserialize, Serialize};

/// One stage of an aggregation pipeline. Stages run in order, each one
/// consuming the rows produced by the previous stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Stage {
    Match(Filter),
    Sort(Sort),
    Skip(u64),
    Limit(u64),
    /// Keep only the listed fields.
    Project(Vec<String>),
    /// Group rows by the value of `key`. Each output row carries the key
    /// value under `_id` plus one field per accumulator.
    Group {
        key: String,
        accumulators: Vec<(String, Accumulator)>,
    },
    /// Replace all rows with a single row `{ <field>: <row count> }`.
    Count(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Accumulator {
    Count,
    Sum(String),
}

impl Stage {
    pub fn group_by(key: &str) -> GroupBuilder {
        GroupBuilder {
            key: key.to_string(),
            accumulators: Vec::new(),
        }
    }
}

pub struct GroupBuilder {
    key: String,
    accumulators: Vec<(String, Accumulator)>,
}

impl GroupBuilder {
    pub fn count(mut self, name: &str) -> Self {
        self.accumulators.push((name.to_string(), Accumulator::Count));
        self
    }

    pub fn sum(mut self, name: &str, field: &str) -> Self {
        self.accumulators
            .push((name.to_string(), Accumulator::Sum(field.to_string())));
        self
    }

    pub fn build(self) -> Stage {
        Stage::Group {
            key: self.key,
            accumulators: self.accumulators,
        }
    }
}
