//! Code-shape constraints: exact counts, upper bounds and a required
//! program prefix, combined conjunctively.

use crate::domain::{AssetError, BlockKind, Program};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

/// Keys of the count clauses. `All` counts every block, outer `repeat`
/// headers included.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKey {
    Fd,
    Bk,
    Lt,
    Rt,
    Repeat,
    All,
}

impl ConstraintKey {
    pub fn from_block(kind: BlockKind) -> Option<ConstraintKey> {
        match kind {
            BlockKind::Fd => Some(ConstraintKey::Fd),
            BlockKind::Bk => Some(ConstraintKey::Bk),
            BlockKind::Lt => Some(ConstraintKey::Lt),
            BlockKind::Rt => Some(ConstraintKey::Rt),
            BlockKind::Repeat => Some(ConstraintKey::Repeat),
            BlockKind::SetPc | BlockKind::Cursor => None,
        }
    }

    fn full_name(&self) -> &'static str {
        match self {
            ConstraintKey::Fd => "forward",
            ConstraintKey::Bk => "backward",
            ConstraintKey::Lt => "left",
            ConstraintKey::Rt => "right",
            ConstraintKey::Repeat => "repeat",
            ConstraintKey::All => "commands",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CodeConstraints {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub exactly: BTreeMap<ConstraintKey, u32>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub at_most: BTreeMap<ConstraintKey, u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub start_by: Vec<BlockKind>,
}

impl CodeConstraints {
    pub fn from_value(value: &serde_json::Value) -> Result<Self, AssetError> {
        // a reference constraint may be wrapped in a singleton list
        let value = match value {
            serde_json::Value::Array(items) if items.len() == 1 => &items[0],
            serde_json::Value::Array(_) => {
                return Ok(Self::default());
            }
            other => other,
        };
        let constraints: CodeConstraints =
            serde_json::from_value(value.clone()).map_err(|source| AssetError::Json { source })?;
        constraints.validate()?;
        Ok(constraints)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        for key in self.exactly.keys() {
            if self.at_most.contains_key(key) {
                return Err(AssetError::Schema {
                    message: format!("`{key}` appears in both exactly and at_most"),
                });
            }
        }
        for kind in &self.start_by {
            if !matches!(
                kind,
                BlockKind::Fd | BlockKind::Bk | BlockKind::Lt | BlockKind::Rt
            ) {
                return Err(AssetError::Schema {
                    message: format!("`{kind}` is not allowed in start_by"),
                });
            }
        }
        Ok(())
    }

    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).expect("constraint serialisation cannot fail")
    }

    pub fn is_empty(&self) -> bool {
        self.exactly.is_empty() && self.at_most.is_empty() && self.start_by.is_empty()
    }

    /// Total number of clauses across the three parts.
    pub fn size(&self) -> usize {
        self.exactly.len() + self.at_most.len() + self.start_by.len()
    }

    /// Lower bound on the count of `key`, zero unless an exact clause names
    /// it.
    pub fn at_least(&self, key: ConstraintKey) -> u32 {
        self.exactly.get(&key).copied().unwrap_or(0)
    }

    /// Upper bound on the count of `key`, unbounded when no clause names
    /// it.
    pub fn upper_bound(&self, key: ConstraintKey) -> Option<u32> {
        self.exactly
            .get(&key)
            .or_else(|| self.at_most.get(&key))
            .copied()
    }

    /// Structural satisfaction check of all three clauses against a
    /// program.
    pub fn is_satisfied_by(&self, program: &Program) -> bool {
        let counts = program.block_count();
        for (kind, count) in &counts {
            if let Some(key) = ConstraintKey::from_block(*kind) {
                if let Some(upper) = self.upper_bound(key) {
                    if *count > upper {
                        return false;
                    }
                }
                if *count < self.at_least(key) {
                    return false;
                }
            }
        }
        // a named block that never occurs still has to meet its lower bound
        for (key, lower) in &self.exactly {
            if *key != ConstraintKey::All && *lower > 0 {
                let kind = match key {
                    ConstraintKey::Fd => BlockKind::Fd,
                    ConstraintKey::Bk => BlockKind::Bk,
                    ConstraintKey::Lt => BlockKind::Lt,
                    ConstraintKey::Rt => BlockKind::Rt,
                    ConstraintKey::Repeat => BlockKind::Repeat,
                    ConstraintKey::All => unreachable!(),
                };
                if counts.get(&kind).copied().unwrap_or(0) < *lower {
                    return false;
                }
            }
        }

        let total = program.total_blocks();
        if let Some(upper) = self.upper_bound(ConstraintKey::All) {
            if total > upper {
                return false;
            }
        }
        if total < self.at_least(ConstraintKey::All) {
            return false;
        }

        if self.start_by.len() > program.run.len() {
            return false;
        }
        program
            .top_level_kinds()
            .iter()
            .zip(&self.start_by)
            .all(|(got, want)| got == want)
    }
}

impl fmt::Display for CodeConstraints {
    /// The natural-language rendering embedded into task descriptions,
    /// e.g. "Follow these rules: (a) Start by using 'forward'. (b) Use
    /// exactly 2 'forward' and 3 commands.".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(items: &[String]) -> String {
            match items.len() {
                0 => String::new(),
                1 => items[0].clone(),
                2 => format!("{} and {}", items[0], items[1]),
                _ => format!(
                    "{} and {}",
                    items[..items.len() - 1].join(", "),
                    items[items.len() - 1]
                ),
            }
        }

        fn counted(map: &BTreeMap<ConstraintKey, u32>) -> Vec<String> {
            // named blocks first, the `all` total last
            let mut items: Vec<String> = map
                .iter()
                .filter(|(key, count)| **count > 0 && **key != ConstraintKey::All)
                .map(|(key, count)| format!("{} '{}'", count, key.full_name()))
                .collect();
            if let Some(count) = map.get(&ConstraintKey::All) {
                if *count > 0 {
                    items.push(format!("{} {}", count, ConstraintKey::All.full_name()));
                }
            }
            items
        }

        let mut rules = vec![];
        if !self.start_by.is_empty() {
            let prefix: Vec<String> = self
                .start_by
                .iter()
                .map(|kind| {
                    let key = ConstraintKey::from_block(*kind).expect("validated prefix");
                    format!("'{}'", key.full_name())
                })
                .collect();
            rules.push(format!("start by using {}", prefix.join(", ")));
        }
        let exactly = counted(&self.exactly);
        if !exactly.is_empty() {
            rules.push(format!("use exactly {}", join(&exactly)));
        }
        let most = counted(&self.at_most);
        if !most.is_empty() {
            rules.push(format!("use at most {}", join(&most)));
        }
        for (key, count) in self.exactly.iter().chain(self.at_most.iter()) {
            if *count == 0 {
                rules.push(format!("don't use '{}'", key.full_name()));
            }
        }

        match rules.len() {
            0 => Ok(()),
            1 => {
                let mut rule = rules[0].clone();
                if let Some(first) = rule.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                write!(f, "{rule}")
            }
            _ => {
                write!(f, "Follow these rules:")?;
                for (index, rule) in rules.iter().enumerate() {
                    let letter = (b'a' + index as u8) as char;
                    let mut rule = rule.clone();
                    if let Some(first) = rule.get_mut(0..1) {
                        first.make_ascii_uppercase();
                    }
                    write!(f, " ({letter}) {rule}.")?;
                }
                Ok(())
            }
        }
    }
}
