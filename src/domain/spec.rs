//! Specs: propositional CNF formulas over item attributes. A tile
//! satisfies a spec when every clause has at least one literal satisfied
//! by the tile's item (or by a drawn edge for line literals).

use crate::domain::{AssetError, ItemColour, ItemName, MarkerColour};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A drawn-edge literal, only meaningful inside `draw` objectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LineAtom {
    pub x1: i64,
    pub y1: i64,
    pub x2: i64,
    pub y2: i64,
    pub colour: MarkerColour,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LiteralAtom {
    Name(ItemName),
    /// The distinguished "no item" marker, produced when negating specs.
    Noname,
    Colour(ItemColour),
    Count(u8),
    Line(LineAtom),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Literal {
    pub atom: LiteralAtom,
    pub neg: bool,
}

impl Literal {
    pub fn positive(atom: LiteralAtom) -> Self {
        Self { atom, neg: false }
    }

    pub fn negated(&self) -> Self {
        Self {
            atom: self.atom,
            neg: !self.neg,
        }
    }
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.neg {
            write!(f, "~")?;
        }
        match &self.atom {
            LiteralAtom::Name(name) => write!(f, "{name}"),
            LiteralAtom::Noname => write!(f, "noname"),
            LiteralAtom::Colour(colour) => write!(f, "{colour}"),
            LiteralAtom::Count(count) => write!(f, "{count}"),
            LiteralAtom::Line(line) => write!(
                f,
                "l_{}_{}_{}_{}_{}",
                line.x1, line.y1, line.x2, line.y2, line.colour
            ),
        }
    }
}

// The wire shape of a literal: exactly one attribute key plus `neg`.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct LiteralJson {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<ItemName>,
    #[serde(rename = "color", skip_serializing_if = "Option::is_none")]
    colour: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    count: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y1: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    x2: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    y2: Option<i64>,
    #[serde(default)]
    neg: u8,
}

impl Literal {
    fn from_json(json: &LiteralJson) -> Result<Self, AssetError> {
        let neg = json.neg != 0;
        let atom = if let (Some(x1), Some(y1), Some(x2), Some(y2)) =
            (json.x1, json.y1, json.x2, json.y2)
        {
            let colour_value = json.colour.as_ref().ok_or_else(|| AssetError::Schema {
                message: "line literal without a colour".to_owned(),
            })?;
            let hex = colour_value.as_str().unwrap_or_default();
            let colour = MarkerColour::from_hex(hex)
                .or_else(|_| MarkerColour::from_str(hex))
                .map_err(|_| AssetError::Schema {
                    message: format!("unknown line colour `{hex}`"),
                })?;
            LiteralAtom::Line(LineAtom {
                x1,
                y1,
                x2,
                y2,
                colour,
            })
        } else if let Some(name) = json.name {
            LiteralAtom::Name(name)
        } else if let Some(colour) = &json.colour {
            let text = colour.as_str().ok_or_else(|| AssetError::Schema {
                message: "colour literal must be a string".to_owned(),
            })?;
            LiteralAtom::Colour(ItemColour::from_str(text).map_err(|_| AssetError::Schema {
                message: format!("unknown item colour `{text}`"),
            })?)
        } else if let Some(count) = &json.count {
            // counts appear both as numbers and as strings in the wild
            let value = count
                .as_u64()
                .or_else(|| count.as_str().and_then(|s| s.parse().ok()))
                .ok_or_else(|| AssetError::Schema {
                    message: format!("bad count literal `{count}`"),
                })?;
            LiteralAtom::Count(value as u8)
        } else {
            return Err(AssetError::Schema {
                message: "literal carries no attribute".to_owned(),
            });
        };
        Ok(Literal { atom, neg })
    }

    fn to_json(&self) -> LiteralJson {
        let mut json = LiteralJson {
            name: None,
            colour: None,
            count: None,
            x1: None,
            y1: None,
            x2: None,
            y2: None,
            neg: self.neg as u8,
        };
        match &self.atom {
            LiteralAtom::Name(name) => json.name = Some(*name),
            // synthetic, only appears in negated specs that stay internal
            LiteralAtom::Noname => json.name = None,
            LiteralAtom::Colour(colour) => {
                json.colour = Some(serde_json::Value::String(colour.to_string()))
            }
            LiteralAtom::Count(count) => {
                json.count = Some(serde_json::Value::Number((*count).into()))
            }
            LiteralAtom::Line(line) => {
                json.x1 = Some(line.x1);
                json.y1 = Some(line.y1);
                json.x2 = Some(line.x2);
                json.y2 = Some(line.y2);
                json.colour = Some(serde_json::Value::String(line.colour.hex().to_owned()));
            }
        }
        json
    }
}

pub type Clause = Vec<Literal>;
pub type Cnf = Vec<Clause>;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Spec {
    pub cnf: Cnf,
}

impl Spec {
    pub fn new(cnf: Cnf) -> Self {
        Self { cnf }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, AssetError> {
        let clauses: Vec<Vec<LiteralJson>> =
            serde_json::from_value(value.clone()).map_err(|source| AssetError::Json { source })?;
        let cnf = clauses
            .iter()
            .map(|clause| clause.iter().map(Literal::from_json).collect())
            .collect::<Result<Cnf, _>>()?;
        Ok(Self { cnf })
    }

    pub fn to_value(&self) -> serde_json::Value {
        let clauses: Vec<Vec<LiteralJson>> = self
            .cnf
            .iter()
            .map(|clause| clause.iter().map(Literal::to_json).collect())
            .collect();
        serde_json::to_value(clauses).expect("spec serialisation cannot fail")
    }
}

impl fmt::Display for Spec {
    /// Attribute clauses before name clauses, so `[[red], [strawberry]]`
    /// reads "red strawberry".
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut front: Vec<String> = vec![];
        let mut back: Vec<String> = vec![];
        for clause in &self.cnf {
            let text = clause
                .iter()
                .map(Literal::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            let is_plain_name = clause.len() == 1
                && !clause[0].neg
                && matches!(clause[0].atom, LiteralAtom::Name(_) | LiteralAtom::Noname);
            if is_plain_name {
                back.push(text);
            } else {
                front.push(text);
            }
        }
        front.extend(back);
        write!(f, "{}", front.join(" "))
    }
}
