//! Goals: lists of objectives, each an objective kind applied to one or
//! more specs.

use crate::domain::{AssetError, Line, LineAtom, Literal, LiteralAtom, Spec};
use serde::{Deserialize, Serialize};
use std::fmt;
use strum_macros::{Display, EnumIter, EnumString};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, EnumString, EnumIter,
    Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ObjectiveKind {
    Find,
    FindOnly,
    Forbid,
    CollectAll,
    Concat,
    Sum,
    Draw,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Objective {
    pub kind: ObjectiveKind,
    pub specs: Vec<Spec>,
    /// Required for `sum`, forbidden otherwise.
    pub total_cnt: Option<u32>,
}

impl Objective {
    pub fn new(kind: ObjectiveKind, specs: Vec<Spec>, total_cnt: Option<u32>) -> Result<Self, AssetError> {
        let objective = Self {
            kind,
            specs,
            total_cnt,
        };
        objective.validate()?;
        Ok(objective)
    }

    pub fn validate(&self) -> Result<(), AssetError> {
        match self.kind {
            ObjectiveKind::Sum if self.total_cnt.is_none() => Err(AssetError::Schema {
                message: "sum objective without total_cnt".to_owned(),
            }),
            kind if kind != ObjectiveKind::Sum && self.total_cnt.is_some() => {
                Err(AssetError::Schema {
                    message: format!("{kind} objective with total_cnt"),
                })
            }
            ObjectiveKind::Concat if self.specs.len() < 2 => Err(AssetError::Schema {
                message: "concat objective needs at least two specs".to_owned(),
            }),
            kind if kind != ObjectiveKind::Concat && self.specs.len() != 1 => {
                Err(AssetError::Schema {
                    message: format!("{kind} objective needs exactly one spec"),
                })
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for Objective {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ObjectiveKind::Find => write!(f, "Find the {}", self.specs[0]),
            ObjectiveKind::FindOnly => write!(f, "Find only the {}", self.specs[0]),
            ObjectiveKind::Forbid => write!(f, "without standing on a {}", self.specs[0]),
            ObjectiveKind::CollectAll => write!(f, "Collect all {}", self.specs[0]),
            ObjectiveKind::Sum => {
                let total = self.total_cnt.unwrap_or(0);
                let mut spec = self.specs[0].to_string();
                if total > 1 {
                    spec = spec
                        .replace("strawberry", "strawberries")
                        .replace("lemon", "lemons");
                }
                write!(f, "Collect exactly {total} {spec}")
            }
            ObjectiveKind::Concat => {
                write!(f, "First find the {}", self.specs[0])?;
                write!(f, ", then the {}", self.specs[1])?;
                if self.specs.len() > 2 {
                    for spec in &self.specs[2..self.specs.len() - 1] {
                        write!(f, ", {spec}")?;
                    }
                    write!(f, ", finally the {}", self.specs[self.specs.len() - 1])?;
                }
                Ok(())
            }
            ObjectiveKind::Draw => write!(f, "Draw the picture"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ObjectiveJson {
    name: ObjectiveKind,
    specs: Vec<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    total_cnt: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Goal {
    pub objectives: Vec<Objective>,
}

impl Goal {
    pub fn new(objectives: Vec<Objective>) -> Self {
        Self { objectives }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, AssetError> {
        let raw: Vec<ObjectiveJson> =
            serde_json::from_value(value.clone()).map_err(|source| AssetError::Json { source })?;
        let objectives = raw
            .iter()
            .map(|json| {
                let specs = json
                    .specs
                    .iter()
                    .map(Spec::from_value)
                    .collect::<Result<Vec<_>, _>>()?;
                Objective::new(json.name, specs, json.total_cnt)
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { objectives })
    }

    pub fn to_value(&self) -> serde_json::Value {
        let raw: Vec<ObjectiveJson> = self
            .objectives
            .iter()
            .map(|objective| ObjectiveJson {
                name: objective.kind,
                specs: objective.specs.iter().map(Spec::to_value).collect(),
                total_cnt: objective.total_cnt,
            })
            .collect();
        serde_json::to_value(raw).expect("goal serialisation cannot fail")
    }

    /// The `draw` goal implied by a set of reference lines: one spec whose
    /// clauses are the individual line literals.
    pub fn draw_from_lines(lines: &[Line]) -> Result<Self, AssetError> {
        let cnf = lines
            .iter()
            .map(|line| {
                Ok(vec![Literal::positive(LiteralAtom::Line(LineAtom {
                    x1: line.x1,
                    y1: line.y1,
                    x2: line.x2,
                    y2: line.y2,
                    colour: line.colour()?,
                }))])
            })
            .collect::<Result<Vec<_>, AssetError>>()?;
        Ok(Self {
            objectives: vec![Objective {
                kind: ObjectiveKind::Draw,
                specs: vec![Spec::new(cnf)],
                total_cnt: None,
            }],
        })
    }

    pub fn of_kind(&self, kind: ObjectiveKind) -> impl Iterator<Item = &Objective> {
        self.objectives.iter().filter(move |o| o.kind == kind)
    }

    pub fn has_kind(&self, kind: ObjectiveKind) -> bool {
        self.objectives.iter().any(|o| o.kind == kind)
    }

    pub fn is_draw(&self) -> bool {
        self.has_kind(ObjectiveKind::Draw)
    }

    pub fn len(&self) -> usize {
        self.objectives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objectives.is_empty()
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut text = String::new();
        for objective in &self.objectives {
            let part = objective.to_string();
            // a second forbid chains with "and" instead of repeating itself
            let part = if objective.kind == ObjectiveKind::Forbid && text.contains("without") {
                part.replace("without standing on a", "and")
            } else {
                part
            };
            if !text.is_empty() {
                text.push(' ');
            }
            text.push_str(&part);
        }
        write!(f, "{text}")
    }
}
