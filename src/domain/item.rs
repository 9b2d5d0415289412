//! Items placed on tiles: fruits, coloured shapes and letters.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use strum_macros::{Display, EnumIter, EnumString};

pub const MAX_ITEM_COUNT: u8 = 4;

/// The broad family of an item, used by the reference-similarity rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, EnumIter)]
pub enum ItemClass {
    Fruit,
    Shape,
    Char,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ItemName {
    Strawberry,
    Lemon,
    Triangle,
    Rectangle,
    Cross,
    Circle,
    /// An uppercase letter `A..=Z`.
    Char(char),
}

impl ItemName {
    pub fn class(&self) -> ItemClass {
        match self {
            ItemName::Strawberry | ItemName::Lemon => ItemClass::Fruit,
            ItemName::Triangle | ItemName::Rectangle | ItemName::Cross | ItemName::Circle => {
                ItemClass::Shape
            }
            ItemName::Char(_) => ItemClass::Char,
        }
    }

    pub fn shapes() -> [ItemName; 4] {
        [
            ItemName::Triangle,
            ItemName::Rectangle,
            ItemName::Cross,
            ItemName::Circle,
        ]
    }

    pub fn fruits() -> [ItemName; 2] {
        [ItemName::Strawberry, ItemName::Lemon]
    }

    pub fn chars() -> impl Iterator<Item = ItemName> {
        ('A'..='Z').map(ItemName::Char)
    }

    /// Every item name, in the fixed order used by the solver encodings.
    pub fn all() -> Vec<ItemName> {
        let mut names: Vec<ItemName> = Self::fruits().into_iter().collect();
        names.extend(Self::shapes());
        names.extend(Self::chars());
        names
    }
}

impl fmt::Display for ItemName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemName::Strawberry => write!(f, "strawberry"),
            ItemName::Lemon => write!(f, "lemon"),
            ItemName::Triangle => write!(f, "triangle"),
            ItemName::Rectangle => write!(f, "rectangle"),
            ItemName::Cross => write!(f, "cross"),
            ItemName::Circle => write!(f, "circle"),
            ItemName::Char(c) => write!(f, "{c}"),
        }
    }
}

impl FromStr for ItemName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "strawberry" => Ok(ItemName::Strawberry),
            "lemon" => Ok(ItemName::Lemon),
            "triangle" => Ok(ItemName::Triangle),
            "rectangle" => Ok(ItemName::Rectangle),
            "cross" => Ok(ItemName::Cross),
            "circle" => Ok(ItemName::Circle),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) if c.is_ascii_uppercase() => Ok(ItemName::Char(c)),
                    _ => Err(format!("unknown item name `{other}`")),
                }
            }
        }
    }
}

impl Serialize for ItemName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for ItemName {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        ItemName::from_str(&s).map_err(D::Error::custom)
    }
}

/// The nine item colours. Shapes are restricted to sub-palettes, letters
/// are always black, fruits carry their natural colour.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
    EnumString, EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ItemColour {
    Red,
    Green,
    Blue,
    Yellow,
    Black,
    Orange,
    Purple,
    Pink,
    White,
}

impl ItemColour {
    /// The colours a given item name may take.
    pub fn palette(name: ItemName) -> &'static [ItemColour] {
        match name {
            ItemName::Strawberry => &[ItemColour::Red],
            ItemName::Lemon => &[ItemColour::Yellow],
            ItemName::Triangle | ItemName::Rectangle | ItemName::Cross => {
                &[ItemColour::Red, ItemColour::Green, ItemColour::Blue]
            }
            ItemName::Circle => &[
                ItemColour::Red,
                ItemColour::Green,
                ItemColour::Blue,
                ItemColour::Yellow,
                ItemColour::Orange,
                ItemColour::Pink,
                ItemColour::Purple,
                ItemColour::Black,
            ],
            ItemName::Char(_) => &[ItemColour::Black],
        }
    }

    /// The counts a given item name may take. Only strawberries stack.
    pub fn counts(name: ItemName) -> &'static [u8] {
        match name {
            ItemName::Strawberry => &[1, 2, 3, 4],
            _ => &[1],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Item {
    pub name: ItemName,
    #[serde(rename = "color")]
    pub colour: ItemColour,
    pub count: u8,
}

impl Item {
    pub fn new(name: ItemName, colour: ItemColour, count: u8) -> Self {
        debug_assert!((1..=MAX_ITEM_COUNT).contains(&count));
        Self {
            name,
            colour,
            count,
        }
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.count, self.colour, self.name)
    }
}
