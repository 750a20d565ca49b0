//! Colors and mana costs

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five colors of Magic
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Color {
    White,
    Blue,
    Black,
    Red,
    Green,
}

impl Color {
    pub const ALL: [Color; 5] = [
        Color::White,
        Color::Blue,
        Color::Black,
        Color::Red,
        Color::Green,
    ];

    fn bit(self) -> u8 {
        1 << (self as u8)
    }

    /// Color for a mana symbol letter (W, U, B, R, G)
    pub fn from_symbol(c: char) -> Option<Color> {
        match c.to_ascii_uppercase() {
            'W' => Some(Color::White),
            'U' => Some(Color::Blue),
            'B' => Some(Color::Black),
            'R' => Some(Color::Red),
            'G' => Some(Color::Green),
            _ => None,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Color::White => write!(f, "W"),
            Color::Blue => write!(f, "U"),
            Color::Black => write!(f, "B"),
            Color::Red => write!(f, "R"),
            Color::Green => write!(f, "G"),
        }
    }
}

/// Set of colors packed into a byte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Vec<Color>", into = "Vec<Color>")]
pub struct ColorSet(u8);

impl ColorSet {
    pub fn new() -> Self {
        ColorSet(0)
    }

    pub fn insert(&mut self, color: Color) {
        self.0 |= color.bit();
    }

    pub fn contains(&self, color: Color) -> bool {
        self.0 & color.bit() != 0
    }

    pub fn intersects(&self, other: &ColorSet) -> bool {
        self.0 & other.0 != 0
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(&self) -> impl Iterator<Item = Color> + '_ {
        Color::ALL.into_iter().filter(|c| self.contains(*c))
    }
}

impl FromIterator<Color> for ColorSet {
    fn from_iter<I: IntoIterator<Item = Color>>(iter: I) -> Self {
        let mut set = ColorSet::new();
        for color in iter {
            set.insert(color);
        }
        set
    }
}

impl From<Vec<Color>> for ColorSet {
    fn from(colors: Vec<Color>) -> Self {
        colors.into_iter().collect()
    }
}

impl From<ColorSet> for Vec<Color> {
    fn from(set: ColorSet) -> Self {
        set.iter().collect()
    }
}

/// Mana cost of a creature, one counter per symbol kind (e.g. "{2}{R}{R}")
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ManaCost {
    pub generic: u8,
    pub white: u8,
    pub blue: u8,
    pub black: u8,
    pub red: u8,
    pub green: u8,
    /// Symbols that count as one mana but are not a single color
    /// (hybrid, phyrexian, colorless, snow)
    pub other: u8,
}

impl ManaCost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a mana cost in either braced ("{1}{W/U}{G}") or compact ("1UG") form
    ///
    /// `X` counts as zero. Unknown characters are ignored.
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        if s.contains('{') {
            Self::parse_braced(s)
        } else {
            Self::parse_compact(s)
        }
    }

    fn parse_compact(s: &str) -> Self {
        let mut cost = ManaCost::new();
        let mut generic_str = String::new();

        for c in s.chars() {
            match c {
                '0'..='9' => generic_str.push(c),
                'C' | 'S' => cost.other = cost.other.saturating_add(1),
                _ => {
                    if let Some(color) = Color::from_symbol(c) {
                        cost.add_color(color);
                    }
                }
            }
        }

        if !generic_str.is_empty() {
            cost.generic = generic_str.parse().unwrap_or(u8::MAX);
        }

        cost
    }

    fn parse_braced(s: &str) -> Self {
        let mut cost = ManaCost::new();
        for symbol in s.split(['{', '}']).filter(|part| !part.is_empty()) {
            if let Ok(n) = symbol.parse::<u8>() {
                cost.generic = cost.generic.saturating_add(n);
                continue;
            }
            if symbol.eq_ignore_ascii_case("X") {
                continue;
            }
            let mut chars = symbol.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => match Color::from_symbol(c) {
                    Some(color) => cost.add_color(color),
                    None => cost.other = cost.other.saturating_add(1),
                },
                // Hybrid and phyrexian symbols
                _ => cost.other = cost.other.saturating_add(1),
            }
        }
        cost
    }

    fn add_color(&mut self, color: Color) {
        let slot = match color {
            Color::White => &mut self.white,
            Color::Blue => &mut self.blue,
            Color::Black => &mut self.black,
            Color::Red => &mut self.red,
            Color::Green => &mut self.green,
        };
        *slot = slot.saturating_add(1);
    }

    /// Total mana value
    pub fn cmc(&self) -> u32 {
        [
            self.generic,
            self.white,
            self.blue,
            self.black,
            self.red,
            self.green,
            self.other,
        ]
        .iter()
        .map(|&n| n as u32)
        .sum()
    }

    /// Colors appearing in the cost
    pub fn colors(&self) -> ColorSet {
        let mut set = ColorSet::new();
        for (count, color) in [
            (self.white, Color::White),
            (self.blue, Color::Blue),
            (self.black, Color::Black),
            (self.red, Color::Red),
            (self.green, Color::Green),
        ] {
            if count > 0 {
                set.insert(color);
            }
        }
        set
    }
}

impl fmt::Display for ManaCost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.generic > 0 {
            write!(f, "{}", self.generic)?;
        }
        for (count, symbol) in [
            (self.white, "W"),
            (self.blue, "U"),
            (self.black, "B"),
            (self.red, "R"),
            (self.green, "G"),
            (self.other, "C"),
        ] {
            for _ in 0..count {
                write!(f, "{symbol}")?;
            }
        }
        Ok(())
    }
}
