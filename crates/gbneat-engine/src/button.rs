use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A Game Boy joypad input.
///
/// Parsing is case-insensitive on the variant name, so `"a"`, `"Left"` and
/// `"SELECT"` all parse.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
)]
#[serde(rename_all = "lowercase")]
pub enum Button {
    #[display("a")]
    A,
    #[display("b")]
    B,
    #[display("left")]
    Left,
    #[display("right")]
    Right,
    #[display("up")]
    Up,
    #[display("down")]
    Down,
    #[display("start")]
    Start,
    #[display("select")]
    Select,
}

impl Button {
    pub const ALL: [Button; 8] = [
        Button::A,
        Button::B,
        Button::Left,
        Button::Right,
        Button::Up,
        Button::Down,
        Button::Start,
        Button::Select,
    ];

    /// Lowercase input name, as written to action logs.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Button::A => "a",
            Button::B => "b",
            Button::Left => "left",
            Button::Right => "right",
            Button::Up => "up",
            Button::Down => "down",
            Button::Start => "start",
            Button::Select => "select",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[display("unknown button: {name}")]
pub struct ParseButtonError {
    name: String,
}

impl FromStr for Button {
    type Err = ParseButtonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Button::ALL
            .into_iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| ParseButtonError { name: s.to_owned() })
    }
}
