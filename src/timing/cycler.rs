// Copyright (c) 2024 Mike Tsao

use serde::{Deserialize, Serialize};

/// A bounded, 1-based modular counter: `1, 2, ..., length, 1, 2, ...`.
///
/// The wrap test is `position == length`, checked before incrementing. A
/// cycler of length zero therefore never wraps and counts up forever.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cycler {
    length: u64,
    #[serde(skip)]
    position: u64,
}
impl Cycler {
    #[allow(missing_docs)]
    pub fn new_with(length: u64) -> Self {
        Self {
            length,
            position: 0,
        }
    }

    /// Moves to the next position and returns it.
    pub fn advance(&mut self) -> u64 {
        if self.position == self.length {
            self.position = 0;
        }
        self.position += 1;
        self.position
    }

    /// The current position.
    pub fn get(&self) -> u64 {
        self.position
    }

    /// Returns to the position before the first.
    pub fn reset(&mut self) {
        self.position = 0;
    }

    #[allow(missing_docs)]
    pub fn length(&self) -> u64 {
        self.length
    }

    /// Changes the length without moving the position.
    pub fn set_length(&mut self, length: u64) {
        self.length = length;
    }

    /// Whether the next [Cycler::advance()] will wrap back to 1.
    pub fn is_at_end(&self) -> bool {
        self.position == self.length
    }
}
