//! Deterministic card generation.
//!
//! Every consumer that renders or validates a card must derive it from the
//! same index, so the generator reproduces a 32-bit mulberry mix bit-for-bit.

use super::{BALLS, BAND_WIDTH, CARD_COUNT, COLUMN_SEED_STRIDE, FREE_CELL, GRID};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A single square on a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Cell {
    Free,
    Number(u8),
}

impl Cell {
    /// Whether the cell counts as marked against a set of drawn numbers.
    pub fn is_marked(&self, drawn: &[bool; BALLS as usize + 1]) -> bool {
        match self {
            Cell::Free => true,
            Cell::Number(n) => drawn.get(*n as usize).copied().unwrap_or(false),
        }
    }

    pub fn number(&self) -> Option<u8> {
        match self {
            Cell::Free => None,
            Cell::Number(n) => Some(*n),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Free => serializer.serialize_str("FREE"),
            Cell::Number(n) => serializer.serialize_u8(*n),
        }
    }
}

impl<'de> Deserialize<'de> for Cell {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(u8),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Number(n) if (1..=BALLS).contains(&n) => Ok(Cell::Number(n)),
            Raw::Number(n) => Err(de::Error::custom(format!("cell out of range: {n}"))),
            Raw::Text(s) if s == "FREE" => Ok(Cell::Free),
            Raw::Text(s) => Err(de::Error::custom(format!("unexpected cell: {s}"))),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Free => f.write_str("FREE"),
            Cell::Number(n) => write!(f, "{n}"),
        }
    }
}

/// Clamp a requested card index into `1..=CARD_COUNT`.
pub fn clamp_index(raw: i64) -> u16 {
    raw.clamp(1, CARD_COUNT as i64) as u16
}

/// 32-bit mulberry generator yielding values in `[0, 1)`.
struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let s = self.state;
        let mut t = (s ^ (s >> 15)).wrapping_mul(1 | s);
        t = t.wrapping_add((t ^ (t >> 7)).wrapping_mul(61 | t)) ^ t;
        ((t ^ (t >> 14)) as f64) / 4_294_967_296.0
    }

    fn shuffle<T>(&mut self, values: &mut [T]) {
        for i in (1..values.len()).rev() {
            let j = (self.next_f64() * (i + 1) as f64) as usize;
            values.swap(i, j);
        }
    }
}

/// A 5x5 card, stored row-major.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Card([[Cell; GRID]; GRID]);

impl Card {
    /// Generate the card for `index`, clamping it into range first.
    pub fn generate(index: i64) -> Self {
        let seed = clamp_index(index) as u32;
        let mut grid = [[Cell::Free; GRID]; GRID];
        for col in 0..GRID {
            let low = 1 + BAND_WIDTH * col as u8;
            let mut band: Vec<u8> = (low..low + BAND_WIDTH).collect();
            Mulberry32::new(seed + col as u32 * COLUMN_SEED_STRIDE).shuffle(&mut band);
            for (row, value) in band.iter().take(GRID).enumerate() {
                grid[row][col] = Cell::Number(*value);
            }
        }
        grid[FREE_CELL][FREE_CELL] = Cell::Free;
        Card(grid)
    }

    pub fn cell(&self, row: usize, col: usize) -> Cell {
        self.0[row][col]
    }

    pub fn rows(&self) -> &[[Cell; GRID]; GRID] {
        &self.0
    }

    /// The 24 numbers on the card in row-major order.
    pub fn numbers(&self) -> Vec<u8> {
        self.0
            .iter()
            .flat_map(|row| row.iter().filter_map(Cell::number))
            .collect()
    }

    pub fn contains(&self, number: u8) -> bool {
        self.0
            .iter()
            .any(|row| row.iter().any(|cell| *cell == Cell::Number(number)))
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for row in &self.0 {
            let line: Vec<String> = row.iter().map(|c| format!("{c:>4}")).collect();
            writeln!(f, "{}", line.join(""))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const F: Cell = Cell::Free;

    fn grid(rows: [[u8; 5]; 5]) -> Card {
        let mut out = [[Cell::Free; GRID]; GRID];
        for (r, row) in rows.iter().enumerate() {
            for (c, n) in row.iter().enumerate() {
                out[r][c] = if *n == 0 { F } else { Cell::Number(*n) };
            }
        }
        Card(out)
    }

    #[test]
    fn test_mulberry_sequence() {
        let mut rng = Mulberry32::new(1);
        assert_eq!(rng.next_f64(), 0.6270739405881613);
        assert_eq!(rng.next_f64(), 0.002735721180215478);
        assert_eq!(rng.next_f64(), 0.5274470399599522);
    }

    #[test]
    fn test_known_cards() {
        assert_eq!(
            Card::generate(1),
            grid([
                [4, 27, 35, 49, 66],
                [5, 24, 42, 60, 74],
                [14, 28, 0, 53, 71],
                [2, 26, 36, 50, 65],
                [13, 16, 43, 48, 64],
            ])
        );
        assert_eq!(
            Card::generate(2),
            grid([
                [9, 18, 38, 48, 72],
                [8, 24, 43, 54, 70],
                [2, 26, 0, 57, 69],
                [11, 29, 33, 46, 65],
                [13, 27, 37, 60, 66],
            ])
        );
        assert_eq!(
            Card::generate(7),
            grid([
                [7, 30, 42, 60, 64],
                [11, 26, 34, 48, 65],
                [3, 18, 0, 56, 69],
                [14, 27, 40, 52, 63],
                [8, 22, 36, 59, 73],
            ])
        );
        assert_eq!(
            Card::generate(200),
            grid([
                [6, 26, 45, 47, 68],
                [1, 23, 39, 53, 61],
                [12, 28, 0, 57, 70],
                [4, 20, 35, 56, 75],
                [10, 30, 33, 50, 66],
            ])
        );
    }

    #[test]
    fn test_clamping() {
        assert_eq!(clamp_index(0), 1);
        assert_eq!(clamp_index(-40), 1);
        assert_eq!(clamp_index(999), 200);
        assert_eq!(Card::generate(0), Card::generate(1));
        assert_eq!(Card::generate(999), Card::generate(200));
    }

    #[test]
    fn test_every_card_well_formed() {
        for index in 1..=CARD_COUNT as i64 {
            let card = Card::generate(index);
            assert_eq!(card, Card::generate(index));
            assert_eq!(card.cell(FREE_CELL, FREE_CELL), Cell::Free);

            let numbers = card.numbers();
            assert_eq!(numbers.len(), 24);
            let mut unique = numbers.clone();
            unique.sort_unstable();
            unique.dedup();
            assert_eq!(unique.len(), 24);

            for col in 0..GRID {
                let low = 1 + 15 * col as u8;
                for row in 0..GRID {
                    if let Cell::Number(n) = card.cell(row, col) {
                        assert!((low..low + 15).contains(&n));
                    }
                }
            }
        }
    }

    #[test]
    fn test_cell_serde() {
        let json = serde_json::to_string(&Card::generate(1).rows()[2]).unwrap();
        assert_eq!(json, "[14,28,\"FREE\",53,71]");
        let card: Card = serde_json::from_str(&serde_json::to_string(&Card::generate(9)).unwrap())
            .unwrap();
        assert_eq!(card, Card::generate(9));
        assert!(serde_json::from_str::<Cell>("76").is_err());
        assert!(serde_json::from_str::<Cell>("\"X\"").is_err());
    }
}
