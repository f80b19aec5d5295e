use super::GRID;
use serde::{Deserialize, Serialize};

/// Wire name of a winning line.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    FourCorners,
    Row,
    #[serde(rename = "col")]
    Column,
    #[serde(rename = "diag_main")]
    MainDiagonal,
    #[serde(rename = "diag_anti")]
    AntiDiagonal,
}

/// A winning line on a card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Pattern {
    FourCorners,
    Row(u8),
    Column(u8),
    MainDiagonal,
    AntiDiagonal,
}

impl Pattern {
    /// All patterns, in the order a claim is checked.
    pub const ALL: [Pattern; 13] = [
        Pattern::FourCorners,
        Pattern::Row(0),
        Pattern::Row(1),
        Pattern::Row(2),
        Pattern::Row(3),
        Pattern::Row(4),
        Pattern::Column(0),
        Pattern::Column(1),
        Pattern::Column(2),
        Pattern::Column(3),
        Pattern::Column(4),
        Pattern::MainDiagonal,
        Pattern::AntiDiagonal,
    ];

    pub fn kind(&self) -> PatternKind {
        match self {
            Pattern::FourCorners => PatternKind::FourCorners,
            Pattern::Row(_) => PatternKind::Row,
            Pattern::Column(_) => PatternKind::Column,
            Pattern::MainDiagonal => PatternKind::MainDiagonal,
            Pattern::AntiDiagonal => PatternKind::AntiDiagonal,
        }
    }

    pub fn row(&self) -> Option<u8> {
        match self {
            Pattern::Row(r) => Some(*r),
            _ => None,
        }
    }

    pub fn col(&self) -> Option<u8> {
        match self {
            Pattern::Column(c) => Some(*c),
            _ => None,
        }
    }

    /// Coordinates (row, col) that must all be marked.
    pub fn cells(&self) -> Vec<(usize, usize)> {
        let last = GRID - 1;
        match *self {
            Pattern::FourCorners => vec![(0, 0), (0, last), (last, 0), (last, last)],
            Pattern::Row(r) => (0..GRID).map(|c| (r as usize, c)).collect(),
            Pattern::Column(c) => (0..GRID).map(|r| (r, c as usize)).collect(),
            Pattern::MainDiagonal => (0..GRID).map(|i| (i, i)).collect(),
            Pattern::AntiDiagonal => (0..GRID).map(|i| (i, last - i)).collect(),
        }
    }
}
