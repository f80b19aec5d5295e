//! Winning-line detection.

use tombola_types::{Card, Pattern, BALLS};

/// Membership table indexed by ball number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Marks([bool; BALLS as usize + 1]);

impl Marks {
    pub fn new(numbers: &[u8]) -> Self {
        let mut marks = [false; BALLS as usize + 1];
        for n in numbers {
            if let Some(slot) = marks.get_mut(*n as usize) {
                *slot = true;
            }
        }
        Marks(marks)
    }
}

/// First pattern, in precedence order, whose cells are all free or marked.
pub fn validate(card: &Card, marks: &Marks) -> Option<Pattern> {
    Pattern::ALL.into_iter().find(|pattern| {
        pattern
            .cells()
            .into_iter()
            .all(|(r, c)| card.cell(r, c).is_marked(&marks.0))
    })
}
