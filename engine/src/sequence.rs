//! Draw order and the time-indexed view of what has been called.

use rand::{seq::SliceRandom, Rng};
use std::collections::HashSet;
use tombola_types::{Card, GameSession, BALLS, RECENT_CALLS};

/// A uniformly random permutation of 1..=75.
pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Vec<u8> {
    let mut sequence: Vec<u8> = (1..=BALLS).collect();
    sequence.shuffle(rng);
    sequence
}

/// The card's numbers in row-major order, then the rest shuffled.
pub fn biased<R: Rng + ?Sized>(card: &Card, rng: &mut R) -> Vec<u8> {
    let mut seen = HashSet::new();
    let mut sequence: Vec<u8> = card.numbers().into_iter().filter(|n| seen.insert(*n)).collect();
    let mut rest: Vec<u8> = (1..=BALLS).filter(|n| !seen.contains(n)).collect();
    rest.shuffle(rng);
    sequence.extend(rest);
    sequence
}

/// Calls made in a session at some instant.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calls {
    pub current: Option<u8>,
    pub recent: Vec<u8>,
    pub count: usize,
    pub called: Vec<u8>,
}

/// Number of calls made `now`: one immediately at run start, then one per interval.
pub fn call_count(session: &GameSession, now: u64, interval_ms: u64) -> usize {
    match step(session, now, interval_ms) {
        Some(step) => step + 1,
        None => 0,
    }
}

fn step(session: &GameSession, now: u64, interval_ms: u64) -> Option<usize> {
    let since = session.run_started_at?;
    if session.sequence.is_empty() {
        return None;
    }
    // A finished session's calls stop where it finished
    let at = session.finished_at.map_or(now, |f| f.min(now));
    let step = (at.saturating_sub(since) / interval_ms.max(1)) as usize;
    Some(step.min(session.sequence.len() - 1))
}

pub fn calls(session: &GameSession, now: u64, interval_ms: u64) -> Calls {
    let Some(step) = step(session, now, interval_ms) else {
        return Calls::default();
    };
    let sequence = &session.sequence;
    let from = (step + 1).saturating_sub(RECENT_CALLS);
    Calls {
        current: Some(sequence[step]),
        recent: sequence[from..=step].to_vec(),
        count: step + 1,
        called: sequence[..=step].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    fn running(sequence: Vec<u8>, since: u64) -> GameSession {
        let mut session = GameSession::new(1, 10, 0);
        session.countdown_started_at = Some(0);
        session.run_started_at = Some(since);
        session.sequence = sequence;
        session
    }

    #[test]
    fn test_shuffled_is_permutation() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut sequence = shuffled(&mut rng);
        assert_eq!(sequence.len(), 75);
        sequence.sort_unstable();
        assert_eq!(sequence, (1..=75).collect::<Vec<u8>>());
    }

    #[test]
    fn test_biased_front_loads_card() {
        let mut rng = StdRng::seed_from_u64(7);
        let card = Card::generate(1);
        let sequence = biased(&card, &mut rng);
        assert_eq!(&sequence[..24], card.numbers().as_slice());
        assert_eq!(&sequence[..5], &[4, 27, 35, 49, 66]);

        let mut sorted = sequence.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, (1..=75).collect::<Vec<u8>>());
    }

    #[test]
    fn test_calls_follow_clock() {
        let session = running((1..=75).collect(), 10_000);
        let interval = 3_000;

        // First number is called at run start
        let at_start = calls(&session, 10_000, interval);
        assert_eq!(at_start.current, Some(1));
        assert_eq!(at_start.count, 1);
        assert_eq!(at_start.recent, vec![1]);

        // 2.999s later nothing new
        assert_eq!(call_count(&session, 12_999, interval), 1);

        let later = calls(&session, 10_000 + 6 * 3_000 + 500, interval);
        assert_eq!(later.current, Some(7));
        assert_eq!(later.count, 7);
        assert_eq!(later.recent, vec![3, 4, 5, 6, 7]);
        assert_eq!(later.called, (1..=7).collect::<Vec<u8>>());

        // Clamped to the sequence length
        let end = calls(&session, 10_000 + 500 * 3_000, interval);
        assert_eq!(end.count, 75);
        assert_eq!(end.current, Some(75));
    }

    #[test]
    fn test_no_calls_before_run() {
        let session = GameSession::new(1, 10, 0);
        assert_eq!(calls(&session, 99_999, 3_000), Calls::default());
        assert_eq!(call_count(&session, 99_999, 3_000), 0);
    }

    #[test]
    fn test_finished_session_freezes_calls() {
        let mut session = running((1..=75).collect(), 0);
        session.finished = true;
        session.finished_at = Some(9_000);
        assert_eq!(call_count(&session, 60_000, 3_000), 4);
    }
}
