// ============================
// crates/backend-lib/src/bracket.rs
// ============================
//! Single-elimination bracket generation.

use rand::{seq::SliceRandom, Rng};
use soundclash_common::{Bracket, BracketPair, BracketSlot, Submission};

/// Draw a first round from current standings.
///
/// Selection is deterministic: submissions are ranked by hearts
/// descending with a stable sort, so equal-heart entries keep their
/// submission order at the cut line. Fields shorter than `bracket_size`
/// are padded with byes. The padded field is then Fisher-Yates shuffled
/// and paired off `(0,1), (2,3), ...` — re-drawing over identical input
/// intentionally yields a fresh pairing.
///
/// `bracket_size` must be even and at least 2; config validation
/// enforces that before a session starts.
pub fn generate_bracket<R: Rng + ?Sized>(
    submissions: &[Submission],
    bracket_size: usize,
    rng: &mut R,
) -> Bracket {
    let mut ranked: Vec<&Submission> = submissions.iter().collect();
    ranked.sort_by_key(|s| std::cmp::Reverse(s.hearts));

    let mut slots: Vec<BracketSlot> = ranked
        .into_iter()
        .take(bracket_size)
        .map(BracketSlot::from)
        .collect();
    slots.resize_with(bracket_size, BracketSlot::bye);

    slots.shuffle(rng);

    let mut pairs = Vec::with_capacity(bracket_size / 2);
    let mut slots = slots.into_iter();
    while let (Some(left), Some(right)) = (slots.next(), slots.next()) {
        pairs.push(BracketPair { left, right });
    }

    Bracket { pairs }
}
