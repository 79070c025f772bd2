//! Rock-paper-scissors outcome rules.

use skirmish_protocol::{Choice, Outcome};

/// Returns `true` if `a` beats `b`.
///
/// Rock beats scissors, scissors beats paper, paper beats rock.
pub fn beats(a: Choice, b: Choice) -> bool {
    matches!(
        (a, b),
        (Choice::Rock, Choice::Scissors)
            | (Choice::Scissors, Choice::Paper)
            | (Choice::Paper, Choice::Rock)
    )
}

/// Resolves one round. Returns each side's outcome, first player first.
pub fn resolve(a: Choice, b: Choice) -> (Outcome, Outcome) {
    let outcome = if a == b {
        Outcome::Draw
    } else if beats(a, b) {
        Outcome::Win
    } else {
        Outcome::Lose
    };
    (outcome, outcome.flip())
}

/// The overall game result from round win counts: more wins wins,
/// equal counts draw.
pub fn overall(wins_a: u32, wins_b: u32) -> (Outcome, Outcome) {
    let outcome = match wins_a.cmp(&wins_b) {
        std::cmp::Ordering::Greater => Outcome::Win,
        std::cmp::Ordering::Less => Outcome::Lose,
        std::cmp::Ordering::Equal => Outcome::Draw,
    };
    (outcome, outcome.flip())
}
