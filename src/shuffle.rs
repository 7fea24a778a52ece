use rand::Rng;
use crate::puzzle::{Position, Puzzle};

/// Scrambles a puzzle with `N²` legal slides, alternating between the empty
/// cell's column (even steps) and its row (odd steps).
///
/// Returns the empty cell's position after each step. Every step is a slide
/// along a shared line, so the result is always solvable.
pub fn shuffle<R: Rng + ?Sized>(puzzle: &mut Puzzle, rng: &mut R) -> Vec<Position> {
    let len = puzzle.size();
    let mut trail = Vec::with_capacity(len * len);

    for i in 0..len * len {
        let next = puzzle.next;
        let target = if i % 2 == 0 {
            Position::new(pick_other(rng, len, next.row), next.column)
        } else {
            Position::new(next.row, pick_other(rng, len, next.column))
        };
        puzzle.slide_empty_to(target);
        trail.push(target);
    }

    puzzle.completed = puzzle.is_solved();
    trail
}

/// Uniform index in `0..len` other than `current`.
fn pick_other<R: Rng + ?Sized>(rng: &mut R, len: usize, current: usize) -> usize {
    let pick = rng.gen_range(0..len - 1);
    if pick >= current { pick + 1 } else { pick }
}

/// Builds and scrambles a fresh puzzle for a level.
pub fn scrambled(level: u8, time: u64) -> Puzzle {
    let mut puzzle = Puzzle::generate(level, time);
    shuffle(&mut puzzle, &mut rand::thread_rng());
    puzzle
}
