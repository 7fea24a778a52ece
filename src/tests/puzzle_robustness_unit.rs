use rand::{Rng, SeedableRng};
use rand::rngs::StdRng;
use crate::puzzle::{Position, Puzzle};
use crate::shuffle;
use ntest::test_case;

fn assert_consistent(puzzle: &Puzzle) {
    let len = puzzle.size();
    assert_eq!(puzzle.grid.len(), len);
    assert!(puzzle.grid.iter().all(|row| row.len() == len));
    assert_eq!(puzzle.grid.iter().flatten().filter(|p| p.empty).count(), 1);
    assert!(puzzle.piece(puzzle.next).unwrap().empty);
    assert_eq!(puzzle.completed, puzzle.is_solved());
}

#[test_case(1)]
#[test_case(3)]
#[test_case(5)]
fn test_random_targets_never_break_the_board(level: u8) {
    let mut rng = StdRng::seed_from_u64(level as u64 * 31);
    let mut puzzle = shuffle::scrambled(level, 60);
    let len = puzzle.size();

    for _ in 0..500 {
        // Include out-of-bounds coordinates.
        let target = Position::new(rng.gen_range(0..len + 2), rng.gen_range(0..len + 2));
        let before = puzzle.clone();
        let valid = puzzle.is_valid_move(target);
        let moved = puzzle.move_piece(target);

        assert_eq!(moved, valid);
        if moved {
            assert_eq!(puzzle.next, target);
        } else {
            assert_eq!(puzzle, before);
        }
        assert_consistent(&puzzle);
    }
}

#[test]
fn test_inverse_moves_solve_a_shuffle() {
    let mut rng = StdRng::seed_from_u64(2024);
    let mut puzzle = Puzzle::generate(3, 60);
    let start = puzzle.next;
    let trail = shuffle::shuffle(&mut puzzle, &mut rng);
    assert_consistent(&puzzle);

    // Walk the empty cell back through every position it came from.
    let mut path = vec![start];
    path.extend(trail.iter().copied());
    path.pop();
    for target in path.into_iter().rev() {
        assert!(puzzle.move_piece(target));
    }

    let solved = Puzzle::generate(3, 60);
    assert!(puzzle.completed);
    assert_eq!(puzzle.grid, solved.grid);
    assert_eq!(puzzle.next, solved.next);
}

#[test]
fn test_completion_only_when_every_piece_is_home() {
    let mut puzzle = Puzzle::generate(2, 60);
    assert!(puzzle.is_solved());

    assert!(puzzle.move_piece(Position::new(3, 0)));
    assert!(!puzzle.completed);
    assert!(puzzle.move_piece(Position::new(0, 0)));
    assert!(!puzzle.completed);
    assert!(puzzle.move_piece(Position::new(3, 0)));
    assert!(!puzzle.completed);
    assert!(puzzle.move_piece(Position::new(3, 3)));
    assert!(puzzle.completed);
}

#[test]
fn test_shuffle_rarely_leaves_board_solved() {
    let mut rng = StdRng::seed_from_u64(77);
    let solved = (0..50)
        .filter(|_| {
            let mut puzzle = Puzzle::generate(4, 60);
            shuffle::shuffle(&mut puzzle, &mut rng);
            puzzle.completed
        })
        .count();
    assert!(solved < 5);
}
