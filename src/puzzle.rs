use serde::{Deserialize, Serialize};

/// A cell coordinate, 0-indexed from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub column: usize,
}

impl Position {
    pub fn new(row: usize, column: usize) -> Self {
        Position { row, column }
    }
}

/// One cell of the grid. `position` is where the piece sits in the solved layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Piece {
    pub position: Position,
    pub empty: bool,
}

impl Piece {
    pub fn new(position: Position) -> Self {
        Piece { position, empty: false }
    }
}

/// The line a slide travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Line {
    Row(usize),
    Column(usize),
}

/// A single player's board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Puzzle {
    pub grid: Vec<Vec<Piece>>,
    pub next: Position,
    pub completed: bool,
    /// Seconds budget granted when the puzzle was started; also the cache TTL.
    pub time: u64,
    /// Bumped on every write to the puzzle store.
    #[serde(default)]
    pub revision: u64,
}

impl Puzzle {
    /// Builds the solved layout for a level: `level + 2` pieces per side, the
    /// bottom-right piece empty.
    pub fn generate(level: u8, time: u64) -> Puzzle {
        let len = level as usize + 2;
        let mut grid: Vec<Vec<Piece>> = (0..len)
            .map(|row| {
                (0..len)
                    .map(|column| Piece::new(Position::new(row, column)))
                    .collect()
            })
            .collect();

        let index = len - 1;
        grid[index][index].empty = true;

        Puzzle {
            grid,
            next: Position::new(index, index),
            completed: false,
            time,
            revision: 0,
        }
    }

    pub fn size(&self) -> usize {
        self.grid.len()
    }

    pub fn piece(&self, position: Position) -> Option<&Piece> {
        self.grid.get(position.row)?.get(position.column)
    }

    pub fn in_bounds(&self, position: Position) -> bool {
        position.row < self.size() && position.column < self.size()
    }

    /// A target is playable when it is on the board, shares exactly one axis with
    /// the empty cell and is not the empty cell itself.
    pub fn is_valid_move(&self, target: Position) -> bool {
        if !self.in_bounds(target) || target == self.next {
            return false;
        }
        (target.row == self.next.row) ^ (target.column == self.next.column)
    }

    /// Slides every piece between the empty cell and `target` one step toward the
    /// empty cell. Invalid targets leave the puzzle untouched and return `false`.
    pub fn move_piece(&mut self, target: Position) -> bool {
        if !self.is_valid_move(target) {
            return false;
        }
        self.slide_empty_to(target);
        self.completed = self.is_solved();
        true
    }

    /// True when every piece sits at its original coordinates.
    pub fn is_solved(&self) -> bool {
        self.grid.iter().enumerate().all(|(row, pieces)| {
            pieces
                .iter()
                .enumerate()
                .all(|(column, piece)| piece.position == Position::new(row, column))
        })
    }

    /// A square grid with a single empty cell, and `next` pointing at it.
    /// Moves on anything else would index outside the grid.
    pub fn is_well_formed(&self) -> bool {
        let size = self.size();
        size > 0
            && self.grid.iter().all(|row| row.len() == size)
            && self.piece(self.next).is_some_and(|piece| piece.empty)
            && self.grid.iter().flatten().filter(|piece| piece.empty).count() == 1
    }

    /// Conveyor shift of the empty cell to `target`. Caller guarantees colinearity.
    pub(crate) fn slide_empty_to(&mut self, target: Position) {
        let line = if target.row == self.next.row {
            Line::Row(target.row)
        } else {
            Line::Column(target.column)
        };
        let (from, to) = match line {
            Line::Row(_) => (self.next.column, target.column),
            Line::Column(_) => (self.next.row, target.row),
        };
        self.rotate(line, from, to);
        self.next = target;
    }

    fn rotate(&mut self, line: Line, from: usize, to: usize) {
        let empty = *self.cell(line, from);
        let mut i = from;
        while i != to {
            let step = if to > i { i + 1 } else { i - 1 };
            *self.cell_mut(line, i) = *self.cell(line, step);
            i = step;
        }
        *self.cell_mut(line, to) = empty;
    }

    fn cell(&self, line: Line, index: usize) -> &Piece {
        match line {
            Line::Row(row) => &self.grid[row][index],
            Line::Column(column) => &self.grid[index][column],
        }
    }

    fn cell_mut(&mut self, line: Line, index: usize) -> &mut Piece {
        match line {
            Line::Row(row) => &mut self.grid[row][index],
            Line::Column(column) => &mut self.grid[index][column],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::test_case;

    fn original(puzzle: &Puzzle, row: usize, column: usize) -> Position {
        puzzle.grid[row][column].position
    }

    #[test_case(1)]
    #[test_case(2)]
    #[test_case(3)]
    #[test_case(4)]
    #[test_case(5)]
    fn test_generate_solved_grid(level: u8) {
        let puzzle = Puzzle::generate(level, 600);
        let len = level as usize + 2;

        assert_eq!(puzzle.size(), len);
        assert!(puzzle.grid.iter().all(|row| row.len() == len));
        assert_eq!(puzzle.grid.iter().flatten().filter(|p| p.empty).count(), 1);
        assert!(puzzle.grid[len - 1][len - 1].empty);
        assert_eq!(puzzle.next, Position::new(len - 1, len - 1));
        assert!(puzzle.is_solved());
        assert!(!puzzle.completed);
        assert_eq!(puzzle.time, 600);
    }

    #[test]
    fn test_move_along_row_shifts_toward_old_empty() {
        let mut puzzle = Puzzle::generate(2, 60);
        // empty at (3, 3); pull it to (3, 0)
        assert!(puzzle.move_piece(Position::new(3, 0)));

        assert_eq!(puzzle.next, Position::new(3, 0));
        assert!(puzzle.grid[3][0].empty);
        assert_eq!(original(&puzzle, 3, 1), Position::new(3, 0));
        assert_eq!(original(&puzzle, 3, 2), Position::new(3, 1));
        assert_eq!(original(&puzzle, 3, 3), Position::new(3, 2));
        // other rows untouched
        assert_eq!(original(&puzzle, 2, 0), Position::new(2, 0));
        assert!(!puzzle.completed);
    }

    #[test]
    fn test_move_along_column_shifts_toward_old_empty() {
        let mut puzzle = Puzzle::generate(1, 60);
        assert!(puzzle.move_piece(Position::new(0, 2)));

        assert_eq!(puzzle.next, Position::new(0, 2));
        assert!(puzzle.grid[0][2].empty);
        assert_eq!(original(&puzzle, 1, 2), Position::new(0, 2));
        assert_eq!(original(&puzzle, 2, 2), Position::new(1, 2));
    }

    #[test]
    fn test_move_single_step_is_swap() {
        let mut puzzle = Puzzle::generate(1, 60);
        assert!(puzzle.move_piece(Position::new(2, 1)));
        assert!(puzzle.grid[2][1].empty);
        assert_eq!(original(&puzzle, 2, 2), Position::new(2, 1));
    }

    #[test]
    fn test_move_toward_higher_index() {
        let mut puzzle = Puzzle::generate(2, 60);
        puzzle.move_piece(Position::new(0, 3));
        assert!(puzzle.move_piece(Position::new(3, 3)));

        assert_eq!(puzzle.next, Position::new(3, 3));
        assert!(puzzle.is_solved());
        assert!(puzzle.completed);
    }

    #[test_case(0, 0)]
    #[test_case(1, 1)]
    #[test_case(2, 2)]
    #[test_case(2, 5)]
    #[test_case(9, 2)]
    fn test_invalid_moves_are_noops(row: usize, column: usize) {
        let mut puzzle = Puzzle::generate(1, 60);
        let before = puzzle.clone();

        assert!(!puzzle.move_piece(Position::new(row, column)));
        assert_eq!(puzzle, before);
    }

    #[test]
    fn test_round_trip_restores_solution() {
        let mut puzzle = Puzzle::generate(3, 60);
        puzzle.move_piece(Position::new(4, 1));
        puzzle.move_piece(Position::new(0, 1));
        assert!(!puzzle.completed);

        puzzle.move_piece(Position::new(4, 1));
        puzzle.move_piece(Position::new(4, 4));
        assert!(puzzle.completed);
    }

    #[test]
    fn test_single_transposition_is_not_solved() {
        let mut puzzle = Puzzle::generate(2, 60);
        let a = puzzle.grid[0][0];
        puzzle.grid[0][0] = puzzle.grid[0][1];
        puzzle.grid[0][1] = a;
        assert!(!puzzle.is_solved());
    }

    #[test]
    fn test_piece_lookup() {
        let puzzle = Puzzle::generate(1, 60);
        assert_eq!(puzzle.piece(Position::new(1, 2)).map(|p| p.position), Some(Position::new(1, 2)));
        assert!(puzzle.piece(Position::new(3, 0)).is_none());
    }

    #[test]
    fn test_puzzle_serde_defaults_revision() {
        let puzzle = Puzzle::generate(1, 60);
        let mut json = serde_json::to_value(&puzzle).unwrap();
        json.as_object_mut().unwrap().remove("revision");

        let parsed: Puzzle = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.revision, 0);
        assert_eq!(parsed.grid, puzzle.grid);
    }

    #[test]
    fn test_well_formed() {
        let mut puzzle = Puzzle::generate(2, 60);
        assert!(puzzle.is_well_formed());
        puzzle.move_piece(Position::new(0, 3));
        assert!(puzzle.is_well_formed());

        let mut ragged = puzzle.clone();
        ragged.grid[1].pop();
        assert!(!ragged.is_well_formed());

        let mut stray = puzzle.clone();
        stray.next = Position::new(9, 0);
        assert!(!stray.is_well_formed());

        let mut misplaced = puzzle.clone();
        misplaced.next = Position::new(1, 1);
        assert!(!misplaced.is_well_formed());

        let mut two_holes = puzzle.clone();
        two_holes.grid[2][2].empty = true;
        assert!(!two_holes.is_well_formed());

        let empty = Puzzle { grid: Vec::new(), ..puzzle };
        assert!(!empty.is_well_formed());
    }
}
