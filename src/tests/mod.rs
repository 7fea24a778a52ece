mod puzzle_robustness_unit;
