//! Convolution rules for binary life-like automata.
//!
//! A rule maps a 3x3 neighborhood to the next state of its center cell.

use serde::{Deserialize, Serialize};

/// Row-major 3x3 neighborhood. Index 4 is the cell itself.
pub type Neighborhood = [bool; 9];

/// Pure neighborhood -> next-state function.
pub type Convolution = fn(&Neighborhood) -> bool;

/// Index of the center cell within a [`Neighborhood`].
pub const CENTER: usize = 4;

/// Count live cells in the neighborhood, excluding the center.
#[inline]
pub fn live_neighbors(n: &Neighborhood) -> u32 {
    n.iter()
        .enumerate()
        .filter(|&(i, &alive)| i != CENTER && alive)
        .count() as u32
}

/// Standard Game of Life (B3/S23).
#[inline]
pub fn conway(n: &Neighborhood) -> bool {
    let count = live_neighbors(n);
    if n[CENTER] {
        count == 2 || count == 3
    } else {
        count == 3
    }
}

/// Life with a wider survival band (B3/S1234).
#[inline]
pub fn wide_survival(n: &Neighborhood) -> bool {
    let count = live_neighbors(n);
    if n[CENTER] {
        (1..=4).contains(&count)
    } else {
        count == 3
    }
}

/// Growth-only crystallization: live cells persist, dead cells are born
/// next to exactly one live cell.
#[inline]
pub fn crystal(n: &Neighborhood) -> bool {
    n[CENTER] || live_neighbors(n) == 1
}

/// Named rule selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rule {
    #[default]
    Conway,
    WideSurvival,
    Crystal,
}

impl Rule {
    /// Resolve to the underlying convolution function.
    pub fn convolution(self) -> Convolution {
        match self {
            Rule::Conway => conway,
            Rule::WideSurvival => wide_survival,
            Rule::Crystal => crystal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_neighbors(center: bool, count: usize) -> Neighborhood {
        let mut n = [false; 9];
        n[CENTER] = center;
        for i in (0..9).filter(|&i| i != CENTER).take(count) {
            n[i] = true;
        }
        n
    }

    #[test]
    fn test_conway_survival() {
        for count in 0..=8 {
            let expected = count == 2 || count == 3;
            assert_eq!(conway(&with_neighbors(true, count)), expected, "count {count}");
        }
    }

    #[test]
    fn test_conway_birth() {
        for count in 0..=8 {
            assert_eq!(conway(&with_neighbors(false, count)), count == 3, "count {count}");
        }
    }

    #[test]
    fn test_center_not_counted() {
        assert_eq!(live_neighbors(&with_neighbors(true, 0)), 0);
        assert_eq!(live_neighbors(&[true; 9]), 8);
    }

    #[test]
    fn test_wide_survival_band() {
        assert!(wide_survival(&with_neighbors(true, 1)));
        assert!(wide_survival(&with_neighbors(true, 4)));
        assert!(!wide_survival(&with_neighbors(true, 5)));
        assert!(!wide_survival(&with_neighbors(false, 2)));
    }

    #[test]
    fn test_crystal_never_shrinks() {
        for count in 0..=8 {
            assert!(crystal(&with_neighbors(true, count)));
        }
        assert!(crystal(&with_neighbors(false, 1)));
        assert!(!crystal(&with_neighbors(false, 2)));
    }

    #[test]
    fn test_rule_resolution() {
        let three = with_neighbors(false, 3);
        assert!((Rule::Conway.convolution())(&three));
        assert!(!(Rule::Crystal.convolution())(&three));
    }
}
