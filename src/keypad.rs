//! Keypad layout
//!
//! The lock screen shows the ten digits in a fresh random order on every visit
//! so that touch positions do not leak the code. Only the layout lives here;
//! drawing it is up to the host.

use crate::types::KeySymbol;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

const DIGITS: [KeySymbol; 10] = ['0', '1', '2', '3', '4', '5', '6', '7', '8', '9'];

/// Slot indices per displayed row, top to bottom. The last row holds a single
/// key between the honeypot and backspace keys.
const ROW_SLOTS: [&[usize]; 4] = [&[6, 7, 8], &[3, 4, 5], &[0, 1, 2], &[9]];

/// Ten digit keys in slot order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keypad {
    keys: [KeySymbol; 10],
}

impl Default for Keypad {
    fn default() -> Self {
        Self { keys: DIGITS }
    }
}

impl Keypad {
    /// Digits in a random order
    pub fn shuffled<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let mut keys = DIGITS;
        keys.shuffle(rng);
        Self { keys }
    }

    /// Digits in slot order
    pub fn keys(&self) -> &[KeySymbol] {
        &self.keys
    }

    /// Displayed rows, top to bottom
    pub fn rows(&self) -> Vec<Vec<KeySymbol>> {
        ROW_SLOTS
            .iter()
            .map(|slots| slots.iter().map(|&slot| self.keys[slot]).collect())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_default_layout_rows() {
        let rows = Keypad::default().rows();
        assert_eq!(
            rows,
            vec![
                vec!['6', '7', '8'],
                vec!['3', '4', '5'],
                vec!['0', '1', '2'],
                vec!['9'],
            ]
        );
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..20 {
            let keypad = Keypad::shuffled(&mut rng);
            let mut keys = keypad.keys().to_vec();
            keys.sort_unstable();
            assert_eq!(keys, DIGITS.to_vec());
            assert_eq!(keypad.rows().iter().map(Vec::len).sum::<usize>(), 10);
        }
    }

    #[test]
    fn test_shuffle_varies_layout() {
        let mut rng = StdRng::seed_from_u64(42);
        let layouts: Vec<Keypad> = (0..10).map(|_| Keypad::shuffled(&mut rng)).collect();
        assert!(layouts.iter().any(|k| k != &layouts[0]));
    }
}
