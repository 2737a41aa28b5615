//! シード付き乱数モジュール
//!
//! 線形合同法（LCG）で再現可能な乱数列とシャッフルを提供する。
//! プラットフォームの乱数源には依存しないため、同じシードなら
//! どの環境でも同じ結果になる。
//!
//! 定数: `state' = (state * 9301 + 49297) mod 233280`

/// LCG乗数
pub const MULTIPLIER: u64 = 9301;
/// LCG増分
pub const INCREMENT: u64 = 49297;
/// LCG法
pub const MODULUS: u64 = 233_280;

/// 次の状態（入力シードは法で丸めてから計算する）
pub fn next_state(seed: u64) -> u64 {
    ((seed % MODULUS) * MULTIPLIER + INCREMENT) % MODULUS
}

/// シードから [0, 1) の値を1つ得る
pub fn next_from(seed: u64) -> f64 {
    next_state(seed) as f64 / MODULUS as f64
}

/// シード付き乱数生成器
#[derive(Debug, Clone)]
pub struct SeededRandom {
    state: u64,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self { state: seed % MODULUS }
    }

    /// 状態を1つ進めて返す
    pub fn next_raw(&mut self) -> u64 {
        self.state = next_state(self.state);
        self.state
    }

    pub fn next_f64(&mut self) -> f64 {
        self.next_raw() as f64 / MODULUS as f64
    }

    /// [0, n) の整数。n == 0 のときは0
    ///
    /// 浮動小数点を介さず `state * n / MODULUS` で計算する
    pub fn next_below(&mut self, n: usize) -> usize {
        if n == 0 {
            return 0;
        }
        (self.next_raw() * n as u64 / MODULUS) as usize
    }
}

/// シード付きシャッフル（Fisher-Yates、末尾から）
///
/// 入力は変更せず、並べ替えたコピーを返す。
///
/// # Examples
/// ```
/// use paperfold_common::random::shuffle;
///
/// let a = shuffle(&[1, 2, 3, 4, 5], 42);
/// let b = shuffle(&[1, 2, 3, 4, 5], 42);
/// assert_eq!(a, b);
/// ```
pub fn shuffle<T: Clone>(items: &[T], seed: u64) -> Vec<T> {
    let mut shuffled = items.to_vec();
    let mut rng = SeededRandom::new(seed);

    for i in (1..shuffled.len()).rev() {
        let j = rng.next_below(i + 1);
        shuffled.swap(i, j);
    }

    shuffled
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_next_state_known_values() {
        // 0 -> 49297, 49297 -> (49297*9301+49297) mod 233280
        assert_eq!(next_state(0), 49297);
        assert_eq!(next_state(49297), (49297 * 9301 + 49297) % 233_280);
    }

    #[test]
    fn test_seed_wraps_by_modulus() {
        assert_eq!(next_state(5), next_state(5 + MODULUS));
        assert_eq!(next_state(u64::MAX), next_state(u64::MAX % MODULUS));
    }

    #[test]
    fn test_next_from_range() {
        for seed in [0, 1, 42, 233_279, 1_000_000, u64::MAX] {
            let v = next_from(seed);
            assert!((0.0..1.0).contains(&v), "seed {} -> {}", seed, v);
        }
    }

    #[test]
    fn test_shuffle_empty_and_single() {
        assert!(shuffle::<u32>(&[], 7).is_empty());
        assert_eq!(shuffle(&["only"], 7), vec!["only"]);
    }

    #[test]
    fn test_shuffle_does_not_touch_input() {
        let input = vec![1, 2, 3, 4];
        let _ = shuffle(&input, 99);
        assert_eq!(input, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_shuffle_different_seeds_differ() {
        let input: Vec<u32> = (0..20).collect();
        assert_ne!(shuffle(&input, 1), shuffle(&input, 2));
    }

    proptest! {
        #[test]
        fn prop_shuffle_is_deterministic(seed in any::<u64>(), input in proptest::collection::vec(any::<u16>(), 0..64)) {
            prop_assert_eq!(shuffle(&input, seed), shuffle(&input, seed));
        }

        #[test]
        fn prop_shuffle_is_permutation(seed in any::<u64>(), input in proptest::collection::vec(any::<u16>(), 0..64)) {
            let mut a = shuffle(&input, seed);
            let mut b = input.clone();
            a.sort_unstable();
            b.sort_unstable();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn prop_next_below_in_range(seed in any::<u64>(), n in 1usize..1000) {
            let mut rng = SeededRandom::new(seed);
            for _ in 0..16 {
                prop_assert!(rng.next_below(n) < n);
            }
        }
    }
}
