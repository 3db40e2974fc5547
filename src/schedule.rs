//! # 学習率の減衰と停止判定

/// 相対変化がこの値未満で連続すると停滞とみなします。
pub const PLATEAU_RELATIVE_CHANGE: f64 = 1e-4;
/// 停滞判定に使う直近のエポック間変化の数。
pub const PLATEAU_WINDOW: usize = 25;

/// `step_size` 回の `step()` ごとに学習率へ `gamma` を掛けるステップ減衰。
#[derive(Debug, Clone)]
pub struct StepDecay {
    lr: f64,
    step_size: usize,
    gamma: f64,
    steps: usize,
}

impl StepDecay {
    pub fn new(initial_lr: f64, step_size: usize, gamma: f64) -> Self {
        Self {
            lr: initial_lr,
            step_size,
            gamma,
            steps: 0,
        }
    }

    pub fn lr(&self) -> f64 {
        self.lr
    }

    pub fn step(&mut self) {
        self.steps += 1;
        if self.steps % self.step_size == 0 {
            self.lr *= self.gamma;
        }
    }
}

/// エポック終了時の判定結果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EpochDecision {
    /// 検証損失が絶対許容誤差を下回った。
    Converged,
    /// 検証損失の変化が停滞した。
    Plateau,
    /// 学習率の減衰を 1 ステップ進めて続行。
    DecayLearningRate,
    /// 学習率が下限に達しているので減衰せずに続行。
    Continue,
}

/// 直近 `PLATEAU_WINDOW + 1` 個の検証損失について、新しい順に隣り合う値の相対変化がすべて
/// `PLATEAU_RELATIVE_CHANGE` 未満かどうか。
pub fn is_plateau(validation_loss: &[f64]) -> bool {
    if validation_loss.len() < PLATEAU_WINDOW + 1 {
        return false;
    }
    let recent = &validation_loss[validation_loss.len() - (PLATEAU_WINDOW + 1)..];
    recent
        .windows(2)
        .all(|pair| ((pair[0] - pair[1]) / pair[1]).abs() < PLATEAU_RELATIVE_CHANGE)
}

/// エポックごとの停止判定。優先順位は 許容誤差 → 停滞 → 学習率の減衰 → 続行 です。
pub fn decide(validation_loss: &[f64], abs_tolerance: f64, lr: f64, min_lr: f64) -> EpochDecision {
    match validation_loss.last() {
        Some(&latest) if latest < abs_tolerance => EpochDecision::Converged,
        _ if is_plateau(validation_loss) => EpochDecision::Plateau,
        _ if lr > min_lr => EpochDecision::DecayLearningRate,
        _ => EpochDecision::Continue,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn step_decay_multiplies_every_step_size_calls() {
        let mut decay = StepDecay::new(1e-2, 3, 0.5);
        let lrs = (0..7)
            .map(|_| {
                decay.step();
                decay.lr()
            })
            .collect::<Vec<_>>();
        assert_relative_eq!(lrs[1], 1e-2);
        assert_relative_eq!(lrs[2], 5e-3);
        assert_relative_eq!(lrs[4], 5e-3);
        assert_relative_eq!(lrs[5], 2.5e-3);
        assert_relative_eq!(lrs[6], 2.5e-3);
    }

    #[test]
    fn tolerance_wins_over_everything() {
        let history = vec![1.0; 40];
        assert_eq!(decide(&history, 2.0, 1.0, 0.0), EpochDecision::Converged);
        assert_eq!(decide(&[5e-5], 1e-4, 1.0, 0.0), EpochDecision::Converged);
    }

    #[test]
    fn plateau_triggers_regardless_of_tolerance() {
        // 相対変化 5e-5 で 26 個
        let history = (0..26).map(|i| 0.3 * (1.0 - 5e-5_f64).powi(i)).collect::<Vec<_>>();
        assert!(is_plateau(&history));
        assert_eq!(decide(&history, 1e-12, 1.0, 0.1), EpochDecision::Plateau);
    }

    #[test]
    fn plateau_needs_twenty_six_samples() {
        let history = vec![0.5; 25];
        assert!(!is_plateau(&history));
        assert_eq!(decide(&history, 1e-4, 1.0, 0.1), EpochDecision::DecayLearningRate);
    }

    #[test]
    fn single_large_change_in_window_prevents_plateau() {
        let mut history = vec![0.5; 30];
        history[20] = 0.6;
        assert!(!is_plateau(&history));
        // 変化がウィンドウの外なら停滞
        let mut history = vec![0.5; 30];
        history[2] = 0.6;
        assert!(is_plateau(&history));
    }

    #[test]
    fn learning_rate_floor_stops_decay() {
        let history = vec![1.0, 0.5];
        assert_eq!(decide(&history, 1e-4, 1e-3, 5e-4), EpochDecision::DecayLearningRate);
        assert_eq!(decide(&history, 1e-4, 5e-4, 5e-4), EpochDecision::Continue);
        assert_eq!(decide(&history, 1e-4, 1e-4, 5e-4), EpochDecision::Continue);
    }
}
