//! # 学習セッション
//!
//! ミニバッチごとに 順伝播 → 損失 → 逆伝播 → パラメータ更新 を行い、
//! エポックの終わりに検証損失（と任意で L2 誤差）を記録して停止判定を行います。

use std::time::{Duration, Instant};

use burn::config::Config;
use burn::module::AutodiffModule;
use burn::optim::{AdamConfig, GradientsParams, Optimizer};
use burn::tensor::ElementConversion;
use burn::tensor::backend::AutodiffBackend;
use log::{Level, info, log};
use rand::rngs::StdRng;

use crate::data::{CollocationLoader, rng_from_seed};
use crate::error::{PinnError, Result as PinnResult};
use crate::evaluation::{l2_error, sample_loss};
use crate::model::{Approximator, ApproximatorConfig};
use crate::problem::{OdeProblem, Rhs};
use crate::schedule::{EpochDecision, StepDecay, decide};

/// 学習のハイパーパラメータ。
#[derive(Config)]
pub struct TrainingConfig {
    pub optimizer: AdamConfig,
    /// 内部のコロケーション点の総数。
    #[config(default = 1000)]
    pub num_samples: usize,
    #[config(default = 32)]
    pub batch_size: usize,
    #[config(default = 1e-3)]
    pub learning_rate: f64,
    /// 何エポックごとに学習率を減衰させるか。
    #[config(default = 100)]
    pub lr_step_size: usize,
    /// これ以下になると学習率の減衰を止めます。
    #[config(default = 5e-4)]
    pub min_lr: f64,
    #[config(default = 0.5)]
    pub lr_gamma: f64,
    /// 検証損失がこれを下回ると収束とみなします。
    #[config(default = 1e-4)]
    pub abs_tolerance: f64,
    #[config(default = 3000)]
    pub max_epochs: usize,
    /// エポックごとに厳密解との L2 誤差を記録するか。
    #[config(default = false)]
    pub compute_l2: bool,
    /// 進捗を `info` レベルで表示するか（`false` なら `debug`）。
    #[config(default = true)]
    pub display: bool,
    pub seed: Option<u64>,
}

impl TrainingConfig {
    pub fn validate(&self) -> PinnResult<()> {
        let fail = |reason: &str| Err(PinnError::configuration(reason));
        if self.num_samples == 0 {
            return fail("学習サンプル数は 1 以上が必要です");
        }
        if self.batch_size == 0 {
            return fail("バッチサイズは 1 以上が必要です");
        }
        if self.lr_step_size == 0 {
            return fail("学習率の減衰間隔は 1 以上が必要です");
        }
        if !(self.learning_rate > 0.0) {
            return fail("学習率は正である必要があります");
        }
        if !(self.lr_gamma > 0.0 && self.lr_gamma <= 1.0) {
            return fail("学習率の減衰率は (0, 1] の範囲である必要があります");
        }
        if self.max_epochs == 0 {
            return fail("最大エポック数は 1 以上が必要です");
        }
        Ok(())
    }

    /// 検証に使うサンプル数 `⌊num_samples / 3⌋`（最低 1）。
    pub fn validation_samples(&self) -> usize {
        (self.num_samples / 3).max(1)
    }
}

/// エポックごとの損失の記録。学習中は追記のみです。
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    train_loss: Vec<f64>,
    validate_loss: Vec<f64>,
    l2_loss: Vec<f64>,
}

impl TrainingHistory {
    pub fn train_loss(&self) -> &[f64] {
        &self.train_loss
    }

    pub fn validate_loss(&self) -> &[f64] {
        &self.validate_loss
    }

    pub fn l2_loss(&self) -> &[f64] {
        &self.l2_loss
    }

    pub fn len(&self) -> usize {
        self.validate_loss.len()
    }

    pub fn is_empty(&self) -> bool {
        self.validate_loss.is_empty()
    }
}

/// 学習が終了した理由。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    Converged,
    Plateau,
    MaxEpochs,
}

#[derive(Debug, Clone)]
pub struct TrainingReport {
    pub stop_reason: StopReason,
    pub epochs: usize,
    pub final_lr: f64,
    pub elapsed: Duration,
}

/// 1 つの問題と 1 つのモデルを学習するセッション。モデルのパラメータはセッションが占有します。
pub struct TrainingSession<B: AutodiffBackend, R: Rhs> {
    problem: OdeProblem<R>,
    model: Approximator<B>,
    history: TrainingHistory,
    rng: StdRng,
    device: B::Device,
}

impl<B: AutodiffBackend, R: Rhs> TrainingSession<B, R> {
    pub fn new(problem: OdeProblem<R>, model: Approximator<B>, device: B::Device) -> Self {
        Self {
            problem,
            model,
            history: TrainingHistory::default(),
            rng: rng_from_seed(None),
            device,
        }
    }

    pub fn from_config(problem: OdeProblem<R>, config: &ApproximatorConfig, device: B::Device) -> PinnResult<Self> {
        let model = config.init::<B>(&device)?;
        Ok(Self::new(problem, model, device))
    }

    pub fn problem(&self) -> &OdeProblem<R> {
        &self.problem
    }

    pub fn model(&self) -> &Approximator<B> {
        &self.model
    }

    pub fn into_model(self) -> Approximator<B> {
        self.model
    }

    pub fn history(&self) -> &TrainingHistory {
        &self.history
    }

    /// 新しく引いた `sample_num` 点で検証損失を計算します。
    pub fn validate(&mut self, sample_num: usize, seed: Option<u64>) -> PinnResult<f64> {
        let model = self.model.valid();
        match seed {
            Some(seed) => sample_loss(&self.problem, &model, sample_num, &mut rng_from_seed(Some(seed)), &self.device),
            None => sample_loss(&self.problem, &model, sample_num, &mut self.rng, &self.device),
        }
    }

    /// 検証と同じ損失をテスト用サンプルで計算し、結果を表示します。
    pub fn test(&mut self, sample_num: usize, seed: Option<u64>) -> PinnResult<f64> {
        let test_loss = self.validate(sample_num, seed)?;
        info!("Test set: Avg. Test Sample Loss: {:.4e}", test_loss);
        Ok(test_loss)
    }

    /// 厳密解との L2 誤差。
    pub fn l2_error(&self, exact: Option<&dyn Fn(f64) -> f64>) -> PinnResult<f64> {
        l2_error(&self.problem, &self.model.valid(), exact, &self.device)
    }

    /// 学習を実行します。
    ///
    /// `config.compute_l2` が真の場合は `exact` が必須です。
    pub fn train(&mut self, config: &TrainingConfig, exact: Option<&dyn Fn(f64) -> f64>) -> PinnResult<TrainingReport> {
        config.validate()?;
        if config.compute_l2 && exact.is_none() {
            return Err(PinnError::caller_contract(
                "compute_l2 を指定した場合は厳密解を渡す必要があります",
            ));
        }
        if config.seed.is_some() {
            self.rng = rng_from_seed(config.seed);
        }

        let mut loader = CollocationLoader::new(
            self.problem.domain(),
            config.num_samples,
            config.batch_size,
            &mut self.rng,
        )?;
        let n_batches = loader.num_batches();
        let report_every = report_interval(n_batches);
        let level = if config.display { Level::Info } else { Level::Debug };

        let mut optim = config.optimizer.init();
        let mut scheduler = StepDecay::new(config.learning_rate, config.lr_step_size, config.lr_gamma);
        let mut stop_reason = StopReason::MaxEpochs;
        let mut epochs = 0;
        let training_start = Instant::now();

        for epoch in 1..=config.max_epochs {
            log!(level, "-------------------- Epoch [{}/{}] --------------------", epoch, config.max_epochs);

            let mut train_loss = 0.0;
            let batches = loader.shuffled_batches::<B>(&mut self.rng, &self.device);
            for (i, x) in batches.into_iter().enumerate() {
                let loss = self.problem.loss(&self.model, x)?;
                let loss_value = loss.clone().into_scalar().elem::<f64>();

                // 勾配は backward ごとに新しく作られるため、前ステップの勾配を消す必要はありません。
                let grads = loss.backward();
                let grads = GradientsParams::from_grads(grads, &self.model);
                self.model = optim.step(scheduler.lr(), self.model.clone(), grads);
                train_loss += loss_value;

                if i == 0 || (i + 1) % report_every == 0 {
                    log!(
                        level,
                        "Epoch [{}/{}], Step [{}/{}], Loss: {:.4e}",
                        epoch,
                        config.max_epochs,
                        i + 1,
                        n_batches,
                        loss_value
                    );
                }
            }

            let model = self.model.valid();
            let validate_loss = sample_loss(
                &self.problem,
                &model,
                config.validation_samples(),
                &mut self.rng,
                &self.device,
            )?;
            self.history.validate_loss.push(validate_loss);
            self.history.train_loss.push(train_loss / n_batches as f64);
            if config.compute_l2 {
                self.history.l2_loss.push(l2_error(&self.problem, &model, exact, &self.device)?);
            }
            epochs = epoch;

            match self.history.l2_loss.last() {
                Some(l2) if config.compute_l2 => log!(
                    level,
                    "Epoch [{}/{}], Avg. Train Sample Loss: {:.4e}, Avg. Validate Sample Loss: {:.4e}, L2 Loss: {:.4e}",
                    epoch,
                    config.max_epochs,
                    train_loss / n_batches as f64,
                    validate_loss,
                    l2
                ),
                _ => log!(
                    level,
                    "Epoch [{}/{}], Avg. Train Sample Loss: {:.4e}, Avg. Validate Sample Loss: {:.4e}",
                    epoch,
                    config.max_epochs,
                    train_loss / n_batches as f64,
                    validate_loss
                ),
            }

            match decide(
                self.history.validate_loss(),
                config.abs_tolerance,
                scheduler.lr(),
                config.min_lr,
            ) {
                EpochDecision::Converged => {
                    stop_reason = StopReason::Converged;
                    break;
                }
                EpochDecision::Plateau => {
                    stop_reason = StopReason::Plateau;
                    break;
                }
                EpochDecision::DecayLearningRate => scheduler.step(),
                EpochDecision::Continue => {}
            }
        }

        let report = TrainingReport {
            stop_reason,
            epochs,
            final_lr: scheduler.lr(),
            elapsed: training_start.elapsed(),
        };
        info!(
            "学習が完了しました ({:?}, {} エポック, 学習率 {:.2e})。=> 学習時間: {:.2?}",
            report.stop_reason, report.epochs, report.final_lr, report.elapsed
        );
        Ok(report)
    }
}

/// ステップの進捗を表示する間隔（エポックあたり約 5 回）。
fn report_interval(n_batches: usize) -> usize {
    n_batches.div_ceil(5).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::{BoundaryCondition, Domain, LinearOde, LossWeights};
    use burn::backend::{Autodiff, NdArray};

    type TestBackend = Autodiff<NdArray<f32>>;

    fn session() -> TrainingSession<TestBackend, LinearOde> {
        let problem = OdeProblem::new(
            LinearOde::new(),
            Domain::new(0.0, 1.0).unwrap(),
            BoundaryCondition::DirichletDirichlet { lower: 0.0, upper: 1.0 },
            LossWeights::default(),
        );
        let model = ApproximatorConfig::new().with_width(8).with_depth(3);
        TrainingSession::from_config(problem, &model, Default::default()).unwrap()
    }

    #[test]
    fn step_progress_is_reported_about_five_times_per_epoch() {
        assert_eq!(report_interval(1), 1);
        assert_eq!(report_interval(2), 1);
        assert_eq!(report_interval(5), 1);
        assert_eq!(report_interval(6), 2);
        assert_eq!(report_interval(32), 7);
    }

    fn quick_config() -> TrainingConfig {
        TrainingConfig::new(AdamConfig::new())
            .with_num_samples(40)
            .with_batch_size(16)
            .with_learning_rate(1e-2)
            .with_display(false)
            .with_seed(Some(11))
    }

    #[test]
    fn history_grows_one_entry_per_epoch() {
        let mut session = session();
        assert!(session.history().is_empty());

        let report = session
            .train(&quick_config().with_max_epochs(3).with_abs_tolerance(0.0), None)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::MaxEpochs);
        assert_eq!(report.epochs, 3);
        assert_eq!(session.history().train_loss().len(), 3);
        assert_eq!(session.history().validate_loss().len(), 3);
        assert!(session.history().l2_loss().is_empty());
    }

    #[test]
    fn large_tolerance_converges_after_first_epoch() {
        let mut session = session();
        let report = session
            .train(&quick_config().with_abs_tolerance(f64::INFINITY), None)
            .unwrap();
        assert_eq!(report.stop_reason, StopReason::Converged);
        assert_eq!(report.epochs, 1);
    }

    #[test]
    fn l2_tracking_requires_exact_solution() {
        let mut session = session();
        let result = session.train(&quick_config().with_compute_l2(true), None);
        assert!(matches!(result, Err(PinnError::CallerContract { .. })));
        assert!(session.history().is_empty());

        let exact: &dyn Fn(f64) -> f64 = &|x| x;
        session
            .train(
                &quick_config().with_compute_l2(true).with_max_epochs(2).with_abs_tolerance(0.0),
                Some(exact),
            )
            .unwrap();
        assert_eq!(session.history().l2_loss().len(), 2);
    }

    #[test]
    fn learning_rate_decays_until_floor() {
        let mut session = session();
        let config = quick_config()
            .with_max_epochs(6)
            .with_abs_tolerance(0.0)
            .with_lr_step_size(1)
            .with_lr_gamma(0.5)
            .with_min_lr(2e-3);
        let report = session.train(&config, None).unwrap();
        // 1e-2 → 5e-3 → 2.5e-3 → 1.25e-3 で下限を下回り、以降は減衰しない
        approx::assert_relative_eq!(report.final_lr, 1.25e-3);
    }

    #[test]
    fn invalid_training_config_is_rejected() {
        let mut session = session();
        assert!(matches!(
            session.train(&quick_config().with_batch_size(0), None),
            Err(PinnError::Configuration { .. })
        ));
        assert!(session.train(&quick_config().with_num_samples(0), None).is_err());
        assert!(session.train(&quick_config().with_lr_step_size(0), None).is_err());
    }

    #[test]
    fn validate_is_deterministic_for_a_seed() {
        let mut session = session();
        let a = session.validate(30, Some(9)).unwrap();
        let b = session.validate(30, Some(9)).unwrap();
        assert_eq!(a, b);
        assert!(session.test(30, None).unwrap().is_finite());
    }
}
