use std::path::PathBuf;

use burn::config::Config;
use burn::optim::AdamConfig;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::LevelFilter;

use crate::encoding::FourierFeaturesConfig;
use crate::error::Result;
use crate::model::ApproximatorConfig;
use crate::scenario::{ExperimentConfig, Scenario};
use crate::session::TrainingConfig;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A physics-informed neural network (PINN) solver for second-order boundary value ODEs with Burn", long_about = None)]
pub struct Cli {
    /// ログの出力レベル
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    pub log_level: LogLevel,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// 実行するサブコマンドを定義します（train または infer）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、結果をファイルに保存します
    Train(TrainArgs),
    /// 保存されたPINNモデルを使い、推論を実行します
    Infer(InferArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// 解く例題
    #[arg(long, value_enum, default_value_t = Scenario::Linear)]
    pub scenario: Scenario,

    /// 実験設定 (JSON)。指定するとその他の問題・モデル・学習の引数は無視されます
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// 隠れ層の幅
    #[arg(long, default_value_t = 20)]
    pub width: usize,

    /// 入力層と出力層を含む層の数 (3 以上)
    #[arg(long, default_value_t = 4)]
    pub depth: usize,

    /// フーリエ特徴量の数。指定しなければ特徴量変換は使いません
    #[arg(long)]
    pub fourier_features: Option<usize>,

    #[arg(long, default_value_t = 0.0)]
    pub fourier_center: f64,

    #[arg(long, default_value_t = 1.0)]
    pub fourier_spread: f64,

    #[arg(long, default_value_t = 1000)]
    pub num_samples: usize,

    #[arg(long, default_value_t = 32)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 1e-3)]
    pub learning_rate: f64,

    #[arg(long, default_value_t = 100)]
    pub lr_step_size: usize,

    #[arg(long, default_value_t = 5e-4)]
    pub min_lr: f64,

    #[arg(long, default_value_t = 0.5)]
    pub lr_gamma: f64,

    #[arg(long, default_value_t = 1e-4)]
    pub abs_tolerance: f64,

    #[arg(long, default_value_t = 3000)]
    pub max_epochs: usize,

    /// エポックごとに厳密解との L2 誤差を記録します
    #[arg(long)]
    pub l2: bool,

    /// 進捗を debug レベルに下げます
    #[arg(long)]
    pub quiet: bool,

    #[arg(long)]
    pub seed: Option<u64>,

    /// モデル・設定・損失グラフの保存先
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,
}

impl TrainArgs {
    /// 引数（または `--config` のファイル）から実験設定を組み立てます。
    pub fn experiment(&self) -> Result<ExperimentConfig> {
        if let Some(path) = &self.config {
            return Ok(ExperimentConfig::load(path)?);
        }
        let features = self.fourier_features.map(|num_features| {
            FourierFeaturesConfig::new()
                .with_num_features(num_features)
                .with_center(self.fourier_center)
                .with_spread(self.fourier_spread)
        });
        let model = ApproximatorConfig::new()
            .with_width(self.width)
            .with_depth(self.depth)
            .with_features(features);
        let training = TrainingConfig::new(AdamConfig::new())
            .with_num_samples(self.num_samples)
            .with_batch_size(self.batch_size)
            .with_learning_rate(self.learning_rate)
            .with_lr_step_size(self.lr_step_size)
            .with_min_lr(self.min_lr)
            .with_lr_gamma(self.lr_gamma)
            .with_abs_tolerance(self.abs_tolerance)
            .with_max_epochs(self.max_epochs)
            .with_compute_l2(self.l2)
            .with_display(!self.quiet)
            .with_seed(self.seed);
        Ok(ExperimentConfig::new(self.scenario.problem(), model, training).with_scenario(Some(self.scenario)))
    }
}

#[derive(Args, Debug)]
pub struct InferArgs {
    /// 学習時に保存したモデルと設定のディレクトリ
    #[arg(long, default_value = "artifacts")]
    pub artifact_dir: PathBuf,

    /// 推論に使う等間隔格子の点数
    #[arg(long, default_value_t = 11)]
    pub points: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::BoundaryCondition;

    #[test]
    fn train_arguments_build_experiment() {
        let cli = Cli::parse_from([
            "ode-pinn",
            "train",
            "--scenario",
            "constant",
            "--depth",
            "3",
            "--fourier-features",
            "8",
            "--max-epochs",
            "10",
            "--seed",
            "4",
        ]);
        let Commands::Train(args) = cli.command else {
            panic!("expected train subcommand");
        };
        let experiment = args.experiment().unwrap();
        assert_eq!(experiment.scenario, Some(Scenario::Constant));
        assert_eq!(experiment.model.depth, 3);
        assert_eq!(experiment.model.features.as_ref().map(|f| f.num_features), Some(8));
        assert_eq!(experiment.training.max_epochs, 10);
        assert_eq!(experiment.training.seed, Some(4));
        assert_eq!(
            experiment.problem.build().unwrap().boundary(),
            BoundaryCondition::DirichletNeumann { lower: 1.0, upper: 0.0 }
        );
    }

    #[test]
    fn log_level_is_global() {
        let cli = Cli::parse_from(["ode-pinn", "infer", "--log-level", "debug", "--points", "5"]);
        assert_eq!(LevelFilter::from(cli.log_level), LevelFilter::Debug);
        assert!(matches!(cli.command, Commands::Infer(InferArgs { points: 5, .. })));
    }
}
