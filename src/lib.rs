//! # 物理情報ニューラルネットワーク (PINN) による 2 階常微分方程式ソルバー
//!
//! `burn` フレームワークを使用して、区間 `[lb, ub]` 上の境界値問題
//! `y'' = f(x, y, y')` を、ラベル付きデータなしで解くための主要なコンポーネントを提供します。
//! 損失は内部点での方程式の残差と、ペナルティとして課す境界条件の項の和です。

pub mod cli;
pub mod data;
pub mod encoding;
pub mod error;
pub mod evaluation;
pub mod inference;
pub mod jet;
pub mod model;
pub mod pinn;
pub mod problem;
pub mod scenario;
pub mod schedule;
pub mod session;
pub mod training;

pub use error::{PinnError, Result};

/// モデルを保存するファイル名
pub const MODEL_FILENAME: &str = "ode_pinn_model.mpk";
/// 実験設定を保存するファイル名
pub const CONFIG_FILENAME: &str = "experiment.json";
/// 損失グラフを保存するファイル名
pub const LOSS_PLOT_FILENAME: &str = "loss_graph.png";
