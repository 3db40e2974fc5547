//! # 物理情報ニューラルネットワーク (PINN) 境界値問題ソルバー
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`infer`（推論）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --scenario harmonic --l2
//! ```
//!
//! ### 推論
//! ```bash
//! cargo run --release -- infer
//! ```

use clap::Parser;
use log::error;
use ode_pinn::cli::{Cli, Commands};
use ode_pinn::{inference, training};
use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use std::process::ExitCode;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`または`infer`の処理に振り分けます。
fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logger(cli.log_level.into());

    let result = match &cli.command {
        Commands::Train(args) => training::run(args),
        Commands::Infer(args) => inference::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// 端末へのロガーを設定します。失敗した場合は標準エラーに一度だけ報告し、ログなしで続行します。
fn init_logger(level: LevelFilter) -> bool {
    match TermLogger::init(level, simplelog::Config::default(), TerminalMode::Mixed, ColorChoice::Auto) {
        Ok(()) => true,
        Err(e) => {
            eprintln!("ロガーを初期化できませんでした: {e}");
            false
        }
    }
}
