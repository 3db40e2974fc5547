use thiserror::Error;

use crate::jet::DerivativeOrder;

/// ライブラリ全体で使用するエラー型。
#[derive(Debug, Error)]
pub enum PinnError {
    /// 構築時の設定値が不正です（層数、定義域、境界条件の種類、サンプル数など）。
    #[error("不正な設定です: {reason}")]
    Configuration { reason: String },

    /// 追跡していない階数の微分を要求しました。
    #[error("{requested:?} の微分を要求しましたが、入力は {available:?} までしか追跡していません")]
    Differentiation {
        requested: DerivativeOrder,
        available: DerivativeOrder,
    },

    /// 呼び出し側の契約違反です（例: 厳密解なしで L2 誤差を要求）。
    #[error("呼び出し契約違反: {reason}")]
    CallerContract { reason: String },

    #[error("モデルの保存・読み込みに失敗しました: {0}")]
    Record(#[from] burn::record::RecorderError),

    #[error("設定ファイルの読み込みに失敗しました: {0}")]
    Config(#[from] burn::config::ConfigError),

    #[error("テンソルデータの取り出しに失敗しました: {0:?}")]
    Data(burn::tensor::DataError),

    #[error("グラフの描画に失敗しました: {0}")]
    Plot(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PinnError {
    pub(crate) fn configuration(reason: impl Into<String>) -> Self {
        Self::Configuration {
            reason: reason.into(),
        }
    }

    pub(crate) fn caller_contract(reason: impl Into<String>) -> Self {
        Self::CallerContract {
            reason: reason.into(),
        }
    }
}

impl From<burn::tensor::DataError> for PinnError {
    fn from(err: burn::tensor::DataError) -> Self {
        Self::Data(err)
    }
}

pub type Result<T> = std::result::Result<T, PinnError>;
