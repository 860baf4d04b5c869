// アプリケーション層モジュール
pub mod mastering_handler;

// 再エクスポート
pub use mastering_handler::{
    BatchResult, MasteringHandler, PipelineError, PipelineSettings, REFERENCE_KEY, render_master,
};
