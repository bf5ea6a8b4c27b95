//! 協調的キャンセルと統計スナップショット要求
//!
//! SIGINT/SIGTERM はキャンセルトークンを立てるだけ、SIGUSR1 はスナップショット要求フラグを
//! 立てるだけで、ハンドラ内では他の処理をしない。実際の中断はエンジン側が決まった地点で
//! トークンをポーリングして行う。

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// SIGINT による中断時の終了コード (128 + 2)
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// シグナルハンドラ登録エラー
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("failed to install termination handler: {0}")]
    Termination(#[from] ctrlc::Error),
    #[error("failed to install SIGUSR1 handler: {0}")]
    Snapshot(#[source] std::io::Error),
}

/// キャンセルトークン
///
/// クローンは同じフラグを共有する。
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
    snapshot: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// キャンセルが要求されたか
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// キャンセルを要求する
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// 統計スナップショットを要求する (キャンセルには影響しない)
    pub fn request_snapshot(&self) {
        self.snapshot.store(true, Ordering::SeqCst);
    }

    /// スナップショット要求を取り出してクリアする
    pub fn take_snapshot_request(&self) -> bool {
        self.snapshot.swap(false, Ordering::SeqCst)
    }
}

/// SIGINT/SIGTERM でトークンを立てるハンドラを登録する
///
/// プロセスにつき1回だけ登録できる。
pub fn register_cancel(token: &CancelToken) -> Result<(), SignalError> {
    let flag = Arc::clone(&token.cancelled);
    ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))?;
    Ok(())
}

/// SIGUSR1 でスナップショット要求を立てるハンドラを登録する
pub fn register_snapshot(token: &CancelToken) -> Result<(), SignalError> {
    signal_hook::flag::register(signal_hook::consts::SIGUSR1, Arc::clone(&token.snapshot))
        .map_err(SignalError::Snapshot)?;
    Ok(())
}

/// 全シグナルハンドラを登録したトークンを返す
pub fn install_handlers() -> Result<CancelToken, SignalError> {
    let token = CancelToken::new();
    register_cancel(&token)?;
    register_snapshot(&token)?;
    log::debug!("signal handlers installed");
    Ok(token)
}
