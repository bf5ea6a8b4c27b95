//! 同一内容のファイルをハードリンクに置き換えて容量を回収するライブラリ

pub mod app;
pub mod cli;
pub mod compare;
pub mod config;
pub mod dedup;
pub mod hardlink;
pub mod i18n;
pub mod index;
pub mod logging;
pub mod record;
pub mod scanner;
pub mod select;
pub mod signal;
