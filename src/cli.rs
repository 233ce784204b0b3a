use clap::Parser;
use std::path::PathBuf;

/// Sundris Auction House server
///
/// 예시: server 3000 db.sqlite transaction.log
#[derive(Debug, Parser)]
#[command(name = "server")]
pub struct Cli {
    /// 수신 대기할 TCP 포트
    pub port: u16,

    /// SQLite 데이터베이스 파일 경로 (없으면 생성)
    pub db_path: PathBuf,

    /// 추가 전용 거래 로그 파일 경로 (없으면 생성)
    pub log_path: PathBuf,
}
