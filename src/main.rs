// region:    --- Imports
use auction_house::cli::Cli;
use auction_house::database::DatabaseManager;
use auction_house::scheduler::AuctionScheduler;
use auction_house::server::{self, SharedState};
use auction_house::storage::Storage;
use auction_house::transaction_log::TransactionLog;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
// endregion: --- Imports

// region:    --- Main
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // logging 초기화
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .without_time()
        .with_target(false)
        .init();

    let cli = Cli::parse();

    // 데이터베이스 초기화
    let db_manager = match DatabaseManager::open(&cli.db_path).await {
        Ok(db_manager) => db_manager,
        Err(e) => {
            error!("{:<12} --> 데이터베이스 초기화 실패: {:?}", "Main", e);
            return Err(e.into());
        }
    };
    info!("{:<12} --> 데이터베이스 초기화 성공", "Main");

    // 저장소 열기 (funds 아이템 부트스트랩 포함)
    let storage = match Storage::open(db_manager).await {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
            error!("{:<12} --> 저장소 초기화 실패: {}", "Main", e);
            return Err(e.into());
        }
    };

    // 거래 로그 열기
    let transaction_log = match TransactionLog::open(&cli.log_path) {
        Ok(transaction_log) => transaction_log,
        Err(e) => {
            error!("{:<12} --> 거래 로그 초기화 실패: {}", "Main", e);
            return Err(e.into());
        }
    };

    let state = Arc::new(SharedState::new(storage, transaction_log));

    // 만료 처리와 알림 전달 스케줄러 시작
    let scheduler = AuctionScheduler::new(Arc::clone(&state));
    scheduler.start();

    // 리스너 생성
    let listener = TcpListener::bind(("0.0.0.0", cli.port)).await?;
    info!(
        "{:<12} --> Listening on {}",
        "Main",
        listener.local_addr()?
    );

    // 서버 실행 (ctrl-c로 종료)
    tokio::select! {
        _ = server::serve(listener, state) => {}
        _ = tokio::signal::ctrl_c() => {
            info!("{:<12} --> 종료 신호 수신, 서버를 종료합니다", "Main");
        }
    }
    Ok(())
}
// endregion: --- Main
