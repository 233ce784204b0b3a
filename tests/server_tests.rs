use auction_house::database::DatabaseManager;
use auction_house::scheduler::AuctionScheduler;
use auction_house::server::{self, SharedState};
use auction_house::storage::Storage;
use auction_house::transaction_log::TransactionLog;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::{timeout, Duration};

/// 인메모리 상태로 임시 포트에 서버를 띄운다
async fn spawn_server(test_name: &str) -> (SocketAddr, Arc<SharedState>) {
    let db_manager = DatabaseManager::open_in_memory()
        .await
        .expect("인메모리 데이터베이스 열기 실패");
    let storage = Arc::new(Storage::open(db_manager).await.expect("저장소 열기 실패"));
    let log_path = std::env::temp_dir().join(format!(
        "auction-house-{}-{}.log",
        test_name,
        std::process::id()
    ));
    let transaction_log = TransactionLog::open(&log_path).expect("거래 로그 열기 실패");
    let state = Arc::new(SharedState::new(storage, transaction_log));

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("바인드 실패");
    let addr = listener.local_addr().expect("주소 조회 실패");
    tokio::spawn(server::serve(listener, Arc::clone(&state)));
    (addr, state)
}

/// 서버 응답 한 건 읽기 (한 read가 한 응답)
async fn read_response(socket: &mut TcpStream) -> String {
    let mut buffer = [0u8; 1024];
    let n = timeout(Duration::from_secs(5), socket.read(&mut buffer))
        .await
        .expect("응답 대기 시간 초과")
        .expect("응답 읽기 실패");
    String::from_utf8_lossy(&buffer[..n]).to_string()
}

async fn send(socket: &mut TcpStream, line: &str) {
    socket.write_all(line.as_bytes()).await.expect("요청 전송 실패");
}

/// 접속하고 로그인까지 마친 소켓 반환
async fn connect_as(addr: SocketAddr, username: &str) -> TcpStream {
    let mut socket = TcpStream::connect(addr).await.expect("접속 실패");
    let greeting = read_response(&mut socket).await;
    assert_eq!(greeting, server::GREETING);

    send(&mut socket, username).await;
    let response = read_response(&mut socket).await;
    assert_eq!(response, format!("Successfully logged in as {username}"));
    socket
}

#[tokio::test]
async fn login_and_basic_commands() {
    let (addr, _state) = spawn_server("login-and-basic").await;
    let mut socket = connect_as(addr, "alice").await;

    // 개행으로 끝나는 요청도 한 커맨드로 처리된다
    send(&mut socket, "ping\n").await;
    assert_eq!(read_response(&mut socket).await, "pong");

    send(&mut socket, "whoami").await;
    assert_eq!(read_response(&mut socket).await, "alice");

    send(&mut socket, "deposit funds 10").await;
    assert_eq!(
        read_response(&mut socket).await,
        "Successfully deposited 10 funds(s)"
    );

    send(&mut socket, "view_items").await;
    assert_eq!(read_response(&mut socket).await, "Items: funds(10)");
}

#[tokio::test]
async fn quit_closes_the_connection() {
    let (addr, _state) = spawn_server("quit-closes").await;
    let mut socket = connect_as(addr, "bob").await;

    send(&mut socket, "quit").await;

    // 서버가 연결을 닫으면 read는 0을 반환한다
    let mut buffer = [0u8; 16];
    let n = timeout(Duration::from_secs(5), socket.read(&mut buffer))
        .await
        .expect("연결 종료 대기 시간 초과")
        .expect("읽기 실패");
    assert_eq!(n, 0);
}

#[tokio::test]
async fn empty_username_is_rejected() {
    let (addr, _state) = spawn_server("empty-username").await;
    let mut socket = TcpStream::connect(addr).await.expect("접속 실패");
    let _greeting = read_response(&mut socket).await;

    // 공백뿐인 이름은 거부된다
    send(&mut socket, "   \n").await;
    let response = read_response(&mut socket).await;
    assert!(response.starts_with("Failed to login as ''"));
}

/// 즉시 구매가 일어나면 접속 중인 판매자가 알림을 받는다
#[tokio::test]
async fn seller_is_notified_after_immediate_trade() {
    let (addr, state) = spawn_server("seller-notified").await;

    // 알림 틱 시작 (만료 틱 포함)
    let scheduler = AuctionScheduler::new(Arc::clone(&state));
    scheduler.start();

    let mut seller = connect_as(addr, "alice").await;
    let mut buyer = connect_as(addr, "bob").await;

    send(&mut seller, "deposit funds 100").await;
    read_response(&mut seller).await;
    send(&mut seller, "deposit sword 10").await;
    read_response(&mut seller).await;
    send(&mut seller, "sell sword 2 2").await;
    assert_eq!(
        read_response(&mut seller).await,
        "Successfully placed sell order for 2 sword(s)"
    );

    send(&mut buyer, "deposit funds 20").await;
    read_response(&mut buyer).await;
    send(&mut buyer, "buy 1").await;
    assert_eq!(
        read_response(&mut buyer).await,
        "Successfully bought sell order #1 for 2 funds"
    );

    // 다음 알림 틱에 판매자 소켓으로 전달된다
    let notification = read_response(&mut seller).await;
    assert_eq!(notification, "Your sell order #1 was executed for 2 funds");
}
