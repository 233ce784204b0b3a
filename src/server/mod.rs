// region:    --- Imports
use crate::auction::AuctionService;
use crate::commands::{self, Outcome};
use crate::notification::NotificationQueue;
use crate::storage::model::{User, UserId};
use crate::storage::Storage;
use crate::transaction_log::TransactionLog;
use crate::user_service::UserService;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info};
// endregion: --- Imports

/// 접속 인사말. 첫 응답으로 사용자 이름을 기대한다.
pub const GREETING: &str = "Welcome to Sundris Auction House, stranger! How can I call you?";

// 한 번의 read가 커맨드 한 건이다. 256바이트를 넘는 요청이나
// 한 read에 담긴 여러 커맨드는 지원하지 않는다 (개행 버퍼링 없음).
const MAX_REQUEST_BYTES: usize = 256;

// region:    --- Connection Registry
/// 알림 전송용 소켓 쓰기 핸들
///
/// 커맨드 태스크와 알림 태스크가 같은 소켓에 쓰므로 비동기 뮤텍스로 감싸고,
/// 연결 종료와 경쟁해도 쓰기 도중 핸들이 사라지지 않도록 `Arc`로 공유한다.
pub type SharedWriter = Arc<tokio::sync::Mutex<OwnedWriteHalf>>;

/// 접속 중인 사용자 id -> 소켓 쓰기 핸들 매핑
#[derive(Default)]
pub struct ConnectionRegistry {
    sockets: Mutex<HashMap<UserId, SharedWriter>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: UserId, writer: SharedWriter) {
        let Ok(mut sockets) = self.sockets.lock() else {
            return;
        };
        sockets.insert(user_id, writer);
    }

    pub fn remove(&self, user_id: UserId) {
        let Ok(mut sockets) = self.sockets.lock() else {
            return;
        };
        sockets.remove(&user_id);
    }

    pub fn get(&self, user_id: UserId) -> Option<SharedWriter> {
        let Ok(sockets) = self.sockets.lock() else {
            return None;
        };
        sockets.get(&user_id).cloned()
    }
}
// endregion: --- Connection Registry

// region:    --- Shared State
/// 모든 태스크가 공유하는 프로세스 수준 자원
pub struct SharedState {
    // 사용자와 아이템의 영속 저장소
    pub storage: Arc<Storage>,
    // 아이템 관련 핵심 로직
    pub auction_service: AuctionService,
    // 사용자 관련 핵심 로직
    pub user_service: UserService,
    // 모든 아이템 작업의 거래 로그
    pub transaction_log: TransactionLog,
    // 체결된 판매 주문 알림 큐
    pub notifications: NotificationQueue,
    // 알림 전송용 소켓 레지스트리
    pub sockets: ConnectionRegistry,
}

impl SharedState {
    pub fn new(storage: Arc<Storage>, transaction_log: TransactionLog) -> Self {
        let auction_service = AuctionService::new(Arc::clone(&storage));
        let user_service = UserService::new(Arc::clone(&storage));
        Self {
            storage,
            auction_service,
            user_service,
            transaction_log,
            notifications: NotificationQueue::new(),
            sockets: ConnectionRegistry::new(),
        }
    }
}
// endregion: --- Shared State

// region:    --- Server

/// 접속 수락 루프. 연결마다 로그인 태스크를 띄운다.
pub async fn serve(listener: TcpListener, state: Arc<SharedState>) {
    loop {
        match listener.accept().await {
            Ok((socket, addr)) => {
                info!("{:<12} --> 새 연결: {}", "Server", addr);
                tokio::spawn(process_client_login(socket, Arc::clone(&state)));
            }
            Err(e) => {
                error!("{:<12} --> 연결 수락 실패: {}", "Server", e);
            }
        }
    }
}

/// 로그인 태스크: 인사말 전송, 이름 수신, 로그인 후 커맨드 태스크 생성
async fn process_client_login(mut socket: TcpStream, state: Arc<SharedState>) {
    if let Err(e) = socket.write_all(GREETING.as_bytes()).await {
        error!("{:<12} --> 인사말 전송 실패: {}", "Server", e);
        return;
    }

    let mut buffer = [0u8; MAX_REQUEST_BYTES];
    let n = match socket.read(&mut buffer).await {
        Ok(0) => return,
        Ok(n) => n,
        Err(e) => {
            error!("{:<12} --> 사용자 이름 수신 실패: {}", "Server", e);
            return;
        }
    };
    let username = String::from_utf8_lossy(&buffer[..n]).trim().to_string();

    let user = match state.user_service.login(&username).await {
        Ok(user) => user,
        Err(e) => {
            let response = format!("Failed to login as '{username}': {e}");
            let _ = socket.write_all(response.as_bytes()).await;
            // 소켓이 드롭되며 연결도 닫힌다
            return;
        }
    };

    let response = format!("Successfully logged in as {}", user.username);
    if let Err(e) = socket.write_all(response.as_bytes()).await {
        error!("{:<12} --> 로그인 응답 전송 실패: {}", "Server", e);
        return;
    }
    info!(
        "{:<12} --> 사용자 '{}' 로그인, id={}",
        "Server", user.username, user.id
    );

    tokio::spawn(process_user_commands(socket, user, state));
}

/// 커맨드 태스크: 요청을 읽고 디스패처의 응답을 돌려보내는 루프
async fn process_user_commands(socket: TcpStream, user: User, state: Arc<SharedState>) {
    let (mut reader, writer) = socket.into_split();
    let writer = Arc::new(tokio::sync::Mutex::new(writer));
    state.sockets.insert(user.id, Arc::clone(&writer));

    let mut buffer = [0u8; MAX_REQUEST_BYTES];
    loop {
        let n = match reader.read(&mut buffer).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                info!(
                    "{:<12} --> 사용자 '{}'(id={})의 연결이 닫힘: {}",
                    "Server", user.username, user.id, e
                );
                break;
            }
        };
        let request = String::from_utf8_lossy(&buffer[..n]);

        match commands::process_request(&user, &state, request.trim()).await {
            Outcome::Reply(response) => {
                let mut writer = writer.lock().await;
                if writer.write_all(response.as_bytes()).await.is_err() {
                    break;
                }
            }
            Outcome::Disconnect => break,
        }
    }

    state.sockets.remove(user.id);
    info!(
        "{:<12} --> 사용자 '{}'(id={}) 연결 종료",
        "Server", user.username, user.id
    );
}

// endregion: --- Server
