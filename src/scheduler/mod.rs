/// 주기 작업 스케줄러
///
/// 만료 틱은 만료된 판매 주문을 정산하고, 알림 틱은 큐에 쌓인 알림을
/// 접속 중인 판매자의 소켓으로 전달한다. 두 틱 모두 1초 주기이며
/// 한 틱의 실패는 로그만 남기고 다음 틱에서 계속한다.
// region:    --- Imports
use crate::notification::Notification;
use crate::server::SharedState;
use chrono::Utc;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::time::{interval, Duration};
use tracing::{debug, error};

// endregion: --- Imports

// region:    --- Auction Scheduler
/// 경매 만료 처리와 알림 전달 스케줄러
pub struct AuctionScheduler {
    state: Arc<SharedState>,
}

impl AuctionScheduler {
    pub fn new(state: Arc<SharedState>) -> Self {
        Self { state }
    }

    /// 스케줄러 시작
    pub fn start(&self) {
        // 만료 틱
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1)); // 1초마다 실행
            loop {
                interval.tick().await;
                if let Err(e) = Self::process_expired_sell_orders(&state).await {
                    error!(
                        "{:<12} --> 만료된 판매 주문 처리 중 오류 발생: {}",
                        "Scheduler", e
                    );
                }
            }
        });

        // 알림 틱
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(1));
            loop {
                interval.tick().await;
                Self::notify_users(&state).await;
            }
        });
    }

    /// 만료된 판매 주문을 정산하고 낙찰 알림을 큐에 넣는다
    async fn process_expired_sell_orders(state: &SharedState) -> Result<(), String> {
        let unix_now = Utc::now().timestamp();
        let executed = state
            .auction_service
            .process_expired_sell_orders(unix_now)
            .await?;

        for order in executed {
            state
                .transaction_log
                .log(order.seller_id, &format!("sold {order:?}"));
            state
                .transaction_log
                .log(order.buyer_id, &format!("bought {order:?}"));
            state.notifications.push(
                order.seller_id,
                Notification::AuctionExecuted {
                    order_id: order.id,
                    price: order.price,
                },
            );
        }

        debug!("{:<12} --> 만료된 판매 주문 처리 완료", "Scheduler");
        Ok(())
    }

    /// 알림 큐를 비우며 접속 중인 사용자에게 전달한다
    async fn notify_users(state: &SharedState) {
        while let Some((user_id, notification)) = state.notifications.pop() {
            // 접속 중이 아니면 알림은 버려진다
            let Some(writer) = state.sockets.get(user_id) else {
                continue;
            };
            let message = notification.message();
            let mut writer = writer.lock().await;
            // 쓰기 실패는 무시한다. 사용자가 이미 끊겼을 수 있고,
            // 커맨드 태스크가 다음 read에서 연결을 정리한다.
            let _ = writer.write_all(message.as_bytes()).await;
        }
    }
}
// endregion: --- Auction Scheduler
