// region:    --- Imports
use crate::storage::model::{
    ItemOperationInfo, SellOrderExecutionInfo, SellOrderRecord, SellOrderType, UserId,
};
use crate::storage::Storage;
use std::sync::Arc;
use tracing::info;
// endregion: --- Imports

// region:    --- Auction Service
/// 경매장의 핵심 비즈니스 로직
///
/// 모든 쓰기 연산은 저장소 기본 연산들을 하나의 트랜잭션으로 조합하여
/// 커밋하거나 전부 롤백한다. 비즈니스 규칙 검증은 이 계층에서 수행한다.
pub struct AuctionService {
    storage: Arc<Storage>,
}

impl AuctionService {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// 판매 수수료: 가격의 5% + 고정 수수료 1
    pub fn sell_order_fee(&self, price: i64) -> i64 {
        price / 20 + 1
    }

    /// 아이템 입금
    ///
    /// 처음 보는 아이템은 새로 만든다. "funds" 아이템이 잔고 역할을 한다.
    pub async fn deposit(
        &self,
        user_id: UserId,
        item_name: &str,
        quantity: i64,
    ) -> Result<ItemOperationInfo, String> {
        info!(
            "{:<12} --> 입금: user_id={}, item='{}', quantity={}",
            "Auction", user_id, item_name, quantity
        );
        if quantity < 0 {
            return Err("Cannot deposit negative amount".to_string());
        }
        if item_name.is_empty() {
            return Err("Cannot deposit an item without a name".to_string());
        }

        let storage = Arc::clone(&self.storage);
        let item_name = item_name.to_owned();
        self.storage
            .db()
            .transaction(move |tx| {
                Box::pin(async move {
                    let item_id = match storage.get_item_id(&mut **tx, &item_name).await {
                        Ok(item_id) => item_id,
                        Err(_) => storage.create_item(&mut **tx, &item_name).await?,
                    };
                    storage
                        .add_user_item(&mut **tx, user_id, item_id, quantity)
                        .await?;
                    Ok(ItemOperationInfo { item_id, quantity })
                })
            })
            .await
    }

    /// 아이템 출금
    pub async fn withdraw(
        &self,
        user_id: UserId,
        item_name: &str,
        quantity: i64,
    ) -> Result<ItemOperationInfo, String> {
        info!(
            "{:<12} --> 출금: user_id={}, item='{}', quantity={}",
            "Auction", user_id, item_name, quantity
        );
        if quantity < 0 {
            return Err("Cannot withdraw negative amount".to_string());
        }

        let storage = Arc::clone(&self.storage);
        let item = item_name.to_owned();
        self.storage
            .db()
            .transaction(move |tx| {
                Box::pin(async move {
                    let item_id = storage.get_item_id(&mut **tx, &item).await?;
                    storage
                        .sub_user_item(&mut **tx, user_id, item_id, quantity)
                        .await?;
                    Ok(ItemOperationInfo { item_id, quantity })
                })
            })
            .await
            .map_err(|_| format!("Not enough {item_name}(s) to withdraw"))
    }

    /// 판매 주문 등록
    ///
    /// 등록 시점에 아이템이 판매자 인벤토리에서 빠져 주문에 에스크로되고,
    /// 환불되지 않는 수수료가 잔고에서 차감된다. 주문 종류는 buyer_id 인코딩으로
    /// 저장된다: 즉시 판매는 buyer_id = seller_id, 경매는 입찰 전까지 null.
    pub async fn place_sell_order(
        &self,
        order_type: SellOrderType,
        seller_id: UserId,
        item_name: &str,
        quantity: i64,
        price: i64,
        unix_expiration_time: i64,
    ) -> Result<ItemOperationInfo, String> {
        info!(
            "{:<12} --> 판매 주문 등록: seller_id={}, item='{}', quantity={}, price={}, type={}",
            "Auction",
            seller_id,
            item_name,
            quantity,
            price,
            order_type.as_str()
        );
        if quantity < 0 {
            return Err("Cannot sell negative amount".to_string());
        }
        if quantity == 0 {
            return Err("Cannot sell zero items".to_string());
        }
        if price < 0 {
            return Err("Cannot sell for negative price".to_string());
        }
        if price == 0 {
            return Err("Cannot sell for zero price".to_string());
        }
        if item_name == self.storage.funds_item_name() {
            return Err(format!(
                "Cannot sell {0} for {0}, it's a speculation!",
                self.storage.funds_item_name()
            ));
        }

        let fee = self.sell_order_fee(price);
        let buyer_id = match order_type {
            SellOrderType::Immediate => Some(seller_id),
            SellOrderType::Auction => None,
        };

        let storage = Arc::clone(&self.storage);
        let funds_item_id = self.storage.funds_item_id();
        let item = item_name.to_owned();
        self.storage
            .db()
            .transaction(move |tx| {
                Box::pin(async move {
                    // 먼저 판매할 아이템을 판매자에게서 가져온다
                    let item_id = storage
                        .get_item_id(&mut **tx, &item)
                        .await
                        .map_err(|_| format!("Not enough {item}(s) to sell"))?;
                    storage
                        .sub_user_item(&mut **tx, seller_id, item_id, quantity)
                        .await
                        .map_err(|_| format!("Not enough {item}(s) to sell"))?;

                    // 그 다음 수수료를 차감한다
                    storage
                        .sub_user_item(&mut **tx, seller_id, funds_item_id, fee)
                        .await
                        .map_err(|_| {
                            format!("Not enough funds to pay {fee} funds fee (which is 5% + 1)")
                        })?;

                    // 마지막으로 주문을 등록한다
                    storage
                        .create_sell_order(
                            &mut **tx,
                            &SellOrderRecord {
                                seller_id,
                                item_id,
                                quantity,
                                price,
                                unix_expiration_time,
                                buyer_id,
                            },
                        )
                        .await?;

                    // 거래 로그에는 지불한 수수료를 남긴다
                    Ok(ItemOperationInfo {
                        item_id: funds_item_id,
                        quantity: fee,
                    })
                })
            })
            .await
    }

    /// 즉시 판매 주문 체결
    pub async fn execute_immediate_sell_order(
        &self,
        buyer_id: UserId,
        sell_order_id: i64,
    ) -> Result<SellOrderExecutionInfo, String> {
        info!(
            "{:<12} --> 즉시 구매: buyer_id={}, sell_order_id={}",
            "Auction", buyer_id, sell_order_id
        );
        let storage = Arc::clone(&self.storage);
        let funds_item_id = self.storage.funds_item_id();
        self.storage
            .db()
            .transaction(move |tx| {
                Box::pin(async move {
                    let order = storage
                        .get_sell_order_info(&mut **tx, sell_order_id)
                        .await?
                        .ok_or_else(|| {
                            format!("Immediate sell order #{sell_order_id} doesn't exist")
                        })?;
                    if order.order_type() != SellOrderType::Immediate {
                        return Err(format!(
                            "Sell order #{sell_order_id} is not an immediate sell order"
                        ));
                    }
                    if buyer_id == order.seller_id {
                        return Err("You can't buy your own items".to_string());
                    }

                    let execution_info = SellOrderExecutionInfo {
                        id: sell_order_id,
                        seller_id: order.seller_id,
                        buyer_id,
                        item_id: order.item_id,
                        quantity: order.quantity,
                        price: order.price,
                    };

                    // 구매자의 잔고에서 대금을 차감하고
                    storage
                        .sub_user_item(&mut **tx, buyer_id, funds_item_id, order.price)
                        .await
                        .map_err(|_| "Not enough funds to buy".to_string())?;
                    // 판매자에게 대금을 지급하고
                    storage
                        .add_user_item(&mut **tx, order.seller_id, funds_item_id, order.price)
                        .await?;
                    // 아이템을 구매자에게 넘긴 뒤
                    storage
                        .add_user_item(&mut **tx, buyer_id, order.item_id, order.quantity)
                        .await?;
                    // 주문을 삭제한다
                    storage.delete_sell_order(&mut **tx, sell_order_id).await?;

                    Ok(execution_info)
                })
            })
            .await
    }

    /// 경매 주문에 입찰
    ///
    /// 이미 입찰자가 있으면 이전 입찰자에게 에스크로된 금액을 돌려주고
    /// 새 입찰 금액을 차감한다. 두 동작은 같은 트랜잭션 안에서 일어나므로
    /// 새 입찰이 실패하면 이전 입찰자의 상태가 그대로 복원된다.
    pub async fn place_bid_on_auction_sell_order(
        &self,
        buyer_id: UserId,
        sell_order_id: i64,
        bid: i64,
    ) -> Result<(), String> {
        info!(
            "{:<12} --> 입찰: buyer_id={}, sell_order_id={}, bid={}",
            "Auction", buyer_id, sell_order_id, bid
        );
        let storage = Arc::clone(&self.storage);
        let funds_item_id = self.storage.funds_item_id();
        self.storage
            .db()
            .transaction(move |tx| {
                Box::pin(async move {
                    let order = storage
                        .get_sell_order_info(&mut **tx, sell_order_id)
                        .await?
                        .ok_or_else(|| format!("Sell order #{sell_order_id} doesn't exist"))?;
                    if order.order_type() != SellOrderType::Auction {
                        return Err(format!(
                            "Sell order #{sell_order_id} is not an auction sell order"
                        ));
                    }
                    if buyer_id == order.seller_id {
                        return Err("You cannot bid on your own auction orders".to_string());
                    }
                    if bid <= order.price {
                        return Err("Bid must be greater than the current price".to_string());
                    }

                    // 이전 입찰자가 있으면 에스크로된 금액을 돌려준다
                    if let Some(previous_buyer_id) = order.buyer_id {
                        storage
                            .add_user_item(&mut **tx, previous_buyer_id, funds_item_id, order.price)
                            .await
                            .map_err(|e| {
                                format!("Failed to return funds to the previous buyer: {e}")
                            })?;
                    }

                    // 새 입찰자의 잔고에서 입찰 금액을 차감하고
                    storage
                        .sub_user_item(&mut **tx, buyer_id, funds_item_id, bid)
                        .await
                        .map_err(|_| "Not enough funds to place a bid".to_string())?;
                    // 주문의 입찰자와 가격을 갱신한다
                    storage
                        .update_sell_order_buyer(&mut **tx, sell_order_id, buyer_id, bid)
                        .await?;

                    Ok(())
                })
            })
            .await
    }

    /// 만료된 판매 주문 일괄 처리
    ///
    /// 낙찰된 경매 목록을 반환하여 서버가 판매자에게 알림을 보낼 수 있게 한다.
    pub async fn process_expired_sell_orders(
        &self,
        unix_now: i64,
    ) -> Result<Vec<SellOrderExecutionInfo>, String> {
        self.storage.process_expired_sell_orders(unix_now).await
    }
}
// endregion: --- Auction Service
