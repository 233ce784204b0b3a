// region:    --- Imports
use crate::database::DatabaseManager;
use sqlx::sqlite::SqliteConnection;
use sqlx::FromRow;

pub mod model;
pub mod queries;

use model::{
    SellOrderExecutionInfo, SellOrderInfo, SellOrderRecord, SellOrderType, UserId, UserItemInfo,
};
// endregion: --- Imports

/// 화폐로 사용되는 아이템 이름
pub const FUNDS_ITEM_NAME: &str = "funds";

// region:    --- Storage
/// 영속 저장소
///
/// 사용자, 아이템, 인벤토리, 판매 주문에 대한 타입이 있는 기본 연산을 제공한다.
/// 트랜잭션에 참여하는 연산은 `&mut SqliteConnection`을 받아
/// `DatabaseManager::transaction` 안에서 조합될 수 있다.
#[derive(Clone)]
pub struct Storage {
    db: DatabaseManager,
    funds_item_id: i64,
}

impl Storage {
    /// 저장소 열기
    ///
    /// funds 아이템이 없으면 생성하고 id를 캐시한다.
    pub async fn open(db: DatabaseManager) -> Result<Self, String> {
        sqlx::query(queries::INSERT_FUNDS_ITEM)
            .bind(FUNDS_ITEM_NAME)
            .execute(db.pool())
            .await
            .map_err(|e| format!("Failed to insert the '{FUNDS_ITEM_NAME}' item: {e}"))?;

        let funds_item_id = sqlx::query_scalar::<_, i64>(queries::GET_ITEM_ID)
            .bind(FUNDS_ITEM_NAME)
            .fetch_one(db.pool())
            .await
            .map_err(|e| format!("Failed to get the '{FUNDS_ITEM_NAME}' item id: {e}"))?;

        Ok(Self { db, funds_item_id })
    }

    pub fn db(&self) -> &DatabaseManager {
        &self.db
    }

    pub fn funds_item_id(&self) -> i64 {
        self.funds_item_id
    }

    pub fn funds_item_name(&self) -> &'static str {
        FUNDS_ITEM_NAME
    }

    // region:    --- Users

    /// 사용자 id 조회
    pub async fn get_user_id(&self, username: &str) -> Result<Option<UserId>, String> {
        sqlx::query_scalar::<_, i64>(queries::GET_USER_ID)
            .bind(username)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| format!("Failed to get user id for '{username}': {e}"))
    }

    /// 사용자 생성
    ///
    /// 사용자 행과 잔고 0의 funds 행을 하나의 트랜잭션으로 생성한다.
    /// 이미 존재하는 이름이면 실패한다.
    pub async fn create_user(&self, username: &str) -> Result<UserId, String> {
        let username = username.to_owned();
        let funds_item_id = self.funds_item_id;
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    let result = sqlx::query(queries::INSERT_USER)
                        .bind(&username)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| format!("Failed to create user '{username}': {e}"))?;
                    let user_id = result.last_insert_rowid();

                    // 신규 사용자는 항상 0 funds로 시작한다
                    sqlx::query(queries::INSERT_FUNDS_ROW)
                        .bind(user_id)
                        .bind(funds_item_id)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| {
                            format!("Failed to create the funds row for '{username}': {e}")
                        })?;

                    Ok(user_id)
                })
            })
            .await
    }

    // endregion: --- Users

    // region:    --- Items

    /// 아이템 id 조회
    pub async fn get_item_id(
        &self,
        conn: &mut SqliteConnection,
        item_name: &str,
    ) -> Result<i64, String> {
        sqlx::query_scalar::<_, i64>(queries::GET_ITEM_ID)
            .bind(item_name)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| format!("Failed to get item id for '{item_name}': {e}"))?
            .ok_or_else(|| format!("Item '{item_name}' doesn't exist"))
    }

    /// 아이템 생성
    pub async fn create_item(
        &self,
        conn: &mut SqliteConnection,
        item_name: &str,
    ) -> Result<i64, String> {
        let result = sqlx::query(queries::INSERT_ITEM)
            .bind(item_name)
            .execute(&mut *conn)
            .await
            .map_err(|e| format!("Failed to create item '{item_name}': {e}"))?;
        Ok(result.last_insert_rowid())
    }

    // endregion: --- Items

    // region:    --- User Items

    /// 사용자의 아이템 수량 조회 (행이 없으면 `None`, 호출자는 0으로 취급)
    pub async fn get_user_item_quantity(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        item_id: i64,
    ) -> Result<Option<i64>, String> {
        sqlx::query_scalar::<_, i64>(queries::GET_USER_ITEM_QUANTITY)
            .bind(user_id)
            .bind(item_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| format!("Failed to get item quantity for user {user_id}: {e}"))
    }

    /// 사용자의 아이템 수량 증가 (업서트)
    pub async fn add_user_item(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        item_id: i64,
        quantity: i64,
    ) -> Result<(), String> {
        sqlx::query(queries::ADD_USER_ITEM)
            .bind(user_id)
            .bind(item_id)
            .bind(quantity)
            .execute(&mut *conn)
            .await
            .map_err(|e| format!("Failed to add items to user {user_id}: {e}"))?;
        Ok(())
    }

    /// 사용자의 아이템 수량 감소
    ///
    /// 보유 수량이 모자라면 실패한다. funds가 아닌 아이템은 수량이 0이 되면
    /// 행을 삭제한다 (funds 행은 사용자가 존재하는 한 유지).
    pub async fn sub_user_item(
        &self,
        conn: &mut SqliteConnection,
        user_id: UserId,
        item_id: i64,
        quantity: i64,
    ) -> Result<(), String> {
        let held = self
            .get_user_item_quantity(&mut *conn, user_id, item_id)
            .await?
            .unwrap_or(0);
        if held < quantity {
            return Err(format!(
                "User {user_id} has {held} item(s), cannot take {quantity}"
            ));
        }

        let remainder = held - quantity;
        if item_id == self.funds_item_id || remainder > 0 {
            sqlx::query(queries::SUB_USER_ITEM)
                .bind(quantity)
                .bind(user_id)
                .bind(item_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| format!("Failed to take items from user {user_id}: {e}"))?;
        } else {
            sqlx::query(queries::DELETE_USER_ITEM)
                .bind(user_id)
                .bind(item_id)
                .execute(&mut *conn)
                .await
                .map_err(|e| format!("Failed to take items from user {user_id}: {e}"))?;
        }
        Ok(())
    }

    // endregion: --- User Items

    // region:    --- Sell Orders

    /// 판매 주문 생성, 자동 할당된 id 반환
    pub async fn create_sell_order(
        &self,
        conn: &mut SqliteConnection,
        order: &SellOrderRecord,
    ) -> Result<i64, String> {
        let result = sqlx::query(queries::INSERT_SELL_ORDER)
            .bind(order.seller_id)
            .bind(order.item_id)
            .bind(order.quantity)
            .bind(order.price)
            .bind(order.unix_expiration_time)
            .bind(order.buyer_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| format!("Failed to create sell order: {e}"))?;
        Ok(result.last_insert_rowid())
    }

    /// 판매 주문 조회
    pub async fn get_sell_order_info(
        &self,
        conn: &mut SqliteConnection,
        sell_order_id: i64,
    ) -> Result<Option<SellOrderRecord>, String> {
        sqlx::query_as::<_, SellOrderRecord>(queries::GET_SELL_ORDER)
            .bind(sell_order_id)
            .fetch_optional(&mut *conn)
            .await
            .map_err(|e| format!("Failed to get sell order #{sell_order_id}: {e}"))
    }

    /// 판매 주문의 입찰자와 가격 갱신
    pub async fn update_sell_order_buyer(
        &self,
        conn: &mut SqliteConnection,
        sell_order_id: i64,
        buyer_id: UserId,
        price: i64,
    ) -> Result<(), String> {
        sqlx::query(queries::UPDATE_SELL_ORDER_BUYER)
            .bind(buyer_id)
            .bind(price)
            .bind(sell_order_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| format!("Failed to update sell order #{sell_order_id}: {e}"))?;
        Ok(())
    }

    /// 판매 주문 삭제
    pub async fn delete_sell_order(
        &self,
        conn: &mut SqliteConnection,
        sell_order_id: i64,
    ) -> Result<(), String> {
        sqlx::query(queries::DELETE_SELL_ORDER)
            .bind(sell_order_id)
            .execute(&mut *conn)
            .await
            .map_err(|e| format!("Failed to delete sell order #{sell_order_id}: {e}"))?;
        Ok(())
    }

    // endregion: --- Sell Orders

    // region:    --- Views

    /// 사용자 인벤토리 조회 (아이템 id 순)
    pub async fn view_user_items(&self, user_id: UserId) -> Result<Vec<UserItemInfo>, String> {
        sqlx::query_as::<_, UserItemInfo>(queries::VIEW_USER_ITEMS)
            .bind(user_id)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| format!("Failed to view items of user {user_id}: {e}"))
    }

    /// 전체 판매 주문 목록 조회
    pub async fn view_sell_orders(&self) -> Result<Vec<SellOrderInfo>, String> {
        let rows = sqlx::query_as::<_, SellOrderInfoRow>(queries::VIEW_SELL_ORDERS)
            .fetch_all(self.db.pool())
            .await
            .map_err(|e| format!("Failed to view sell orders: {e}"))?;
        Ok(rows.into_iter().map(SellOrderInfoRow::into_info).collect())
    }

    // endregion: --- Views

    // region:    --- Expiration

    /// 만료된 판매 주문 일괄 처리
    ///
    /// 하나의 트랜잭션 안에서:
    /// 1. 낙찰된 경매(만료 && 입찰자 존재 && 입찰자 != 판매자)를 수집하고
    /// 2. 모든 만료 주문의 아이템을 수령자(판매자 또는 낙찰자)별로 합산 반영,
    /// 3. 낙찰 금액을 판매자별로 합산하여 잔고에 반영한 뒤
    /// 4. 만료 주문을 삭제한다.
    ///
    /// 같은 (사용자, 아이템) 쌍에 여러 주문이 겹칠 수 있으므로 반영은 반드시
    /// 집계된 한 번의 업서트로 이루어진다. 수집된 낙찰 목록을 반환한다.
    pub async fn process_expired_sell_orders(
        &self,
        unix_now: i64,
    ) -> Result<Vec<SellOrderExecutionInfo>, String> {
        let funds_item_id = self.funds_item_id;
        self.db
            .transaction(move |tx| {
                Box::pin(async move {
                    let executed =
                        sqlx::query_as::<_, SellOrderExecutionInfo>(queries::SELECT_EXECUTED_AUCTIONS)
                            .bind(unix_now)
                            .fetch_all(&mut **tx)
                            .await
                            .map_err(|e| format!("Failed to collect executed auctions: {e}"))?;

                    sqlx::query(queries::RETURN_EXPIRED_ITEMS)
                        .bind(unix_now)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| format!("Failed to return expired items: {e}"))?;

                    sqlx::query(queries::CREDIT_AUCTION_SELLERS)
                        .bind(unix_now)
                        .bind(funds_item_id)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| format!("Failed to credit auction sellers: {e}"))?;

                    sqlx::query(queries::DELETE_EXPIRED_SELL_ORDERS)
                        .bind(unix_now)
                        .execute(&mut **tx)
                        .await
                        .map_err(|e| format!("Failed to delete expired sell orders: {e}"))?;

                    Ok(executed)
                })
            })
            .await
    }

    // endregion: --- Expiration
}
// endregion: --- Storage

// region:    --- Row Types
/// view_sell_orders의 조인 결과 행
#[derive(FromRow)]
struct SellOrderInfoRow {
    id: i64,
    seller_name: String,
    item_name: String,
    quantity: i64,
    price: i64,
    unix_expiration_time: i64,
    is_immediate: bool,
}

impl SellOrderInfoRow {
    fn into_info(self) -> SellOrderInfo {
        let order_type = if self.is_immediate {
            SellOrderType::Immediate
        } else {
            SellOrderType::Auction
        };
        SellOrderInfo {
            id: self.id,
            seller_name: self.seller_name,
            item_name: self.item_name,
            quantity: self.quantity,
            price: self.price,
            unix_expiration_time: self.unix_expiration_time,
            order_type,
        }
    }
}
// endregion: --- Row Types
