/// 사용자 id 조회
pub const GET_USER_ID: &str = "SELECT id FROM users WHERE username = ?1";

/// 사용자 생성
pub const INSERT_USER: &str = "INSERT INTO users (username) VALUES (?1)";

/// 신규 사용자의 잔고(funds) 행 생성
pub const INSERT_FUNDS_ROW: &str =
    "INSERT INTO user_items (user_id, item_id, quantity) VALUES (?1, ?2, 0)";

/// 아이템 id 조회
pub const GET_ITEM_ID: &str = "SELECT id FROM items WHERE name = ?1";

/// 아이템 생성
pub const INSERT_ITEM: &str = "INSERT INTO items (name) VALUES (?1)";

/// funds 아이템 생성 (이미 있으면 무시)
pub const INSERT_FUNDS_ITEM: &str = "INSERT OR IGNORE INTO items (name) VALUES (?1)";

/// 사용자의 아이템 수량 조회
pub const GET_USER_ITEM_QUANTITY: &str =
    "SELECT quantity FROM user_items WHERE user_id = ?1 AND item_id = ?2";

/// 사용자의 아이템 수량 증가 (행이 없으면 생성)
pub const ADD_USER_ITEM: &str = r#"
    INSERT INTO user_items (user_id, item_id, quantity) VALUES (?1, ?2, ?3)
    ON CONFLICT (user_id, item_id) DO UPDATE SET quantity = quantity + ?3
"#;

/// 사용자의 아이템 수량 감소
pub const SUB_USER_ITEM: &str =
    "UPDATE user_items SET quantity = quantity - ?1 WHERE user_id = ?2 AND item_id = ?3";

/// 수량이 0이 된 행 삭제
pub const DELETE_USER_ITEM: &str =
    "DELETE FROM user_items WHERE user_id = ?1 AND item_id = ?2";

/// 판매 주문 생성
pub const INSERT_SELL_ORDER: &str = r#"
    INSERT INTO sell_orders (user_id, item_id, quantity, price, expiration_time, buyer_id)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6)
"#;

/// 판매 주문 조회
pub const GET_SELL_ORDER: &str = r#"
    SELECT user_id AS seller_id, item_id, quantity, price,
           expiration_time AS unix_expiration_time, buyer_id
    FROM sell_orders
    WHERE id = ?1
"#;

/// 판매 주문의 입찰자와 가격 갱신
pub const UPDATE_SELL_ORDER_BUYER: &str =
    "UPDATE sell_orders SET buyer_id = ?1, price = ?2 WHERE id = ?3";

/// 판매 주문 삭제
pub const DELETE_SELL_ORDER: &str = "DELETE FROM sell_orders WHERE id = ?1";

/// 사용자 인벤토리 조회
pub const VIEW_USER_ITEMS: &str = r#"
    SELECT items.name AS item_name, user_items.quantity AS quantity
    FROM user_items
    INNER JOIN items ON user_items.item_id = items.id
    WHERE user_items.user_id = ?1
    ORDER BY user_items.item_id
"#;

/// 전체 판매 주문 목록 조회 (주문 종류는 buyer_id로부터 유도)
pub const VIEW_SELL_ORDERS: &str = r#"
    SELECT sell_orders.id AS id,
           users.username AS seller_name,
           items.name AS item_name,
           sell_orders.quantity AS quantity,
           sell_orders.price AS price,
           sell_orders.expiration_time AS unix_expiration_time,
           CASE WHEN sell_orders.buyer_id = sell_orders.user_id THEN 1 ELSE 0 END AS is_immediate
    FROM sell_orders
    INNER JOIN users ON sell_orders.user_id = users.id
    INNER JOIN items ON sell_orders.item_id = items.id
    ORDER BY sell_orders.id
"#;

/// 만료된 주문 중 낙찰된 경매 조회
pub const SELECT_EXECUTED_AUCTIONS: &str = r#"
    SELECT id, user_id AS seller_id, buyer_id, item_id, quantity, price
    FROM sell_orders
    WHERE expiration_time <= ?1 AND buyer_id IS NOT NULL AND buyer_id != user_id
    ORDER BY id
"#;

/// 만료된 주문의 아이템을 수령자별로 합산하여 인벤토리에 반영
///
/// 수령자는 입찰자가 없으면(즉시 판매 포함) 판매자, 낙찰된 경매면 구매자.
pub const RETURN_EXPIRED_ITEMS: &str = r#"
    INSERT INTO user_items (user_id, item_id, quantity)
    SELECT CASE WHEN buyer_id IS NULL OR buyer_id = user_id THEN user_id ELSE buyer_id END
               AS recipient_id,
           item_id,
           SUM(quantity)
    FROM sell_orders
    WHERE expiration_time <= ?1
    GROUP BY recipient_id, item_id
    ON CONFLICT (user_id, item_id) DO UPDATE SET quantity = quantity + excluded.quantity
"#;

/// 낙찰된 경매의 에스크로 금액을 판매자별로 합산하여 잔고에 반영
pub const CREDIT_AUCTION_SELLERS: &str = r#"
    INSERT INTO user_items (user_id, item_id, quantity)
    SELECT user_id, ?2, SUM(price)
    FROM sell_orders
    WHERE expiration_time <= ?1 AND buyer_id IS NOT NULL AND buyer_id != user_id
    GROUP BY user_id
    ON CONFLICT (user_id, item_id) DO UPDATE SET quantity = quantity + excluded.quantity
"#;

/// 만료된 판매 주문 삭제
pub const DELETE_EXPIRED_SELL_ORDERS: &str =
    "DELETE FROM sell_orders WHERE expiration_time <= ?1";
