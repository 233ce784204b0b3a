/// 커맨드 파싱과 실행
///
/// 닫힌 커맨드 집합: 각 커맨드는 `parse` 팩토리를 가진 구조체이고,
/// 디스패처는 첫 단어 -> 파서 -> 실행의 고정된 매핑이다.
// region:    --- Imports
use crate::notification::Notification;
use crate::server::SharedState;
use crate::storage::model::{SellOrderInfo, SellOrderType, User};
use chrono::{DateTime, Utc};
use tracing::info;
// endregion: --- Imports

// 판매 주문의 유효 기간: 등록 후 5분
const ORDER_LIFETIME_SECS: i64 = 5 * 60;

// region:    --- Parsing Helpers

// 첫 단어를 커맨드 이름으로, 나머지를 인자로 나눈다
fn parse_command_name(request: &str) -> (&str, &str) {
    match request.split_once(' ') {
        Some((name, args)) => (name, args),
        None => (request, ""),
    }
}

// 마지막 단어가 정수면 수량으로 파싱하고, 아니면 전체를 아이템 이름으로 사용한다
// 예시:
// - "arrow 5" -> ("arrow", 5)
// - "holy sword 1" -> ("holy sword", 1)
// - "arrow" -> ("arrow", 1)
fn parse_item_name_and_quantity(args: &str) -> (String, i64) {
    if let Some(space_pos) = args.rfind(' ') {
        if let Ok(quantity) = args[space_pos + 1..].parse::<i64>() {
            return (args[..space_pos].to_owned(), quantity);
        }
    }
    (args.to_owned(), 1)
}

// endregion: --- Parsing Helpers

// region:    --- Commands

// "pong"으로 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ping;

impl Ping {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }

    pub async fn execute(&self, _user: &User, _state: &SharedState) -> String {
        "pong".to_string()
    }
}

// 현재 사용자의 이름으로 응답
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Whoami;

impl Whoami {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }

    pub async fn execute(&self, user: &User, _state: &SharedState) -> String {
        user.username.clone()
    }
}

// 모든 커맨드와 설명을 담은 도움말 출력
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Help;

impl Help {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }

    pub async fn execute(&self, _user: &User, _state: &SharedState) -> String {
        help_text()
    }
}

pub fn help_text() -> String {
    [
        "Available commands:",
        "- ping: replies with 'pong'",
        "- whoami: replies with your username",
        "- help: prints this help message",
        "- deposit <item> [quantity]: deposits an item with optional quantity (default 1)",
        "- withdraw <item> [quantity]: withdraws an item with optional quantity (default 1)",
        "- view_items: lists all items in your inventory",
        "- sell [immediate|auction] <item> [quantity] <price>: places a sell order \
         (default type immediate, default quantity 1, expires in 5 minutes)",
        "- buy <order_id> [bid]: buys an immediate sell order or places a bid on an auction",
        "- view_sell_orders: lists all sell orders from all users",
        "- quit: closes the connection",
    ]
    .join("\n")
}

// 아이템 입금 (수량 생략 시 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub item_name: String,
    pub quantity: i64,
}

impl Deposit {
    pub fn parse(args: &str) -> Option<Self> {
        let (item_name, quantity) = parse_item_name_and_quantity(args);
        Some(Self {
            item_name,
            quantity,
        })
    }

    pub async fn execute(&self, user: &User, state: &SharedState) -> String {
        match state
            .auction_service
            .deposit(user.id, &self.item_name, self.quantity)
            .await
        {
            Ok(info) => {
                state
                    .transaction_log
                    .log(user.id, &format!("deposited {info:?}"));
                format!(
                    "Successfully deposited {} {}(s)",
                    self.quantity, self.item_name
                )
            }
            Err(e) => format!(
                "Failed to deposit {} {}(s) with error: {}",
                self.quantity, self.item_name, e
            ),
        }
    }
}

// 아이템 출금 (수량 생략 시 1)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdraw {
    pub item_name: String,
    pub quantity: i64,
}

impl Withdraw {
    pub fn parse(args: &str) -> Option<Self> {
        let (item_name, quantity) = parse_item_name_and_quantity(args);
        Some(Self {
            item_name,
            quantity,
        })
    }

    pub async fn execute(&self, user: &User, state: &SharedState) -> String {
        match state
            .auction_service
            .withdraw(user.id, &self.item_name, self.quantity)
            .await
        {
            Ok(info) => {
                state
                    .transaction_log
                    .log(user.id, &format!("withdrew {info:?}"));
                format!(
                    "Successfully withdrawn {} {}(s)",
                    self.quantity, self.item_name
                )
            }
            Err(e) => format!(
                "Failed to withdraw {} {}(s) with error: {}",
                self.quantity, self.item_name, e
            ),
        }
    }
}

// 현재 사용자의 인벤토리 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewItems;

impl ViewItems {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }

    pub async fn execute(&self, user: &User, state: &SharedState) -> String {
        match state.storage.view_user_items(user.id).await {
            Ok(items) => {
                let items: Vec<String> = items
                    .iter()
                    .map(|item| format!("{}({})", item.item_name, item.quantity))
                    .collect();
                format!("Items: {}", items.join(", "))
            }
            Err(e) => format!("Failed to view items with error: {e}"),
        }
    }
}

/// 판매 주문 등록
///
/// 인자 형식: `[immediate|auction] <item_name> [quantity] <price>`.
/// 가격은 필수, 수량은 생략 시 1, 종류는 생략 시 immediate.
/// 예시:
/// - "arrow 5 10" -> 즉시 판매, 5개를 10 funds에
/// - "auction holy sword 1 100" -> 경매, 1개를 시작가 100 funds에
/// - "arrow 10" -> 즉시 판매, 1개를 10 funds에
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sell {
    pub order_type: SellOrderType,
    pub item_name: String,
    pub quantity: i64,
    pub price: i64,
}

impl Sell {
    pub fn parse(args: &str) -> Option<Self> {
        // 첫 단어가 주문 종류면 떼어낸다
        let (order_type, args) = match args.split_once(' ') {
            Some((first, rest)) if SellOrderType::parse(first).is_some() => {
                (SellOrderType::parse(first)?, rest)
            }
            _ => (SellOrderType::Immediate, args),
        };

        // 가격은 마지막 단어, 필수
        let space_pos = args.rfind(' ')?;
        let price = args[space_pos + 1..].parse::<i64>().ok()?;

        let (item_name, quantity) = parse_item_name_and_quantity(&args[..space_pos]);
        Some(Self {
            order_type,
            item_name,
            quantity,
            price,
        })
    }

    pub async fn execute(&self, user: &User, state: &SharedState) -> String {
        // 만료 시각은 지금 + 5분
        let unix_expiration_time = Utc::now().timestamp() + ORDER_LIFETIME_SECS;

        match state
            .auction_service
            .place_sell_order(
                self.order_type,
                user.id,
                &self.item_name,
                self.quantity,
                self.price,
                unix_expiration_time,
            )
            .await
        {
            Ok(fee_info) => {
                state
                    .transaction_log
                    .log(user.id, &format!("paid a fee {fee_info:?}"));
                format!(
                    "Successfully placed sell order for {} {}(s)",
                    self.quantity, self.item_name
                )
            }
            Err(e) => format!(
                "Failed to place sell order for {} {}(s) with error: {}",
                self.quantity, self.item_name, e
            ),
        }
    }
}

/// 구매 또는 입찰
///
/// `buy <order_id>`는 즉시 판매 주문을 체결하고,
/// `buy <order_id> <bid>`는 경매 주문에 입찰한다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Buy {
    pub sell_order_id: i64,
    pub bid: Option<i64>,
}

impl Buy {
    pub fn parse(args: &str) -> Option<Self> {
        let mut parts = args.split_whitespace();
        let sell_order_id = parts.next()?.parse::<i64>().ok()?;
        let bid = match parts.next() {
            Some(raw) => Some(raw.parse::<i64>().ok()?),
            None => None,
        };
        Some(Self { sell_order_id, bid })
    }

    pub async fn execute(&self, user: &User, state: &SharedState) -> String {
        match self.bid {
            // 입찰 금액이 없으면 즉시 구매
            None => {
                match state
                    .auction_service
                    .execute_immediate_sell_order(user.id, self.sell_order_id)
                    .await
                {
                    Ok(order) => {
                        state
                            .transaction_log
                            .log(order.seller_id, &format!("sold {order:?}"));
                        state
                            .transaction_log
                            .log(order.buyer_id, &format!("bought {order:?}"));
                        // 판매자 알림은 알림 태스크가 다음 틱에 전달한다
                        state.notifications.push(
                            order.seller_id,
                            Notification::ImmediateExecuted {
                                order_id: order.id,
                                price: order.price,
                            },
                        );
                        format!(
                            "Successfully bought sell order #{} for {} funds",
                            order.id, order.price
                        )
                    }
                    Err(e) => format!(
                        "Failed to buy sell order #{} with error: {}",
                        self.sell_order_id, e
                    ),
                }
            }
            // 입찰 금액이 있으면 경매 입찰
            Some(bid) => {
                match state
                    .auction_service
                    .place_bid_on_auction_sell_order(user.id, self.sell_order_id, bid)
                    .await
                {
                    Ok(()) => format!(
                        "Successfully placed a bid of {} funds on sell order #{}",
                        bid, self.sell_order_id
                    ),
                    Err(e) => format!(
                        "Failed to place a bid on sell order #{} with error: {}",
                        self.sell_order_id, e
                    ),
                }
            }
        }
    }
}

// 모든 사용자의 판매 주문 목록
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewSellOrders;

impl ViewSellOrders {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }

    pub async fn execute(&self, _user: &User, state: &SharedState) -> String {
        match state.storage.view_sell_orders().await {
            Ok(orders) => {
                let mut output = String::from("Sell orders:\n");
                for order in &orders {
                    output.push_str(&format!("- {}\n", format_sell_order(order)));
                }
                output
            }
            Err(e) => format!("Failed to view sell orders with error: {e}"),
        }
    }
}

// 연결 종료
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quit;

impl Quit {
    pub fn parse(_args: &str) -> Option<Self> {
        Some(Self)
    }
}

// endregion: --- Commands

// region:    --- Formatting

fn format_sell_order(order: &SellOrderInfo) -> String {
    let until = format_expiration_time(order.unix_expiration_time);
    if order.quantity == 1 {
        format!(
            "#{}: {} is selling a {} for {} funds until {} ({})",
            order.id,
            order.seller_name,
            order.item_name,
            order.price,
            until,
            order.order_type.as_str()
        )
    } else {
        format!(
            "#{}: {} is selling {} {}(s) for {} funds until {} ({})",
            order.id,
            order.seller_name,
            order.quantity,
            order.item_name,
            order.price,
            until,
            order.order_type.as_str()
        )
    }
}

pub fn format_expiration_time(unix_expiration_time: i64) -> String {
    match DateTime::<Utc>::from_timestamp(unix_expiration_time, 0) {
        Some(time) => time.format("%Y-%m-%d %H:%M:%S").to_string(),
        None => unix_expiration_time.to_string(),
    }
}

// endregion: --- Formatting

// region:    --- Dispatcher

/// 파싱된 커맨드
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ping(Ping),
    Whoami(Whoami),
    Help(Help),
    Deposit(Deposit),
    Withdraw(Withdraw),
    ViewItems(ViewItems),
    Sell(Sell),
    Buy(Buy),
    ViewSellOrders(ViewSellOrders),
    Quit(Quit),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    // 커맨드 이름이 매핑에 없음
    UnknownCommand,
    // 이름은 알지만 인자가 잘못됨
    InvalidArguments,
}

impl Command {
    /// 커맨드 이름 -> 파서 매핑
    pub fn parse(command_name: &str, args: &str) -> Result<Self, ParseError> {
        let command = match command_name {
            "ping" => Ping::parse(args).map(Command::Ping),
            "whoami" => Whoami::parse(args).map(Command::Whoami),
            "help" => Help::parse(args).map(Command::Help),
            "deposit" => Deposit::parse(args).map(Command::Deposit),
            "withdraw" => Withdraw::parse(args).map(Command::Withdraw),
            "view_items" => ViewItems::parse(args).map(Command::ViewItems),
            "sell" => Sell::parse(args).map(Command::Sell),
            "buy" => Buy::parse(args).map(Command::Buy),
            "view_sell_orders" => ViewSellOrders::parse(args).map(Command::ViewSellOrders),
            "quit" => Quit::parse(args).map(Command::Quit),
            _ => return Err(ParseError::UnknownCommand),
        };
        command.ok_or(ParseError::InvalidArguments)
    }
}

/// 커맨드 실행 결과
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    // 응답을 보내고 계속 진행
    Reply(String),
    // 연결 종료
    Disconnect,
}

/// 요청 한 건 파싱 후 실행
pub async fn process_request(user: &User, state: &SharedState, request: &str) -> Outcome {
    let (command_name, args) = parse_command_name(request);
    info!(
        "{:<12} --> '{}' 커맨드 처리: user_id={}",
        "Command", command_name, user.id
    );

    let command = match Command::parse(command_name, args) {
        Ok(command) => command,
        Err(ParseError::UnknownCommand) => {
            return Outcome::Reply(format!(
                "Failed to execute unknown command '{}'. {}",
                command_name,
                help_text()
            ));
        }
        Err(ParseError::InvalidArguments) => {
            return Outcome::Reply(format!(
                "Failed to parse arguments for command '{command_name}'"
            ));
        }
    };

    let response = match command {
        Command::Ping(command) => command.execute(user, state).await,
        Command::Whoami(command) => command.execute(user, state).await,
        Command::Help(command) => command.execute(user, state).await,
        Command::Deposit(command) => command.execute(user, state).await,
        Command::Withdraw(command) => command.execute(user, state).await,
        Command::ViewItems(command) => command.execute(user, state).await,
        Command::Sell(command) => command.execute(user, state).await,
        Command::Buy(command) => command.execute(user, state).await,
        Command::ViewSellOrders(command) => command.execute(user, state).await,
        Command::Quit(_) => return Outcome::Disconnect,
    };
    Outcome::Reply(response)
}

// endregion: --- Dispatcher
