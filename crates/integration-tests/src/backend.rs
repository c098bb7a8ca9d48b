//! Routes and data of the fake ordering backend.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use axum::extract::{Path, Query, Request, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{Value, json};

pub const PASSWORD: &str = "password123";
pub const STORE_1: i64 = 1;
pub const STORE_2: i64 = 2;
/// Karaage bento, ¥500, store 1.
pub const MENU_A: i64 = 1;
/// Onigiri set, ¥300, store 1.
pub const MENU_B: i64 = 2;
/// Saba bento, ¥700, store 2.
pub const MENU_C: i64 = 3;
/// Unavailable menu of store 1.
pub const MENU_SOLD_OUT: i64 = 4;

pub type Shared = Arc<Mutex<Db>>;

pub struct UserRecord {
    pub id: i64,
    pub username: &'static str,
    pub full_name: Option<&'static str>,
    pub role: &'static str,
    pub store_id: Option<i64>,
}

pub struct MenuRecord {
    pub id: i64,
    pub name: &'static str,
    pub price: i64,
    pub store_id: i64,
    pub available: bool,
}

pub struct Line {
    pub id: i64,
    pub menu_id: i64,
    pub quantity: i64,
}

#[derive(Default)]
pub struct GuestSession {
    pub selected_store: Option<i64>,
    pub items: Vec<Line>,
}

pub struct OrderRecord {
    pub id: i64,
    pub user_id: i64,
    pub menu_id: i64,
    pub store_id: i64,
    pub quantity: i64,
    pub total_price: i64,
    pub status: String,
    pub ordered_at: String,
    pub notes: Option<String>,
}

#[derive(Default)]
pub struct Db {
    pub users: Vec<UserRecord>,
    pub menus: Vec<MenuRecord>,
    pub tokens: HashMap<String, i64>,
    pub guests: HashMap<String, GuestSession>,
    pub user_carts: HashMap<i64, Vec<Line>>,
    pub orders: Vec<OrderRecord>,
    next_id: i64,
    pub hits: HashMap<String, usize>,
    pub delays: HashMap<String, VecDeque<Duration>>,
    /// `None` lets a request through untouched.
    pub failures: HashMap<String, VecDeque<Option<u16>>>,
}

impl Db {
    pub fn seeded() -> Self {
        Self {
            users: vec![
                UserRecord {
                    id: 1,
                    username: "customer1",
                    full_name: Some("Hanako Yamada"),
                    role: "customer",
                    store_id: None,
                },
                UserRecord {
                    id: 2,
                    username: "store1",
                    full_name: None,
                    role: "store",
                    store_id: Some(STORE_1),
                },
            ],
            menus: vec![
                menu(MENU_A, "Karaage bento", 500, STORE_1, true),
                menu(MENU_B, "Onigiri set", 300, STORE_1, true),
                menu(MENU_C, "Saba bento", 700, STORE_2, true),
                menu(MENU_SOLD_OUT, "Seasonal bento", 400, STORE_1, false),
            ],
            next_id: 100,
            ..Self::default()
        }
    }

    const fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    pub fn user_id(&self, username: &str) -> Option<i64> {
        self.users.iter().find(|u| u.username == username).map(|u| u.id)
    }

    fn user(&self, id: i64) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.id == id)
    }

    fn menu(&self, id: i64) -> Option<&MenuRecord> {
        self.menus.iter().find(|m| m.id == id)
    }

    pub fn insert_order(&mut self, customer: &str, menu_id: i64, quantity: i64) -> i64 {
        let user_id = self.user_id(customer).unwrap_or_default();
        let (store_id, price) = self.menu(menu_id).map_or((STORE_1, 0), |m| (m.store_id, m.price));
        let id = self.next_id();
        self.orders.push(OrderRecord {
            id,
            user_id,
            menu_id,
            store_id,
            quantity,
            total_price: price * quantity,
            status: "pending".to_string(),
            ordered_at: Utc::now().naive_utc().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            notes: None,
        });
        id
    }
}

const fn menu(id: i64, name: &'static str, price: i64, store_id: i64, available: bool) -> MenuRecord {
    MenuRecord {
        id,
        name,
        price,
        store_id,
        available,
    }
}

// =============================================================================
// Router
// =============================================================================

pub fn router(db: Shared) -> Router {
    Router::new()
        .route("/api/auth/login", post(login))
        .route("/api/auth/me", get(me))
        .route("/api/guest/session", post(guest_session))
        .route("/api/guest/session/store", post(guest_select_store))
        .route("/api/guest/cart", get(guest_cart))
        .route("/api/guest/cart/add", post(guest_cart_add))
        .route(
            "/api/guest/cart/item/{id}",
            put(guest_cart_update).delete(guest_cart_remove),
        )
        .route("/api/customer/menus/{id}", get(customer_menu))
        .route("/api/customer/cart", get(user_cart).delete(user_cart_clear))
        .route("/api/customer/cart/add", post(user_cart_add))
        .route("/api/customer/cart/migrate", post(user_cart_migrate))
        .route(
            "/api/customer/cart/{id}",
            put(user_cart_update).delete(user_cart_remove),
        )
        .route("/api/customer/orders", get(customer_orders).post(create_order))
        .route("/api/customer/orders/{id}/cancel", put(cancel_order))
        .route("/api/store/orders", get(store_orders))
        .route("/api/store/orders/{id}/status", put(update_status))
        .layer(middleware::from_fn_with_state(db.clone(), control))
        .with_state(db)
}

fn lock(db: &Shared) -> MutexGuard<'_, Db> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Counts requests and applies queued failures and delays.
async fn control(State(db): State<Shared>, request: Request, next: Next) -> Response {
    let route = format!("{} {}", request.method(), request.uri().path());
    let (failure, delay) = {
        let mut db = lock(&db);
        *db.hits.entry(route.clone()).or_default() += 1;
        let failure = db.failures.get_mut(&route).and_then(VecDeque::pop_front).flatten();
        let delay = db.delays.get_mut(&route).and_then(VecDeque::pop_front);
        (failure, delay)
    };

    if let Some(status) = failure {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        return detail(status, "Injected failure");
    }

    let response = next.run(request).await;
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    response
}

type Reply = Result<Json<Value>, Response>;

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn field_error(field: &str, message: &str) -> Response {
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(json!({ "detail": [{ "loc": ["body", field], "msg": message, "type": "value_error" }] })),
    )
        .into_response()
}

fn bearer_user(db: &Db, headers: &HeaderMap) -> Result<i64, Response> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .and_then(|token| db.tokens.get(token).copied())
        .ok_or_else(|| detail(StatusCode::UNAUTHORIZED, "Could not validate credentials"))
}

fn staff_store(db: &Db, headers: &HeaderMap) -> Result<i64, Response> {
    let user_id = bearer_user(db, headers)?;
    db.user(user_id)
        .filter(|u| u.role == "store")
        .and_then(|u| u.store_id)
        .ok_or_else(|| detail(StatusCode::FORBIDDEN, "Store staff only"))
}

fn guest_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == "guest_session_id")
        .map(|(_, value)| value.to_string())
}

fn user_json(user: &UserRecord) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "email": format!("{}@example.com", user.username),
        "full_name": user.full_name,
        "role": user.role,
        "is_active": true,
        "store_id": user.store_id,
        "user_roles": [],
    })
}

fn menu_json(menu: &MenuRecord) -> Value {
    json!({
        "id": menu.id,
        "name": menu.name,
        "price": menu.price,
        "image_url": null,
        "is_available": menu.available,
        "store_id": menu.store_id,
    })
}

fn store_order_json(db: &Db, order: &OrderRecord) -> Value {
    let menu = db.menu(order.menu_id);
    let user = db.user(order.user_id);
    json!({
        "id": order.id,
        "user_id": order.user_id,
        "menu_id": order.menu_id,
        "store_id": order.store_id,
        "quantity": order.quantity,
        "total_price": order.total_price,
        "status": order.status,
        "delivery_time": null,
        "notes": order.notes,
        "ordered_at": order.ordered_at,
        "menu": menu.map(|m| json!({ "name": m.name, "price": m.price })),
        "user": user.map(|u| json!({ "username": u.username, "full_name": u.full_name })),
    })
}

fn history_json(db: &Db, order: &OrderRecord) -> Value {
    let menu = db.menu(order.menu_id);
    json!({
        "id": order.id,
        "menu_id": order.menu_id,
        "menu_name": menu.map(|m| m.name),
        "menu_price": menu.map(|m| m.price),
        "quantity": order.quantity,
        "total_price": order.total_price,
        "status": order.status,
        "delivery_time": null,
        "notes": order.notes,
        "ordered_at": order.ordered_at,
    })
}

// =============================================================================
// Auth
// =============================================================================

#[derive(Deserialize)]
struct LoginBody {
    username: String,
    password: String,
}

async fn login(State(db): State<Shared>, Json(body): Json<LoginBody>) -> Reply {
    let mut db = lock(&db);
    let Some(user_id) = db.user_id(&body.username).filter(|_| body.password == PASSWORD) else {
        return Err(detail(StatusCode::UNAUTHORIZED, "Incorrect username or password"));
    };
    let token = format!("token-{user_id}-{}", db.next_id());
    db.tokens.insert(token.clone(), user_id);
    let user = db.user(user_id).map(user_json);
    Ok(Json(json!({ "access_token": token, "token_type": "bearer", "user": user })))
}

async fn me(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let db = lock(&db);
    let user_id = bearer_user(&db, &headers)?;
    Ok(Json(db.user(user_id).map(user_json).unwrap_or_default()))
}

// =============================================================================
// Guest session and cart
// =============================================================================

async fn guest_session(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let mut db = lock(&db);
    let session_id = match guest_cookie(&headers).filter(|id| db.guests.contains_key(id)) {
        Some(id) => id,
        None => {
            let id = format!("guest-{}", db.next_id());
            db.guests.insert(id.clone(), GuestSession::default());
            id
        }
    };
    let selected = db.guests.get(&session_id).and_then(|g| g.selected_store);
    Ok(Json(json!({ "session_id": session_id, "selected_store_id": selected })))
}

#[derive(Deserialize)]
struct StoreBody {
    store_id: i64,
}

fn guest_mut<'a>(db: &'a mut Db, headers: &HeaderMap) -> Result<(String, &'a mut GuestSession), Response> {
    let id = guest_cookie(headers).ok_or_else(|| detail(StatusCode::BAD_REQUEST, "No guest session"))?;
    match db.guests.get_mut(&id) {
        Some(session) => Ok((id, session)),
        None => Err(detail(StatusCode::NOT_FOUND, "Guest session not found")),
    }
}

async fn guest_select_store(State(db): State<Shared>, headers: HeaderMap, Json(body): Json<StoreBody>) -> Reply {
    let mut db = lock(&db);
    let (_, session) = guest_mut(&mut db, &headers)?;
    session.selected_store = Some(body.store_id);
    Ok(Json(json!({ "message": "Store selected", "store_id": body.store_id })))
}

fn guest_cart_json(db: &Db, session_id: &str) -> Value {
    let Some(session) = db.guests.get(session_id) else {
        return json!({ "session_id": session_id, "items": [] });
    };
    let items: Vec<Value> = session
        .items
        .iter()
        .map(|line| {
            json!({
                "id": line.id,
                "menu_id": line.menu_id,
                "quantity": line.quantity,
                "added_at": "2024-05-01T12:00:00",
                "menu": db.menu(line.menu_id).map(menu_json),
            })
        })
        .collect();
    let total_amount: i64 = session
        .items
        .iter()
        .filter_map(|l| db.menu(l.menu_id).map(|m| m.price * l.quantity))
        .sum();
    json!({
        "session_id": session_id,
        "selected_store_id": session.selected_store,
        "items": items,
        "total_items": session.items.iter().map(|l| l.quantity).sum::<i64>(),
        "total_amount": total_amount,
    })
}

async fn guest_cart(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let mut db = lock(&db);
    let (id, _) = guest_mut(&mut db, &headers)?;
    Ok(Json(guest_cart_json(&db, &id)))
}

#[derive(Deserialize)]
struct AddBody {
    menu_id: i64,
    quantity: i64,
}

fn check_menu(db: &Db, menu_id: i64, quantity: i64) -> Result<i64, Response> {
    if quantity < 1 {
        return Err(field_error("quantity", "Input should be greater than or equal to 1"));
    }
    let menu = db
        .menu(menu_id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Menu not found"))?;
    if !menu.available {
        return Err(detail(StatusCode::BAD_REQUEST, "Menu is not available"));
    }
    Ok(menu.store_id)
}

async fn guest_cart_add(State(db): State<Shared>, headers: HeaderMap, Json(body): Json<AddBody>) -> Reply {
    let mut db = lock(&db);
    let store_id = check_menu(&db, body.menu_id, body.quantity)?;
    let new_id = db.next_id();
    let (id, _) = guest_mut(&mut db, &headers)?;
    let other_store = db.guests.get(&id).is_some_and(|session| {
        session
            .items
            .iter()
            .any(|l| db.menu(l.menu_id).is_some_and(|m| m.store_id != store_id))
    });
    if other_store {
        return Err(detail(StatusCode::BAD_REQUEST, "Cart already contains items from another store"));
    }
    let (id, session) = guest_mut(&mut db, &headers)?;
    session.selected_store = Some(store_id);
    match session.items.iter_mut().find(|l| l.menu_id == body.menu_id) {
        Some(line) => line.quantity += body.quantity,
        None => session.items.push(Line {
            id: new_id,
            menu_id: body.menu_id,
            quantity: body.quantity,
        }),
    }
    Ok(Json(guest_cart_json(&db, &id)))
}

#[derive(Deserialize)]
struct QuantityBody {
    quantity: i64,
}

async fn guest_cart_update(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Json(body): Json<QuantityBody>,
) -> Reply {
    let mut db = lock(&db);
    if body.quantity < 1 {
        return Err(field_error("quantity", "Input should be greater than or equal to 1"));
    }
    let (id, session) = guest_mut(&mut db, &headers)?;
    let line = session
        .items
        .iter_mut()
        .find(|l| l.id == item_id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Cart item not found"))?;
    line.quantity = body.quantity;
    Ok(Json(guest_cart_json(&db, &id)))
}

async fn guest_cart_remove(State(db): State<Shared>, headers: HeaderMap, Path(item_id): Path<i64>) -> Reply {
    let mut db = lock(&db);
    let (id, session) = guest_mut(&mut db, &headers)?;
    let before = session.items.len();
    session.items.retain(|l| l.id != item_id);
    if session.items.len() == before {
        return Err(detail(StatusCode::NOT_FOUND, "Cart item not found"));
    }
    Ok(Json(guest_cart_json(&db, &id)))
}

// =============================================================================
// User cart
// =============================================================================

fn user_line_json(db: &Db, line: &Line) -> Value {
    let menu = db.menu(line.menu_id);
    let price = menu.map_or(0, |m| m.price);
    json!({
        "id": line.id,
        "menu_id": line.menu_id,
        "menu_name": menu.map_or("", |m| m.name),
        "menu_price": price,
        "menu_image_url": null,
        "quantity": line.quantity,
        "subtotal": price * line.quantity,
    })
}

fn customer(db: &Db, headers: &HeaderMap) -> Result<i64, Response> {
    let user_id = bearer_user(db, headers)?;
    match db.user(user_id) {
        Some(user) if user.role == "customer" => Ok(user_id),
        _ => Err(detail(StatusCode::FORBIDDEN, "Customers only")),
    }
}

async fn customer_menu(State(db): State<Shared>, headers: HeaderMap, Path(menu_id): Path<i64>) -> Reply {
    let db = lock(&db);
    customer(&db, &headers)?;
    db.menu(menu_id)
        .filter(|m| m.available)
        .map(|m| Json(menu_json(m)))
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Menu not found"))
}

async fn user_cart(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let db = lock(&db);
    let user_id = customer(&db, &headers)?;
    let lines = db.user_carts.get(&user_id).map(Vec::as_slice).unwrap_or_default();
    let items: Vec<Value> = lines.iter().map(|l| user_line_json(&db, l)).collect();
    let total_price: i64 = lines
        .iter()
        .filter_map(|l| db.menu(l.menu_id).map(|m| m.price * l.quantity))
        .sum();
    Ok(Json(json!({
        "items": items,
        "total_price": total_price,
        "total_items": lines.iter().map(|l| l.quantity).sum::<i64>(),
    })))
}

/// Add to a user cart, merging with an existing line for the same menu.
fn add_user_line(db: &mut Db, user_id: i64, menu_id: i64, quantity: i64) -> i64 {
    let new_id = db.next_id();
    let lines = db.user_carts.entry(user_id).or_default();
    if let Some(line) = lines.iter_mut().find(|l| l.menu_id == menu_id) {
        line.quantity += quantity;
        return line.id;
    }
    lines.push(Line {
        id: new_id,
        menu_id,
        quantity,
    });
    new_id
}

fn user_line(db: &Db, user_id: i64, line_id: i64) -> Option<Value> {
    db.user_carts
        .get(&user_id)?
        .iter()
        .find(|l| l.id == line_id)
        .map(|l| user_line_json(db, l))
}

async fn user_cart_add(State(db): State<Shared>, headers: HeaderMap, Json(body): Json<AddBody>) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    check_menu(&db, body.menu_id, body.quantity)?;
    let line_id = add_user_line(&mut db, user_id, body.menu_id, body.quantity);
    Ok(Json(user_line(&db, user_id, line_id).unwrap_or_default()))
}

#[derive(Deserialize)]
struct QuantityQuery {
    quantity: i64,
}

async fn user_cart_update(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path(item_id): Path<i64>,
    Query(query): Query<QuantityQuery>,
) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    if query.quantity < 1 {
        return Err(field_error("quantity", "Input should be greater than or equal to 1"));
    }
    let line = db
        .user_carts
        .get_mut(&user_id)
        .and_then(|lines| lines.iter_mut().find(|l| l.id == item_id))
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Cart item not found"))?;
    line.quantity = query.quantity;
    Ok(Json(user_line(&db, user_id, item_id).unwrap_or_default()))
}

async fn user_cart_remove(State(db): State<Shared>, headers: HeaderMap, Path(item_id): Path<i64>) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    let lines = db.user_carts.entry(user_id).or_default();
    let before = lines.len();
    lines.retain(|l| l.id != item_id);
    if lines.len() == before {
        return Err(detail(StatusCode::NOT_FOUND, "Cart item not found"));
    }
    Ok(Json(json!({ "message": "Item removed from cart" })))
}

async fn user_cart_clear(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    db.user_carts.remove(&user_id);
    Ok(Json(json!({ "message": "Cart cleared" })))
}

async fn user_cart_migrate(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    let guest_lines: Vec<Line> = guest_cookie(&headers)
        .and_then(|id| db.guests.get_mut(&id).map(|session| std::mem::take(&mut session.items)))
        .unwrap_or_default();
    let migrated = guest_lines.len();
    for line in guest_lines {
        add_user_line(&mut db, user_id, line.menu_id, line.quantity);
    }
    Ok(Json(json!({
        "migrated_count": migrated,
        "message": format!("{migrated} item(s) migrated"),
    })))
}

// =============================================================================
// Orders
// =============================================================================

async fn create_order(State(db): State<Shared>, headers: HeaderMap, Json(body): Json<AddBody>) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    check_menu(&db, body.menu_id, body.quantity)?;
    let username = db.user(user_id).map(|u| u.username).unwrap_or_default();
    let id = db.insert_order(username, body.menu_id, body.quantity);
    let order = db.orders.iter().find(|o| o.id == id).map(|o| history_json(&db, o));
    Ok(Json(order.unwrap_or_default()))
}

async fn customer_orders(State(db): State<Shared>, headers: HeaderMap) -> Reply {
    let db = lock(&db);
    let user_id = customer(&db, &headers)?;
    let orders: Vec<Value> = db
        .orders
        .iter()
        .rev()
        .filter(|o| o.user_id == user_id)
        .map(|o| history_json(&db, o))
        .collect();
    Ok(Json(json!({ "orders": orders })))
}

async fn cancel_order(State(db): State<Shared>, headers: HeaderMap, Path(order_id): Path<i64>) -> Reply {
    let mut db = lock(&db);
    let user_id = customer(&db, &headers)?;
    let order = db
        .orders
        .iter_mut()
        .find(|o| o.id == order_id && o.user_id == user_id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Order not found"))?;
    if order.status != "pending" {
        return Err(detail(StatusCode::BAD_REQUEST, "Only pending orders can be cancelled"));
    }
    order.status = "cancelled".to_string();
    let order = db.orders.iter().find(|o| o.id == order_id).map(|o| history_json(&db, o));
    Ok(Json(order.unwrap_or_default()))
}

fn matches_query(db: &Db, order: &OrderRecord, query: &HashMap<String, String>) -> bool {
    if let Some(statuses) = query.get("status").filter(|s| !s.is_empty())
        && !statuses.split(',').any(|s| s == order.status)
    {
        return false;
    }
    let day = order.ordered_at.get(..10).unwrap_or_default();
    if query.get("start_date").is_some_and(|start| day < start.as_str()) {
        return false;
    }
    if query.get("end_date").is_some_and(|end| day > end.as_str()) {
        return false;
    }
    if let Some(q) = query.get("q").map(|q| q.to_lowercase()) {
        let menu = db.menu(order.menu_id).map_or("", |m| m.name).to_lowercase();
        let customer = db.user(order.user_id).map_or("", |u| u.username).to_lowercase();
        let notes = order.notes.clone().unwrap_or_default().to_lowercase();
        if !(menu.contains(&q) || customer.contains(&q) || notes.contains(&q)) {
            return false;
        }
    }
    true
}

async fn store_orders(
    State(db): State<Shared>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Reply {
    let db = lock(&db);
    let store_id = staff_store(&db, &headers)?;
    let mut orders: Vec<&OrderRecord> = db
        .orders
        .iter()
        .filter(|o| o.store_id == store_id && matches_query(&db, o, &query))
        .collect();
    match query.get("sort").map(String::as_str) {
        Some("oldest") => orders.sort_by_key(|o| o.id),
        Some("price_high") => orders.sort_by_key(|o| std::cmp::Reverse(o.total_price)),
        Some("price_low") => orders.sort_by_key(|o| o.total_price),
        _ => orders.sort_by_key(|o| std::cmp::Reverse(o.id)),
    }
    let total = orders.len();
    let body: Vec<Value> = orders.into_iter().map(|o| store_order_json(&db, o)).collect();
    Ok(Json(json!({ "orders": body, "total": total })))
}

/// The backend's own copy of the transition table.
fn transition_allowed(from: &str, to: &str) -> bool {
    matches!(
        (from, to),
        ("pending", "ready" | "cancelled") | ("ready", "completed")
    )
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

async fn update_status(
    State(db): State<Shared>,
    headers: HeaderMap,
    Path(order_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Reply {
    let mut db = lock(&db);
    let store_id = staff_store(&db, &headers)?;
    if !["pending", "ready", "completed", "cancelled"].contains(&body.status.as_str()) {
        return Err(field_error("status", "Input should be 'pending', 'ready', 'completed' or 'cancelled'"));
    }
    let order = db
        .orders
        .iter_mut()
        .find(|o| o.id == order_id && o.store_id == store_id)
        .ok_or_else(|| detail(StatusCode::NOT_FOUND, "Order not found"))?;
    if !transition_allowed(&order.status, &body.status) {
        let message = format!(
            "Invalid status transition from '{}' to '{}'",
            order.status, body.status
        );
        return Err(detail(StatusCode::BAD_REQUEST, &message));
    }
    order.status = body.status;
    let order = db.orders.iter().find(|o| o.id == order_id).map(|o| store_order_json(&db, o));
    Ok(Json(order.unwrap_or_default()))
}
