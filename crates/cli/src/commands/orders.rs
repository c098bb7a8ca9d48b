//! Store order board and customer order commands.
//!
//! # Usage
//!
//! ```bash
//! # Pending and ready orders, newest first
//! bento orders list
//!
//! # Everything from one day matching "karaage"
//! bento orders list --status pending,ready,completed,cancelled --from 2024-05-01 --to 2024-05-01 -q karaage
//!
//! # Or reuse a saved query string
//! bento orders list --query "status=completed&sort=price_high"
//!
//! bento orders watch --interval 10
//! bento orders set-status 42 cancelled --yes
//! ```

use std::time::Duration;

use bento_client::{Confirm, Confirmed, CustomerOrders, OrderBoard, OrderPoller, PollEvent, RefreshError, RefreshTrigger};
use bento_core::{OrderFilters, OrderId, OrderStatus, OrderSort};
use chrono::NaiveDate;
use clap::{Args, ValueEnum};
use tracing::info;

use super::Context;
use crate::output;

/// Board filters.
#[derive(Debug, Clone, Args)]
pub struct FilterArgs {
    /// Filters as a query string, e.g. `status=pending&sort=oldest`
    #[arg(long, conflicts_with_all = ["status", "from", "to", "search", "sort"])]
    query: Option<String>,

    /// Comma-separated statuses (default: pending,ready)
    #[arg(long, value_delimiter = ',')]
    status: Vec<OrderStatus>,

    /// First day to include (YYYY-MM-DD)
    #[arg(long)]
    from: Option<NaiveDate>,

    /// Last day to include (YYYY-MM-DD)
    #[arg(long)]
    to: Option<NaiveDate>,

    /// Free-text search over customer, menu and notes
    #[arg(short = 'q', long)]
    search: Option<String>,

    /// newest, oldest, price_high or price_low
    #[arg(long)]
    sort: Option<OrderSort>,
}

impl FilterArgs {
    fn to_filters(&self) -> Result<OrderFilters, Box<dyn std::error::Error>> {
        if let Some(query) = &self.query {
            return Ok(OrderFilters::from_query_string(query)?);
        }
        let mut filters = OrderFilters::default();
        if !self.status.is_empty() {
            filters.statuses = self.status.iter().copied().collect();
        }
        filters.start_date = self.from;
        filters.end_date = self.to;
        if let Some(search) = &self.search {
            filters.set_search(search);
        }
        if let Some(sort) = self.sort {
            filters.sort = sort;
        }
        Ok(filters)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SoundSetting {
    Show,
    On,
    Off,
    Toggle,
}

fn board(ctx: &Context, filters: OrderFilters) -> OrderBoard {
    let board = OrderBoard::new(ctx.api.clone(), ctx.notifications());
    board.set_filters(filters);
    board
}

fn refresh_error(e: RefreshError) -> Box<dyn std::error::Error> {
    match e {
        RefreshError::AuthExpired => "session expired; sign in again".into(),
        RefreshError::Api(e) => e.user_message().into(),
    }
}

pub async fn list(ctx: &Context, args: &FilterArgs) -> Result<(), Box<dyn std::error::Error>> {
    let filters = args.to_filters()?;
    info!(query = %filters.to_query_string(), "Listing orders");
    let board = board(ctx, filters);
    board.refresh(RefreshTrigger::Manual).await.map_err(refresh_error)?;
    output::counts(&board.counts());
    output::orders(&board.orders());
    Ok(())
}

pub async fn watch(ctx: &Context, args: &FilterArgs, interval: Option<u64>) -> Result<(), Box<dyn std::error::Error>> {
    let board = board(ctx, args.to_filters()?);
    {
        let mut notifications = board.notifications();
        if notifications.show_permission_banner() {
            if ctx.confirm().confirm("Show a notification for every new order?") {
                notifications.accept_banner();
            } else {
                notifications.dismiss_banner();
            }
        }
    }

    let interval = interval.map_or(ctx.config.poll_interval, Duration::from_secs);
    let mut poller = OrderPoller::new(board, ctx.config.search_debounce);
    let mut events = poller.start(interval);

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(PollEvent::Refreshed { counts, new_orders }) => {
                    output::orders(&new_orders);
                    output::counts(&counts);
                    let title = poller.board().notifications().window_title();
                    output::line(&title);
                }
                Some(PollEvent::RefreshFailed { message }) => output::line(&message),
                Some(PollEvent::AuthExpired { redirect }) => {
                    poller.stop();
                    return Err(format!("session expired; sign in again ({redirect})").into());
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => {
                poller.stop();
                break;
            }
        }
    }
    Ok(())
}

pub async fn set_status(ctx: &Context, order_id: i64, status: &str) -> Result<(), Box<dyn std::error::Error>> {
    let to: OrderStatus = status.parse()?;
    let id = OrderId::new(order_id);

    // Every status, so the order is found whatever state it is in.
    let mut filters = OrderFilters::default();
    filters.statuses.clear();
    let board = board(ctx, filters);
    board.refresh(RefreshTrigger::Manual).await.map_err(refresh_error)?;

    if let Some(control) = board.status_control(id) {
        info!(choices = ?control.values(), disabled = control.disabled, "Status choices");
    }
    match board.change_status(id, to, &mut ctx.confirm()).await? {
        Confirmed::Done(order) => output::orders(std::slice::from_ref(&order)),
        Confirmed::Declined => output::line("Status unchanged"),
    }
    Ok(())
}

pub async fn history(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let orders = CustomerOrders::new(ctx.api.clone()).history().await?;
    output::orders(&orders);
    Ok(())
}

pub async fn cancel(ctx: &Context, order_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let customer = CustomerOrders::new(ctx.api.clone());
    let id = OrderId::new(order_id);
    let order = customer
        .history()
        .await?
        .into_iter()
        .find(|o| o.id == id)
        .ok_or_else(|| format!("order {id} not found"))?;
    match customer.cancel(&order, &mut ctx.confirm()).await? {
        Confirmed::Done(order) => output::orders(std::slice::from_ref(&order)),
        Confirmed::Declined => output::line("Order kept"),
    }
    Ok(())
}

pub fn sound(ctx: &Context, setting: SoundSetting) {
    let mut notifications = ctx.notifications();
    let enabled = match setting {
        SoundSetting::Show => notifications.sound_enabled(),
        SoundSetting::On => notifications.set_sound_enabled(true),
        SoundSetting::Off => notifications.set_sound_enabled(false),
        SoundSetting::Toggle => notifications.toggle_sound(),
    };
    output::line(if enabled { "Sound on" } else { "Sound off" });
}
