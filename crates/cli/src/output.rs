//! Terminal rendering.
#![allow(clippy::print_stdout, clippy::print_stderr)]

use bento_core::{Cart, Order, OrderCounts, User};

pub fn line(text: &str) {
    println!("{text}");
}

/// The one line shown when a command fails.
pub fn failure(message: &str) {
    eprintln!("error: {message}");
}

pub fn user(user: &User) {
    println!("{} (#{}, {:?})", user.display_name(), user.id, user.role);
    if let Some(store_id) = user.store_id {
        println!("  store {store_id}");
    }
}

pub fn cart(cart: &Cart) {
    if cart.is_empty() {
        println!("Cart is empty");
        return;
    }
    for item in cart.items() {
        let note = if item.available { "" } else { "  (unavailable)" };
        println!(
            "#{:<5} {:<24} {:>8} x{:<3} {:>9}{note}",
            item.id,
            item.name,
            item.unit_price.to_string(),
            item.quantity,
            item.subtotal().to_string()
        );
    }
    println!("{} item(s), total {}", cart.item_count(), cart.total());
}

pub fn orders(orders: &[Order]) {
    for order in orders {
        let pickup = order
            .pickup_time
            .map(|t| t.format("%H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "#{:<5} {:<18} {:<20} x{:<3} {:>9}  {}  pickup {pickup}  {}",
            order.id,
            order.status.label(),
            order.menu_name,
            order.quantity,
            order.total_amount.to_string(),
            order.ordered_at.format("%Y-%m-%d %H:%M"),
            order.customer_name,
        );
        if let Some(notes) = &order.notes {
            println!("       note: {notes}");
        }
    }
}

pub fn counts(counts: &OrderCounts) {
    println!(
        "{} order(s): {} pending, {} ready",
        counts.total, counts.pending, counts.ready
    );
}
