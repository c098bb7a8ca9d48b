//! Cart and checkout commands.
//!
//! # Usage
//!
//! ```bash
//! bento cart add 10 --qty 2
//! bento cart set 5 3
//! bento cart remove 5
//! bento checkout --yes
//! ```

use bento_client::{CartError, CartModel, Confirmed, checkout as place_orders};
use bento_core::{CartItemId, MenuId, MenuRef, StoreId};

use super::Context;
use crate::output;

async fn loaded(ctx: &Context) -> Result<CartModel, CartError> {
    let mut cart = CartModel::new(ctx.api.clone());
    cart.load().await?;
    Ok(cart)
}

fn cart_error(e: CartError) -> Box<dyn std::error::Error> {
    e.user_message().into()
}

pub async fn show(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let cart = loaded(ctx).await.map_err(cart_error)?;
    output::cart(cart.snapshot());
    Ok(())
}

pub async fn add(
    ctx: &Context,
    menu_id: i64,
    store: Option<i64>,
    qty: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let store_id = store
        .map(StoreId::new)
        .or_else(|| ctx.session().selected_store())
        .ok_or("no store selected; pass --store or run 'bento store select'")?;
    let mut cart = CartModel::new(ctx.api.clone());
    let menu = MenuRef {
        id: MenuId::new(menu_id),
        store_id,
    };
    let snapshot = cart.add_item(menu, qty).await.map_err(cart_error)?;
    output::cart(snapshot);
    Ok(())
}

pub async fn set(ctx: &Context, item_id: i64, qty: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut cart = loaded(ctx).await.map_err(cart_error)?;
    let snapshot = cart
        .update_quantity(CartItemId::new(item_id), qty)
        .await
        .map_err(cart_error)?;
    output::cart(snapshot);
    Ok(())
}

pub async fn remove(ctx: &Context, item_id: i64) -> Result<(), Box<dyn std::error::Error>> {
    let mut cart = loaded(ctx).await.map_err(cart_error)?;
    match cart
        .remove_item(CartItemId::new(item_id), &mut ctx.confirm())
        .await
        .map_err(cart_error)?
    {
        Confirmed::Done(snapshot) => output::cart(snapshot),
        Confirmed::Declined => output::line("Nothing removed"),
    }
    Ok(())
}

pub async fn clear(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let mut cart = loaded(ctx).await.map_err(cart_error)?;
    match cart.clear(&mut ctx.confirm()).await.map_err(cart_error)? {
        Confirmed::Done(()) => output::line("Cart cleared"),
        Confirmed::Declined => output::line("Nothing removed"),
    }
    Ok(())
}

pub async fn checkout(ctx: &Context) -> Result<(), Box<dyn std::error::Error>> {
    let mut cart = CartModel::new(ctx.api.clone());
    match place_orders(&mut cart, &mut ctx.confirm()).await? {
        Confirmed::Done(receipt) => {
            output::orders(&receipt.orders);
            output::line(&format!("Total {}", receipt.total));
        }
        Confirmed::Declined => output::line("No order placed"),
    }
    Ok(())
}
