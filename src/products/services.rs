use tracing::{info, warn};
use uuid::Uuid;

use super::{
    dto::{CreateProductRequest, UpdateProductRequest},
    repo_types::{NewProduct, Product},
};
use crate::{auth::extractors::AuthUser, error::AppError, policy, state::AppState};

/// The requester always becomes the owner.
pub async fn create(
    st: &AppState,
    attrs: CreateProductRequest,
    requester_id: Uuid,
) -> Result<Product, AppError> {
    let product = st
        .products
        .insert(NewProduct {
            name: attrs.name.trim().to_owned(),
            description: attrs.description,
            price: attrs.price,
            stock: attrs.stock,
            owner_id: requester_id,
        })
        .await?;
    info!(product_id = %product.id, owner_id = %requester_id, "product created");
    Ok(product)
}

pub async fn find_all(st: &AppState) -> Result<Vec<Product>, AppError> {
    Ok(st.products.list().await?)
}

pub async fn find_one(st: &AppState, id: Uuid) -> Result<Product, AppError> {
    st.products
        .find(id)
        .await?
        .ok_or_else(|| AppError::product_not_found(id))
}

fn authorize(product: &Product, requester: &AuthUser, action: &str) -> Result<(), AppError> {
    if policy::can_mutate(requester.id, requester.role, product.owner_id) {
        return Ok(());
    }
    warn!(
        product_id = %product.id,
        owner_id = %product.owner_id,
        requester_id = %requester.id,
        action,
        "product mutation denied"
    );
    Err(AppError::Forbidden(format!(
        "You are not allowed to {} this product",
        action
    )))
}

/// Resolve, then authorize, then write. A denied request writes nothing.
pub async fn update(
    st: &AppState,
    id: Uuid,
    patch: UpdateProductRequest,
    requester: &AuthUser,
) -> Result<Product, AppError> {
    let mut product = find_one(st, id).await?;
    authorize(&product, requester, "update")?;

    if let Some(name) = patch.name {
        product.name = name.trim().to_owned();
    }
    if let Some(description) = patch.description {
        product.description = description;
    }
    if let Some(price) = patch.price {
        product.price = price;
    }
    if let Some(stock) = patch.stock {
        product.stock = stock;
    }

    let updated = st
        .products
        .update(&product)
        .await?
        .ok_or_else(|| AppError::product_not_found(id))?;
    info!(product_id = %id, requester_id = %requester.id, "product updated");
    Ok(updated)
}

/// Same ordering as `update`. Zero rows deleted after a successful lookup
/// means someone else removed it first, which is reported as `NotFound`.
pub async fn remove(st: &AppState, id: Uuid, requester: &AuthUser) -> Result<(), AppError> {
    let product = find_one(st, id).await?;
    authorize(&product, requester, "delete")?;

    let affected = st.products.delete(id).await?;
    if affected == 0 {
        return Err(AppError::product_not_found(id));
    }
    info!(product_id = %id, requester_id = %requester.id, "product deleted");
    Ok(())
}
