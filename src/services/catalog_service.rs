use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::ActiveValue::{NotSet, Set};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect,
};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::services::{CreateServiceRequest, ServiceList, UpdateServiceRequest},
    entity::services::{
        ActiveModel as ServiceActive, Column as ServiceCol, Entity as Services,
        Model as ServiceModel,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::Service,
    response::{ApiResponse, Meta},
    routes::params::ServiceListQuery,
    state::AppState,
};

pub async fn create_service(
    state: &AppState,
    user: &AuthUser,
    payload: CreateServiceRequest,
) -> AppResult<ApiResponse<Service>> {
    ensure_admin(user)?;
    payload
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    if payload.price <= Decimal::ZERO {
        return Err(AppError::Validation("price must be positive".into()));
    }

    let exists = Services::find()
        .filter(ServiceCol::Name.eq(payload.name.as_str()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::Validation(
            "A service with that name already exists".into(),
        ));
    }

    let service = ServiceActive {
        id: Set(Uuid::new_v4()),
        name: Set(payload.name),
        description: Set(payload.description),
        price: Set(payload.price),
        category: Set(payload.category),
        active: Set(true),
        created_at: NotSet,
    }
    .insert(&state.orm)
    .await?;

    Ok(ApiResponse::success(
        "Service created",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

pub async fn list_services(
    state: &AppState,
    query: ServiceListQuery,
) -> AppResult<ApiResponse<ServiceList>> {
    let (page, limit, offset) = query.pagination.normalize();

    let mut condition = Condition::all();
    if !query.include_inactive.unwrap_or(false) {
        condition = condition.add(ServiceCol::Active.eq(true));
    }
    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(ServiceCol::Category.eq(category.clone()));
    }

    let finder = Services::find()
        .filter(condition)
        .order_by_asc(ServiceCol::Name);

    let total = finder.clone().count(&state.orm).await? as i64;

    let services = finder
        .limit(limit as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(service_from_entity)
        .collect();

    Ok(ApiResponse::success(
        "Ok",
        ServiceList { items: services },
        Some(Meta::new(page, limit, total)),
    ))
}

pub async fn get_service(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Service>> {
    let service = Services::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success(
        "Ok",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

pub async fn update_service(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateServiceRequest,
) -> AppResult<ApiResponse<Service>> {
    ensure_admin(user)?;
    let service = Services::find_by_id(id)
        .one(&state.orm)
        .await?
        .ok_or(AppError::NotFound)?;

    let mut active: ServiceActive = service.into();
    if let Some(name) = payload.name {
        if name.is_empty() {
            return Err(AppError::Validation("name must not be empty".into()));
        }
        active.name = Set(name);
    }
    if let Some(description) = payload.description {
        active.description = Set(Some(description));
    }
    if let Some(price) = payload.price {
        if price <= Decimal::ZERO {
            return Err(AppError::Validation("price must be positive".into()));
        }
        active.price = Set(price);
    }
    if let Some(category) = payload.category {
        active.category = Set(Some(category));
    }
    if let Some(is_active) = payload.active {
        active.active = Set(is_active);
    }

    let service = active.update(&state.orm).await?;

    Ok(ApiResponse::success(
        "Service updated",
        service_from_entity(service),
        Some(Meta::empty()),
    ))
}

pub fn service_from_entity(model: ServiceModel) -> Service {
    Service {
        id: model.id,
        name: model.name,
        description: model.description,
        price: model.price,
        category: model.category,
        active: model.active,
        created_at: model.created_at.with_timezone(&Utc),
    }
}
