use std::str::FromStr;

use db::models::pagination::{PageRequest, SortOrder};
use serde::Deserialize;

use crate::error::ApiError;

pub mod auth;
pub mod documents;
pub mod flashcards;
pub mod health;
pub mod topics;

/// `?page=&limit=&sort=&order=` shared by every list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

/// A validated page window plus ordering.
pub struct ListParams<S> {
    pub page: PageRequest,
    pub sort: S,
    pub order: SortOrder,
}

impl ListQuery {
    pub fn resolve<S>(&self) -> Result<ListParams<S>, ApiError>
    where
        S: FromStr + Default,
    {
        resolve_list(self.page, self.limit, self.sort.as_deref(), self.order.as_deref())
    }
}

pub fn resolve_list<S>(
    page: Option<u32>,
    limit: Option<u32>,
    sort: Option<&str>,
    order: Option<&str>,
) -> Result<ListParams<S>, ApiError>
where
    S: FromStr + Default,
{
    let page = PageRequest::new(page, limit)?;
    let sort = match sort {
        None => S::default(),
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("unsupported sort field: {value}")))?,
    };
    let order = match order {
        None => SortOrder::default(),
        Some(value) => value
            .parse()
            .map_err(|_| ApiError::BadRequest(format!("order must be asc or desc, got {value}")))?,
    };
    Ok(ListParams { page, sort, order })
}
