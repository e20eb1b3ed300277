//! Demo catalogue endpoints.
//!
//! A fixed in-memory catalogue showing pagination, typed errors and request
//! validation flowing through the platform pipeline.

use actix_web::{HttpResponse, web};
use pagination::{Page, PageQuery};
use serde::{Deserialize, Serialize};

use platform_kit::utils::{sanitize_input, to_snake_case};
use platform_kit::inbound::http::{ValidJson, ValidQuery};
use platform_kit::{ApiResult, AppSettings, Error};

/// Number of entries in the demo catalogue.
pub const CATALOGUE_SIZE: u32 = 250;

/// One catalogue entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    /// Position in the catalogue, starting at one.
    pub id: u32,
    /// Display name.
    pub name: String,
}

impl Item {
    fn numbered(id: u32) -> Self {
        Self {
            id,
            name: format!("item-{id}"),
        }
    }
}

/// Body accepted by [`create_item`].
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewItem {
    /// Display name; trimmed and HTML-escaped before it is echoed.
    pub name: String,
    /// Optional slug, normalised to `snake_case`.
    #[serde(default)]
    pub slug: Option<String>,
}

/// Echo of a created item.
#[derive(Debug, Serialize)]
pub struct CreatedItem {
    /// Sanitised display name.
    pub name: String,
    /// Normalised slug.
    pub slug: Option<String>,
}

/// `GET /api/v1/items?skip=&limit=`
pub async fn list_items(
    ValidQuery(query): ValidQuery<PageQuery>,
    settings: web::Data<AppSettings>,
) -> HttpResponse {
    let params = query.into_params(settings.max_page_limit());
    let first = u32::try_from(params.skip()).unwrap_or(CATALOGUE_SIZE);
    let take = usize::try_from(params.limit()).unwrap_or(usize::MAX);
    let items = (first..CATALOGUE_SIZE)
        .take(take)
        .map(|index| Item::numbered(index + 1))
        .collect();
    HttpResponse::Ok().json(Page::new(items, params).with_total(u64::from(CATALOGUE_SIZE)))
}

/// `GET /api/v1/items/{id}`
pub async fn get_item(id: web::Path<u32>) -> ApiResult<HttpResponse> {
    let id = id.into_inner();
    if id == 0 || id > CATALOGUE_SIZE {
        return Err(Error::not_found().with_detail("id", id).into());
    }
    Ok(HttpResponse::Ok().json(Item::numbered(id)))
}

/// `POST /api/v1/items`
pub async fn create_item(ValidJson(body): ValidJson<NewItem>) -> ApiResult<HttpResponse> {
    let NewItem { name, slug } = body;
    let name = sanitize_input(&name);
    if name.is_empty() {
        return Err(Error::validation()
            .with_detail("field", "body -> name")
            .into());
    }
    Ok(HttpResponse::Created().json(CreatedItem {
        name,
        slug: slug.as_deref().map(to_snake_case),
    }))
}
