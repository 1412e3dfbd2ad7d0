//! CRUD operations over Hydra collections.

use crate::providers::filter_mapping::{
    FieldCatalog, Filter, ParamValue, QueryParams, Sorter, build_query_string, map_filters,
    map_sorters,
};
use crate::providers::http_client::{Body, HttpClient, HttpError, JSON_LD, MERGE_PATCH};
use crate::providers::normalizers::{
    extract_items_from_hydra_response, extract_total_from_hydra_response, normalize,
    process_enquiry_data,
};
use futures::future::try_join_all;
use reqwest::header::LOCATION;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, instrument};

pub const DEFAULT_PAGE_SIZE: u32 = 10;

/// Screener views backed by the shared `assets` collection.
const RESOURCE_ALIASES: [(&str, &str); 4] = [
    ("funds", "assets"),
    ("forex", "assets"),
    ("crypto", "assets"),
    ("indexes", "assets"),
];

pub fn endpoint_for(resource: &str) -> &str {
    RESOURCE_ALIASES
        .iter()
        .find(|(alias, _)| *alias == resource)
        .map_or(resource, |&(_, endpoint)| endpoint)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pagination {
    pub current_page: u32,
    pub page_size: u32,
}

#[derive(Debug, Clone, Default)]
pub struct ListParams {
    pub filters: Vec<Filter>,
    pub sorters: Vec<Sorter>,
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListResult {
    pub data: Vec<Value>,
    pub total: u64,
}

fn has_content(body: &Body) -> bool {
    match body {
        Body::Json(Value::Object(map)) => !map.is_empty(),
        Body::Json(Value::Array(items)) => !items.is_empty(),
        Body::Json(Value::String(s)) | Body::Text(s) => !s.is_empty(),
        Body::Json(Value::Null) => false,
        Body::Json(_) => true,
    }
}

pub struct DataProvider {
    http: Arc<HttpClient>,
    catalog: FieldCatalog,
    page_size: u32,
}

impl DataProvider {
    pub fn new(http: Arc<HttpClient>, catalog: FieldCatalog) -> Self {
        DataProvider {
            http,
            catalog,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Page size used when a list call carries no pagination.
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn api_url(&self) -> &str {
        self.http.base_url()
    }

    fn list_params(&self, params: &ListParams) -> QueryParams {
        let mut query = map_filters(&params.filters, &self.catalog);
        query.extend(map_sorters(&params.sorters));

        let (page, size) = params
            .pagination
            .map_or((1, self.page_size), |p| (p.current_page, p.page_size));
        query.insert("page".to_string(), ParamValue::Scalar(json!(page)));
        query.insert("itemsPerPage".to_string(), ParamValue::Scalar(json!(size)));
        query
    }

    #[instrument(name = "GetList", skip(self, params), fields(resource = %resource))]
    pub async fn get_list(&self, resource: &str, params: &ListParams) -> Result<ListResult, HttpError> {
        let endpoint = endpoint_for(resource);
        let query = build_query_string(&self.list_params(params));
        let response = self.http.get(&format!("/{endpoint}{query}")).await?;
        let data = response.data.into_json();

        let items: Vec<Value> = extract_items_from_hydra_response(&data)
            .into_iter()
            .map(|item| {
                if resource == "enquiries" {
                    process_enquiry_data(item)
                } else {
                    normalize(item)
                }
            })
            .collect();
        let total = extract_total_from_hydra_response(&data, items.len() as u64);
        debug!(items = items.len(), total, "Fetched list");

        Ok(ListResult { data: items, total })
    }

    #[instrument(name = "GetOne", skip(self), fields(resource = %resource, id = %id))]
    pub async fn get_one(&self, resource: &str, id: &str) -> Result<Value, HttpError> {
        let endpoint = endpoint_for(resource);
        let response = self.http.get(&format!("/{endpoint}/{id}")).await?;
        Ok(normalize(response.data.into_json()))
    }

    /// Fetches every id concurrently; the first failure fails the batch.
    pub async fn get_many(&self, resource: &str, ids: &[String]) -> Result<Vec<Value>, HttpError> {
        let endpoint = endpoint_for(resource);
        let requests = ids
            .iter()
            .map(|id| async move { self.http.get(&format!("/{endpoint}/{id}")).await });
        let responses = try_join_all(requests).await?;
        Ok(responses
            .into_iter()
            .map(|r| normalize(r.data.into_json()))
            .collect())
    }

    #[instrument(name = "Create", skip(self, variables), fields(resource = %resource))]
    pub async fn create(&self, resource: &str, variables: Value) -> Result<Value, HttpError> {
        let endpoint = endpoint_for(resource);
        let response = self
            .http
            .post(&format!("/{endpoint}"), variables, JSON_LD)
            .await?;

        if response.status == 201 && has_content(&response.data) {
            return Ok(normalize(response.data.into_json()));
        }

        let location = response
            .headers
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .filter(|v| !v.is_empty())
            .map(|v| self.http.resolve_location(v));
        if let Some(location) = location {
            debug!(%location, "Following Location header");
            let created = self.http.get(&location).await?;
            return Ok(normalize(created.data.into_json()));
        }

        Ok(normalize(response.data.into_json()))
    }

    #[instrument(name = "Update", skip(self, variables), fields(resource = %resource, id = %id))]
    pub async fn update(&self, resource: &str, id: &str, variables: Value) -> Result<Value, HttpError> {
        let endpoint = endpoint_for(resource);
        let response = self
            .http
            .patch(&format!("/{endpoint}/{id}"), variables, MERGE_PATCH)
            .await?;
        Ok(normalize(response.data.into_json()))
    }

    #[instrument(name = "DeleteOne", skip(self), fields(resource = %resource, id = %id))]
    pub async fn delete_one(&self, resource: &str, id: &str) -> Result<Value, HttpError> {
        let endpoint = endpoint_for(resource);
        self.http.delete(&format!("/{endpoint}/{id}")).await?;
        Ok(json!({ "id": id }))
    }
}
