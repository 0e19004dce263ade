//! Row types and search routes for the list-backed views.
//!
//! Each route keeps the parameter convention its backend handler expects,
//! see [`ParamStyle`].

use crate::fetcher::{ParamStyle, SearchEndpoint};
use crate::http::ApiClient;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub member_count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub board_id: Option<i64>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub view_count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub assignee: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Party {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub contact: Option<String>,
}

impl ApiClient {
    pub fn organizations(&self) -> SearchEndpoint<Organization> {
        SearchEndpoint::new(self.clone(), "organizations/search", ParamStyle::OmitDefaults)
    }

    pub fn board_articles(&self, board_id: i64) -> SearchEndpoint<Article> {
        SearchEndpoint::new(
            self.clone(),
            format!("boards/{}/articles/search", board_id),
            ParamStyle::Explicit,
        )
    }

    pub fn board_tasks(&self, board_id: i64) -> SearchEndpoint<Task> {
        SearchEndpoint::new(
            self.clone(),
            format!("boards/{}/tasks/search", board_id),
            ParamStyle::OmitDefaults,
        )
    }

    pub fn organization_users(&self, organization_id: i64) -> SearchEndpoint<User> {
        SearchEndpoint::new(
            self.clone(),
            format!("organizations/{}/users/search", organization_id),
            ParamStyle::OmitDefaults,
        )
    }

    pub fn organization_parties(&self, organization_id: i64) -> SearchEndpoint<Party> {
        SearchEndpoint::new(
            self.clone(),
            format!("organizations/{}/parties/search", organization_id),
            ParamStyle::Explicit,
        )
    }
}
