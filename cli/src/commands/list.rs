use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use orgboard_sdk::{
    Article, ListController, Organization, Party, QueryState, SearchBy, SearchEndpoint,
    SortDirection, Task, User,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::Context;
use crate::ui;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Resource {
    Organizations,
    Articles,
    Tasks,
    Users,
    Parties,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// What to list
    #[arg(value_enum)]
    pub resource: Resource,

    /// Organization id (users, parties)
    #[arg(long)]
    pub org: Option<i64>,

    /// Board id (articles, tasks); defaults to the last board used
    #[arg(long)]
    pub board: Option<i64>,

    /// Free-text filter
    #[arg(short, long)]
    pub search: Option<String>,

    /// Field the filter applies to (default: all)
    #[arg(long)]
    pub search_by: Option<String>,

    /// Zero-based page index
    #[arg(short, long, default_value_t = 0)]
    pub page: u32,

    /// Rows per page (default from orgboard.toml)
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Field to sort by
    #[arg(long, default_value = "id")]
    pub sort_by: String,

    /// Sort ascending instead of descending
    #[arg(long)]
    pub asc: bool,
}

impl ListArgs {
    fn query(&self, base: QueryState) -> Result<QueryState> {
        let mut query = base;
        if let Some(page_size) = self.page_size {
            if page_size == 0 {
                anyhow::bail!("--page-size must be positive");
            }
            query = query.with_page_size(page_size);
        }
        let direction = if self.asc {
            SortDirection::Asc
        } else {
            SortDirection::Desc
        };
        Ok(query
            .with_search(self.search.clone().unwrap_or_default())
            .with_search_by(SearchBy::field(self.search_by.clone().unwrap_or_default()))
            .with_sort(&self.sort_by, direction)
            .with_page(self.page))
    }
}

/// Table layout for one row type.
trait TableRow {
    const HEADERS: &'static [&'static str];
    fn cells(&self) -> Vec<String>;
}

fn opt<T: ToString>(value: &Option<T>) -> String {
    value.as_ref().map(ToString::to_string).unwrap_or_default()
}

impl TableRow for Organization {
    const HEADERS: &'static [&'static str] = &["ID", "NAME", "MEMBERS", "DESCRIPTION"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            opt(&self.member_count),
            opt(&self.description),
        ]
    }
}

impl TableRow for Article {
    const HEADERS: &'static [&'static str] = &["ID", "TITLE", "AUTHOR", "VIEWS", "CREATED"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            opt(&self.author),
            opt(&self.view_count),
            opt(&self.created_at),
        ]
    }
}

impl TableRow for Task {
    const HEADERS: &'static [&'static str] = &["ID", "TITLE", "STATUS", "ASSIGNEE", "DUE"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.title.clone(),
            opt(&self.status),
            opt(&self.assignee),
            opt(&self.due_date),
        ]
    }
}

impl TableRow for User {
    const HEADERS: &'static [&'static str] = &["ID", "USERNAME", "EMAIL", "PHONE", "ROLE"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.username.clone(),
            opt(&self.email),
            opt(&self.phone),
            opt(&self.role),
        ]
    }
}

impl TableRow for Party {
    const HEADERS: &'static [&'static str] = &["ID", "NAME", "KIND", "CONTACT"];

    fn cells(&self) -> Vec<String> {
        vec![
            self.id.to_string(),
            self.name.clone(),
            opt(&self.kind),
            opt(&self.contact),
        ]
    }
}

pub async fn list(ctx: &Context, args: ListArgs) -> Result<()> {
    let query = args.query(ctx.config.initial_query())?;
    let api = &ctx.api;

    match args.resource {
        Resource::Organizations => show(ctx, api.organizations(), query).await,
        Resource::Articles => {
            let board = board_id(ctx, args.board)?;
            show(ctx, api.board_articles(board), query).await
        }
        Resource::Tasks => {
            let board = board_id(ctx, args.board)?;
            show(ctx, api.board_tasks(board), query).await
        }
        Resource::Users => {
            let org = args.org.context("--org is required for users")?;
            show(ctx, api.organization_users(org), query).await
        }
        Resource::Parties => {
            let org = args.org.context("--org is required for parties")?;
            show(ctx, api.organization_parties(org), query).await
        }
    }
}

fn board_id(ctx: &Context, explicit: Option<i64>) -> Result<i64> {
    if let Some(id) = explicit {
        ctx.session.remember_board(&id.to_string())?;
        return Ok(id);
    }
    let Some(last) = ctx.session.last_board() else {
        anyhow::bail!("No board selected. Pass --board <id> or run 'ob board use <id>'.");
    };
    last.parse()
        .with_context(|| format!("Stored board id '{}' is not a number", last))
}

async fn show<T>(ctx: &Context, source: SearchEndpoint<T>, query: QueryState) -> Result<()>
where
    T: TableRow + Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    tracing::debug!("Listing {}", source.path());
    let controller = ListController::open(source, query).await;
    let snapshot = controller.snapshot();
    if let Some(err) = &snapshot.last_error {
        anyhow::bail!("{}", err);
    }

    if ctx.json {
        let output = serde_json::json!({
            "data": snapshot.page.data,
            "totalElements": snapshot.page.total_elements,
            "page": snapshot.query.page,
            "pageSize": snapshot.query.page_size,
            "pageCount": snapshot.page_count(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    if snapshot.page.is_empty() {
        ui::print_info("No results");
    } else {
        let rows: Vec<Vec<String>> = snapshot.page.data.iter().map(T::cells).collect();
        ui::print_table(T::HEADERS, &rows);
    }
    println!();
    ui::print_info(&ui::page_footer(
        snapshot.query.page,
        snapshot.page_count(),
        snapshot.page.total_elements,
    ));
    Ok(())
}
