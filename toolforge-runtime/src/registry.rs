//! Persistent registry of deployed tools.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::{DeployError, Result};
use crate::manifest::ToolMeta;
use crate::probe::ToolSchema;
use crate::store::{PersistentStore, state_dir};
use crate::util::now_ts;

/// One deployed tool. Created exactly once per successful deployment and
/// never mutated — re-deploying creates a new record.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    pub id: String,
    pub owner: String,
    pub name: String,
    pub description: Option<String>,
    #[serde(rename = "apiURL")]
    pub api_url: String,
    pub price: f64,
    #[serde(default)]
    pub input_schema: Option<serde_json::Value>,
    #[serde(default)]
    pub output_schema: Option<serde_json::Value>,
    pub created_at: u64,
}

static TOOLS: OnceCell<PersistentStore<ToolRecord>> = OnceCell::new();

pub fn tools() -> Result<&'static PersistentStore<ToolRecord>> {
    TOOLS
        .get_or_try_init(|| {
            let path = state_dir().join("tools.json");
            PersistentStore::open(path)
        })
        .map_err(|err: DeployError| err)
}

pub fn get_tool_by_id(id: &str) -> Result<ToolRecord> {
    tools()?
        .get(id)?
        .ok_or_else(|| DeployError::NotFound(format!("Tool '{id}' not found")))
}

pub fn list_tools() -> Result<Vec<ToolRecord>> {
    let mut records = tools()?.values()?;
    records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(records)
}

/// Resolve a tool's price: live schema-probe price over statically parsed
/// price over zero (free).
pub fn resolve_price(probed: Option<&ToolSchema>, static_price: f64) -> f64 {
    probed.and_then(|s| s.price).unwrap_or(static_price)
}

/// Register a freshly deployed workload as a tool.
pub fn create_tool_record(
    owner: &str,
    meta: &ToolMeta,
    api_url: &str,
    static_price: f64,
    probed: Option<&ToolSchema>,
) -> Result<ToolRecord> {
    let record = ToolRecord {
        id: uuid::Uuid::new_v4().to_string(),
        owner: owner.to_string(),
        name: meta.name.clone(),
        description: meta.description.clone(),
        api_url: api_url.to_string(),
        price: resolve_price(probed, static_price),
        input_schema: probed.and_then(|s| s.input_schema.clone()),
        output_schema: probed.and_then(|s| s.output_schema.clone()),
        created_at: now_ts(),
    };
    tools()?.insert(record.id.clone(), record.clone())?;
    Ok(record)
}
