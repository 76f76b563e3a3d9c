use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::openai::{Function, Parameters, Property, ToolCall, ToolType};
use crate::ucp::UcpClient;

#[derive(Serialize)]
pub struct ListProductsProps {
    pub filters_json: Property,
}

#[derive(Deserialize)]
pub struct ListProductsArgs {
    #[serde(default)]
    filters_json: Option<String>,
}

/// Fetch the merchant catalog, optionally filtered by attributes the
/// model inferred from the merchant's description.
#[derive(Serialize)]
pub struct ListProductsTool {
    pub r#type: ToolType,
    pub function: Function<ListProductsProps>,
    #[serde(skip)]
    ucp: Arc<UcpClient>,
}

#[async_trait]
impl ToolCall for ListProductsTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: ListProductsArgs = serde_json::from_str(args)?;

        // A malformed filter string falls back to an unfiltered
        // catalog fetch rather than failing the call.
        let filters: HashMap<String, String> = args
            .filters_json
            .as_deref()
            .and_then(|raw| {
                serde_json::from_str(raw)
                    .inspect_err(|err| {
                        tracing::debug!("Ignoring unparseable filters {}: {}", raw, err)
                    })
                    .ok()
            })
            .unwrap_or_default();

        let catalog = self.ucp.get_catalog(&filters).await?;
        Ok(catalog.to_string())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl ListProductsTool {
    pub fn new(ucp: Arc<UcpClient>) -> Self {
        let function = Function {
            name: String::from("list_products"),
            description: String::from(
                "List products from the merchant catalog. Provide filters as a JSON string \
                 of key-value pairs based on the merchant's supported categories or \
                 attributes (e.g., '{\"category\": \"dresses\"}').",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: ListProductsProps {
                    filters_json: Property {
                        r#type: String::from("string"),
                        description: String::from(
                            "A JSON string of filters (e.g., '{\"category\": \"men\"}')",
                        ),
                    },
                },
                required: vec![String::from("filters_json")],
                additional_properties: false,
            },
            strict: true,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ucp,
        }
    }
}
