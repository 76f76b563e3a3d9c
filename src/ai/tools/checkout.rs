//! Tools covering the checkout lifecycle: session creation, shipping
//! address, shipping option selection, and payment completion.
//!
//! Argument shapes coming back from the model are validated into
//! typed structs before any UCP call is dispatched. Nested parameter
//! schemas use raw JSON since the OpenAI schema for these is deeper
//! than a flat property map.

use std::sync::Arc;

use anyhow::{Error, Result, anyhow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::openai::{Function, Parameters, ToolCall, ToolType};
use crate::ucp::{
    Buyer, Destination, Fulfillment, FulfillmentGroup, FulfillmentMethod, ItemRef, LineItem,
    Payment, UcpClient,
};

const DEFAULT_METHOD_ID: &str = "ship_to_home";
const DEFAULT_DESTINATION_ID: &str = "home_address";
const DEFAULT_GROUP_ID: &str = "group_all";

// A line item as the model tends to produce it: either the nested
// `item.id` shape from the schema or a flat `item_id`.
#[derive(Deserialize)]
struct RawLineItem {
    item: Option<ItemRef>,
    item_id: Option<String>,
    quantity: u32,
}

impl RawLineItem {
    fn normalize(self) -> Result<LineItem, Error> {
        let id = self
            .item_id
            .or(self.item.map(|item| item.id))
            .ok_or(anyhow!("Line item is missing an item id"))?;
        Ok(LineItem {
            item: ItemRef { id },
            quantity: self.quantity,
        })
    }
}

#[derive(Deserialize)]
struct CreateCheckoutArgs {
    line_items: Vec<RawLineItem>,
    buyer: Buyer,
}

/// Start a checkout session for one or more items.
#[derive(Serialize)]
pub struct CreateCheckoutTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    ucp: Arc<UcpClient>,
}

#[async_trait]
impl ToolCall for CreateCheckoutTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: CreateCheckoutArgs = serde_json::from_str(args)?;
        let line_items = args
            .line_items
            .into_iter()
            .map(RawLineItem::normalize)
            .collect::<Result<Vec<_>, _>>()?;

        // Currency is fixed for the demo merchant surface
        let checkout = self
            .ucp
            .create_checkout("USD", &line_items, &args.buyer)
            .await?;
        Ok(checkout.to_string())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CreateCheckoutTool {
    pub fn new(ucp: Arc<UcpClient>) -> Self {
        let function = Function {
            name: String::from("create_checkout"),
            description: String::from("Start the checkout process for one or more items."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "line_items": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "item": {
                                    "type": "object",
                                    "properties": {"id": {"type": "string"}},
                                    "required": ["id"]
                                },
                                "quantity": {"type": "number"}
                            },
                            "required": ["item", "quantity"]
                        }
                    },
                    "buyer": {
                        "type": "object",
                        "properties": {
                            "full_name": {"type": "string"},
                            "email": {"type": "string"}
                        },
                        "required": ["full_name", "email"]
                    }
                }),
                required: vec![String::from("line_items"), String::from("buyer")],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ucp,
        }
    }
}

#[derive(Deserialize)]
struct ShippingAddressArgs {
    full_name: String,
    address_line_1: String,
    city: String,
    state: String,
    postal_code: String,
    country: String,
    phone_number: Option<String>,
}

#[derive(Deserialize)]
struct UpdateCheckoutAddressArgs {
    checkout_id: String,
    shipping_address: ShippingAddressArgs,
}

/// Update the shipping address on a checkout session.
#[derive(Serialize)]
pub struct UpdateCheckoutAddressTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    ucp: Arc<UcpClient>,
}

#[async_trait]
impl ToolCall for UpdateCheckoutAddressTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: UpdateCheckoutAddressArgs = serde_json::from_str(args)?;
        let address = args.shipping_address;

        let mut name_parts = address.full_name.split_whitespace();
        let first_name = name_parts.next().unwrap_or("").to_string();
        let last_name = name_parts.collect::<Vec<_>>().join(" ");

        let fulfillment = Fulfillment {
            methods: vec![FulfillmentMethod {
                id: Some(DEFAULT_METHOD_ID.to_string()),
                kind: Some(String::from("shipping")),
                destinations: vec![Destination {
                    id: Some(DEFAULT_DESTINATION_ID.to_string()),
                    first_name: Some(first_name),
                    last_name: Some(last_name),
                    street_address: Some(address.address_line_1),
                    address_locality: Some(address.city),
                    address_region: Some(address.state),
                    postal_code: Some(address.postal_code),
                    address_country: Some(address.country),
                    phone_number: address.phone_number,
                    ..Default::default()
                }],
                selected_destination_id: Some(DEFAULT_DESTINATION_ID.to_string()),
                ..Default::default()
            }],
            ..Default::default()
        };

        let checkout = self
            .ucp
            .update_checkout(&args.checkout_id, &json!({"fulfillment": fulfillment}))
            .await?;
        Ok(checkout.to_string())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl UpdateCheckoutAddressTool {
    pub fn new(ucp: Arc<UcpClient>) -> Self {
        let function = Function {
            name: String::from("update_checkout_address"),
            description: String::from("Update the shipping address for a checkout session."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "checkout_id": {"type": "string"},
                    "shipping_address": {
                        "type": "object",
                        "properties": {
                            "full_name": {"type": "string"},
                            "address_line_1": {"type": "string"},
                            "city": {"type": "string"},
                            "state": {"type": "string"},
                            "postal_code": {"type": "string"},
                            "country": {"type": "string"},
                            "phone_number": {"type": "string"}
                        },
                        "required": [
                            "full_name",
                            "address_line_1",
                            "city",
                            "state",
                            "postal_code",
                            "country"
                        ]
                    }
                }),
                required: vec![
                    String::from("checkout_id"),
                    String::from("shipping_address"),
                ],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ucp,
        }
    }
}

#[derive(Deserialize)]
struct UpdateShippingOptionArgs {
    checkout_id: String,
    shipping_option_id: String,
}

/// Select a shipping option for a checkout session. Preserves
/// whatever fulfillment state the merchant already has and only
/// stamps the chosen option onto each group.
#[derive(Serialize)]
pub struct UpdateShippingOptionTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    ucp: Arc<UcpClient>,
}

#[async_trait]
impl ToolCall for UpdateShippingOptionTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: UpdateShippingOptionArgs = serde_json::from_str(args)?;

        let checkout = self.ucp.get_checkout(&args.checkout_id).await?;
        let existing = checkout
            .get("fulfillment")
            .cloned()
            .unwrap_or_else(|| json!({}));
        let mut fulfillment: Fulfillment = serde_json::from_value(existing)?;

        if fulfillment.methods.is_empty() {
            fulfillment.methods.push(FulfillmentMethod {
                id: Some(DEFAULT_METHOD_ID.to_string()),
                kind: Some(String::from("shipping")),
                selected_destination_id: Some(DEFAULT_DESTINATION_ID.to_string()),
                ..Default::default()
            });
        }

        for method in fulfillment.methods.iter_mut() {
            if method.groups.is_empty() {
                method.groups.push(FulfillmentGroup {
                    id: Some(DEFAULT_GROUP_ID.to_string()),
                    ..Default::default()
                });
            }
            for group in method.groups.iter_mut() {
                group.selected_option_id = Some(args.shipping_option_id.clone());
            }
        }

        let checkout = self
            .ucp
            .update_checkout(&args.checkout_id, &json!({"fulfillment": fulfillment}))
            .await?;
        Ok(checkout.to_string())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl UpdateShippingOptionTool {
    pub fn new(ucp: Arc<UcpClient>) -> Self {
        let function = Function {
            name: String::from("update_shipping_option"),
            description: String::from("Select a shipping option for a checkout session."),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "checkout_id": {"type": "string"},
                    "shipping_option_id": {"type": "string"}
                }),
                required: vec![
                    String::from("checkout_id"),
                    String::from("shipping_option_id"),
                ],
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

#[derive(Deserialize)]
struct CompletePaymentArgs {
    checkout_id: String,
    payment: Payment,
}

/// Complete the checkout with a (mock) payment instrument.
#[derive(Serialize)]
pub struct CompletePaymentTool {
    pub r#type: ToolType,
    pub function: Function<Value>,
    #[serde(skip)]
    ucp: Arc<UcpClient>,
}

#[async_trait]
impl ToolCall for CompletePaymentTool {
    async fn call(&self, args: &str) -> Result<String, Error> {
        let args: CompletePaymentArgs = serde_json::from_str(args)?;
        let checkout = self
            .ucp
            .complete_checkout(&args.checkout_id, &args.payment)
            .await?;
        Ok(checkout.to_string())
    }

    fn function_name(&self) -> String {
        self.function.name.clone()
    }
}

impl CompletePaymentTool {
    pub fn new(ucp: Arc<UcpClient>) -> Self {
        let function = Function {
            name: String::from("complete_payment"),
            description: String::from(
                "Complete the checkout by providing payment info. Use 'mock_payment' for \
                 handler_id, 'card' for type, and a credential object with type 'token' and \
                 token 'success_token'. Note: selected_instrument_id must match the 'id' \
                 field of one of the instruments (e.g., 'pi_1').",
            ),
            parameters: Parameters {
                r#type: String::from("object"),
                properties: json!({
                    "checkout_id": {"type": "string"},
                    "payment": {
                        "type": "object",
                        "properties": {
                            "selected_instrument_id": {
                                "type": "string",
                                "description": "Must match the 'id' of the selected instrument."
                            },
                            "instruments": {
                                "type": "array",
                                "items": {
                                    "type": "object",
                                    "properties": {
                                        "id": {"type": "string"},
                                        "handler_id": {"type": "string"},
                                        "type": {"type": "string"},
                                        "credential": {
                                            "type": "object",
                                            "properties": {
                                                "type": {"type": "string"},
                                                "token": {"type": "string"}
                                            },
                                            "required": ["type", "token"]
                                        }
                                    },
                                    "required": ["id", "handler_id", "type", "credential"]
                                }
                            }
                        },
                        "required": ["selected_instrument_id", "instruments"]
                    }
                }),
                required: vec![String::from("checkout_id"), String::from("payment")],
                additional_properties: false,
            },
            strict: false,
        };
        Self {
            r#type: ToolType::Function,
            function,
            ucp,
        }
    }
}
