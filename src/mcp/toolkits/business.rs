//! `apex-ai-business-server`: customer lookup, inventory and ordering over an
//! in-memory dataset.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::mcp::protocol::CallToolResult;
use crate::mcp::server::{McpServer, ServerTool};

/// Server name reported during `initialize`.
pub const BUSINESS_SERVER_NAME: &str = "apex-ai-business-server";

#[derive(Debug, Clone, Serialize)]
struct Customer {
    name: &'static str,
    email: &'static str,
    status: &'static str,
}

/// Mock business data shared by the tools.
#[derive(Debug)]
pub struct BusinessData {
    customers: HashMap<&'static str, Customer>,
    inventory: Mutex<HashMap<String, u64>>,
}

impl Default for BusinessData {
    fn default() -> Self {
        let customers = HashMap::from([
            (
                "cust_001",
                Customer {
                    name: "Alice",
                    email: "alice@example.com",
                    status: "VIP",
                },
            ),
            (
                "cust_002",
                Customer {
                    name: "Bob",
                    email: "bob@example.com",
                    status: "Regular",
                },
            ),
        ]);
        let inventory = HashMap::from([("prod_abc".to_string(), 150), ("prod_xyz".to_string(), 5)]);
        Self {
            customers,
            inventory: Mutex::new(inventory),
        }
    }
}

impl BusinessData {
    fn stock(&self, product_id: &str) -> Option<u64> {
        self.inventory
            .lock()
            .ok()
            .and_then(|inventory| inventory.get(product_id).copied())
    }

    /// Returns the remaining stock.
    fn place_order(&self, customer_id: &str, product_id: &str, quantity: u64) -> Result<u64, String> {
        if !self.customers.contains_key(customer_id) {
            return Err("Invalid Customer".to_string());
        }
        let mut inventory = self
            .inventory
            .lock()
            .map_err(|_| "Inventory unavailable".to_string())?;
        match inventory.get_mut(product_id) {
            Some(stock) if *stock >= quantity => {
                *stock -= quantity;
                Ok(*stock)
            }
            _ => Err("Insufficient Stock".to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerArgs {
    customer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProductArgs {
    product_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderArgs {
    customer_id: String,
    product_id: String,
    quantity: i64,
}

/// Build the business server over fresh mock data.
#[must_use]
pub fn business_server() -> McpServer {
    let data = Arc::new(BusinessData::default());

    let customers = Arc::clone(&data);
    let inventory = Arc::clone(&data);
    let orders = data;

    McpServer::new(BUSINESS_SERVER_NAME, "1.0.0")
        .with_tool(ServerTool::typed(
            "query_customer_data",
            "Retrieve detailed customer information by ID",
            json!({
                "type": "object",
                "properties": {
                    "customerId": {"type": "string", "description": "The ID of the customer to query"}
                },
                "required": ["customerId"]
            }),
            move |args: CustomerArgs| {
                let customer = customers.customers.get(args.customer_id.as_str()).cloned();
                async move {
                    let Some(customer) = customer else {
                        return Ok(CallToolResult::error(format!(
                            "Customer {} not found.",
                            args.customer_id
                        )));
                    };
                    let text = serde_json::to_string_pretty(&customer).map_err(|err| err.to_string())?;
                    Ok(CallToolResult::text(text))
                }
            },
        ))
        .with_tool(ServerTool::typed(
            "check_inventory",
            "Check the stock level of a product",
            json!({
                "type": "object",
                "properties": {
                    "productId": {"type": "string", "description": "The ID of the product to check"}
                },
                "required": ["productId"]
            }),
            move |args: ProductArgs| {
                let stock = inventory.stock(&args.product_id);
                async move {
                    Ok(match stock {
                        Some(stock) => CallToolResult::text(format!(
                            "Current stock for {}: {stock}",
                            args.product_id
                        )),
                        None => CallToolResult::error(format!("Product {} not found.", args.product_id)),
                    })
                }
            },
        ))
        .with_tool(ServerTool::typed(
            "create_order",
            "Place a new order for a customer",
            json!({
                "type": "object",
                "properties": {
                    "customerId": {"type": "string"},
                    "productId": {"type": "string"},
                    "quantity": {"type": "integer", "exclusiveMinimum": 0}
                },
                "required": ["customerId", "productId", "quantity"]
            }),
            move |args: OrderArgs| {
                let outcome = u64::try_from(args.quantity)
                    .ok()
                    .filter(|quantity| *quantity > 0)
                    .ok_or_else(|| "Invalid arguments for tool create_order: quantity must be a positive integer".to_string())
                    .and_then(|quantity| orders.place_order(&args.customer_id, &args.product_id, quantity));
                async move {
                    let remaining = outcome?;
                    let order_id = rand::thread_rng().gen_range(0..10_000);
                    Ok(CallToolResult::text(format!(
                        "Order placed successfully! Order ID: ord_{order_id}. Remaining stock: {remaining}"
                    )))
                }
            },
        ))
}
