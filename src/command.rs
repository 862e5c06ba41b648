use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::InterpretError;

/// Quantity assumed for `add_item` when the utterance names no count.
pub const DEFAULT_QUANTITY: f64 = 1.0;

/// Placeholder used when a product name could not be recovered.
pub const UNKNOWN_PRODUCT: &str = "неизвестный товар";

/// The fixed set of actions a POS terminal accepts from the voice helper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    AddItem,
    ClearCart,
    CompleteSale,
    OpenManagement,
}

impl CommandKind {
    pub const ALL: [CommandKind; 4] = [
        CommandKind::AddItem,
        CommandKind::ClearCart,
        CommandKind::CompleteSale,
        CommandKind::OpenManagement,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandKind::AddItem => "add_item",
            CommandKind::ClearCart => "clear_cart",
            CommandKind::CompleteSale => "complete_sale",
            CommandKind::OpenManagement => "open_management",
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A structured cashier command extracted from one utterance.
///
/// Only `AddItem` carries a payload, so a command of any other kind cannot
/// hold a product or a quantity. The wire form is the flat JSON object
/// `{"command", "product_name_or_sku", "quantity"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WireCommand", into = "WireCommand")]
pub enum Command {
    AddItem(LineItem),
    ClearCart,
    CompleteSale,
    OpenManagement,
}

/// Payload of `add_item`. The product name is trimmed (blank means absent)
/// and the quantity is finite and positive, whichever way it was built.
#[derive(Debug, Clone, PartialEq)]
pub struct LineItem {
    product_name_or_sku: Option<String>,
    quantity: f64,
}

impl LineItem {
    pub fn new(product_name_or_sku: Option<&str>, quantity: f64) -> Result<Self, InterpretError> {
        if !quantity.is_finite() || quantity <= 0.0 {
            return Err(InterpretError::SchemaViolation(format!(
                "quantity must be a positive number, got {}",
                quantity
            )));
        }
        Ok(Self {
            product_name_or_sku: clean_product(product_name_or_sku),
            quantity,
        })
    }

    /// Item with `DEFAULT_QUANTITY`, which is always valid.
    pub fn with_default_quantity(product_name_or_sku: Option<&str>) -> Self {
        Self {
            product_name_or_sku: clean_product(product_name_or_sku),
            quantity: DEFAULT_QUANTITY,
        }
    }

    pub fn product_name_or_sku(&self) -> Option<&str> {
        self.product_name_or_sku.as_deref()
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }
}

fn clean_product(name: Option<&str>) -> Option<String> {
    name.map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

#[derive(Debug, Serialize, Deserialize)]
struct WireCommand {
    command: CommandKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    product_name_or_sku: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    quantity: Option<f64>,
}

impl TryFrom<WireCommand> for Command {
    type Error = String;

    fn try_from(wire: WireCommand) -> Result<Self, Self::Error> {
        match wire.command {
            CommandKind::AddItem => LineItem::new(
                wire.product_name_or_sku.as_deref(),
                wire.quantity.unwrap_or(DEFAULT_QUANTITY),
            )
            .map(Command::AddItem)
            .map_err(|e| e.to_string()),
            CommandKind::ClearCart => Ok(Command::ClearCart),
            CommandKind::CompleteSale => Ok(Command::CompleteSale),
            CommandKind::OpenManagement => Ok(Command::OpenManagement),
        }
    }
}

impl From<Command> for WireCommand {
    fn from(command: Command) -> Self {
        let kind = command.kind();
        match command {
            Command::AddItem(item) => WireCommand {
                command: kind,
                product_name_or_sku: item.product_name_or_sku,
                quantity: Some(item.quantity),
            },
            _ => WireCommand {
                command: kind,
                product_name_or_sku: None,
                quantity: None,
            },
        }
    }
}

impl Command {
    /// `add_item` with the default quantity.
    pub fn add_item(product_name_or_sku: &str) -> Self {
        Command::AddItem(LineItem::with_default_quantity(Some(product_name_or_sku)))
    }

    /// `add_item` with an explicit quantity; fails the same way a model
    /// reply with that payload would.
    pub fn add_items(
        product_name_or_sku: Option<&str>,
        quantity: f64,
    ) -> Result<Self, InterpretError> {
        LineItem::new(product_name_or_sku, quantity).map(Command::AddItem)
    }

    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddItem(_) => CommandKind::AddItem,
            Command::ClearCart => CommandKind::ClearCart,
            Command::CompleteSale => CommandKind::CompleteSale,
            Command::OpenManagement => CommandKind::OpenManagement,
        }
    }

    pub fn product_name_or_sku(&self) -> Option<&str> {
        match self {
            Command::AddItem(item) => item.product_name_or_sku(),
            _ => None,
        }
    }

    pub fn quantity(&self) -> Option<f64> {
        match self {
            Command::AddItem(item) => Some(item.quantity()),
            _ => None,
        }
    }

    /// Parse and validate a model reply. Anything that is not a JSON object
    /// matching the command schema is a `SchemaViolation`.
    pub fn from_json(text: &str) -> Result<Self, InterpretError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(InterpretError::SchemaViolation(
                "empty model reply".to_string(),
            ));
        }
        let value: Value = serde_json::from_str(text)
            .map_err(|e| InterpretError::SchemaViolation(e.to_string()))?;
        if !value.is_object() {
            return Err(InterpretError::SchemaViolation(format!(
                "expected a JSON object, got {}",
                value
            )));
        }
        serde_json::from_value(value).map_err(|e| InterpretError::SchemaViolation(e.to_string()))
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// JSON schema of the wire form, sent to the model as its output constraint.
    pub fn json_schema() -> Value {
        let kinds: Vec<&str> = CommandKind::ALL.iter().map(|k| k.as_str()).collect();
        json!({
            "title": "VoiceCommand",
            "description": "Команда для выполнения на POS-терминале.",
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "enum": kinds,
                    "description": "Тип команды для выполнения на терминале."
                },
                "product_name_or_sku": {
                    "type": ["string", "null"],
                    "description": "Название товара или SKU, только для команды 'add_item' (например: 'Кока-кола', '12345')."
                },
                "quantity": {
                    "type": ["number", "null"],
                    "description": "Количество товара, только для команды 'add_item'. Если количество не указано, используйте 1.0."
                }
            },
            "required": ["command"]
        })
    }

    /// Short phrase confirming what the terminal is about to do.
    pub fn confirmation(&self) -> String {
        match self {
            Command::AddItem(item) => {
                let product = match item.product_name_or_sku() {
                    Some(name) => format!("товар {}", name),
                    None => UNKNOWN_PRODUCT.to_string(),
                };
                format!("Добавляю {} в корзину ({} шт.)", product, item.quantity())
            }
            Command::ClearCart => "Очищаю корзину покупок".to_string(),
            Command::CompleteSale => "Завершаю текущую продажу".to_string(),
            Command::OpenManagement => "Открываю панель управления".to_string(),
        }
    }
}
