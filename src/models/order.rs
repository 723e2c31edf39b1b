use chrono::{DateTime, Utc};
use garde::Validate;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Line item property carrying the storefront configurator output.
pub const CONFIGURATOR_PROPERTY: &str = "configurator_payload";

/// Tolerance applied to the `x + w <= 1` / `y + h <= 1` checks.
const RATIO_EPSILON: f64 = 1e-9;

/// Inbound `orders/paid` webhook body (only the fields this service reads).
#[derive(Debug, Clone, Deserialize)]
pub struct OrderPayload {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub total_price: Option<Value>,
    #[serde(default)]
    pub line_items: Option<Vec<LineItem>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItem {
    #[serde(default)]
    pub properties: Option<Vec<LineItemProperty>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LineItemProperty {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub value: Value,
}

/// Fractional sub-rectangle of the master image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Validate)]
pub struct CropRatio {
    #[garde(range(min = 0.0, max = 1.0))]
    pub x: f64,
    #[garde(range(min = 0.0, max = 1.0))]
    pub y: f64,
    #[garde(range(min = 0.0, max = 1.0))]
    pub w: f64,
    #[garde(range(min = 0.0, max = 1.0))]
    pub h: f64,
}

/// Requested pixel size of the final cropped image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct OutputSize {
    #[garde(range(min = 1))]
    pub width: u32,
    #[garde(range(min = 1))]
    pub height: u32,
}

/// Decoded `configurator_payload` property value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfiguratorPayload {
    #[serde(default)]
    pub master_asset_id: Option<String>,
    #[serde(default)]
    pub crop_ratio: Option<CropRatio>,
    #[serde(default)]
    pub output_size: Option<OutputSize>,
}

/// Order fields copied into the metadata document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OrderContext {
    pub email: Option<String>,
    pub currency: Option<String>,
    pub total_price: Option<String>,
}

/// Validated unit of work derived from one paid order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderJob {
    pub order_id: String,
    pub master_asset_id: String,
    pub crop_ratio: CropRatio,
    pub output_size: Option<OutputSize>,
    pub context: OrderContext,
    /// The webhook body exactly as received.
    pub raw_payload: Value,
    /// Distinguishes repeated submissions of the same order in logs.
    pub attempt_id: Uuid,
    pub queued_at: DateTime<Utc>,
}

impl OrderJob {
    /// Normalize a raw order document into a job.
    ///
    /// Every line item property named `configurator_payload` is decoded in
    /// iteration order and the last one wins. Missing or malformed fields are
    /// reported as [`ValidationError`]s; nothing is written anywhere.
    pub fn from_payload(raw_payload: Value) -> Result<Self, ValidationError> {
        let order: OrderPayload = serde_json::from_value(raw_payload.clone())
            .map_err(ValidationError::MalformedOrder)?;

        let order_id = normalize_order_id(order.id.as_ref())?;

        let mut configurator = None;
        for item in order.line_items.iter().flatten() {
            for property in item.properties.iter().flatten() {
                if property.name == CONFIGURATOR_PROPERTY {
                    configurator = Some(parse_configurator(&property.value)?);
                }
            }
        }

        let configurator = configurator.ok_or(ValidationError::MissingField(CONFIGURATOR_PROPERTY))?;

        let master_asset_id = configurator
            .master_asset_id
            .filter(|id| !id.trim().is_empty())
            .ok_or(ValidationError::MissingField("master_asset_id"))?;
        if !is_safe_asset_id(&master_asset_id) {
            return Err(ValidationError::InvalidField {
                field: "master_asset_id",
                reason: format!("unsupported characters in {master_asset_id:?}"),
            });
        }

        let crop_ratio = configurator
            .crop_ratio
            .ok_or(ValidationError::MissingField("crop_ratio"))?;
        validate_crop_ratio(&crop_ratio)?;

        if let Some(size) = &configurator.output_size {
            size.validate().map_err(|report| ValidationError::InvalidField {
                field: "output_size",
                reason: report.to_string(),
            })?;
        }

        Ok(Self {
            order_id,
            master_asset_id,
            crop_ratio,
            output_size: configurator.output_size,
            context: OrderContext {
                email: order.email,
                currency: order.currency,
                total_price: order.total_price.as_ref().and_then(scalar_to_string),
            },
            raw_payload,
            attempt_id: Uuid::new_v4(),
            queued_at: Utc::now(),
        })
    }
}

fn normalize_order_id(id: Option<&Value>) -> Result<String, ValidationError> {
    let order_id = id
        .and_then(scalar_to_string)
        .filter(|id| !id.is_empty())
        .ok_or(ValidationError::MissingField("id"))?;

    if !is_valid_order_id(&order_id) {
        return Err(ValidationError::InvalidField {
            field: "id",
            reason: format!("unsupported characters in {order_id:?}"),
        });
    }
    Ok(order_id)
}

/// Order ids name artifact directories, so only `[A-Za-z0-9_-]` is allowed.
pub fn is_valid_order_id(order_id: &str) -> bool {
    !order_id.is_empty()
        && order_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

fn is_safe_asset_id(id: &str) -> bool {
    id != "."
        && id != ".."
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

fn parse_configurator(value: &Value) -> Result<ConfiguratorPayload, ValidationError> {
    match value {
        Value::String(text) => serde_json::from_str(text).map_err(ValidationError::MalformedConfigurator),
        Value::Object(_) => {
            serde_json::from_value(value.clone()).map_err(ValidationError::MalformedConfigurator)
        }
        Value::Null => Ok(ConfiguratorPayload::default()),
        other => Err(ValidationError::InvalidField {
            field: CONFIGURATOR_PROPERTY,
            reason: format!("expected JSON text or object, got {other}"),
        }),
    }
}

fn validate_crop_ratio(ratio: &CropRatio) -> Result<(), ValidationError> {
    let invalid = |reason: String| ValidationError::InvalidField {
        field: "crop_ratio",
        reason,
    };

    ratio.validate().map_err(|report| invalid(report.to_string()))?;

    if ratio.w <= 0.0 || ratio.h <= 0.0 {
        return Err(invalid("w and h must be greater than zero".to_string()));
    }
    if ratio.x + ratio.w > 1.0 + RATIO_EPSILON {
        return Err(invalid(format!("x + w = {} exceeds 1", ratio.x + ratio.w)));
    }
    if ratio.y + ratio.h > 1.0 + RATIO_EPSILON {
        return Err(invalid(format!("y + h = {} exceeds 1", ratio.y + ratio.h)));
    }
    Ok(())
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Client-side problems with an order payload. Maps to HTTP 400.
#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error("{0} missing")]
    MissingField(&'static str),

    #[error("invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("malformed order payload: {0}")]
    MalformedOrder(#[source] serde_json::Error),

    #[error("malformed configurator_payload: {0}")]
    MalformedConfigurator(#[source] serde_json::Error),
}
