//! Validation utilities for API request data
use crate::models::{CreateSubscriptionRequest, UpdateSubscriptionRequest};

/// Validates a create request before it reaches the service.
///
/// Requires a non-blank `service_name`, `user_id` and `start_date`, and a
/// positive `price`. Date and UUID syntax is checked by the service.
pub fn validate_create_request(req: &CreateSubscriptionRequest) -> Result<(), String> {
    require_non_blank("service_name", &req.service_name)?;
    require_non_blank("user_id", &req.user_id)?;
    require_non_blank("start_date", &req.start_date)?;
    require_positive_price(req.price)
}

/// Validates the fields present in a partial update.
pub fn validate_update_request(req: &UpdateSubscriptionRequest) -> Result<(), String> {
    if let Some(ref service_name) = req.service_name {
        require_non_blank("service_name", service_name)?;
    }
    if let Some(price) = req.price {
        require_positive_price(price)?;
    }
    Ok(())
}

fn require_non_blank(field: &str, value: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field} is required"));
    }
    Ok(())
}

fn require_positive_price(price: i32) -> Result<(), String> {
    if price <= 0 {
        return Err(format!("price must be positive, got {price}"));
    }
    Ok(())
}
