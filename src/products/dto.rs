use serde::{Deserialize, Deserializer};
use utoipa::ToSchema;

use crate::error::AppError;

const MAX_PRICE: f64 = 10_000_000_000.0; // NUMERIC(12,2) upper bound, exclusive

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateProductRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[schema(example = 19.99)]
    pub price: f64,
    pub stock: i32,
}

/// Partial update. `description: null` clears the description.
#[derive(Debug, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    #[schema(value_type = Option<String>, nullable)]
    pub description: Option<Option<String>>,
    pub price: Option<f64>,
    pub stock: Option<i32>,
}

fn double_option<'de, D>(de: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(de).map(Some)
}

fn validate_name(name: &str) -> Result<(), AppError> {
    let len = name.trim().chars().count();
    if !(2..=120).contains(&len) {
        return Err(AppError::Validation(
            "name must be between 2 and 120 characters".into(),
        ));
    }
    Ok(())
}

fn validate_price(price: f64) -> Result<(), AppError> {
    if !price.is_finite() || price < 0.0 {
        return Err(AppError::Validation("price must not be less than 0".into()));
    }
    if price >= MAX_PRICE {
        return Err(AppError::Validation("price is too large".into()));
    }
    // Display prints the shortest text that round-trips, i.e. the digits the
    // client sent (up to 15 significant digits, which covers NUMERIC(12,2)).
    let text = price.to_string();
    let decimals = text.split_once('.').map(|(_, frac)| frac.len()).unwrap_or(0);
    if decimals > 2 {
        return Err(AppError::Validation(
            "price must have at most 2 decimal places".into(),
        ));
    }
    Ok(())
}

fn validate_stock(stock: i32) -> Result<(), AppError> {
    if stock < 0 {
        return Err(AppError::Validation("stock must not be less than 0".into()));
    }
    Ok(())
}

impl CreateProductRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_name(&self.name)?;
        validate_price(self.price)?;
        validate_stock(self.stock)
    }
}

impl UpdateProductRequest {
    pub fn validate(&self) -> Result<(), AppError> {
        if let Some(name) = &self.name {
            validate_name(name)?;
        }
        if let Some(price) = self.price {
            validate_price(price)?;
        }
        if let Some(stock) = self.stock {
            validate_stock(stock)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create(name: &str, price: f64, stock: i32) -> CreateProductRequest {
        CreateProductRequest {
            name: name.into(),
            description: None,
            price,
            stock,
        }
    }

    #[test]
    fn create_validation_rules() {
        assert!(create("Laptop Pro 15\"", 1499.99, 50).validate().is_ok());
        assert!(create("Free", 0.0, 0).validate().is_ok());
        assert!(create("L", 1.0, 1).validate().is_err());
        assert!(create(&"x".repeat(121), 1.0, 1).validate().is_err());
        assert!(create("Lamp", -0.01, 1).validate().is_err());
        assert!(create("Lamp", 1.999, 1).validate().is_err());
        assert!(create("Lamp", f64::NAN, 1).validate().is_err());
        assert!(create("Lamp", 1e10, 1).validate().is_err());
        assert!(create("Lamp", 1.0, -1).validate().is_err());
    }

    #[test]
    fn large_two_decimal_prices_are_accepted() {
        for price in [9999999999.99, 1234567890.12, 9000000000.07, 0.29, 0.1, 19.99] {
            assert!(create("Lamp", price, 1).validate().is_ok(), "{price}");
        }
        assert!(create("Lamp", 1234567890.123, 1).validate().is_err());
        assert!(create("Lamp", 0.001, 1).validate().is_err());
    }

    #[test]
    fn patch_distinguishes_null_from_absent() {
        let absent: UpdateProductRequest = serde_json::from_str(r#"{"price": 5}"#).unwrap();
        assert_eq!(absent.description, None);
        assert_eq!(absent.price, Some(5.0));

        let cleared: UpdateProductRequest =
            serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(cleared.description, Some(None));
    }

    #[test]
    fn patch_validates_present_fields_only() {
        assert!(UpdateProductRequest::default().validate().is_ok());
        let bad = UpdateProductRequest {
            stock: Some(-3),
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn unknown_fields_rejected() {
        let res = serde_json::from_str::<UpdateProductRequest>(r#"{"ownerId": "x"}"#);
        assert!(res.is_err());
    }
}
