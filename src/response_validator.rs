use std::sync::Arc;

use serde_json::Value;

use crate::errors::{FetchError, FetchResult};
use crate::http_request_executor::RawResponse;
use crate::logger::{self, Logger};

/// Parses the body of `response` as JSON. A document that parses but carries
/// nothing (`null`, `false`, `0`, `""`, `[]`, `{}`) is rejected as empty.
pub fn validate(response: &RawResponse) -> FetchResult<Value> {
    ResponseValidator::default().validate(response)
}

pub struct ResponseValidator {
    logger: Arc<dyn Logger>,
}

impl Default for ResponseValidator {
    fn default() -> Self {
        ResponseValidator {
            logger: logger::noop(),
        }
    }
}

impl ResponseValidator {
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        ResponseValidator { logger }
    }

    pub fn validate(&self, response: &RawResponse) -> FetchResult<Value> {
        let value: Value = match serde_json::from_str(&response.body) {
            Ok(value) => value,
            Err(e) => {
                let err = FetchError::InvalidJson(e.to_string());
                self.logger.error(&err.to_string());
                return Err(err);
            }
        };

        if is_empty(&value) {
            let err = FetchError::EmptyResponse;
            self.logger.error(&err.to_string());
            return Err(err);
        }

        self.logger.info("Successfully parsed JSON response");
        return Ok(value);
    }
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(fields) => fields.is_empty(),
    }
}
