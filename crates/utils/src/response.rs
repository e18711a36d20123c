use serde::Serialize;

/// Standard JSON envelope for every API response.
///
/// Success: `{"success": true, "data": ...}`. Error: `{"success": false,
/// "message": "...", "error_data": ...}` where `error_data` is optional
/// structured detail for the frontend.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize, E: Serialize = ()> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_data: Option<E>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
}

impl<T: Serialize, E: Serialize> ApiResponse<T, E> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_data: None,
            message: None,
        }
    }

    pub fn error(message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error_data: None,
            message: Some(message.to_string()),
        }
    }

    pub fn error_with_data(error_data: E, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error_data: Some(error_data),
            message: Some(message.to_string()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    pub fn error_data(&self) -> Option<&E> {
        self.error_data.as_ref()
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}
