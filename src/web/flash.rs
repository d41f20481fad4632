use serde::Deserialize;

/// One-shot notification codes carried on a redirect target (`?status=` / `?error=`).
#[derive(Debug, Default, Deserialize)]
pub struct FlashQuery {
    pub status: Option<String>,
    pub error: Option<String>,
}

impl FlashQuery {
    pub fn render(&self) -> String {
        compose_flash_message(self.status.as_deref(), self.error.as_deref())
    }
}

/// Compose a flash message HTML snippet for known status or error codes.
pub fn compose_flash_message(status: Option<&str>, error: Option<&str>) -> String {
    if let Some(status) = status {
        let message = match status {
            "logged_in" => "Login successful!",
            "registered" => "Registration successful!",
            "logged_out" => "Logged out successfully!",
            "image_uploaded" => "Image successfully uploaded",
            "artwork_added" => "Artwork added successfully!",
            "file_uploaded" => "File uploaded successfully!",
            "message_received" => "Thank you for your message!",
            "inquiry_received" => "Thank you for your inquiry! We will be in touch soon.",
            "purchased" => "Purchase successful!",
            "membership_requested" => "Thank you for signing up! We will email your membership details.",
            _ => "",
        };

        if !message.is_empty() {
            return format!(r#"<div class="flash success">{message}</div>"#);
        }
    }

    if let Some(error) = error {
        let message = match error {
            "invalid_credentials" => "Invalid credentials!",
            "password_mismatch" => "Passwords do not match!",
            "username_taken" => "Username already exists!",
            "email_taken" => "Email already registered!",
            "missing_fields" => "Please fill in all required fields.",
            "not_authorized" => "Admin access required.",
            "no_file_part" => "No file part",
            "no_selected_file" => "No selected file",
            "file_type_not_allowed" => "That file type is not allowed.",
            "upload_malformed" => "The upload could not be read.",
            "upload_failed" => "The file could not be saved. Please try again.",
            "unknown_category" => "Unknown gallery category.",
            "invalid_year" => "Year must be at most 10 characters.",
            "artwork_failed" => "Error adding artwork. Please try again.",
            "artwork_not_found" => "Artwork not found!",
            "product_not_found" => "Product not found!",
            "invalid_quantity" => "Quantity must be a positive whole number.",
            _ => "Something went wrong. Please try again.",
        };

        return format!(r#"<div class="flash error">{message}</div>"#);
    }

    String::new()
}

/// Appends a flash code to a redirect target.
pub fn with_status(path: &str, code: &str) -> String {
    format!("{path}{}status={code}", separator(path))
}

pub fn with_error(path: &str, code: &str) -> String {
    format!("{path}{}error={code}", separator(path))
}

fn separator(path: &str) -> char {
    if path.contains('?') { '&' } else { '?' }
}
