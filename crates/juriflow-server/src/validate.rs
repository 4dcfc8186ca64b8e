//! Request validation, performed before any background work is admitted.

use crate::error::ApiError;

/// Prompt length bounds, inclusive.
const PROMPT_MIN_CHARS: usize = 10;
const PROMPT_MAX_CHARS: usize = 5000;

/// Extensions accepted by the general upload endpoint.
const UPLOAD_EXTENSIONS: [&str; 5] = ["pdf", "docx", "png", "jpg", "jpeg"];

/// Extensions accepted for petitions (no images).
const PETITION_EXTENSIONS: [&str; 2] = ["pdf", "docx"];

/// Enforce the prompt length contract: 10 to 5000 characters inclusive.
pub fn validate_prompt(prompt: &str) -> Result<(), ApiError> {
    let length = prompt.chars().count();
    if length < PROMPT_MIN_CHARS {
        return Err(ApiError::Validation(format!(
            "prompt must be at least {PROMPT_MIN_CHARS} characters, got {length}"
        )));
    }
    if length > PROMPT_MAX_CHARS {
        return Err(ApiError::Validation(format!(
            "prompt must be at most {PROMPT_MAX_CHARS} characters, got {length}"
        )));
    }
    Ok(())
}

/// Lowercased extension of a file name.
pub fn file_extension(file_name: &str) -> Option<String> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty())
}

pub fn validate_upload_extension(file_name: &str) -> Result<String, ApiError> {
    validate_extension(file_name, &UPLOAD_EXTENSIONS)
}

pub fn validate_petition_extension(file_name: &str) -> Result<String, ApiError> {
    validate_extension(file_name, &PETITION_EXTENSIONS)
}

fn validate_extension(file_name: &str, accepted: &[&str]) -> Result<String, ApiError> {
    let extension = file_extension(file_name).ok_or_else(|| {
        ApiError::UnsupportedMedia(format!("file '{file_name}' has no extension"))
    })?;
    if accepted.contains(&extension.as_str()) {
        Ok(extension)
    } else {
        Err(ApiError::UnsupportedMedia(format!(
            "extension '.{extension}' is not accepted; allowed: {}",
            accepted.join(", ")
        )))
    }
}

/// Enforce the upload size limit.
pub fn validate_upload_size(size: usize, max_bytes: u64) -> Result<(), ApiError> {
    if size as u64 > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "file is {size} bytes, limit is {max_bytes}"
        )));
    }
    Ok(())
}
