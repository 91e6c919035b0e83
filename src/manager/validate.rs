//! Validation functions for configuration values.

use validator::ValidationError;

use std::path::Path;

pub fn validate_dir_exist<P: AsRef<Path>>(dir: P) -> Result<(), ValidationError> {
    let dir = dir.as_ref();
    if dir.exists() {
        if !dir.is_dir() {
            return Err(ValidationError::new("InvalidDirectory")
                .with_message(format!("{:?} is not a directory", dir).into()));
        }
    } else {
        return Err(ValidationError::new("InvalidDirectory")
            .with_message(format!("{:?} not found", dir).into()));
    }

    Ok(())
}

pub fn validate_executable_name<P: AsRef<Path>>(executable: P) -> Result<(), ValidationError> {
    if executable.as_ref().as_os_str().is_empty() {
        return Err(ValidationError::new("InvalidExecutable")
            .with_message("no backup executable configured".into()));
    }

    Ok(())
}
