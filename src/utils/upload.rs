use crate::api::error::AppError;
use crate::config::AppConfig;
use chrono::Utc;
use percent_encoding::{NON_ALPHANUMERIC, utf8_percent_encode};
use rand::Rng;
use std::path::Path;

/// Sanitizes an upload filename: strips any path component, rejects empty or
/// traversal-only names.
pub fn sanitize_filename(filename: &str) -> Result<String, AppError> {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." {
        return Err(AppError::Validation("Nom de fichier invalide".to_string()));
    }

    Ok(name.to_string())
}

/// Validates an upload: size cap, extension allow-list, and cross-check of
/// the extension against the sniffed content type. A file whose magic bytes
/// say "executable" does not get in because it is named `cours.pdf`.
pub fn validate_upload(filename: &str, data: &[u8], config: &AppConfig) -> Result<(), AppError> {
    if data.len() > config.max_file_size {
        return Err(AppError::Validation(format!(
            "Fichier trop volumineux ({} Mo maximum)",
            config.max_file_size / 1024 / 1024
        )));
    }

    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .ok_or_else(|| AppError::Validation("Extension de fichier manquante".to_string()))?;

    if !config.allowed_extensions.contains(&extension) {
        return Err(AppError::Validation(format!(
            "Extension '.{}' non autorisée",
            extension
        )));
    }

    // Text formats (txt, md, csv, svg) have no magic signature; infer returns
    // None for them and the extension check above is the only gate.
    if let Some(kind) = infer::get(data) {
        let sniffed_ext = kind.extension();
        let compatible = sniffed_ext == extension
            || matches!(
                (sniffed_ext, extension.as_str()),
                ("jpg", "jpeg")
                    | ("zip", "docx")
                    | ("zip", "xlsx")
                    | ("zip", "pptx")
                    | ("zip", "odt")
            );
        if !compatible {
            return Err(AppError::Validation(format!(
                "Le contenu du fichier ({}) ne correspond pas à son extension (.{})",
                kind.mime_type(),
                extension
            )));
        }
    }

    Ok(())
}

/// Builds the object key for an upload: per-user prefix, timestamp and a
/// random salt so concurrent uploads of the same name never collide.
pub fn build_storage_key(user_id: &str, filename: &str) -> String {
    let salt: String = {
        let mut rng = rand::thread_rng();
        let bytes: [u8; 4] = rng.r#gen();
        hex::encode(bytes)
    };
    let encoded = utf8_percent_encode(filename, NON_ALPHANUMERIC).to_string();
    format!(
        "ressources/{}/{}_{}_{}",
        user_id,
        Utc::now().timestamp_millis(),
        salt,
        encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_paths() {
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert_eq!(sanitize_filename("cours.pdf").unwrap(), "cours.pdf");
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("..").is_err());
    }

    #[test]
    fn rejects_disallowed_extension() {
        let config = AppConfig::development();
        assert!(validate_upload("malware.exe", b"MZ", &config).is_err());
        assert!(validate_upload("noextension", b"data", &config).is_err());
    }

    #[test]
    fn rejects_mismatched_magic_bytes() {
        let config = AppConfig::development();
        // PNG magic bytes under a .pdf name
        let png = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0, 0];
        assert!(validate_upload("cours.pdf", &png, &config).is_err());
        assert!(validate_upload("image.png", &png, &config).is_ok());
    }

    #[test]
    fn rejects_oversized_file() {
        let mut config = AppConfig::development();
        config.max_file_size = 4;
        assert!(validate_upload("notes.txt", b"hello", &config).is_err());
    }

    #[test]
    fn storage_key_is_user_scoped() {
        let key = build_storage_key("u1", "mes notes.pdf");
        assert!(key.starts_with("ressources/u1/"));
        assert!(!key.contains(' '));
    }
}
